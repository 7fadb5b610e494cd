//! Refresh coordination state: the `Idle`/`Refreshing` decision and the FIFO queue of
//! callers waiting on the in-flight refresh.
//!
//! Every mutation happens under one [`Mutex`] that is never held across an `.await`, so
//! deciding between "start a refresh" and "enqueue" is atomic with respect to other callers.
//! A queued record only carries the caller's responder; each caller keeps its own request
//! and replays it once the refresh outcome reaches it.

// crates.io
use futures::channel::oneshot::{self, Receiver, Sender};
// self
use crate::{_prelude::*, gateway::RefreshState, http::GatewayRequest};

/// Refresh outcome delivered to a queued caller.
pub(crate) type Settlement = Result<()>;
pub(crate) type Waiter = Receiver<Settlement>;

/// Caller parked behind an in-flight refresh.
#[derive(Debug)]
struct PendingRefresh {
	responder: Sender<Settlement>,
}

/// Result of [`RefreshCoordinator::admit`].
pub(crate) enum Admission {
	/// Caller owns the refresh cycle and must settle the queue through `guard`.
	Leader { guard: RefreshGuard, request: GatewayRequest },
	/// Caller was queued; `waiter` yields the refresh outcome before `request` is replayed.
	Queued { waiter: Waiter, request: GatewayRequest },
}

#[derive(Debug, Default)]
struct CoordinatorState {
	state: RefreshState,
	queue: VecDeque<PendingRefresh>,
}

/// Shared handle to a gateway's refresh state and queue.
#[derive(Clone, Debug, Default)]
pub(crate) struct RefreshCoordinator(Arc<Mutex<CoordinatorState>>);
impl RefreshCoordinator {
	pub(crate) fn state(&self) -> RefreshState {
		self.0.lock().state
	}

	pub(crate) fn pending_len(&self) -> usize {
		self.0.lock().queue.len()
	}

	/// Marks `request` as a retry, then either claims the refresh cycle or enqueues the caller.
	pub(crate) fn admit(&self, request: GatewayRequest) -> Admission {
		let request = request.into_retry();
		let mut inner = self.0.lock();

		match inner.state {
			RefreshState::Refreshing => {
				let (responder, waiter) = oneshot::channel();

				inner.queue.push_back(PendingRefresh { responder });

				Admission::Queued { waiter, request }
			},
			RefreshState::Idle => {
				inner.state = RefreshState::Refreshing;

				Admission::Leader {
					guard: RefreshGuard { coordinator: self.clone(), released: false },
					request,
				}
			},
		}
	}
}

/// Ownership of one refresh cycle; returns the coordinator to `Idle` exactly once.
///
/// Dropping a guard before the refresh settled rejects every queued caller with
/// [`Error::RefreshAbandoned`].
pub(crate) struct RefreshGuard {
	coordinator: RefreshCoordinator,
	released: bool,
}
impl RefreshGuard {
	/// Releases every queued caller, oldest first, to replay with the stored credentials.
	pub(crate) fn resolve_all(&mut self) {
		self.settle(Ok(()), || {});
	}

	/// Runs `on_locked`, rejects every queued caller with `err`, and releases to `Idle`,
	/// all inside one critical section.
	pub(crate) fn reject_all(&mut self, err: &Error, on_locked: impl FnOnce()) {
		self.settle(Err(err.clone()), on_locked);
	}

	fn settle(&mut self, outcome: Settlement, on_locked: impl FnOnce()) {
		if self.released {
			return;
		}

		let mut inner = self.coordinator.0.lock();

		on_locked();

		for pending in inner.queue.drain(..) {
			let _ = pending.responder.send(outcome.clone());
		}

		inner.state = RefreshState::Idle;
		self.released = true;
	}
}
impl Drop for RefreshGuard {
	fn drop(&mut self) {
		self.settle(Err(Error::RefreshAbandoned), || {});
	}
}

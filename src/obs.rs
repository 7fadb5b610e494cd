//! Optional observability helpers for gateway operations.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to wrap each [`Operation`] in a span named after it (for example
//!   `auth_gateway.refresh`) with a `stage` field, and to emit `warn` events when a credential
//!   store fails.
//! - Enable `metrics` to increment the `auth_gateway_operation_total` counter for every
//!   refresh attempt/success/failure, queued request, and replay, labeled by `operation` +
//!   `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Gateway operations observed by the instrumentation layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
	/// Single-flight refresh cycle triggered by a `401`.
	Refresh,
	/// Request parked behind an in-flight refresh.
	Queue,
	/// Request re-dispatched with refreshed credentials.
	Replay,
}
impl Operation {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Operation::Refresh => "refresh",
			Operation::Queue => "queue",
			Operation::Replay => "replay",
		}
	}

	/// Name of the tracing span covering this operation.
	pub const fn span_name(self) -> &'static str {
		match self {
			Operation::Refresh => "auth_gateway.refresh",
			Operation::Queue => "auth_gateway.queue",
			Operation::Replay => "auth_gateway.replay",
		}
	}
}
impl Display for Operation {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Outcome {
	/// Entry to a gateway operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl Outcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Outcome::Attempt => "attempt",
			Outcome::Success => "success",
			Outcome::Failure => "failure",
		}
	}
}
impl Display for Outcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

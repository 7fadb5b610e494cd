// self
use crate::{_prelude::*, obs::Operation, store::StoreError};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedOperation<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedOperation<F> = F;

/// A span builder used by gateway operations.
#[derive(Clone, Debug)]
pub struct GatewaySpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl GatewaySpan {
	/// Creates a span named after `operation` (see [`Operation::span_name`]) and tagged
	/// with `stage`.
	pub fn new(operation: Operation, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			// Span names are static metadata, so each operation gets its own callsite.
			let span = match operation {
				Operation::Refresh => tracing::info_span!("auth_gateway.refresh", stage),
				Operation::Queue => tracing::info_span!("auth_gateway.queue", stage),
				Operation::Replay => tracing::info_span!("auth_gateway.replay", stage),
			};

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (operation, stage);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedOperation<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Reports a credential store failure that did not change the caller-visible outcome.
pub fn report_store_failure(stage: &'static str, err: &StoreError) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(stage, error = %err, "credential store operation failed");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (stage, err);
	}
}

// self
use crate::{_prelude::*, obs::FlowKind};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// A span builder used by session flows.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Creates a new span tagged with the provided flow kind + stage.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("simplisafe_session.flow", flow = kind.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
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

pub(crate) fn retry_scheduled(path: &str, attempt: u32, status: u16, delay: StdDuration) {
	#[cfg(feature = "tracing")]
	tracing::debug!(path, attempt, status, delay_ms = delay.as_millis() as u64, "retrying request");
	#[cfg(not(feature = "tracing"))]
	let _ = (path, attempt, status, delay);
}

pub(crate) fn reauthenticating(path: &str) {
	#[cfg(feature = "tracing")]
	tracing::info!(path, "401 received; forcing refresh-token exchange");
	#[cfg(not(feature = "tracing"))]
	let _ = path;
}

pub(crate) fn tokens_rotated(expires_at: OffsetDateTime, callbacks: usize) {
	#[cfg(feature = "tracing")]
	tracing::info!(%expires_at, callbacks, "refresh token rotated");
	#[cfg(not(feature = "tracing"))]
	let _ = (expires_at, callbacks);
}

pub(crate) fn callback_panicked(id: u64, message: &str) {
	#[cfg(feature = "tracing")]
	tracing::error!(callback = id, panic = message, "refresh token callback panicked");
	#[cfg(not(feature = "tracing"))]
	let _ = (id, message);
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn event_helpers_are_noops_without_subscribers() {
		retry_scheduled("users/1/subscriptions", 1, 409, StdDuration::from_millis(5));
		reauthenticating("api/authCheck");
		tokens_rotated(OffsetDateTime::now_utc(), 2);
		callback_panicked(7, "boom");
	}

	#[cfg(feature = "tracing")]
	#[tokio::test]
	async fn instrument_wraps_future() {
		let span = FlowSpan::new(FlowKind::Refresh, "instrument_wraps_future");
		let value = span.instrument(async { 42 }).await;

		assert_eq!(value, 42);
	}
}

// self
use crate::{
	_prelude::*,
	obs::{FlowKind, FlowOutcome},
};

/// Span covering one provider round-trip.
///
/// The `outcome` and `error` fields start empty and are filled in by [`FlowSpan::finish`].
#[derive(Clone, Debug)]
pub struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Opens a span for `kind` at call site `stage`.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"oauth2_credentials.flow",
				flow = kind.as_str(),
				stage,
				outcome = tracing::field::Empty,
				error = tracing::field::Empty,
			);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Polls `fut` inside the span; no guard is held across `.await` points.
	pub async fn run<F>(&self, fut: F) -> F::Output
	where
		F: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone()).await
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut.await
		}
	}

	/// Records how the round-trip ended.
	pub fn finish(&self, outcome: FlowOutcome, error: Option<&Error>) {
		#[cfg(feature = "tracing")]
		{
			self.span.record("outcome", outcome.as_str());

			if let Some(error) = error {
				self.span.record("error", tracing::field::display(error));
			}
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (outcome, error);
		}
	}
}

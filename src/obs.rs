//! Optional observability helpers for provider round-trips.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `oauth2_credentials.flow` with the `flow`
//!   (operation) and `stage` (call site) fields, plus `outcome` and `error` once the round-trip
//!   ends.
//! - Enable `metrics` to increment the `oauth2_credentials_flow_total` counter for every
//!   attempt/success/failure, labeled by `flow` + `outcome`, and to record finished round-trips
//!   in the `oauth2_credentials_flow_duration_seconds` histogram.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// std
use std::time::Instant;
// self
use crate::_prelude::*;

/// Provider operations that are instrumented.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Access token refresh, whatever the grant.
	Refresh,
	/// Token revocation.
	Revoke,
	/// Token info lookup for granted scopes.
	TokenInfo,
	/// Authorization code exchange.
	CodeExchange,
	/// Application default credentials discovery.
	Discovery,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::Refresh => "refresh",
			FlowKind::Revoke => "revoke",
			FlowKind::TokenInfo => "token_info",
			FlowKind::CodeExchange => "code_exchange",
			FlowKind::Discovery => "discovery",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to an instrumented operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Runs `fut` inside a [`FlowSpan`] and records attempt, success, and failure counters.
pub(crate) async fn observe<T, F>(kind: FlowKind, stage: &'static str, fut: F) -> Result<T>
where
	F: Future<Output = Result<T>>,
{
	let span = FlowSpan::new(kind, stage);
	let started = Instant::now();

	record_flow_outcome(kind, FlowOutcome::Attempt);

	let result = span.run(fut).await;
	let outcome = if result.is_ok() { FlowOutcome::Success } else { FlowOutcome::Failure };

	span.finish(outcome, result.as_ref().err());
	record_flow_outcome(kind, outcome);
	record_flow_duration(kind, outcome, started.elapsed());

	result
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn labels_are_stable() {
		assert_eq!(FlowKind::TokenInfo.to_string(), "token_info");
		assert_eq!(FlowKind::CodeExchange.as_str(), "code_exchange");
		assert_eq!(FlowOutcome::Failure.to_string(), "failure");
	}

	#[tokio::test]
	async fn observe_returns_the_wrapped_result() {
		let ok = observe(FlowKind::Discovery, "test", async { Ok(7) }).await;

		assert_eq!(ok.expect("Wrapped success should pass through."), 7);

		let err = observe::<(), _>(FlowKind::Revoke, "test", async {
			Err(Error::UnrefreshableCredential)
		})
		.await;

		assert!(matches!(err, Err(Error::UnrefreshableCredential)));
	}
}

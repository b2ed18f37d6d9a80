// std
use std::time::Duration as StdDuration;
// self
use crate::obs::{FlowKind, FlowOutcome};

/// Counter incremented once per attempt, success, and failure.
pub const FLOW_TOTAL: &str = "oauth2_credentials_flow_total";
/// Histogram of completed round-trip durations in seconds.
pub const FLOW_DURATION_SECONDS: &str = "oauth2_credentials_flow_duration_seconds";

/// Increments [`FLOW_TOTAL`] for `kind` and `outcome`. No-op without the `metrics` feature.
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	metrics::counter!(FLOW_TOTAL, "flow" => kind.as_str(), "outcome" => outcome.as_str())
		.increment(1);
	#[cfg(not(feature = "metrics"))]
	let _ = (kind, outcome);
}

/// Records how long a finished round-trip took. No-op without the `metrics` feature.
pub fn record_flow_duration(kind: FlowKind, outcome: FlowOutcome, elapsed: StdDuration) {
	#[cfg(feature = "metrics")]
	metrics::histogram!(
		FLOW_DURATION_SECONDS,
		"flow" => kind.as_str(),
		"outcome" => outcome.as_str()
	)
	.record(elapsed.as_secs_f64());
	#[cfg(not(feature = "metrics"))]
	let _ = (kind, outcome, elapsed);
}

// self
use crate::obs::{GuardStage, RequestOutcome};

/// Records a guard outcome via the global metrics recorder (when enabled).
pub fn record_request_outcome(stage: GuardStage, outcome: RequestOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"csrf_guard_request_total",
			"stage" => stage.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (stage, outcome);
	}
}

//! Optional observability helpers for the request guard.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `csrf_guard.request` with the `stage` (guard
//!   component) and `op` (call site) fields, plus non-fatal diagnostic warnings.
//! - Enable `metrics` to increment the `csrf_guard_request_total` counter for every
//!   attempt/success/failure, labeled by `stage` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Guard components observed by spans and counters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GuardStage {
	/// The wrapped primary request.
	Request,
	/// Token carrier lookup.
	TokenLookup,
	/// Secondary session validity probe.
	SessionProbe,
	/// Proactive session extension call.
	KeepAlive,
}
impl GuardStage {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			GuardStage::Request => "request",
			GuardStage::TokenLookup => "token_lookup",
			GuardStage::SessionProbe => "session_probe",
			GuardStage::KeepAlive => "keep_alive",
		}
	}
}
impl Display for GuardStage {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequestOutcome {
	/// Entry to a guard operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl RequestOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			RequestOutcome::Attempt => "attempt",
			RequestOutcome::Success => "success",
			RequestOutcome::Failure => "failure",
		}
	}
}
impl Display for RequestOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

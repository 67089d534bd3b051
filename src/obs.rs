//! Optional observability helpers for the dispatcher and credential sources.
//!
//! # Feature Flags
//!
//! - Enable `tracing` (on by default) to emit spans named `shurl_client.dispatch` with the
//!   `stage`, `method`, and `path` fields, plus warning events whenever a credential cannot be
//!   obtained or a session is given up.
//! - Enable `metrics` to increment the `shurl_client_stage_total` counter for every
//!   attempt/success/failure, labeled by `stage` + `outcome`.
//!
//! Bearer credentials and refresh tokens never appear in span fields or events.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Pipeline stages observed by the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
	/// A logical request passing through the dispatcher.
	Dispatch,
	/// The refresh-then-resend pass after a `401`.
	Retry,
	/// A token endpoint exchange performed by a credential source.
	Refresh,
}
impl Stage {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Stage::Dispatch => "dispatch",
			Stage::Retry => "retry",
			Stage::Refresh => "refresh",
		}
	}
}
impl Display for Stage {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StageOutcome {
	/// Entry to a stage.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl StageOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			StageOutcome::Attempt => "attempt",
			StageOutcome::Success => "success",
			StageOutcome::Failure => "failure",
		}
	}
}
impl Display for StageOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

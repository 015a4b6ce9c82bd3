//! Result reporter: turns a [`RunResult`] into a summary and an exit code.
//!
//! [`report`] is pure. Printing the rendered text, or writing the JSON form to
//! disk, is left to the caller.

use serde::{Deserialize, Serialize};

use crate::error::DispatchError;
use crate::outcome::{FailureKind, RunResult, RunStatus};

/// Exit code for a cancelled run or selection (128 + SIGINT).
pub const EXIT_CANCELLED: i32 = 130;

/// Exit code for an unknown profile or unrecognized selection.
pub const EXIT_UNKNOWN_PROFILE: i32 = 2;

/// Exit code for setup failures: bad configuration, invalid matrix, I/O.
pub const EXIT_SETUP: i32 = 3;

/// One failed target as shown in the summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedTarget {
    pub triple: String,
    pub export_name: String,
    pub failure: Option<FailureKind>,
    pub diagnostic: String,
    pub attempts: u32,
}

/// Aggregate view of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub profile: String,
    pub status: RunStatus,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,

    /// Failed targets in matrix order.
    pub failures: Vec<FailedTarget>,

    pub duration_ms: u64,
    pub exit_code: i32,
}

/// Summarize a run.
pub fn report(result: &RunResult) -> Summary {
    let failures: Vec<FailedTarget> = result
        .outcomes
        .iter()
        .filter(|o| !o.is_success())
        .map(|o| FailedTarget {
            triple: o.target.triple.to_string(),
            export_name: o.target.export_name.to_string(),
            failure: o.failure,
            diagnostic: o.diagnostic.clone().unwrap_or_default(),
            attempts: o.attempts,
        })
        .collect();

    Summary {
        profile: result.profile.clone(),
        status: result.status,
        total: result.outcomes.len(),
        succeeded: result.outcomes.len() - failures.len(),
        failed: failures.len(),
        failures,
        duration_ms: result.duration_ms,
        exit_code: result.status.exit_code(),
    }
}

/// Exit code for a run that never produced a [`RunResult`].
pub fn exit_code_for_error(err: &DispatchError) -> i32 {
    match err {
        DispatchError::UnknownProfile(_) | DispatchError::UnrecognizedSelection(_) => {
            EXIT_UNKNOWN_PROFILE
        }
        DispatchError::Cancelled { .. } => EXIT_CANCELLED,
        DispatchError::Io(_) => EXIT_SETUP,
    }
}

impl Summary {
    /// Human-readable report.
    pub fn render_text(&self) -> String {
        let status = match self.status {
            RunStatus::AllSucceeded => "✓ ALL SUCCEEDED",
            RunStatus::PartialFailure => "✗ PARTIAL FAILURE",
            RunStatus::AllFailed => "✗ ALL FAILED",
        };

        let mut out = format!("Profile: {}\n", self.profile);
        out.push_str(&format!("Status: {status}\n"));
        out.push_str(&format!("Duration: {}ms\n", self.duration_ms));
        out.push_str(&format!(
            "Summary: {}/{} targets succeeded\n",
            self.succeeded, self.total
        ));

        if !self.failures.is_empty() {
            out.push_str("Failed targets:\n");
            for failure in &self.failures {
                let kind = match failure.failure {
                    Some(FailureKind::Compile) => "compile",
                    Some(FailureKind::Export) => "export",
                    Some(FailureKind::Timeout) => "timeout",
                    Some(FailureKind::Cancelled) => "cancelled",
                    None => "unknown",
                };
                out.push_str(&format!(
                    "  - {} ({}) [{}]: {}",
                    failure.triple, failure.export_name, kind, failure.diagnostic
                ));
                if failure.attempts > 1 {
                    out.push_str(&format!(" after {} attempts", failure.attempts));
                }
                out.push('\n');
            }
        }

        out
    }
}

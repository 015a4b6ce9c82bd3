//! Per-target outcomes and the aggregated run result.

use serde::{Deserialize, Serialize};

use crate::matrix::TargetSpec;

/// Diagnostic recorded when a target exceeds its wall-clock budget.
pub const TIMEOUT_DIAGNOSTIC: &str = "timeout";

/// Diagnostic recorded when an in-flight target is aborted by cancellation.
pub const CANCELLED_DIAGNOSTIC: &str = "cancelled";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Succeeded,
    Failed,
}

/// Step at which a target failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Compile,
    Export,
    Timeout,
    Cancelled,
}

/// Result of building and exporting one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildOutcome {
    pub target: TargetSpec,
    pub status: OutcomeStatus,

    /// Collaborator diagnostic, `"timeout"` or `"cancelled"` on failure.
    pub diagnostic: Option<String>,

    pub failure: Option<FailureKind>,

    /// Wall-clock duration of the final attempt in milliseconds.
    pub duration_ms: u64,

    /// Number of times the target was executed (1 unless retried).
    pub attempts: u32,
}

impl BuildOutcome {
    pub fn succeeded(target: TargetSpec, duration_ms: u64) -> Self {
        Self {
            target,
            status: OutcomeStatus::Succeeded,
            diagnostic: None,
            failure: None,
            duration_ms,
            attempts: 1,
        }
    }

    pub fn failed(
        target: TargetSpec,
        kind: FailureKind,
        diagnostic: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        Self {
            target,
            status: OutcomeStatus::Failed,
            diagnostic: Some(diagnostic.into()),
            failure: Some(kind),
            duration_ms,
            attempts: 1,
        }
    }

    pub fn timed_out(target: TargetSpec, duration_ms: u64) -> Self {
        Self::failed(target, FailureKind::Timeout, TIMEOUT_DIAGNOSTIC, duration_ms)
    }

    pub fn cancelled(target: TargetSpec, duration_ms: u64) -> Self {
        Self::failed(
            target,
            FailureKind::Cancelled,
            CANCELLED_DIAGNOSTIC,
            duration_ms,
        )
    }

    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Succeeded
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    AllSucceeded,
    PartialFailure,
    AllFailed,
}

impl RunStatus {
    /// Aggregate per-target outcomes.
    ///
    /// An empty slice counts as `AllSucceeded`; profiles cannot be empty, so
    /// this only arises for hand-built results.
    pub fn from_outcomes(outcomes: &[BuildOutcome]) -> Self {
        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
        if succeeded == outcomes.len() {
            RunStatus::AllSucceeded
        } else if succeeded == 0 {
            RunStatus::AllFailed
        } else {
            RunStatus::PartialFailure
        }
    }

    /// Process exit code: 0, 1 or 2.
    pub fn exit_code(self) -> i32 {
        match self {
            RunStatus::AllSucceeded => 0,
            RunStatus::PartialFailure => 1,
            RunStatus::AllFailed => 2,
        }
    }
}

/// Ordered outcomes of one profile run, one per target in matrix order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    pub profile: String,
    pub outcomes: Vec<BuildOutcome>,
    pub status: RunStatus,
    pub duration_ms: u64,
}

impl RunResult {
    pub fn new(profile: impl Into<String>, outcomes: Vec<BuildOutcome>, duration_ms: u64) -> Self {
        let status = RunStatus::from_outcomes(&outcomes);
        Self {
            profile: profile.into(),
            outcomes,
            status,
            duration_ms,
        }
    }

    pub fn succeeded_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.len() - self.succeeded_count()
    }
}

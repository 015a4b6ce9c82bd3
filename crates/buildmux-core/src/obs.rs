//! Structured observability hooks for the dispatch lifecycle.
//!
//! This module provides:
//! - A run-scoped tracing span via [`run_span`]
//! - Emission functions for key lifecycle events: run start, target start/finish,
//!   retry, run finish and cancellation
//!
//! Events are emitted at `info!` level except retries and cancellation, which
//! are `warn!`. Filtering follows `RUST_LOG` (see [`crate::telemetry`]).

use tracing::{info, warn};

use crate::coordinator::Parallelism;
use crate::matrix::{BuildProfile, TargetSpec};
use crate::outcome::{BuildOutcome, RunResult};

/// Span tagged with the profile id. Attach with `tracing::Instrument`.
///
/// # Example
///
/// ```ignore
/// coordinator.run("global").instrument(run_span("global")).await
/// ```
pub fn run_span(profile_id: &str) -> tracing::Span {
    tracing::info_span!("buildmux.run", profile = %profile_id)
}

/// Emit event: run started for a profile.
pub fn emit_run_started(profile: &BuildProfile, parallelism: Parallelism) {
    let digest = profile.digest();
    info!(
        event = "run.started",
        profile = %profile.id(),
        profile_digest = %&digest[..12],
        targets = profile.targets().len(),
        jobs = parallelism.jobs(),
    );
}

/// Emit event: a target entered the executor.
pub fn emit_target_started(target: &TargetSpec) {
    info!(
        event = "target.started",
        triple = %target.triple,
        export_name = %target.export_name,
    );
}

/// Emit event: a target left the executor.
pub fn emit_target_finished(outcome: &BuildOutcome) {
    info!(
        event = "target.finished",
        triple = %outcome.target.triple,
        export_name = %outcome.target.export_name,
        success = outcome.is_success(),
        duration_ms = outcome.duration_ms,
        diagnostic = outcome.diagnostic.as_deref().unwrap_or(""),
    );
}

/// Emit event: a failed target is being executed again (warning level).
pub fn emit_target_retry(outcome: &BuildOutcome, next_attempt: u32) {
    warn!(
        event = "target.retry",
        triple = %outcome.target.triple,
        next_attempt = next_attempt,
        diagnostic = outcome.diagnostic.as_deref().unwrap_or(""),
    );
}

/// Emit event: run finished with aggregate counts.
pub fn emit_run_finished(result: &RunResult) {
    info!(
        event = "run.finished",
        profile = %result.profile,
        status = ?result.status,
        succeeded = result.succeeded_count(),
        failed = result.failed_count(),
        duration_ms = result.duration_ms,
    );
}

/// Emit event: run cancelled before every target completed (warning level).
pub fn emit_run_cancelled(profile_id: &str, completed: usize, total: usize) {
    warn!(
        event = "run.cancelled",
        profile = %profile_id,
        completed = completed,
        total = total,
    );
}

//! Run coordination: resolve a profile, drive the executor per target and
//! aggregate the outcomes.
//!
//! Targets are isolated from each other: a failing target never prevents the
//! remaining ones from being attempted. Outcomes always come back in matrix
//! order, whether targets run sequentially or under bounded parallelism.

use std::num::NonZeroUsize;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, Instrument};

use crate::error::{DispatchError, Result};
use crate::executor::{elapsed_ms, BuildExecutor};
use crate::matrix::{BuildProfile, TargetMatrix, TargetSpec};
use crate::obs;
use crate::outcome::{BuildOutcome, FailureKind, RunResult};

/// How many targets may execute at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Parallelism {
    /// One target at a time, in matrix order.
    #[default]
    Sequential,
    /// Up to `n` targets at a time.
    Bounded(NonZeroUsize),
}

impl Parallelism {
    /// `0` and `1` both mean sequential.
    pub fn from_jobs(jobs: usize) -> Self {
        match NonZeroUsize::new(jobs) {
            Some(n) if n.get() > 1 => Parallelism::Bounded(n),
            _ => Parallelism::Sequential,
        }
    }

    pub fn jobs(self) -> usize {
        match self {
            Parallelism::Sequential => 1,
            Parallelism::Bounded(n) => n.get(),
        }
    }
}

/// What happens to in-flight targets once a run is cancelled.
///
/// Either way, no new target starts after cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelPolicy {
    /// Let in-flight targets finish.
    #[default]
    Drain,
    /// Drop in-flight targets and record them as cancelled.
    Abort,
}

impl FromStr for CancelPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "drain" => Ok(CancelPolicy::Drain),
            "abort" => Ok(CancelPolicy::Abort),
            other => Err(format!(
                "unknown cancel policy {other:?} (expected \"drain\" or \"abort\")"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CoordinatorConfig {
    pub parallelism: Parallelism,

    /// Extra attempts for a failed target. `0` means one attempt per target.
    pub retries: u32,

    pub cancel_policy: CancelPolicy,
}

/// Cloneable cancellation signal shared between a run and its caller.
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Default for CancelToken {
    fn default() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called on any clone.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        let closed = rx.wait_for(|cancelled| *cancelled).await.is_err();
        if closed {
            // Sender lives as long as any token clone; unreachable in practice.
            std::future::pending::<()>().await;
        }
    }
}

/// Drives the build executor over every target of a profile.
pub struct RunCoordinator {
    matrix: Arc<TargetMatrix>,
    executor: BuildExecutor,
    config: CoordinatorConfig,
}

impl RunCoordinator {
    pub fn new(matrix: Arc<TargetMatrix>, executor: BuildExecutor, config: CoordinatorConfig) -> Self {
        Self {
            matrix,
            executor,
            config,
        }
    }

    /// Run every target of `profile_id` and aggregate the outcomes.
    ///
    /// Fails only with [`DispatchError::UnknownProfile`]; per-target failures
    /// are reported inside the [`RunResult`].
    pub async fn run(&self, profile_id: &str) -> Result<RunResult> {
        self.run_with_cancel(profile_id, &CancelToken::new()).await
    }

    /// Like [`run`](Self::run), but stops starting targets once `cancel` fires.
    ///
    /// A cancelled run returns [`DispatchError::Cancelled`] unless every target
    /// had already completed.
    pub async fn run_with_cancel(&self, profile_id: &str, cancel: &CancelToken) -> Result<RunResult> {
        let profile = self.matrix.lookup(profile_id)?;

        async {
            obs::emit_run_started(profile, self.config.parallelism);
            let start = Instant::now();

            let slots = match self.config.parallelism {
                Parallelism::Sequential => self.run_sequential(profile, cancel).await,
                Parallelism::Bounded(jobs) => self.run_bounded(profile, jobs, cancel).await,
            };

            let total = profile.targets().len();
            let interrupted = slots.len() < total
                || slots
                    .iter()
                    .any(|o| o.failure == Some(FailureKind::Cancelled));
            if interrupted {
                let completed = slots
                    .iter()
                    .filter(|o| o.failure != Some(FailureKind::Cancelled))
                    .count();
                obs::emit_run_cancelled(profile.id(), completed, total);
                return Err(DispatchError::Cancelled { completed, total });
            }

            let result = RunResult::new(profile.id(), slots, elapsed_ms(start));
            obs::emit_run_finished(&result);
            Ok(result)
        }
        .instrument(obs::run_span(profile.id()))
        .await
    }

    async fn run_sequential(&self, profile: &BuildProfile, cancel: &CancelToken) -> Vec<BuildOutcome> {
        let mut outcomes = Vec::with_capacity(profile.targets().len());
        for target in profile.targets() {
            match run_target(&self.executor, target, self.config, cancel).await {
                Some(outcome) => outcomes.push(outcome),
                None => break,
            }
        }
        outcomes
    }

    /// Returns outcomes in matrix order; targets that never started are omitted.
    ///
    /// Tasks live in a [`JoinSet`], so dropping the run future aborts every
    /// target that has not finished, including those still waiting for a permit.
    async fn run_bounded(
        &self,
        profile: &BuildProfile,
        jobs: NonZeroUsize,
        cancel: &CancelToken,
    ) -> Vec<BuildOutcome> {
        // Semaphore enforces the worker cap
        let sem = Arc::new(Semaphore::new(jobs.get()));
        let span = tracing::Span::current();
        let mut tasks = JoinSet::new();

        for (index, target) in profile.targets().iter().cloned().enumerate() {
            let sem = Arc::clone(&sem);
            let executor = self.executor.clone();
            let cancel = cancel.clone();
            let config = self.config;

            tasks.spawn(
                async move {
                    let _permit = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return (index, None),
                        permit = sem.acquire_owned() => match permit {
                            Ok(permit) => permit,
                            Err(_) => return (index, None),
                        },
                    };
                    (index, run_target(&executor, &target, config, &cancel).await)
                }
                .instrument(span.clone()),
            );
        }

        // Completion order is arbitrary; slots restore matrix order.
        let mut slots: Vec<Option<BuildOutcome>> = vec![None; profile.targets().len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, outcome)) => slots[index] = outcome,
                Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                Err(e) => debug!(error = %e, "target task was cancelled by the runtime"),
            }
        }
        slots.into_iter().flatten().collect()
    }
}

/// Execute one target with retries, honoring cancellation.
///
/// Returns `None` when the run was cancelled before the target started.
async fn run_target(
    executor: &BuildExecutor,
    target: &TargetSpec,
    config: CoordinatorConfig,
    cancel: &CancelToken,
) -> Option<BuildOutcome> {
    if cancel.is_cancelled() {
        return None;
    }

    match config.cancel_policy {
        CancelPolicy::Drain => Some(attempt_with_retries(executor, target, config.retries, cancel).await),
        CancelPolicy::Abort => {
            let start = Instant::now();
            tokio::select! {
                biased;
                outcome = attempt_with_retries(executor, target, config.retries, cancel) => Some(outcome),
                _ = cancel.cancelled() => Some(BuildOutcome::cancelled(target.clone(), elapsed_ms(start))),
            }
        }
    }
}

async fn attempt_with_retries(
    executor: &BuildExecutor,
    target: &TargetSpec,
    retries: u32,
    cancel: &CancelToken,
) -> BuildOutcome {
    let mut attempts = 1;
    loop {
        let outcome = executor.execute(target).await;
        if outcome.is_success() || attempts > retries || cancel.is_cancelled() {
            return outcome.with_attempts(attempts);
        }
        attempts += 1;
        obs::emit_target_retry(&outcome, attempts);
    }
}

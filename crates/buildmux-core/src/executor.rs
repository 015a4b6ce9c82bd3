//! Build executor: compile then export one target, capturing every failure.
//!
//! The toolchain and the exporter are collaborators behind
//! [`ToolchainInvoker`] and [`ArtifactExporter`]. `buildmux-cargo` provides
//! process-backed implementations and [`crate::fakes`] deterministic ones.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::matrix::{CompilerTriple, ExportName, TargetSpec};
use crate::obs;
use crate::outcome::{BuildOutcome, FailureKind};

/// Default per-target wall-clock budget.
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Output of a successful compile. Opaque to the core; only the exporter reads it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Artifact {
    pub triple: Option<CompilerTriple>,
    pub files: Vec<PathBuf>,
}

impl Artifact {
    pub fn new(triple: CompilerTriple, files: Vec<PathBuf>) -> Self {
        Self {
            triple: Some(triple),
            files,
        }
    }
}

/// Compiles the workspace for one target triple.
#[async_trait]
pub trait ToolchainInvoker: Send + Sync {
    /// Returns the produced artifact, or a diagnostic describing the failure.
    async fn compile(&self, triple: &CompilerTriple) -> Result<Artifact, String>;
}

/// Publishes a compiled artifact under its export name.
#[async_trait]
pub trait ArtifactExporter: Send + Sync {
    async fn export(&self, name: &ExportName, artifact: &Artifact) -> Result<(), String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Budget covering compile plus export.
    pub timeout: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl ExecutorConfig {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

/// Runs one target through its collaborators.
///
/// Cheap to clone; collaborators are shared behind `Arc`.
#[derive(Clone)]
pub struct BuildExecutor {
    toolchain: Arc<dyn ToolchainInvoker>,
    exporter: Arc<dyn ArtifactExporter>,
    config: ExecutorConfig,
}

impl BuildExecutor {
    pub fn new(
        toolchain: Arc<dyn ToolchainInvoker>,
        exporter: Arc<dyn ArtifactExporter>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            toolchain,
            exporter,
            config,
        }
    }

    /// Build and export `target`. Never fails: errors and timeouts become a
    /// `Failed` outcome.
    ///
    /// Dropping the returned future abandons the in-flight collaborator call.
    pub async fn execute(&self, target: &TargetSpec) -> BuildOutcome {
        let start = Instant::now();
        obs::emit_target_started(target);

        let outcome = match tokio::time::timeout(self.config.timeout, self.build_and_export(target))
            .await
        {
            Ok(Ok(())) => BuildOutcome::succeeded(target.clone(), elapsed_ms(start)),
            Ok(Err((kind, diagnostic))) => {
                BuildOutcome::failed(target.clone(), kind, diagnostic, elapsed_ms(start))
            }
            Err(_) => BuildOutcome::timed_out(target.clone(), elapsed_ms(start)),
        };

        obs::emit_target_finished(&outcome);
        outcome
    }

    async fn build_and_export(&self, target: &TargetSpec) -> Result<(), (FailureKind, String)> {
        let artifact = self
            .toolchain
            .compile(&target.triple)
            .await
            .map_err(|diagnostic| (FailureKind::Compile, diagnostic))?;

        self.exporter
            .export(&target.export_name, &artifact)
            .await
            .map_err(|diagnostic| (FailureKind::Export, diagnostic))
    }
}

pub(crate) fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

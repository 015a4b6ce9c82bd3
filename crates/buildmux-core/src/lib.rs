//! buildmux Core Library
//!
//! Target-matrix build dispatcher:
//! - [`matrix`]: profiles of (target triple, export name) pairs
//! - [`executor`]: compile + export one target, failures captured as data
//! - [`coordinator`]: run a whole profile, sequentially or with bounded parallelism
//! - [`selection`]: interactive/non-interactive profile selection
//! - [`reporter`]: summary and exit code for a finished run

pub mod coordinator;
pub mod error;
pub mod executor;
pub mod fakes;
pub mod matrix;
pub mod obs;
pub mod outcome;
pub mod reporter;
pub mod selection;
pub mod telemetry;

pub use coordinator::{CancelPolicy, CancelToken, CoordinatorConfig, Parallelism, RunCoordinator};
pub use error::{DispatchError, MatrixError, Result};
pub use executor::{
    Artifact, ArtifactExporter, BuildExecutor, ExecutorConfig, ToolchainInvoker,
    DEFAULT_TIMEOUT_SECS,
};
pub use matrix::{BuildProfile, CompilerTriple, ExportName, TargetMatrix, TargetSpec};
pub use outcome::{BuildOutcome, FailureKind, OutcomeStatus, RunResult, RunStatus};
pub use reporter::{
    exit_code_for_error, report, FailedTarget, Summary, EXIT_CANCELLED, EXIT_SETUP,
    EXIT_UNKNOWN_PROFILE,
};
pub use selection::{menu, prompt_profile, select_profile};
pub use telemetry::init_tracing;

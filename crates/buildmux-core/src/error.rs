//! Error taxonomy for the dispatcher core.
//!
//! Only control-flow signals live here. A single target failing to build or
//! export is not an error: it is recorded as data in a
//! [`BuildOutcome`](crate::outcome::BuildOutcome).

/// Errors raised while assembling a [`TargetMatrix`](crate::matrix::TargetMatrix).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatrixError {
    #[error("invalid target triple: {0:?}")]
    InvalidTriple(String),

    #[error("invalid export name: {0:?}")]
    InvalidExportName(String),

    #[error("invalid profile id: {0:?}")]
    InvalidProfileId(String),

    #[error("profile {profile} declares export name {export_name} more than once")]
    DuplicateExportName {
        profile: String,
        export_name: String,
    },

    #[error("profile {0} is registered more than once")]
    DuplicateProfile(String),

    #[error("profile {0} has no targets")]
    EmptyProfile(String),

    #[error("profile {profile}: {triples} triple(s) but {export_names} export name(s)")]
    LengthMismatch {
        profile: String,
        triples: usize,
        export_names: usize,
    },
}

/// Errors that abort or prevent a dispatch run.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("unknown profile: {0}")]
    UnknownProfile(String),

    #[error("unrecognized selection: {0:?}")]
    UnrecognizedSelection(String),

    #[error("cancelled ({completed} of {total} target(s) completed)")]
    Cancelled { completed: usize, total: usize },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DispatchError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DispatchError::Cancelled { .. })
    }
}

/// Result type for dispatcher operations.
pub type Result<T> = std::result::Result<T, DispatchError>;

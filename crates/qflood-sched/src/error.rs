//! Error handling for job orchestration.

use qflood_linalg::LinalgError;
use thiserror::Error;

use crate::job::JobStatus;

/// Result type for scheduler operations.
pub type SchedResult<T> = Result<T, SchedError>;

/// Errors surfaced by the job manager and its collaborators.
///
/// Solver failures are not errors at this level: they are recorded on the
/// job as failed attempts. These variants cover lookups, illegal status
/// changes, configuration and artifact I/O.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SchedError {
    /// Job not found in the registry.
    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// A status change the state machine does not allow.
    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    /// The job was cancelled before the next stage could start.
    #[error("Job cancelled: {0}")]
    Cancelled(String),

    /// A wait gave up before the job settled.
    #[error("Timed out waiting for job {0}")]
    Timeout(String),

    /// Configuration failed to load or validate.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An artifact could not be stored or loaded.
    #[error("Artifact error: {0}")]
    Artifact(String),

    /// Matrix or vector construction/decoding failed.
    #[error("Array error: {0}")]
    Linalg(#[from] LinalgError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML configuration parse error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

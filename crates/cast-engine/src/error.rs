//! Error taxonomy for the reconciliation engine.
//!
//! `ConfigError` and `LockBusy` are fatal and abort an operation before any
//! write happens. Every other variant is recorded per-file or per-id in a
//! [`crate::orchestrator::SyncReport`] rather than propagated as `Err`.

use std::path::PathBuf;
use thiserror::Error;

use crate::identity::DocId;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid or missing vault configuration at {path}: {reason}")]
    ConfigError { path: PathBuf, reason: String },

    #[error("could not acquire sync lock at {path} within {timeout_secs}s")]
    LockBusy { path: PathBuf, timeout_secs: u64 },

    #[error("malformed frontmatter in {path}: {reason}")]
    MalformedFrontmatter { path: PathBuf, reason: String },

    #[error("duplicate identifier {doc_id} found in {paths:?}")]
    DuplicateIdentifier { doc_id: DocId, paths: Vec<PathBuf> },

    #[error("write failed for {path}: {reason}")]
    WriteFailure { path: PathBuf, reason: String },

    #[error("merge left unresolved conflict markers in {path}")]
    MergeUnresolved { path: PathBuf },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;

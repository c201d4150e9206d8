//! Orchestrator-specific error types

use shared::{SharedError, SubjectId, UnitKey};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Malformed source {path}: {reason}")]
    MalformedSource { path: PathBuf, reason: String },

    #[error("Variant generation failed for {subject} ({mechanism}): {reason}")]
    GenerationFailure {
        subject: SubjectId,
        mechanism: String,
        reason: String,
    },

    #[error("No auxiliary file found for subject {subject} (variant {path})")]
    UnmatchedUnit { subject: SubjectId, path: PathBuf },

    #[error("Analysis failed for {key}: {reason}")]
    AnalysisFailure { key: UnitKey, reason: String },

    #[error("Configuration error: {field}")]
    ConfigurationError { field: String },

    #[error("File system operation failed: {operation} on {path}: {source}")]
    FileSystemError {
        operation: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Shared component error: {0}")]
    SharedError(#[from] SharedError),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Task join error: {0}")]
    JoinError(#[from] tokio::task::JoinError),
}

impl OrchestratorError {
    pub fn config(field: impl Into<String>) -> Self {
        Self::ConfigurationError { field: field.into() }
    }

    pub fn generation(subject: &SubjectId, mechanism: impl ToString, reason: impl Into<String>) -> Self {
        Self::GenerationFailure {
            subject: subject.clone(),
            mechanism: mechanism.to_string(),
            reason: reason.into(),
        }
    }

    pub fn malformed(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        Self::MalformedSource {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }

    pub fn file_system(operation: impl Into<String>, path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::FileSystemError {
            operation: operation.into(),
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

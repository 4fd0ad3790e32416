//! Application-wide error types.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::pipeline::Stage;
use crate::storage::StorageError;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure category a job outcome is reported under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No admission slot was free.
    Busy,
    /// The request itself was malformed; nothing was processed.
    ClientInput,
    /// An external stage process failed.
    Stage,
    /// Remote object storage failed.
    Storage,
    /// Anything else.
    Internal,
}

/// Application-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Service busy: {active}/{max} slots in use")]
    Busy { active: usize, max: usize },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid S3 URI: {0}")]
    InvalidObjectRef(String),

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("{stage} failed{}: {stderr}", .exit_code.map(|c| format!(" with code {c}")).unwrap_or_default())]
    StageFailed {
        stage: Stage,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("{stage} could not be run: {source}")]
    StageSpawn {
        stage: Stage,
        #[source]
        source: std::io::Error,
    },

    #[error("{stage} timed out after {secs}s")]
    StageTimeout { stage: Stage, secs: u64 },

    #[error("{stage} input artifact is missing: {}", .path.display())]
    MissingArtifact { stage: Stage, path: PathBuf },

    #[error("S3 error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error while {op} {}: {source}", .path.display())]
    IoPath {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn io_path(op: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::IoPath {
            op,
            path: path.to_path_buf(),
            source,
        }
    }

    /// Classify this error into the category it is reported under.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Busy { .. } => ErrorKind::Busy,
            Error::Validation(_)
            | Error::InvalidObjectRef(_)
            | Error::UnsupportedMediaType(_) => ErrorKind::ClientInput,
            Error::StageFailed { .. } | Error::StageSpawn { .. } | Error::StageTimeout { .. } => {
                ErrorKind::Stage
            }
            Error::Storage(_) => ErrorKind::Storage,
            Error::MissingArtifact { .. }
            | Error::Configuration(_)
            | Error::IoPath { .. }
            | Error::Io(_)
            | Error::Other(_) => ErrorKind::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_message_reports_slots() {
        let err = Error::Busy { active: 4, max: 4 };
        assert_eq!(err.to_string(), "Service busy: 4/4 slots in use");
        assert_eq!(err.kind(), ErrorKind::Busy);
    }

    #[test]
    fn stage_failure_includes_code_and_stderr() {
        let err = Error::StageFailed {
            stage: Stage::Denoise,
            exit_code: Some(1),
            stderr: "failed to open input file".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("with code 1"));
        assert!(msg.contains("failed to open input file"));
        assert_eq!(err.kind(), ErrorKind::Stage);
    }

    #[test]
    fn signal_death_has_no_code() {
        let err = Error::StageFailed {
            stage: Stage::Encode,
            exit_code: None,
            stderr: String::new(),
        };
        assert!(!err.to_string().contains("with code"));
    }

    #[test]
    fn storage_is_distinct_from_stage() {
        let err: Error = StorageError::Fetch {
            uri: "s3://bucket/key".to_string(),
            message: "timeout".to_string(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Storage);
        assert!(err.to_string().starts_with("S3 error:"));
    }

    #[test]
    fn client_errors_are_classified() {
        assert_eq!(
            Error::InvalidObjectRef("x".into()).kind(),
            ErrorKind::ClientInput
        );
        assert_eq!(Error::validation("empty").kind(), ErrorKind::ClientInput);
        assert_eq!(
            Error::UnsupportedMediaType("text/plain".into()).kind(),
            ErrorKind::ClientInput
        );
    }

    #[test]
    fn io_path_carries_context() {
        let err = Error::io_path(
            "writing",
            Path::new("/tmp/x"),
            std::io::Error::other("disk full"),
        );
        assert!(err.to_string().contains("writing /tmp/x"));
        assert_eq!(err.kind(), ErrorKind::Internal);
    }
}

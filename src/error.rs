use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failures reported by the host editor surface.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("Editor has been disposed")]
    EditorDisposed,

    #[error("Document not found: {}", .0.display())]
    DocumentNotFound(PathBuf),

    #[error("Host command failed: {0}")]
    CommandFailed(String),
}

#[derive(Debug, Error)]
pub enum EditError {
    #[error("IO error on {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Diff editor for {} did not open within {:?}", .path.display(), .timeout)]
    Timeout { path: PathBuf, timeout: Duration },

    #[error("Diff editor for {} was closed while the edit was in progress", .path.display())]
    EditorClosed { path: PathBuf },

    #[error("Invalid edit state: {0}")]
    InvalidState(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Host error: {0}")]
    Host(#[from] HostError),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl EditError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        EditError::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the failure is one the retry loop in the file gateway should absorb.
    pub fn is_transient(&self) -> bool {
        match self {
            EditError::Io { source, .. } => matches!(
                source.kind(),
                io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted | io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for EditError {
    fn from(err: serde_json::Error) -> Self {
        EditError::Serialization(err.to_string())
    }
}

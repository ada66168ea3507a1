//! Error types for tool execution.
//!
//! Handlers return `ToolError`; the dispatcher never lets one escape. It
//! converts every failure into a structured error envelope for the caller.

use serde::{Deserialize, Serialize};

/// Error categories surfaced to the language model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    BadRequest,
    NotFound,
    PermissionDenied,
    Conflict,
    Unsupported,
    Timeout,
    WorkerFailure,
    Degraded,
    QualityCompromised,
    Transient,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "BadRequest",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::PermissionDenied => "PermissionDenied",
            ErrorKind::Conflict => "Conflict",
            ErrorKind::Unsupported => "Unsupported",
            ErrorKind::Timeout => "Timeout",
            ErrorKind::WorkerFailure => "WorkerFailure",
            ErrorKind::Degraded => "Degraded",
            ErrorKind::QualityCompromised => "QualityCompromised",
            ErrorKind::Transient => "Transient",
            ErrorKind::Internal => "Internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed failure raised by tool handlers and the services behind them.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ToolError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    PermissionDenied(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Unsupported(String),
    #[error("{0}")]
    Timeout(String),
    #[error("{0}")]
    WorkerFailure(String),
    #[error("{0}")]
    Degraded(String),
    #[error("{0}")]
    QualityCompromised(String),
    #[error("{0}")]
    Transient(String),
    #[error("{0}")]
    Internal(String),
}

pub type ToolResult<T> = std::result::Result<T, ToolError>;

impl ToolError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ToolError::BadRequest(_) => ErrorKind::BadRequest,
            ToolError::NotFound(_) => ErrorKind::NotFound,
            ToolError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            ToolError::Conflict(_) => ErrorKind::Conflict,
            ToolError::Unsupported(_) => ErrorKind::Unsupported,
            ToolError::Timeout(_) => ErrorKind::Timeout,
            ToolError::WorkerFailure(_) => ErrorKind::WorkerFailure,
            ToolError::Degraded(_) => ErrorKind::Degraded,
            ToolError::QualityCompromised(_) => ErrorKind::QualityCompromised,
            ToolError::Transient(_) => ErrorKind::Transient,
            ToolError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ToolError::BadRequest(m)
            | ToolError::NotFound(m)
            | ToolError::PermissionDenied(m)
            | ToolError::Conflict(m)
            | ToolError::Unsupported(m)
            | ToolError::Timeout(m)
            | ToolError::WorkerFailure(m)
            | ToolError::Degraded(m)
            | ToolError::QualityCompromised(m)
            | ToolError::Transient(m)
            | ToolError::Internal(m) => m,
        }
    }

    /// Only network-level failures are retried, and only inside the tool.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ToolError::Transient(_))
    }

    /// True when the failure needs a user gesture before a retry can work.
    pub fn needs_user_activation(&self) -> bool {
        matches!(self, ToolError::PermissionDenied(m) if m.to_lowercase().contains("user activation"))
    }

    /// Short remediation hint attached to error envelopes.
    pub fn user_hint(&self) -> Option<&'static str> {
        match self {
            ToolError::NotFound(_) => Some("Verify the path with get_project_structure."),
            ToolError::PermissionDenied(_) => {
                Some("Ask the user to grant access to the workspace, then retry.")
            }
            ToolError::Conflict(_) => {
                Some("Re-read the file with line numbers and retry with its current content.")
            }
            ToolError::Timeout(_) => Some("Retry with a smaller input or a longer deadline."),
            _ => None,
        }
    }

    pub fn from_io(err: std::io::Error, path: &str) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => ToolError::NotFound(format!("File not found: {}", path)),
            std::io::ErrorKind::PermissionDenied => {
                ToolError::PermissionDenied(format!("Permission denied for {}: {}", path, err))
            }
            std::io::ErrorKind::AlreadyExists => {
                ToolError::Conflict(format!("Path already exists: {}", path))
            }
            _ => ToolError::Internal(format!("I/O error on {}: {}", path, err)),
        }
    }
}

impl From<anyhow::Error> for ToolError {
    fn from(err: anyhow::Error) -> Self {
        ToolError::Internal(format!("{:#}", err))
    }
}

impl From<serde_json::Error> for ToolError {
    fn from(err: serde_json::Error) -> Self {
        ToolError::BadRequest(format!("Invalid JSON: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_and_message() {
        let err = ToolError::Conflict("search content does not match".to_string());
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(err.message(), "search content does not match");
        assert_eq!(err.to_string(), "search content does not match");
    }

    #[test]
    fn test_only_transient_is_retryable() {
        assert!(ToolError::Transient("503".into()).is_retryable());
        assert!(!ToolError::BadRequest("missing".into()).is_retryable());
        assert!(!ToolError::Unsupported("js only".into()).is_retryable());
    }

    #[test]
    fn test_user_activation_detection() {
        let err = ToolError::PermissionDenied("User activation required to write".into());
        assert!(err.needs_user_activation());
        let err = ToolError::PermissionDenied("read-only file".into());
        assert!(!err.needs_user_activation());
    }

    #[test]
    fn test_from_io_not_found() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = ToolError::from_io(io, "src/a.rs");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.message().contains("src/a.rs"));
    }
}

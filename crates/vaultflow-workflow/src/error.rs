//! Error types for the workflow engine.

use std::path::PathBuf;

use vaultflow_core::error::VaultflowError;
use vaultflow_core::Folder;

/// Errors raised by record IO, folder moves and plan execution.
///
/// Admission, transport and parsing failures of individual steps are not
/// errors; they are reported as [`crate::types::StepResult`]s.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Record not found: {0}")]
    NotFound(PathBuf),
    #[error("Could not lock {path} within {timeout_ms} ms")]
    LockTimeout { path: PathBuf, timeout_ms: u64 },
    #[error("Malformed frontmatter in {path}: {reason}")]
    Frontmatter { path: PathBuf, reason: String },
    #[error("Invalid folder transition: {0} -> {1}")]
    InvalidTransition(Folder, Folder),
    #[error("Path is not inside a vault folder: {0}")]
    OutsideVault(PathBuf),
    #[error("Plan {0} not approved (missing approved_at timestamp)")]
    NotApproved(String),
    #[error("Watcher {0} cannot start while its circuit breaker is open")]
    WatcherCircuitOpen(String),
    #[error("Another instance already holds {0}")]
    AlreadyRunning(PathBuf),
    #[error("Inbound mail source failed: {0}")]
    MailSource(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Core(#[from] VaultflowError),
}

/// A specialized `Result` type for workflow operations.
pub type Result<T> = std::result::Result<T, WorkflowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workflow_error_display() {
        let err = WorkflowError::NotFound(PathBuf::from("/vault/Inbox/a.md"));
        assert_eq!(err.to_string(), "Record not found: /vault/Inbox/a.md");

        let err = WorkflowError::LockTimeout {
            path: PathBuf::from("a.md"),
            timeout_ms: 5000,
        };
        assert_eq!(err.to_string(), "Could not lock a.md within 5000 ms");

        let err = WorkflowError::InvalidTransition(Folder::Done, Folder::Approved);
        assert_eq!(err.to_string(), "Invalid folder transition: Done -> Approved");

        let err = WorkflowError::NotApproved("20260101-task".to_string());
        assert_eq!(
            err.to_string(),
            "Plan 20260101-task not approved (missing approved_at timestamp)"
        );
    }

    #[test]
    fn test_vault_and_watcher_error_display() {
        let err = WorkflowError::Frontmatter {
            path: PathBuf::from("a.md"),
            reason: "not a mapping".to_string(),
        };
        assert_eq!(err.to_string(), "Malformed frontmatter in a.md: not a mapping");

        let err = WorkflowError::OutsideVault(PathBuf::from("/tmp/a.md"));
        assert_eq!(err.to_string(), "Path is not inside a vault folder: /tmp/a.md");

        let err = WorkflowError::WatcherCircuitOpen("inbox_watcher".to_string());
        assert_eq!(
            err.to_string(),
            "Watcher inbox_watcher cannot start while its circuit breaker is open"
        );

        let err = WorkflowError::AlreadyRunning(PathBuf::from(".vaultflow.lock"));
        assert_eq!(err.to_string(), "Another instance already holds .vaultflow.lock");
    }

    #[test]
    fn test_workflow_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: WorkflowError = io_err.into();
        assert!(matches!(err, WorkflowError::Io(_)));
        assert!(err.to_string().contains("denied"));
    }

    #[test]
    fn test_workflow_error_from_core() {
        let core = VaultflowError::Config("bad".to_string());
        let err: WorkflowError = core.into();
        assert!(matches!(err, WorkflowError::Core(_)));
        assert_eq!(err.to_string(), "Configuration error: bad");
    }
}

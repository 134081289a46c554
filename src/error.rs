//! Error types for account operations.

use crate::planner::StepKind;
use thiserror::Error;

/// Result type alias using [`UsermuxError`].
pub type Result<T> = std::result::Result<T, UsermuxError>;

/// Errors that can occur during account operations.
///
/// The first nine variants are the engine's error taxonomy: every backend
/// maps its native failures onto them so the planner, executor, and callers
/// see identical errors on every platform. The remaining variants carry
/// ambient failures (I/O, JSON, unrecognized subprocess exits).
///
/// All errors implement `std::error::Error` and can be chained with `source()`.
#[derive(Debug, Error)]
pub enum UsermuxError {
    /// Account already exists (cannot create a duplicate).
    #[error("account already exists: {0}")]
    AlreadyExists(String),

    /// Account was not found.
    #[error("account not found: {0}")]
    NotFound(String),

    /// The caller lacks the privilege for the operation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Username is empty, too long, or contains characters the account
    /// store (or a shell boundary) would misinterpret.
    #[error("invalid username: {0}")]
    InvalidName(String),

    /// Credential rejected before reaching any backend (e.g. empty).
    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    /// The backend refused the operation on policy grounds (password
    /// complexity rules, capabilities the platform does not offer).
    #[error("rejected by backend policy: {0}")]
    PolicyRejected(String),

    /// Home directory path exists when it must not, is missing when it
    /// must exist, or is not safe to touch.
    #[error("home directory conflict: {0}")]
    PathConflict(String),

    /// Account is in use (e.g. an active login session) and cannot be removed.
    #[error("account in use: {0}")]
    AccountInUse(String),

    /// The adapter cannot reach the OS account facility at all
    /// (required tool missing, wrong platform).
    #[error("account backend unavailable: {0}")]
    BackendUnavailable(String),

    /// A compensating action failed during rollback. Secondary: only ever
    /// reported alongside the primary failure that triggered the unwind.
    #[error("compensation for {step} failed: {source}")]
    CompensationFailed {
        /// Step whose compensation could not be applied
        step: StepKind,
        /// Why the compensation failed
        #[source]
        source: Box<UsermuxError>,
    },

    /// Backend operation failed with context.
    #[error("{backend}: {operation} {username}: {source}")]
    BackendOperation {
        /// Backend name
        backend: String,
        /// Operation name (create, delete, set-credential, ...)
        operation: String,
        /// Account the operation targeted
        username: String,
        /// Underlying error
        #[source]
        source: Box<UsermuxError>,
    },

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON deserialization error (PowerShell output decoding).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Subprocess exited with a status the backend could not map onto the
    /// taxonomy above.
    #[error("{program} exited with status {code}: {stderr}")]
    CommandFailed {
        /// Program that was executed
        program: String,
        /// Exit code (-1 when terminated by signal or timed out)
        code: i32,
        /// Captured standard error, trimmed
        stderr: String,
    },

    /// Other error (catch-all).
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl UsermuxError {
    /// Creates a backend operation error with context.
    ///
    /// Wraps an underlying error with the backend, operation, and account
    /// that caused the failure.
    ///
    /// # Example
    ///
    /// ```
    /// use usermux::UsermuxError;
    ///
    /// let err = UsermuxError::NotFound("alice".to_string());
    /// let wrapped = UsermuxError::backend_op("posix", "delete", "alice", err);
    ///
    /// assert_eq!(
    ///     wrapped.to_string(),
    ///     "posix: delete alice: account not found: alice"
    /// );
    /// ```
    pub fn backend_op(
        backend: impl Into<String>,
        operation: impl Into<String>,
        username: impl Into<String>,
        err: UsermuxError,
    ) -> Self {
        Self::BackendOperation {
            backend: backend.into(),
            operation: operation.into(),
            username: username.into(),
            source: Box::new(err),
        }
    }

    /// Wraps an error as the failure of a compensating action.
    pub fn compensation(step: StepKind, err: UsermuxError) -> Self {
        Self::CompensationFailed {
            step,
            source: Box::new(err),
        }
    }

    /// True for errors the planner raises before any backend mutation
    /// (fail-fast existence checks and credential validation).
    pub fn is_planning_rejection(&self) -> bool {
        matches!(
            self,
            Self::AlreadyExists(_)
                | Self::NotFound(_)
                | Self::InvalidName(_)
                | Self::InvalidCredential(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_error_display() {
        let err = UsermuxError::NotFound("deploy".to_string());
        assert_eq!(err.to_string(), "account not found: deploy");
    }

    #[test]
    fn test_backend_operation_error() {
        let inner = UsermuxError::AccountInUse("alice".to_string());
        let err = UsermuxError::backend_op("posix", "delete", "alice", inner);

        let error_string = err.to_string();
        assert!(error_string.contains("posix"));
        assert!(error_string.contains("delete"));
        assert!(error_string.contains("alice"));
    }

    #[test]
    fn test_error_source_chain() {
        let inner = UsermuxError::NotFound("bob".to_string());
        let outer = UsermuxError::backend_op("winlocal", "lookup", "bob", inner);

        assert!(outer.source().is_some());
    }

    #[test]
    fn test_compensation_failed_chains_source() {
        let inner = UsermuxError::PermissionDenied("userdel".to_string());
        let err = UsermuxError::compensation(StepKind::EnsurePresent, inner);

        assert!(err.to_string().contains("compensation"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_planning_rejection_classification() {
        assert!(UsermuxError::AlreadyExists("a".into()).is_planning_rejection());
        assert!(UsermuxError::InvalidCredential("empty".into()).is_planning_rejection());
        assert!(!UsermuxError::PathConflict("/home/a".into()).is_planning_rejection());
    }
}

//! Engine error type.
//!
//! Every component returns [`Error`]; the binder and engine propagate it
//! unchanged. [`Error::kind`] gives the outward API layer a stable category
//! to map to its own responses without matching on variants.

use std::fmt;
use std::time::Duration;

use thiserror::Error;
use viewsync_git::GitError;

use crate::executor::RepoKey;
use crate::model::{ValidationError, ViewId};
use crate::store::StoreError;

/// Engine result alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced by the synchronization engine.
#[derive(Debug, Error)]
pub enum Error {
    /// A referenced record, branch or snapshot object does not exist.
    #[error("{kind} {id:?} not found")]
    NotFound {
        /// What was looked up (`"view"`, `"workspace branch"`, ...).
        kind: &'static str,
        /// The identifier that was looked up.
        id: String,
    },

    /// The exclusive lock was not acquired before the caller's deadline.
    /// Nothing was run.
    #[error("timed out after {waited:?} waiting for the lock on {key}")]
    LockTimeout { key: RepoKey, waited: Duration },

    /// The caller cancelled while queued for the lock. Nothing was run.
    #[error("cancelled while waiting for the lock on {key}")]
    Cancelled { key: RepoKey },

    /// A version-control primitive failed.
    #[error("{context}: {source}")]
    VersionControl {
        /// What the engine was doing.
        context: String,
        #[source]
        source: GitError,
    },

    /// A destructive primitive was requested on a handle scheduled without
    /// `allow_rebasing`.
    #[error("destructive operation {operation:?} denied on {key}: not scheduled with allow_rebasing")]
    DestructiveOperationDenied {
        key: RepoKey,
        operation: &'static str,
    },

    /// An identifier was malformed.
    #[error(transparent)]
    InvalidIdentifier(#[from] ValidationError),

    /// A view and a workspace from different codebases were combined.
    #[error("{what} belongs to codebase {actual}, expected {expected}")]
    CodebaseMismatch {
        what: String,
        expected: String,
        actual: String,
    },

    /// The view's working tree no longer matches its record, after a switch
    /// that failed and could not be rolled back. Re-opening the bound
    /// workspace repairs it.
    #[error("view {view} is out of sync with its record: {reason}")]
    ViewOutOfSync { view: ViewId, reason: String },

    /// The record store failed.
    #[error("store: {0}")]
    Store(StoreError),
}

/// Stable error categories for callers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    LockTimeout,
    Cancelled,
    VersionControlFailure,
    DestructiveOperationDenied,
    InvalidArgument,
    FailedPrecondition,
    Store,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotFound => "not_found",
            Self::LockTimeout => "lock_timeout",
            Self::Cancelled => "cancelled",
            Self::VersionControlFailure => "version_control_failure",
            Self::DestructiveOperationDenied => "destructive_operation_denied",
            Self::InvalidArgument => "invalid_argument",
            Self::FailedPrecondition => "failed_precondition",
            Self::Store => "store",
        };
        f.write_str(s)
    }
}

impl Error {
    /// The error's category.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::LockTimeout { .. } => ErrorKind::LockTimeout,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::VersionControl { .. } => ErrorKind::VersionControlFailure,
            Self::DestructiveOperationDenied { .. } => ErrorKind::DestructiveOperationDenied,
            Self::InvalidIdentifier(_) | Self::CodebaseMismatch { .. } => {
                ErrorKind::InvalidArgument
            }
            Self::ViewOutOfSync { .. } => ErrorKind::FailedPrecondition,
            Self::Store(_) => ErrorKind::Store,
        }
    }

    /// `true` when retrying the same call cannot have been affected by a
    /// partial state change.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::LockTimeout { .. } | Self::Cancelled { .. })
    }

    pub(crate) fn not_found(kind: &'static str, id: impl fmt::Display) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub(crate) fn git(context: impl Into<String>, source: GitError) -> Self {
        Self::VersionControl {
            context: context.into(),
            source,
        }
    }
}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { kind, id } => Self::NotFound { kind, id },
            other => Self::Store(other),
        }
    }
}

/// Attach engine context to a git result.
pub(crate) trait GitContext<T> {
    fn vcs(self, context: impl FnOnce() -> String) -> Result<T>;
}

impl<T, E: Into<GitError>> GitContext<T> for std::result::Result<T, E> {
    fn vcs(self, context: impl FnOnce() -> String) -> Result<T> {
        self.map_err(|source| Error::git(context(), source.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CodebaseId;

    fn key() -> RepoKey {
        RepoKey::View(CodebaseId::new("cb").unwrap(), ViewId::new("v1").unwrap())
    }

    #[test]
    fn kinds_and_retryability() {
        let timeout = Error::LockTimeout {
            key: key(),
            waited: Duration::from_millis(10),
        };
        assert_eq!(timeout.kind(), ErrorKind::LockTimeout);
        assert!(timeout.is_retryable());

        let denied = Error::DestructiveOperationDenied {
            key: key(),
            operation: "reset_hard",
        };
        assert_eq!(denied.kind(), ErrorKind::DestructiveOperationDenied);
        assert!(!denied.is_retryable());

        let missing = Error::not_found("view", "v9");
        assert_eq!(missing.kind(), ErrorKind::NotFound);
        assert_eq!(missing.to_string(), "view \"v9\" not found");
    }

    #[test]
    fn store_not_found_maps_to_not_found() {
        let err: Error = StoreError::NotFound {
            kind: "workspace",
            id: "ws".to_owned(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn version_control_keeps_source() {
        let err = Err::<(), _>(GitError::NotFound {
            message: "ref".to_owned(),
        })
        .vcs(|| "checking out ws".to_owned())
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::VersionControlFailure);
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().starts_with("checking out ws: "));
    }

    #[test]
    fn vcs_accepts_errors_convertible_to_git_errors() {
        let err = viewsync_git::RefName::new("not a ref")
            .vcs(|| "naming snapshot".to_owned())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::VersionControlFailure);
        assert!(matches!(
            err,
            Error::VersionControl {
                source: GitError::InvalidRefName { .. },
                ..
            }
        ));
    }

    #[test]
    fn out_of_sync_is_a_failed_precondition() {
        let err = Error::ViewOutOfSync {
            view: ViewId::new("v1").unwrap(),
            reason: "interrupted switch".to_owned(),
        };
        assert_eq!(err.kind(), ErrorKind::FailedPrecondition);
        assert!(!err.is_retryable());
    }

    #[test]
    fn invalid_identifier_is_invalid_argument() {
        let err: Error = ViewId::new("trunk").unwrap_err().into();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
}

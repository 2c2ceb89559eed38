//! The one error type of the git layer.
//!
//! Variants are specific enough that callers can tell a missing object from
//! a failed command without parsing messages.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GitError {
    /// A requested object, ref or repository does not exist.
    #[error("not found: {message}")]
    NotFound { message: String },

    #[error("invalid OID `{value}`: {reason}")]
    InvalidOid { value: String, reason: String },

    #[error("invalid ref name `{value}`: {reason}")]
    InvalidRefName { value: String, reason: String },

    /// A `git` subprocess exited unsuccessfully. `stderr` is trimmed.
    #[error("`{command}` failed{}: {stderr}", exit_suffix(.exit_code))]
    CommandFailed {
        command: String,
        stderr: String,
        exit_code: Option<i32>,
    },

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// gix reported something that fits no other variant.
    #[error("git backend error: {message}")]
    BackendError { message: String },
}

fn exit_suffix(code: &Option<i32>) -> String {
    code.map(|c| format!(" (exit code {c})")).unwrap_or_default()
}

impl GitError {
    pub(crate) fn backend(message: impl std::fmt::Display) -> Self {
        Self::BackendError {
            message: message.to_string(),
        }
    }
}

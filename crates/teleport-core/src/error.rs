//! Error types for `tctl` operations.
//!
//! Every crate in the workspace reports failures through [`Error`]. Process failures carry the
//! command line that was run so callers can surface it verbatim.

use thiserror::Error;

/// Main error type for Teleport adapter operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// `tctl` exited with a non-zero status under the fail-hard policy
    #[error("Command '{command}' failed{}", detail_suffix(.detail))]
    CommandFailed {
        /// Command line that was executed
        command: String,
        /// Text from the configured error channel (may be empty)
        detail: String,
    },

    /// The process could not be spawned or awaited
    #[error("Failed to execute '{command}': {message}")]
    SpawnFailed {
        /// Command line that was attempted
        command: String,
        /// Underlying I/O failure
        message: String,
    },

    /// The `tctl` binary is not available on this host
    #[error("{0}")]
    ToolUnavailable(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Token cache could not be read or written
    #[error("Token cache error: {0}")]
    CacheError(String),

    /// Exclusive lock on a state file could not be taken
    #[error("Lock error: {0}")]
    LockError(String),

    /// Node enrollment produced no usable token
    #[error("Enrollment failed: {0}")]
    EnrollmentFailed(String),
}

/// Specialized result type for Teleport adapter operations.
pub type Result<T> = std::result::Result<T, Error>;

fn detail_suffix(detail: &str) -> String {
    if detail.is_empty() {
        String::new()
    } else {
        format!(": {detail}")
    }
}

impl Error {
    /// Builds the fail-hard error for a command that exited non-zero.
    #[must_use]
    pub fn command_failed(command: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::CommandFailed {
            command: command.into(),
            detail: detail.into(),
        }
    }

    /// Returns the error code for this error type.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::CommandFailed { .. } => "COMMAND_FAILED",
            Self::SpawnFailed { .. } => "SPAWN_FAILED",
            Self::ToolUnavailable(_) => "TOOL_UNAVAILABLE",
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::CacheError(_) => "CACHE_ERROR",
            Self::LockError(_) => "LOCK_ERROR",
            Self::EnrollmentFailed(_) => "ENROLLMENT_FAILED",
        }
    }

    /// Returns true if this error should be logged as a serious error.
    #[must_use]
    pub const fn should_log(&self) -> bool {
        matches!(
            self,
            Self::SpawnFailed { .. } | Self::ConfigError(_) | Self::LockError(_)
        )
    }
}

// Conversions from external error types
impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Self::CacheError(err.to_string())
    }
}

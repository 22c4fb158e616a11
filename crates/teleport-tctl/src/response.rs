//! Uniform result shaping for every `tctl` wrapper.

use serde::{Deserialize, Serialize};

use crate::runner::CommandOutcome;
use crate::Result;
use teleport_core::Error;

/// Per-call execution policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallOptions {
    /// Raise on non-zero exit instead of returning the raw outcome.
    #[serde(default = "default_failhard")]
    pub failhard: bool,
    /// Log non-zero exits quietly.
    #[serde(default)]
    pub ignore_retcode: bool,
    /// Merge stderr into stdout; stdout then becomes the error text source.
    #[serde(default)]
    pub redirect_stderr: bool,
    /// Attach the raw outcome to successful responses.
    #[serde(default)]
    pub debug: bool,
}

const fn default_failhard() -> bool {
    true
}

impl CallOptions {
    /// Default policy: fail hard, no redirection, no debug output.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            failhard: default_failhard(),
            ignore_retcode: false,
            redirect_stderr: false,
            debug: false,
        }
    }

    /// Sets the fail-hard policy.
    #[must_use]
    pub const fn with_failhard(mut self, failhard: bool) -> Self {
        self.failhard = failhard;
        self
    }

    /// Sets the retcode logging policy.
    #[must_use]
    pub const fn with_ignore_retcode(mut self, ignore: bool) -> Self {
        self.ignore_retcode = ignore;
        self
    }

    /// Sets stderr redirection.
    #[must_use]
    pub const fn with_redirect_stderr(mut self, redirect: bool) -> Self {
        self.redirect_stderr = redirect;
        self
    }

    /// Sets debug output.
    #[must_use]
    pub const fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

impl Default for CallOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of a wrapped `tctl` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TctlResponse<T> {
    /// Exit code zero.
    Success {
        /// Parsed records.
        #[serde(flatten)]
        data: T,
        /// Raw outcome, only when debug output was requested.
        #[serde(skip_serializing_if = "Option::is_none")]
        debug: Option<CommandOutcome>,
    },
    /// Non-zero exit under a non-fail-hard policy.
    Failure {
        /// Raw process outcome.
        #[serde(flatten)]
        outcome: CommandOutcome,
        /// Always false.
        result: bool,
    },
}

impl<T> TctlResponse<T> {
    /// Returns true for a zero exit.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Parsed records of a successful call.
    #[must_use]
    pub const fn data(&self) -> Option<&T> {
        match self {
            Self::Success { data, .. } => Some(data),
            Self::Failure { .. } => None,
        }
    }

    /// Consumes the response, returning the parsed records of a successful call.
    #[must_use]
    pub fn into_data(self) -> Option<T> {
        match self {
            Self::Success { data, .. } => Some(data),
            Self::Failure { .. } => None,
        }
    }

    /// Raw outcome: the debug attachment on success, the failure itself otherwise.
    #[must_use]
    pub const fn outcome(&self) -> Option<&CommandOutcome> {
        match self {
            Self::Success { debug, .. } => debug.as_ref(),
            Self::Failure { outcome, .. } => Some(outcome),
        }
    }
}

/// Shapes a finished command into a response according to `options`.
///
/// `parse` only sees stdout of a successful run; a failing run is never parsed.
///
/// # Errors
///
/// Returns [`Error::CommandFailed`] for a non-zero exit when `options.failhard` is set.
pub fn build<T, F>(
    command: &str,
    outcome: CommandOutcome,
    options: CallOptions,
    parse: F,
) -> Result<TctlResponse<T>>
where
    F: FnOnce(&str) -> T,
{
    if outcome.succeeded() {
        let data = parse(&outcome.stdout);
        let debug = options.debug.then_some(outcome);
        return Ok(TctlResponse::Success { data, debug });
    }

    if options.failhard {
        let detail = if options.redirect_stderr {
            outcome.stdout
        } else {
            outcome.stderr
        };
        return Err(Error::command_failed(command, detail));
    }

    Ok(TctlResponse::Failure {
        outcome,
        result: false,
    })
}

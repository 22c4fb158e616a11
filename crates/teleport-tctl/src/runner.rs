//! Process execution for `tctl` invocations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::ffi::CString;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::Result;
use teleport_core::{Error, TctlConfig};

/// Exit status and captured output of a finished process.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CommandOutcome {
    /// Process exit code (`-1` when terminated by a signal).
    #[serde(rename = "retcode")]
    pub exit_code: i32,
    /// Captured standard output, trailing whitespace removed.
    pub stdout: String,
    /// Captured standard error, trailing whitespace removed.
    pub stderr: String,
}

impl CommandOutcome {
    /// Creates an outcome from its parts.
    #[must_use]
    pub fn new(exit_code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    /// Returns true when the process exited with status zero.
    #[must_use]
    pub const fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

/// A single `tctl` invocation with its execution context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    /// Program to run.
    pub program: String,
    /// Literal argument tokens; never interpreted by a shell.
    pub args: Vec<String>,
    /// Working directory of the child.
    pub working_dir: PathBuf,
    /// User the child must run as.
    pub run_as: Option<String>,
    /// Log non-zero exits at debug level instead of warn.
    pub ignore_retcode: bool,
    /// Fold standard error into standard output.
    pub merge_stderr: bool,
}

impl CommandRequest {
    /// Creates a request for `program args...` using the configured directory and user.
    #[must_use]
    pub fn new<I, S>(config: &TctlConfig, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: config.binary.clone(),
            args: args.into_iter().map(Into::into).collect(),
            working_dir: config.working_dir.clone(),
            run_as: config.run_as.clone(),
            ignore_retcode: false,
            merge_stderr: false,
        }
    }

    /// Sets the non-zero exit logging policy.
    #[must_use]
    pub const fn with_ignore_retcode(mut self, ignore: bool) -> Self {
        self.ignore_retcode = ignore;
        self
    }

    /// Sets whether stderr is folded into stdout.
    #[must_use]
    pub const fn with_merge_stderr(mut self, merge: bool) -> Self {
        self.merge_stderr = merge;
        self
    }

    /// The command line as reported in logs and errors.
    #[must_use]
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Returns true when `run_as` names a user other than the effective one.
    ///
    /// The name is resolved through the passwd database; an unknown user always needs a switch.
    #[must_use]
    pub fn needs_user_switch(&self) -> bool {
        self.run_as
            .as_deref()
            .is_some_and(|user| !is_current_user(user))
    }

    /// Program and arguments to spawn, wrapped in `sudo` when a user switch is required.
    #[must_use]
    pub fn argv(&self, switch_user: bool) -> (String, Vec<String>) {
        match &self.run_as {
            Some(user) if switch_user => {
                let mut args = vec![
                    "-n".to_string(),
                    "-u".to_string(),
                    user.clone(),
                    "--".to_string(),
                    self.program.clone(),
                ];
                args.extend(self.args.iter().cloned());
                ("sudo".to_string(), args)
            }
            _ => (self.program.clone(), self.args.clone()),
        }
    }
}

/// Executes commands and captures their output.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs the request to completion.
    ///
    /// A non-zero exit is not an error at this level; only failing to spawn the process is.
    async fn run(&self, request: &CommandRequest) -> Result<CommandOutcome>;
}

/// Runner that spawns real processes with `tokio::process`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl ProcessRunner {
    /// Creates a new runner.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, request: &CommandRequest) -> Result<CommandOutcome> {
        let command_line = request.command_line();
        let (program, args) = request.argv(request.needs_user_switch());
        debug!(command = %command_line, cwd = %request.working_dir.display(), "running tctl");

        let output = Command::new(&program)
            .args(&args)
            .current_dir(&request.working_dir)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|err| Error::SpawnFailed {
                command: command_line.clone(),
                message: err.to_string(),
            })?;

        let mut stdout = String::from_utf8_lossy(&output.stdout).trim_end().to_string();
        let mut stderr = String::from_utf8_lossy(&output.stderr).trim_end().to_string();
        if request.merge_stderr && !stderr.is_empty() {
            if !stdout.is_empty() {
                stdout.push('\n');
            }
            stdout.push_str(&stderr);
            stderr.clear();
        }

        let outcome = CommandOutcome {
            exit_code: output.status.code().unwrap_or(-1),
            stdout,
            stderr,
        };

        if !outcome.succeeded() {
            if request.ignore_retcode {
                debug!(command = %command_line, retcode = outcome.exit_code, "command exited non-zero");
            } else {
                warn!(command = %command_line, retcode = outcome.exit_code, "command exited non-zero");
            }
        }

        Ok(outcome)
    }
}

fn is_current_user(user: &str) -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail.
    let euid = unsafe { libc::geteuid() };
    lookup_uid(user) == Some(euid)
}

/// Resolves a login name to its uid through the passwd database.
fn lookup_uid(user: &str) -> Option<libc::uid_t> {
    let name = CString::new(user).ok()?;
    let mut buf: Vec<libc::c_char> = vec![0; 1024];
    loop {
        // SAFETY: an all-zero passwd is a valid out-parameter.
        let mut entry: libc::passwd = unsafe { std::mem::zeroed() };
        let mut found: *mut libc::passwd = std::ptr::null_mut();
        // SAFETY: every pointer is valid for the call and `buf.len()` bounds the buffer.
        let ret = unsafe {
            libc::getpwnam_r(
                name.as_ptr(),
                &mut entry,
                buf.as_mut_ptr(),
                buf.len(),
                &mut found,
            )
        };
        if ret == libc::ERANGE && buf.len() < 1 << 20 {
            buf.resize(buf.len() * 2, 0);
            continue;
        }
        return (ret == 0 && !found.is_null()).then_some(entry.pw_uid);
    }
}

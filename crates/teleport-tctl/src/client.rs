//! `tctl` client: one method per wrapped subcommand.

use chrono::Utc;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::models::{
    InviteResult, NodeList, TokenList, UserAddResult, UserDeleteResult, UserList, Version,
};
use crate::parser;
use crate::response::{self, CallOptions, TctlResponse};
use crate::runner::{CommandRequest, CommandRunner, ProcessRunner};
use crate::Result;
use teleport_core::{Error, TctlConfig};

/// Reason reported when the `tctl` binary cannot be found.
pub const UNAVAILABLE_MESSAGE: &str =
    "The tctl execution module cannot be loaded: tctl unavailable.";

/// Client for the Teleport `tctl` tool with a pluggable command runner.
pub struct TctlClient {
    config: Arc<TctlConfig>,
    runner: Box<dyn CommandRunner>,
}

impl TctlClient {
    /// Creates a client that spawns real processes.
    #[must_use]
    pub fn new(config: TctlConfig) -> Self {
        Self::with_runner(config, Box::new(ProcessRunner::new()))
    }

    /// Creates a client that executes through `runner`.
    #[must_use]
    pub fn with_runner(config: TctlConfig, runner: Box<dyn CommandRunner>) -> Self {
        Self {
            config: Arc::new(config),
            runner,
        }
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &TctlConfig {
        &self.config
    }

    /// Resolves the configured binary, searching `PATH` for bare names.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ToolUnavailable`] when no executable is found.
    pub fn locate_binary(&self) -> Result<PathBuf> {
        let binary = Path::new(&self.config.binary);
        let found = if binary.components().count() > 1 {
            is_executable(binary).then(|| binary.to_path_buf())
        } else {
            std::env::var_os("PATH").and_then(|paths| {
                std::env::split_paths(&paths)
                    .map(|dir| dir.join(binary))
                    .find(|candidate| is_executable(candidate))
            })
        };
        found.ok_or_else(|| Error::ToolUnavailable(UNAVAILABLE_MESSAGE.to_string()))
    }

    /// `tctl version`.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned, or if it fails under `failhard`.
    pub async fn version(&self, options: CallOptions) -> Result<TctlResponse<Version>> {
        self.execute(vec!["version".to_string()], options, |stdout| Version {
            version: stdout.trim().to_string(),
        })
        .await
    }

    /// `tctl nodes add --roles=<roles> --ttl=<ttl>`.
    ///
    /// Missing arguments fall back to the configured defaults. The expiry is anchored to the
    /// moment the output is parsed.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned, or if it fails under `failhard`.
    pub async fn nodes_add(
        &self,
        roles: Option<&str>,
        ttl: Option<&str>,
        options: CallOptions,
    ) -> Result<TctlResponse<InviteResult>> {
        let roles = roles.unwrap_or(self.config.default_roles.as_str()).to_string();
        let ttl = ttl.unwrap_or(self.config.default_ttl.as_str());
        debug!("teleport - tctl nodes add --roles={roles} --ttl={ttl}");

        let args = vec![
            "nodes".to_string(),
            "add".to_string(),
            format!("--roles={roles}"),
            format!("--ttl={ttl}"),
        ];
        self.execute(args, options, move |stdout| {
            parser::parse_invite(stdout, Utc::now(), &roles)
        })
        .await
    }

    /// `tctl nodes ls`.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned, or if it fails under `failhard`.
    pub async fn nodes_list(&self, options: CallOptions) -> Result<TctlResponse<NodeList>> {
        self.execute(list_args("nodes"), options, |stdout| NodeList {
            nodes: parser::parse_nodes(stdout),
        })
        .await
    }

    /// `tctl tokens ls`.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned, or if it fails under `failhard`.
    pub async fn tokens_list(&self, options: CallOptions) -> Result<TctlResponse<TokenList>> {
        self.execute(list_args("tokens"), options, |stdout| TokenList {
            tokens: parser::parse_tokens(stdout),
        })
        .await
    }

    /// `tctl users add <login> [local_logins]`.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned, or if it fails under `failhard`.
    pub async fn users_add(
        &self,
        login: &str,
        local_logins: Option<&str>,
        options: CallOptions,
    ) -> Result<TctlResponse<UserAddResult>> {
        let mut args = vec!["users".to_string(), "add".to_string(), login.to_string()];
        if let Some(logins) = local_logins {
            args.push(logins.to_string());
        }

        let login = login.to_string();
        let local_logins = local_logins.map(str::to_string);
        self.execute(args, options, move |stdout| {
            let signup = parser::parse_signup(stdout);
            UserAddResult {
                login,
                local_logins,
                expires: signup.expires,
                url: signup.url,
                result: true,
            }
        })
        .await
    }

    /// `tctl users del <login>`.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned, or if it fails under `failhard`.
    pub async fn users_del(
        &self,
        login: &str,
        options: CallOptions,
    ) -> Result<TctlResponse<UserDeleteResult>> {
        let args = vec!["users".to_string(), "del".to_string(), login.to_string()];
        let login = login.to_string();
        self.execute(args, options, move |_| UserDeleteResult {
            login,
            result: true,
        })
        .await
    }

    /// `tctl users ls`.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned, or if it fails under `failhard`.
    pub async fn users_list(&self, options: CallOptions) -> Result<TctlResponse<UserList>> {
        self.execute(list_args("users"), options, |stdout| UserList {
            users: parser::parse_users(stdout),
        })
        .await
    }

    /// Returns true if a user with exactly this login is listed.
    ///
    /// # Errors
    ///
    /// Returns an error if listing users fails.
    pub async fn users_exists(&self, login: &str) -> Result<bool> {
        let listing = self.users_list(CallOptions::new()).await?;
        Ok(listing
            .into_data()
            .is_some_and(|users| users.contains(login)))
    }

    async fn execute<T, F>(
        &self,
        args: Vec<String>,
        options: CallOptions,
        parse: F,
    ) -> Result<TctlResponse<T>>
    where
        F: FnOnce(&str) -> T,
    {
        let request = CommandRequest::new(&self.config, args)
            .with_ignore_retcode(options.ignore_retcode)
            .with_merge_stderr(options.redirect_stderr);
        let command = request.command_line();
        debug!("teleport - {command}");

        let outcome = self.runner.run(&request).await?;
        response::build(&command, outcome, options, parse)
    }
}

fn list_args(resource: &str) -> Vec<String> {
    vec![resource.to_string(), "ls".to_string()]
}

fn is_executable(path: &Path) -> bool {
    path.metadata()
        .is_ok_and(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
}

//! Configuration for invoking `tctl`.
//!
//! This module describes where the `tctl` binary lives, the working directory and user it runs
//! as, and where node enrollment state (join-token cache, node key) is kept on disk.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use validator::{Validate, ValidationError};

/// Default name of the Teleport admin binary.
pub const DEFAULT_BINARY: &str = "tctl";
/// Default working directory for every invocation.
pub const DEFAULT_WORKING_DIR: &str = "/root";
/// Default user every invocation runs as.
pub const DEFAULT_RUN_AS: &str = "root";
/// Default directory holding node enrollment state.
pub const DEFAULT_DATA_DIR: &str = "/var/lib/teleport";

/// Configuration for a `tctl` client instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct TctlConfig {
    /// Binary name or absolute path
    #[validate(length(min = 1))]
    #[serde(default = "default_binary")]
    pub binary: String,

    /// Working directory for the child process
    #[serde(default = "default_working_dir")]
    pub working_dir: PathBuf,

    /// User the child process runs as (`None` keeps the current user)
    #[validate(length(min = 1))]
    #[serde(default = "default_run_as")]
    pub run_as: Option<String>,

    /// Directory holding the token cache and node key
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// File name of the join-token cache inside `data_dir`
    #[validate(length(min = 1))]
    #[serde(default = "default_auth_token_file")]
    pub auth_token_file: String,

    /// File name of the node key inside `data_dir`
    #[validate(length(min = 1))]
    #[serde(default = "default_node_key_file")]
    pub node_key_file: String,

    /// Roles requested for new join tokens
    #[validate(length(min = 1))]
    #[serde(default = "default_roles")]
    pub default_roles: String,

    /// Time to live requested for new join tokens
    #[validate(custom(function = "validate_ttl"))]
    #[serde(default = "default_ttl")]
    pub default_ttl: String,
}

fn default_binary() -> String {
    DEFAULT_BINARY.to_string()
}

fn default_working_dir() -> PathBuf {
    PathBuf::from(DEFAULT_WORKING_DIR)
}

#[allow(clippy::unnecessary_wraps)]
fn default_run_as() -> Option<String> {
    Some(DEFAULT_RUN_AS.to_string())
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(DEFAULT_DATA_DIR)
}

fn default_auth_token_file() -> String {
    "auth_token".to_string()
}

fn default_node_key_file() -> String {
    "node.key".to_string()
}

fn default_roles() -> String {
    "node".to_string()
}

fn default_ttl() -> String {
    "2m".to_string()
}

/// Accepts Go-style durations such as `2m`, `1h`, `1h30m`.
fn validate_ttl(ttl: &str) -> Result<(), ValidationError> {
    let mut digits = 0usize;
    let mut segments = 0usize;
    for ch in ttl.chars() {
        if ch.is_ascii_digit() {
            digits += 1;
        } else if matches!(ch, 'h' | 'm' | 's') && digits > 0 {
            digits = 0;
            segments += 1;
        } else {
            return Err(ValidationError::new("ttl"));
        }
    }
    if segments == 0 || digits > 0 {
        return Err(ValidationError::new("ttl"));
    }
    Ok(())
}

impl TctlConfig {
    /// Create a configuration for the given binary with default paths.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn new(binary: impl Into<String>) -> Result<Self, Error> {
        let config = Self {
            binary: binary.into(),
            ..Self::default()
        };

        config
            .validate()
            .map_err(|e| Error::ConfigError(format!("Invalid configuration: {}", e)))?;

        Ok(config)
    }

    /// Set the working directory.
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    /// Set the user to run as.
    #[must_use]
    pub fn with_run_as(mut self, user: impl Into<String>) -> Self {
        self.run_as = Some(user.into());
        self
    }

    /// Run as the current process user.
    #[must_use]
    pub fn without_run_as(mut self) -> Self {
        self.run_as = None;
        self
    }

    /// Set the node state directory.
    #[must_use]
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// Set the default join-token roles.
    #[must_use]
    pub fn with_default_roles(mut self, roles: impl Into<String>) -> Self {
        self.default_roles = roles.into();
        self
    }

    /// Set the default join-token TTL.
    #[must_use]
    pub fn with_default_ttl(mut self, ttl: impl Into<String>) -> Self {
        self.default_ttl = ttl.into();
        self
    }

    /// Path of the join-token cache file.
    #[must_use]
    pub fn auth_token_path(&self) -> PathBuf {
        self.data_dir.join(&self.auth_token_file)
    }

    /// Path of the node key file.
    #[must_use]
    pub fn node_key_path(&self) -> PathBuf {
        self.data_dir.join(&self.node_key_file)
    }

    /// Directory holding node enrollment state.
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

impl Default for TctlConfig {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            working_dir: default_working_dir(),
            run_as: default_run_as(),
            data_dir: default_data_dir(),
            auth_token_file: default_auth_token_file(),
            node_key_file: default_node_key_file(),
            default_roles: default_roles(),
            default_ttl: default_ttl(),
        }
    }
}

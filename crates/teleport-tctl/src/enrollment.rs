//! Node join-token acquisition.
//!
//! A node about to join the cluster needs a join token minted on an auth server. The token is
//! requested through an [`EnrollmentPublisher`] (typically a fan-out to the auth server's
//! minion) and cached in the node's data directory so repeated runs reuse it.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::cache::TokenCache;
use crate::client::TctlClient;
use crate::models::InviteResult;
use crate::response::CallOptions;
use crate::Result;
use teleport_core::{Error, TctlConfig};

/// How the publish target expression is matched against peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetForm {
    /// Shell-style glob on peer ids.
    #[default]
    Glob,
    /// Regular expression on peer ids.
    Pcre,
    /// Comma-separated list of peer ids.
    List,
    /// Grain match.
    Grain,
    /// Compound matcher.
    Compound,
}

impl TargetForm {
    /// Matcher name as understood by the publish layer.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Glob => "glob",
            Self::Pcre => "pcre",
            Self::List => "list",
            Self::Grain => "grain",
            Self::Compound => "compound",
        }
    }
}

/// Asks remote peers to run `nodes add` and collects their answers.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EnrollmentPublisher: Send + Sync {
    /// Returns the invite produced by each answering peer, keyed by peer id.
    async fn publish_nodes_add(
        &self,
        target: &str,
        form: TargetForm,
        roles: &str,
        ttl: &str,
    ) -> Result<BTreeMap<String, InviteResult>>;
}

/// Publisher that enrolls through a local `tctl`, for hosts that are their own auth server.
pub struct LocalPublisher {
    peer_id: String,
    client: Arc<TctlClient>,
}

impl LocalPublisher {
    /// Creates a publisher answering as `peer_id`.
    #[must_use]
    pub fn new(peer_id: impl Into<String>, client: Arc<TctlClient>) -> Self {
        Self {
            peer_id: peer_id.into(),
            client,
        }
    }
}

#[async_trait]
impl EnrollmentPublisher for LocalPublisher {
    async fn publish_nodes_add(
        &self,
        target: &str,
        form: TargetForm,
        roles: &str,
        ttl: &str,
    ) -> Result<BTreeMap<String, InviteResult>> {
        debug!(publish_target = target, form = form.as_str(), "enrolling through local tctl");
        let response = self
            .client
            .nodes_add(Some(roles), Some(ttl), CallOptions::new())
            .await?;

        let mut answers = BTreeMap::new();
        if let Some(invite) = response.into_data() {
            answers.insert(self.peer_id.clone(), invite);
        }
        Ok(answers)
    }
}

/// Join-token acquisition backed by the on-disk cache.
pub struct NodeEnrollment {
    config: Arc<TctlConfig>,
    publisher: Box<dyn EnrollmentPublisher>,
    cache: TokenCache,
}

impl NodeEnrollment {
    /// Creates an enrollment helper using the cache and node key paths from `config`.
    #[must_use]
    pub fn new(config: TctlConfig, publisher: Box<dyn EnrollmentPublisher>) -> Self {
        let cache = TokenCache::new(config.auth_token_path());
        Self {
            config: Arc::new(config),
            publisher,
            cache,
        }
    }

    /// Token cache in use.
    #[must_use]
    pub const fn cache(&self) -> &TokenCache {
        &self.cache
    }

    /// Returns a join token for this node.
    ///
    /// The cached token is reused while it is unexpired, or indefinitely once the node key
    /// exists (the node has joined and the token only documents how). Otherwise a fresh token is
    /// requested from `target`, one arbitrary answer is kept, written to the cache and returned.
    /// The cache lock is held from the read until the refresh is written, so concurrent callers
    /// sharing a data directory request at most one token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EnrollmentFailed`] if no peer answers with a token, or an error from the
    /// publisher or the cache lock and write.
    pub async fn node_authentication_token(
        &self,
        target: &str,
        roles: Option<&str>,
        ttl: Option<&str>,
        form: TargetForm,
    ) -> Result<String> {
        fs::create_dir_all(self.config.data_dir()).map_err(|err| {
            Error::CacheError(format!(
                "failed to create {}: {err}",
                self.config.data_dir().display()
            ))
        })?;

        // Held until the refreshed token is written.
        let mut guard = self.cache.lock().await?;
        let cached = guard.read().unwrap_or_else(|err| {
            warn!(path = %self.cache.path().display(), "ignoring unreadable token cache: {err}");
            None
        });
        let node_key_present = self.config.node_key_path().exists();

        if let Some(invite) = cached {
            if node_key_present || invite.is_valid_at(Utc::now()) {
                if let Some(token) = invite.token {
                    debug!("reusing cached join token");
                    return Ok(token);
                }
            }
            debug!("cached join token is stale");
        }

        let roles = roles.unwrap_or(self.config.default_roles.as_str());
        let ttl = ttl.unwrap_or(self.config.default_ttl.as_str());
        let answers = self
            .publisher
            .publish_nodes_add(target, form, roles, ttl)
            .await?;
        debug!(peers = answers.len(), "received enrollment answers");

        let invite = answers.into_values().next().ok_or_else(|| {
            Error::EnrollmentFailed(format!("no peer matching `{target}` answered"))
        })?;
        let token = invite.token.clone().ok_or_else(|| {
            Error::EnrollmentFailed("answer did not contain a join token".to_string())
        })?;

        guard.write(&invite)?;
        Ok(token)
    }
}

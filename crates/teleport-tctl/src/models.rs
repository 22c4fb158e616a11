//! Records scraped from `tctl` output.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Join token as listed by `tctl tokens ls`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// 32 lowercase hex characters.
    #[serde(rename = "token")]
    pub value: String,
    /// Roles the token grants.
    #[serde(rename = "role")]
    pub roles: Vec<String>,
    /// Expiry as printed by `tctl`.
    pub expiry: String,
}

/// Cluster node as listed by `tctl nodes ls`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Node host name.
    #[serde(rename = "node_name")]
    pub name: String,
    /// Node identifier.
    #[serde(rename = "node_id")]
    pub id: String,
    /// Advertised address.
    pub address: String,
    /// Labels in listing order.
    pub labels: Vec<String>,
}

/// Cluster user as listed by `tctl users ls`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Teleport login.
    #[serde(rename = "user")]
    pub login: String,
    /// Unix logins the user may assume.
    pub allowed_logins: Vec<String>,
}

/// `tctl version` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    /// Version banner, trimmed.
    pub version: String,
}

/// Token records from `tctl tokens ls`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenList {
    /// Parsed tokens in listing order.
    pub tokens: Vec<Token>,
}

/// Node records from `tctl nodes ls`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NodeList {
    /// Parsed nodes in listing order.
    pub nodes: Vec<Node>,
}

/// User records from `tctl users ls`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserList {
    /// Parsed users in listing order.
    pub users: Vec<User>,
}

impl UserList {
    /// Exact-match lookup by login.
    #[must_use]
    pub fn contains(&self, login: &str) -> bool {
        self.users.iter().any(|user| user.login == login)
    }
}

/// Facts extracted from `tctl nodes add`.
///
/// Every field except `roles` is only present when its line was recognised in the output.
/// This is also the on-disk format of the join-token cache.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InviteResult {
    /// Join token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Human expiry phrase, e.g. `20 minutes`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<String>,
    /// Absolute expiry in epoch seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    /// Suggested join command.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Auth server address taken from the join command.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_server: Option<String>,
    /// Roles the token was requested for.
    #[serde(default)]
    pub roles: Vec<String>,
}

impl InviteResult {
    /// Returns true when `expires_at` is known and not before `now`.
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .is_some_and(|expires_at| expires_at >= now.timestamp())
    }
}

/// Result of `tctl users add`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAddResult {
    /// Login that was added.
    pub login: String,
    /// Local logins requested for the user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_logins: Option<String>,
    /// Signup token validity phrase.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<String>,
    /// Signup URL to hand to the user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Always true for a completed add.
    pub result: bool,
}

/// Result of `tctl users del`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDeleteResult {
    /// Login that was removed.
    pub login: String,
    /// Always true for a completed delete.
    pub result: bool,
}

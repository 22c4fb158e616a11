//! Line grammars for `tctl` text output.
//!
//! `tctl` prints fixed-column tables and banners meant for humans. Each listing grammar matches
//! one record per line; header rows, separator rows, blank lines and anything else that does
//! not fit are dropped without error. If `tctl` changes its column layout, records disappear
//! rather than producing a failure.

use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::OnceLock;

use crate::models::{InviteResult, Node, Token, User};

const SECONDS_PER_MINUTE: i64 = 60;
const SECONDS_PER_HOUR: i64 = 60 * 60;

macro_rules! pattern {
    ($name:ident, $re:expr) => {
        fn $name() -> &'static Regex {
            static RE: OnceLock<Regex> = OnceLock::new();
            RE.get_or_init(|| Regex::new($re).expect(concat!(stringify!($name), " is a valid pattern")))
        }
    };
}

pattern!(token_line, r"^([0-9a-f]{32}) {2,}(\S+) {2,}(\S.*?)\s*$");
pattern!(
    node_line,
    r"^([A-Za-z0-9][\w.-]*) {2,}([A-Za-z0-9][\w.-]*) {2,}([A-Za-z0-9\[][\w.:\[\]-]*)(?: {2,}(\S*))?\s*$"
);
pattern!(user_line, r"^([\w][\w.@+-]*) {2,}(\S+)\s*$");

pattern!(invite_token, r"^The invite token: ([0-9a-f]{32})$");
pattern!(
    invite_expiry,
    r"^  - This invitation token will expire in ([0-9]+) (.*)$"
);
pattern!(invite_command, r"^> (.*)$");
pattern!(invite_auth_server, r".*--auth-server=(.*)$");

pattern!(
    signup_expiry,
    r"^Signup token has been created and is valid for (.*)\. Share this"
);
pattern!(signup_url, r"^https://(.*)$");

/// Facts extracted from `tctl users add`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignupFacts {
    /// Validity phrase, e.g. `1 hours`.
    pub expires: Option<String>,
    /// Signup URL.
    pub url: Option<String>,
}

/// Parses `tctl tokens ls` output.
#[must_use]
pub fn parse_tokens(stdout: &str) -> Vec<Token> {
    stdout
        .lines()
        .filter_map(|line| token_line().captures(line))
        .map(|caps| Token {
            value: caps[1].to_string(),
            roles: split_list(&caps[2]),
            expiry: caps[3].to_string(),
        })
        .collect()
}

/// Parses `tctl nodes ls` output.
#[must_use]
pub fn parse_nodes(stdout: &str) -> Vec<Node> {
    stdout
        .lines()
        .filter_map(|line| node_line().captures(line))
        .map(|caps| Node {
            name: caps[1].to_string(),
            id: caps[2].to_string(),
            address: caps[3].to_string(),
            labels: split_list(caps.get(4).map_or("", |labels| labels.as_str())),
        })
        .collect()
}

/// Parses `tctl users ls` output.
#[must_use]
pub fn parse_users(stdout: &str) -> Vec<User> {
    stdout
        .lines()
        .filter_map(|line| user_line().captures(line))
        .map(|caps| User {
            login: caps[1].to_string(),
            allowed_logins: split_list(&caps[2]),
        })
        .collect()
}

/// Parses `tctl nodes add` output captured at `captured_at`.
///
/// The four facts are matched independently on every line; a later match overwrites an
/// earlier one.
#[must_use]
pub fn parse_invite(stdout: &str, captured_at: DateTime<Utc>, roles: &str) -> InviteResult {
    let mut invite = InviteResult {
        roles: split_list(roles),
        ..InviteResult::default()
    };

    for line in stdout.lines() {
        if let Some(caps) = invite_token().captures(line) {
            invite.token = Some(caps[1].to_string());
        }
        if let Some(caps) = invite_expiry().captures(line) {
            let (amount, unit) = (&caps[1], &caps[2]);
            invite.expires = Some(format!("{amount} {unit}"));
            invite.expires_at = Some(expires_at(captured_at, amount, unit));
        }
        if let Some(caps) = invite_command().captures(line) {
            invite.command = Some(caps[1].to_string());
        }
        if let Some(caps) = invite_auth_server().captures(line) {
            invite.auth_server = Some(caps[1].to_string());
        }
    }

    invite
}

/// Parses the signup banner printed by `tctl users add`.
#[must_use]
pub fn parse_signup(stdout: &str) -> SignupFacts {
    let mut facts = SignupFacts::default();
    for line in stdout.lines() {
        if let Some(caps) = signup_expiry().captures(line) {
            facts.expires = Some(caps[1].to_string());
        }
        if let Some(caps) = signup_url().captures(line) {
            facts.url = Some(format!("https://{}", &caps[1]));
        }
    }
    facts
}

/// Seconds added for `amount unit`.
///
/// Only `minutes` and `hours` are understood; every other unit, including the singular forms,
/// adds nothing.
#[must_use]
pub fn relative_offset_secs(amount: i64, unit: &str) -> i64 {
    match unit {
        "minutes" => amount.saturating_mul(SECONDS_PER_MINUTE),
        "hours" => amount.saturating_mul(SECONDS_PER_HOUR),
        _ => 0,
    }
}

fn expires_at(captured_at: DateTime<Utc>, amount: &str, unit: &str) -> i64 {
    let amount = amount.parse::<i64>().unwrap_or(i64::MAX);
    captured_at
        .timestamp()
        .saturating_add(relative_offset_secs(amount, unit))
}

fn split_list(value: &str) -> Vec<String> {
    value.split(',').map(str::to_string).collect()
}

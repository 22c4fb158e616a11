//! Integration tests for scraping captured `tctl` output.
//!
//! These tests replay real-looking `tctl` output through the public client API with a
//! fixture-backed runner standing in for the binary.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use teleport_core::{Error, TctlConfig};
use teleport_tctl::{
    parser, CallOptions, CommandOutcome, CommandRequest, CommandRunner, TctlClient, TctlResponse,
};

/// Get the path to the test fixtures directory.
fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

/// Load a captured output fixture from disk.
fn load_fixture(name: &str) -> String {
    let fixture_path = fixtures_dir().join(name);
    fs::read_to_string(&fixture_path).unwrap_or_else(|e| {
        panic!(
            "Failed to read fixture at {}: {}",
            fixture_path.display(),
            e
        )
    })
}

/// Answers each command line with a canned outcome.
struct FixtureRunner {
    outcomes: HashMap<String, CommandOutcome>,
}

impl FixtureRunner {
    fn new() -> Self {
        Self {
            outcomes: HashMap::new(),
        }
    }

    fn answer(mut self, command_line: &str, outcome: CommandOutcome) -> Self {
        self.outcomes.insert(command_line.to_string(), outcome);
        self
    }
}

#[async_trait]
impl CommandRunner for FixtureRunner {
    async fn run(&self, request: &CommandRequest) -> teleport_tctl::Result<CommandOutcome> {
        let command_line = request.command_line();
        Ok(self
            .outcomes
            .get(&command_line)
            .cloned()
            .unwrap_or_else(|| CommandOutcome::new(127, "", format!("unexpected: {command_line}"))))
    }
}

fn client(runner: FixtureRunner) -> TctlClient {
    TctlClient::with_runner(TctlConfig::default(), Box::new(runner))
}

#[test]
fn test_node_fixture_drops_banner_lines() {
    let nodes = parser::parse_nodes(&load_fixture("nodes_ls.txt"));

    assert_eq!(nodes.len(), 4, "Expected 4 nodes in fixture");
    let names: Vec<&str> = nodes.iter().map(|node| node.name.as_str()).collect();
    assert_eq!(names, vec!["web-1", "db-1", "cache-1", "edge-1"]);
    assert_eq!(nodes[1].labels, vec!["env=prod", "role=db"]);
    assert_eq!(nodes[2].address, "10.0.0.7:3022");
    assert_eq!(nodes[3].address, "10.0.0.8:3022");
    assert_eq!(nodes[3].labels, vec![""], "unlabeled node keeps an empty label");
}

#[test]
fn test_token_fixture() {
    let tokens = parser::parse_tokens(&load_fixture("tokens_ls.txt"));

    assert_eq!(tokens.len(), 2);
    assert_eq!(tokens[0].value, "2f1a9c0b7e4d4f8a9b6c3d2e1f0a9b8c");
    assert_eq!(tokens[0].expiry, "14 Nov 23 22:15 UTC");
    assert_eq!(tokens[1].roles, vec!["Node", "Proxy", "Auth"]);
    assert_eq!(tokens[1].expiry, "never");
}

#[tokio::test]
async fn test_users_list_through_client() {
    let runner = FixtureRunner::new().answer(
        "tctl users ls",
        CommandOutcome::new(0, load_fixture("users_ls.txt"), ""),
    );

    let users = client(runner)
        .users_list(CallOptions::new())
        .await
        .unwrap()
        .into_data()
        .unwrap();

    assert_eq!(users.users.len(), 2);
    assert_eq!(users.users[0].login, "ekristen");
    assert_eq!(users.users[0].allowed_logins, vec!["ekristen", "root"]);
    assert!(users.contains("alice"));
}

#[tokio::test]
async fn test_nodes_add_through_client() {
    let runner = FixtureRunner::new().answer(
        "tctl nodes add --roles=node --ttl=20m",
        CommandOutcome::new(0, load_fixture("nodes_add.txt"), ""),
    );

    let response = client(runner)
        .nodes_add(None, Some("20m"), CallOptions::new().with_debug(true))
        .await
        .unwrap();

    let invite = response.data().unwrap();
    assert_eq!(
        invite.token.as_deref(),
        Some("2f1a9c0b7e4d4f8a9b6c3d2e1f0a9b8c")
    );
    assert_eq!(invite.expires.as_deref(), Some("20 minutes"));
    assert_eq!(invite.auth_server.as_deref(), Some("10.0.0.5:3025"));
    assert!(invite
        .command
        .as_deref()
        .unwrap()
        .starts_with("teleport start --roles=node"));
    assert!(response.outcome().is_some(), "debug output requested");
}

#[tokio::test]
async fn test_users_add_through_client() {
    let runner = FixtureRunner::new().answer(
        "tctl users add ekristen ekristen,erik",
        CommandOutcome::new(0, load_fixture("users_add.txt"), ""),
    );

    let added = client(runner)
        .users_add("ekristen", Some("ekristen,erik"), CallOptions::new())
        .await
        .unwrap()
        .into_data()
        .unwrap();

    assert_eq!(added.expires.as_deref(), Some("1 hours"));
    assert_eq!(
        added.url.as_deref(),
        Some("https://teleport.example.com:3080/web/newuser/3a5f0c1d9e8b7a6f5e4d3c2b1a0f9e8d")
    );
}

#[tokio::test]
async fn test_failure_policy_is_uniform() {
    let denied = CommandOutcome::new(1, "", "access denied to perform action");
    let runner = || {
        [
            "tctl version",
            "tctl nodes add --roles=node --ttl=2m",
            "tctl nodes ls",
            "tctl tokens ls",
            "tctl users add alice",
            "tctl users del alice",
            "tctl users ls",
        ]
        .into_iter()
        .fold(FixtureRunner::new(), |runner, command| {
            runner.answer(command, denied.clone())
        })
    };

    let hard = client(runner());
    let opts = CallOptions::new();
    let errors = vec![
        hard.version(opts).await.map(|_| ()).unwrap_err(),
        hard.nodes_add(None, None, opts).await.map(|_| ()).unwrap_err(),
        hard.nodes_list(opts).await.map(|_| ()).unwrap_err(),
        hard.tokens_list(opts).await.map(|_| ()).unwrap_err(),
        hard.users_add("alice", None, opts).await.map(|_| ()).unwrap_err(),
        hard.users_del("alice", opts).await.map(|_| ()).unwrap_err(),
        hard.users_list(opts).await.map(|_| ()).unwrap_err(),
    ];
    for err in errors {
        assert!(matches!(err, Error::CommandFailed { .. }));
        assert!(err.to_string().ends_with("failed: access denied to perform action"));
    }

    let soft = client(runner());
    let opts = CallOptions::new().with_failhard(false);
    assert!(!soft.version(opts).await.unwrap().is_success());
    assert!(!soft.nodes_add(None, None, opts).await.unwrap().is_success());
    assert!(!soft.nodes_list(opts).await.unwrap().is_success());
    assert!(!soft.tokens_list(opts).await.unwrap().is_success());
    assert!(!soft.users_add("alice", None, opts).await.unwrap().is_success());
    assert!(!soft.users_list(opts).await.unwrap().is_success());

    let deleted = soft.users_del("alice", opts).await.unwrap();
    match deleted {
        TctlResponse::Failure { outcome, result } => {
            assert!(!result);
            assert_eq!(outcome, denied);
        }
        TctlResponse::Success { .. } => panic!("expected a failure response"),
    }
}

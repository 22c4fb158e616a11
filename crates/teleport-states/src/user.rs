//! User presence checks.

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, warn};

use crate::state::{Change, StateResult};
use teleport_core::Result;
use teleport_tctl::{CallOptions, TctlClient, TctlResponse, UserAddResult, UserDeleteResult};

const PRESENT: &str = "User is present";
const ADDED: &str = "User was added successfully";
const ADD_FAILED: &str = "Error adding or verifying presence of user";
const NOT_PRESENT: &str = "User is NOT present";
const REMOVED: &str = "User was removed successfully";
const REMOVE_FAILED: &str = "Error removing the user";

/// User operations the presence checks run against.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Returns true if a user with exactly this login exists.
    async fn user_exists(&self, login: &str) -> Result<bool>;

    /// Creates a user, optionally restricted to the given comma-separated local logins.
    async fn add_user(
        &self,
        login: &str,
        local_logins: Option<String>,
    ) -> Result<TctlResponse<UserAddResult>>;

    /// Deletes a user.
    async fn delete_user(&self, login: &str) -> Result<TctlResponse<UserDeleteResult>>;
}

#[async_trait]
impl UserDirectory for TctlClient {
    async fn user_exists(&self, login: &str) -> Result<bool> {
        self.users_exists(login).await
    }

    async fn add_user(
        &self,
        login: &str,
        local_logins: Option<String>,
    ) -> Result<TctlResponse<UserAddResult>> {
        self.users_add(login, local_logins.as_deref(), CallOptions::new())
            .await
    }

    async fn delete_user(&self, login: &str) -> Result<TctlResponse<UserDeleteResult>> {
        self.users_del(login, CallOptions::new()).await
    }
}

/// Ensures the user `name` exists, creating it when missing.
///
/// Never fails: errors from the directory are logged and reported with `result = false`.
pub async fn user_present(
    directory: &dyn UserDirectory,
    name: &str,
    local_logins: Option<&str>,
) -> StateResult {
    match directory.user_exists(name).await {
        Ok(true) => {
            debug!("teleport - user {name} already present");
            return StateResult::unchanged(name, PRESENT);
        }
        Ok(false) => {}
        Err(err) => {
            warn!(error = %err, "teleport - cannot check presence of user {name}");
            return StateResult::failed(name, ADD_FAILED);
        }
    }

    match directory
        .add_user(name, local_logins.map(str::to_string))
        .await
    {
        Ok(TctlResponse::Success { data, .. }) if data.result => {
            let change = Change {
                old: json!(""),
                new: json!({
                    "login": data.login,
                    "local_logins": data.local_logins,
                }),
            };
            StateResult::changed(name, change, ADDED)
        }
        Ok(response) => {
            warn!(
                stderr = response.outcome().map_or("", |outcome| outcome.stderr.as_str()),
                "teleport - adding user {name} failed"
            );
            StateResult::failed(name, ADD_FAILED)
        }
        Err(err) => {
            warn!(error = %err, "teleport - adding user {name} failed");
            StateResult::failed(name, ADD_FAILED)
        }
    }
}

/// Ensures the user `name` does not exist, deleting it when present.
///
/// Never fails: errors from the directory are logged and reported with `result = false`.
pub async fn user_absent(directory: &dyn UserDirectory, name: &str) -> StateResult {
    match directory.user_exists(name).await {
        Ok(false) => {
            debug!("teleport - user {name} already absent");
            return StateResult::unchanged(name, NOT_PRESENT);
        }
        Ok(true) => {}
        Err(err) => {
            warn!(error = %err, "teleport - cannot check presence of user {name}");
            return StateResult::failed(name, REMOVE_FAILED);
        }
    }

    match directory.delete_user(name).await {
        Ok(TctlResponse::Success { data, .. }) if data.result => {
            let change = Change {
                old: json!({ "login": data.login }),
                new: json!(""),
            };
            StateResult::changed(name, change, REMOVED)
        }
        Ok(response) => {
            warn!(
                stderr = response.outcome().map_or("", |outcome| outcome.stderr.as_str()),
                "teleport - removing user {name} failed"
            );
            StateResult::failed(name, REMOVE_FAILED)
        }
        Err(err) => {
            warn!(error = %err, "teleport - removing user {name} failed");
            StateResult::failed(name, REMOVE_FAILED)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use teleport_core::Error;
    use teleport_tctl::CommandOutcome;

    fn added(login: &str, local_logins: Option<&str>) -> TctlResponse<UserAddResult> {
        TctlResponse::Success {
            data: UserAddResult {
                login: login.to_string(),
                local_logins: local_logins.map(str::to_string),
                expires: Some("1 hours".to_string()),
                url: None,
                result: true,
            },
            debug: None,
        }
    }

    fn deleted(login: &str) -> TctlResponse<UserDeleteResult> {
        TctlResponse::Success {
            data: UserDeleteResult {
                login: login.to_string(),
                result: true,
            },
            debug: None,
        }
    }

    fn soft_failure<T>(stderr: &str) -> TctlResponse<T> {
        TctlResponse::Failure {
            outcome: CommandOutcome::new(1, "", stderr),
            result: false,
        }
    }

    #[tokio::test]
    async fn present_twice_changes_once() {
        let created = Arc::new(AtomicBool::new(false));
        let mut directory = MockUserDirectory::new();
        let seen = Arc::clone(&created);
        directory
            .expect_user_exists()
            .withf(|login| login.to_string() == "alice")
            .times(2)
            .returning(move |_| Ok(seen.load(Ordering::SeqCst)));
        let record = Arc::clone(&created);
        directory
            .expect_add_user()
            .withf(|login, logins| {
                login.to_string() == "alice" && logins.as_deref() == Some("alice,root")
            })
            .times(1)
            .returning(move |login, logins| {
                record.store(true, Ordering::SeqCst);
                Ok(added(login, logins.as_deref()))
            });

        let first = user_present(&directory, "alice", Some("alice,root")).await;
        assert!(first.result);
        assert!(first.has_changes());
        assert_eq!(first.comment, "User was added successfully");
        let change = &first.changes.as_ref().unwrap()["alice"];
        assert_eq!(change.old, json!(""));
        assert_eq!(
            change.new,
            json!({"login": "alice", "local_logins": "alice,root"})
        );

        let second = user_present(&directory, "alice", Some("alice,root")).await;
        assert!(second.result);
        assert!(!second.has_changes());
        assert_eq!(second.comment, "User is present");
    }

    #[tokio::test]
    async fn present_reports_missing_local_logins_as_null() {
        let mut directory = MockUserDirectory::new();
        directory.expect_user_exists().returning(|_| Ok(false));
        directory
            .expect_add_user()
            .withf(|_, logins| logins.is_none())
            .returning(|login, _| Ok(added(login, None)));

        let report = user_present(&directory, "bob", None).await;
        let change = &report.changes.unwrap()["bob"];
        assert_eq!(change.new, json!({"login": "bob", "local_logins": null}));
    }

    #[tokio::test]
    async fn present_add_error_is_reported() {
        let mut directory = MockUserDirectory::new();
        directory.expect_user_exists().returning(|_| Ok(false));
        directory.expect_add_user().returning(|_, _| {
            Err(Error::command_failed(
                "tctl users add alice",
                "access denied",
            ))
        });

        let report = user_present(&directory, "alice", None).await;
        assert!(!report.result);
        assert!(!report.has_changes());
        assert_eq!(report.comment, "Error adding or verifying presence of user");
    }

    #[tokio::test]
    async fn present_soft_failure_is_reported() {
        let mut directory = MockUserDirectory::new();
        directory.expect_user_exists().returning(|_| Ok(false));
        directory
            .expect_add_user()
            .returning(|_, _| Ok(soft_failure("user alice exists")));

        let report = user_present(&directory, "alice", None).await;
        assert!(!report.result);
        assert_eq!(report.comment, "Error adding or verifying presence of user");
    }

    #[tokio::test]
    async fn present_existence_check_error_is_reported() {
        let mut directory = MockUserDirectory::new();
        directory.expect_user_exists().returning(|_| {
            Err(Error::command_failed(
                "tctl users ls",
                "cannot connect to auth server",
            ))
        });
        directory.expect_add_user().never();

        let report = user_present(&directory, "alice", None).await;
        assert!(!report.result);
        assert_eq!(report.comment, "Error adding or verifying presence of user");
    }

    #[tokio::test]
    async fn absent_on_missing_user_never_deletes() {
        let mut directory = MockUserDirectory::new();
        directory.expect_user_exists().returning(|_| Ok(false));
        directory.expect_delete_user().never();

        let report = user_absent(&directory, "ghost").await;
        assert!(report.result);
        assert!(!report.has_changes());
        assert_eq!(report.comment, "User is NOT present");
    }

    #[tokio::test]
    async fn absent_removes_existing_user() {
        let mut directory = MockUserDirectory::new();
        directory.expect_user_exists().returning(|_| Ok(true));
        directory
            .expect_delete_user()
            .withf(|login| login.to_string() == "alice")
            .times(1)
            .returning(|login| Ok(deleted(login)));

        let report = user_absent(&directory, "alice").await;
        assert!(report.result);
        assert_eq!(report.comment, "User was removed successfully");
        let change = &report.changes.unwrap()["alice"];
        assert_eq!(change.old, json!({"login": "alice"}));
        assert_eq!(change.new, json!(""));
    }

    #[tokio::test]
    async fn absent_delete_failures_are_reported() {
        let mut directory = MockUserDirectory::new();
        directory.expect_user_exists().returning(|_| Ok(true));
        directory
            .expect_delete_user()
            .times(1)
            .returning(|_| Ok(soft_failure("access denied")));

        let report = user_absent(&directory, "alice").await;
        assert!(!report.result);
        assert!(!report.has_changes());
        assert_eq!(report.comment, "Error removing the user");

        let mut directory = MockUserDirectory::new();
        directory.expect_user_exists().returning(|_| Ok(true));
        directory
            .expect_delete_user()
            .returning(|_| Err(Error::command_failed("tctl users del alice", "")));

        let report = user_absent(&directory, "alice").await;
        assert!(!report.result);
        assert_eq!(report.comment, "Error removing the user");
    }
}

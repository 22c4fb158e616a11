//! State reports.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Before and after values of one changed item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    /// Value before the corrective action; an empty string when nothing existed.
    pub old: Value,
    /// Value after the corrective action; an empty string when the item was removed.
    pub new: Value,
}

/// Report returned by every convergence check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateResult {
    /// Name of the checked item.
    pub name: String,
    /// Changes performed, keyed by item name; `None` when nothing changed.
    pub changes: Option<BTreeMap<String, Change>>,
    /// Whether the desired state holds after the check.
    pub result: bool,
    /// Human-readable summary.
    pub comment: String,
}

impl StateResult {
    /// The desired state already held.
    #[must_use]
    pub fn unchanged(name: impl Into<String>, comment: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            changes: None,
            result: true,
            comment: comment.into(),
        }
    }

    /// A corrective action succeeded.
    #[must_use]
    pub fn changed(name: impl Into<String>, change: Change, comment: impl Into<String>) -> Self {
        let name = name.into();
        let changes = BTreeMap::from([(name.clone(), change)]);
        Self {
            name,
            changes: Some(changes),
            result: true,
            comment: comment.into(),
        }
    }

    /// The desired state could not be reached.
    #[must_use]
    pub fn failed(name: impl Into<String>, comment: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            changes: None,
            result: false,
            comment: comment.into(),
        }
    }

    /// Returns true when the check changed something.
    #[must_use]
    pub const fn has_changes(&self) -> bool {
        self.changes.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unchanged_report_serializes_null_changes() {
        let report = StateResult::unchanged("alice", "User is present");
        assert!(!report.has_changes());
        assert_eq!(
            serde_json::to_value(&report).unwrap(),
            json!({
                "name": "alice",
                "changes": null,
                "result": true,
                "comment": "User is present",
            })
        );
    }

    #[test]
    fn changed_report_is_keyed_by_name() {
        let change = Change {
            old: json!(""),
            new: json!({"login": "alice", "local_logins": "alice,root"}),
        };
        let report = StateResult::changed("alice", change, "User was added successfully");

        assert!(report.has_changes());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["changes"]["alice"]["old"], "");
        assert_eq!(json["changes"]["alice"]["new"]["local_logins"], "alice,root");
    }

    #[test]
    fn failed_report() {
        let report = StateResult::failed("alice", "Error removing the user");
        assert!(!report.result);
        assert!(!report.has_changes());
    }
}

// ── Issue registry ──
//
// User-visible problems that need action outside this program, such as
// re-enabling the local API in the HomeWizard Energy app.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use strum::{AsRefStr, Display};
use tracing::{info, warn};

use crate::device_info::DOMAIN;

/// How loud an issue is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, AsRefStr, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum IssueSeverity {
    Warning,
    Error,
}

/// One raised issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub domain: String,
    pub issue_id: String,
    pub translation_key: String,
    pub severity: IssueSeverity,
    pub is_fixable: bool,
    /// Entry the issue is about, when there is one.
    pub entry_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Issue {
    /// The "local API disabled" issue for one entry.
    pub fn api_disabled(entry_id: &str) -> Self {
        Self {
            domain: DOMAIN.to_owned(),
            issue_id: api_disabled_issue_id(entry_id),
            translation_key: "local_api_disabled".to_owned(),
            severity: IssueSeverity::Error,
            is_fixable: false,
            entry_id: Some(entry_id.to_owned()),
            created_at: Utc::now(),
        }
    }
}

/// Issue id raised while an entry's local API is switched off.
pub fn api_disabled_issue_id(entry_id: &str) -> String {
    format!("api_disabled_{entry_id}")
}

/// Concurrent map of raised issues keyed by `(domain, issue_id)`.
#[derive(Debug, Default)]
pub struct IssueRegistry {
    issues: DashMap<(String, String), Issue>,
}

impl IssueRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise an issue. Returns `false` if it was already raised, in which
    /// case the existing record is kept untouched.
    pub fn create(&self, issue: Issue) -> bool {
        let key = (issue.domain.clone(), issue.issue_id.clone());
        if self.issues.contains_key(&key) {
            return false;
        }
        warn!(issue_id = %issue.issue_id, "issue raised");
        self.issues.insert(key, issue);
        true
    }

    /// Clear an issue. No-op when it was never raised.
    pub fn delete(&self, domain: &str, issue_id: &str) -> bool {
        let removed = self
            .issues
            .remove(&(domain.to_owned(), issue_id.to_owned()))
            .is_some();
        if removed {
            info!(issue_id, "issue resolved");
        }
        removed
    }

    pub fn get(&self, domain: &str, issue_id: &str) -> Option<Issue> {
        self.issues
            .get(&(domain.to_owned(), issue_id.to_owned()))
            .map(|r| r.value().clone())
    }

    pub fn contains(&self, domain: &str, issue_id: &str) -> bool {
        self.issues
            .contains_key(&(domain.to_owned(), issue_id.to_owned()))
    }

    /// All issues, oldest first.
    pub fn list(&self) -> Vec<Issue> {
        let mut all: Vec<Issue> = self.issues.iter().map(|r| r.value().clone()).collect();
        all.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.issue_id.cmp(&b.issue_id))
        });
        all
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_is_idempotent() {
        let registry = IssueRegistry::new();
        assert!(registry.create(Issue::api_disabled("abc")));
        assert!(!registry.create(Issue::api_disabled("abc")));
        assert_eq!(registry.len(), 1);
        assert!(registry.contains(DOMAIN, "api_disabled_abc"));
    }

    #[test]
    fn delete_missing_issue_is_noop() {
        let registry = IssueRegistry::new();
        assert!(!registry.delete(DOMAIN, "api_disabled_abc"));

        registry.create(Issue::api_disabled("abc"));
        assert!(registry.delete(DOMAIN, "api_disabled_abc"));
        assert!(registry.is_empty());
    }

    #[test]
    fn issues_are_scoped_per_entry() {
        let registry = IssueRegistry::new();
        registry.create(Issue::api_disabled("one"));
        registry.create(Issue::api_disabled("two"));

        let ids: Vec<String> = registry.list().into_iter().map(|i| i.issue_id).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&"api_disabled_one".to_owned()));
        assert_eq!(
            registry.get(DOMAIN, "api_disabled_two").and_then(|i| i.entry_id),
            Some("two".to_owned())
        );
    }
}

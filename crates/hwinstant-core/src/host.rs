// ── Host services ──
//
// What the coordinator and setup flow may ask of whoever runs them:
// reload an entry, ask the user to re-enable the API, raise or clear
// issues. The entry runtime is the production host; `StandaloneHost`
// serves one-shot CLI commands and tests.

use std::sync::Arc;

use dashmap::DashSet;
use tracing::{debug, info};

use crate::issues::IssueRegistry;

/// Services the plugin logic requests from its host.
///
/// Requests are fire-and-forget: implementations queue them and return
/// immediately so a poll tick never waits on a reload of its own entry.
pub trait Host: Send + Sync {
    /// Ask for the entry to be unloaded and set up again.
    fn schedule_reload(&self, entry_id: &str);

    /// Ask the user to re-enable the local API for the entry.
    fn start_reauth(&self, entry_id: &str);

    fn issues(&self) -> &IssueRegistry;
}

/// Host that only records requests.
///
/// Used where nothing is running that could act on a reload, such as a
/// single `sensors` read from the CLI.
#[derive(Debug, Default)]
pub struct StandaloneHost {
    issues: IssueRegistry,
    reloads: DashSet<String>,
    reauths: DashSet<String>,
}

impl StandaloneHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Entries a reload was requested for.
    pub fn reload_requests(&self) -> Vec<String> {
        sorted(&self.reloads)
    }

    /// Entries a reauth was requested for.
    pub fn reauth_requests(&self) -> Vec<String> {
        sorted(&self.reauths)
    }
}

impl Host for StandaloneHost {
    fn schedule_reload(&self, entry_id: &str) {
        debug!(entry_id, "reload requested");
        self.reloads.insert(entry_id.to_owned());
    }

    fn start_reauth(&self, entry_id: &str) {
        info!(entry_id, "reauth requested");
        self.reauths.insert(entry_id.to_owned());
    }

    fn issues(&self) -> &IssueRegistry {
        &self.issues
    }
}

fn sorted(set: &DashSet<String>) -> Vec<String> {
    let mut ids: Vec<String> = set.iter().map(|r| r.key().clone()).collect();
    ids.sort();
    ids
}

// ── Config entry registry ──
//
// Concurrent storage for configured devices with a secondary unique-id
// index and push-based change notification via a `watch` channel.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::watch;
use tracing::debug;

use crate::config::{ConfigEntry, EntryData};
use crate::error::CoreError;

/// All configured devices, keyed by entry id.
///
/// Every mutation rebuilds the sorted snapshot that subscribers (and the
/// CLI, when persisting) receive.
pub struct ConfigEntries {
    by_id: DashMap<String, Arc<ConfigEntry>>,

    /// Secondary index: unique id -> entry id.
    by_unique_id: DashMap<String, String>,

    snapshot: watch::Sender<Arc<Vec<Arc<ConfigEntry>>>>,
}

impl Default for ConfigEntries {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigEntries {
    pub fn new() -> Self {
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            by_id: DashMap::new(),
            by_unique_id: DashMap::new(),
            snapshot,
        }
    }

    /// Build a registry from already-persisted entries.
    pub fn from_entries(entries: impl IntoIterator<Item = ConfigEntry>) -> Result<Self, CoreError> {
        let registry = Self::new();
        for entry in entries {
            registry.add(entry)?;
        }
        Ok(registry)
    }

    /// Register a new entry.
    ///
    /// Fails when the entry id is taken or another entry already owns
    /// the same unique id.
    pub fn add(&self, entry: ConfigEntry) -> Result<Arc<ConfigEntry>, CoreError> {
        if self.by_id.contains_key(&entry.entry_id) {
            return Err(CoreError::Config {
                message: format!("duplicate entry id '{}'", entry.entry_id),
            });
        }
        if let Some(uid) = &entry.unique_id {
            if let Some(owner) = self.by_unique_id.get(uid) {
                return Err(CoreError::Config {
                    message: format!("unique id '{uid}' already belongs to entry '{}'", *owner),
                });
            }
            self.by_unique_id.insert(uid.clone(), entry.entry_id.clone());
        }

        debug!(entry_id = %entry.entry_id, title = %entry.title, "entry added");
        let entry = Arc::new(entry);
        self.by_id
            .insert(entry.entry_id.clone(), Arc::clone(&entry));
        self.rebuild_snapshot();
        Ok(entry)
    }

    pub fn get(&self, entry_id: &str) -> Option<Arc<ConfigEntry>> {
        self.by_id.get(entry_id).map(|r| Arc::clone(r.value()))
    }

    /// Look up an entry by its unique id (secondary index).
    pub fn get_by_unique_id(&self, unique_id: &str) -> Option<Arc<ConfigEntry>> {
        let entry_id = self.by_unique_id.get(unique_id)?.value().clone();
        self.get(&entry_id)
    }

    /// Apply `f` to a copy of the entry and store the result.
    pub fn update<F>(&self, entry_id: &str, f: F) -> Result<Arc<ConfigEntry>, CoreError>
    where
        F: FnOnce(&mut ConfigEntry),
    {
        let current = self.get(entry_id).ok_or_else(|| CoreError::EntryNotFound {
            entry_id: entry_id.to_owned(),
        })?;

        let mut next = (*current).clone();
        f(&mut next);
        next.entry_id = current.entry_id.clone();

        if next.unique_id != current.unique_id {
            if let Some(old) = &current.unique_id {
                self.by_unique_id.remove(old);
            }
            if let Some(new) = &next.unique_id {
                self.by_unique_id.insert(new.clone(), next.entry_id.clone());
            }
        }

        let next = Arc::new(next);
        self.by_id.insert(entry_id.to_owned(), Arc::clone(&next));
        self.rebuild_snapshot();
        Ok(next)
    }

    /// Replace the entry's connection data. Returns `true` if it changed.
    pub fn update_data(&self, entry_id: &str, data: EntryData) -> Result<bool, CoreError> {
        let current = self.get(entry_id).ok_or_else(|| CoreError::EntryNotFound {
            entry_id: entry_id.to_owned(),
        })?;
        if current.data == data {
            return Ok(false);
        }
        self.update(entry_id, |entry| entry.data = data)?;
        Ok(true)
    }

    /// Remove an entry. Returns the removed entry if it existed.
    pub fn remove(&self, entry_id: &str) -> Option<Arc<ConfigEntry>> {
        let (_, removed) = self.by_id.remove(entry_id)?;
        if let Some(uid) = &removed.unique_id {
            self.by_unique_id.remove(uid);
        }
        self.rebuild_snapshot();
        Some(removed)
    }

    /// All entries, sorted by title then entry id (cheap `Arc` clone).
    pub fn snapshot(&self) -> Arc<Vec<Arc<ConfigEntry>>> {
        self.snapshot.borrow().clone()
    }

    /// Subscribe to snapshot changes.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Vec<Arc<ConfigEntry>>>> {
        self.snapshot.subscribe()
    }

    pub fn ids(&self) -> Vec<String> {
        self.snapshot()
            .iter()
            .map(|entry| entry.entry_id.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    fn rebuild_snapshot(&self) {
        let mut values: Vec<Arc<ConfigEntry>> =
            self.by_id.iter().map(|r| Arc::clone(r.value())).collect();
        values.sort_by(|a, b| {
            a.title
                .cmp(&b.title)
                .then_with(|| a.entry_id.cmp(&b.entry_id))
        });
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
    }
}

// ── Entry runtime ──
//
// Hosts one coordinator per loaded config entry: sets entries up, polls
// them on a fixed interval, retries failed setups, and acts on reload
// requests coming out of poll ticks and setup flows.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::{DashMap, DashSet};
use serde::Serialize;
use strum::{AsRefStr, Display};
use tokio::sync::{Mutex, broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::{ClientFactory, DeviceApi};
use crate::config::RuntimeOptions;
use crate::coordinator::Coordinator;
use crate::entries::ConfigEntries;
use crate::error::CoreError;
use crate::host::Host;
use crate::issues::IssueRegistry;

const EVENT_CHANNEL_SIZE: usize = 64;

// ── Entry state ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, AsRefStr, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EntryState {
    #[default]
    NotLoaded,
    Loaded,
    /// First refresh failed; another setup is scheduled.
    SetupRetry,
    /// Setup failed in a way a retry will not fix.
    SetupError,
}

/// Lifecycle notifications for observers such as the CLI `watch` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeEvent {
    Loaded { entry_id: String },
    Unloaded { entry_id: String },
    SetupFailed { entry_id: String, reason: String, retrying: bool },
}

// ── Host side ────────────────────────────────────────────────────

#[derive(Debug)]
enum RuntimeRequest {
    Reload(String),
    RetrySetup(String),
}

/// The runtime's [`Host`]: reloads are queued for the request processor.
#[derive(Debug)]
struct RuntimeHost {
    requests: mpsc::UnboundedSender<RuntimeRequest>,
    issues: IssueRegistry,
    reauths: DashSet<String>,
}

impl Host for RuntimeHost {
    fn schedule_reload(&self, entry_id: &str) {
        debug!(entry_id, "reload queued");
        if self
            .requests
            .send(RuntimeRequest::Reload(entry_id.to_owned()))
            .is_err()
        {
            warn!(entry_id, "runtime stopped, reload dropped");
        }
    }

    fn start_reauth(&self, entry_id: &str) {
        if self.reauths.insert(entry_id.to_owned()) {
            info!(entry_id, "local API disabled, re-enable it and run reauth");
        }
    }

    fn issues(&self) -> &IssueRegistry {
        &self.issues
    }
}

// ── Runtime ──────────────────────────────────────────────────────

struct LoadedEntry<C: DeviceApi> {
    coordinator: Arc<Coordinator<C>>,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Runs coordinators for config entries.
///
/// Cheaply cloneable via `Arc<RuntimeInner>`. Call [`start()`](Self::start)
/// before relying on reloads and setup retries: both are carried out by a
/// background task.
pub struct Runtime<F: ClientFactory> {
    inner: Arc<RuntimeInner<F>>,
}

impl<F: ClientFactory> Clone for Runtime<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct RuntimeInner<F: ClientFactory> {
    factory: F,
    entries: Arc<ConfigEntries>,
    options: RuntimeOptions,
    host: Arc<RuntimeHost>,
    request_rx: Mutex<Option<mpsc::UnboundedReceiver<RuntimeRequest>>>,
    /// Serializes setup, unload and reload.
    lifecycle: Mutex<()>,
    loaded: DashMap<String, LoadedEntry<F::Client>>,
    states: DashMap<String, EntryState>,
    /// Pending setup retries, cancelled on unload.
    retries: DashMap<String, CancellationToken>,
    /// Entries last seen with the local API disabled. Outlives the
    /// coordinator so a reload does not forget the raised issue.
    api_disabled: DashSet<String>,
    event_tx: broadcast::Sender<RuntimeEvent>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl<F: ClientFactory> Runtime<F> {
    pub fn new(factory: F, entries: Arc<ConfigEntries>, options: RuntimeOptions) -> Self {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);

        Self {
            inner: Arc::new(RuntimeInner {
                factory,
                entries,
                options,
                host: Arc::new(RuntimeHost {
                    requests: request_tx,
                    issues: IssueRegistry::new(),
                    reauths: DashSet::new(),
                }),
                request_rx: Mutex::new(Some(request_rx)),
                lifecycle: Mutex::new(()),
                loaded: DashMap::new(),
                states: DashMap::new(),
                retries: DashMap::new(),
                api_disabled: DashSet::new(),
                event_tx,
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Spawn the request processor. Calling it again is a no-op.
    pub async fn start(&self) {
        if let Some(rx) = self.inner.request_rx.lock().await.take() {
            let runtime = self.clone();
            let cancel = self.inner.cancel.clone();
            self.inner
                .task_handles
                .lock()
                .await
                .push(tokio::spawn(request_processor_task(runtime, rx, cancel)));
        }
    }

    // ── Entry lifecycle ──────────────────────────────────────────

    /// Set up an entry: connect, fetch once, then poll in the background.
    ///
    /// A failed first fetch returns [`CoreError::EntryNotReady`] and
    /// schedules another attempt after `setup_retry_interval`.
    pub async fn setup_entry(&self, entry_id: &str) -> Result<(), CoreError> {
        let _guard = self.inner.lifecycle.lock().await;
        self.setup_locked(entry_id).await
    }

    /// Stop polling an entry and close its client.
    ///
    /// Returns `false` if the entry was neither loaded nor waiting to retry.
    pub async fn unload_entry(&self, entry_id: &str) -> bool {
        let _guard = self.inner.lifecycle.lock().await;
        self.unload_locked(entry_id).await
    }

    pub async fn reload_entry(&self, entry_id: &str) -> Result<(), CoreError> {
        let _guard = self.inner.lifecycle.lock().await;
        info!(entry_id, "reloading entry");
        self.unload_locked(entry_id).await;
        self.setup_locked(entry_id).await
    }

    /// Set up every configured entry; returns how many are loaded.
    pub async fn setup_all(&self) -> usize {
        for entry_id in self.inner.entries.ids() {
            if let Err(e) = self.setup_entry(&entry_id).await {
                warn!(entry_id, error = %e, "entry setup failed");
            }
        }
        self.inner.loaded.len()
    }

    /// Unload everything and stop background tasks. The runtime cannot
    /// be started again afterwards.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        drop(handles);

        let _guard = self.inner.lifecycle.lock().await;
        let ids: Vec<String> = self.inner.loaded.iter().map(|e| e.key().clone()).collect();
        for entry_id in ids {
            self.unload_locked(&entry_id).await;
        }
        debug!("runtime shut down");
    }

    async fn setup_locked(&self, entry_id: &str) -> Result<(), CoreError> {
        if self.inner.loaded.contains_key(entry_id) {
            debug!(entry_id, "entry already loaded");
            return Ok(());
        }
        self.cancel_retry(entry_id);

        let entry = self
            .inner
            .entries
            .get(entry_id)
            .ok_or_else(|| CoreError::EntryNotFound {
                entry_id: entry_id.to_owned(),
            })?;

        let client = match self.inner.factory.connect(&entry.data.ip_address) {
            Ok(client) => client,
            Err(e) => {
                let err = CoreError::from(e);
                self.fail_setup(entry_id, &err.to_string(), false);
                return Err(err);
            }
        };

        let host: Arc<dyn Host> = Arc::clone(&self.inner.host) as Arc<dyn Host>;
        let coordinator = Arc::new(
            Coordinator::new(entry_id, client, host)
                .with_api_disabled(self.inner.api_disabled.contains(entry_id)),
        );

        let refreshed = coordinator.refresh().await;
        self.remember_api_disabled(&coordinator);
        if let Err(e) = refreshed {
            coordinator.close();
            if coordinator.api_disabled() {
                self.inner.host.start_reauth(entry_id);
            }
            self.fail_setup(entry_id, &e.to_string(), true);
            self.schedule_retry(entry_id);
            return Err(CoreError::EntryNotReady {
                entry_id: entry_id.to_owned(),
                reason: e.to_string(),
            });
        }

        let cancel = self.inner.cancel.child_token();
        let handle = tokio::spawn(poll_task(
            Arc::clone(&coordinator),
            self.inner.options.update_interval,
            cancel.clone(),
        ));
        self.inner.loaded.insert(
            entry_id.to_owned(),
            LoadedEntry {
                coordinator,
                cancel,
                handle,
            },
        );
        self.inner.host.reauths.remove(entry_id);
        self.inner
            .states
            .insert(entry_id.to_owned(), EntryState::Loaded);

        info!(entry_id, title = %entry.title, "entry loaded");
        let _ = self.inner.event_tx.send(RuntimeEvent::Loaded {
            entry_id: entry_id.to_owned(),
        });
        Ok(())
    }

    async fn unload_locked(&self, entry_id: &str) -> bool {
        let had_retry = self.cancel_retry(entry_id);

        let Some((_, loaded)) = self.inner.loaded.remove(entry_id) else {
            self.inner.states.remove(entry_id);
            return had_retry;
        };

        loaded.cancel.cancel();
        let _ = loaded.handle.await;
        self.remember_api_disabled(&loaded.coordinator);
        loaded.coordinator.close();
        self.inner.states.remove(entry_id);

        info!(entry_id, "entry unloaded");
        let _ = self.inner.event_tx.send(RuntimeEvent::Unloaded {
            entry_id: entry_id.to_owned(),
        });
        true
    }

    fn fail_setup(&self, entry_id: &str, reason: &str, retrying: bool) {
        let state = if retrying {
            EntryState::SetupRetry
        } else {
            EntryState::SetupError
        };
        self.inner.states.insert(entry_id.to_owned(), state);
        warn!(entry_id, reason, retrying, "entry setup failed");
        let _ = self.inner.event_tx.send(RuntimeEvent::SetupFailed {
            entry_id: entry_id.to_owned(),
            reason: reason.to_owned(),
            retrying,
        });
    }

    fn remember_api_disabled(&self, coordinator: &Coordinator<F::Client>) {
        let entry_id = coordinator.entry_id();
        if coordinator.api_disabled() {
            self.inner.api_disabled.insert(entry_id.to_owned());
        } else {
            self.inner.api_disabled.remove(entry_id);
        }
    }

    fn schedule_retry(&self, entry_id: &str) {
        let cancel = self.inner.cancel.child_token();
        if let Some(previous) = self.inner.retries.insert(entry_id.to_owned(), cancel.clone()) {
            previous.cancel();
        }

        let requests = self.inner.host.requests.clone();
        let delay = self.inner.options.setup_retry_interval;
        let entry_id = entry_id.to_owned();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {}
                () = tokio::time::sleep(delay) => {
                    let _ = requests.send(RuntimeRequest::RetrySetup(entry_id));
                }
            }
        });
    }

    fn cancel_retry(&self, entry_id: &str) -> bool {
        match self.inner.retries.remove(entry_id) {
            Some((_, token)) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    // ── Observation ──────────────────────────────────────────────

    pub fn coordinator(&self, entry_id: &str) -> Option<Arc<Coordinator<F::Client>>> {
        self.inner
            .loaded
            .get(entry_id)
            .map(|loaded| Arc::clone(&loaded.coordinator))
    }

    /// Coordinators of all loaded entries, keyed by entry id.
    pub fn coordinators(&self) -> HashMap<String, Arc<Coordinator<F::Client>>> {
        self.inner
            .loaded
            .iter()
            .map(|e| (e.key().clone(), Arc::clone(&e.value().coordinator)))
            .collect()
    }

    pub fn entry_state(&self, entry_id: &str) -> EntryState {
        self.inner
            .states
            .get(entry_id)
            .map(|s| *s)
            .unwrap_or_default()
    }

    pub fn entries(&self) -> &Arc<ConfigEntries> {
        &self.inner.entries
    }

    pub fn factory(&self) -> &F {
        &self.inner.factory
    }

    pub fn options(&self) -> &RuntimeOptions {
        &self.inner.options
    }

    pub fn issues(&self) -> &IssueRegistry {
        &self.inner.host.issues
    }

    /// Entries waiting for the user to re-enable the local API.
    pub fn pending_reauth(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.inner.host.reauths.iter().map(|r| r.key().clone()).collect();
        ids.sort();
        ids
    }

    /// The host setup flows should report to.
    pub fn host(&self) -> Arc<dyn Host> {
        Arc::clone(&self.inner.host) as Arc<dyn Host>
    }

    pub fn events(&self) -> broadcast::Receiver<RuntimeEvent> {
        self.inner.event_tx.subscribe()
    }
}

// ── Background tasks ─────────────────────────────────────────────

/// Refresh a coordinator every `period` until cancelled.
async fn poll_task<C: DeviceApi>(
    coordinator: Arc<Coordinator<C>>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval.tick().await; // the setup refresh stands in for the first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    // Failures are logged and published by the coordinator.
                    _ = coordinator.refresh() => {}
                }
            }
        }
    }
    debug!(entry_id = coordinator.entry_id(), "poll task stopped");
}

/// Carry out reloads and setup retries one at a time.
async fn request_processor_task<F: ClientFactory>(
    runtime: Runtime<F>,
    mut rx: mpsc::UnboundedReceiver<RuntimeRequest>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            request = rx.recv() => {
                let Some(request) = request else { break };
                match request {
                    RuntimeRequest::Reload(entry_id) => {
                        if let Err(e) = runtime.reload_entry(&entry_id).await {
                            warn!(entry_id, error = %e, "reload failed");
                        }
                    }
                    RuntimeRequest::RetrySetup(entry_id) => {
                        if runtime.entry_state(&entry_id) != EntryState::SetupRetry {
                            continue;
                        }
                        debug!(entry_id, "retrying setup");
                        if let Err(e) = runtime.setup_entry(&entry_id).await {
                            debug!(entry_id, error = %e, "setup retry failed");
                        }
                    }
                }
            }
        }
    }
}

// ── Polling coordinator ──
//
// Owns one device client, fetches a combined snapshot per tick, runs the
// pure state transition and executes its side effects against the host.
// Listeners (sensor entities, the CLI) observe results through a `watch`
// channel instead of callbacks.

mod state;

use std::sync::Arc;

use hwinstant_api::CombinedModels;
use thiserror::Error;
use tokio::sync::{Mutex, watch};
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, error, info, warn};

use crate::client::DeviceApi;
use crate::device_info::DOMAIN;
use crate::error::CoreError;
use crate::host::Host;
use crate::issues::{Issue, api_disabled_issue_id};

pub use state::{FetchOutcome, PollState, SideEffect, Transition};

/// Why a tick produced no fresh data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpdateError {
    #[error("The local API is disabled")]
    ApiDisabled,

    #[error("Error while communicating with the device: {message}")]
    Communication { message: String },

    /// Anything the client did not classify; never touches poll state.
    #[error("Unexpected error while fetching data: {message}")]
    Unexpected { message: String },
}

impl UpdateError {
    /// Message key for user-facing text.
    pub fn translation_key(&self) -> Option<&'static str> {
        match self {
            Self::ApiDisabled => Some("api_disabled"),
            Self::Communication { .. } => Some("communication_error"),
            Self::Unexpected { .. } => None,
        }
    }
}

impl From<UpdateError> for CoreError {
    fn from(err: UpdateError) -> Self {
        match err {
            UpdateError::ApiDisabled => CoreError::ApiDisabled,
            UpdateError::Communication { message } => CoreError::CommunicationError { message },
            UpdateError::Unexpected { message } => CoreError::Internal(message),
        }
    }
}

/// What listeners see after every tick.
#[derive(Debug, Clone)]
pub struct CoordinatorUpdate {
    /// Last good snapshot; survives failed ticks.
    pub data: Option<Arc<CombinedModels>>,
    pub last_update_success: bool,
    pub api_disabled: bool,
    pub last_error: Option<UpdateError>,
}

impl Default for CoordinatorUpdate {
    fn default() -> Self {
        Self {
            data: None,
            last_update_success: true,
            api_disabled: false,
            last_error: None,
        }
    }
}

/// Per-entry polling coordinator.
pub struct Coordinator<C: DeviceApi> {
    entry_id: String,
    client: C,
    host: Arc<dyn Host>,
    /// Held for the whole fetch, so at most one is in flight.
    state: Mutex<PollState>,
    updates: watch::Sender<CoordinatorUpdate>,
}

impl<C: DeviceApi> Coordinator<C> {
    pub fn new(entry_id: impl Into<String>, client: C, host: Arc<dyn Host>) -> Self {
        let (updates, _) = watch::channel(CoordinatorUpdate::default());
        Self {
            entry_id: entry_id.into(),
            client,
            host,
            state: Mutex::new(PollState::default()),
            updates,
        }
    }

    /// Start from a known disabled flag, e.g. the one an entry had before
    /// it was reloaded, so the next success still resolves the issue.
    #[must_use]
    pub fn with_api_disabled(mut self, api_disabled: bool) -> Self {
        self.state.get_mut().api_disabled = api_disabled;
        self
    }

    pub fn entry_id(&self) -> &str {
        &self.entry_id
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Fetch once, update state and notify listeners.
    pub async fn refresh(&self) -> Result<Arc<CombinedModels>, UpdateError> {
        let mut state = self.state.lock().await;

        let outcome = match self.client.combined().await {
            Ok(data) => FetchOutcome::Success(Arc::new(data)),
            Err(e) if e.is_disabled() => FetchOutcome::Disabled,
            Err(e) if e.is_request_error() => FetchOutcome::CommunicationError(e.to_string()),
            Err(e) => {
                error!(entry_id = %self.entry_id, error = %e, "unexpected error fetching data");
                let err = UpdateError::Unexpected {
                    message: e.to_string(),
                };
                self.publish(&state, Some(&err));
                return Err(err);
            }
        };

        let Transition {
            state: next,
            effects,
            result,
        } = state.apply(outcome);
        *state = next;

        for effect in effects {
            self.run_effect(effect);
        }
        self.publish(&state, result.as_ref().err());
        result
    }

    fn run_effect(&self, effect: SideEffect) {
        match effect {
            SideEffect::ScheduleReload => {
                info!(entry_id = %self.entry_id, "local API disabled, reloading entry");
                self.host.schedule_reload(&self.entry_id);
            }
            SideEffect::RaiseIssue => {
                self.host.issues().create(Issue::api_disabled(&self.entry_id));
            }
            SideEffect::ResolveIssue => {
                self.host
                    .issues()
                    .delete(DOMAIN, &api_disabled_issue_id(&self.entry_id));
            }
        }
    }

    /// Log availability edges and broadcast the tick's result.
    fn publish(&self, state: &PollState, error: Option<&UpdateError>) {
        let was_ok = self.updates.borrow().last_update_success;
        match error {
            None if !was_ok => info!(entry_id = %self.entry_id, "fetching data recovered"),
            None => debug!(entry_id = %self.entry_id, "fetched data"),
            Some(e) if was_ok => warn!(entry_id = %self.entry_id, error = %e, "error fetching data"),
            Some(e) => debug!(entry_id = %self.entry_id, error = %e, "still failing"),
        }

        self.updates.send_replace(CoordinatorUpdate {
            data: state.snapshot.clone(),
            last_update_success: error.is_none(),
            api_disabled: state.api_disabled,
            last_error: error.cloned(),
        });
    }

    // ── Observation ──────────────────────────────────────────────

    /// Latest published update.
    pub fn current(&self) -> CoordinatorUpdate {
        self.updates.borrow().clone()
    }

    pub fn data(&self) -> Option<Arc<CombinedModels>> {
        self.updates.borrow().data.clone()
    }

    pub fn last_update_success(&self) -> bool {
        self.updates.borrow().last_update_success
    }

    pub fn api_disabled(&self) -> bool {
        self.updates.borrow().api_disabled
    }

    pub fn subscribe(&self) -> watch::Receiver<CoordinatorUpdate> {
        self.updates.subscribe()
    }

    /// Updates as a `Stream`, starting with the current value.
    pub fn updates(&self) -> WatchStream<CoordinatorUpdate> {
        WatchStream::new(self.updates.subscribe())
    }

    /// Release the device client.
    pub fn close(&self) {
        self.client.close();
    }
}

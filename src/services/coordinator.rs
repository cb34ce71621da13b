//! Discovery session coordinator.
//!
//! State machine tying the session store, the status poller and the result
//! aggregator together:
//!
//! ```text
//! Idle --start--> Starting --first update--> Running --terminal status--> Complete | Failed | Canceled
//! Idle --resume (stored id)------------------> Running
//! Starting | Running --cancel--> Canceled
//! Complete | Failed | Canceled --reset--> Idle
//! ```
//!
//! Every transition publishes a new immutable [`DiscoveryView`]. Transient
//! status failures only set a warning; the coordinator leaves `Running` when
//! the service reports a terminal status, when the operator cancels, or when
//! a resumed id cannot be confirmed.

use chrono::Utc;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

use super::aggregator;
use super::status_poller::{PollControl, PollEvent, PollerHandle, StatusPoller};
use crate::domain::errors::{DiscoveryError, ServiceError};
use crate::domain::models::{
    ActivityEntry, ActivityLevel, CoordinatorState, DiscoverySession, DiscoveryStatus,
    DiscoveryTarget, DiscoveryView, StartOptions, StartRequest,
};
use crate::domain::ports::{DiscoveryService, SessionStore};

/// Maximum number of activity entries kept in the view.
pub const ACTIVITY_CAPACITY: usize = 50;

/// Coordinator tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorSettings {
    /// Consecutive status failures tolerated before a resumed, unconfirmed
    /// session is declared failed
    pub resume_failure_threshold: u32,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            resume_failure_threshold: 5,
        }
    }
}

/// Drives one discovery session at a time and publishes its view model
///
/// Create one per screen (or CLI invocation) and drop it on teardown; dropping
/// stops the background poller but leaves the persisted session id in place so
/// a later coordinator can resume it.
pub struct DiscoveryCoordinator {
    service: Arc<dyn DiscoveryService>,
    poller: StatusPoller,
    shared: Arc<Shared>,
    settings: CoordinatorSettings,
    /// Serialises commands and owns the running poller
    handle: tokio::sync::Mutex<Option<PollerHandle>>,
}

impl DiscoveryCoordinator {
    /// Create an idle coordinator without touching the store
    pub fn new(
        service: Arc<dyn DiscoveryService>,
        store: Arc<dyn SessionStore>,
        poller: StatusPoller,
        settings: CoordinatorSettings,
    ) -> Self {
        let (view_tx, _) = watch::channel(Arc::new(DiscoveryView::default()));
        Self {
            service,
            poller,
            shared: Arc::new(Shared {
                core: Mutex::new(SessionCore::default()),
                view_tx,
                store,
            }),
            settings,
            handle: tokio::sync::Mutex::new(None),
        }
    }

    /// Create a coordinator and reconnect to a persisted session, if any.
    ///
    /// Must be called from within a Tokio runtime. A store that cannot be read
    /// is cleared and the coordinator stays idle.
    pub async fn mount(
        service: Arc<dyn DiscoveryService>,
        store: Arc<dyn SessionStore>,
        poller: StatusPoller,
        settings: CoordinatorSettings,
    ) -> Self {
        let coordinator = Self::new(service, store, poller, settings);
        if let Err(err) = coordinator.resume().await {
            tracing::warn!(error = %err, "could not resume persisted discovery session");
            coordinator.shared.update(|core| {
                core.log(
                    ActivityLevel::Warn,
                    format!("Could not resume stored session: {err}"),
                );
            });
            if let Err(err) = coordinator.shared.store.clear() {
                tracing::error!(error = %err, "failed to clear discovery session store");
            }
        }
        coordinator
    }

    /// Latest view snapshot
    pub fn view(&self) -> Arc<DiscoveryView> {
        self.shared.view_tx.borrow().clone()
    }

    /// Current state
    pub fn state(&self) -> CoordinatorState {
        self.shared.lock().state
    }

    /// Receiver notified with every new view snapshot
    pub fn subscribe(&self) -> watch::Receiver<Arc<DiscoveryView>> {
        self.shared.view_tx.subscribe()
    }

    /// Start a new search for a domain or URL.
    ///
    /// Only valid while idle. Blank input is rejected without contacting the
    /// service. A refusal leaves the coordinator idle and carries the service's
    /// message verbatim.
    pub async fn start(
        &self,
        target: &str,
        options: StartOptions,
    ) -> Result<Arc<DiscoveryView>, DiscoveryError> {
        let mut handle = self.handle.lock().await;
        self.ensure_state(|state| state == CoordinatorState::Idle, "start")?;

        let target = DiscoveryTarget::parse(target).ok_or(DiscoveryError::EmptyTarget)?;
        let request = StartRequest {
            target: target.clone(),
            options,
        };

        let response = match self.service.start(&request).await {
            Ok(response) => response,
            Err(err) => {
                let message = match err {
                    ServiceError::Rejected { message, .. } => message,
                    other => other.to_string(),
                };
                tracing::warn!(
                    discovery_target = %target.as_str(),
                    error = %message,
                    "discovery start rejected"
                );
                self.shared.update(|core| {
                    core.last_error = Some(message.clone());
                    core.log(ActivityLevel::Error, format!("Start rejected: {message}"));
                });
                return Err(DiscoveryError::StartRejected(message));
            }
        };

        let store_warning = self.shared.store.save(&response.id).err().map(|err| {
            tracing::warn!(session_id = %response.id, error = %err, "failed to persist discovery session id");
            // An older id left in the store must not outlive this session
            self.shared.clear_store();
            format!("Session id not persisted, it cannot be resumed after a restart: {err}")
        });

        tracing::info!(
            session_id = %response.id,
            discovery_target = %target.as_str(),
            estimated_tests = ?response.estimated_tests,
            "discovery started"
        );

        let generation = self.shared.update(|core| {
            core.begin(response.id.clone(), CoordinatorState::Starting, true);
            core.warning = store_warning;
            let estimate = response
                .estimated_tests
                .map(|n| format!(", about {n} checks"))
                .unwrap_or_default();
            core.log(
                ActivityLevel::Info,
                format!(
                    "Discovery {} started for {}{estimate}",
                    response.id,
                    target.as_str()
                ),
            );
            if let Some(message) = &response.message {
                core.log(ActivityLevel::Info, message.clone());
            }
            core.generation
        });

        *handle = Some(self.spawn_poller(response.id, generation));
        Ok(self.view())
    }

    /// Reconnect to the session id held by the store.
    ///
    /// Only valid while idle. Returns `false` when nothing is stored. No start
    /// request is issued: the coordinator goes straight to `Running` and begins
    /// synchronising, treating the id as unconfirmed until the service answers.
    pub async fn resume(&self) -> Result<bool, DiscoveryError> {
        let mut handle = self.handle.lock().await;
        self.ensure_state(|state| state == CoordinatorState::Idle, "resume")?;

        let Some(session_id) = self.shared.store.load()? else {
            return Ok(false);
        };

        tracing::info!(session_id = %session_id, "resuming discovery session");
        let generation = self.shared.update(|core| {
            core.begin(session_id.clone(), CoordinatorState::Running, false);
            core.log(
                ActivityLevel::Info,
                format!("Reconnecting to discovery {session_id}"),
            );
            core.generation
        });

        *handle = Some(self.spawn_poller(session_id, generation));
        Ok(true)
    }

    /// Stop tracking the active session and ask the service to cancel it.
    ///
    /// Local tracking always ends in `Canceled`, even when the cancel request
    /// cannot be delivered; the remote job may keep running in that case.
    pub async fn cancel(&self) -> Result<Arc<DiscoveryView>, DiscoveryError> {
        let mut handle = self.handle.lock().await;
        self.ensure_state(CoordinatorState::is_active, "cancel")?;

        if let Some(poller) = handle.take() {
            poller.stop().await;
        }

        // The poller may have delivered a terminal status before it stopped.
        let session_id = {
            let mut core = self.shared.lock();
            if !core.state.is_active() {
                return Err(DiscoveryError::InvalidTransition {
                    state: core.state,
                    action: "cancel",
                });
            }
            core.generation += 1;
            core.state = CoordinatorState::Canceled;
            core.log(ActivityLevel::Info, "Discovery canceled".to_string());
            core.session_id.clone()
        };
        self.shared.clear_store();
        self.shared.publish();

        if let Some(session_id) = session_id {
            match self.service.cancel(&session_id).await {
                Ok(()) => {
                    tracing::info!(session_id = %session_id, "discovery canceled");
                }
                Err(err) => {
                    tracing::warn!(
                        session_id = %session_id,
                        error = %err,
                        "cancel request failed, remote search may still be running"
                    );
                    self.shared.update(|core| {
                        core.warning = Some(format!("Cancel request failed: {err}"));
                        core.log(
                            ActivityLevel::Warn,
                            format!("Cancel request not delivered: {err}"),
                        );
                    });
                }
            }
        }

        Ok(self.view())
    }

    /// Forget a finished session and return to `Idle`.
    ///
    /// Only valid from a terminal state. Does not contact the service.
    pub async fn reset(&self) -> Result<Arc<DiscoveryView>, DiscoveryError> {
        let mut handle = self.handle.lock().await;
        self.ensure_state(CoordinatorState::is_terminal, "reset")?;

        drop(handle.take());
        self.shared.store.clear()?;
        self.shared.update(|core| {
            core.clear_session();
            core.log(ActivityLevel::Info, "Session cleared".to_string());
        });
        tracing::debug!("discovery coordinator reset");
        Ok(self.view())
    }

    /// Stop background synchronisation without changing state or the store.
    pub async fn shutdown(&self) {
        if let Some(poller) = self.handle.lock().await.take() {
            poller.stop().await;
        }
    }

    fn ensure_state(
        &self,
        allowed: impl Fn(CoordinatorState) -> bool,
        action: &'static str,
    ) -> Result<(), DiscoveryError> {
        let state = self.state();
        if allowed(state) {
            Ok(())
        } else {
            Err(DiscoveryError::InvalidTransition { state, action })
        }
    }

    fn spawn_poller(&self, session_id: String, generation: u64) -> PollerHandle {
        let shared = Arc::clone(&self.shared);
        let threshold = self.settings.resume_failure_threshold;
        self.poller.spawn(session_id, move |event| {
            shared.apply(generation, threshold, event)
        })
    }
}

struct Shared {
    core: Mutex<SessionCore>,
    view_tx: watch::Sender<Arc<DiscoveryView>>,
    store: Arc<dyn SessionStore>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SessionCore> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mutate the core and publish the resulting view.
    fn update<T>(&self, change: impl FnOnce(&mut SessionCore) -> T) -> T {
        let mut core = self.lock();
        let result = change(&mut core);
        self.view_tx.send_replace(Arc::new(core.view()));
        result
    }

    fn publish(&self) {
        let core = self.lock();
        self.view_tx.send_replace(Arc::new(core.view()));
    }

    fn clear_store(&self) {
        if let Err(err) = self.store.clear() {
            tracing::error!(error = %err, "failed to clear discovery session store");
        }
    }

    /// Fold one poller event into the state machine.
    fn apply(&self, generation: u64, threshold: u32, event: PollEvent) -> PollControl {
        let mut core = self.lock();
        if core.generation != generation || !core.state.is_active() {
            return PollControl::Stop;
        }

        let control = match event {
            PollEvent::Update(session) => core.accept(session),
            PollEvent::Failed(err) => core.record_failure(&err, threshold),
        };

        let terminal = core.state.is_terminal();
        drop(core);

        // Clear outside the core lock, before the terminal view is published.
        if terminal {
            self.clear_store();
        }
        self.publish();
        control
    }
}

#[derive(Default)]
struct SessionCore {
    state: CoordinatorState,
    session_id: Option<String>,
    session: Option<DiscoverySession>,
    confirmed: bool,
    resume_failures: u32,
    generation: u64,
    last_error: Option<String>,
    warning: Option<String>,
    activity: VecDeque<ActivityEntry>,
}

impl SessionCore {
    fn begin(&mut self, session_id: String, state: CoordinatorState, confirmed: bool) {
        self.clear_session();
        self.generation += 1;
        self.state = state;
        self.session_id = Some(session_id);
        self.confirmed = confirmed;
    }

    fn clear_session(&mut self) {
        self.state = CoordinatorState::Idle;
        self.session_id = None;
        self.session = None;
        self.confirmed = false;
        self.resume_failures = 0;
        self.last_error = None;
        self.warning = None;
    }

    fn log(&mut self, level: ActivityLevel, message: String) {
        if self.activity.len() == ACTIVITY_CAPACITY {
            self.activity.pop_front();
        }
        self.activity.push_back(ActivityEntry {
            at: Utc::now(),
            level,
            message,
        });
    }

    fn accept(&mut self, session: DiscoverySession) -> PollControl {
        let expected = self.session_id.as_deref().unwrap_or_default();
        if session.id != expected {
            tracing::warn!(
                expected = %expected,
                received = %session.id,
                "status response for a different session ignored"
            );
            self.warning = Some(format!(
                "Ignored status for unexpected session {}",
                session.id
            ));
            return PollControl::Continue;
        }

        if let Some(current) = &self.session {
            if !session.is_terminal() && session.completed_checks < current.completed_checks {
                tracing::debug!(
                    session_id = %session.id,
                    held = current.completed_checks,
                    received = session.completed_checks,
                    "stale status response discarded"
                );
                return PollControl::Continue;
            }
        }

        let session = aggregator::reconcile(session);
        let previous_phase = self.session.as_ref().and_then(|s| s.current_phase);
        if let Some(phase) = session.current_phase {
            if previous_phase != Some(phase) {
                self.log(ActivityLevel::Info, format!("Phase: {phase}"));
            }
        }

        if !self.confirmed {
            self.log(
                ActivityLevel::Info,
                format!("Discovery {} confirmed by the service", session.id),
            );
        }
        self.confirmed = true;
        self.resume_failures = 0;
        self.warning = None;

        let control = match session.status {
            DiscoveryStatus::Pending | DiscoveryStatus::Running => {
                self.state = CoordinatorState::Running;
                PollControl::Continue
            }
            DiscoveryStatus::Complete => {
                tracing::info!(session_id = %session.id, "discovery complete");
                self.state = CoordinatorState::Complete;
                self.log(ActivityLevel::Info, "Discovery complete".to_string());
                PollControl::Stop
            }
            DiscoveryStatus::Failed => {
                let message = session
                    .error
                    .clone()
                    .unwrap_or_else(|| "The discovery service reported a failure".to_string());
                tracing::warn!(session_id = %session.id, error = %message, "discovery failed");
                self.state = CoordinatorState::Failed;
                self.log(ActivityLevel::Error, format!("Discovery failed: {message}"));
                self.last_error = Some(message);
                PollControl::Stop
            }
            DiscoveryStatus::Canceled => {
                tracing::info!(session_id = %session.id, "discovery canceled by the service");
                self.state = CoordinatorState::Canceled;
                self.log(
                    ActivityLevel::Info,
                    "Discovery canceled by the service".to_string(),
                );
                PollControl::Stop
            }
        };

        self.session = Some(session);
        control
    }

    fn record_failure(&mut self, err: &ServiceError, threshold: u32) -> PollControl {
        let session_id = self.session_id.clone().unwrap_or_default();

        if !self.confirmed {
            self.resume_failures += 1;
            let reason = if err.is_not_found() {
                Some(format!(
                    "Session {session_id} is no longer known to the discovery service"
                ))
            } else if self.resume_failures >= threshold {
                Some(format!(
                    "Could not confirm session {session_id} after {} attempts: {err}",
                    self.resume_failures
                ))
            } else {
                None
            };

            if let Some(reason) = reason {
                tracing::warn!(session_id = %session_id, error = %reason, "resume failed");
                self.state = CoordinatorState::Failed;
                self.log(ActivityLevel::Error, reason.clone());
                self.last_error = Some(reason);
                return PollControl::Stop;
            }
        }

        self.warning = Some(err.to_string());
        self.log(ActivityLevel::Warn, format!("Status update failed: {err}"));
        PollControl::Continue
    }

    fn view(&self) -> DiscoveryView {
        let (progress, ranked_domains, grouped_results) = match &self.session {
            Some(session) => (
                aggregator::progress(session),
                aggregator::rank_domains(session),
                session
                    .domain_results
                    .iter()
                    .map(|(name, domain)| (name.clone(), aggregator::group_by_phase(domain)))
                    .collect(),
            ),
            None => Default::default(),
        };

        DiscoveryView {
            state: self.state,
            session_id: self.session_id.clone(),
            session: self.session.clone(),
            confirmed: self.confirmed,
            progress,
            ranked_domains,
            grouped_results,
            last_error: self.last_error.clone(),
            warning: self.warning.clone(),
            activity: self.activity.iter().cloned().collect(),
        }
    }
}

//! Status synchronisation for a single discovery session.
//!
//! The poller owns one background task per tracked session. In poll mode the
//! task issues one status request per tick and never starts a second request
//! while one is outstanding: ticks that fall due during a slow request are
//! skipped, not queued. In push mode it consumes the service's event stream
//! and reconnects after a disconnect, falling back to polling when the service
//! has no push channel.
//!
//! Failures are handed to the handler as `PollEvent::Failed` and the loop keeps
//! going; only a terminal status, a `PollControl::Stop` from the handler, an
//! explicit `stop()` or dropping the handle ends it.

use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::domain::errors::ServiceError;
use crate::domain::models::{DeliveryMode, DiscoverySession};
use crate::domain::ports::DiscoveryService;

/// Something the poller learned about the session
#[derive(Debug, Clone, PartialEq)]
pub enum PollEvent {
    /// A freshly decoded snapshot
    Update(DiscoverySession),
    /// The status fetch failed; polling continues unless the handler says otherwise
    Failed(ServiceError),
}

/// Handler verdict after each event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollControl {
    /// Keep synchronising
    Continue,
    /// End the loop
    Stop,
}

type Handler = Box<dyn FnMut(PollEvent) -> PollControl + Send>;

/// Spawns status synchronisation tasks against a Discovery Service
#[derive(Clone)]
pub struct StatusPoller {
    service: Arc<dyn DiscoveryService>,
    interval: Duration,
    mode: DeliveryMode,
}

impl StatusPoller {
    /// Default delay between status requests.
    pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(1500);

    /// Create a poll-mode poller with the default interval
    pub fn new(service: Arc<dyn DiscoveryService>) -> Self {
        Self::with_config(service, Self::DEFAULT_INTERVAL, DeliveryMode::Poll)
    }

    /// Create a poller with custom interval and delivery mode
    pub fn with_config(
        service: Arc<dyn DiscoveryService>,
        interval: Duration,
        mode: DeliveryMode,
    ) -> Self {
        Self {
            service,
            interval,
            mode,
        }
    }

    /// Configured interval
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Start synchronising `session_id`, delivering every event to `handler`.
    ///
    /// The first request goes out immediately. The returned handle stops the
    /// task when `stop()` is awaited or when it is dropped.
    pub fn spawn<F>(&self, session_id: String, handler: F) -> PollerHandle
    where
        F: FnMut(PollEvent) -> PollControl + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let worker = Worker {
            service: Arc::clone(&self.service),
            interval: self.interval,
            session_id,
            handler: Box::new(handler),
            shutdown: shutdown_rx,
        };
        let mode = self.mode;

        let task = tokio::spawn(async move {
            tracing::debug!(
                session_id = %worker.session_id,
                interval_ms = u64::try_from(worker.interval.as_millis()).unwrap_or(u64::MAX),
                mode = ?mode,
                "status synchronisation started"
            );
            let session_id = worker.session_id.clone();
            match mode {
                DeliveryMode::Poll => worker.poll_loop().await,
                DeliveryMode::Push => worker.push_loop().await,
            }
            tracing::debug!(session_id = %session_id, "status synchronisation stopped");
        });

        PollerHandle {
            shutdown: Some(shutdown_tx),
            task: Some(task),
        }
    }
}

/// Owner of a running synchronisation task
///
/// Dropping the handle aborts the task, so every exit path of the owner stops
/// polling.
#[derive(Debug)]
pub struct PollerHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl PollerHandle {
    /// Signal the task to stop and wait until it has exited.
    ///
    /// An in-flight request is abandoned.
    pub async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                if err.is_panic() {
                    tracing::error!(error = %err, "status poller task panicked");
                }
            }
        }
    }

    /// Wait for the task to end on its own (terminal status or handler stop).
    pub async fn wait(mut self) {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    /// Returns true once the task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

struct Worker {
    service: Arc<dyn DiscoveryService>,
    interval: Duration,
    session_id: String,
    handler: Handler,
    shutdown: oneshot::Receiver<()>,
}

enum Flow {
    Continue,
    Done,
}

impl Worker {
    fn deliver(&mut self, result: Result<DiscoverySession, ServiceError>) -> Flow {
        match result {
            Ok(session) => {
                let terminal = session.is_terminal();
                let control = (self.handler)(PollEvent::Update(session));
                if terminal || control == PollControl::Stop {
                    Flow::Done
                } else {
                    Flow::Continue
                }
            }
            Err(err) => {
                tracing::warn!(
                    session_id = %self.session_id,
                    error = %err,
                    "status fetch failed"
                );
                match (self.handler)(PollEvent::Failed(err)) {
                    PollControl::Continue => Flow::Continue,
                    PollControl::Stop => Flow::Done,
                }
            }
        }
    }

    async fn poll_loop(mut self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = &mut self.shutdown => return,
                _ = ticker.tick() => {}
            }

            let service = Arc::clone(&self.service);
            let result = tokio::select! {
                _ = &mut self.shutdown => return,
                result = service.status(&self.session_id) => result,
            };

            if matches!(self.deliver(result), Flow::Done) {
                return;
            }
        }
    }

    async fn push_loop(mut self) {
        loop {
            let service = Arc::clone(&self.service);
            let subscription = tokio::select! {
                _ = &mut self.shutdown => return,
                subscription = service.subscribe(&self.session_id) => subscription,
            };

            match subscription {
                Ok(mut stream) => loop {
                    let next = tokio::select! {
                        _ = &mut self.shutdown => return,
                        next = stream.next() => next,
                    };
                    let Some(item) = next else {
                        let closed =
                            ServiceError::Transport("push stream closed".to_string());
                        if matches!(self.deliver(Err(closed)), Flow::Done) {
                            return;
                        }
                        break;
                    };
                    if matches!(self.deliver(item), Flow::Done) {
                        return;
                    }
                },
                Err(ServiceError::Unsupported(_) | ServiceError::NotFound(_)) => {
                    tracing::info!(
                        session_id = %self.session_id,
                        "push updates unavailable, falling back to polling"
                    );
                    return self.poll_loop().await;
                }
                Err(err) => {
                    if matches!(self.deliver(Err(err)), Flow::Done) {
                        return;
                    }
                }
            }

            tokio::select! {
                _ = &mut self.shutdown => return,
                () = tokio::time::sleep(self.interval) => {}
            }
        }
    }
}

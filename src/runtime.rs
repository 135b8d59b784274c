//! Runtime for executing interview sessions
//!
//! Each session owns one `InterviewRuntime` behind an async mutex. A request
//! that finds the mutex taken is rejected rather than queued, so at most one
//! transition (and one completion call) runs per session.
//!
//! Events run on a spawned task holding the mutex. If the request that sent
//! the event goes away, its completion is cancelled and the task still
//! commits the failure, so the session never stays busy.

mod executor;

#[cfg(test)]
pub mod testing;

pub use executor::InterviewRuntime;

use crate::interview::{Event, SessionSnapshot, TransitionError};
use crate::llm::{CompletionClient, LlmError, LlmErrorKind};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, watch, Mutex, RwLock};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Errors surfaced to the presentation layer
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Completion(#[from] LlmError),
    #[error("No completion client is configured, set GEMINI_API_KEY")]
    CompletionUnavailable,
    #[error("Session {0} not found")]
    NotFound(Uuid),
    #[error("Session is busy with another request")]
    Busy,
    #[error("Session task failed: {0}")]
    Internal(String),
}

impl SessionError {
    /// Stable machine-readable tag for API error bodies
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transition(TransitionError::Validation(_)) => "validation",
            Self::Transition(TransitionError::Busy) | Self::Busy => "busy",
            Self::Transition(TransitionError::TurnBudgetExhausted) => "turn_budget_exhausted",
            Self::Transition(TransitionError::NothingToRetry) => "nothing_to_retry",
            Self::Transition(TransitionError::InvalidTransition { .. }) => "invalid_transition",
            Self::Completion(e) => e.kind.as_str(),
            Self::CompletionUnavailable => "completion_unavailable",
            Self::NotFound(_) => "not_found",
            Self::Internal(_) => "internal",
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Completion(e) if e.kind == LlmErrorKind::Cancelled)
    }
}

/// Events sent to SSE subscribers of a session
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Init { snapshot: SessionSnapshot },
    /// Live text of an interviewer reply that is still streaming
    Fragment { text: String },
    StateChange { snapshot: SessionSnapshot },
    Error { message: String, kind: &'static str },
}

/// Cancellation token of the completion currently running in a session
#[derive(Clone, Default)]
pub(crate) struct InFlight(Arc<Mutex<Option<CancellationToken>>>);

impl InFlight {
    pub(crate) async fn register(&self, token: CancellationToken) {
        *self.0.lock().await = Some(token);
    }

    pub(crate) async fn finish(&self) {
        self.0.lock().await.take();
    }

    /// Cancel the running completion, if any. Returns whether one was running.
    pub(crate) async fn cancel(&self) -> bool {
        match self.0.lock().await.take() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}

/// Handle to interact with one session
pub struct SessionHandle {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    runtime: Arc<Mutex<InterviewRuntime>>,
    broadcast_tx: broadcast::Sender<SessionEvent>,
    snapshot_rx: watch::Receiver<SessionSnapshot>,
    in_flight: InFlight,
    last_active: Mutex<Instant>,
}

impl SessionHandle {
    /// Latest committed snapshot; readable while a transition is running
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.broadcast_tx.subscribe()
    }

    async fn touch(&self) {
        *self.last_active.lock().await = Instant::now();
    }

    /// Untouched for `ttl`, with no event running and no stream connected
    async fn is_idle(&self, now: Instant, ttl: Duration) -> bool {
        if self.runtime.try_lock().is_err() || self.broadcast_tx.receiver_count() > 0 {
            return false;
        }
        now.saturating_duration_since(*self.last_active.lock().await) >= ttl
    }
}

/// Manager for all interview sessions
pub struct SessionManager {
    sessions: RwLock<HashMap<Uuid, Arc<SessionHandle>>>,
    client: Option<Arc<dyn CompletionClient>>,
    request_timeout: Duration,
}

impl SessionManager {
    pub fn new(client: Option<Arc<dyn CompletionClient>>, request_timeout: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            client,
            request_timeout,
        }
    }

    pub fn has_client(&self) -> bool {
        self.client.is_some()
    }

    /// Create a fresh session in the Setup phase
    pub async fn create(&self) -> Arc<SessionHandle> {
        let id = Uuid::new_v4();
        let (broadcast_tx, _) = broadcast::channel(256);
        let in_flight = InFlight::default();
        let runtime = InterviewRuntime::new(
            id,
            self.client.clone(),
            self.request_timeout,
            broadcast_tx.clone(),
            in_flight.clone(),
        );
        let snapshot_rx = runtime.watch();

        let handle = Arc::new(SessionHandle {
            id,
            created_at: Utc::now(),
            runtime: Arc::new(Mutex::new(runtime)),
            broadcast_tx,
            snapshot_rx,
            in_flight,
            last_active: Mutex::new(Instant::now()),
        });
        self.sessions.write().await.insert(id, Arc::clone(&handle));

        tracing::info!(session_id = %id, "Session created");
        handle
    }

    pub async fn get(&self, id: Uuid) -> Result<Arc<SessionHandle>, SessionError> {
        let handle = self
            .sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(SessionError::NotFound(id))?;
        handle.touch().await;
        Ok(handle)
    }

    /// Run one presentation event through the session.
    ///
    /// Rejected with `Busy` if another event is still being handled. Dropping
    /// the returned future cancels the completion the event started.
    pub async fn dispatch(&self, id: Uuid, event: Event) -> Result<SessionSnapshot, SessionError> {
        let handle = self.get(id).await?;
        let Ok(mut runtime) = Arc::clone(&handle.runtime).try_lock_owned() else {
            tracing::debug!(session_id = %id, event = event.name(), "Session busy, rejecting");
            return Err(SessionError::Busy);
        };

        let cancel = CancellationToken::new();
        handle.in_flight.register(cancel.clone()).await;
        let on_drop = cancel.clone().drop_guard();
        let in_flight = handle.in_flight.clone();
        let task = tokio::spawn(async move {
            let result = runtime.handle_with(event, cancel).await;
            in_flight.finish().await;
            result
        });
        let outcome = task.await;
        on_drop.disarm();
        settle(id, outcome)
    }

    /// Restart is accepted even mid-call: the running completion is cancelled
    /// and the restart applies once it has settled.
    pub async fn restart(&self, id: Uuid) -> Result<SessionSnapshot, SessionError> {
        let handle = self.get(id).await?;
        if handle.in_flight.cancel().await {
            tracing::info!(session_id = %id, "Cancelled in-flight completion for restart");
        }
        let mut runtime = Arc::clone(&handle.runtime).lock_owned().await;
        let task = tokio::spawn(async move { runtime.handle(Event::Restart).await });
        settle(id, task.await)
    }

    /// Cancel the completion running in a session. Returns whether one was running.
    pub async fn cancel(&self, id: Uuid) -> Result<bool, SessionError> {
        let handle = self.get(id).await?;
        let cancelled = handle.in_flight.cancel().await;
        tracing::info!(session_id = %id, cancelled, "Cancel requested");
        Ok(cancelled)
    }

    /// Tear a session down, cancelling any running completion
    pub async fn remove(&self, id: Uuid) -> Result<(), SessionError> {
        let handle = self
            .sessions
            .write()
            .await
            .remove(&id)
            .ok_or(SessionError::NotFound(id))?;
        handle.in_flight.cancel().await;
        tracing::info!(session_id = %id, "Session removed");
        Ok(())
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drop every session idle for at least `ttl`. Returns how many went.
    pub async fn evict_idle(&self, ttl: Duration) -> usize {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;

        let mut idle = Vec::new();
        for (id, handle) in sessions.iter() {
            if handle.is_idle(now, ttl).await {
                idle.push(*id);
            }
        }
        for id in &idle {
            sessions.remove(id);
            tracing::info!(session_id = %id, ttl_secs = ttl.as_secs(), "Session evicted");
        }
        idle.len()
    }

    /// Spawn the periodic idle sweep. It ends once the manager is dropped.
    pub fn spawn_idle_sweeper(self: &Arc<Self>, ttl: Duration) -> JoinHandle<()> {
        let manager = Arc::downgrade(self);
        let period = (ttl / 4).clamp(Duration::from_secs(1), Duration::from_secs(60));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(manager) = manager.upgrade() else {
                    break;
                };
                let evicted = manager.evict_idle(ttl).await;
                if evicted > 0 {
                    let remaining = manager.session_count().await;
                    tracing::info!(
                        evicted,
                        remaining,
                        "Idle sweep finished"
                    );
                }
            }
        })
    }
}

fn settle(
    id: Uuid,
    outcome: Result<Result<SessionSnapshot, SessionError>, JoinError>,
) -> Result<SessionSnapshot, SessionError> {
    outcome.unwrap_or_else(|e| {
        tracing::error!(session_id = %id, error = %e, "Session task failed");
        Err(SessionError::Internal(e.to_string()))
    })
}

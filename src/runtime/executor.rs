//! Interview runtime executor

use super::{InFlight, SessionError, SessionEvent};

use crate::interview::{transition, Effect, Event, SessionSnapshot, SessionState};
use crate::llm::{ChatMessage, CompletionClient, CompletionRequest, LlmError, LlmErrorKind};
use futures::StreamExt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Runs transitions for one session and executes their effects
pub struct InterviewRuntime {
    session_id: Uuid,
    state: SessionState,
    client: Option<Arc<dyn CompletionClient>>,
    request_timeout: Duration,
    broadcast_tx: broadcast::Sender<SessionEvent>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    in_flight: InFlight,
}

impl InterviewRuntime {
    pub(crate) fn new(
        session_id: Uuid,
        client: Option<Arc<dyn CompletionClient>>,
        request_timeout: Duration,
        broadcast_tx: broadcast::Sender<SessionEvent>,
        in_flight: InFlight,
    ) -> Self {
        let state = SessionState::new();
        let (snapshot_tx, _) = watch::channel(state.snapshot());
        Self {
            session_id,
            state,
            client,
            request_timeout,
            broadcast_tx,
            snapshot_tx,
            in_flight,
        }
    }

    pub(crate) fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Handle one presentation event, including the completion it may trigger.
    ///
    /// State is committed after every transition, so a failed completion
    /// leaves the session exactly as the failure transition settled it.
    pub async fn handle(&mut self, event: Event) -> Result<SessionSnapshot, SessionError> {
        let cancel = CancellationToken::new();
        self.in_flight.register(cancel.clone()).await;
        let result = self.handle_with(event, cancel).await;
        self.in_flight.finish().await;
        result
    }

    /// Like [`handle`](Self::handle), with `cancel` bounding any completion
    /// the event triggers. The caller registers `cancel` before calling, so
    /// the session can be cancelled as soon as it reports busy.
    pub(crate) async fn handle_with(
        &mut self,
        event: Event,
        cancel: CancellationToken,
    ) -> Result<SessionSnapshot, SessionError> {
        let mut events = vec![event];
        let mut failure = None;

        while let Some(current) = events.pop() {
            let name = current.name();
            let result = match transition(&self.state, current) {
                Ok(r) => r,
                Err(e) => {
                    if e.is_invariant_violation() {
                        tracing::warn!(
                            session_id = %self.session_id,
                            phase = %self.state.phase,
                            event = name,
                            error = %e,
                            "Rejected event"
                        );
                    } else {
                        tracing::debug!(session_id = %self.session_id, event = name, error = %e, "Rejected event");
                    }
                    return Err(e.into());
                }
            };

            // Nothing is committed if the call this event needs cannot be made
            if self.client.is_none() && result.effects.iter().any(Effect::is_completion) {
                tracing::warn!(session_id = %self.session_id, event = name, "No completion client configured");
                return Err(SessionError::CompletionUnavailable);
            }

            self.commit(result.new_state, name);

            for effect in result.effects {
                match self.execute_effect(effect, &cancel).await {
                    Ok(Some(generated)) => events.push(generated),
                    Ok(None) => {}
                    Err(e) => failure = Some(e),
                }
            }
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(self.state.snapshot()),
        }
    }

    fn commit(&mut self, new_state: SessionState, event: &'static str) {
        let old_phase = self.state.phase;
        self.state = new_state;

        tracing::info!(
            session_id = %self.session_id,
            event,
            phase = %self.state.phase,
            turn = self.state.turn,
            "State committed"
        );
        if old_phase != self.state.phase {
            tracing::info!(
                session_id = %self.session_id,
                from = %old_phase,
                to = %self.state.phase,
                "Phase changed"
            );
        }

        let snapshot = self.state.snapshot();
        self.snapshot_tx.send_replace(snapshot.clone());
        let _ = self.broadcast_tx.send(SessionEvent::StateChange { snapshot });
    }

    /// Execute an effect and optionally return a generated event
    async fn execute_effect(
        &mut self,
        effect: Effect,
        cancel: &CancellationToken,
    ) -> Result<Option<Event>, SessionError> {
        match effect {
            Effect::StreamReply { messages } => {
                let event = match self.stream_reply(messages, cancel).await {
                    Ok(text) => Event::ReplyCompleted { text },
                    Err(error) => Event::ReplyFailed { error },
                };
                Ok(Some(event))
            }

            Effect::RequestFeedback { messages } => {
                let event = match self.request_feedback(messages, cancel).await {
                    Ok(text) => Event::FeedbackCompleted { text },
                    Err(error) => Event::FeedbackFailed { error },
                };
                Ok(Some(event))
            }

            Effect::ReportFailure { error } => {
                if error.kind == LlmErrorKind::Cancelled {
                    tracing::info!(session_id = %self.session_id, "Completion cancelled");
                } else {
                    tracing::error!(
                        session_id = %self.session_id,
                        phase = %self.state.phase,
                        kind = ?error.kind,
                        class = ?error.kind.class(),
                        error = %error.message,
                        "Completion failed"
                    );
                }
                let _ = self.broadcast_tx.send(SessionEvent::Error {
                    message: error.message.clone(),
                    kind: error.kind.as_str(),
                });
                Err(SessionError::Completion(error))
            }
        }
    }

    fn client(&self) -> Result<Arc<dyn CompletionClient>, LlmError> {
        self.client
            .clone()
            .ok_or_else(|| LlmError::auth("No completion client configured"))
    }

    /// Stream the interviewer reply, broadcasting fragments as they arrive.
    /// The reply is only returned once the stream has ended.
    async fn stream_reply(
        &self,
        messages: Vec<ChatMessage>,
        cancel: &CancellationToken,
    ) -> Result<String, LlmError> {
        let client = self.client()?;
        let request = CompletionRequest::new(messages);
        let broadcast_tx = self.broadcast_tx.clone();

        let text = self
            .bounded(cancel, async move {
                let mut stream = client.stream(&request).await?;
                let mut buffer = String::new();
                while let Some(fragment) = stream.next().await {
                    let fragment = fragment?;
                    buffer.push_str(&fragment);
                    let _ = broadcast_tx.send(SessionEvent::Fragment { text: fragment });
                }
                Ok::<_, LlmError>(buffer)
            })
            .await?;

        non_empty(text)
    }

    async fn request_feedback(
        &self,
        messages: Vec<ChatMessage>,
        cancel: &CancellationToken,
    ) -> Result<String, LlmError> {
        let client = self.client()?;
        let request = CompletionRequest::new(messages);

        let response = self
            .bounded(cancel, async move { client.complete(&request).await })
            .await?;

        non_empty(response.content)
    }

    /// Race a completion against cancellation and the request timeout
    async fn bounded<T, F>(&self, cancel: &CancellationToken, call: F) -> Result<T, LlmError>
    where
        F: Future<Output = Result<T, LlmError>>,
    {
        let limit = self.request_timeout;

        tokio::select! {
            biased;

            () = cancel.cancelled() => Err(LlmError::cancelled()),

            outcome = tokio::time::timeout(limit, call) => {
                outcome.unwrap_or_else(|_| Err(LlmError::timeout(limit)))
            }
        }
    }
}

fn non_empty(text: String) -> Result<String, LlmError> {
    if text.trim().is_empty() {
        return Err(LlmError::malformed("Completion returned no text"));
    }
    Ok(text)
}

impl std::fmt::Debug for InterviewRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterviewRuntime")
            .field("session_id", &self.session_id)
            .field("phase", &self.state.phase)
            .field("turn", &self.state.turn)
            .finish_non_exhaustive()
    }
}

//! Pure state transition function
//!
//! Given the same state and event this always produces the same new state and
//! effects. Completion calls are requested through effects and their outcome
//! comes back as `ReplyCompleted`/`ReplyFailed`/`FeedbackCompleted`/
//! `FeedbackFailed` events.

use super::prompts::{build_feedback_messages, build_system_prompt};
use super::state::{
    validate_answer, Phase, PendingCompletion, SessionState, ValidationError, ANSWERED_TURNS,
    MAX_TURNS,
};
use super::{Effect, Event};
use crate::llm::{ChatMessage, Role};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: SessionState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: SessionState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Errors that can occur during transition. The state is never modified.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("A completion is in progress, wait for it to finish")]
    Busy,
    #[error("All answers for this interview have been given")]
    TurnBudgetExhausted,
    #[error("There is no failed reply to retry")]
    NothingToRetry,
    #[error("Invalid transition: {event} is not allowed in phase {phase}")]
    InvalidTransition { phase: Phase, event: &'static str },
}

impl TransitionError {
    /// Contract violations by the caller, as opposed to bad user input
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, Self::InvalidTransition { .. })
    }
}

pub fn transition(state: &SessionState, event: Event) -> Result<TransitionResult, TransitionError> {
    let invalid = |event: &Event| TransitionError::InvalidTransition {
        phase: state.phase,
        event: event.name(),
    };

    // Only restart and completion results may arrive while a call is pending
    if state.is_busy()
        && !matches!(
            event,
            Event::Restart
                | Event::ReplyCompleted { .. }
                | Event::ReplyFailed { .. }
                | Event::FeedbackCompleted { .. }
                | Event::FeedbackFailed { .. }
        )
    {
        return Err(TransitionError::Busy);
    }

    match (state.phase, event) {
        // ============================================================
        // Restart (any phase)
        // ============================================================
        (_, Event::Restart) => Ok(TransitionResult::new(SessionState::new())),

        // ============================================================
        // Setup
        // ============================================================
        (
            Phase::Setup,
            Event::UpdateProfile {
                profile,
                configuration,
            },
        ) => {
            profile.validate()?;
            let mut next = state.clone();
            next.profile = profile;
            next.configuration = configuration;
            Ok(TransitionResult::new(next))
        }

        // Idempotent: a second start never synthesizes a second system message
        (_, Event::CompleteSetup) if state.has_system_message() => {
            Ok(TransitionResult::new(state.clone()))
        }

        (Phase::Setup, Event::CompleteSetup) => {
            state.profile.validate()?;
            let mut next = state.clone();
            next.phase = Phase::Interviewing;
            next.transcript = vec![ChatMessage::system(build_system_prompt(
                &state.profile,
                &state.configuration,
            ))];
            Ok(TransitionResult::new(next))
        }

        // ============================================================
        // Interviewing
        // ============================================================
        (Phase::Interviewing, Event::SubmitAnswer { text }) => {
            if state.turn >= MAX_TURNS {
                return Err(TransitionError::TurnBudgetExhausted);
            }
            validate_answer(&text)?;

            let mut next = state.clone();
            // Resubmission after a failed reply replaces the unanswered answer
            let unanswered = if state.reply_failed {
                next.transcript.last_mut().filter(|m| m.role == Role::User)
            } else {
                None
            };
            match unanswered {
                Some(last) => last.content = text,
                None => next.transcript.push(ChatMessage::user(text)),
            }
            next.reply_failed = false;

            if next.turn < ANSWERED_TURNS {
                next.pending = Some(PendingCompletion::Reply);
                let effect = Effect::stream_reply(&next.transcript);
                Ok(TransitionResult::new(next).with_effect(effect))
            } else {
                // Final answer is recorded but never answered
                next.turn += 1;
                next.phase = Phase::AwaitingFeedbackRequest;
                Ok(TransitionResult::new(next))
            }
        }

        (Phase::Interviewing, Event::RetryReply) => {
            if !(state.reply_failed && state.has_unanswered_answer()) {
                return Err(TransitionError::NothingToRetry);
            }
            let mut next = state.clone();
            next.reply_failed = false;
            next.pending = Some(PendingCompletion::Reply);
            let effect = Effect::stream_reply(&next.transcript);
            Ok(TransitionResult::new(next).with_effect(effect))
        }

        (Phase::Interviewing, Event::ReplyCompleted { text })
            if state.pending == Some(PendingCompletion::Reply) =>
        {
            let mut next = state.clone();
            next.transcript.push(ChatMessage::assistant(text));
            next.turn += 1;
            next.pending = None;
            Ok(TransitionResult::new(next))
        }

        (Phase::Interviewing, Event::ReplyFailed { error })
            if state.pending == Some(PendingCompletion::Reply) =>
        {
            let mut next = state.clone();
            next.pending = None;
            next.reply_failed = true;
            Ok(TransitionResult::new(next).with_effect(Effect::ReportFailure { error }))
        }

        (Phase::AwaitingFeedbackRequest | Phase::FeedbackShown, Event::SubmitAnswer { .. }) => {
            Err(TransitionError::TurnBudgetExhausted)
        }

        // ============================================================
        // Feedback
        // ============================================================
        (Phase::AwaitingFeedbackRequest, Event::RequestFeedback) => {
            let mut next = state.clone();
            next.pending = Some(PendingCompletion::Feedback);
            let messages = build_feedback_messages(&next.transcript);
            Ok(TransitionResult::new(next).with_effect(Effect::RequestFeedback { messages }))
        }

        (Phase::AwaitingFeedbackRequest, Event::FeedbackCompleted { text })
            if state.pending == Some(PendingCompletion::Feedback) =>
        {
            let mut next = state.clone();
            next.pending = None;
            next.feedback = Some(text);
            next.phase = Phase::FeedbackShown;
            Ok(TransitionResult::new(next))
        }

        (Phase::AwaitingFeedbackRequest, Event::FeedbackFailed { error })
            if state.pending == Some(PendingCompletion::Feedback) =>
        {
            let mut next = state.clone();
            next.pending = None;
            Ok(TransitionResult::new(next).with_effect(Effect::ReportFailure { error }))
        }

        // ============================================================
        // Invalid Transitions
        // ============================================================
        (_, event) => Err(invalid(&event)),
    }
}

//! Events that can occur in an interview session

use super::state::{Configuration, Profile};
use crate::llm::LlmError;

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // Presentation events
    UpdateProfile {
        profile: Profile,
        configuration: Configuration,
    },
    CompleteSetup,
    SubmitAnswer {
        text: String,
    },
    /// Re-request the reply to an answer whose reply failed
    RetryReply,
    RequestFeedback,
    Restart,

    // Completion results
    ReplyCompleted {
        text: String,
    },
    ReplyFailed {
        error: LlmError,
    },
    FeedbackCompleted {
        text: String,
    },
    FeedbackFailed {
        error: LlmError,
    },
}

impl Event {
    /// Short name for logs and error messages
    pub fn name(&self) -> &'static str {
        match self {
            Event::UpdateProfile { .. } => "update_profile",
            Event::CompleteSetup => "complete_setup",
            Event::SubmitAnswer { .. } => "submit_answer",
            Event::RetryReply => "retry_reply",
            Event::RequestFeedback => "request_feedback",
            Event::Restart => "restart",
            Event::ReplyCompleted { .. } => "reply_completed",
            Event::ReplyFailed { .. } => "reply_failed",
            Event::FeedbackCompleted { .. } => "feedback_completed",
            Event::FeedbackFailed { .. } => "feedback_failed",
        }
    }
}

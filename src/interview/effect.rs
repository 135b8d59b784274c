//! Effects produced by state transitions

use crate::llm::{ChatMessage, LlmError};

/// Effects to be executed after a state transition
#[derive(Debug, Clone)]
pub enum Effect {
    /// Stream the interviewer's next reply over the given transcript
    StreamReply { messages: Vec<ChatMessage> },

    /// Request the feedback evaluation (single, non-streamed)
    RequestFeedback { messages: Vec<ChatMessage> },

    /// Surface a completion failure to the caller; state is already settled
    ReportFailure { error: LlmError },
}

impl Effect {
    pub fn stream_reply(messages: &[ChatMessage]) -> Self {
        Effect::StreamReply {
            messages: messages.to_vec(),
        }
    }

    pub fn is_completion(&self) -> bool {
        matches!(self, Effect::StreamReply { .. } | Effect::RequestFeedback { .. })
    }
}

//! Interview session state types

use crate::llm::{ChatMessage, Role};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Number of answers a candidate gives in one interview
pub const MAX_TURNS: u8 = 5;
/// Answers after which no further interviewer reply is requested
pub const ANSWERED_TURNS: u8 = MAX_TURNS - 1;

pub const MAX_NAME_CHARS: usize = 40;
pub const MAX_EXPERIENCE_CHARS: usize = 250;
pub const MAX_SKILLS_CHARS: usize = 250;
pub const MAX_ANSWER_CHARS: usize = 1000;

// ============================================================================
// Profile & configuration
// ============================================================================

/// Candidate profile collected during setup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub experience: String,
    #[serde(default)]
    pub skills: String,
}

impl Profile {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_len("name", &self.name, MAX_NAME_CHARS)?;
        check_len("experience", &self.experience, MAX_EXPERIENCE_CHARS)?;
        check_len("skills", &self.skills, MAX_SKILLS_CHARS)
    }
}

fn check_len(field: &'static str, value: &str, max: usize) -> Result<(), ValidationError> {
    let len = value.chars().count();
    if len > max {
        return Err(ValidationError::FieldTooLong { field, len, max });
    }
    Ok(())
}

macro_rules! labelled_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $label:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $label)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn label(self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }
    };
}

labelled_enum! {
    /// Seniority level applied for
    Level {
        Intern => "Intern",
        Junior => "Junior",
        MidLevel => "Mid-level",
        Senior => "Senior",
    }
}

labelled_enum! {
    /// Position applied for
    Position {
        DataScientist => "Data Scientist",
        DataEngineer => "Data Engineer",
        MlEngineer => "ML Engineer",
        AiEngineer => "AI Engineer",
        FinancialAnalyst => "Financial Analyst",
    }
}

labelled_enum! {
    /// Company the simulated interviewer represents
    Company {
        Meta => "Meta",
        Google => "Google",
        Amazon => "Amazon",
        Apple => "Apple",
        Microsoft => "Microsoft",
        Netflix => "Netflix",
    }
}

impl Default for Level {
    fn default() -> Self {
        Level::Junior
    }
}

impl Default for Position {
    fn default() -> Self {
        Position::DataScientist
    }
}

impl Default for Company {
    fn default() -> Self {
        Company::Amazon
    }
}

/// Interview configuration chosen during setup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    #[serde(default)]
    pub level: Level,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub company: Company,
}

impl Configuration {
    /// One-line description, e.g. "Junior Data Scientist at Amazon"
    pub fn summary(&self) -> String {
        format!("{} {} at {}", self.level, self.position, self.company)
    }
}

// ============================================================================
// Phase & session state
// ============================================================================

/// Stage of the interview lifecycle. Forward-only except for a restart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Setup,
    Interviewing,
    AwaitingFeedbackRequest,
    FeedbackShown,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Setup => "setup",
            Phase::Interviewing => "interviewing",
            Phase::AwaitingFeedbackRequest => "awaiting_feedback_request",
            Phase::FeedbackShown => "feedback_shown",
        };
        f.write_str(s)
    }
}

/// Completion call currently outstanding for the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingCompletion {
    /// Interviewer reply to the last user answer
    Reply,
    /// Feedback evaluation of the whole transcript
    Feedback,
}

/// Complete per-session state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub phase: Phase,
    pub profile: Profile,
    pub configuration: Configuration,
    /// Full transcript, system message first once the interview has started
    pub transcript: Vec<ChatMessage>,
    /// Accepted user answers, `0..=MAX_TURNS`
    pub turn: u8,
    pub feedback: Option<String>,
    pub pending: Option<PendingCompletion>,
    /// The last user answer is in the transcript but its reply failed
    pub reply_failed: bool,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_system_message(&self) -> bool {
        self.transcript
            .first()
            .is_some_and(|m| m.role == Role::System)
    }

    /// Transcript without the system message, as shown to the candidate
    pub fn visible_transcript(&self) -> impl Iterator<Item = &ChatMessage> {
        self.transcript.iter().filter(|m| m.role != Role::System)
    }

    pub fn assistant_replies(&self) -> usize {
        self.transcript
            .iter()
            .filter(|m| m.role == Role::Assistant)
            .count()
    }

    pub fn turns_remaining(&self) -> u8 {
        MAX_TURNS.saturating_sub(self.turn)
    }

    pub fn is_busy(&self) -> bool {
        self.pending.is_some()
    }

    /// Whether the last transcript entry is a user answer without a reply
    pub fn has_unanswered_answer(&self) -> bool {
        self.transcript.last().is_some_and(|m| m.role == Role::User)
    }

    /// Observable state handed to the presentation layer
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase,
            profile: self.profile.clone(),
            configuration: self.configuration,
            summary: self.configuration.summary(),
            transcript: self.visible_transcript().cloned().collect(),
            turn: self.turn,
            turns_remaining: self.turns_remaining(),
            feedback: self.feedback.clone(),
            busy: self.is_busy(),
            awaiting_retry: self.reply_failed,
        }
    }
}

/// What the presentation layer renders after every transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub phase: Phase,
    pub profile: Profile,
    pub configuration: Configuration,
    pub summary: String,
    /// System message filtered out
    pub transcript: Vec<ChatMessage>,
    pub turn: u8,
    pub turns_remaining: u8,
    pub feedback: Option<String>,
    pub busy: bool,
    pub awaiting_retry: bool,
}

// ============================================================================
// Validation
// ============================================================================

/// Malformed input at the presentation boundary
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Answer must not be empty")]
    EmptyAnswer,
    #[error("Answer is {len} characters, the limit is {max}")]
    AnswerTooLong { len: usize, max: usize },
    #[error("{field} is {len} characters, the limit is {max}")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },
}

/// Check a submitted answer against the input limits
pub fn validate_answer(text: &str) -> Result<(), ValidationError> {
    if text.trim().is_empty() {
        return Err(ValidationError::EmptyAnswer);
    }
    let len = text.chars().count();
    if len > MAX_ANSWER_CHARS {
        return Err(ValidationError::AnswerTooLong {
            len,
            max: MAX_ANSWER_CHARS,
        });
    }
    Ok(())
}

//! API request and response types

use crate::interview::state::{
    MAX_ANSWER_CHARS, MAX_EXPERIENCE_CHARS, MAX_NAME_CHARS, MAX_SKILLS_CHARS, MAX_TURNS,
};
use crate::interview::{Company, Configuration, Level, Position, Profile, SessionSnapshot};
use crate::llm::FailureClass;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request to update the candidate profile during setup
#[derive(Debug, Deserialize)]
pub struct ProfileRequest {
    #[serde(default)]
    pub profile: Profile,
    #[serde(default)]
    pub configuration: Configuration,
}

/// Request to submit an answer
#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    pub text: String,
}

/// Response with a session and its identity
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub session: SessionSnapshot,
}

/// Response for cancel action
#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub cancelled: bool,
}

/// Response for lifecycle actions
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Input limits the setup form and answer box enforce
#[derive(Debug, Serialize)]
pub struct Limits {
    pub name: usize,
    pub experience: usize,
    pub skills: usize,
    pub answer: usize,
    pub turns: u8,
}

/// Selectable interview options and their defaults
#[derive(Debug, Serialize)]
pub struct OptionsResponse {
    pub levels: Vec<&'static str>,
    pub positions: Vec<&'static str>,
    pub companies: Vec<&'static str>,
    pub defaults: Configuration,
    pub limits: Limits,
    /// Whether a completion client is configured
    pub completions_available: bool,
}

impl OptionsResponse {
    pub fn new(completions_available: bool) -> Self {
        Self {
            levels: Level::ALL.iter().map(|l| l.label()).collect(),
            positions: Position::ALL.iter().map(|p| p.label()).collect(),
            companies: Company::ALL.iter().map(|c| c.label()).collect(),
            defaults: Configuration::default(),
            limits: Limits {
                name: MAX_NAME_CHARS,
                experience: MAX_EXPERIENCE_CHARS,
                skills: MAX_SKILLS_CHARS,
                answer: MAX_ANSWER_CHARS,
                turns: MAX_TURNS,
            },
            completions_available,
        }
    }
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<FailureClass>,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            kind: kind.into(),
            class: None,
        }
    }

    pub fn with_class(mut self, class: FailureClass) -> Self {
        self.class = Some(class);
        self
    }
}

//! Prompt construction for the interviewer persona and the feedback evaluator

use super::state::{Configuration, Profile};
use crate::llm::ChatMessage;

/// Instruction for the feedback evaluator
pub const FEEDBACK_RUBRIC: &str = r"You are a helpful tool that provides feedback on an interviewee performance.
Before the Feedback give a score of 1 to 10.
Follow this format:
Overall Score: //Your score
Feedback: //Here you put your feedback
Give only the feedback do not ask any additional questions.";

/// Lead-in placed before the serialized transcript
const EVALUATION_PREAMBLE: &str =
    "This is the interview you need to evaluate. You are only a tool and shouldn't engage in conversation: ";

/// Build the interviewer persona. Profile and configuration are embedded verbatim.
pub fn build_system_prompt(profile: &Profile, configuration: &Configuration) -> String {
    format!(
        "You are an HR executive for the company {company}. You are interviewing a user named {name} for the position {position} at level {level}.\n\
         The interviewee has the following experience: {experience}.\n\
         The interviewee possesses the following skills: {skills}.\n\
         \n\
         Ask each question individually, creating a conversational flow rather than presenting all the questions simultaneously.",
        company = configuration.company,
        name = profile.name,
        position = configuration.position,
        level = configuration.level,
        experience = profile.experience,
        skills = profile.skills,
    )
}

/// Serialize a transcript as `role: content` lines, in order
pub fn serialize_transcript(transcript: &[ChatMessage]) -> String {
    transcript
        .iter()
        .map(|m| format!("{}: {}", m.role, m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Messages for the single feedback completion
pub fn build_feedback_messages(transcript: &[ChatMessage]) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(FEEDBACK_RUBRIC),
        ChatMessage::user(format!(
            "{EVALUATION_PREAMBLE}{}",
            serialize_transcript(transcript)
        )),
    ]
}

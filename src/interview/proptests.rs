//! Property-based tests for the interview state machine
//!
//! Arbitrary sequences of user actions and completion outcomes are driven
//! through `transition`, checking the session invariants after every step.

use super::state::*;
use super::transition::*;
use super::*;
use crate::llm::{LlmError, Role};
use proptest::prelude::*;

// ============================================================================
// Arbitrary Generators
// ============================================================================

/// User-driven actions; completion outcomes are decided separately
#[derive(Debug, Clone)]
enum Action {
    Update(Profile, Configuration),
    Start,
    Answer(String),
    Retry,
    Feedback,
    Restart,
}

fn arb_configuration() -> impl Strategy<Value = Configuration> {
    (
        prop::sample::select(Level::ALL),
        prop::sample::select(Position::ALL),
        prop::sample::select(Company::ALL),
    )
        .prop_map(|(level, position, company)| Configuration {
            level,
            position,
            company,
        })
}

fn arb_profile() -> impl Strategy<Value = Profile> {
    ("[a-zA-Z ]{0,45}", "[a-z ]{0,30}", "[a-zA-Z,]{0,30}").prop_map(
        |(name, experience, skills)| Profile {
            name,
            experience,
            skills,
        },
    )
}

fn arb_answer() -> impl Strategy<Value = String> {
    prop_oneof![
        8 => "[a-zA-Z ]{1,30}",
        1 => Just(String::new()),
        1 => Just(" ".repeat(3)),
    ]
}

fn arb_action() -> impl Strategy<Value = Action> {
    prop_oneof![
        1 => (arb_profile(), arb_configuration()).prop_map(|(p, c)| Action::Update(p, c)),
        2 => Just(Action::Start),
        6 => arb_answer().prop_map(Action::Answer),
        1 => Just(Action::Retry),
        2 => Just(Action::Feedback),
        1 => Just(Action::Restart),
    ]
}

fn to_event(action: Action) -> Event {
    match action {
        Action::Update(profile, configuration) => Event::UpdateProfile {
            profile,
            configuration,
        },
        Action::Start => Event::CompleteSetup,
        Action::Answer(text) => Event::SubmitAnswer { text },
        Action::Retry => Event::RetryReply,
        Action::Feedback => Event::RequestFeedback,
        Action::Restart => Event::Restart,
    }
}

/// Outcome of the completion an effect requested
fn outcome_for(effect: &Effect, succeed: bool) -> Option<Event> {
    match (effect, succeed) {
        (Effect::StreamReply { .. }, true) => Some(Event::ReplyCompleted {
            text: "Next question?".to_string(),
        }),
        (Effect::StreamReply { .. }, false) => Some(Event::ReplyFailed {
            error: LlmError::network("connection reset"),
        }),
        (Effect::RequestFeedback { .. }, true) => Some(Event::FeedbackCompleted {
            text: "Overall Score: 6".to_string(),
        }),
        (Effect::RequestFeedback { .. }, false) => Some(Event::FeedbackFailed {
            error: LlmError::server_error("unavailable"),
        }),
        (Effect::ReportFailure { .. }, _) => None,
    }
}

// ============================================================================
// Invariant Checkers
// ============================================================================

fn check_invariants(state: &SessionState) -> Result<(), TestCaseError> {
    let system_count = state
        .transcript
        .iter()
        .filter(|m| m.role == Role::System)
        .count();

    if state.phase == Phase::Setup {
        prop_assert_eq!(system_count, 0);
        prop_assert!(state.transcript.is_empty());
    } else {
        prop_assert_eq!(system_count, 1);
        prop_assert_eq!(state.transcript[0].role, Role::System);
    }

    // Visible transcript alternates user/assistant starting with the user
    for (i, msg) in state.visible_transcript().enumerate() {
        let expected = if i % 2 == 0 { Role::User } else { Role::Assistant };
        prop_assert_eq!(msg.role, expected);
    }

    let visible = state.visible_transcript().count();
    let replies = state.assistant_replies();
    let unanswered = usize::from(state.has_unanswered_answer());
    prop_assert_eq!(visible, 2 * replies + unanswered);

    prop_assert!(state.turn <= MAX_TURNS);
    prop_assert!(replies <= usize::from(ANSWERED_TURNS));
    if state.turn == MAX_TURNS {
        prop_assert!(state.phase >= Phase::AwaitingFeedbackRequest);
        prop_assert_eq!(replies, usize::from(ANSWERED_TURNS));
        prop_assert!(state.has_unanswered_answer());
    }
    if state.phase == Phase::Interviewing {
        prop_assert_eq!(usize::from(state.turn), replies);
    }

    prop_assert_eq!(state.feedback.is_some(), state.phase == Phase::FeedbackShown);
    if state.reply_failed {
        prop_assert!(state.has_unanswered_answer());
        prop_assert!(state.pending.is_none());
    }
    Ok(())
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    /// Invariants hold after every step of any action sequence
    #[test]
    fn invariants_hold_for_any_sequence(
        steps in proptest::collection::vec((arb_action(), any::<bool>()), 0..40)
    ) {
        let mut state = SessionState::new();

        for (action, succeed) in steps {
            let is_restart = matches!(action, Action::Restart);
            let before = state.clone();

            match transition(&state, to_event(action)) {
                Ok(result) => {
                    state = result.new_state;
                    check_invariants(&state)?;
                    if !is_restart {
                        prop_assert!(state.phase >= before.phase, "phase went backwards");
                    }

                    for effect in &result.effects {
                        if let Some(event) = outcome_for(effect, succeed) {
                            let settled = transition(&state, event);
                            prop_assert!(settled.is_ok(), "completion outcome rejected");
                            if let Ok(settled) = settled {
                                state = settled.new_state;
                            }
                            check_invariants(&state)?;
                            prop_assert!(state.pending.is_none());
                        }
                    }
                }
                Err(_) => prop_assert_eq!(&state, &before),
            }
        }
    }

    /// A failed reply leaves the transcript and counter as they were just before the call
    #[test]
    fn failed_reply_changes_nothing_but_the_flag(
        answers in proptest::collection::vec("[a-z]{1,10}", 0..4),
        last in "[a-z]{1,10}",
    ) {
        let mut state = transition(&SessionState::new(), Event::CompleteSetup).unwrap().new_state;
        for text in answers {
            state = transition(&state, Event::SubmitAnswer { text }).unwrap().new_state;
            state = transition(&state, Event::ReplyCompleted { text: "q".to_string() })
                .unwrap()
                .new_state;
        }

        let submitted = transition(&state, Event::SubmitAnswer { text: last }).unwrap().new_state;
        let failed = transition(
            &submitted,
            Event::ReplyFailed { error: LlmError::network("reset") },
        )
        .unwrap()
        .new_state;

        prop_assert_eq!(&failed.transcript, &submitted.transcript);
        prop_assert_eq!(failed.turn, state.turn);
        prop_assert_eq!(failed.phase, state.phase);
    }

    /// Restart yields a fresh session from wherever it is called
    #[test]
    fn restart_is_total(
        steps in proptest::collection::vec(arb_action(), 0..20)
    ) {
        let mut state = SessionState::new();
        for action in steps {
            if let Ok(result) = transition(&state, to_event(action)) {
                state = result.new_state;
            }
        }
        let restarted = transition(&state, Event::Restart).unwrap().new_state;
        prop_assert_eq!(&restarted, &SessionState::new());
        let again = transition(&restarted, Event::Restart).unwrap().new_state;
        prop_assert_eq!(again, restarted);
    }
}

#[test]
fn five_answers_always_end_awaiting_feedback() {
    let mut state = transition(&SessionState::new(), Event::CompleteSetup)
        .unwrap()
        .new_state;
    let mut requested_replies = 0;

    for text in ["a", "b", "c", "d", "e"] {
        let result = transition(
            &state,
            Event::SubmitAnswer {
                text: text.to_string(),
            },
        )
        .unwrap();
        state = result.new_state;
        if result.effects.iter().any(Effect::is_completion) {
            requested_replies += 1;
            state = transition(
                &state,
                Event::ReplyCompleted {
                    text: "q".to_string(),
                },
            )
            .unwrap()
            .new_state;
        }
    }

    assert_eq!(requested_replies, 4);
    assert_eq!(state.turn, MAX_TURNS);
    assert_eq!(state.phase, Phase::AwaitingFeedbackRequest);
}

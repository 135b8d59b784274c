//! Interview session state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions:
//! `transition` maps (state, event) to a new state plus effects, and the
//! runtime executes the effects and feeds their outcome back as events.

mod effect;
pub mod event;
pub mod prompts;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::Effect;
pub use event::Event;
pub use state::{
    Company, Configuration, Level, Phase, Position, Profile, SessionSnapshot, SessionState,
};
pub use transition::{transition, TransitionError};

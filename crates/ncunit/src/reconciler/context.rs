use std::fmt;

use crate::peer::{PeerSnapshot, PeerView};
use crate::role::RoleContext;
use crate::state::LifecycleState;
use crate::status::DisplayStatus;

use super::outcome::{DeferReason, Warning};

/// What a handler decided, short of a fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    Done,
    Defer(DeferReason),
    Halt,
}

/// Working copy of everything one event may change.
pub(crate) struct Cycle<'a> {
    // Input
    pub role: &'a RoleContext,

    // Mutated by handlers, discarded on a fatal error
    pub state: LifecycleState,
    pub peers: PeerView<'a>,

    // Overrides the projected status when set
    pub status: Option<DisplayStatus>,

    pub action_result: Option<serde_json::Value>,

    // Non-fatal failures
    pub warnings: Vec<Warning>,
}

impl<'a> Cycle<'a> {
    pub fn new(state: LifecycleState, role: &'a RoleContext, snapshot: &'a PeerSnapshot) -> Self {
        Self {
            role,
            state,
            peers: PeerView::new(snapshot),
            status: None,
            action_result: None,
            warnings: Vec::new(),
        }
    }

    pub fn warn(&mut self, step: &'static str, error: impl fmt::Display) {
        let message = error.to_string();
        tracing::warn!(step, "{}", message);
        self.warnings.push(Warning { step, message });
    }

    /// Keeps the value of a step that must not abort the event; a failure
    /// becomes a warning.
    pub fn soft<T, E: fmt::Display>(&mut self, step: &'static str, result: Result<T, E>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(error) => {
                self.warn(step, error);
                None
            }
        }
    }
}

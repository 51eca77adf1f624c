use std::collections::VecDeque;

use super::error::{StateError, StateResult};
use super::{event::PhaseTransition, TransactionEvent, TransactionPhase};

const HISTORY_LIMIT: usize = 32;

#[derive(Debug)]
pub struct TransactionMachine {
    phase: TransactionPhase,
    transition_history: VecDeque<PhaseTransition>,
}

impl TransactionMachine {
    pub fn new() -> Self {
        Self {
            phase: TransactionPhase::default(),
            transition_history: VecDeque::with_capacity(HISTORY_LIMIT),
        }
    }

    pub fn phase(&self) -> TransactionPhase {
        self.phase
    }

    pub fn can_transition(&self, event: TransactionEvent) -> bool {
        self.next_phase(event).is_some()
    }

    pub fn next_phase(&self, event: TransactionEvent) -> Option<TransactionPhase> {
        use TransactionEvent::*;
        use TransactionPhase::*;
        match (self.phase, event) {
            (_, Reset) => Some(Uninitialized),
            (Uninitialized, Initialize) => Some(Committed),
            (Committed | Previewing, EnterPreview | PreviewChange) => Some(Previewing),
            (Committed, DirectChange) => Some(Committed),
            (Previewing, DirectChange) => Some(Previewing),
            (Previewing, Commit | Discard) => Some(Committed),
            _ => None,
        }
    }

    pub fn transition(&mut self, event: TransactionEvent) -> StateResult<TransactionPhase> {
        tracing::trace!(from = ?self.phase, event = ?event, "request theme transition");
        let next = self.next_phase(event).ok_or(StateError::InvalidTransition {
            from: self.phase,
            event,
        })?;

        if self.transition_history.len() == HISTORY_LIMIT {
            self.transition_history.pop_front();
        }
        self.transition_history
            .push_back(PhaseTransition::new(Some(self.phase), event, next));
        self.phase = next;

        Ok(self.phase)
    }

    /// Most recent transitions, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &PhaseTransition> {
        self.transition_history.iter()
    }
}

impl Default for TransactionMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TransactionMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TransactionPhase::{:?}", self.phase)
    }
}

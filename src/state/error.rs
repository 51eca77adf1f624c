use super::event::TransactionEvent;
use super::model::TransactionPhase;
use thiserror::Error;

pub type StateResult<T> = std::result::Result<T, StateError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("invalid theme transition: from {from:?} using event {event:?}")]
    InvalidTransition {
        from: TransactionPhase,
        event: TransactionEvent,
    },
}

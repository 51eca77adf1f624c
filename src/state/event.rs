use super::model::TransactionPhase;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionEvent {
    Initialize,
    EnterPreview,
    PreviewChange,
    DirectChange,
    Commit,
    Discard,
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseTransition {
    pub from: Option<TransactionPhase>,
    pub event: TransactionEvent,
    pub to: TransactionPhase,
}

impl PhaseTransition {
    pub const fn new(
        from: Option<TransactionPhase>,
        event: TransactionEvent,
        to: TransactionPhase,
    ) -> Self {
        Self { from, event, to }
    }
}

/// Where the controller sits along the transaction dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransactionPhase {
    #[default]
    Uninitialized,
    Committed,
    Previewing,
}

impl TransactionPhase {
    pub const fn is_ready(self) -> bool {
        matches!(self, Self::Committed | Self::Previewing)
    }

    pub const fn is_previewing(self) -> bool {
        matches!(self, Self::Previewing)
    }
}

pub mod error;
pub mod event;
pub mod machine;
pub mod model;

pub use error::{StateError, StateResult};
pub use event::{PhaseTransition, TransactionEvent};
pub use machine::TransactionMachine;
pub use model::TransactionPhase;

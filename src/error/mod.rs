use crate::state::StateError;
use crate::storage::StorageError;
use crate::validation::{DefaultsError, ValidationErrors};
use thiserror::Error;

pub type AppResult<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error("failed to load global default theme")]
    Defaults(#[from] DefaultsError),
}

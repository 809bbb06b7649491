use gm_core::ValidationError;
use persistence::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("session not found: {0}")]
    NotFound(String),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("refusing to persist invalid document: {0}")]
    Invalid(#[from] ValidationError),
    #[error("event stream closed by client")]
    Disconnected,
}

use thiserror::Error;

use crate::state::ConversationId;

/// Errors raised by the conversation store and its repository
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("conversation not found: {0}")]
    NotFound(ConversationId),

    #[error("failed to persist conversations: {0}")]
    Persistence(String),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Persistence(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Persistence(err.to_string())
    }
}

/// Errors raised while talking to the completion service
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("completion service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("malformed completion response: {0}")]
    MalformedResponse(String),
}

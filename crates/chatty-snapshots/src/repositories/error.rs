use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store initialization failed: {message}")]
    InitializationError { message: String },

    #[error("Message not found: {message_id}")]
    NotFound { message_id: String },

    #[error("No active character")]
    NoActiveCharacter,

    #[error("Operation not supported by this store: {operation}")]
    Unsupported { operation: &'static str },

    #[error("Store rejected the request: {message}")]
    Rejected { message: String },
}

pub type StoreResult<T> = Result<T, StoreError>;

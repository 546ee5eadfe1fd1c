//! Server error types. Per-datagram problems never surface here; they are
//! logged and dropped by the session. These are the errors that stop a
//! server from starting or keep its socket from working.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("word catalog must contain at least one word")]
    EmptyWordCatalog,

    #[error("failed to parse word catalog: {0}")]
    WordCatalog(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, ServerError>;

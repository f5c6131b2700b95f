//! Error types for Mailstub

use thiserror::Error;

/// Main error type for Mailstub
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid message index: {0}")]
    InvalidIndex(usize),

    #[error("Server error: {0}")]
    Server(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for Mailstub
pub type Result<T> = std::result::Result<T, Error>;

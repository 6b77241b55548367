//! Herald error type.

use thiserror::Error;

/// Errors surfaced across Herald crate boundaries.
#[derive(Error, Debug)]
pub enum HeraldError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Sheets error: {0}")]
    Sheets(String),

    #[error("Mail transport error: {0}")]
    Transport(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, HeraldError>;

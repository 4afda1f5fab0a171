//! Error types for cosmos-core

use thiserror::Error;

/// Main error type for cosmos-core
#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Received status code {status}: {body}")]
    ApiStatus { status: u16, body: String },

    #[error("No response found in the API result")]
    NoChoices,

    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    #[error("Cannot read bot name from identity file {path}: {reason}")]
    IdentityParse { path: String, reason: String },

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Session already exists: {0}")]
    SessionExists(String),

    #[error("Invalid customization: {0}")]
    Customization(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether the chat loop may keep going after this error.
    ///
    /// Anything that went wrong talking to the endpoint only costs the
    /// current turn. Filesystem and configuration failures end the session.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Http(_)
                | Error::Json(_)
                | Error::ApiStatus { .. }
                | Error::NoChoices
                | Error::InvalidResponse(_)
        )
    }
}

/// Result type alias for cosmos-core
pub type Result<T> = std::result::Result<T, Error>;

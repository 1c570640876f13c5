//! Error types for gmail-mark-read

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The provider rejected the call because its own throttle was hit.
    /// This is the only kind the executor retries.
    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Gmail API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Authorization error: {0}")]
    Auth(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Task error: {0}")]
    Task(String),
}

impl Error {
    /// Whether this error is the provider's throttling signal.
    #[must_use]
    pub const fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

//! Sink-specific error types.

use thiserror::Error;

/// Errors that can occur while persisting samples.
#[derive(Debug, Error)]
pub enum SinkError {
    /// HTTP transport failed (connect, timeout, TLS).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The store answered with a non-success status.
    #[error("write rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// Invalid sink configuration (e.g., bad URL).
    #[error("config error: {0}")]
    Config(String),

    /// The sink is closed and accepts no more samples.
    #[error("sink closed")]
    Closed,
}

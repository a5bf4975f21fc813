//! Crate-wide error type.
//!
//! Every failure the dashboard core can produce is one of these variants.
//! None of them terminate the process: they travel back to the page handler,
//! which turns them into a message, a retry prompt or a redirect.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Network or protocol failure talking to the music service.
    #[error("music service request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The music service answered with a non-success status.
    #[error("music service returned {status}: {message}")]
    Service { status: u16, message: String },

    /// The music service asked us to slow down.
    #[error("music service rate limit hit (retry after {retry_after:?}s)")]
    RateLimited { retry_after: Option<u64> },

    /// Code exchange, refresh or token use was rejected.
    #[error("authorization failed: {0}")]
    Authorization(String),

    /// The request cannot be satisfied: no seed identifiers were supplied.
    #[error("insufficient seed data: at least one seed identifier is required")]
    InsufficientSeeds,

    /// A caller-supplied seed identifier does not name a known track.
    #[error("unknown seed track: {0}")]
    UnknownSeed(String),

    /// Averaging audio features requires at least one track.
    #[error("cannot build a track attribute profile from an empty track set")]
    EmptyTrackSet,

    /// A batch lookup came back with a different number of items than asked for.
    #[error("batch lookup returned {received} of {requested} items")]
    IncompleteBatch { requested: usize, received: usize },

    /// The session key is not (or no longer) known to the handoff table.
    #[error("unknown or expired session")]
    UnknownSession,

    /// A paging cursor could not be decoded.
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),

    /// The token store could not complete an operation.
    #[error("token store: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Missing or malformed configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Failures that may succeed if the same call is made again later.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Transport(_) | Error::RateLimited { .. } => true,
            Error::Service { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Failures that can only be resolved by sending the user through
    /// authorization again.
    pub fn requires_reauth(&self) -> bool {
        matches!(self, Error::Authorization(_) | Error::UnknownSession)
    }
}

//! Typed error hierarchy for the hiring board.
//!
//! Two top-level enums cover the two boundaries:
//! - `GatewayError`: anything that goes wrong talking to the server
//! - `BoardError`: precondition violations the board store signals to its caller
//!
//! Network failures are absorbed by the store and turned into display
//! messages; only `BoardError` escapes its mutation entry points.

use thiserror::Error;

/// Errors from the remote gateway and the live update transport.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Server responded with status {status}")]
    Status { status: u16 },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to decode server payload: {0}")]
    Decode(String),

    #[error("Event stream error: {0}")]
    Stream(String),
}

impl GatewayError {
    /// HTTP status carried by the error, if the server answered at all.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Fast-fail signals from the board store.
#[derive(Debug, Error)]
pub enum BoardError {
    #[error("Job ID is required")]
    JobIdRequired,

    #[error("User session is required")]
    SessionRequired,

    #[error("Candidate {id} not found on the list")]
    CandidateNotFound { id: i64 },

    #[error("Unhandled status: {status}")]
    UnknownStatus { status: String },

    #[error("Choose one, you may")]
    InvalidSessionName,
}

//! Domain error taxonomy.
//!
//! Orchestration code works in `anyhow::Result`; the variants here are raised
//! into it so callers (and tests) can recover them with `downcast_ref`.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SantaError {
    #[error("no game state at {} (run `santa setup` first)", path.display())]
    StateNotFound { path: PathBuf },
    #[error("a game already exists at {} (use --force to start over)", path.display())]
    GameAlreadyExists { path: PathBuf },
    #[error("no valid matching found after {attempts} attempts; relax the blocked pairs")]
    MatchingInfeasible { attempts: u32 },
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("participant '{name}' not found (available: {available})")]
    ParticipantNotFound { name: String, available: String },
    #[error("{name} hasn't submitted a wishlist yet")]
    WishlistMissing { name: String },
    #[error("invalid roster: {0}")]
    InvalidRoster(String),
    #[error("invalid participant name {0:?}")]
    InvalidName(String),
}

/// What went wrong talking to the mail system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Auth,
    Connection,
    Timeout,
    Rejected,
    Malformed,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TransportErrorKind::Auth => "authentication",
            TransportErrorKind::Connection => "connection",
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Rejected => "rejected",
            TransportErrorKind::Malformed => "malformed message",
        };
        f.write_str(label)
    }
}

/// Mail send/fetch failure. Scoped to a single participant or message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("mail transport error ({kind}): {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Connection, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Malformed, message)
    }

    /// True when re-running the same operation later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            TransportErrorKind::Timeout | TransportErrorKind::Connection
        )
    }
}

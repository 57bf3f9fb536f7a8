//! Error types for identity and admin-directory lookups.
//!
//! These never reach the end user: the gate and the role check log them and
//! fall back to "not authenticated".

use thiserror::Error;

/// Identity provider lookup failure.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// HTTP transport error (connect, timeout, TLS).
    #[error("Identity provider request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Provider answered with a status we do not treat as "no session".
    #[error("Identity provider returned {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    /// Provider response could not be decoded.
    #[error("Invalid identity provider response: {0}")]
    InvalidResponse(String),
}

/// Admin-designation lookup failure.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Admin directory request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Admin directory returned {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("Admin directory query failed: {0}")]
    Database(#[from] sqlx::Error),

    /// Stored row could not be mapped to an admin record.
    #[error("Invalid admin record: {0}")]
    InvalidRecord(String),
}

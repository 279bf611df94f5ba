//! Typed outcomes for every expected failure of the core.

use rusqlite::ErrorCode;
use thiserror::Error;

use crate::types::Position;

/// Closed set of failures reported by the storage, ordering and service layers.
#[derive(Debug, Error)]
pub enum QueueError {
    /// No queue with the requested name (or id) exists in the chat.
    #[error("queue not found")]
    QueueNotFound,
    /// No member matched the requested identifier.
    #[error("member not found")]
    MemberNotFound,
    /// The user already holds a position in the queue.
    #[error("user is already a member of the queue")]
    AlreadyMember,
    /// The operation requires membership the user does not have.
    #[error("user is not a member of the queue")]
    NotAMember,
    /// A queue with the same name already exists in the chat.
    #[error("a queue with this name already exists in the chat")]
    DuplicateQueue,
    /// Requested position is non-positive or beyond the member count.
    #[error("position {requested} is outside 1..={count}")]
    InvalidPosition {
        /// Position asked for by the caller.
        requested: i64,
        /// Current member count of the queue.
        count: u32,
    },
    /// The caller did not pass the administrator check.
    #[error("operation requires an administrator")]
    AdminRequired,
    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),
    /// Unclassified storage failure.
    #[error(transparent)]
    Internal(#[from] rusqlite::Error),
}

impl QueueError {
    /// Returns true for the unclassified channel; everything else is an
    /// expected, recoverable outcome.
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal(_) | Self::Config(_))
    }
}

/// Result alias used throughout the crate.
pub type QueueResult<T> = Result<T, QueueError>;

/// Maps a failed queue insert: only a UNIQUE violation is a duplicate name.
pub(crate) fn classify_create_error(err: rusqlite::Error) -> QueueError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == ErrorCode::ConstraintViolation
                && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            QueueError::DuplicateQueue
        }
        _ => QueueError::Internal(err),
    }
}

pub(crate) fn invalid_position(requested: i64, count: Position) -> QueueError {
    QueueError::InvalidPosition { requested, count }
}

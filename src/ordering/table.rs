use crate::{
    error::QueueResult,
    types::{Position, QueueId, UserId},
};

use super::Shift;

/// Row-level access to queue memberships.
///
/// Implementations perform each call as written and never reorder on their
/// own; the density invariant is maintained by the functions in
/// [`crate::ordering`], which must run with exclusive access to the table.
pub trait PositionTable {
    /// Current position of `user`, if a member.
    fn position_of(&self, queue: QueueId, user: UserId) -> QueueResult<Option<Position>>;
    /// Member holding `position`, if any.
    fn member_at(&self, queue: QueueId, position: Position) -> QueueResult<Option<UserId>>;
    /// Highest position in use, `None` for an empty queue.
    fn max_position(&self, queue: QueueId) -> QueueResult<Option<Position>>;
    /// Number of members.
    fn count(&self, queue: QueueId) -> QueueResult<u32>;
    /// Adds a membership row.
    fn insert(&mut self, queue: QueueId, user: UserId, position: Position) -> QueueResult<()>;
    /// Overwrites the position of an existing row.
    fn set(&mut self, queue: QueueId, user: UserId, position: Position) -> QueueResult<()>;
    /// Deletes a membership row; false when there was none.
    fn remove(&mut self, queue: QueueId, user: UserId) -> QueueResult<bool>;
    /// Moves every row inside `shift` one step; returns rows touched.
    fn shift(&mut self, queue: QueueId, shift: Shift) -> QueueResult<usize>;
}

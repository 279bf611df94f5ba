//! Runtime event stream payloads.

use crate::types::{ChatId, Position, QueueId, UserId};

/// Events emitted after a command has committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueEvent {
    /// A queue was created.
    Created {
        /// Owning chat.
        chat_id: ChatId,
        /// Queue name.
        queue: String,
        /// Storage-assigned id.
        queue_id: QueueId,
    },
    /// A queue and its memberships were removed.
    Deleted {
        /// Owning chat.
        chat_id: ChatId,
        /// Queue name.
        queue: String,
        /// Members it held.
        removed: usize,
    },
    /// A user joined at the end.
    Joined {
        /// Owning chat.
        chat_id: ChatId,
        /// Queue name.
        queue: String,
        /// Joining user.
        user_id: UserId,
        /// Assigned position.
        position: Position,
    },
    /// A user left.
    Left {
        /// Owning chat.
        chat_id: ChatId,
        /// Queue name.
        queue: String,
        /// Leaving user.
        user_id: UserId,
    },
    /// A user went to the back of the queue.
    MovedToEnd {
        /// Owning chat.
        chat_id: ChatId,
        /// Queue name.
        queue: String,
        /// Moved user.
        user_id: UserId,
        /// New last position.
        position: Position,
    },
    /// A user let the next member go first.
    Skipped {
        /// Owning chat.
        chat_id: ChatId,
        /// Queue name.
        queue: String,
        /// Skipping user.
        user_id: UserId,
    },
    /// An administrator removed a member.
    Removed {
        /// Owning chat.
        chat_id: ChatId,
        /// Queue name.
        queue: String,
        /// Display name of the removed member.
        display_name: String,
    },
    /// An administrator moved a member.
    Repositioned {
        /// Owning chat.
        chat_id: ChatId,
        /// Queue name.
        queue: String,
        /// Position before.
        old: Position,
        /// Position after.
        new: Position,
    },
}

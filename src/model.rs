//! Named records returned by the storage and service layers.

use serde::{Deserialize, Serialize};

use crate::types::{ChatId, Position, QueueId, UserId};

/// A chat known to the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    /// Transport chat id.
    pub chat_id: ChatId,
    /// Chat title at first sight.
    pub chat_name: Option<String>,
}

/// A stored user row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Transport user id.
    pub user_id: UserId,
    /// Transport handle without the leading `@`, if the user has one.
    pub username: Option<String>,
    /// Name shown in queue listings.
    pub display_name: String,
}

/// Identity of a user as delivered by the transport with every message.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserProfile {
    /// Transport user id.
    pub user_id: UserId,
    /// Transport handle, if any.
    pub username: Option<String>,
    /// Given name.
    pub first_name: String,
    /// Family name, if any.
    pub last_name: Option<String>,
}

impl UserProfile {
    /// Default display name: first name, plus the last name when present.
    pub fn full_name(&self) -> String {
        match self.last_name.as_deref().filter(|s| !s.is_empty()) {
            Some(last) => format!("{} {}", self.first_name, last),
            None => self.first_name.clone(),
        }
    }
}

/// One queue membership joined with its user row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Name shown in listings.
    pub display_name: String,
    /// Transport handle, if any.
    pub username: Option<String>,
    /// Current one-based position.
    pub position: Position,
    /// Member's user id.
    pub user_id: UserId,
}

/// Queue name with its current size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSummary {
    /// Queue name.
    pub name: String,
    /// Number of members.
    pub member_count: u32,
}

/// Full view of one queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueView {
    /// Queue id.
    pub queue_id: QueueId,
    /// Display name of the user who created the queue.
    pub creator_name: String,
    /// Members ordered by position.
    pub members: Vec<Member>,
}

/// Result of a join or move-to-end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinOutcome {
    /// Position assigned to the caller.
    pub position: Position,
    /// Members ordered by position after the change.
    pub members: Vec<Member>,
}

/// Old and new position of a relocated member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reposition {
    /// Position before the operation.
    pub old: Position,
    /// Position after the operation.
    pub new: Position,
}

impl Reposition {
    /// False when the member was already at the requested position.
    pub fn changed(&self) -> bool {
        self.old != self.new
    }
}

//! Synchronous call surface consumed by the messaging adapter.
//!
//! Each call resolves the queue, mutates and reads back inside one critical
//! section of the storage engine, so the returned member list is exactly the
//! state the mutation produced.

use tracing::{debug, warn};

use crate::{
    directory::{exec_ensure_user, match_identifier},
    error::{QueueError, QueueResult, invalid_position},
    model::{JoinOutcome, Member, QueueSummary, QueueView, Reposition, User, UserProfile},
    ordering,
    persist::{
        SqliteStorage,
        sqlite::{
            SqlPositions, exec_create_queue, exec_delete_queue, exec_leave, exec_upsert_chat,
            query_count, query_creator_name, query_list_queues, query_members, query_queue_id,
        },
    },
    types::{ChatId, Position, QueueId, UserId},
};

/// The queue core behind one storage handle.
pub struct QueueService {
    storage: SqliteStorage,
}

impl QueueService {
    /// Wraps an opened storage handle.
    pub fn new(storage: SqliteStorage) -> Self {
        Self { storage }
    }

    /// Underlying storage engine.
    pub fn storage(&self) -> &SqliteStorage {
        &self.storage
    }

    /// Releases the storage handle, e.g. to close it on shutdown.
    pub fn into_storage(self) -> SqliteStorage {
        self.storage
    }

    /// Records the chat on first reference.
    pub fn register_chat(&self, chat_id: ChatId, chat_name: Option<&str>) -> QueueResult<()> {
        traced(
            "register_chat",
            self.storage
                .with_conn(|conn| exec_upsert_chat(conn, chat_id, chat_name)),
        )
    }

    /// Registers the user or refreshes its handle; see
    /// [`crate::directory::QueueDirectory::ensure_user`].
    pub fn ensure_user(&self, profile: &UserProfile) -> QueueResult<User> {
        traced(
            "ensure_user",
            self.storage.with_tx(|tx| exec_ensure_user(tx, profile)),
        )
    }

    /// Creates a queue. Admin only.
    pub fn create_queue(
        &self,
        name: &str,
        chat_id: ChatId,
        creator_id: UserId,
        is_admin: bool,
    ) -> QueueResult<QueueId> {
        require_admin(is_admin)?;
        traced(
            "create_queue",
            self.storage
                .with_conn(|conn| exec_create_queue(conn, name, chat_id, creator_id)),
        )
    }

    /// Appends the user to the queue.
    pub fn join_queue(&self, name: &str, chat_id: ChatId, user_id: UserId) -> QueueResult<JoinOutcome> {
        traced(
            "join_queue",
            self.storage.with_tx(|tx| {
                let queue_id = query_queue_id(tx, name, chat_id)?;
                let position = ordering::join(&mut SqlPositions::new(tx), queue_id, user_id)?;
                Ok(JoinOutcome {
                    position,
                    members: query_members(tx, queue_id)?,
                })
            }),
        )
    }

    /// Removes the user and returns the compacted member list.
    pub fn leave_queue(&self, name: &str, chat_id: ChatId, user_id: UserId) -> QueueResult<Vec<Member>> {
        traced(
            "leave_queue",
            self.storage.with_tx(|tx| {
                let queue_id = query_queue_id(tx, name, chat_id)?;
                exec_leave(tx, queue_id, user_id)?;
                query_members(tx, queue_id)
            }),
        )
    }

    /// Moves the user to the end of the queue, joining if absent.
    pub fn rejoin_queue(&self, name: &str, chat_id: ChatId, user_id: UserId) -> QueueResult<JoinOutcome> {
        traced(
            "rejoin_queue",
            self.storage.with_tx(|tx| {
                let queue_id = query_queue_id(tx, name, chat_id)?;
                let position =
                    ordering::move_to_end(&mut SqlPositions::new(tx), queue_id, user_id)?;
                Ok(JoinOutcome {
                    position,
                    members: query_members(tx, queue_id)?,
                })
            }),
        )
    }

    /// Lets the member behind the user go first. False when the user is last
    /// or not in the queue.
    pub fn skip_turn(&self, name: &str, chat_id: ChatId, user_id: UserId) -> QueueResult<bool> {
        traced(
            "skip_turn",
            self.storage.with_tx(|tx| {
                let queue_id = query_queue_id(tx, name, chat_id)?;
                ordering::skip_one(&mut SqlPositions::new(tx), queue_id, user_id)
            }),
        )
    }

    /// Deletes the queue with all its memberships; returns how many members
    /// it had. Admin only.
    pub fn delete_queue(&self, name: &str, chat_id: ChatId, is_admin: bool) -> QueueResult<usize> {
        require_admin(is_admin)?;
        traced(
            "delete_queue",
            self.storage.with_tx(|tx| {
                let queue_id = query_queue_id(tx, name, chat_id)?;
                exec_delete_queue(tx, queue_id)
            }),
        )
    }

    /// Every queue of the chat with its size, ordered by name.
    pub fn view_all(&self, chat_id: ChatId) -> QueueResult<Vec<QueueSummary>> {
        traced(
            "view_all",
            self.storage
                .with_conn(|conn| query_list_queues(conn, chat_id)),
        )
    }

    /// Creator and ordered members of one queue.
    pub fn view_one(&self, name: &str, chat_id: ChatId) -> QueueResult<QueueView> {
        traced(
            "view_one",
            self.storage.with_tx(|tx| {
                let queue_id = query_queue_id(tx, name, chat_id)?;
                Ok(QueueView {
                    queue_id,
                    creator_name: query_creator_name(tx, queue_id)?,
                    members: query_members(tx, queue_id)?,
                })
            }),
        )
    }

    /// Overwrites the user's display name.
    pub fn set_display_name(&self, user_id: UserId, new_name: &str) -> QueueResult<()> {
        let updated = traced(
            "set_display_name",
            self.storage.set_display_name(user_id, new_name),
        )?;
        if !updated {
            debug!(user_id, "display name not set: unknown user");
        }
        Ok(())
    }

    /// Resets the display name to the transport name.
    pub fn reset_display_name(&self, profile: &UserProfile) -> QueueResult<User> {
        traced(
            "reset_display_name",
            self.storage.directory().reset_display_name(profile),
        )
    }

    /// Removes the member matching `identifier`; returns its display name.
    /// Admin only.
    pub fn remove_member(
        &self,
        name: &str,
        chat_id: ChatId,
        identifier: &str,
        is_admin: bool,
    ) -> QueueResult<String> {
        require_admin(is_admin)?;
        traced(
            "remove_member",
            self.storage.with_tx(|tx| {
                let queue_id = query_queue_id(tx, name, chat_id)?;
                let member = find_member(tx, queue_id, identifier)?;
                exec_leave(tx, queue_id, member.user_id)?;
                Ok(member.display_name)
            }),
        )
    }

    /// Moves the member matching `identifier` to `position`. Admin only.
    pub fn set_member_position(
        &self,
        name: &str,
        chat_id: ChatId,
        identifier: &str,
        position: i64,
        is_admin: bool,
    ) -> QueueResult<Reposition> {
        require_admin(is_admin)?;
        traced(
            "set_member_position",
            self.storage.with_tx(|tx| {
                let queue_id = query_queue_id(tx, name, chat_id)?;
                let member = find_member(tx, queue_id, identifier)?;
                let Ok(target) = Position::try_from(position) else {
                    return Err(invalid_position(position, query_count(tx, queue_id)?));
                };
                ordering::set_position(&mut SqlPositions::new(tx), queue_id, member.user_id, target)
            }),
        )
    }
}

fn find_member(conn: &rusqlite::Connection, queue_id: QueueId, identifier: &str) -> QueueResult<Member> {
    let members = query_members(conn, queue_id)?;
    match_identifier(&members, identifier)
        .cloned()
        .ok_or(QueueError::MemberNotFound)
}

fn require_admin(is_admin: bool) -> QueueResult<()> {
    if is_admin {
        Ok(())
    } else {
        Err(QueueError::AdminRequired)
    }
}

fn traced<T>(op: &'static str, res: QueueResult<T>) -> QueueResult<T> {
    if let Err(err) = &res {
        if err.is_internal() {
            warn!(op, error = %err, "queue operation failed");
        } else {
            debug!(op, error = %err, "queue operation rejected");
        }
    }
    res
}

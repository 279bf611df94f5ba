//! Name-based lookups and read views built on the storage engine.

use rusqlite::{Connection, params};
use tracing::debug;

use crate::{
    error::{QueueError, QueueResult},
    model::{Member, User, UserProfile},
    persist::{
        SqliteStorage,
        sqlite::{query_members, query_queue_id, query_user},
    },
    types::{ChatId, QueueId},
};

/// Marker some transports put in front of a handle.
pub const HANDLE_MARKER: char = '@';

/// Borrowed view over [`SqliteStorage`] with no state of its own.
#[derive(Clone, Copy)]
pub struct QueueDirectory<'s> {
    storage: &'s SqliteStorage,
}

impl SqliteStorage {
    /// Directory view over this storage.
    pub fn directory(&self) -> QueueDirectory<'_> {
        QueueDirectory { storage: self }
    }
}

impl QueueDirectory<'_> {
    /// Queue id for `name` in `chat_id`. The match is exact, including case.
    pub fn resolve(&self, name: &str, chat_id: ChatId) -> QueueResult<QueueId> {
        self.storage
            .with_conn(|conn| query_queue_id(conn, name, chat_id))
    }

    /// First member, in position order, whose handle (with or without the
    /// leading marker) or display name matches `identifier` ignoring case.
    pub fn find_member_by_identifier(
        &self,
        queue_id: QueueId,
        identifier: &str,
    ) -> QueueResult<Member> {
        let members = self.storage.with_conn(|conn| query_members(conn, queue_id))?;
        match_identifier(&members, identifier)
            .cloned()
            .ok_or(QueueError::MemberNotFound)
    }

    /// Registers the user on first sight. Later calls only refresh the
    /// handle; an existing display name is never overwritten here.
    pub fn ensure_user(&self, profile: &UserProfile) -> QueueResult<User> {
        self.storage.with_tx(|tx| exec_ensure_user(tx, profile))
    }

    /// Explicitly resets the display name to the profile's full name.
    pub fn reset_display_name(&self, profile: &UserProfile) -> QueueResult<User> {
        self.storage.with_tx(|tx| {
            exec_ensure_user(tx, profile)?;
            tx.execute(
                "UPDATE users SET display_name = ?1 WHERE user_id = ?2",
                params![profile.full_name(), profile.user_id],
            )?;
            query_user(tx, profile.user_id)?.ok_or(QueueError::MemberNotFound)
        })
    }
}

pub(crate) fn exec_ensure_user(conn: &Connection, profile: &UserProfile) -> QueueResult<User> {
    let username = normalize_handle(profile.username.as_deref());

    match query_user(conn, profile.user_id)? {
        Some(mut existing) => {
            if existing.username != username {
                conn.execute(
                    "UPDATE users SET username = ?1 WHERE user_id = ?2",
                    params![username, profile.user_id],
                )?;
                debug!(user_id = profile.user_id, "refreshed username");
                existing.username = username;
            }
            Ok(existing)
        }
        None => {
            let display_name = profile.full_name();
            conn.execute(
                "INSERT INTO users (user_id, username, display_name) VALUES (?1, ?2, ?3)",
                params![profile.user_id, username, display_name],
            )?;
            debug!(user_id = profile.user_id, "registered user");
            Ok(User {
                user_id: profile.user_id,
                username,
                display_name,
            })
        }
    }
}

/// Scans `members` in order and returns the first identifier match.
pub fn match_identifier<'m>(members: &'m [Member], identifier: &str) -> Option<&'m Member> {
    let wanted = identifier.trim();
    if wanted.is_empty() {
        return None;
    }
    let wanted_lower = wanted.to_lowercase();
    let wanted_handle = wanted
        .strip_prefix(HANDLE_MARKER)
        .unwrap_or(wanted)
        .to_lowercase();

    members.iter().find(|m| {
        let handle_hit = m
            .username
            .as_deref()
            .map(|u| u.trim_start_matches(HANDLE_MARKER).to_lowercase())
            .is_some_and(|u| !u.is_empty() && u == wanted_handle);
        handle_hit || m.display_name.to_lowercase() == wanted_lower
    })
}

fn normalize_handle(raw: Option<&str>) -> Option<String> {
    raw.map(|s| s.trim().trim_start_matches(HANDLE_MARKER))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

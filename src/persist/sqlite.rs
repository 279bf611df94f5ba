//! SQLite-backed storage engine.
//!
//! One connection sits behind one mutex. Every public method takes the lock
//! for its whole duration, and every method that issues more than one
//! statement also runs inside a transaction, so callers observe each
//! operation as a single atomic step.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior, params};
use tracing::{debug, info};

use crate::{
    config::StorageConfig,
    error::{QueueError, QueueResult, classify_create_error},
    model::{Chat, Member, QueueSummary, Reposition, User},
    ordering::{self, Direction, PositionTable, Shift},
    types::{ChatId, Position, QueueId, UserId},
};

/// Storage handle owning the process-wide database connection.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Opens or creates a database file at `path` with default settings.
    pub fn open(path: impl AsRef<Path>) -> QueueResult<Self> {
        Self::open_with(&StorageConfig {
            path: path.as_ref().to_path_buf(),
            ..StorageConfig::default()
        })
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> QueueResult<Self> {
        Self::open_with(&StorageConfig::in_memory())
    }

    /// Opens the database described by `config`.
    ///
    /// Applies the schema, enables foreign keys and, for file databases with
    /// `wal` set, switches to WAL with `synchronous=NORMAL`.
    pub fn open_with(config: &StorageConfig) -> QueueResult<Self> {
        let conn = if config.is_in_memory() {
            Connection::open_in_memory()?
        } else {
            Connection::open(&config.path)?
        };
        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        if config.wal && !config.is_in_memory() {
            conn.pragma_update(None, "journal_mode", "WAL")?;
            conn.pragma_update(None, "synchronous", "NORMAL")?;
        }
        conn.execute_batch(include_str!("schema.sql"))?;

        info!(path = %config.path.display(), "queue storage opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Closes the connection, surfacing any error SQLite reports on close.
    pub fn close(self) -> QueueResult<()> {
        let conn = self.conn.into_inner().unwrap_or_else(PoisonError::into_inner);
        conn.close().map_err(|(_, err)| QueueError::from(err))?;
        info!("queue storage closed");
        Ok(())
    }

    /// Runs `f` while holding the global lock.
    pub(crate) fn with_conn<F, T>(&self, f: F) -> QueueResult<T>
    where
        F: FnOnce(&Connection) -> QueueResult<T>,
    {
        let conn = self.lock();
        f(&conn)
    }

    /// Runs `f` inside one transaction while holding the global lock.
    /// Commits on `Ok`; an `Err` drops the transaction, which rolls back.
    pub(crate) fn with_tx<F, T>(&self, f: F) -> QueueResult<T>
    where
        F: FnOnce(&Transaction<'_>) -> QueueResult<T>,
    {
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    // A panic inside a critical section unwinds through the transaction
    // guard, which rolls back, so the stored state is still consistent.
    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -- Chats and users --

    /// Inserts the chat if absent; an existing row is left untouched.
    pub fn upsert_chat(&self, chat_id: ChatId, chat_name: Option<&str>) -> QueueResult<()> {
        self.with_conn(|conn| exec_upsert_chat(conn, chat_id, chat_name))
    }

    /// Stored chat row, if any.
    pub fn get_chat(&self, chat_id: ChatId) -> QueueResult<Option<Chat>> {
        self.with_conn(|conn| {
            let chat = conn
                .query_row(
                    "SELECT chat_id, chat_name FROM chats WHERE chat_id = ?1",
                    params![chat_id],
                    |row| {
                        Ok(Chat {
                            chat_id: row.get(0)?,
                            chat_name: row.get(1)?,
                        })
                    },
                )
                .optional()?;
            Ok(chat)
        })
    }

    /// Inserts the user or replaces the entire row.
    pub fn upsert_user(
        &self,
        user_id: UserId,
        username: Option<&str>,
        display_name: &str,
    ) -> QueueResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (user_id, username, display_name) VALUES (?1, ?2, ?3)
                 ON CONFLICT(user_id) DO UPDATE SET
                     username = excluded.username,
                     display_name = excluded.display_name",
                params![user_id, username, display_name],
            )?;
            Ok(())
        })
    }

    /// Stored user row, if any.
    pub fn get_user(&self, user_id: UserId) -> QueueResult<Option<User>> {
        self.with_conn(|conn| query_user(conn, user_id))
    }

    /// Overwrites the display name. Returns false when the user is unknown.
    pub fn set_display_name(&self, user_id: UserId, display_name: &str) -> QueueResult<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE users SET display_name = ?1 WHERE user_id = ?2",
                params![display_name, user_id],
            )?;
            Ok(n > 0)
        })
    }

    // -- Queues --

    /// Creates a queue and returns its id; fails with
    /// [`QueueError::DuplicateQueue`] when the name is taken in the chat.
    pub fn create_queue(
        &self,
        name: &str,
        chat_id: ChatId,
        creator_id: UserId,
    ) -> QueueResult<QueueId> {
        self.with_conn(|conn| exec_create_queue(conn, name, chat_id, creator_id))
    }

    /// Removes all memberships and then the queue row. Returns the number of
    /// memberships removed; a missing queue removes nothing.
    pub fn delete_queue(&self, queue_id: QueueId) -> QueueResult<usize> {
        self.with_tx(|tx| exec_delete_queue(tx, queue_id))
    }

    /// Queue id for an exact `(name, chat)` match.
    pub fn get_queue_id(&self, name: &str, chat_id: ChatId) -> QueueResult<QueueId> {
        self.with_conn(|conn| query_queue_id(conn, name, chat_id))
    }

    /// All queues of a chat with their sizes, ordered by name.
    pub fn list_queues(&self, chat_id: ChatId) -> QueueResult<Vec<QueueSummary>> {
        self.with_conn(|conn| query_list_queues(conn, chat_id))
    }

    /// Display name of the queue's creator.
    pub fn get_creator_name(&self, queue_id: QueueId) -> QueueResult<String> {
        self.with_conn(|conn| query_creator_name(conn, queue_id))
    }

    /// Members ordered by position.
    pub fn list_members(&self, queue_id: QueueId) -> QueueResult<Vec<Member>> {
        self.with_conn(|conn| query_members(conn, queue_id))
    }

    /// Number of members, 0 when empty.
    pub fn count_members(&self, queue_id: QueueId) -> QueueResult<u32> {
        self.with_conn(|conn| query_count(conn, queue_id))
    }

    /// Current position of `user_id`, if a member.
    pub fn position_of(&self, queue_id: QueueId, user_id: UserId) -> QueueResult<Option<Position>> {
        self.with_conn(|conn| SqlPositions::new(conn).position_of(queue_id, user_id))
    }

    // -- Ordering --

    /// Appends the user; see [`ordering::join`].
    pub fn join(&self, queue_id: QueueId, user_id: UserId) -> QueueResult<Position> {
        self.with_tx(|tx| {
            require_queue(tx, queue_id)?;
            ordering::join(&mut SqlPositions::new(tx), queue_id, user_id)
        })
    }

    /// Removes the user and compacts; see [`ordering::leave`].
    pub fn leave(&self, queue_id: QueueId, user_id: UserId) -> QueueResult<Position> {
        self.with_tx(|tx| exec_leave(tx, queue_id, user_id))
    }

    /// Moves the user to the end; see [`ordering::move_to_end`].
    pub fn move_to_end(&self, queue_id: QueueId, user_id: UserId) -> QueueResult<Position> {
        self.with_tx(|tx| {
            require_queue(tx, queue_id)?;
            ordering::move_to_end(&mut SqlPositions::new(tx), queue_id, user_id)
        })
    }

    /// Relocates the user; see [`ordering::set_position`].
    pub fn set_position(
        &self,
        queue_id: QueueId,
        user_id: UserId,
        new_position: Position,
    ) -> QueueResult<Reposition> {
        self.with_tx(|tx| {
            ordering::set_position(&mut SqlPositions::new(tx), queue_id, user_id, new_position)
        })
    }

    /// Swaps the user with the next one; see [`ordering::skip_one`].
    pub fn skip_one(&self, queue_id: QueueId, user_id: UserId) -> QueueResult<bool> {
        self.with_tx(|tx| ordering::skip_one(&mut SqlPositions::new(tx), queue_id, user_id))
    }
}

/// [`PositionTable`] over the `queue_members` table of an open connection.
pub(crate) struct SqlPositions<'c> {
    conn: &'c Connection,
}

impl<'c> SqlPositions<'c> {
    pub(crate) fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }
}

impl PositionTable for SqlPositions<'_> {
    fn position_of(&self, queue: QueueId, user: UserId) -> QueueResult<Option<Position>> {
        let pos = self
            .conn
            .query_row(
                "SELECT position FROM queue_members WHERE queue_id = ?1 AND user_id = ?2",
                params![queue, user],
                |row| row.get(0),
            )
            .optional()?;
        Ok(pos)
    }

    fn member_at(&self, queue: QueueId, position: Position) -> QueueResult<Option<UserId>> {
        let user = self
            .conn
            .query_row(
                "SELECT user_id FROM queue_members WHERE queue_id = ?1 AND position = ?2",
                params![queue, position],
                |row| row.get(0),
            )
            .optional()?;
        Ok(user)
    }

    fn max_position(&self, queue: QueueId) -> QueueResult<Option<Position>> {
        let max: Option<Position> = self.conn.query_row(
            "SELECT MAX(position) FROM queue_members WHERE queue_id = ?1",
            params![queue],
            |row| row.get(0),
        )?;
        Ok(max)
    }

    fn count(&self, queue: QueueId) -> QueueResult<u32> {
        query_count(self.conn, queue)
    }

    fn insert(&mut self, queue: QueueId, user: UserId, position: Position) -> QueueResult<()> {
        self.conn.execute(
            "INSERT INTO queue_members (queue_id, user_id, position) VALUES (?1, ?2, ?3)",
            params![queue, user, position],
        )?;
        Ok(())
    }

    fn set(&mut self, queue: QueueId, user: UserId, position: Position) -> QueueResult<()> {
        self.conn.execute(
            "UPDATE queue_members SET position = ?3 WHERE queue_id = ?1 AND user_id = ?2",
            params![queue, user, position],
        )?;
        Ok(())
    }

    fn remove(&mut self, queue: QueueId, user: UserId) -> QueueResult<bool> {
        let n = self.conn.execute(
            "DELETE FROM queue_members WHERE queue_id = ?1 AND user_id = ?2",
            params![queue, user],
        )?;
        Ok(n > 0)
    }

    fn shift(&mut self, queue: QueueId, shift: Shift) -> QueueResult<usize> {
        let sql = match (shift.direction, shift.last.is_some()) {
            (Direction::Down, false) => {
                "UPDATE queue_members SET position = position - 1
                 WHERE queue_id = ?1 AND position >= ?2"
            }
            (Direction::Down, true) => {
                "UPDATE queue_members SET position = position - 1
                 WHERE queue_id = ?1 AND position >= ?2 AND position <= ?3"
            }
            (Direction::Up, false) => {
                "UPDATE queue_members SET position = position + 1
                 WHERE queue_id = ?1 AND position >= ?2"
            }
            (Direction::Up, true) => {
                "UPDATE queue_members SET position = position + 1
                 WHERE queue_id = ?1 AND position >= ?2 AND position <= ?3"
            }
        };
        let touched = match shift.last {
            Some(last) => self.conn.execute(sql, params![queue, shift.first, last])?,
            None => self.conn.execute(sql, params![queue, shift.first])?,
        };
        Ok(touched)
    }
}

pub(crate) fn exec_upsert_chat(
    conn: &Connection,
    chat_id: ChatId,
    chat_name: Option<&str>,
) -> QueueResult<()> {
    conn.execute(
        "INSERT OR IGNORE INTO chats (chat_id, chat_name) VALUES (?1, ?2)",
        params![chat_id, chat_name],
    )?;
    Ok(())
}

pub(crate) fn exec_create_queue(
    conn: &Connection,
    name: &str,
    chat_id: ChatId,
    creator_id: UserId,
) -> QueueResult<QueueId> {
    conn.execute(
        "INSERT INTO queues (queue_name, chat_id, creator_id) VALUES (?1, ?2, ?3)",
        params![name, chat_id, creator_id],
    )
    .map_err(classify_create_error)?;
    let queue_id = conn.last_insert_rowid();
    info!(queue_id, chat_id, name, "queue created");
    Ok(queue_id)
}

pub(crate) fn exec_delete_queue(conn: &Connection, queue_id: QueueId) -> QueueResult<usize> {
    let removed = conn.execute(
        "DELETE FROM queue_members WHERE queue_id = ?1",
        params![queue_id],
    )?;
    let gone = conn.execute("DELETE FROM queues WHERE queue_id = ?1", params![queue_id])?;
    if gone > 0 {
        info!(queue_id, removed, "queue deleted");
    }
    Ok(removed)
}

/// Looks up the member's position and removes it; returns the old position.
pub(crate) fn exec_leave(conn: &Connection, queue_id: QueueId, user_id: UserId) -> QueueResult<Position> {
    let mut table = SqlPositions::new(conn);
    let position = table
        .position_of(queue_id, user_id)?
        .ok_or(QueueError::NotAMember)?;
    ordering::leave(&mut table, queue_id, user_id, position)?;
    Ok(position)
}

pub(crate) fn require_queue(conn: &Connection, queue_id: QueueId) -> QueueResult<()> {
    let found = conn
        .query_row(
            "SELECT 1 FROM queues WHERE queue_id = ?1",
            params![queue_id],
            |_| Ok(()),
        )
        .optional()?;
    found.ok_or(QueueError::QueueNotFound)
}

pub(crate) fn query_queue_id(conn: &Connection, name: &str, chat_id: ChatId) -> QueueResult<QueueId> {
    conn.query_row(
        "SELECT queue_id FROM queues WHERE queue_name = ?1 AND chat_id = ?2",
        params![name, chat_id],
        |row| row.get(0),
    )
    .optional()?
    .ok_or(QueueError::QueueNotFound)
}

pub(crate) fn query_list_queues(conn: &Connection, chat_id: ChatId) -> QueueResult<Vec<QueueSummary>> {
    let mut stmt = conn.prepare(
        "SELECT q.queue_name, COUNT(qm.user_id)
         FROM queues q
         LEFT JOIN queue_members qm ON q.queue_id = qm.queue_id
         WHERE q.chat_id = ?1
         GROUP BY q.queue_id, q.queue_name
         ORDER BY q.queue_name ASC",
    )?;
    let rows = stmt.query_map(params![chat_id], |row| {
        Ok(QueueSummary {
            name: row.get(0)?,
            member_count: row.get(1)?,
        })
    })?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub(crate) fn query_creator_name(conn: &Connection, queue_id: QueueId) -> QueueResult<String> {
    conn.query_row(
        "SELECT u.display_name
         FROM queues q
         JOIN users u ON q.creator_id = u.user_id
         WHERE q.queue_id = ?1",
        params![queue_id],
        |row| row.get(0),
    )
    .optional()?
    .ok_or(QueueError::QueueNotFound)
}

pub(crate) fn query_members(conn: &Connection, queue_id: QueueId) -> QueueResult<Vec<Member>> {
    let mut stmt = conn.prepare(
        "SELECT u.display_name, u.username, qm.position, qm.user_id
         FROM queue_members qm
         JOIN users u ON qm.user_id = u.user_id
         WHERE qm.queue_id = ?1
         ORDER BY qm.position ASC",
    )?;
    let rows = stmt.query_map(params![queue_id], |row| {
        Ok(Member {
            display_name: row.get(0)?,
            username: row.get(1)?,
            position: row.get(2)?,
            user_id: row.get(3)?,
        })
    })?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    debug!(queue_id, members = out.len(), "listed members");
    Ok(out)
}

pub(crate) fn query_count(conn: &Connection, queue_id: QueueId) -> QueueResult<u32> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM queue_members WHERE queue_id = ?1",
        params![queue_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub(crate) fn query_user(conn: &Connection, user_id: UserId) -> QueueResult<Option<User>> {
    let user = conn
        .query_row(
            "SELECT user_id, username, display_name FROM users WHERE user_id = ?1",
            params![user_id],
            |row| {
                Ok(User {
                    user_id: row.get(0)?,
                    username: row.get(1)?,
                    display_name: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage_with_queue() -> (SqliteStorage, QueueId) {
        let storage = SqliteStorage::open_in_memory().expect("open");
        storage.upsert_chat(1, Some("chat")).expect("chat");
        for (id, name) in [(10, "Ann"), (20, "Bob"), (30, "Cid")] {
            storage.upsert_user(id, None, name).expect("user");
        }
        let q = storage.create_queue("Math", 1, 10).expect("create");
        (storage, q)
    }

    #[test]
    fn failed_compound_operation_rolls_back() {
        let (storage, q) = storage_with_queue();
        storage.join(q, 10).expect("join");
        let res: QueueResult<()> = storage.with_tx(|tx| {
            let mut table = SqlPositions::new(tx);
            table.remove(q, 10)?;
            Err(QueueError::NotAMember)
        });
        assert!(res.is_err());
        assert_eq!(storage.position_of(q, 10).expect("pos"), Some(1));
    }

    #[test]
    fn foreign_key_failure_is_not_a_duplicate() {
        let (storage, _) = storage_with_queue();
        let err = storage.create_queue("Physics", 999, 10).expect_err("unknown chat");
        assert!(matches!(err, QueueError::Internal(_)), "{err:?}");
        let err = storage.create_queue("Math", 1, 20).expect_err("duplicate");
        assert!(matches!(err, QueueError::DuplicateQueue));
    }

    #[test]
    fn join_on_missing_queue_is_not_found() {
        let (storage, q) = storage_with_queue();
        assert!(matches!(storage.join(q + 100, 10), Err(QueueError::QueueNotFound)));
    }

    #[test]
    fn sql_shift_matches_memory_shift() {
        let (storage, q) = storage_with_queue();
        for user in [10, 20, 30] {
            storage.join(q, user).expect("join");
        }
        let touched = storage
            .with_tx(|tx| {
                SqlPositions::new(tx).shift(
                    q,
                    Shift {
                        first: 2,
                        last: Some(2),
                        direction: Direction::Up,
                    },
                )
            })
            .expect("shift");
        assert_eq!(touched, 1);
        assert_eq!(storage.position_of(q, 20).expect("pos"), Some(3));
    }
}

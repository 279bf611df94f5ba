//! Relational storage for chats, users, queues and memberships.

/// SQLite implementation of the storage engine.
pub mod sqlite;

pub use sqlite::SqliteStorage;

//! Shared primitive IDs.

/// Chat identifier as issued by the messaging transport.
pub type ChatId = i64;
/// User identifier as issued by the messaging transport.
pub type UserId = i64;
/// Storage-assigned, monotonic queue identifier.
pub type QueueId = i64;
/// One-based position of a member inside a queue.
pub type Position = u32;

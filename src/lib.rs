//! Named, per-chat queues with dense ordering, backed by SQLite.
//!
//! Every queue keeps its members at positions `1..=N` with no gaps. All
//! mutations run under one global lock inside one transaction, so any number
//! of threads or tasks may call in concurrently.
//!
//! # Examples
//!
//! Synchronous usage with [`service::QueueService`]:
//! ```
//! use queuemate::{
//!     model::UserProfile,
//!     persist::SqliteStorage,
//!     service::QueueService,
//! };
//!
//! let service = QueueService::new(SqliteStorage::open_in_memory().expect("open"));
//! service.register_chat(-100, Some("Study group")).expect("chat");
//! let ann = UserProfile {
//!     user_id: 1,
//!     username: Some("ann".to_string()),
//!     first_name: "Ann".to_string(),
//!     last_name: None,
//! };
//! service.ensure_user(&ann).expect("user");
//! service.create_queue("Math", -100, ann.user_id, true).expect("create");
//!
//! let joined = service.join_queue("Math", -100, ann.user_id).expect("join");
//! assert_eq!(joined.position, 1);
//! assert_eq!(joined.members[0].display_name, "Ann");
//! ```
//!
//! Async usage through the runtime handle:
//! ```no_run
//! use std::sync::Arc;
//!
//! use queuemate::{
//!     config::CoreConfig,
//!     persist::SqliteStorage,
//!     runtime::handle::spawn_queue_runtime,
//!     service::QueueService,
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let cfg = CoreConfig::from_env().expect("config");
//! let storage = SqliteStorage::open_with(&cfg.storage).expect("open sqlite");
//! let handle = spawn_queue_runtime(Arc::new(QueueService::new(storage)), cfg.runtime);
//! let queues = handle.view_all(-100).await.expect("view");
//! println!("{} queues", queues.len());
//! handle.shutdown().await.expect("shutdown");
//! # }
//! ```

/// Storage and runtime configuration.
pub mod config;
/// Queue lookup by name and member lookup by identifier.
pub mod directory;
/// Error taxonomy.
pub mod error;
/// Named records returned to callers.
pub mod model;
/// Dense-ordering algorithms.
pub mod ordering;
/// SQLite storage engine.
pub mod persist;
/// Async command loop and events.
pub mod runtime;
/// Synchronous call surface for adapters.
pub mod service;
/// Shared primitive types.
pub mod types;

pub use error::{QueueError, QueueResult};

//! Subscriber registry: the durable set of chats that opted in to broadcasts.
//!
//! Every backend implements [`SubscriberStore`]. Application code only ever
//! holds an `Arc<dyn SubscriberStore>`; which backend sits behind it is decided
//! once at startup from configuration.
//!
//! - [`SqliteStore`]: production backend. Reads go through the pool, writes
//!   go through a single-writer actor (see [`writer`]).
//! - [`MemoryStore`]: in-process backend for tests and throwaway runs.

pub mod memory;
pub mod sqlite;
pub mod writer;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use self::memory::MemoryStore;
pub use self::sqlite::SqliteStore;

// ---------------------------------------------------------------------------
// Domain types
// ---------------------------------------------------------------------------

/// Recipient handle assigned by the transport (a Telegram chat id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriberId(pub i64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for SubscriberId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// A registered subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscriber {
    /// Unique recipient id.
    pub id: SubscriberId,
    /// Id of the last message delivered to this subscriber, if recorded.
    pub last_message_id: Option<i64>,
    /// ISO-8601 creation timestamp assigned by the store.
    pub created_at: Option<String>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from subscriber store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Write channel is closed (writer actor stopped).
    #[error("subscriber writer channel closed")]
    WriterClosed,

    /// Filesystem error while preparing the database location.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Store contract
// ---------------------------------------------------------------------------

/// Storage-agnostic subscriber registry.
///
/// `add` and `remove` are idempotent and must be safe to call concurrently.
/// A failed write leaves the previous state intact and is reported as an
/// error.
#[async_trait]
pub trait SubscriberStore: Send + Sync {
    /// Insert `id` if absent. Adding an existing id is a no-op success.
    async fn add(&self, id: SubscriberId) -> Result<(), StoreError>;

    /// Delete `id` if present. Removing an unknown id is a no-op success.
    async fn remove(&self, id: SubscriberId) -> Result<(), StoreError>;

    /// Snapshot of every known subscriber id.
    ///
    /// Backends return ids in creation order, but callers must not depend on
    /// ordering for correctness.
    async fn list_all(&self) -> Result<Vec<SubscriberId>, StoreError>;

    /// Returns `true` if `id` is registered.
    async fn contains(&self, id: SubscriberId) -> Result<bool, StoreError>;

    /// Remember the id of the last message delivered to `id`.
    ///
    /// Unknown subscribers are ignored; recording never enrolls anyone.
    async fn record_message_id(&self, id: SubscriberId, message_id: i64)
        -> Result<(), StoreError>;

    /// Id of the last message delivered to `id`, if any.
    async fn last_message_id(&self, id: SubscriberId) -> Result<Option<i64>, StoreError>;

    /// Number of registered subscribers.
    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.list_all().await?.len())
    }
}

//! SQLite-backed subscriber store.
//!
//! The [`SqliteStore`] is the sole gateway to the subscriber database. Reads
//! go straight to the connection pool (concurrent). Writes go through the
//! single-writer actor in [`super::writer`].

use std::path::Path;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tokio::sync::{mpsc, oneshot};
use tracing::info;

use super::writer::{self, Reply, WriteOp};
use super::{StoreError, SubscriberId, SubscriberStore};

/// Writer channel capacity.
const WRITER_CHANNEL_CAPACITY: usize = 256;

/// Schema applied on open. Statements are idempotent.
const SCHEMA: &str = include_str!("../../migrations/001_subscribers.sql");

/// Subscriber store persisted in SQLite.
pub struct SqliteStore {
    /// Connection pool for reads.
    db: SqlitePool,
    /// Channel to the single-writer actor.
    writer_tx: mpsc::Sender<WriteOp>,
    /// Writer actor join handle (held so we can await on shutdown).
    writer_handle: tokio::task::JoinHandle<()>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open (or create) the database file at `path` and apply the schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created, the
    /// database cannot be opened, or the schema fails to apply.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let opts = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(opts)
            .await?;

        info!(path = %path.display(), "subscriber database opened");
        Self::new(pool).await
    }

    /// Open a private in-memory database.
    ///
    /// In-memory databases are per-connection, so the pool is limited to a
    /// single connection shared by reads and the writer.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let opts = SqliteConnectOptions::new()
            .filename(":memory:")
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await?;
        Self::new(pool).await
    }

    /// Wrap an existing pool, apply the schema and spawn the writer actor.
    pub async fn new(db: SqlitePool) -> Result<Self, StoreError> {
        sqlx::raw_sql(SCHEMA).execute(&db).await?;

        let (writer_tx, writer_rx) = mpsc::channel(WRITER_CHANNEL_CAPACITY);
        let writer_handle = tokio::spawn(writer::run_writer(db.clone(), writer_rx));

        Ok(Self {
            db,
            writer_tx,
            writer_handle,
        })
    }

    /// Returns a reference to the underlying SQLite pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.db
    }

    /// Gracefully shut down the writer actor.
    ///
    /// Drops the sender channel and awaits the writer task to drain.
    pub async fn shutdown(self) {
        drop(self.writer_tx);
        let _ = self.writer_handle.await;
        info!("subscriber store shut down");
    }

    /// Send a write to the actor and wait for its result.
    async fn write(&self, build: impl FnOnce(Reply) -> WriteOp) -> Result<(), StoreError> {
        let (reply, done) = oneshot::channel();
        self.writer_tx
            .send(build(reply))
            .await
            .map_err(|_| StoreError::WriterClosed)?;
        done.await.map_err(|_| StoreError::WriterClosed)??;
        Ok(())
    }
}

#[async_trait]
impl SubscriberStore for SqliteStore {
    async fn add(&self, id: SubscriberId) -> Result<(), StoreError> {
        self.write(|reply| WriteOp::Add { id, reply }).await
    }

    async fn remove(&self, id: SubscriberId) -> Result<(), StoreError> {
        self.write(|reply| WriteOp::Remove { id, reply }).await
    }

    async fn list_all(&self) -> Result<Vec<SubscriberId>, StoreError> {
        let rows: Vec<(i64,)> =
            sqlx::query_as("SELECT id FROM subscribers ORDER BY seq ASC")
                .fetch_all(&self.db)
                .await?;
        Ok(rows.into_iter().map(|(id,)| SubscriberId(id)).collect())
    }

    async fn contains(&self, id: SubscriberId) -> Result<bool, StoreError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM subscribers WHERE id = ?1")
            .bind(id.0)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.is_some())
    }

    async fn record_message_id(
        &self,
        id: SubscriberId,
        message_id: i64,
    ) -> Result<(), StoreError> {
        self.write(|reply| WriteOp::RecordMessageId {
            id,
            message_id,
            reply,
        })
        .await
    }

    async fn last_message_id(&self, id: SubscriberId) -> Result<Option<i64>, StoreError> {
        let row: Option<(Option<i64>,)> =
            sqlx::query_as("SELECT last_message_id FROM subscribers WHERE id = ?1")
                .bind(id.0)
                .fetch_optional(&self.db)
                .await?;
        Ok(row.and_then(|(message_id,)| message_id))
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let row: (i64,) = sqlx::query_as("SELECT count(*) FROM subscribers")
            .fetch_one(&self.db)
            .await?;
        Ok(usize::try_from(row.0).unwrap_or(0))
    }
}

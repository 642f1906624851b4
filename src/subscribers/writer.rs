//! Single-writer actor for serialized SQLite writes.
//!
//! All subscriber mutations flow through this actor via an
//! [`mpsc`](tokio::sync::mpsc) channel. This prevents SQLite write contention
//! while allowing concurrent reads through the connection pool. Every
//! operation carries a oneshot reply so the caller learns whether its write
//! landed.

use sqlx::SqlitePool;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, trace};

use super::SubscriberId;

/// Reply channel for a single write.
pub type Reply = oneshot::Sender<Result<(), sqlx::Error>>;

/// Operations that can be sent to the write actor.
#[derive(Debug)]
pub enum WriteOp {
    /// Insert a subscriber if absent.
    Add {
        /// Subscriber to insert.
        id: SubscriberId,
        /// Where to report the result.
        reply: Reply,
    },

    /// Delete a subscriber if present.
    Remove {
        /// Subscriber to delete.
        id: SubscriberId,
        /// Where to report the result.
        reply: Reply,
    },

    /// Store the last delivered message id for an existing subscriber.
    RecordMessageId {
        /// Subscriber that received the message.
        id: SubscriberId,
        /// Transport message id.
        message_id: i64,
        /// Where to report the result.
        reply: Reply,
    },
}

/// Run the single-writer actor loop.
///
/// Processes [`WriteOp`] messages until the sender half is dropped.
/// Each operation is a single SQL statement, so it either applies fully or
/// not at all.
pub async fn run_writer(db: SqlitePool, mut rx: mpsc::Receiver<WriteOp>) {
    while let Some(op) = rx.recv().await {
        match op {
            WriteOp::Add { id, reply } => {
                let result = sqlx::query("INSERT OR IGNORE INTO subscribers (id) VALUES (?1)")
                    .bind(id.0)
                    .execute(&db)
                    .await
                    .map(|done| trace!(%id, inserted = done.rows_affected(), "subscriber add"));
                respond(reply, result, "add");
            }

            WriteOp::Remove { id, reply } => {
                let result = sqlx::query("DELETE FROM subscribers WHERE id = ?1")
                    .bind(id.0)
                    .execute(&db)
                    .await
                    .map(|done| trace!(%id, deleted = done.rows_affected(), "subscriber remove"));
                respond(reply, result, "remove");
            }

            WriteOp::RecordMessageId {
                id,
                message_id,
                reply,
            } => {
                let result =
                    sqlx::query("UPDATE subscribers SET last_message_id = ?1 WHERE id = ?2")
                        .bind(message_id)
                        .bind(id.0)
                        .execute(&db)
                        .await
                        .map(|_| trace!(%id, message_id, "last message id recorded"));
                respond(reply, result, "record_message_id");
            }
        }
    }
    trace!("subscriber writer actor stopped");
}

fn respond(reply: Reply, result: Result<(), sqlx::Error>, op: &'static str) {
    if let Err(ref err) = result {
        error!(op, error = %err, "subscriber write failed");
    }
    // The caller may have given up waiting; the write outcome stands either way.
    let _ = reply.send(result);
}

//! Broadcast engine: deliver one message to every subscriber.
//!
//! A run takes a single snapshot of the registry, then fans out one delivery
//! attempt per subscriber with bounded concurrency. Failures are isolated per
//! recipient and folded into a [`DeliveryReport`]; only an invalid message or
//! an unreadable registry aborts the run, and both happen before any send.
//!
//! Runs are cancellable through a [`CancellationToken`]. Deliveries already in
//! flight finish; no new ones start.

pub mod message;
pub mod report;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use tokio::sync::Semaphore;
use tokio::task::{self, JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::subscribers::{StoreError, SubscriberId, SubscriberStore};

pub use self::message::{BroadcastMessage, Formatting, ImageRef, Link};
pub use self::report::{DeliveryError, DeliveryOutcome, DeliveryReport, DeliveryStatus};

// ---------------------------------------------------------------------------
// Transport seam
// ---------------------------------------------------------------------------

/// Delivers one message to one recipient.
///
/// Implemented by the chat transport. This is the only place a delivery can
/// fail; the engine calls it exactly once per subscriber per run. Per-send
/// timeouts are the implementation's responsibility and surface as an
/// `Err(DeliveryError)`.
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Send `message` to `recipient`.
    async fn send(
        &self,
        recipient: SubscriberId,
        message: &BroadcastMessage,
    ) -> Result<(), DeliveryError>;
}

// ---------------------------------------------------------------------------
// Errors and policy
// ---------------------------------------------------------------------------

/// Reasons a broadcast run is rejected before any message is sent.
#[derive(Debug, thiserror::Error)]
pub enum BroadcastError {
    /// The message has neither text nor an image.
    #[error("broadcast aborted, no messages sent: invalid message: {0}")]
    InvalidMessage(String),

    /// The subscriber snapshot could not be read.
    #[error("broadcast aborted, no messages sent: subscriber store unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),
}

/// Which failed recipients are removed from the registry after a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrunePolicy {
    /// Keep every subscriber.
    #[default]
    Never,
    /// Remove recipients whose failure the transport marked permanent.
    Permanent,
    /// Remove every recipient whose delivery failed.
    AnyFailure,
}

/// Engine tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Maximum deliveries in flight at once. Zero is treated as one.
    pub max_concurrent: usize,
    /// Post-run removal policy.
    pub prune: PrunePolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 8,
            prune: PrunePolicy::Never,
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Fans a message out to the current subscriber set.
#[derive(Clone)]
pub struct BroadcastEngine {
    store: Arc<dyn SubscriberStore>,
    config: EngineConfig,
}

impl BroadcastEngine {
    /// Create an engine reading from and pruning `store`.
    pub fn new(store: Arc<dyn SubscriberStore>, config: EngineConfig) -> Self {
        Self { store, config }
    }

    /// Deliver `message` to every subscriber known at the start of the call.
    ///
    /// Subscribers registered after the snapshot is taken are not included.
    /// The returned report accounts for every snapshot id as sent, failed, or
    /// skipped (cancelled before its attempt started).
    ///
    /// # Errors
    ///
    /// - [`BroadcastError::InvalidMessage`] if the message has no content;
    ///   the store is not touched.
    /// - [`BroadcastError::StoreUnavailable`] if the snapshot read fails;
    ///   nothing is sent.
    pub async fn broadcast(
        &self,
        message: BroadcastMessage,
        sender: Arc<dyn MessageSender>,
        cancel: &CancellationToken,
    ) -> Result<DeliveryReport, BroadcastError> {
        message.validate()?;

        let run_id = Uuid::new_v4();
        self.run(message, sender, cancel)
            .instrument(info_span!("broadcast", %run_id))
            .await
    }

    async fn run(
        &self,
        message: BroadcastMessage,
        sender: Arc<dyn MessageSender>,
        cancel: &CancellationToken,
    ) -> Result<DeliveryReport, BroadcastError> {
        let recipients = self
            .store
            .list_all()
            .await
            .map_err(BroadcastError::StoreUnavailable)?;

        let total = recipients.len();
        let mut report = DeliveryReport::new(Utc::now());
        info!(
            recipients = total,
            max_concurrent = self.config.max_concurrent,
            "broadcast started"
        );

        let message = Arc::new(message);
        let permits = Arc::new(Semaphore::new(self.config.max_concurrent.max(1)));
        let mut set: JoinSet<DeliveryOutcome> = JoinSet::new();
        let mut in_flight: HashMap<task::Id, SubscriberId> = HashMap::new();
        let mut started: usize = 0;

        for id in recipients {
            let permit = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    report.cancelled = true;
                    break;
                }
                permit = Arc::clone(&permits).acquire_owned() => match permit {
                    Ok(p) => p,
                    Err(_) => break,
                },
            };

            started = started.saturating_add(1);
            let handle = set.spawn(deliver_one(
                id,
                Arc::clone(&sender),
                Arc::clone(&message),
                permit,
            ));
            in_flight.insert(handle.id(), id);

            while let Some(joined) = set.try_join_next_with_id() {
                collect(&mut report, &mut in_flight, joined);
            }
        }

        while let Some(joined) = set.join_next_with_id().await {
            collect(&mut report, &mut in_flight, joined);
        }

        report.skipped_count = total.saturating_sub(started);
        report.finished_at = Utc::now();

        info!(
            sent = report.sent_count,
            failed = report.failed_count,
            skipped = report.skipped_count,
            cancelled = report.cancelled,
            "broadcast finished"
        );

        self.prune(&report).await;
        Ok(report)
    }

    /// Remove failed recipients according to the prune policy.
    ///
    /// Runs after every attempt has completed. Store errors are logged per id
    /// and never change the report.
    async fn prune(&self, report: &DeliveryReport) {
        let doomed: &[SubscriberId] = match self.config.prune {
            PrunePolicy::Never => return,
            PrunePolicy::Permanent => &report.permanent_failure_ids,
            PrunePolicy::AnyFailure => &report.failed_subscriber_ids,
        };

        let mut removed: usize = 0;
        for id in doomed {
            match self.store.remove(*id).await {
                Ok(()) => removed = removed.saturating_add(1),
                Err(e) => warn!(subscriber = %id, error = %e, "failed to prune subscriber"),
            }
        }
        if removed > 0 {
            info!(removed, policy = ?self.config.prune, "pruned failed subscribers");
        }
    }
}

/// Run one delivery attempt and turn its result into an outcome.
async fn deliver_one(
    id: SubscriberId,
    sender: Arc<dyn MessageSender>,
    message: Arc<BroadcastMessage>,
    permit: tokio::sync::OwnedSemaphorePermit,
) -> DeliveryOutcome {
    let result = sender.send(id, &message).await;
    drop(permit);

    if let Err(ref e) = result {
        debug!(subscriber = %id, permanent = e.permanent, error = %e, "delivery failed");
    }
    DeliveryOutcome::from_result(id, result)
}

/// Fold a finished delivery task into the report.
///
/// A task that panicked or was aborted still counts as a failed attempt for
/// its recipient, so every started attempt shows up in the totals.
fn collect(
    report: &mut DeliveryReport,
    in_flight: &mut HashMap<task::Id, SubscriberId>,
    joined: Result<(task::Id, DeliveryOutcome), JoinError>,
) {
    match joined {
        Ok((task_id, outcome)) => {
            in_flight.remove(&task_id);
            report.record(&outcome);
        }
        Err(e) => {
            let Some(id) = in_flight.remove(&e.id()) else {
                warn!(error = %e, "unknown delivery task ended");
                return;
            };
            let detail = if e.is_panic() {
                "sender panicked".to_owned()
            } else {
                format!("delivery task aborted: {e}")
            };
            debug!(subscriber = %id, error = %detail, "delivery failed");
            report.record(&DeliveryOutcome::from_result(
                id,
                Err(DeliveryError::transient(detail)),
            ));
        }
    }
}

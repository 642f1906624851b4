//! Per-recipient outcomes and the aggregate report of a broadcast run.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::subscribers::SubscriberId;

/// Why a single delivery failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{detail}")]
pub struct DeliveryError {
    /// Human-readable cause reported by the transport.
    pub detail: String,
    /// `true` when retrying cannot succeed (recipient blocked the bot, chat
    /// no longer exists). Network errors and timeouts are transient.
    pub permanent: bool,
}

impl DeliveryError {
    /// A failure that may succeed on a later attempt.
    pub fn transient(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
            permanent: false,
        }
    }

    /// A failure that will recur for this recipient.
    pub fn permanent(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
            permanent: true,
        }
    }
}

/// Result status of one delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    /// The transport accepted the message.
    Delivered,
    /// The transport reported an error.
    Failed,
}

/// Outcome of delivering one message to one subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryOutcome {
    /// Recipient.
    pub subscriber_id: SubscriberId,
    /// Whether the delivery succeeded.
    pub status: DeliveryStatus,
    /// Failure cause, present iff `status` is [`DeliveryStatus::Failed`].
    pub error: Option<DeliveryError>,
}

impl DeliveryOutcome {
    /// Build an outcome from a sender result.
    pub fn from_result(subscriber_id: SubscriberId, result: Result<(), DeliveryError>) -> Self {
        match result {
            Ok(()) => Self {
                subscriber_id,
                status: DeliveryStatus::Delivered,
                error: None,
            },
            Err(error) => Self {
                subscriber_id,
                status: DeliveryStatus::Failed,
                error: Some(error),
            },
        }
    }
}

/// Aggregate result of one broadcast run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    /// Deliveries the transport accepted.
    pub sent_count: usize,
    /// Deliveries that failed.
    pub failed_count: usize,
    /// Recipients never attempted because the run was cancelled.
    pub skipped_count: usize,
    /// Failed recipients, in the order their attempts completed.
    pub failed_subscriber_ids: Vec<SubscriberId>,
    /// Subset of `failed_subscriber_ids` whose failure was permanent.
    pub permanent_failure_ids: Vec<SubscriberId>,
    /// `true` if the run stopped early on cancellation.
    pub cancelled: bool,
    /// When the snapshot was taken.
    pub started_at: DateTime<Utc>,
    /// When the last attempt completed.
    pub finished_at: DateTime<Utc>,
}

impl DeliveryReport {
    /// Empty report for a run starting now.
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            sent_count: 0,
            failed_count: 0,
            skipped_count: 0,
            failed_subscriber_ids: Vec::new(),
            permanent_failure_ids: Vec::new(),
            cancelled: false,
            started_at,
            finished_at: started_at,
        }
    }

    /// Fold one outcome into the totals.
    pub fn record(&mut self, outcome: &DeliveryOutcome) {
        match outcome.status {
            DeliveryStatus::Delivered => {
                self.sent_count = self.sent_count.saturating_add(1);
            }
            DeliveryStatus::Failed => {
                self.failed_count = self.failed_count.saturating_add(1);
                self.failed_subscriber_ids.push(outcome.subscriber_id);
                if outcome.error.as_ref().is_some_and(|e| e.permanent) {
                    self.permanent_failure_ids.push(outcome.subscriber_id);
                }
            }
        }
    }

    /// Number of recipients attempted.
    pub fn attempted(&self) -> usize {
        self.sent_count.saturating_add(self.failed_count)
    }

    /// One-line summary for operators.
    pub fn summary(&self) -> String {
        let mut line = format!(
            "Broadcast finished: {} delivered, {} failed.",
            self.sent_count, self.failed_count
        );
        if self.cancelled {
            line.push_str(&format!(
                " Cancelled, {} not attempted.",
                self.skipped_count
            ));
        }
        line
    }
}

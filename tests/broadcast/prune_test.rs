//! Tests for the post-run prune policy.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use herald::broadcast::{
    BroadcastEngine, BroadcastMessage, DeliveryError, EngineConfig, PrunePolicy,
};
use herald::subscribers::{MemoryStore, StoreError, SubscriberId, SubscriberStore};

use super::support::{ids, RecordingSender};

/// Two failures out of five: 2 is permanent, 4 is transient.
fn sender() -> Arc<RecordingSender> {
    Arc::new(
        RecordingSender::new()
            .failing(2, DeliveryError::permanent("Forbidden: bot was blocked by the user"))
            .failing(4, DeliveryError::transient("network error")),
    )
}

async fn run_with(policy: PrunePolicy) -> (Arc<MemoryStore>, herald::broadcast::DeliveryReport) {
    let store = Arc::new(MemoryStore::with_subscribers(ids(&[1, 2, 3, 4, 5])).await);
    let engine = BroadcastEngine::new(
        store.clone(),
        EngineConfig {
            max_concurrent: 2,
            prune: policy,
        },
    );
    let report = engine
        .broadcast(
            BroadcastMessage::text("hello"),
            sender(),
            &CancellationToken::new(),
        )
        .await
        .expect("broadcast should run");
    (store, report)
}

#[tokio::test]
async fn any_failure_policy_removes_every_failed_subscriber() {
    let (store, report) = run_with(PrunePolicy::AnyFailure).await;

    assert_eq!(report.failed_count, 2);
    let mut remaining = store.list_all().await.expect("list should succeed");
    remaining.sort();
    assert_eq!(remaining, ids(&[1, 3, 5]));
}

#[tokio::test]
async fn never_policy_keeps_everyone() {
    let (store, report) = run_with(PrunePolicy::Never).await;

    assert_eq!(report.failed_count, 2);
    assert_eq!(store.count().await.expect("count should succeed"), 5);
}

#[tokio::test]
async fn permanent_policy_keeps_transient_failures() {
    let (store, _report) = run_with(PrunePolicy::Permanent).await;

    assert!(!store.contains(SubscriberId(2)).await.expect("contains"));
    assert!(store.contains(SubscriberId(4)).await.expect("contains"));
    assert_eq!(store.count().await.expect("count should succeed"), 4);
}

/// Store whose removals always fail.
struct NoRemoveStore(MemoryStore);

#[async_trait]
impl SubscriberStore for NoRemoveStore {
    async fn add(&self, id: SubscriberId) -> Result<(), StoreError> {
        self.0.add(id).await
    }

    async fn remove(&self, _id: SubscriberId) -> Result<(), StoreError> {
        Err(StoreError::WriterClosed)
    }

    async fn list_all(&self) -> Result<Vec<SubscriberId>, StoreError> {
        self.0.list_all().await
    }

    async fn contains(&self, id: SubscriberId) -> Result<bool, StoreError> {
        self.0.contains(id).await
    }

    async fn record_message_id(
        &self,
        id: SubscriberId,
        message_id: i64,
    ) -> Result<(), StoreError> {
        self.0.record_message_id(id, message_id).await
    }

    async fn last_message_id(&self, id: SubscriberId) -> Result<Option<i64>, StoreError> {
        self.0.last_message_id(id).await
    }
}

#[tokio::test]
async fn prune_failures_do_not_change_the_report() {
    let store = Arc::new(NoRemoveStore(
        MemoryStore::with_subscribers(ids(&[1, 2, 3, 4, 5])).await,
    ));
    let engine = BroadcastEngine::new(
        store.clone(),
        EngineConfig {
            max_concurrent: 2,
            prune: PrunePolicy::AnyFailure,
        },
    );

    let report = engine
        .broadcast(
            BroadcastMessage::text("hello"),
            sender(),
            &CancellationToken::new(),
        )
        .await
        .expect("broadcast should run");

    assert_eq!(report.sent_count, 3);
    assert_eq!(report.failed_count, 2);
    assert_eq!(store.count().await.expect("count should succeed"), 5);
}

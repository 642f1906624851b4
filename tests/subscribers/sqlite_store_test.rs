//! Tests for `src/subscribers/sqlite.rs` and the single-writer actor.

use std::collections::HashSet;
use std::sync::Arc;

use herald::subscribers::{SqliteStore, SubscriberId, SubscriberStore};

#[tokio::test]
async fn schema_creates_subscribers_table() {
    let store = SqliteStore::in_memory()
        .await
        .expect("store should open");

    let row: (i64,) = sqlx::query_as("SELECT count(*) FROM subscribers")
        .fetch_one(store.pool())
        .await
        .expect("count query should succeed");
    assert_eq!(row.0, 0);

    store.shutdown().await;
}

#[tokio::test]
async fn list_all_keeps_insertion_order_not_id_order() {
    let store = SqliteStore::in_memory()
        .await
        .expect("store should open");

    for id in [50, 10, 40, 20, 30] {
        store
            .add(SubscriberId(id))
            .await
            .expect("add should succeed");
    }
    store
        .add(SubscriberId(10))
        .await
        .expect("re-adding should succeed");

    let listed = store.list_all().await.expect("list should succeed");
    assert_eq!(
        listed,
        [50, 10, 40, 20, 30].map(SubscriberId).to_vec(),
        "re-adding must not move a subscriber"
    );

    store.shutdown().await;
}

#[tokio::test]
async fn repeated_add_yields_one_row() {
    let store = SqliteStore::in_memory()
        .await
        .expect("store should open");

    for _ in 0..3 {
        store
            .add(SubscriberId(1001))
            .await
            .expect("add should succeed");
    }

    // Writes are acknowledged, so no sleep is needed before reading.
    let row: (i64,) = sqlx::query_as("SELECT count(*) FROM subscribers WHERE id = 1001")
        .fetch_one(store.pool())
        .await
        .expect("count query should succeed");
    assert_eq!(row.0, 1);
    assert_eq!(
        store.list_all().await.expect("list should succeed"),
        vec![SubscriberId(1001)]
    );

    store.shutdown().await;
}

#[tokio::test]
async fn remove_deletes_row_and_tolerates_unknown_ids() {
    let store = SqliteStore::in_memory()
        .await
        .expect("store should open");

    store.add(SubscriberId(1)).await.expect("add should succeed");
    store.add(SubscriberId(2)).await.expect("add should succeed");
    store
        .remove(SubscriberId(1))
        .await
        .expect("remove should succeed");
    store
        .remove(SubscriberId(404))
        .await
        .expect("remove of unknown id should succeed");

    assert!(!store.contains(SubscriberId(1)).await.expect("contains"));
    assert!(store.contains(SubscriberId(2)).await.expect("contains"));
    assert_eq!(store.count().await.expect("count should succeed"), 1);

    store.shutdown().await;
}

#[tokio::test]
async fn negative_group_chat_ids_round_trip() {
    let store = SqliteStore::in_memory()
        .await
        .expect("store should open");

    store
        .add(SubscriberId(-1_001_234_567_890))
        .await
        .expect("add should succeed");
    assert!(store
        .contains(SubscriberId(-1_001_234_567_890))
        .await
        .expect("contains"));

    store.shutdown().await;
}

#[tokio::test]
async fn concurrent_adds_are_serialized() {
    let store = Arc::new(
        SqliteStore::in_memory()
            .await
            .expect("store should open"),
    );

    let mut handles = Vec::new();
    for i in 0..40_i64 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move { store.add(SubscriberId(i % 20)).await }));
    }
    for handle in handles {
        handle
            .await
            .expect("task should not panic")
            .expect("add should succeed");
    }

    let ids: HashSet<SubscriberId> = store
        .list_all()
        .await
        .expect("list should succeed")
        .into_iter()
        .collect();
    assert_eq!(ids.len(), 20);
    assert!((0..20).all(|i| ids.contains(&SubscriberId(i))));
}

#[tokio::test]
async fn last_message_id_is_stored_per_subscriber() {
    let store = SqliteStore::in_memory()
        .await
        .expect("store should open");

    store.add(SubscriberId(10)).await.expect("add should succeed");
    assert_eq!(
        store.last_message_id(SubscriberId(10)).await.expect("read"),
        None
    );

    store
        .record_message_id(SubscriberId(10), 555)
        .await
        .expect("record should succeed");
    store
        .record_message_id(SubscriberId(11), 556)
        .await
        .expect("record for unknown id should succeed");

    assert_eq!(
        store.last_message_id(SubscriberId(10)).await.expect("read"),
        Some(555)
    );
    assert!(!store.contains(SubscriberId(11)).await.expect("contains"));

    store.shutdown().await;
}

#[tokio::test]
async fn subscribers_survive_reopen() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let path = tmp.path().join("data").join("herald.db");

    let store = SqliteStore::open(&path).await.expect("store should open");
    store.add(SubscriberId(1)).await.expect("add should succeed");
    store.add(SubscriberId(2)).await.expect("add should succeed");
    store.pool().close().await;
    store.shutdown().await;

    let reopened = SqliteStore::open(&path)
        .await
        .expect("store should reopen");
    let ids: HashSet<SubscriberId> = reopened
        .list_all()
        .await
        .expect("list should succeed")
        .into_iter()
        .collect();
    assert_eq!(ids, HashSet::from([SubscriberId(1), SubscriberId(2)]));

    reopened.shutdown().await;
}

#[tokio::test]
async fn writes_fail_after_pool_is_closed() {
    let store = SqliteStore::in_memory()
        .await
        .expect("store should open");
    store.pool().close().await;

    let result = store.add(SubscriberId(1)).await;
    assert!(result.is_err(), "write on a closed pool must report an error");
}

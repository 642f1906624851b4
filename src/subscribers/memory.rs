//! In-process subscriber store.

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{StoreError, Subscriber, SubscriberId, SubscriberStore};

/// Subscriber store kept entirely in memory.
///
/// Writes take the write half of a [`RwLock`], so concurrent `add` calls are
/// serialized and never lose an id. Contents are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    subscribers: RwLock<Vec<Subscriber>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `ids`, in order. Duplicates collapse.
    pub async fn with_subscribers(ids: impl IntoIterator<Item = SubscriberId>) -> Self {
        let store = Self::new();
        {
            let mut guard = store.subscribers.write().await;
            for id in ids {
                insert_if_absent(&mut guard, id);
            }
        }
        store
    }
}

fn insert_if_absent(subscribers: &mut Vec<Subscriber>, id: SubscriberId) -> bool {
    if subscribers.iter().any(|s| s.id == id) {
        return false;
    }
    subscribers.push(Subscriber {
        id,
        last_message_id: None,
        created_at: Some(Utc::now().to_rfc3339()),
    });
    true
}

#[async_trait]
impl SubscriberStore for MemoryStore {
    async fn add(&self, id: SubscriberId) -> Result<(), StoreError> {
        let mut guard = self.subscribers.write().await;
        insert_if_absent(&mut guard, id);
        Ok(())
    }

    async fn remove(&self, id: SubscriberId) -> Result<(), StoreError> {
        self.subscribers.write().await.retain(|s| s.id != id);
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<SubscriberId>, StoreError> {
        Ok(self.subscribers.read().await.iter().map(|s| s.id).collect())
    }

    async fn contains(&self, id: SubscriberId) -> Result<bool, StoreError> {
        Ok(self.subscribers.read().await.iter().any(|s| s.id == id))
    }

    async fn record_message_id(
        &self,
        id: SubscriberId,
        message_id: i64,
    ) -> Result<(), StoreError> {
        let mut guard = self.subscribers.write().await;
        if let Some(sub) = guard.iter_mut().find(|s| s.id == id) {
            sub.last_message_id = Some(message_id);
        }
        Ok(())
    }

    async fn last_message_id(&self, id: SubscriberId) -> Result<Option<i64>, StoreError> {
        Ok(self
            .subscribers
            .read()
            .await
            .iter()
            .find(|s| s.id == id)
            .and_then(|s| s.last_message_id))
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.subscribers.read().await.len())
    }
}

//! Opt-in and opt-out handling.
//!
//! The transport may retry an opt-in event, so [`Registrar::register`] must be
//! idempotent. It relies on the store's `add` being a no-op for known ids.

use std::sync::Arc;

use tracing::{debug, info};

use crate::subscribers::{StoreError, SubscriberId, SubscriberStore};

/// Enrolls and removes subscribers in response to user actions.
#[derive(Clone)]
pub struct Registrar {
    store: Arc<dyn SubscriberStore>,
}

impl Registrar {
    /// Create a registrar over the given store.
    pub fn new(store: Arc<dyn SubscriberStore>) -> Self {
        Self { store }
    }

    /// Enroll `id`. Registering an already-known id succeeds without change.
    ///
    /// # Errors
    ///
    /// Returns the store error if the write fails.
    pub async fn register(&self, id: SubscriberId) -> Result<(), StoreError> {
        self.store.add(id).await?;
        debug!(%id, "subscriber registered");
        Ok(())
    }

    /// Remove `id` on explicit opt-out. Unknown ids succeed without change.
    ///
    /// # Errors
    ///
    /// Returns the store error if the write fails.
    pub async fn unregister(&self, id: SubscriberId) -> Result<(), StoreError> {
        self.store.remove(id).await?;
        info!(%id, "subscriber unregistered");
        Ok(())
    }

    /// Returns `true` if `id` is currently enrolled.
    pub async fn is_registered(&self, id: SubscriberId) -> Result<bool, StoreError> {
        self.store.contains(id).await
    }
}

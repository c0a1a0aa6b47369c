//! Store seam between the handlers and whatever holds the documents.
//!
//! Handlers never reach for a backend or a process global directly; they
//! are handed a [`LeaderStore`] at startup, so tests can substitute an
//! in-memory double with controllable failure behavior.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::leader::LeaderState;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage unreachable: {0}")]
    Unavailable(String),

    #[error("document encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Durable mapping from a tracking-session key to its leader document.
#[async_trait]
pub trait LeaderStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<LeaderState>, StoreError>;

    async fn set(&self, key: &str, document: &LeaderState) -> Result<(), StoreError>;
}

/// Process-local store for tests and single-instance local runs.
#[derive(Default)]
pub struct MemoryStore {
    documents: RwLock<HashMap<String, LeaderState>>,
}

#[async_trait]
impl LeaderStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<LeaderState>, StoreError> {
        Ok(self.documents.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, document: &LeaderState) -> Result<(), StoreError> {
        self.documents
            .write()
            .await
            .insert(key.to_string(), document.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{LeaderStore, MemoryStore};
    use crate::leader::LeaderState;

    #[tokio::test]
    async fn absent_key_reads_as_none() {
        let store = MemoryStore::default();

        let found = store.get("walk:leader:current").await.expect("get works");
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let store = MemoryStore::default();
        let document = LeaderState::empty(42);

        store
            .set("walk:leader:current", &document)
            .await
            .expect("set works");

        let found = store
            .get("walk:leader:current")
            .await
            .expect("get works")
            .expect("document stored");
        assert_eq!(found, document);
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let store = MemoryStore::default();

        store
            .set("walk:leader:alpha", &LeaderState::empty(1))
            .await
            .expect("set works");

        let found = store.get("walk:leader:beta").await.expect("get works");
        assert!(found.is_none());
    }
}

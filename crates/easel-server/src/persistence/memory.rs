//! In-memory document store for tests and persistence-free deployments.

#![allow(clippy::expect_used, reason = "Poisoned store mutex is unrecoverable")]

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU32, Ordering},
    },
};

use async_trait::async_trait;
use easel_proto::{Document, RoomId};

use super::{DocumentStore, StoreError};

/// In-memory document store.
///
/// Shares its state across clones via `Arc`, so a handle kept by a test
/// observes the saves performed by the server. Tracks attempt counters for
/// asserting debounce and coalescing behavior.
#[derive(Clone, Default)]
pub struct MemoryStore {
    documents: Arc<Mutex<HashMap<RoomId, Document>>>,
    load_count: Arc<AtomicU32>,
    save_count: Arc<AtomicU32>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a document, as if it had been persisted earlier.
    pub fn insert(&self, room_id: RoomId, document: Document) {
        self.documents
            .lock()
            .expect("store mutex poisoned")
            .insert(room_id, document);
    }

    /// The stored document for a room, if any.
    pub fn get(&self, room_id: &RoomId) -> Option<Document> {
        self.documents
            .lock()
            .expect("store mutex poisoned")
            .get(room_id)
            .cloned()
    }

    /// Number of `load` calls observed.
    pub fn load_count(&self) -> u32 {
        self.load_count.load(Ordering::Relaxed)
    }

    /// Number of `save` calls observed.
    pub fn save_count(&self) -> u32 {
        self.save_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn load(&self, room_id: &RoomId) -> Result<Option<Document>, StoreError> {
        self.load_count.fetch_add(1, Ordering::Relaxed);
        Ok(self.get(room_id))
    }

    async fn save(&self, room_id: &RoomId, document: &Document) -> Result<(), StoreError> {
        self.save_count.fetch_add(1, Ordering::Relaxed);
        self.insert(room_id.clone(), document.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn load_reflects_prior_saves() {
        let store = MemoryStore::new();
        let room_id: RoomId = "r1".parse().unwrap();

        assert_eq!(store.load(&room_id).await.unwrap(), None);

        let document = Document::default();
        store.save(&room_id, &document).await.unwrap();
        assert_eq!(store.load(&room_id).await.unwrap(), Some(document));
        assert_eq!(store.load_count(), 2);
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test]
    async fn clones_share_state() {
        let store = MemoryStore::new();
        let other = store.clone();
        let room_id: RoomId = "r1".parse().unwrap();

        store.save(&room_id, &Document::default()).await.unwrap();
        assert!(other.get(&room_id).is_some());
        assert_eq!(other.save_count(), 1);
    }
}

//! Fault-injecting document store wrapper.
//!
//! Wraps another store and fails a scripted number of operations, so tests
//! can exercise the retry ladder and the cold-load failure path
//! deterministically.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use easel_proto::{Document, RoomId};

use super::{DocumentStore, StoreError};

/// Document store wrapper that injects failures on demand.
pub struct ChaoticStore<S> {
    inner: S,
    fail_loads: AtomicBool,
    /// Remaining save attempts to fail.
    fail_saves: AtomicU32,
    load_attempts: AtomicU32,
    save_attempts: AtomicU32,
}

impl<S> ChaoticStore<S> {
    /// Wrap a store with no failures scripted.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            fail_loads: AtomicBool::new(false),
            fail_saves: AtomicU32::new(0),
            load_attempts: AtomicU32::new(0),
            save_attempts: AtomicU32::new(0),
        }
    }

    /// Fail the next `n` save attempts.
    pub fn fail_next_saves(&self, n: u32) {
        self.fail_saves.store(n, Ordering::Relaxed);
    }

    /// Fail every load while set.
    pub fn set_fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::Relaxed);
    }

    /// Total load attempts, including injected failures.
    pub fn load_attempts(&self) -> u32 {
        self.load_attempts.load(Ordering::Relaxed)
    }

    /// Total save attempts, including injected failures.
    pub fn save_attempts(&self) -> u32 {
        self.save_attempts.load(Ordering::Relaxed)
    }

    /// The wrapped store, for checking what actually persisted.
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: DocumentStore> DocumentStore for ChaoticStore<S> {
    async fn load(&self, room_id: &RoomId) -> Result<Option<Document>, StoreError> {
        self.load_attempts.fetch_add(1, Ordering::Relaxed);
        if self.fail_loads.load(Ordering::Relaxed) {
            return Err(StoreError::Request("injected load failure".to_string()));
        }
        self.inner.load(room_id).await
    }

    async fn save(&self, room_id: &RoomId, document: &Document) -> Result<(), StoreError> {
        self.save_attempts.fetch_add(1, Ordering::Relaxed);
        let injected = self
            .fail_saves
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(StoreError::Request("injected save failure".to_string()));
        }
        self.inner.save(room_id, document).await
    }
}

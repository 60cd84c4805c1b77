//! Document store adapter.
//!
//! Trait-based abstraction over the external document store the realtime
//! server cooperates with: cold-load on first join, warm-save on a debounce
//! timer, and a retry policy for transient save failures. The trait is async
//! but transport-agnostic; the production implementation speaks HTTP.

mod chaotic;
mod http;
mod memory;

use std::time::Duration;

use async_trait::async_trait;
pub use chaotic::ChaoticStore;
use easel_core::env::Environment;
use easel_proto::{Document, RoomId};
pub use http::HttpStore;
pub use memory::MemoryStore;

/// Errors from the document store.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// Request-level failure: connection error, timeout, non-success status.
    #[error("store request failed: {0}")]
    Request(String),

    /// The store responded, but the body was not a valid document.
    #[error("store response invalid: {0}")]
    InvalidBody(String),
}

/// External document store.
///
/// `load` is invoked once per room cold start. `save` is fire-and-forget from
/// the room's perspective; retries and backoff live in [`save_with_retry`],
/// and room state is never rolled back on failure.
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    /// Fetch the persisted document. `Ok(None)` means the store has none.
    async fn load(&self, room_id: &RoomId) -> Result<Option<Document>, StoreError>;

    /// Write the document snapshot.
    async fn save(&self, room_id: &RoomId, document: &Document) -> Result<(), StoreError>;
}

/// First backoff delay; doubles per retry (1s → 2s → 4s → 8s).
const SAVE_BACKOFF_BASE: Duration = Duration::from_secs(1);

/// Retries after the initial attempt.
const SAVE_RETRIES: u32 = 4;

/// Save a snapshot with per-attempt timeout and exponential backoff.
///
/// Returns `true` on success. Permanent failure (retry exhaustion) is logged
/// at error level; alerting on it is the operator's responsibility.
pub async fn save_with_retry<E, S>(
    env: &E,
    store: &S,
    room_id: &RoomId,
    document: &Document,
    save_timeout: Duration,
) -> bool
where
    E: Environment,
    S: DocumentStore + ?Sized,
{
    let mut delay = SAVE_BACKOFF_BASE;
    for attempt in 0..=SAVE_RETRIES {
        if attempt > 0 {
            env.sleep(delay).await;
            delay *= 2;
        }
        match tokio::time::timeout(save_timeout, store.save(room_id, document)).await {
            Ok(Ok(())) => {
                tracing::debug!(room_id = %room_id, attempt, "document saved");
                return true;
            }
            Ok(Err(error)) => {
                tracing::warn!(room_id = %room_id, attempt, %error, "save attempt failed");
            }
            Err(_) => {
                tracing::warn!(room_id = %room_id, attempt, "save attempt timed out");
            }
        }
    }
    tracing::error!(
        room_id = %room_id,
        retries = SAVE_RETRIES,
        "save abandoned after retry exhaustion"
    );
    false
}

#[cfg(test)]
mod tests {
    use easel_core::env::test_utils::ManualEnv;

    use super::*;

    #[tokio::test]
    async fn retries_until_success() {
        let env = ManualEnv::new();
        let store = ChaoticStore::new(MemoryStore::new());
        store.fail_next_saves(2);
        let room_id: RoomId = "r1".parse().unwrap();
        let document = Document::default();

        let ok = save_with_retry(&env, &store, &room_id, &document, Duration::from_secs(10)).await;

        assert!(ok);
        assert_eq!(store.save_attempts(), 3);
        assert_eq!(store.inner().get(&room_id), Some(document));
        // Backoff slept 1s then 2s on the virtual clock.
        assert_eq!(env.now(), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn gives_up_after_retry_exhaustion() {
        let env = ManualEnv::new();
        let store = ChaoticStore::new(MemoryStore::new());
        store.fail_next_saves(10);
        let room_id: RoomId = "r1".parse().unwrap();

        let ok = save_with_retry(
            &env,
            &store,
            &room_id,
            &Document::default(),
            Duration::from_secs(10),
        )
        .await;

        assert!(!ok);
        // Initial attempt plus four retries.
        assert_eq!(store.save_attempts(), 5);
        assert_eq!(store.inner().get(&room_id), None);
        // Full backoff ladder: 1 + 2 + 4 + 8 seconds.
        assert_eq!(env.now(), Duration::from_secs(15));
    }
}

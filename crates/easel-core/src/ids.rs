//! Element id allocation.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use easel_proto::ElementId;

/// Process-wide element id allocator.
///
/// Rooms assign ids under their own serialization lock, but the counter is
/// shared so ids are unique across every room in the process. Rooms seeded
/// from a cold-loaded document reserve past its largest id before accepting
/// edits.
#[derive(Debug, Clone)]
pub struct ElementIdAllocator {
    next: Arc<AtomicU64>,
}

impl ElementIdAllocator {
    /// Create an allocator whose first id is 1.
    pub fn new() -> Self {
        Self {
            next: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Allocate the next id.
    pub fn next_id(&self) -> ElementId {
        ElementId(self.next.fetch_add(1, Ordering::Relaxed))
    }

    /// Ensure all future ids are strictly greater than `id`.
    pub fn reserve_past(&self, id: ElementId) {
        self.next.fetch_max(id.0 + 1, Ordering::Relaxed);
    }
}

impl Default for ElementIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

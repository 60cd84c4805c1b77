//! Bounded shared history for multi-user undo/redo.
//!
//! Each frame is a full immutable snapshot of the document. Mutations first
//! truncate the redo tail, then append the new frame; undo and redo only move
//! the cursor. When the stack would exceed its cap the oldest frame is
//! dropped, so memory stays bounded at the cost of the deepest undo.
//!
//! # Invariants
//!
//! - `1 <= frame_count() <= cap` at all times.
//! - `cursor < frame_count()`; the frame at the cursor is the current
//!   document.
//! - Frames are never mutated in place.

use easel_proto::Document;

/// Default maximum number of retained frames per room.
pub const DEFAULT_HISTORY_CAP: usize = 100;

/// Bounded stack of document snapshots with a cursor.
#[derive(Debug, Clone)]
pub struct History {
    frames: Vec<Document>,
    cursor: usize,
    cap: usize,
}

impl History {
    /// Create a history seeded with a baseline frame.
    ///
    /// Caps below 1 are clamped to 1: a history always holds a frame.
    pub fn new(baseline: Document, cap: usize) -> Self {
        Self {
            frames: vec![baseline],
            cursor: 0,
            cap: cap.max(1),
        }
    }

    /// The currently visible frame.
    pub fn current(&self) -> &Document {
        &self.frames[self.cursor]
    }

    /// Append a frame after the cursor, discarding the redo tail.
    ///
    /// If the stack would exceed the cap, the oldest frame is dropped and the
    /// cursor shifts down with it.
    pub fn push(&mut self, frame: Document) {
        self.frames.truncate(self.cursor + 1);
        self.frames.push(frame);
        self.cursor = self.frames.len() - 1;
        if self.frames.len() > self.cap {
            self.frames.remove(0);
            self.cursor -= 1;
        }
        debug_assert!(self.cursor < self.frames.len());
        debug_assert!(self.frames.len() <= self.cap);
    }

    /// Move the cursor back one frame. Returns `false` at the boundary.
    pub fn undo(&mut self) -> bool {
        if self.cursor > 0 {
            self.cursor -= 1;
            true
        } else {
            false
        }
    }

    /// Move the cursor forward one frame. Returns `false` at the boundary.
    pub fn redo(&mut self) -> bool {
        if self.cursor + 1 < self.frames.len() {
            self.cursor += 1;
            true
        } else {
            false
        }
    }

    /// Whether the cursor can move back.
    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    /// Whether the cursor can move forward.
    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.frames.len()
    }

    /// Number of retained frames.
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// The configured frame cap.
    pub fn cap(&self) -> usize {
        self.cap
    }
}

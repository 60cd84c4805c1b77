//! Pure operations over whiteboard documents.
//!
//! All operations return new documents; inputs are never mutated. Render
//! order is the total order `(created_at, id)`, deterministic across replays
//! regardless of which collection an element lives in.

use easel_proto::{Document, Element, ElementId, Shape, Stroke, Text};

/// Errors from document operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DocumentError {
    /// The element's id is already present in the document.
    #[error("duplicate element id: {0}")]
    DuplicateId(ElementId),
}

/// Append an element, returning the extended document.
pub fn add_element(doc: &Document, element: Element) -> Result<Document, DocumentError> {
    if doc.contains(element.id()) {
        return Err(DocumentError::DuplicateId(element.id()));
    }
    let mut next = doc.clone();
    next.push(element);
    Ok(next)
}

/// Remove an element by id; unknown ids return the input unchanged.
///
/// The boolean reports whether anything was removed, so callers can decide
/// whether the edit advances history.
pub fn remove_element(doc: &Document, id: ElementId) -> (Document, bool) {
    if !doc.contains(id) {
        return (doc.clone(), false);
    }
    let mut next = doc.clone();
    next.strokes.retain(|s| s.id != id);
    next.shapes.retain(|s| s.id != id);
    next.texts.retain(|t| t.id != id);
    (next, true)
}

/// A borrowed view of any element, used for ordering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ElementView<'a> {
    /// Freehand ink path.
    Stroke(&'a Stroke),
    /// Geometric shape.
    Shape(&'a Shape),
    /// Text label.
    Text(&'a Text),
}

impl ElementView<'_> {
    /// The element's id.
    pub fn id(&self) -> ElementId {
        match self {
            Self::Stroke(s) => s.id,
            Self::Shape(s) => s.id,
            Self::Text(t) => t.id,
        }
    }

    /// The element's creation tick.
    pub fn created_at(&self) -> u64 {
        match self {
            Self::Stroke(s) => s.created_at,
            Self::Shape(s) => s.created_at,
            Self::Text(t) => t.created_at,
        }
    }
}

/// Merged rendering order: ascending `created_at`, ties broken by `id`.
pub fn render_order(doc: &Document) -> Vec<ElementView<'_>> {
    let mut all: Vec<ElementView<'_>> = doc
        .strokes
        .iter()
        .map(ElementView::Stroke)
        .chain(doc.shapes.iter().map(ElementView::Shape))
        .chain(doc.texts.iter().map(ElementView::Text))
        .collect();
    all.sort_by_key(|e| (e.created_at(), e.id()));
    all
}

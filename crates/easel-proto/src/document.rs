//! Whiteboard document: the unit of broadcast and persistence.

use serde::{Deserialize, Serialize};

use crate::{
    element::{Element, Shape, Stroke, Text},
    ids::ElementId,
};

/// Complete contents of one whiteboard.
///
/// Wire shape: `{ "strokes": [...], "shapes": [...], "texts": [...] }`. The
/// merged rendering order is ascending `(created_at, id)` regardless of which
/// collection an element lives in; see the domain crate's `render_order`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Freehand ink paths.
    pub strokes: Vec<Stroke>,
    /// Geometric shapes.
    pub shapes: Vec<Shape>,
    /// Text labels.
    pub texts: Vec<Text>,
}

impl Document {
    /// Whether the document holds no elements.
    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty() && self.shapes.is_empty() && self.texts.is_empty()
    }

    /// Total number of elements across all collections.
    pub fn element_count(&self) -> usize {
        self.strokes.len() + self.shapes.len() + self.texts.len()
    }

    /// Whether any element carries the given id.
    pub fn contains(&self, id: ElementId) -> bool {
        self.strokes.iter().any(|s| s.id == id)
            || self.shapes.iter().any(|s| s.id == id)
            || self.texts.iter().any(|t| t.id == id)
    }

    /// The largest element id in the document, if any.
    pub fn max_element_id(&self) -> Option<ElementId> {
        self.element_ids().max()
    }

    /// The largest creation tick in the document, if any.
    pub fn max_created_at(&self) -> Option<u64> {
        let strokes = self.strokes.iter().map(|s| s.created_at);
        let shapes = self.shapes.iter().map(|s| s.created_at);
        let texts = self.texts.iter().map(|t| t.created_at);
        strokes.chain(shapes).chain(texts).max()
    }

    /// Ids of every element in the document.
    pub fn element_ids(&self) -> impl Iterator<Item = ElementId> + '_ {
        let strokes = self.strokes.iter().map(|s| s.id);
        let shapes = self.shapes.iter().map(|s| s.id);
        let texts = self.texts.iter().map(|t| t.id);
        strokes.chain(shapes).chain(texts)
    }

    /// Append an element to the collection matching its variant.
    ///
    /// This is a plumbing helper; id uniqueness is the caller's concern (the
    /// domain crate's `add_element` checks it).
    pub fn push(&mut self, element: Element) {
        match element {
            Element::Stroke(s) => self.strokes.push(s),
            Element::Shape(s) => self.shapes.push(s),
            Element::Text(t) => self.texts.push(t),
        }
    }
}

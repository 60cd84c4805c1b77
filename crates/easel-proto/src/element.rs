//! Whiteboard elements and client-submitted element payloads.
//!
//! An [`Element`] is a complete server-side record: identity fields (`id`,
//! `author`, `created_at`) plus the type-specific body. Clients never send
//! identity fields; they submit an [`ElementPayload`] and the room assigns the
//! rest under its serialization lock.

use serde::{Deserialize, Serialize};

use crate::ids::{ElementId, SessionId};

/// A 2D point, serialized as `[x, y]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point(pub f64, pub f64);

/// Whether a stroke lays down ink or erases it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrokeMode {
    /// The stroke draws with its color.
    Ink,
    /// The stroke erases whatever it covers.
    Erase,
}

/// Geometric primitive spanned between two anchor points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    /// Axis-aligned rectangle.
    Rectangle,
    /// Ellipse inscribed in the anchor rectangle.
    Ellipse,
    /// Arrow from the first anchor to the second.
    Arrow,
    /// Straight line segment.
    Segment,
}

/// Freehand ink path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    /// Server-assigned id, immutable once assigned.
    pub id: ElementId,
    /// Session that submitted the create.
    pub author: SessionId,
    /// Server-monotonic creation tick.
    pub created_at: u64,
    /// Ordered path points.
    pub points: Vec<Point>,
    /// Stroke color (CSS color string).
    pub color: String,
    /// Stroke width in canvas units.
    pub stroke_width: f64,
    /// Ink or erase.
    pub mode: StrokeMode,
}

/// Geometric shape between two anchors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    /// Server-assigned id, immutable once assigned.
    pub id: ElementId,
    /// Session that submitted the create.
    pub author: SessionId,
    /// Server-monotonic creation tick.
    pub created_at: u64,
    /// Which primitive this shape is.
    pub kind: ShapeKind,
    /// First anchor point.
    pub start: Point,
    /// Second anchor point.
    pub end: Point,
    /// Outline color (CSS color string).
    pub color: String,
    /// Outline width in canvas units.
    pub stroke_width: f64,
    /// Optional fill color.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<String>,
}

/// A text label anchored at a point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Text {
    /// Server-assigned id, immutable once assigned.
    pub id: ElementId,
    /// Session that submitted the create.
    pub author: SessionId,
    /// Server-monotonic creation tick.
    pub created_at: u64,
    /// Anchor point of the text box.
    pub anchor: Point,
    /// The text content.
    pub content: String,
    /// Font size in canvas units.
    pub font_size: f64,
    /// Font family name.
    pub font_family: String,
    /// Text color (CSS color string).
    pub color: String,
}

/// Any element held in a document.
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    /// Freehand ink path.
    Stroke(Stroke),
    /// Geometric shape.
    Shape(Shape),
    /// Text label.
    Text(Text),
}

impl Element {
    /// The element's server-assigned id.
    pub fn id(&self) -> ElementId {
        match self {
            Self::Stroke(s) => s.id,
            Self::Shape(s) => s.id,
            Self::Text(t) => t.id,
        }
    }

    /// The session that created the element.
    pub fn author(&self) -> SessionId {
        match self {
            Self::Stroke(s) => s.author,
            Self::Shape(s) => s.author,
            Self::Text(t) => t.author,
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

/// Client-submitted element body.
///
/// Matches the `create-element` wire shape: a `type` tag (`line`, `shape`, or
/// `text`) and a `payload` body without identity fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "lowercase")]
pub enum ElementPayload {
    /// A freehand stroke ("line" on the wire).
    Line(StrokePayload),
    /// A geometric shape.
    Shape(ShapePayload),
    /// A text label.
    Text(TextPayload),
}

/// Body of a stroke create request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrokePayload {
    /// Ordered path points.
    pub points: Vec<Point>,
    /// Stroke color (CSS color string).
    pub color: String,
    /// Stroke width in canvas units.
    pub stroke_width: f64,
    /// Ink or erase.
    pub mode: StrokeMode,
}

/// Body of a shape create request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapePayload {
    /// Which primitive this shape is.
    pub kind: ShapeKind,
    /// First anchor point.
    pub start: Point,
    /// Second anchor point.
    pub end: Point,
    /// Outline color (CSS color string).
    pub color: String,
    /// Outline width in canvas units.
    pub stroke_width: f64,
    /// Optional fill color.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<String>,
}

/// Body of a text create request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextPayload {
    /// Anchor point of the text box.
    pub anchor: Point,
    /// The text content.
    pub content: String,
    /// Font size in canvas units.
    pub font_size: f64,
    /// Font family name.
    pub font_family: String,
    /// Text color (CSS color string).
    pub color: String,
}

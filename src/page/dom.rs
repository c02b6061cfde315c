//! Page document seam
//!
//! The content-side components drive the page through this trait. A
//! browser binding implements it over the real DOM; tests use an in-memory
//! tree.

/// Opaque handle to an element in one document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId(pub u32);

/// Viewport-relative bounding box in CSS pixels
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// What the page should do with the event after a handler saw it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Disposition {
    pub prevent_default: bool,
    pub stop_propagation: bool,
}

impl Disposition {
    pub const PASS: Self = Self {
        prevent_default: false,
        stop_propagation: false,
    };

    pub const SUPPRESS: Self = Self {
        prevent_default: true,
        stop_propagation: true,
    };
}

/// Pointer position in viewport coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

pub trait PageDocument {
    /// `<html>`, absent while the document is still empty
    fn root(&self) -> Option<ElementId>;

    fn body(&self) -> Option<ElementId>;

    fn element_by_id(&self, id: &str) -> Option<ElementId>;

    /// First element matching `selector`, `None` when nothing matches or
    /// the selector is invalid
    fn query_selector(&self, selector: &str) -> Option<ElementId>;

    fn create_element(&mut self, tag: &str) -> ElementId;

    fn append_child(&mut self, parent: ElementId, child: ElementId);

    /// Detach from the tree; a detached element is not an error
    fn remove(&mut self, element: ElementId);

    fn is_attached(&self, element: ElementId) -> bool;

    fn parent(&self, element: ElementId) -> Option<ElementId>;

    /// Lowercase tag name
    fn tag_name(&self, element: ElementId) -> String;

    /// `id` attribute, empty when absent
    fn id_attr(&self, element: ElementId) -> String;

    fn set_id_attr(&mut self, element: ElementId, id: &str);

    /// Raw `class` attribute split on whitespace
    fn class_names(&self, element: ElementId) -> Vec<String>;

    fn text(&self, element: ElementId) -> String;

    fn set_text(&mut self, element: ElementId, text: &str);

    fn bounding_rect(&self, element: ElementId) -> Rect;

    fn computed_style(&self, element: ElementId, property: &str) -> String;

    /// Inline style; an empty value removes the declaration
    fn set_style(&mut self, element: ElementId, property: &str, value: &str);

    fn inline_style(&self, element: ElementId, property: &str) -> String;
}

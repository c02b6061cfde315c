//! Content-side components
//!
//! Everything that runs inside a page document, written against the
//! [`dom::PageDocument`] seam.

pub mod applicator;
pub mod content;
pub mod dom;
pub mod drag;
pub mod picker;

pub use applicator::StyleApplicator;
pub use content::ContentScript;
pub use dom::{Disposition, ElementId, PageDocument, Point, Rect};
pub use drag::{DragRepositioner, DragState};
pub use picker::{ElementPicker, PickerState};

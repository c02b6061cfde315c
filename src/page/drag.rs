//! Drag repositioner
//!
//! Arms one element, found by selector, for free repositioning. The element
//! follows the pointer while the button is held; on release its final
//! viewport position is reported so it can be persisted as a visual edit.

use tracing::{debug, warn};

use crate::constants::page::{ACCENT_COLOR, DRAG_Z_INDEX};
use crate::ipc::messages::ExtensionMessage;
use crate::page::dom::{Disposition, ElementId, PageDocument, Point};

#[derive(Debug, Clone, PartialEq)]
pub enum DragState {
    Inactive,
    Armed {
        selector: String,
        element: ElementId,
    },
    Dragging {
        selector: String,
        element: ElementId,
        /// Pointer position at press
        pointer_start: Point,
        /// Element's bounding box origin at press
        element_start: Point,
    },
}

/// Inline declarations that mark an armed element, cleared on deactivate
const MARKING: [&str; 4] = ["cursor", "user-select", "outline", "outline-offset"];

#[derive(Debug)]
pub struct DragRepositioner {
    state: DragState,
}

impl Default for DragRepositioner {
    fn default() -> Self {
        Self::new()
    }
}

impl DragRepositioner {
    pub fn new() -> Self {
        Self {
            state: DragState::Inactive,
        }
    }

    pub fn state(&self) -> &DragState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        !matches!(self.state, DragState::Inactive)
    }

    /// Arm the first element matching `selector`
    ///
    /// Re-arming first releases the previous element. A selector matching
    /// nothing leaves the repositioner inactive.
    pub fn activate(&mut self, doc: &mut dyn PageDocument, selector: &str) -> bool {
        self.deactivate(doc);

        let Some(element) = doc.query_selector(selector) else {
            warn!(selector, "No element matches drag selector");
            return false;
        };

        let position = doc.computed_style(element, "position");
        if position != "fixed" && position != "absolute" {
            doc.set_style(element, "position", "fixed");
        }
        doc.set_style(element, "cursor", "move");
        doc.set_style(element, "user-select", "none");
        doc.set_style(element, "z-index", DRAG_Z_INDEX);
        doc.set_style(element, "outline", &format!("2px dashed {ACCENT_COLOR}"));
        doc.set_style(element, "outline-offset", "2px");

        debug!(selector, "Drag armed");
        self.state = DragState::Armed {
            selector: selector.to_string(),
            element,
        };
        true
    }

    /// Release the element and strip the marking; position edits stay
    pub fn deactivate(&mut self, doc: &mut dyn PageDocument) {
        let element = match &self.state {
            DragState::Inactive => return,
            DragState::Armed { element, .. } | DragState::Dragging { element, .. } => *element,
        };
        for prop in MARKING {
            doc.set_style(element, prop, "");
        }
        self.state = DragState::Inactive;
        debug!("Drag deactivated");
    }

    /// Press on the armed element or one of its descendants starts a drag
    pub fn pointer_down(&mut self, doc: &dyn PageDocument, target: ElementId, at: Point) -> Disposition {
        let DragState::Armed { selector, element } = &self.state else {
            return Disposition::PASS;
        };
        if !is_within(doc, target, *element) {
            return Disposition::PASS;
        }

        let rect = doc.bounding_rect(*element);
        self.state = DragState::Dragging {
            selector: selector.clone(),
            element: *element,
            pointer_start: at,
            element_start: Point::new(rect.left, rect.top),
        };
        Disposition::SUPPRESS
    }

    /// Move the element by the pointer's offset from the press
    pub fn pointer_move(&mut self, doc: &mut dyn PageDocument, at: Point) {
        let DragState::Dragging {
            element,
            pointer_start,
            element_start,
            ..
        } = &self.state
        else {
            return;
        };
        let left = element_start.x + (at.x - pointer_start.x);
        let top = element_start.y + (at.y - pointer_start.y);
        doc.set_style(*element, "left", &format!("{left}px"));
        doc.set_style(*element, "top", &format!("{top}px"));
    }

    /// End the drag and report the rounded final position
    pub fn pointer_up(&mut self, doc: &dyn PageDocument) -> Option<ExtensionMessage> {
        let DragState::Dragging {
            selector, element, ..
        } = &self.state
        else {
            return None;
        };
        let rect = doc.bounding_rect(*element);
        let message = ExtensionMessage::ElementDragged {
            selector: selector.clone(),
            top: rect.top.round() as i32,
            left: rect.left.round() as i32,
        };
        self.state = DragState::Armed {
            selector: selector.clone(),
            element: *element,
        };
        Some(message)
    }
}

/// Whether `target` is `element` or inside it, not looking past `<body>`
fn is_within(doc: &dyn PageDocument, target: ElementId, element: ElementId) -> bool {
    let body = doc.body();
    let mut current = Some(target);
    while let Some(el) = current {
        if Some(el) == body {
            return false;
        }
        if el == element {
            return true;
        }
        current = doc.parent(el);
    }
    false
}

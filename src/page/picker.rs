//! Element picker
//!
//! While picking, a highlight overlay follows the element under the pointer
//! and a click resolves that element to a CSS selector instead of reaching
//! the page.

use std::fmt::Write as _;

use tracing::debug;

use crate::constants::page::{ACCENT_COLOR, CANCEL_KEY, OVERLAY_Z_INDEX};
use crate::ipc::messages::ExtensionMessage;
use crate::page::dom::{Disposition, ElementId, PageDocument};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickerState {
    Idle,
    Picking {
        overlay: ElementId,
        label: ElementId,
        hovered: Option<ElementId>,
    },
}

#[derive(Debug)]
pub struct ElementPicker {
    state: PickerState,
}

impl Default for ElementPicker {
    fn default() -> Self {
        Self::new()
    }
}

impl ElementPicker {
    pub fn new() -> Self {
        Self {
            state: PickerState::Idle,
        }
    }

    pub fn state(&self) -> &PickerState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, PickerState::Picking { .. })
    }

    /// Enter picking mode; starting twice is a no-op
    /// Enter picking mode; false when the document has no body yet
    pub fn start(&mut self, doc: &mut dyn PageDocument) -> bool {
        if self.is_active() {
            return true;
        }
        let Some(body) = doc.body() else {
            return false;
        };

        let border = format!("2px solid {ACCENT_COLOR}");
        let overlay = doc.create_element("div");
        for (prop, value) in [
            ("position", "fixed"),
            ("pointer-events", "none"),
            ("z-index", OVERLAY_Z_INDEX),
            ("background", "rgba(79, 70, 229, 0.3)"),
            ("border", border.as_str()),
            ("border-radius", "4px"),
            ("display", "none"),
        ] {
            doc.set_style(overlay, prop, value);
        }

        let label = doc.create_element("div");
        for (prop, value) in [
            ("position", "absolute"),
            ("background", ACCENT_COLOR),
            ("color", "white"),
            ("padding", "2px 6px"),
            ("font-size", "10px"),
            ("top", "-20px"),
            ("left", "0"),
            ("white-space", "nowrap"),
        ] {
            doc.set_style(label, prop, value);
        }
        doc.append_child(overlay, label);
        doc.append_child(body, overlay);
        doc.set_style(body, "cursor", "crosshair");

        self.state = PickerState::Picking {
            overlay,
            label,
            hovered: None,
        };
        debug!("Picker started");
        true
    }

    /// Leave picking mode and remove the overlay
    pub fn stop(&mut self, doc: &mut dyn PageDocument) {
        if let PickerState::Picking { overlay, .. } = self.state {
            doc.remove(overlay);
            if let Some(body) = doc.body() {
                doc.set_style(body, "cursor", "");
            }
            debug!("Picker stopped");
        }
        self.state = PickerState::Idle;
    }

    /// Track the element under the pointer
    pub fn pointer_move(&mut self, doc: &mut dyn PageDocument, target: ElementId) {
        let PickerState::Picking {
            overlay,
            label,
            hovered,
        } = &mut self.state
        else {
            return;
        };
        if *hovered == Some(target) || target == *overlay || target == *label {
            return;
        }
        *hovered = Some(target);

        let rect = doc.bounding_rect(target);
        doc.set_style(*overlay, "display", "block");
        doc.set_style(*overlay, "top", &format!("{}px", rect.top));
        doc.set_style(*overlay, "left", &format!("{}px", rect.left));
        doc.set_style(*overlay, "width", &format!("{}px", rect.width));
        doc.set_style(*overlay, "height", &format!("{}px", rect.height));
        let text = describe(doc, target);
        doc.set_text(*label, &text);
    }

    /// Resolve a click; the click never reaches the page while picking
    pub fn click(&mut self, doc: &mut dyn PageDocument) -> (Disposition, Option<ExtensionMessage>) {
        let PickerState::Picking { hovered, .. } = self.state else {
            return (Disposition::PASS, None);
        };
        let picked = hovered.map(|el| ExtensionMessage::ElementPicked {
            selector: selector_for(doc, el),
        });
        self.stop(doc);
        (Disposition::SUPPRESS, picked)
    }

    /// `Escape` cancels and is reported upward as `STOP_PICKER`
    pub fn key_down(&mut self, doc: &mut dyn PageDocument, key: &str) -> Option<ExtensionMessage> {
        if !self.is_active() || key != CANCEL_KEY {
            return None;
        }
        self.stop(doc);
        Some(ExtensionMessage::StopPicker)
    }
}

fn non_empty_classes(doc: &dyn PageDocument, el: ElementId) -> Vec<String> {
    doc.class_names(el)
        .into_iter()
        .filter(|c| !c.is_empty())
        .collect()
}

/// `#id` when the element has one, else `tag.class1.class2`
///
/// A heuristic: the result need not be unique in the document.
pub fn selector_for(doc: &dyn PageDocument, el: ElementId) -> String {
    let id = doc.id_attr(el);
    if !id.is_empty() {
        return format!("#{id}");
    }
    let mut selector = doc.tag_name(el);
    for class in non_empty_classes(doc, el) {
        let _ = write!(selector, ".{class}");
    }
    selector
}

/// Overlay label: `tag#id.class1.class2`
pub fn describe(doc: &dyn PageDocument, el: ElementId) -> String {
    let mut label = doc.tag_name(el);
    let id = doc.id_attr(el);
    if !id.is_empty() {
        let _ = write!(label, "#{id}");
    }
    for class in non_empty_classes(doc, el) {
        let _ = write!(label, ".{class}");
    }
    label
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::dom::Rect;
    use crate::page::dom::testing::FakeDocument;

    #[test]
    fn test_selector_prefers_id() {
        let mut doc = FakeDocument::new();
        let el = doc.add(None, "div", "main", "a b");
        assert_eq!(selector_for(&doc, el), "#main");
        assert_eq!(describe(&doc, el), "div#main.a.b");
    }

    #[test]
    fn test_selector_drops_empty_classes() {
        let mut doc = FakeDocument::new();
        let el = doc.add(None, "P", "", "  lead  big ");
        assert_eq!(selector_for(&doc, el), "p.lead.big");

        let bare = doc.add(None, "span", "", "");
        assert_eq!(selector_for(&doc, bare), "span");
    }

    #[test]
    fn test_start_without_body_fails() {
        let mut doc = FakeDocument::empty();
        let mut picker = ElementPicker::new();
        assert!(!picker.start(&mut doc));
        assert!(!picker.is_active());
    }

    #[test]
    fn test_start_twice_is_noop() {
        let mut doc = FakeDocument::new();
        let mut picker = ElementPicker::new();
        assert!(picker.start(&mut doc));
        let state = picker.state().clone();
        assert!(picker.start(&mut doc));
        assert_eq!(picker.state(), &state);

        let body = doc.body().unwrap();
        assert_eq!(doc.children(body).len(), 1);
        assert_eq!(doc.inline_style(body, "cursor"), "crosshair");
    }

    #[test]
    fn test_hover_positions_overlay() {
        let mut doc = FakeDocument::new();
        let target = doc.add(None, "section", "", "card");
        doc.set_rect(
            target,
            Rect {
                left: 10.0,
                top: 20.0,
                width: 300.0,
                height: 40.0,
            },
        );

        let mut picker = ElementPicker::new();
        picker.start(&mut doc);
        picker.pointer_move(&mut doc, target);

        let PickerState::Picking {
            overlay,
            label,
            hovered,
        } = *picker.state()
        else {
            panic!("picker not active");
        };
        assert_eq!(hovered, Some(target));
        assert_eq!(doc.inline_style(overlay, "display"), "block");
        assert_eq!(doc.inline_style(overlay, "top"), "20px");
        assert_eq!(doc.inline_style(overlay, "width"), "300px");
        assert_eq!(doc.text(label), "section.card");

        // Hovering the overlay itself is ignored
        picker.pointer_move(&mut doc, overlay);
        assert!(matches!(picker.state(), PickerState::Picking { hovered: Some(t), .. } if *t == target));
    }

    #[test]
    fn test_click_reports_selector_and_stops() {
        let mut doc = FakeDocument::new();
        let target = doc.add(None, "button", "", "primary");
        let mut picker = ElementPicker::new();
        picker.start(&mut doc);
        picker.pointer_move(&mut doc, target);

        let (disposition, message) = picker.click(&mut doc);
        assert_eq!(disposition, Disposition::SUPPRESS);
        assert_eq!(
            message,
            Some(ExtensionMessage::ElementPicked {
                selector: "button.primary".to_string()
            })
        );
        assert_eq!(picker.state(), &PickerState::Idle);
        assert_eq!(doc.children(doc.body().unwrap()), vec![target]);
    }

    #[test]
    fn test_click_without_hover_still_suppressed() {
        let mut doc = FakeDocument::new();
        let mut picker = ElementPicker::new();
        picker.start(&mut doc);
        assert_eq!(picker.click(&mut doc), (Disposition::SUPPRESS, None));
        assert!(!picker.is_active());

        // Idle picker leaves clicks alone
        assert_eq!(picker.click(&mut doc), (Disposition::PASS, None));
    }

    #[test]
    fn test_escape_cancels() {
        let mut doc = FakeDocument::new();
        let mut picker = ElementPicker::new();
        picker.start(&mut doc);

        assert_eq!(picker.key_down(&mut doc, "Enter"), None);
        assert!(picker.is_active());
        assert_eq!(picker.key_down(&mut doc, "Escape"), Some(ExtensionMessage::StopPicker));
        assert!(!picker.is_active());
        assert_eq!(doc.inline_style(doc.body().unwrap(), "cursor"), "");
        assert_eq!(picker.key_down(&mut doc, "Escape"), None);
    }
}

//! Content script router
//!
//! One instance per document. Answers runtime messages, feeds page input
//! events to whichever interactive mode is running, and collects the
//! reports those modes send back to the extension. At most one of picker
//! and drag is active at a time.

use tracing::debug;

use crate::ipc::messages::{ExtensionMessage, MessageResponse, Status};
use crate::page::applicator::StyleApplicator;
use crate::page::dom::{Disposition, ElementId, PageDocument, Point};
use crate::page::drag::DragRepositioner;
use crate::page::picker::ElementPicker;

pub struct ContentScript<D: PageDocument> {
    doc: D,
    applicator: StyleApplicator,
    picker: ElementPicker,
    drag: DragRepositioner,
    outbox: Vec<ExtensionMessage>,
}

impl<D: PageDocument> ContentScript<D> {
    pub fn new(mut doc: D) -> Self {
        let applicator = StyleApplicator::attach(&mut doc);
        Self {
            doc,
            applicator,
            picker: ElementPicker::new(),
            drag: DragRepositioner::new(),
            outbox: Vec::new(),
        }
    }

    pub fn document(&self) -> &D {
        &self.doc
    }

    pub fn picker(&self) -> &ElementPicker {
        &self.picker
    }

    pub fn drag(&self) -> &DragRepositioner {
        &self.drag
    }

    /// Reports waiting to be sent to the extension, oldest first
    pub fn take_outbound(&mut self) -> Vec<ExtensionMessage> {
        std::mem::take(&mut self.outbox)
    }

    /// Answer a runtime message; `None` means no reply
    pub fn handle_message(&mut self, message: ExtensionMessage) -> Option<MessageResponse> {
        match message {
            ExtensionMessage::ApplyCss { css } => {
                self.applicator.apply_css(&mut self.doc, &css);
                Some(Status::Applied.into())
            }
            ExtensionMessage::Ping => Some(MessageResponse::pong()),
            ExtensionMessage::StartPicker => {
                self.drag.deactivate(&mut self.doc);
                if !self.picker.start(&mut self.doc) {
                    debug!("Document has no body, picker not started");
                }
                Some(Status::Started.into())
            }
            ExtensionMessage::StopPicker => {
                self.picker.stop(&mut self.doc);
                Some(Status::Stopped.into())
            }
            ExtensionMessage::StartDrag { selector } => {
                self.picker.stop(&mut self.doc);
                self.drag.activate(&mut self.doc, &selector);
                Some(Status::DragStarted.into())
            }
            ExtensionMessage::StopDrag => {
                self.drag.deactivate(&mut self.doc);
                Some(Status::DragStopped.into())
            }
            other => {
                debug!(message = ?other, "Message not handled by content script");
                None
            }
        }
    }

    pub fn pointer_move(&mut self, target: ElementId, at: Point) {
        if self.picker.is_active() {
            self.picker.pointer_move(&mut self.doc, target);
        } else {
            self.drag.pointer_move(&mut self.doc, at);
        }
    }

    pub fn pointer_down(&mut self, target: ElementId, at: Point) -> Disposition {
        self.drag.pointer_down(&self.doc, target, at)
    }

    pub fn pointer_up(&mut self) {
        if let Some(report) = self.drag.pointer_up(&self.doc) {
            self.outbox.push(report);
        }
    }

    pub fn click(&mut self) -> Disposition {
        let (disposition, report) = self.picker.click(&mut self.doc);
        self.outbox.extend(report);
        disposition
    }

    pub fn key_down(&mut self, key: &str) {
        if let Some(report) = self.picker.key_down(&mut self.doc, key) {
            self.outbox.push(report);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::page::STYLE_ELEMENT_ID;
    use crate::page::dom::Rect;
    use crate::page::dom::testing::FakeDocument;

    fn page() -> (ContentScript<FakeDocument>, ElementId) {
        let mut doc = FakeDocument::new();
        let el = doc.add(None, "aside", "promo", "");
        doc.set_rect(
            el,
            Rect {
                left: 0.0,
                top: 0.0,
                width: 10.0,
                height: 10.0,
            },
        );
        (ContentScript::new(doc), el)
    }

    #[test]
    fn test_message_table() {
        let (mut content, _) = page();
        let cases = [
            (
                ExtensionMessage::ApplyCss {
                    css: "a{}".to_string(),
                },
                Some(Status::Applied.into()),
            ),
            (ExtensionMessage::Ping, Some(MessageResponse::pong())),
            (ExtensionMessage::StartPicker, Some(Status::Started.into())),
            (ExtensionMessage::StopPicker, Some(Status::Stopped.into())),
            (
                ExtensionMessage::StartDrag {
                    selector: "#promo".to_string(),
                },
                Some(Status::DragStarted.into()),
            ),
            (ExtensionMessage::StopDrag, Some(Status::DragStopped.into())),
            (ExtensionMessage::RefreshInjection, None),
        ];
        for (message, expected) in cases {
            assert_eq!(content.handle_message(message.clone()), expected, "{message:?}");
        }
    }

    #[test]
    fn test_start_picker_on_bodiless_document() {
        let mut content = ContentScript::new(FakeDocument::empty());
        assert_eq!(
            content.handle_message(ExtensionMessage::StartPicker),
            Some(Status::Started.into())
        );
        assert!(!content.picker().is_active());
    }

    #[test]
    fn test_apply_css_reaches_style_element() {
        let (mut content, _) = page();
        content.handle_message(ExtensionMessage::ApplyCss {
            css: "body{margin:0}".to_string(),
        });
        let doc = content.document();
        let style = doc.element_by_id(STYLE_ELEMENT_ID).unwrap();
        assert_eq!(doc.text(style), "body{margin:0}");
    }

    #[test]
    fn test_modes_are_exclusive() {
        let (mut content, _) = page();
        content.handle_message(ExtensionMessage::StartDrag {
            selector: "#promo".to_string(),
        });
        assert!(content.drag().is_active());

        content.handle_message(ExtensionMessage::StartPicker);
        assert!(content.picker().is_active());
        assert!(!content.drag().is_active());

        content.handle_message(ExtensionMessage::StartDrag {
            selector: "#promo".to_string(),
        });
        assert!(!content.picker().is_active());
        assert!(content.drag().is_active());
    }

    #[test]
    fn test_pick_report_queued() {
        let (mut content, el) = page();
        content.handle_message(ExtensionMessage::StartPicker);
        content.pointer_move(el, Point::default());
        assert_eq!(content.click(), Disposition::SUPPRESS);
        assert_eq!(
            content.take_outbound(),
            vec![ExtensionMessage::ElementPicked {
                selector: "#promo".to_string()
            }]
        );
        assert!(content.take_outbound().is_empty());
    }

    #[test]
    fn test_escape_report_queued() {
        let (mut content, _) = page();
        content.handle_message(ExtensionMessage::StartPicker);
        content.key_down("Escape");
        assert_eq!(content.take_outbound(), vec![ExtensionMessage::StopPicker]);
    }

    #[test]
    fn test_drag_report_queued() {
        let (mut content, el) = page();
        content.handle_message(ExtensionMessage::StartDrag {
            selector: "#promo".to_string(),
        });
        assert_eq!(content.pointer_down(el, Point::new(5.0, 5.0)), Disposition::SUPPRESS);
        content.pointer_move(el, Point::new(25.0, 45.0));
        content.pointer_up();
        assert_eq!(
            content.take_outbound(),
            vec![ExtensionMessage::ElementDragged {
                selector: "#promo".to_string(),
                top: 40,
                left: 20
            }]
        );
    }
}

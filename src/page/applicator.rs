//! Style applicator
//!
//! Owns the one managed `<style>` element of a document and replaces its
//! text wholesale on every apply.

use tracing::{debug, warn};

use crate::constants::page::STYLE_ELEMENT_ID;
use crate::page::dom::{ElementId, PageDocument};

pub struct StyleApplicator {
    element: Option<ElementId>,
}

impl StyleApplicator {
    /// Find or create the managed style element
    ///
    /// An element left by an earlier injection into the same document is
    /// reused, never duplicated.
    pub fn attach(doc: &mut dyn PageDocument) -> Self {
        if let Some(existing) = doc.element_by_id(STYLE_ELEMENT_ID) {
            debug!("Reusing managed style element");
            return Self {
                element: Some(existing),
            };
        }

        let Some(root) = doc.root() else {
            warn!("Document has no root element, styles cannot be applied");
            return Self { element: None };
        };
        let style = doc.create_element("style");
        doc.set_id_attr(style, STYLE_ELEMENT_ID);
        doc.append_child(root, style);
        Self {
            element: Some(style),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.element.is_some()
    }

    /// Replace the managed text; idempotent, last write wins
    pub fn apply_css(&self, doc: &mut dyn PageDocument, css: &str) {
        match self.element {
            Some(el) => doc.set_text(el, css),
            None => debug!("Dropping CSS, no managed style element"),
        }
    }
}

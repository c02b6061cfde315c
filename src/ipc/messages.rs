//! Message types exchanged between the extension contexts and the host

use serde::{Deserialize, Serialize};

use crate::config::schema::StorageSchema;
use crate::host::{Capabilities, Tab, TabId, UserScript};

/// Runtime message between settings surface, background and content script
///
/// Wire form: `{"type": "APPLY_CSS", "payload": {"css": "..."}}`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExtensionMessage {
    /// Replace the managed style element's text
    ApplyCss { css: String },

    /// Liveness probe, answered with `PONG`
    Ping,

    StartPicker,

    /// Stop the picker, or report that the user cancelled it
    StopPicker,

    /// The picker resolved a click to a selector
    ElementPicked { selector: String },

    StartDrag { selector: String },

    StopDrag,

    /// A drag finished at this viewport position
    ElementDragged { selector: String, top: i32, left: i32 },

    /// Recompose and redeliver CSS to the active tab
    RefreshInjection,

    /// Insert caller-provided CSS into every frame of a tab
    InjectCssAllFrames {
        #[serde(default)]
        css: Option<String>,
        #[serde(rename = "tabId", default)]
        tab_id: Option<TabId>,
    },
}

/// `{"status": "..."}` acknowledgements
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Status {
    Applied,
    Started,
    Stopped,
    DragStarted,
    DragStopped,
    Refreshed,
    Injected,
    Error { message: String },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum PongReply {
    #[serde(rename = "PONG")]
    Pong,
}

/// Reply to an [`ExtensionMessage`]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum MessageResponse {
    Status(Status),
    Pong(PongReply),
}

impl MessageResponse {
    pub fn pong() -> Self {
        Self::Pong(PongReply::Pong)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Status(Status::Error {
            message: message.into(),
        })
    }
}

impl From<Status> for MessageResponse {
    fn from(status: Status) -> Self {
        Self::Status(status)
    }
}

/// Tab load progress as reported by the browser
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LoadStatus {
    Loading,
    Complete,
}

/// Events the extension forwards to the native host
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum HostEvent {
    /// First frame of a session
    Hello {
        #[serde(default)]
        capabilities: Capabilities,
        #[serde(default)]
        active_tab: Option<Tab>,
    },

    TabUpdated {
        tab: Tab,
        #[serde(default)]
        status: Option<LoadStatus>,
    },

    TabActivated { tab: Tab },

    /// The tab was closed
    TabRemoved { tab_id: TabId },

    /// A runtime message; `id` correlates the reply
    Message {
        id: u64,
        #[serde(default)]
        sender: Option<Tab>,
        message: ExtensionMessage,
    },

    /// The settings surface saved a new schema
    SchemaUpdated { schema: StorageSchema },

    Shutdown,
}

/// Commands the native host asks the extension to execute
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "command", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum HostCommand {
    InsertCss {
        tab_id: TabId,
        css: String,
        all_frames: bool,
    },

    SendToTab {
        tab_id: TabId,
        message: ExtensionMessage,
    },

    ExecuteScript {
        tab_id: TabId,
        code: String,
        all_frames: bool,
    },

    RegisterUserScript { script: UserScript },

    UnregisterUserScript { id: String },

    /// Reply to the [`HostEvent::Message`] with the same id
    Respond { id: u64, response: MessageResponse },

    /// Relay a content-script report to the settings surface
    Forward { message: ExtensionMessage },
}

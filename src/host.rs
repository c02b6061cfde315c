//! Browser capability seam
//!
//! The dispatcher never talks to the browser directly. Everything it needs
//! (inserting CSS into a tab, messaging a tab's content script, managing
//! user scripts) goes through these traits. The native host implements them
//! by relaying commands to the extension; tests use a recording fake.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::scripts;
use crate::ipc::messages::ExtensionMessage;

pub type TabId = i32;

/// What the dispatcher knows about a tab
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tab {
    #[serde(default)]
    pub id: Option<TabId>,
    #[serde(default)]
    pub url: Option<String>,
}

/// Optional browser features reported by the extension at startup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    #[serde(default)]
    pub user_scripts: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunAt {
    DocumentStart,
    DocumentEnd,
    DocumentIdle,
}

/// A persistent user script registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserScript {
    pub id: String,
    pub matches: Vec<String>,
    pub code: String,
    pub run_at: RunAt,
}

impl UserScript {
    /// The custom JavaScript registration, run on every URL once idle
    pub fn custom_js(code: &str) -> Self {
        Self {
            id: scripts::CUSTOM_JS_ID.to_string(),
            matches: vec![scripts::ALL_URLS.to_string()],
            code: code.to_string(),
            run_at: RunAt::DocumentIdle,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("Tab {0} no longer exists")]
    TabClosed(TabId),

    #[error("No content script is listening in tab {0}")]
    NoReceiver(TabId),

    #[error("Permission denied for tab {0}")]
    PermissionDenied(TabId),

    #[error("Capability unavailable: {0}")]
    Unavailable(&'static str),

    #[error("Transport failure: {0}")]
    Transport(String),
}

pub type DeliveryResult<T> = std::result::Result<T, DeliveryError>;

#[async_trait]
pub trait TabHost: Send + Sync {
    /// Insert `css` into the tab's documents as an extension stylesheet
    async fn insert_css(&self, tab_id: TabId, css: &str, all_frames: bool) -> DeliveryResult<()>;

    /// Deliver a message to the tab's content scripts
    async fn send_to_tab(&self, tab_id: TabId, message: &ExtensionMessage) -> DeliveryResult<()>;
}

#[async_trait]
pub trait ScriptHost: Send + Sync {
    fn user_scripts_available(&self) -> bool;

    /// Register `script`, replacing any registration with the same id
    async fn register_user_script(&self, script: &UserScript) -> DeliveryResult<()>;

    async fn unregister_user_script(&self, id: &str) -> DeliveryResult<()>;

    /// Run `code` once in the tab's page context
    async fn execute_script(&self, tab_id: TabId, code: &str, all_frames: bool) -> DeliveryResult<()>;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tab_tolerates_missing_fields() {
        let tab: Tab = serde_json::from_str("{}").unwrap();
        assert_eq!(tab, Tab::default());
        let tab: Tab = serde_json::from_str(r#"{"id": 7, "url": "https://a.com/"}"#).unwrap();
        assert_eq!(tab.id, Some(7));
    }

    #[test]
    fn test_custom_js_registration() {
        let script = UserScript::custom_js("alert(1)");
        let json = serde_json::to_value(&script).unwrap();
        assert_eq!(json["id"], "custom-js");
        assert_eq!(json["matches"][0], "<all_urls>");
        assert_eq!(json["runAt"], "document_idle");
    }

    #[test]
    fn test_capabilities_default_off() {
        let caps: Capabilities = serde_json::from_str("{}").unwrap();
        assert!(!caps.user_scripts);
        let caps: Capabilities = serde_json::from_str(r#"{"userScripts": true}"#).unwrap();
        assert!(caps.user_scripts);
    }
}

//! Persisted configuration schema
//!
//! Mirrors the record the extension keeps in its key-value store. Keys keep
//! the extension's camelCase names so a schema pushed by the settings
//! surface deserializes unchanged. Every field is optional on read.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// selector -> (property -> value), insertion ordered
pub type PropertyMap = IndexMap<String, String>;
pub type VisualEditMap = IndexMap<String, PropertyMap>;

/// Per-hostname configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteConfig {
    #[serde(default)]
    pub css: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub visual_edits: VisualEditMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant_group_id: Option<String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            css: String::new(),
            enabled: true,
            visual_edits: VisualEditMap::new(),
            variant_group_id: None,
        }
    }
}

/// A named set of hostnames sharing one CSS fragment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantGroup {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub domains: Vec<String>,
    #[serde(default)]
    pub css: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub visual_edits: VisualEditMap,
}

/// Reusable CSS fragment, toggleable globally or per site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preset {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub css: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visual_edits: Option<VisualEditMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled_sites: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_enabled: Option<bool>,
}

impl Preset {
    pub fn is_global(&self) -> bool {
        self.global_enabled.unwrap_or(false)
    }

    pub fn is_enabled_for(&self, hostname: &str) -> bool {
        self.enabled_sites
            .as_ref()
            .is_some_and(|sites| sites.iter().any(|s| s == hostname))
    }
}

/// Root aggregate persisted by the configuration store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageSchema {
    #[serde(default = "default_true")]
    pub global_enabled: bool,
    #[serde(rename = "globalCSS", default)]
    pub global_css: String,
    #[serde(default)]
    pub global_visual_edits: VisualEditMap,
    #[serde(default)]
    pub sites: IndexMap<String, SiteConfig>,
    #[serde(default)]
    pub variant_groups: IndexMap<String, VariantGroup>,
    #[serde(default)]
    pub presets: IndexMap<String, Preset>,
    #[serde(default = "default_true")]
    pub dark_mode: bool,

    /// Custom JavaScript registered as a user script when the host allows it
    #[serde(rename = "jsEnabled", default)]
    pub js_enabled: bool,
    #[serde(rename = "customJS", default)]
    pub custom_js: String,
}

impl Default for StorageSchema {
    fn default() -> Self {
        Self {
            global_enabled: true,
            global_css: String::new(),
            global_visual_edits: VisualEditMap::new(),
            sites: IndexMap::new(),
            variant_groups: IndexMap::new(),
            presets: IndexMap::new(),
            dark_mode: true,
            js_enabled: false,
            custom_js: String::new(),
        }
    }
}

impl StorageSchema {
    /// Site configuration for `hostname`, or the implicit enabled default
    pub fn site_or_default(&self, hostname: &str) -> SiteConfig {
        self.sites.get(hostname).cloned().unwrap_or_default()
    }

    /// Custom JS to run, if the global switch and the JS toggle allow it
    pub fn active_custom_js(&self) -> Option<&str> {
        (self.global_enabled && self.js_enabled && !self.custom_js.trim().is_empty())
            .then_some(self.custom_js.as_str())
    }
}

fn default_true() -> bool {
    true
}

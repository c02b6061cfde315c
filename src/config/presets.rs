//! Built-in preset library
//!
//! Seeded into the store the first time it is read with no presets at all.

use indexmap::IndexMap;
use tracing::info;

use crate::config::schema::{Preset, StorageSchema, VisualEditMap};

const READING_MODE_CSS: &str = r#"/* Reading mode */
body {
    max-width: 800px !important;
    margin: 0 auto !important;
    padding: 2rem !important;
    line-height: 1.8 !important;
    font-size: 18px !important;
}

p {
    margin-bottom: 1.5em !important;
}

aside, .sidebar, .advertisement, .ads,
[class*="ad"], [id*="ad"], [class*="banner"],
[class*="popup"], [class*="modal"] {
    display: none !important;
}"#;

const HIDE_COOKIES_CSS: &str = r#"/* Hide cookie banners */
[class*="cookie"], [id*="cookie"], [class*="consent"],
[class*="gdpr"], [id*="gdpr"], [class*="banner"][class*="cookie"],
.cookie-banner, #cookie-banner, .cookie-consent,
#cookie-consent, .cookie-notice, #cookie-notice,
[class*="cookie-banner"], [id*="cookie-banner"],
[class*="cookie-consent"], [id*="cookie-consent"] {
    display: none !important;
    visibility: hidden !important;
    opacity: 0 !important;
    height: 0 !important;
    overflow: hidden !important;
}"#;

const HIGH_CONTRAST_CSS: &str = r#"/* High contrast */
body {
    background: #ffffff !important;
    color: #000000 !important;
}

* {
    background-color: #ffffff !important;
    color: #000000 !important;
    border-color: #000000 !important;
}

a {
    color: #0000ff !important;
    text-decoration: underline !important;
}

a:visited {
    color: #800080 !important;
}

button, .button, [role="button"] {
    background: #000000 !important;
    color: #ffffff !important;
    border: 2px solid #000000 !important;
}

input, textarea, select {
    background: #ffffff !important;
    color: #000000 !important;
    border: 2px solid #000000 !important;
}"#;

fn builtin(id: &str, name: &str, description: &str, css: &str) -> Preset {
    Preset {
        id: id.to_string(),
        name: name.to_string(),
        description: Some(description.to_string()),
        css: css.to_string(),
        visual_edits: Some(VisualEditMap::new()),
        enabled_sites: Some(Vec::new()),
        global_enabled: Some(false),
    }
}

/// The built-in presets, all disabled
pub fn default_presets() -> IndexMap<String, Preset> {
    [
        builtin(
            "reading_mode",
            "Reading mode",
            "Centers content and loosens spacing for easier reading",
            READING_MODE_CSS,
        ),
        builtin(
            "hide_cookies",
            "Hide cookie banners",
            "Hides cookie consent banners",
            HIDE_COOKIES_CSS,
        ),
        builtin(
            "high_contrast",
            "High contrast",
            "Raises text and control contrast",
            HIGH_CONTRAST_CSS,
        ),
    ]
    .into_iter()
    .map(|p| (p.id.clone(), p))
    .collect()
}

impl StorageSchema {
    /// Seed the built-in presets when the library is empty
    ///
    /// Returns true if the schema changed and should be persisted.
    pub fn seed_default_presets(&mut self) -> bool {
        if !self.presets.is_empty() {
            return false;
        }
        self.presets = default_presets();
        info!(count = self.presets.len(), "Seeded built-in presets");
        true
    }
}

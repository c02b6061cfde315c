//! CSS composition
//!
//! Flattens the layered configuration into the single text block the page
//! receives. Layers are appended in a fixed precedence order so that later
//! (more specific) layers win ties under equal specificity and importance.

use std::fmt::Write as _;

use crate::config::schema::{Preset, StorageSchema, VisualEditMap};

/// Compose the CSS for `hostname` (empty when no page is active)
///
/// Returns an empty string when the global switch is off.
pub fn compose(schema: &StorageSchema, hostname: &str) -> String {
    if !schema.global_enabled {
        return String::new();
    }

    let mut css = String::new();

    let _ = write!(css, "/* Global */\n{}\n\n", schema.global_css);
    css.push_str(&synthesize(&schema.global_visual_edits));
    css.push('\n');

    for preset in schema.presets.values().filter(|p| p.is_global()) {
        append_preset(&mut css, preset);
    }

    let site = schema.site_or_default(hostname);

    if !hostname.is_empty()
        && let Some(group_id) = &site.variant_group_id
        && let Some(group) = schema.variant_groups.get(group_id)
        && group.enabled
    {
        let _ = write!(css, "/* Variant: {} */\n{}\n\n", group.name, group.css);
        css.push_str(&synthesize(&group.visual_edits));
        css.push('\n');
    }

    if site.enabled {
        if !hostname.is_empty() {
            for preset in schema.presets.values().filter(|p| p.is_enabled_for(hostname)) {
                append_preset(&mut css, preset);
            }
        }

        let _ = write!(css, "/* Local ({hostname}) */\n{}\n\n", site.css);
        css.push_str(&synthesize(&site.visual_edits));
    }

    css
}

/// One rule per selector, every declaration forced with `!important`
///
/// `h1 { color: red !important; margin: 0 !important; }`
pub fn synthesize(edits: &VisualEditMap) -> String {
    let mut css = String::new();
    for (selector, props) in edits {
        let _ = write!(css, "{selector} {{ ");
        for (prop, value) in props {
            let _ = write!(css, "{prop}: {value} !important; ");
        }
        css.push_str("}\n");
    }
    css
}

/// Multi-line variant of [`synthesize`], used when visual edits are turned
/// into editable code text
pub fn synthesize_pretty(edits: &VisualEditMap) -> String {
    let mut css = String::new();
    for (selector, props) in edits {
        let _ = writeln!(css, "{selector} {{");
        for (prop, value) in props {
            let _ = writeln!(css, "  {prop}: {value} !important;");
        }
        css.push_str("}\n\n");
    }
    css
}

fn append_preset(css: &mut String, preset: &Preset) {
    if preset.css.is_empty() {
        return;
    }
    let _ = write!(css, "/* Preset: {} */\n{}\n\n", preset.name, preset.css);
    if let Some(edits) = &preset.visual_edits {
        css.push_str(&synthesize(edits));
    }
    css.push('\n');
}

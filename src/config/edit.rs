//! Edit operations on the schema
//!
//! Every mutation the settings surface, the picker and the drag
//! repositioner perform goes through these methods, so the schema's
//! invariants hold no matter which context wrote last:
//! - a selector whose property map becomes empty is removed
//! - variant group membership is kept mutual
//! - a site config is created lazily on first edit of its hostname

use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tracing::{debug, info};

use crate::compositor::synthesize_pretty;
use crate::config::schema::{Preset, PropertyMap, SiteConfig, StorageSchema, VariantGroup, VisualEditMap};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum EditError {
    #[error("No site is active")]
    NoHostname,

    #[error("Unknown preset: {0}")]
    UnknownPreset(String),

    #[error("Unknown variant group: {0}")]
    UnknownGroup(String),
}

pub type EditResult<T> = std::result::Result<T, EditError>;

/// Which layer an edit targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditScope {
    Global,
    Site(String),
}

impl EditScope {
    pub fn site(hostname: impl Into<String>) -> Self {
        Self::Site(hostname.into())
    }
}

impl StorageSchema {
    /// Site config for `hostname`, created on first use
    pub fn site_mut(&mut self, hostname: &str) -> EditResult<&mut SiteConfig> {
        if hostname.is_empty() {
            return Err(EditError::NoHostname);
        }
        Ok(self.sites.entry(hostname.to_string()).or_default())
    }

    fn css_mut(&mut self, scope: &EditScope) -> EditResult<&mut String> {
        match scope {
            EditScope::Global => Ok(&mut self.global_css),
            EditScope::Site(host) => Ok(&mut self.site_mut(host)?.css),
        }
    }

    fn visual_edits_mut(&mut self, scope: &EditScope) -> EditResult<&mut VisualEditMap> {
        match scope {
            EditScope::Global => Ok(&mut self.global_visual_edits),
            EditScope::Site(host) => Ok(&mut self.site_mut(host)?.visual_edits),
        }
    }

    pub fn set_css(&mut self, scope: &EditScope, css: impl Into<String>) -> EditResult<()> {
        *self.css_mut(scope)? = css.into();
        Ok(())
    }

    pub fn set_site_enabled(&mut self, hostname: &str, enabled: bool) -> EditResult<()> {
        self.site_mut(hostname)?.enabled = enabled;
        Ok(())
    }

    /// Replace the property set of `selector`; an empty set removes it
    pub fn set_visual_edit(
        &mut self,
        scope: &EditScope,
        selector: &str,
        properties: PropertyMap,
    ) -> EditResult<()> {
        let edits = self.visual_edits_mut(scope)?;
        if properties.is_empty() {
            edits.shift_remove(selector);
        } else {
            edits.insert(selector.to_string(), properties);
        }
        Ok(())
    }

    pub fn set_visual_property(
        &mut self,
        scope: &EditScope,
        selector: &str,
        property: &str,
        value: &str,
    ) -> EditResult<()> {
        self.visual_edits_mut(scope)?
            .entry(selector.to_string())
            .or_default()
            .insert(property.to_string(), value.to_string());
        Ok(())
    }

    pub fn remove_visual_property(
        &mut self,
        scope: &EditScope,
        selector: &str,
        property: &str,
    ) -> EditResult<()> {
        // Removing never creates a site entry
        let edits = match scope {
            EditScope::Global => &mut self.global_visual_edits,
            EditScope::Site(host) if host.is_empty() => return Err(EditError::NoHostname),
            EditScope::Site(host) => match self.sites.get_mut(host) {
                Some(site) => &mut site.visual_edits,
                None => return Ok(()),
            },
        };
        if let Some(props) = edits.get_mut(selector) {
            props.shift_remove(property);
            if props.is_empty() {
                edits.shift_remove(selector);
            }
        }
        Ok(())
    }

    /// Persist a drag result as `top`/`left` on the selector, forcing
    /// `position: fixed` unless a position is already set
    pub fn record_drag_position(
        &mut self,
        scope: &EditScope,
        selector: &str,
        top: i32,
        left: i32,
    ) -> EditResult<()> {
        let props = self
            .visual_edits_mut(scope)?
            .entry(selector.to_string())
            .or_default();
        props.insert("top".to_string(), format!("{top}px"));
        props.insert("left".to_string(), format!("{left}px"));
        if !props.contains_key("position") {
            props.insert("position".to_string(), "fixed".to_string());
        }
        debug!(selector, top, left, "Recorded drag position");
        Ok(())
    }

    /// Move the scope's visual edits into its code text
    pub fn convert_visual_to_code(&mut self, scope: &EditScope) -> EditResult<()> {
        let generated = synthesize_pretty(self.visual_edits_mut(scope)?);
        self.visual_edits_mut(scope)?.clear();
        let css = self.css_mut(scope)?;
        if !css.is_empty() {
            css.push('\n');
        }
        css.push_str(&generated);
        Ok(())
    }

    /// Clear code and visual edits of the scope
    pub fn reset(&mut self, scope: &EditScope) -> EditResult<()> {
        self.css_mut(scope)?.clear();
        self.visual_edits_mut(scope)?.clear();
        info!(scope = ?scope, "Reset scope");
        Ok(())
    }

    /// Whether the scope has anything a reset would clear
    pub fn has_content(&self, scope: &EditScope) -> bool {
        match scope {
            EditScope::Global => {
                !self.global_css.trim().is_empty() || !self.global_visual_edits.is_empty()
            }
            EditScope::Site(host) => self
                .sites
                .get(host)
                .is_some_and(|s| !s.css.trim().is_empty() || !s.visual_edits.is_empty()),
        }
    }

    // ------------------------------------------------------------------
    // Variant groups
    // ------------------------------------------------------------------

    pub fn create_variant_group(&mut self, name: &str) -> String {
        let id = fresh_id("variant", |id| self.variant_groups.contains_key(id));
        self.variant_groups.insert(
            id.clone(),
            VariantGroup {
                id: id.clone(),
                name: name.to_string(),
                domains: Vec::new(),
                css: String::new(),
                enabled: true,
                visual_edits: VisualEditMap::new(),
            },
        );
        info!(group = %id, name, "Created variant group");
        id
    }

    pub fn variant_group_mut(&mut self, group_id: &str) -> EditResult<&mut VariantGroup> {
        self.variant_groups
            .get_mut(group_id)
            .ok_or_else(|| EditError::UnknownGroup(group_id.to_string()))
    }

    /// Delete a group and detach every site that referenced it
    pub fn delete_variant_group(&mut self, group_id: &str) -> EditResult<()> {
        if self.variant_groups.shift_remove(group_id).is_none() {
            return Err(EditError::UnknownGroup(group_id.to_string()));
        }
        for site in self.sites.values_mut() {
            if site.variant_group_id.as_deref() == Some(group_id) {
                site.variant_group_id = None;
            }
        }
        info!(group = %group_id, "Deleted variant group");
        Ok(())
    }

    /// Assign `domain` to `group_id`, or detach it when `None`
    ///
    /// The domain leaves its previous group's list; the site's back
    /// reference is updated to match.
    pub fn assign_site_to_group(&mut self, domain: &str, group_id: Option<&str>) -> EditResult<()> {
        if domain.is_empty() {
            return Err(EditError::NoHostname);
        }
        if let Some(id) = group_id
            && !self.variant_groups.contains_key(id)
        {
            return Err(EditError::UnknownGroup(id.to_string()));
        }

        let previous = self.sites.get(domain).and_then(|s| s.variant_group_id.clone());
        if let Some(old) = previous
            && let Some(group) = self.variant_groups.get_mut(&old)
        {
            group.domains.retain(|d| d != domain);
        }

        if let Some(id) = group_id
            && let Some(group) = self.variant_groups.get_mut(id)
            && !group.domains.iter().any(|d| d == domain)
        {
            group.domains.push(domain.to_string());
        }

        self.site_mut(domain)?.variant_group_id = group_id.map(str::to_string);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Presets
    // ------------------------------------------------------------------

    pub fn create_preset(&mut self, name: &str, description: &str, css: &str) -> String {
        let id = fresh_id("preset", |id| self.presets.contains_key(id));
        self.presets.insert(
            id.clone(),
            Preset {
                id: id.clone(),
                name: name.to_string(),
                description: Some(description.to_string()),
                css: css.to_string(),
                visual_edits: Some(VisualEditMap::new()),
                enabled_sites: Some(Vec::new()),
                global_enabled: Some(false),
            },
        );
        info!(preset = %id, name, "Created preset");
        id
    }

    pub fn preset_mut(&mut self, preset_id: &str) -> EditResult<&mut Preset> {
        self.presets
            .get_mut(preset_id)
            .ok_or_else(|| EditError::UnknownPreset(preset_id.to_string()))
    }

    pub fn delete_preset(&mut self, preset_id: &str) -> EditResult<()> {
        self.presets
            .shift_remove(preset_id)
            .map(|_| ())
            .ok_or_else(|| EditError::UnknownPreset(preset_id.to_string()))
    }

    /// Flip the global toggle; returns the new state
    pub fn toggle_preset_global(&mut self, preset_id: &str) -> EditResult<bool> {
        let preset = self.preset_mut(preset_id)?;
        let enabled = !preset.is_global();
        preset.global_enabled = Some(enabled);
        Ok(enabled)
    }

    /// Flip the preset for one site; returns the new state
    pub fn toggle_preset_for_site(&mut self, preset_id: &str, domain: &str) -> EditResult<bool> {
        if domain.is_empty() {
            return Err(EditError::NoHostname);
        }
        let preset = self.preset_mut(preset_id)?;
        let sites = preset.enabled_sites.get_or_insert_with(Vec::new);
        if let Some(pos) = sites.iter().position(|d| d == domain) {
            sites.remove(pos);
            Ok(false)
        } else {
            sites.push(domain.to_string());
            Ok(true)
        }
    }

    /// Copy the preset's CSS into the scope's code text
    ///
    /// The copy is independent of the preset's toggles afterwards.
    pub fn merge_preset_into(&mut self, preset_id: &str, scope: &EditScope) -> EditResult<()> {
        let preset = self
            .presets
            .get(preset_id)
            .ok_or_else(|| EditError::UnknownPreset(preset_id.to_string()))?;
        let block = format!("/* Preset: {} */\n{}", preset.name, preset.css);
        let css = self.css_mut(scope)?;
        if !css.is_empty() {
            css.push_str("\n\n");
        }
        css.push_str(&block);
        Ok(())
    }
}

/// `prefix_<unix millis>`, bumped until it does not collide
fn fresh_id(prefix: &str, taken: impl Fn(&str) -> bool) -> String {
    let mut millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    loop {
        let id = format!("{prefix}_{millis}");
        if !taken(&id) {
            return id;
        }
        millis += 1;
    }
}

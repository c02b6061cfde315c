//! Custom JavaScript synchronization
//!
//! With a user-scripts capability the custom code is kept registered as a
//! persistent script. Without one it is executed on every completed
//! navigation instead, and a single warning is logged.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, error, info, warn};

use crate::config::schema::StorageSchema;
use crate::constants::scripts;
use crate::host::{ScriptHost, TabId, UserScript};

pub struct ScriptSync {
    host: Arc<dyn ScriptHost>,
    warned: AtomicBool,
}

impl ScriptSync {
    pub fn new(host: Arc<dyn ScriptHost>) -> Self {
        Self {
            host,
            warned: AtomicBool::new(false),
        }
    }

    /// Bring the registration in line with the schema
    pub async fn sync(&self, schema: &StorageSchema) {
        if !self.host.user_scripts_available() {
            if schema.active_custom_js().is_some() && !self.warned.swap(true, Ordering::SeqCst) {
                warn!("User scripts unavailable, custom JS will run per navigation instead");
            }
            return;
        }

        match schema.active_custom_js() {
            Some(code) => {
                let script = UserScript::custom_js(code);
                match self.host.register_user_script(&script).await {
                    Ok(()) => info!(id = %script.id, "Registered custom JS user script"),
                    Err(e) => error!(error = %e, "Failed to sync user scripts"),
                }
            }
            None => {
                // Unregistering an absent script is harmless
                if let Err(e) = self.host.unregister_user_script(scripts::CUSTOM_JS_ID).await {
                    debug!(error = %e, "Custom JS user script not unregistered");
                }
            }
        }
    }

    /// Fallback execution after a navigation completes
    pub async fn on_navigation(&self, tab_id: TabId, schema: &StorageSchema) {
        if self.host.user_scripts_available() {
            return;
        }
        let Some(code) = schema.active_custom_js() else {
            return;
        };
        if let Err(e) = self.host.execute_script(tab_id, code, true).await {
            error!(tab_id, error = %e, "Fallback custom JS execution failed");
        }
    }
}

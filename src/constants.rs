//! Application-wide constants
//!
//! Every delay, identifier and string literal the injection pipeline relies
//! on lives here, so the host, the page components and the tests agree on
//! one value.

/// Injection delivery timing
pub mod delivery {
    /// Delays (ms) after the first direct insertion at which it is reissued
    /// to reach frames that attach after navigation completes
    pub const RETRY_DELAYS_MS: [u64; 2] = [1500, 3000];

    /// Longest retry delay accepted from configuration
    pub const MAX_RETRY_DELAY_MS: u64 = 60_000;

    /// Most retries accepted from configuration
    pub const MAX_RETRIES: usize = 8;
}

/// Settings persistence timing
pub mod persistence {
    /// Idle window (ms) after the last edit before the schema is written
    pub const DEBOUNCE_MS: u64 = 150;

    /// Accepted debounce range (ms)
    pub const MIN_DEBOUNCE_MS: u64 = 50;
    pub const MAX_DEBOUNCE_MS: u64 = 2_000;

    /// Capacity of the store change-notification feed
    pub const CHANGE_FEED_CAPACITY: usize = 16;
}

/// Page-side element identifiers and styles
pub mod page {
    /// Id of the single managed style element per document
    pub const STYLE_ELEMENT_ID: &str = "page-styler-managed-styles";

    /// Key that cancels an active pick
    pub const CANCEL_KEY: &str = "Escape";

    /// Accent used for the picker overlay and drag outline
    pub const ACCENT_COLOR: &str = "#4f46e5";

    /// Stacking order forced on an armed drag target
    pub const DRAG_Z_INDEX: &str = "999999";

    /// Stacking order of the picker overlay (max 32-bit int)
    pub const OVERLAY_Z_INDEX: &str = "2147483647";
}

/// User script registration
pub mod scripts {
    /// Registration id of the custom JavaScript user script
    pub const CUSTOM_JS_ID: &str = "custom-js";

    /// Match pattern for the custom script
    pub const ALL_URLS: &str = "<all_urls>";
}

/// Native host process
pub mod host {
    /// Directory under the user's config and runtime dirs
    pub const APP_DIR: &str = "page-styler";

    /// Persisted schema file name
    pub const STORE_FILENAME: &str = "storage.json";

    /// Socket file name under the runtime dir
    pub const SOCKET_FILENAME: &str = "host.sock";

    /// Maximum frame size (10 MB) to prevent memory exhaustion
    pub const MAX_MESSAGE_SIZE: usize = 10 * 1024 * 1024;
}

/// Environment variable names
pub mod env {
    pub const LOG_LEVEL: &str = "LOG_LEVEL";
    pub const RETRY_MS: &str = "PAGE_STYLER_RETRY_MS";
    pub const DEBOUNCE_MS: &str = "PAGE_STYLER_DEBOUNCE_MS";
}

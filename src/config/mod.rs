//! Configuration management for page-styler
//!
//! - **schema**: the persisted record (global, sites, groups, presets)
//! - **edit**: mutations that keep the schema's invariants
//! - **presets**: the built-in preset library
//! - **store**: whole-record persistence with a change feed
//! - **debounce**: coalescing writer in front of the store
//! - **settings**: native host runtime settings

pub mod debounce;
pub mod edit;
pub mod presets;
pub mod schema;
pub mod settings;
pub mod store;

// Re-export commonly used types
pub use debounce::DebouncedWriter;
pub use edit::{EditError, EditScope};
pub use schema::{Preset, PropertyMap, SiteConfig, StorageSchema, VariantGroup, VisualEditMap};
pub use settings::HostSettings;
pub use store::{ConfigStore, JsonFileStore, MemoryStore, StoreChange};

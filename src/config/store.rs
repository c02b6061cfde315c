//! Configuration store
//!
//! A flat whole-record store: every writer reads the schema, applies its
//! changes and overwrites the full record. There is no locking across
//! writers; the last write wins. Each successful save is announced on a
//! change feed so the dispatcher can redeliver CSS.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use tokio::fs;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::config::schema::StorageSchema;
use crate::constants::{host, persistence};

/// Notification that the persisted schema changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreChange {
    pub revision: u64,
}

#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Read the full schema; a missing record yields the defaults
    async fn load(&self) -> Result<StorageSchema>;

    /// Overwrite the full schema and announce the change
    async fn save(&self, schema: &StorageSchema) -> Result<()>;

    /// Subscribe to the change feed
    fn subscribe(&self) -> broadcast::Receiver<StoreChange>;
}

/// Load the schema, seeding the built-in presets on first use
pub async fn load_or_seed(store: &dyn ConfigStore) -> Result<StorageSchema> {
    let mut schema = store.load().await?;
    if schema.seed_default_presets() {
        store
            .save(&schema)
            .await
            .context("Failed to persist built-in presets")?;
    }
    Ok(schema)
}

/// Load the schema with the built-in presets filled in, without writing
pub async fn load_seeded(store: &dyn ConfigStore) -> Result<StorageSchema> {
    let mut schema = store.load().await?;
    schema.seed_default_presets();
    Ok(schema)
}

/// Change feed shared by the store implementations
struct ChangeFeed {
    tx: broadcast::Sender<StoreChange>,
    revision: AtomicU64,
}

impl ChangeFeed {
    fn new() -> Self {
        let (tx, _rx) = broadcast::channel(persistence::CHANGE_FEED_CAPACITY);
        Self {
            tx,
            revision: AtomicU64::new(0),
        }
    }

    fn announce(&self) {
        let revision = self.revision.fetch_add(1, Ordering::SeqCst) + 1;
        // No subscribers is fine
        let _ = self.tx.send(StoreChange { revision });
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.tx.subscribe()
    }
}

/// JSON file under the user's config directory
pub struct JsonFileStore {
    path: PathBuf,
    feed: ChangeFeed,
}

impl JsonFileStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            feed: ChangeFeed::new(),
        }
    }

    /// `$XDG_CONFIG_HOME/page-styler/storage.json`
    pub fn default_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(host::APP_DIR);
        path.push(host::STORE_FILENAME);
        path
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ConfigStore for JsonFileStore {
    async fn load(&self) -> Result<StorageSchema> {
        let exists = fs::try_exists(&self.path)
            .await
            .with_context(|| format!("Failed to stat {}", self.path.display()))?;
        if !exists {
            info!(path = %self.path.display(), "No stored schema, using defaults");
            return Ok(StorageSchema::default());
        }
        let contents = fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read schema from {}", self.path.display()))?;
        if contents.trim().is_empty() {
            warn!(path = %self.path.display(), "Stored schema is empty, using defaults");
            return Ok(StorageSchema::default());
        }
        let schema = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse schema JSON from {}", self.path.display()))?;
        debug!(path = %self.path.display(), "Loaded schema");
        Ok(schema)
    }

    async fn save(&self, schema: &StorageSchema) -> Result<()> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| anyhow!("Store path has no parent: {}", self.path.display()))?;
        fs::create_dir_all(parent)
            .await
            .context(format!("Failed to create store directory: {}", parent.display()))?;

        let contents =
            serde_json::to_string_pretty(schema).context("Failed to serialize schema to JSON")?;

        // Write-then-rename so a crash never leaves a truncated record
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, contents)
            .await
            .with_context(|| format!("Failed to write schema to {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;

        debug!(path = %self.path.display(), "Saved schema");
        self.feed.announce();
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.feed.subscribe()
    }
}

/// In-process store, used when the extension owns persistence and pushes
/// the schema to the host, and in tests
pub struct MemoryStore {
    schema: Mutex<StorageSchema>,
    saves: AtomicU64,
    feed: ChangeFeed,
}

impl MemoryStore {
    pub fn new(schema: StorageSchema) -> Self {
        Self {
            schema: Mutex::new(schema),
            saves: AtomicU64::new(0),
            feed: ChangeFeed::new(),
        }
    }

    /// Number of completed saves
    pub fn save_count(&self) -> u64 {
        self.saves.load(Ordering::SeqCst)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(StorageSchema::default())
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn load(&self) -> Result<StorageSchema> {
        let schema = self
            .schema
            .lock()
            .map_err(|_| anyhow!("Schema lock poisoned"))?;
        Ok(schema.clone())
    }

    async fn save(&self, schema: &StorageSchema) -> Result<()> {
        {
            let mut current = self
                .schema
                .lock()
                .map_err(|_| anyhow!("Schema lock poisoned"))?;
            *current = schema.clone();
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.feed.announce();
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.feed.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::edit::EditScope;

    #[tokio::test]
    async fn test_file_store_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("storage.json"));
        assert_eq!(store.load().await.unwrap(), StorageSchema::default());
    }

    #[tokio::test]
    async fn test_file_store_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested/storage.json"));
        let mut rx = store.subscribe();

        let mut schema = StorageSchema::default();
        schema.set_css(&EditScope::site("a.com"), "p{margin:0}").unwrap();
        store.save(&schema).await.unwrap();

        assert_eq!(store.load().await.unwrap(), schema);
        assert_eq!(rx.recv().await.unwrap(), StoreChange { revision: 1 });
        assert!(!dir.path().join("nested/storage.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_file_store_io_leaves_timers_running() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("storage.json"));
        let mut schema = StorageSchema::default();
        schema.global_css = "x{}".repeat(50_000);

        let ticker = tokio::spawn(async {
            let mut ticks = 0u32;
            for _ in 0..3 {
                tokio::time::sleep(std::time::Duration::from_millis(1)).await;
                ticks += 1;
            }
            ticks
        });
        let (saved, loaded) = tokio::join!(store.save(&schema), async {
            tokio::task::yield_now().await;
            store.load().await
        });
        saved.unwrap();
        loaded.unwrap();
        assert_eq!(ticker.await.unwrap(), 3);
        assert_eq!(store.load().await.unwrap(), schema);
    }

    #[tokio::test]
    async fn test_file_store_rejects_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        std::fs::write(&path, "{ not json").unwrap();
        let store = JsonFileStore::new(path);
        let err = store.load().await.unwrap_err();
        assert!(err.to_string().contains("Failed to parse schema JSON"));
    }

    #[tokio::test]
    async fn test_file_store_reads_extension_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        std::fs::write(&path, r#"{"globalCSS": "body{}", "darkMode": false}"#).unwrap();
        let schema = JsonFileStore::new(path).load().await.unwrap();
        assert_eq!(schema.global_css, "body{}");
        assert!(!schema.dark_mode);
        assert!(schema.global_enabled);
    }

    #[tokio::test]
    async fn test_load_or_seed_persists_presets_once() {
        let store = MemoryStore::default();
        let schema = load_or_seed(&store).await.unwrap();
        assert_eq!(schema.presets.len(), 3);
        assert_eq!(store.save_count(), 1);

        load_or_seed(&store).await.unwrap();
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test]
    async fn test_load_seeded_never_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        let store = JsonFileStore::new(path.clone());
        let schema = load_seeded(&store).await.unwrap();
        assert_eq!(schema.presets.len(), 3);
        assert!(!path.exists());

        let memory = MemoryStore::default();
        load_seeded(&memory).await.unwrap();
        assert_eq!(memory.save_count(), 0);
    }

    #[tokio::test]
    async fn test_memory_store_last_write_wins() {
        let store = MemoryStore::default();
        let mut a = store.load().await.unwrap();
        let mut b = store.load().await.unwrap();
        a.global_css = "a{}".to_string();
        b.global_css = "b{}".to_string();
        store.save(&a).await.unwrap();
        store.save(&b).await.unwrap();
        assert_eq!(store.load().await.unwrap().global_css, "b{}");
    }
}

//! Injection dispatcher
//!
//! Decides when CSS must be (re)delivered to a tab and delivers it through
//! two independent paths: a direct multi-frame stylesheet insertion, and an
//! `APPLY_CSS` message to the page's style applicator. The direct insertion
//! is reissued after each configured retry delay so frames that attach late
//! are covered. No failure here ever propagates to the caller.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::compositor::compose;
use crate::config::schema::StorageSchema;
use crate::config::store::ConfigStore;
use crate::host::{ScriptHost, Tab, TabHost, TabId};
use crate::ipc::messages::{ExtensionMessage, MessageResponse, Status};

pub mod scripts;

use scripts::ScriptSync;

/// Hostname of an `http`/`https` URL; anything else is not injectable
pub fn injectable_hostname(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    parsed.host_str().map(str::to_string)
}

#[derive(Default)]
struct TabTracker {
    active: Option<TabId>,
    urls: HashMap<TabId, String>,
}

pub struct Dispatcher {
    store: Arc<dyn ConfigStore>,
    tabs: Arc<dyn TabHost>,
    scripts: ScriptSync,
    retry_delays: Vec<Duration>,
    tracker: Mutex<TabTracker>,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn ConfigStore>,
        tabs: Arc<dyn TabHost>,
        scripts: Arc<dyn ScriptHost>,
        retry_delays: Vec<Duration>,
    ) -> Self {
        Self {
            store,
            tabs,
            scripts: ScriptSync::new(scripts),
            retry_delays,
            tracker: Mutex::new(TabTracker::default()),
        }
    }

    /// Remember a tab's URL, and optionally make it the active tab
    pub fn track_tab(&self, tab: &Tab, activate: bool) {
        let Some(tab_id) = tab.id else {
            return;
        };
        if let Ok(mut tracker) = self.tracker.lock() {
            if let Some(url) = &tab.url {
                tracker.urls.insert(tab_id, url.clone());
            }
            if activate {
                tracker.active = Some(tab_id);
            }
        }
    }

    /// Drop everything remembered about a closed tab
    pub fn forget_tab(&self, tab_id: TabId) {
        if let Ok(mut tracker) = self.tracker.lock() {
            tracker.urls.remove(&tab_id);
            if tracker.active == Some(tab_id) {
                tracker.active = None;
            }
        }
    }

    pub fn tracked_tabs(&self) -> usize {
        self.tracker.lock().map(|t| t.urls.len()).unwrap_or(0)
    }

    pub fn active_tab(&self) -> Option<(TabId, Option<String>)> {
        let tracker = self.tracker.lock().ok()?;
        let tab_id = tracker.active?;
        Some((tab_id, tracker.urls.get(&tab_id).cloned()))
    }

    async fn load_schema(&self) -> Option<StorageSchema> {
        match self.store.load().await {
            Ok(schema) => Some(schema),
            Err(e) => {
                error!(error = ?e, "Failed to read schema for injection");
                None
            }
        }
    }

    /// A tab finished loading
    ///
    /// The applicator always receives the composed CSS, even when empty,
    /// so a fresh document never keeps stale rules. The direct insertion is
    /// skipped when there is nothing to insert.
    pub async fn on_tab_updated(&self, tab: &Tab) {
        self.track_tab(tab, false);

        let Some(tab_id) = tab.id else {
            debug!("Ignoring update for tab without id");
            return;
        };
        let Some(hostname) = tab.url.as_deref().and_then(injectable_hostname) else {
            debug!(tab_id, "Ignoring non-injectable URL");
            return;
        };
        let Some(schema) = self.load_schema().await else {
            return;
        };

        let css = compose(&schema, &hostname);
        info!(tab_id, host = %hostname, bytes = css.len(), "Injecting after navigation");

        if !css.is_empty() {
            self.insert_with_retries(tab_id, css.clone()).await;
        }
        self.send_apply(tab_id, css).await;
        self.scripts.on_navigation(tab_id, &schema).await;
    }

    /// Recompose and redeliver to the active tab; empty CSS is a no-op
    pub async fn refresh_active(&self) {
        let Some((tab_id, url)) = self.active_tab() else {
            debug!("No active tab to refresh");
            return;
        };
        let Some(hostname) = url.as_deref().and_then(injectable_hostname) else {
            debug!(tab_id, "Active tab is not injectable");
            return;
        };
        let Some(schema) = self.load_schema().await else {
            return;
        };

        let css = compose(&schema, &hostname);
        if css.is_empty() {
            debug!(tab_id, host = %hostname, "Nothing to refresh");
            return;
        }
        info!(tab_id, host = %hostname, bytes = css.len(), "Refreshing injection");
        self.insert_with_retries(tab_id, css.clone()).await;
        self.send_apply(tab_id, css).await;
    }

    /// The persisted schema changed
    pub async fn on_store_changed(&self) {
        if let Some(schema) = self.load_schema().await {
            self.scripts.sync(&schema).await;
        }
        self.refresh_active().await;
    }

    /// Initial user-script sync at startup
    pub async fn sync_scripts(&self) {
        if let Some(schema) = self.load_schema().await {
            self.scripts.sync(&schema).await;
        }
    }

    /// Insert caller-provided CSS into every frame without waiting for it
    pub fn inject_all_frames(&self, css: Option<String>, tab_id: Option<TabId>) -> MessageResponse {
        let (Some(css), Some(tab_id)) = (css, tab_id) else {
            warn!("INJECT_CSS_ALL_FRAMES without css or tabId");
            return MessageResponse::error("Missing css or tabId");
        };

        let tabs = Arc::clone(&self.tabs);
        tokio::spawn(async move {
            if let Err(e) = tabs.insert_css(tab_id, &css, true).await {
                error!(tab_id, error = %e, "All-frames insertion failed");
            }
        });
        Status::Injected.into()
    }

    /// Handle a runtime message addressed to the background
    ///
    /// Returns `None` for messages the background does not answer.
    pub async fn handle_message(&self, message: ExtensionMessage) -> Option<MessageResponse> {
        match message {
            ExtensionMessage::RefreshInjection => {
                self.refresh_active().await;
                Some(Status::Refreshed.into())
            }
            ExtensionMessage::InjectCssAllFrames { css, tab_id } => {
                Some(self.inject_all_frames(css, tab_id))
            }
            ExtensionMessage::Ping => Some(MessageResponse::pong()),
            other => {
                debug!(message = ?other, "Message not handled by dispatcher");
                None
            }
        }
    }

    /// Insert now, then again after each retry delay
    ///
    /// Retries run on their own task and are never cancelled.
    async fn insert_with_retries(&self, tab_id: TabId, css: String) {
        insert_logged(self.tabs.as_ref(), tab_id, &css).await;

        if self.retry_delays.is_empty() {
            return;
        }
        let tabs = Arc::clone(&self.tabs);
        let delays = self.retry_delays.clone();
        let start = Instant::now();
        tokio::spawn(async move {
            for delay in delays {
                tokio::time::sleep_until(start + delay).await;
                insert_logged(tabs.as_ref(), tab_id, &css).await;
            }
        });
    }

    async fn send_apply(&self, tab_id: TabId, css: String) {
        let message = ExtensionMessage::ApplyCss { css };
        if let Err(e) = self.tabs.send_to_tab(tab_id, &message).await {
            // Expected on pages without a content script
            debug!(tab_id, error = %e, "APPLY_CSS not delivered");
        }
    }
}

async fn insert_logged(tabs: &dyn TabHost, tab_id: TabId, css: &str) {
    if let Err(e) = tabs.insert_css(tab_id, css, true).await {
        warn!(tab_id, error = %e, "CSS insertion failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::edit::EditScope;
    use crate::config::store::MemoryStore;
    use crate::host::testing::{HostCall, RecordingHost};

    fn tab(id: TabId, url: &str) -> Tab {
        Tab {
            id: Some(id),
            url: Some(url.to_string()),
        }
    }

    fn setup(schema: StorageSchema) -> (Dispatcher, Arc<MemoryStore>, Arc<RecordingHost>) {
        let store = Arc::new(MemoryStore::new(schema));
        let host = Arc::new(RecordingHost::new(true));
        let dispatcher = Dispatcher::new(
            store.clone(),
            host.clone(),
            host.clone(),
            vec![Duration::from_millis(1500), Duration::from_millis(3000)],
        );
        (dispatcher, store, host)
    }

    fn styled_schema() -> StorageSchema {
        let mut schema = StorageSchema::default();
        schema
            .set_css(&EditScope::site("example.com"), "p{color:red}")
            .unwrap();
        schema
    }

    #[test]
    fn test_injectable_hostname() {
        assert_eq!(
            injectable_hostname("https://example.com/path?q=1").as_deref(),
            Some("example.com")
        );
        assert_eq!(injectable_hostname("http://a.b.org:8080/").as_deref(), Some("a.b.org"));
        assert_eq!(injectable_hostname("chrome://extensions"), None);
        assert_eq!(injectable_hostname("file:///tmp/a.html"), None);
        assert_eq!(injectable_hostname("not a url"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigation_retry_schedule() {
        let (dispatcher, _store, host) = setup(styled_schema());
        dispatcher.on_tab_updated(&tab(1, "https://example.com/")).await;

        assert_eq!(host.inserts().len(), 1);
        assert_eq!(host.sent().len(), 1);

        tokio::time::sleep(Duration::from_millis(3500)).await;
        let inserts = host.inserts();
        let times: Vec<_> = inserts.iter().map(|(at, _)| *at).collect();
        assert_eq!(
            times,
            vec![
                Duration::ZERO,
                Duration::from_millis(1500),
                Duration::from_millis(3000)
            ]
        );
        assert!(inserts.iter().all(|(_, css)| css.contains("p{color:red}")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigation_sends_css_to_applicator() {
        let (dispatcher, _store, host) = setup(styled_schema());
        dispatcher.on_tab_updated(&tab(1, "https://example.com/")).await;

        match &host.sent()[..] {
            [ExtensionMessage::ApplyCss { css }] => {
                assert!(css.contains("/* Local (example.com) */\np{color:red}"))
            }
            other => panic!("unexpected messages: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigation_with_empty_css_still_clears_page() {
        let schema = StorageSchema {
            global_enabled: false,
            ..Default::default()
        };
        let (dispatcher, _store, host) = setup(schema);
        dispatcher.on_tab_updated(&tab(1, "https://example.com/")).await;
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert!(host.inserts().is_empty());
        assert_eq!(
            host.sent(),
            vec![ExtensionMessage::ApplyCss { css: String::new() }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_http_urls_ignored() {
        let (dispatcher, _store, host) = setup(styled_schema());
        dispatcher.on_tab_updated(&tab(1, "chrome://newtab/")).await;
        dispatcher
            .on_tab_updated(&Tab {
                id: None,
                url: Some("https://example.com/".to_string()),
            })
            .await;
        assert!(host.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_tab_failures_are_swallowed() {
        let (dispatcher, _store, host) = setup(styled_schema());
        host.close_tab(1);
        dispatcher.on_tab_updated(&tab(1, "https://example.com/")).await;
        tokio::time::sleep(Duration::from_secs(5)).await;
        // Every scheduled attempt still ran
        assert_eq!(host.inserts().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_uses_active_tab() {
        let (dispatcher, _store, host) = setup(styled_schema());
        dispatcher.refresh_active().await;
        assert!(host.calls().is_empty());

        dispatcher.track_tab(&tab(4, "https://example.com/a"), true);
        let response = dispatcher.handle_message(ExtensionMessage::RefreshInjection).await;
        assert_eq!(response, Some(Status::Refreshed.into()));
        assert_eq!(host.inserts().len(), 1);
        assert!(matches!(
            host.calls()[0],
            HostCall::InsertCss { tab_id: 4, all_frames: true, .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_tab_is_forgotten() {
        let (dispatcher, _store, host) = setup(styled_schema());
        dispatcher.track_tab(&tab(4, "https://example.com/"), true);
        dispatcher.track_tab(&tab(5, "https://example.com/b"), false);
        assert_eq!(dispatcher.tracked_tabs(), 2);

        dispatcher.forget_tab(5);
        assert_eq!(dispatcher.tracked_tabs(), 1);
        assert_eq!(dispatcher.active_tab().map(|(id, _)| id), Some(4));

        dispatcher.forget_tab(4);
        assert_eq!(dispatcher.tracked_tabs(), 0);
        assert_eq!(dispatcher.active_tab(), None);
        dispatcher.refresh_active().await;
        assert!(host.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_with_empty_css_does_nothing() {
        let schema = StorageSchema {
            global_enabled: false,
            ..Default::default()
        };
        let (dispatcher, _store, host) = setup(schema);
        dispatcher.track_tab(&tab(4, "https://example.com/"), true);
        dispatcher.refresh_active().await;
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(host.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_change_refreshes_active_tab() {
        let (dispatcher, store, host) = setup(StorageSchema::default());
        dispatcher.track_tab(&tab(2, "https://example.com/"), true);

        store.save(&styled_schema()).await.unwrap();
        dispatcher.on_store_changed().await;

        match &host.sent()[..] {
            [ExtensionMessage::ApplyCss { css }] => assert!(css.contains("p{color:red}")),
            other => panic!("unexpected messages: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_inject_all_frames_requires_css_and_tab() {
        let (dispatcher, _store, host) = setup(StorageSchema::default());

        let response = dispatcher.inject_all_frames(Some("a{}".to_string()), None);
        assert_eq!(response, MessageResponse::error("Missing css or tabId"));
        let response = dispatcher.inject_all_frames(None, Some(1));
        assert!(matches!(response, MessageResponse::Status(Status::Error { .. })));

        let response = dispatcher
            .handle_message(ExtensionMessage::InjectCssAllFrames {
                css: Some("a{}".to_string()),
                tab_id: Some(1),
            })
            .await;
        assert_eq!(response, Some(Status::Injected.into()));

        tokio::task::yield_now().await;
        assert_eq!(
            host.calls(),
            vec![HostCall::InsertCss {
                tab_id: 1,
                css: "a{}".to_string(),
                all_frames: true
            }]
        );
    }

    #[tokio::test]
    async fn test_content_messages_not_answered() {
        let (dispatcher, _store, _host) = setup(StorageSchema::default());
        assert_eq!(dispatcher.handle_message(ExtensionMessage::StopDrag).await, None);
        assert_eq!(
            dispatcher.handle_message(ExtensionMessage::Ping).await,
            Some(MessageResponse::pong())
        );
    }
}

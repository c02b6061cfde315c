//! Native messaging host
//!
//! Runs the background-side pipeline for one extension session. Inbound
//! frames are read on a dedicated thread (reads block) and handed to the
//! event loop over a channel; outbound commands are written as frames under
//! a lock. The loop ends on `shutdown`, on end of input, or when the reader
//! fails.

use std::io::{Read, Write};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use crate::config::debounce::DebouncedWriter;
use crate::config::edit::EditScope;
use crate::config::schema::StorageSchema;
use crate::config::settings::HostSettings;
use crate::config::store::{ConfigStore, load_or_seed};
use crate::dispatcher::{Dispatcher, injectable_hostname};
use crate::host::{
    Capabilities, DeliveryError, DeliveryResult, ScriptHost, Tab, TabHost, TabId, UserScript,
};
use crate::ipc::messages::{ExtensionMessage, HostCommand, HostEvent, LoadStatus};
use crate::ipc::{read_frame, write_message};

/// Host trait implementation that relays every call to the extension
pub struct RelayHost<W: Write + Send> {
    writer: Mutex<W>,
    capabilities: Mutex<Capabilities>,
}

impl<W: Write + Send> RelayHost<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
            capabilities: Mutex::new(Capabilities::default()),
        }
    }

    pub fn set_capabilities(&self, capabilities: Capabilities) {
        if let Ok(mut current) = self.capabilities.lock() {
            *current = capabilities;
        }
    }

    /// Write one command frame
    pub fn send(&self, command: &HostCommand) -> DeliveryResult<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| DeliveryError::Transport("writer lock poisoned".to_string()))?;
        write_message(&mut *writer, command).map_err(|e| DeliveryError::Transport(format!("{e:#}")))
    }
}

#[async_trait]
impl<W: Write + Send> TabHost for RelayHost<W> {
    async fn insert_css(&self, tab_id: TabId, css: &str, all_frames: bool) -> DeliveryResult<()> {
        self.send(&HostCommand::InsertCss {
            tab_id,
            css: css.to_string(),
            all_frames,
        })
    }

    async fn send_to_tab(&self, tab_id: TabId, message: &ExtensionMessage) -> DeliveryResult<()> {
        self.send(&HostCommand::SendToTab {
            tab_id,
            message: message.clone(),
        })
    }
}

#[async_trait]
impl<W: Write + Send> ScriptHost for RelayHost<W> {
    fn user_scripts_available(&self) -> bool {
        self.capabilities
            .lock()
            .map(|c| c.user_scripts)
            .unwrap_or(false)
    }

    async fn register_user_script(&self, script: &UserScript) -> DeliveryResult<()> {
        if !self.user_scripts_available() {
            return Err(DeliveryError::Unavailable("userScripts"));
        }
        self.send(&HostCommand::RegisterUserScript {
            script: script.clone(),
        })
    }

    async fn unregister_user_script(&self, id: &str) -> DeliveryResult<()> {
        if !self.user_scripts_available() {
            return Err(DeliveryError::Unavailable("userScripts"));
        }
        self.send(&HostCommand::UnregisterUserScript { id: id.to_string() })
    }

    async fn execute_script(&self, tab_id: TabId, code: &str, all_frames: bool) -> DeliveryResult<()> {
        self.send(&HostCommand::ExecuteScript {
            tab_id,
            code: code.to_string(),
            all_frames,
        })
    }
}

/// Read frames on a blocking thread and forward them to the loop
///
/// A frame that does not decode is logged and skipped; a broken stream
/// ends the session.
fn spawn_reader<R: Read + Send + 'static>(mut reader: R) -> mpsc::UnboundedReceiver<HostEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        loop {
            let frame = match read_frame(&mut reader) {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    info!("Extension closed the connection");
                    break;
                }
                Err(e) => {
                    error!(error = ?e, "Failed to read host event");
                    break;
                }
            };
            match serde_json::from_slice::<HostEvent>(&frame) {
                Ok(event) => {
                    if tx.send(event).is_err() {
                        break;
                    }
                }
                Err(e) => warn!(error = %e, bytes = frame.len(), "Dropping undecodable host event"),
            }
        }
    });
    rx
}

/// One session's state
///
/// `working` is the schema as this session last submitted it. Edits made
/// here apply to it rather than to the persisted record, which may still
/// be behind the debounce window.
struct Session<W: Write + Send + 'static> {
    store: Arc<dyn ConfigStore>,
    relay: Arc<RelayHost<W>>,
    dispatcher: Dispatcher,
    writer: DebouncedWriter,
    working: Option<StorageSchema>,
}

impl<W: Write + Send + 'static> Session<W> {
    /// Returns false when the session should end
    async fn handle_event(&mut self, event: HostEvent) -> bool {
        match event {
            HostEvent::Hello {
                capabilities,
                active_tab,
            } => {
                info!(user_scripts = capabilities.user_scripts, "Extension connected");
                self.relay.set_capabilities(capabilities);
                if let Some(tab) = active_tab {
                    self.dispatcher.track_tab(&tab, true);
                }
                self.dispatcher.sync_scripts().await;
            }
            HostEvent::TabUpdated { tab, status } => {
                if status == Some(LoadStatus::Complete) {
                    self.dispatcher.on_tab_updated(&tab).await;
                } else {
                    self.dispatcher.track_tab(&tab, false);
                }
            }
            HostEvent::TabActivated { tab } => {
                debug!(tab_id = ?tab.id, "Tab activated");
                self.dispatcher.track_tab(&tab, true);
            }
            HostEvent::TabRemoved { tab_id } => {
                debug!(tab_id, "Tab removed");
                self.dispatcher.forget_tab(tab_id);
            }
            HostEvent::Message {
                id,
                sender,
                message,
            } => self.handle_message(id, sender, message).await,
            HostEvent::SchemaUpdated { schema } => self.submit(schema),
            HostEvent::Shutdown => {
                info!("Shutdown requested");
                return false;
            }
        }
        true
    }

    async fn handle_message(&mut self, id: u64, sender: Option<Tab>, message: ExtensionMessage) {
        match message {
            ExtensionMessage::ElementPicked { .. } | ExtensionMessage::StopPicker => {
                self.forward(message);
            }
            ExtensionMessage::ElementDragged {
                ref selector,
                top,
                left,
            } => {
                self.persist_drag(sender.as_ref(), selector, top, left).await;
                self.forward(message);
            }
            other => {
                if let Some(response) = self.dispatcher.handle_message(other).await
                    && let Err(e) = self.relay.send(&HostCommand::Respond { id, response })
                {
                    error!(id, error = %e, "Failed to send response");
                }
            }
        }
    }

    fn forward(&self, message: ExtensionMessage) {
        if let Err(e) = self.relay.send(&HostCommand::Forward { message }) {
            error!(error = %e, "Failed to forward report");
        }
    }

    /// Hand a snapshot to the debounced writer and keep it as the working copy
    fn submit(&mut self, schema: StorageSchema) {
        self.working = Some(schema.clone());
        if !self.writer.submit(schema) {
            error!("Schema writer stopped, update dropped");
        }
    }

    /// Store a finished drag as a visual edit of the sender's site
    async fn persist_drag(&mut self, sender: Option<&Tab>, selector: &str, top: i32, left: i32) {
        let Some(hostname) = sender
            .and_then(|tab| tab.url.as_deref())
            .and_then(injectable_hostname)
        else {
            warn!(selector, "Drag report without an injectable sender, not persisted");
            return;
        };

        let mut schema = match self.working.take() {
            Some(schema) => schema,
            None => match self.store.load().await {
                Ok(schema) => schema,
                Err(e) => {
                    error!(error = ?e, "Failed to load schema for drag");
                    return;
                }
            },
        };
        if let Err(e) = schema.record_drag_position(&EditScope::site(hostname), selector, top, left) {
            warn!(error = %e, "Drag position not recorded");
            self.working = Some(schema);
            return;
        }
        self.submit(schema);
    }
}

/// Serve one extension session until it ends
pub async fn run<R, W>(settings: &HostSettings, store: Arc<dyn ConfigStore>, reader: R, writer: W) -> Result<()>
where
    R: Read + Send + 'static,
    W: Write + Send + 'static,
{
    let working = match load_or_seed(store.as_ref()).await {
        Ok(schema) => Some(schema),
        Err(e) => {
            error!(error = ?e, "Failed to load configuration, continuing with stored state");
            None
        }
    };

    let relay = Arc::new(RelayHost::new(writer));
    let dispatcher = Dispatcher::new(
        Arc::clone(&store),
        relay.clone(),
        relay.clone(),
        settings.retry_delays.clone(),
    );
    let (schema_writer, writer_task) = DebouncedWriter::spawn(Arc::clone(&store), settings.debounce);
    let mut changes = store.subscribe();
    let mut events = spawn_reader(reader);

    let mut session = Session {
        store,
        relay,
        dispatcher,
        writer: schema_writer,
        working,
    };

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => {
                    if !session.handle_event(event).await {
                        break;
                    }
                }
                None => break,
            },
            change = changes.recv() => match change {
                Ok(change) => {
                    debug!(revision = change.revision, "Configuration changed");
                    session.dispatcher.on_store_changed().await;
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Change feed lagged");
                    session.dispatcher.on_store_changed().await;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    // Flush any pending schema before returning
    drop(session);
    if let Err(e) = writer_task.await {
        error!(error = ?e, "Schema writer task failed");
    }
    info!("Session ended");
    Ok(())
}

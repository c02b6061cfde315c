//! Debounced schema writer
//!
//! Rapid edits (typing in the code editor, dragging a slider) each produce a
//! full schema snapshot. Only the last snapshot inside the idle window is
//! persisted, so a burst collapses to one save and one redelivery.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error};

use crate::config::schema::StorageSchema;
use crate::config::store::ConfigStore;

/// Handle used to submit snapshots to the writer task
#[derive(Clone)]
pub struct DebouncedWriter {
    tx: mpsc::UnboundedSender<StorageSchema>,
}

impl DebouncedWriter {
    /// Spawn the writer task on the current runtime
    pub fn spawn(store: Arc<dyn ConfigStore>, window: Duration) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_writer(store, window, rx));
        (Self { tx }, handle)
    }

    /// Queue a snapshot; returns false once the writer has stopped
    pub fn submit(&self, schema: StorageSchema) -> bool {
        self.tx.send(schema).is_ok()
    }
}

async fn run_writer(
    store: Arc<dyn ConfigStore>,
    window: Duration,
    mut rx: mpsc::UnboundedReceiver<StorageSchema>,
) {
    while let Some(mut pending) = rx.recv().await {
        let mut deadline = Instant::now() + window;
        let mut coalesced = 1usize;

        loop {
            tokio::select! {
                next = rx.recv() => match next {
                    Some(schema) => {
                        pending = schema;
                        coalesced += 1;
                        deadline = Instant::now() + window;
                    }
                    // Flush what we have before stopping
                    None => break,
                },
                _ = tokio::time::sleep_until(deadline) => break,
            }
        }

        debug!(coalesced, "Persisting debounced schema");
        if let Err(e) = store.save(&pending).await {
            error!(error = ?e, "Failed to persist schema");
        }
    }
    debug!("Debounced writer stopped");
}

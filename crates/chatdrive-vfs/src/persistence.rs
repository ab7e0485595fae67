//! Debounced metadata persistence.
//!
//! Every mutating drive operation calls [`MetadataPersistence::mark_dirty`];
//! a burst of mutations coalesces into one save after the configured quiet
//! period. The single background task serializes saves - a save in progress
//! finishes before the next one starts. A failed remote save falls back to
//! writing the same document to a local snapshot path, fire-and-forget; the
//! next successful mutation re-triggers a save attempt.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use chatdrive_core::domain::StoreError;
use chatdrive_core::ports::chunk_channel::RemoteChunkChannel;

use crate::tree::{MetadataDocument, VirtualMetadataStore};

/// Capacity of the dirty-mark channel. Marks beyond a pending one carry no
/// extra information, so a full channel is simply "already scheduled".
const DIRTY_MARK_CAPACITY: usize = 8;

/// Handle for scheduling metadata saves. Cheap to clone.
#[derive(Clone)]
pub struct MetadataPersistence {
    tx: mpsc::Sender<()>,
}

impl MetadataPersistence {
    /// Spawn the debounce/save task and return its handle.
    pub fn spawn(
        metadata: Arc<Mutex<VirtualMetadataStore>>,
        channel: Arc<dyn RemoteChunkChannel>,
        debounce: Duration,
        local_snapshot: PathBuf,
        shutdown: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(DIRTY_MARK_CAPACITY);
        let task = tokio::spawn(run_save_loop(
            metadata,
            channel,
            debounce,
            local_snapshot,
            shutdown,
            rx,
        ));
        (Self { tx }, task)
    }

    /// Record that the metadata changed; (re)starts the debounce window.
    ///
    /// Never blocks: a full channel means a save is already scheduled and
    /// the mark coalesces into it.
    pub fn mark_dirty(&self) {
        let _ = self.tx.try_send(());
    }

    /// Load the store from the remote backend.
    ///
    /// An absent or empty document yields a fresh empty root; a document
    /// that fails to parse is surfaced as corruption rather than silently
    /// replaced.
    pub async fn load(
        channel: &dyn RemoteChunkChannel,
    ) -> Result<VirtualMetadataStore, StoreError> {
        match channel.load_metadata().await? {
            None => {
                info!("no remote metadata document, starting with an empty tree");
                Ok(VirtualMetadataStore::new())
            }
            Some(bytes) if bytes.is_empty() => {
                info!("remote metadata document is empty, starting with an empty tree");
                Ok(VirtualMetadataStore::new())
            }
            Some(bytes) => {
                let document: MetadataDocument =
                    serde_json::from_slice(&bytes).map_err(|err| {
                        StoreError::InvariantViolation(format!(
                            "metadata document corrupted: {err}"
                        ))
                    })?;
                let store = VirtualMetadataStore::from_document(document)?;
                info!(nodes = store.node_count(), "metadata loaded");
                Ok(store)
            }
        }
    }

    /// Load the store from a local snapshot written by a failed remote save.
    /// Operator recovery path.
    pub async fn load_local_snapshot(path: &Path) -> Result<VirtualMetadataStore, StoreError> {
        let bytes = tokio::fs::read(path).await.map_err(|err| {
            StoreError::NotFound(format!("snapshot {}: {err}", path.display()))
        })?;
        let document: MetadataDocument = serde_json::from_slice(&bytes).map_err(|err| {
            StoreError::InvariantViolation(format!("snapshot corrupted: {err}"))
        })?;
        VirtualMetadataStore::from_document(document)
    }
}

async fn run_save_loop(
    metadata: Arc<Mutex<VirtualMetadataStore>>,
    channel: Arc<dyn RemoteChunkChannel>,
    debounce: Duration,
    local_snapshot: PathBuf,
    shutdown: CancellationToken,
    mut rx: mpsc::Receiver<()>,
) {
    info!(
        debounce_ms = debounce.as_millis() as u64,
        "metadata persistence starting"
    );

    loop {
        // Wait for the first dirty mark.
        tokio::select! {
            _ = shutdown.cancelled() => break,
            mark = rx.recv() => {
                if mark.is_none() {
                    break;
                }
            }
        }

        // Quiet-period window: each further mark restarts the timer.
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(debounce) => break,
                mark = rx.recv() => {
                    if mark.is_none() {
                        break;
                    }
                    debug!("dirty mark coalesced into pending save");
                }
            }
        }

        save_once(&metadata, channel.as_ref(), &local_snapshot).await;

        if shutdown.is_cancelled() {
            break;
        }
    }

    // Flush a final save if marks arrived after the last one.
    if rx.try_recv().is_ok() {
        save_once(&metadata, channel.as_ref(), &local_snapshot).await;
    }
    info!("metadata persistence stopped");
}

/// Serialize the tree and upload it; fall back to the local snapshot on
/// failure. Errors never propagate - the next mutation schedules a retry.
async fn save_once(
    metadata: &Arc<Mutex<VirtualMetadataStore>>,
    channel: &dyn RemoteChunkChannel,
    local_snapshot: &Path,
) {
    let document = {
        let store = metadata.lock().await;
        serde_json::to_vec_pretty(&store.to_document())
    };
    let bytes = match document {
        Ok(bytes) => bytes,
        Err(err) => {
            error!(error = %err, "metadata serialization failed, skipping save");
            return;
        }
    };

    match channel.store_metadata(Bytes::from(bytes.clone())).await {
        Ok(()) => {
            debug!(bytes = bytes.len(), "metadata saved remotely");
        }
        Err(err) => {
            warn!(error = %err, snapshot = %local_snapshot.display(),
                "remote metadata save failed, writing local snapshot");
            if let Some(parent) = local_snapshot.parent() {
                if let Err(err) = tokio::fs::create_dir_all(parent).await {
                    error!(error = %err, "could not create snapshot directory");
                    return;
                }
            }
            if let Err(err) = tokio::fs::write(local_snapshot, &bytes).await {
                error!(error = %err, "local snapshot write failed");
            }
        }
    }
}

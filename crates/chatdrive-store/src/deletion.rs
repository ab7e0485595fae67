//! Rate-limit-safe deferred deletion of remote objects.
//!
//! Removing a large file or directory orphans many chunks at once; deleting
//! them inline would burst the backend's rate limiter. Orphaned chunks are
//! queued here instead and drained one entry per tick.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use chatdrive_core::domain::DeletionEntry;
use chatdrive_core::ports::chunk_channel::{DeleteOutcome, RemoteChunkChannel};
use chatdrive_core::ports::chunk_store::ChunkStore;

/// FIFO queue of pending remote-object deletions.
///
/// `enqueue` is synchronous so callers can push entries while holding the
/// metadata lock; the remote delete happens later, on the drain tick.
#[derive(Debug, Default)]
pub struct DeletionQueue {
    entries: Mutex<VecDeque<DeletionEntry>>,
}

impl DeletionQueue {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
        }
    }

    /// Append entries to the queue. Duplicate enqueues of the same object
    /// are harmless - the remote delete is idempotent.
    pub fn enqueue(&self, entries: Vec<DeletionEntry>) {
        if entries.is_empty() {
            return;
        }
        let mut queue = self.entries.lock().unwrap();
        debug!(
            added = entries.len(),
            pending = queue.len() + entries.len(),
            "queueing chunks for deletion"
        );
        queue.extend(entries);
    }

    /// Number of pending entries.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// True when no deletions are pending.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }

    /// Pop at most one entry and issue its remote delete.
    ///
    /// `NotFound` from the backend counts as already deleted. A failed
    /// delete is logged and the entry dropped - the occasional orphaned
    /// remote object is accepted over an unbounded retry queue.
    pub async fn drain_one(&self, channel: &dyn RemoteChunkChannel) {
        let entry = self.entries.lock().unwrap().pop_front();
        let Some(entry) = entry else {
            return;
        };

        match channel.delete_object(&entry.container, &entry.object).await {
            Ok(DeleteOutcome::Deleted) => {
                debug!(object = %entry.object, "deleted remote chunk");
            }
            Ok(DeleteOutcome::NotFound) => {
                debug!(object = %entry.object, "remote chunk already gone");
            }
            Err(err) => {
                warn!(
                    object = %entry.object,
                    error = %err,
                    "remote delete failed, dropping queue entry"
                );
            }
        }
    }
}

/// Spawn the fixed-interval tick driving `process_deletion_queue`.
///
/// One entry is drained per tick until `shutdown` fires.
pub fn spawn_deletion_ticker(
    store: Arc<dyn ChunkStore>,
    tick: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(tick_ms = tick.as_millis() as u64, "deletion ticker starting");
        let mut interval = tokio::time::interval(tick);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("deletion ticker stopped");
                    break;
                }
                _ = interval.tick() => {
                    store.process_deletion_queue().await;
                }
            }
        }
    })
}

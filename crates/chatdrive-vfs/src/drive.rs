//! The drive facade: the operations the file-access-protocol layer calls.
//!
//! Every operation resolves paths through the [`VirtualMetadataStore`]
//! (behind one mutex - path mutations serialize at the store boundary) and
//! moves content through the [`ChunkedObjectProvider`]. Every mutation marks
//! the store dirty so the debounced persistence task schedules a save, and
//! every orphaned chunk goes through the deletion queue rather than being
//! deleted inline.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use chatdrive_core::domain::{ContainerId, FileDescriptor, StoreError, VfsPath};
use chatdrive_core::ports::chunk_store::{ObjectReadStream, ReadOptions};
use chatdrive_store::{generate_iv, ChunkedObjectProvider, ObjectWriteSession};

use crate::persistence::MetadataPersistence;
use crate::tree::{ChildEntry, EntryStat, VirtualMetadataStore};

/// The mounted drive: path-addressed operations over chunked remote content.
pub struct Drive {
    metadata: Arc<Mutex<VirtualMetadataStore>>,
    provider: ChunkedObjectProvider,
    persistence: MetadataPersistence,
    container: ContainerId,
    encrypt_new_files: bool,
}

impl Drive {
    pub fn new(
        metadata: Arc<Mutex<VirtualMetadataStore>>,
        provider: ChunkedObjectProvider,
        persistence: MetadataPersistence,
        container: ContainerId,
        encrypt_new_files: bool,
    ) -> Self {
        Self {
            metadata,
            provider,
            persistence,
            container,
            encrypt_new_files,
        }
    }

    /// The shared metadata store.
    pub fn metadata(&self) -> &Arc<Mutex<VirtualMetadataStore>> {
        &self.metadata
    }

    /// The provider this drive stores content through.
    pub fn provider(&self) -> &ChunkedObjectProvider {
        &self.provider
    }

    // ------------------------------------------------------------------
    // Read-only operations
    // ------------------------------------------------------------------

    pub async fn exists(&self, path: &VfsPath) -> bool {
        self.metadata.lock().await.exists(path)
    }

    pub async fn stat(&self, path: &VfsPath) -> Result<EntryStat, StoreError> {
        self.metadata.lock().await.stat(path)
    }

    pub async fn list_children(&self, path: &VfsPath) -> Result<Vec<ChildEntry>, StoreError> {
        self.metadata.lock().await.list_children(path)
    }

    // ------------------------------------------------------------------
    // Structural mutations
    // ------------------------------------------------------------------

    pub async fn mkdir(&self, path: &VfsPath) -> Result<(), StoreError> {
        self.metadata.lock().await.create_directory_path(path)?;
        self.persistence.mark_dirty();
        debug!(%path, "directory created");
        Ok(())
    }

    /// Remove a file or directory. Chunks of every removed file are queued
    /// for deletion; the remote deletes happen on the deletion ticks.
    pub async fn remove(&self, path: &VfsPath, recursive: bool) -> Result<(), StoreError> {
        let orphaned = {
            let mut store = self.metadata.lock().await;
            let entries = store.remove(path, recursive)?;
            let count = entries.len();
            self.provider.store().enqueue_removal(entries);
            count
        };
        self.persistence.mark_dirty();
        info!(%path, chunks = orphaned, "removed");
        Ok(())
    }

    pub async fn move_to(&self, from: &VfsPath, to: &VfsPath) -> Result<(), StoreError> {
        self.metadata.lock().await.move_node(from, to)?;
        self.persistence.mark_dirty();
        debug!(%from, %to, "moved");
        Ok(())
    }

    pub async fn rename(&self, path: &VfsPath, new_name: &str) -> Result<(), StoreError> {
        self.metadata.lock().await.rename(path, new_name)?;
        self.persistence.mark_dirty();
        debug!(%path, new_name, "renamed");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Content streams
    // ------------------------------------------------------------------

    /// Open the file at `path` for reading.
    pub async fn open_read(&self, path: &VfsPath) -> Result<ObjectReadStream, StoreError> {
        self.open_read_with(path, ReadOptions::new()).await
    }

    /// Open for reading with explicit cancellation/progress options.
    pub async fn open_read_with(
        &self,
        path: &VfsPath,
        opts: ReadOptions,
    ) -> Result<ObjectReadStream, StoreError> {
        let descriptor = self.metadata.lock().await.file(path)?.clone();
        self.provider.open_read_session(&descriptor, opts).await
    }

    /// Open the file at `path` for writing, creating it (and any missing
    /// parent directories) if absent.
    ///
    /// Overwriting clears the prior chunk list and queues it for deletion
    /// before the first new byte is written. `estimated_size` lets the
    /// configured capacity ceiling reject oversized writes up front.
    pub async fn open_write(
        &self,
        path: &VfsPath,
        estimated_size: Option<u64>,
    ) -> Result<DriveWriteHandle, StoreError> {
        if let (Some(estimate), Some(ceiling)) =
            (estimated_size, self.provider.capacity_ceiling())
        {
            if estimate > ceiling {
                return Err(StoreError::CapacityExceeded {
                    written: estimate,
                    ceiling,
                });
            }
        }

        let descriptor = {
            let mut store = self.metadata.lock().await;
            if store.exists(path) {
                // Overwrite: clear and queue the old chunks first.
                let mut orphaned = Vec::new();
                store.update_file(path, |file| {
                    orphaned = file.clear_chunks();
                })?;
                self.provider.store().enqueue_removal(orphaned);
                store.file(path)?.clone()
            } else {
                let leaf = path.leaf().ok_or_else(|| {
                    StoreError::InvariantViolation(
                        "cannot create a file at the root".to_string(),
                    )
                })?;
                let descriptor = if self.encrypt_new_files {
                    FileDescriptor::new_encrypted(leaf, self.container.clone(), generate_iv())
                } else {
                    FileDescriptor::new(leaf, self.container.clone())
                };
                store.insert_file(path, descriptor.clone())?;
                store.file(path)?.clone()
            }
        };
        self.persistence.mark_dirty();

        let session = self.provider.open_write_session(descriptor).await?;
        Ok(DriveWriteHandle {
            session,
            path: path.clone(),
            metadata: Arc::clone(&self.metadata),
            persistence: self.persistence.clone(),
        })
    }
}

/// One in-progress write through the drive.
///
/// Dropping the handle without calling [`DriveWriteHandle::finish`] or
/// [`DriveWriteHandle::abort`] stops future chunk uploads but leaves any
/// already-uploaded chunks unreferenced in the metadata - prefer `abort`,
/// which commits the partial chunk list so it can be cleaned up explicitly.
pub struct DriveWriteHandle {
    session: ObjectWriteSession,
    path: VfsPath,
    metadata: Arc<Mutex<VirtualMetadataStore>>,
    persistence: MetadataPersistence,
}

impl DriveWriteHandle {
    /// Accept content bytes; suspends while boundary chunks upload.
    pub async fn write(&mut self, data: &[u8]) -> Result<(), StoreError> {
        self.session.write(data).await
    }

    /// Flush the trailing chunk and commit the finished descriptor.
    pub async fn finish(self) -> Result<EntryStat, StoreError> {
        let descriptor = self.session.finish().await?;
        let stat = {
            let mut store = self.metadata.lock().await;
            store.update_file(&self.path, |file| *file = descriptor)?;
            store.stat(&self.path)?
        };
        self.persistence.mark_dirty();
        Ok(stat)
    }

    /// Abandon the session, committing the chunks uploaded so far so the
    /// caller can delete or retry them explicitly. No automatic rollback.
    pub async fn abort(self) -> Result<(), StoreError> {
        let descriptor = self.session.into_descriptor();
        let uploaded = descriptor.chunks.len();
        {
            let mut store = self.metadata.lock().await;
            store.update_file(&self.path, |file| *file = descriptor)?;
        }
        self.persistence.mark_dirty();
        debug!(path = %self.path, chunks = uploaded, "write aborted");
        Ok(())
    }

    /// Plaintext bytes accepted so far.
    pub fn bytes_accepted(&self) -> u64 {
        self.session.bytes_accepted()
    }

    /// Chunks uploaded so far.
    pub fn chunks_uploaded(&self) -> usize {
        self.session.chunks_uploaded()
    }
}

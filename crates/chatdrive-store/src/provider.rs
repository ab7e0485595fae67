//! The chunked object provider: logical byte streams in, remote objects out.
//!
//! This is the only component that decides where chunk boundaries fall.
//! Writing goes through an [`ObjectWriteSession`]; reading returns an
//! [`ObjectReadStream`] fed by the store's raw read path (reassembly plus
//! optional opening).

use std::sync::Arc;

use chatdrive_core::domain::{FileDescriptor, StoreError};
use chatdrive_core::ports::chunk_store::{ChunkStore, ObjectReadStream, ReadOptions};

use crate::write::ObjectWriteSession;

/// Maps logical file content to bounded chunks over a chunk store.
pub struct ChunkedObjectProvider {
    store: Arc<dyn ChunkStore>,
    capacity_ceiling: Option<u64>,
}

impl ChunkedObjectProvider {
    pub fn new(store: Arc<dyn ChunkStore>, capacity_ceiling: Option<u64>) -> Self {
        Self {
            store,
            capacity_ceiling,
        }
    }

    /// The backend-imposed ceiling on one chunk's raw bytes.
    pub fn max_raw_chunk_size(&self) -> usize {
        self.store.max_raw_chunk_size()
    }

    /// The configured hard ceiling on one file's plaintext size, if any.
    pub fn capacity_ceiling(&self) -> Option<u64> {
        self.capacity_ceiling
    }

    /// The underlying store stack.
    pub fn store(&self) -> &Arc<dyn ChunkStore> {
        &self.store
    }

    /// Open a write session for `descriptor`.
    ///
    /// The session owns the descriptor until [`ObjectWriteSession::finish`]
    /// hands it back with the chunk list and size filled in.
    pub async fn open_write_session(
        &self,
        descriptor: FileDescriptor,
    ) -> Result<ObjectWriteSession, StoreError> {
        let sink = self.store.open_raw_write(&descriptor).await?;
        Ok(ObjectWriteSession::new(
            sink,
            descriptor,
            self.store.max_raw_chunk_size(),
            self.capacity_ceiling,
        ))
    }

    /// Open a read session for `descriptor`.
    ///
    /// A descriptor with zero chunks yields an immediately-ended empty
    /// stream and makes no remote calls.
    pub async fn open_read_session(
        &self,
        descriptor: &FileDescriptor,
        opts: ReadOptions,
    ) -> Result<ObjectReadStream, StoreError> {
        if descriptor.chunks.is_empty() {
            return Ok(ObjectReadStream::empty());
        }
        self.store.open_raw_read(descriptor, opts).await
    }
}

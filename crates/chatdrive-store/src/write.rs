//! Write sessions: accumulating caller writes into bounded chunks.
//!
//! An [`ObjectWriteSession`] accepts writes of arbitrary size and uploads
//! one full chunk per boundary crossing, awaiting each upload before
//! accepting further bytes - callers that produce data faster than chunks
//! upload are throttled by that await.

use bytes::Bytes;
use chrono::Utc;
use tracing::debug;

use chatdrive_core::domain::{FileDescriptor, StoreError};
use chatdrive_core::ports::chunk_store::RawChunkSink;

use crate::buffer::ChunkBuffer;

/// One in-progress write of a file's content.
///
/// Chunk references are appended to the descriptor as their uploads
/// complete. An upload failure aborts the session; chunks already appended
/// stay referenced, and [`ObjectWriteSession::into_descriptor`] hands the
/// partial state back for the caller to clean up explicitly - there is no
/// automatic rollback.
pub struct ObjectWriteSession {
    sink: Box<dyn RawChunkSink>,
    buffer: ChunkBuffer,
    descriptor: FileDescriptor,
    max_raw_chunk_size: usize,
    bytes_accepted: u64,
    capacity_ceiling: Option<u64>,
}

impl ObjectWriteSession {
    pub(crate) fn new(
        sink: Box<dyn RawChunkSink>,
        descriptor: FileDescriptor,
        max_raw_chunk_size: usize,
        capacity_ceiling: Option<u64>,
    ) -> Self {
        Self {
            sink,
            buffer: ChunkBuffer::with_capacity(max_raw_chunk_size),
            descriptor,
            max_raw_chunk_size,
            bytes_accepted: 0,
            capacity_ceiling,
        }
    }

    /// Accept `data`, uploading full chunks as boundaries are crossed.
    ///
    /// Suspends while a boundary chunk uploads; this is the session's
    /// backpressure.
    pub async fn write(&mut self, mut data: &[u8]) -> Result<(), StoreError> {
        if let Some(ceiling) = self.capacity_ceiling {
            let would_be = self.bytes_accepted + data.len() as u64;
            if would_be > ceiling {
                return Err(StoreError::CapacityExceeded {
                    written: would_be,
                    ceiling,
                });
            }
        }
        self.bytes_accepted += data.len() as u64;

        while !data.is_empty() {
            let room = self.max_raw_chunk_size - self.buffer.len();
            let take = room.min(data.len());
            self.buffer.write(&data[..take]);
            data = &data[take..];

            if self.buffer.len() == self.max_raw_chunk_size {
                self.upload_buffered_chunk().await?;
            }
        }
        Ok(())
    }

    /// Flush the trailing partial chunk and finalize the descriptor.
    ///
    /// The descriptor's size is the total plaintext bytes observed by the
    /// session, and its modification timestamp is refreshed.
    pub async fn finish(mut self) -> Result<FileDescriptor, StoreError> {
        if !self.buffer.is_empty() {
            self.upload_buffered_chunk().await?;
        }
        self.descriptor.size = self.bytes_accepted;
        self.descriptor.modified = Utc::now();
        debug!(
            file = %self.descriptor.name,
            size = self.descriptor.size,
            chunks = self.descriptor.chunks.len(),
            "write session finished"
        );
        Ok(self.descriptor)
    }

    /// Give up the session and return the descriptor as it stands:
    /// chunks uploaded so far referenced, size covering only the bytes
    /// those chunks hold.
    pub fn into_descriptor(mut self) -> FileDescriptor {
        self.descriptor.size = self.bytes_accepted - self.buffer.len() as u64;
        self.descriptor
    }

    /// Total plaintext bytes accepted so far.
    pub fn bytes_accepted(&self) -> u64 {
        self.bytes_accepted
    }

    /// Chunks uploaded so far.
    pub fn chunks_uploaded(&self) -> usize {
        self.descriptor.chunks.len()
    }

    async fn upload_buffered_chunk(&mut self) -> Result<(), StoreError> {
        let block = self.buffer.flush();
        let chunk = self.sink.put_chunk(Bytes::from(block)).await?;
        debug!(
            file = %self.descriptor.name,
            index = self.descriptor.chunks.len(),
            stored = chunk.size,
            "chunk uploaded"
        );
        self.descriptor.chunks.push(chunk);
        Ok(())
    }
}

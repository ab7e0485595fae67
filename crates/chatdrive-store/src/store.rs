//! The chunk store stack.
//!
//! [`RemoteChunkStore`] is the concrete backend: one remote object per raw
//! chunk, reads through the [`ChunkStreamReassembler`], deletions through
//! the [`DeletionQueue`]. [`CipherChunkStore`] decorates any [`ChunkStore`]
//! with per-chunk sealing, leaving chunk-boundary logic untouched: the
//! session layer hands complete blocks down, the decorator seals each block
//! 1:1 into one stored object.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::debug;

use chatdrive_core::domain::{ChunkRef, DeletionEntry, FileDescriptor, StoreError};
use chatdrive_core::ports::chunk_channel::RemoteChunkChannel;
use chatdrive_core::ports::chunk_store::{
    ChunkStore, ObjectReadStream, RawChunkSink, ReadOptions,
};

use crate::buffer::ChunkBuffer;
use crate::cipher::{StoreKey, StreamingCipher};
use crate::deletion::DeletionQueue;
use crate::read::ChunkStreamReassembler;

// ============================================================================
// RemoteChunkStore
// ============================================================================

/// Concrete chunk store over a remote channel.
pub struct RemoteChunkStore {
    channel: Arc<dyn RemoteChunkChannel>,
    queue: Arc<DeletionQueue>,
    max_raw_chunk_size: usize,
}

impl RemoteChunkStore {
    pub fn new(channel: Arc<dyn RemoteChunkChannel>, max_raw_chunk_size: usize) -> Self {
        Self {
            channel,
            queue: Arc::new(DeletionQueue::new()),
            max_raw_chunk_size,
        }
    }

    /// The underlying channel.
    pub fn channel(&self) -> &Arc<dyn RemoteChunkChannel> {
        &self.channel
    }

    /// The pending-deletion queue.
    pub fn deletion_queue(&self) -> &Arc<DeletionQueue> {
        &self.queue
    }
}

#[async_trait::async_trait]
impl ChunkStore for RemoteChunkStore {
    fn max_raw_chunk_size(&self) -> usize {
        self.max_raw_chunk_size
    }

    async fn open_raw_write(
        &self,
        file: &FileDescriptor,
    ) -> Result<Box<dyn RawChunkSink>, StoreError> {
        Ok(Box::new(RemoteChunkSink {
            channel: Arc::clone(&self.channel),
            descriptor: file.clone(),
            index: file.chunks.len(),
        }))
    }

    async fn open_raw_read(
        &self,
        file: &FileDescriptor,
        opts: ReadOptions,
    ) -> Result<ObjectReadStream, StoreError> {
        let reassembler = ChunkStreamReassembler::new(
            Arc::clone(&self.channel),
            file.container.clone(),
            file.chunks.clone(),
        );
        Ok(reassembler.spawn(opts))
    }

    fn enqueue_removal(&self, entries: Vec<DeletionEntry>) {
        self.queue.enqueue(entries);
    }

    async fn process_deletion_queue(&self) {
        self.queue.drain_one(self.channel.as_ref()).await;
    }
}

/// Uploads one remote object per complete raw chunk.
struct RemoteChunkSink {
    channel: Arc<dyn RemoteChunkChannel>,
    descriptor: FileDescriptor,
    index: usize,
}

#[async_trait::async_trait]
impl RawChunkSink for RemoteChunkSink {
    async fn put_chunk(&mut self, payload: Bytes) -> Result<ChunkRef, StoreError> {
        let hint = self.descriptor.chunk_name_hint(self.index);
        let size = payload.len() as u64;
        let stored = self
            .channel
            .send_object(&self.descriptor.container, payload, &hint)
            .await?;
        self.index += 1;
        Ok(ChunkRef {
            id: stored.id,
            size,
        })
    }
}

// ============================================================================
// CipherChunkStore
// ============================================================================

/// Decorator sealing every chunk of encrypted files.
///
/// Unencrypted descriptors pass straight through to the inner store, so one
/// stack serves mixed content.
pub struct CipherChunkStore<S: ChunkStore> {
    inner: S,
    key: StoreKey,
}

impl<S: ChunkStore> CipherChunkStore<S> {
    pub fn new(inner: S, key: StoreKey) -> Self {
        Self { inner, key }
    }

    fn file_cipher(&self, file: &FileDescriptor) -> Result<StreamingCipher, StoreError> {
        let iv = file.iv.ok_or_else(|| {
            StoreError::InvariantViolation(format!(
                "encrypted descriptor '{}' is missing its iv",
                file.name
            ))
        })?;
        Ok(StreamingCipher::new(&self.key, iv))
    }
}

#[async_trait::async_trait]
impl<S: ChunkStore> ChunkStore for CipherChunkStore<S> {
    fn max_raw_chunk_size(&self) -> usize {
        self.inner.max_raw_chunk_size()
    }

    async fn open_raw_write(
        &self,
        file: &FileDescriptor,
    ) -> Result<Box<dyn RawChunkSink>, StoreError> {
        let inner = self.inner.open_raw_write(file).await?;
        if !file.encrypted {
            return Ok(inner);
        }
        Ok(Box::new(SealingSink {
            inner,
            cipher: self.file_cipher(file)?,
        }))
    }

    async fn open_raw_read(
        &self,
        file: &FileDescriptor,
        opts: ReadOptions,
    ) -> Result<ObjectReadStream, StoreError> {
        if !file.encrypted {
            return self.inner.open_raw_read(file, opts).await;
        }
        let cipher = self.file_cipher(file)?;
        let cancel = opts.cancel.clone();
        let sealed = self.inner.open_raw_read(file, opts).await?;
        let sizes: Vec<u64> = file.chunks.iter().map(|c| c.size).collect();
        Ok(spawn_opening_adapter(sealed, cipher, sizes, cancel))
    }

    fn enqueue_removal(&self, entries: Vec<DeletionEntry>) {
        self.inner.enqueue_removal(entries);
    }

    async fn process_deletion_queue(&self) {
        self.inner.process_deletion_queue().await;
    }
}

/// Seals each complete block into exactly one stored object.
struct SealingSink {
    inner: Box<dyn RawChunkSink>,
    cipher: StreamingCipher,
}

#[async_trait::async_trait]
impl RawChunkSink for SealingSink {
    async fn put_chunk(&mut self, payload: Bytes) -> Result<ChunkRef, StoreError> {
        let sealed = self.cipher.encrypt_block(&payload)?;
        self.inner.put_chunk(Bytes::from(sealed)).await
    }
}

/// Re-chunk the sealed stream at stored chunk boundaries and open each block.
///
/// Decryption operates per chunk, never per arbitrary read: ciphertext is
/// accumulated to one chunk's stored length (block plus tag) before the tag
/// can verify.
fn spawn_opening_adapter(
    mut sealed: ObjectReadStream,
    cipher: StreamingCipher,
    sizes: Vec<u64>,
    cancel: tokio_util::sync::CancellationToken,
) -> ObjectReadStream {
    let (tx, rx) = mpsc::channel(1);
    let stream_cancel = cancel.clone();

    tokio::spawn(async move {
        let mut buffer = ChunkBuffer::new();
        'chunks: for (index, size) in sizes.iter().enumerate() {
            let want = *size as usize;
            while buffer.len() < want {
                match sealed.next().await {
                    Some(Ok(bytes)) => buffer.write(&bytes),
                    Some(Err(err)) => {
                        let _ = tx.send(Err(err)).await;
                        return;
                    }
                    None => {
                        if cancel.is_cancelled() {
                            return;
                        }
                        let _ = tx
                            .send(Err(StoreError::RemoteTransport(format!(
                                "sealed stream ended inside chunk {index}"
                            ))))
                            .await;
                        return;
                    }
                }
            }

            let block = buffer.take(want);
            match cipher.decrypt_block(&block) {
                Ok(plaintext) => {
                    debug!(chunk = index, bytes = plaintext.len(), "chunk opened");
                    if tx.send(Ok(Bytes::from(plaintext))).await.is_err() {
                        break 'chunks;
                    }
                }
                Err(err) => {
                    let _ = tx.send(Err(err)).await;
                    return;
                }
            }
        }
    });

    ObjectReadStream::new(rx, stream_cancel)
}

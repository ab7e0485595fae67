//! Chunk store port
//!
//! The interface between the virtual filesystem and the chunked object
//! store. One concrete implementation uploads raw chunks through the remote
//! channel; an encrypting decorator can wrap any implementation.
//!
//! ## Contract
//!
//! - [`RawChunkSink::put_chunk`] uploads exactly one complete raw chunk as
//!   one remote object per call. Accumulating caller writes into chunks is
//!   the session layer's job, never the sink's - this is what allows an
//!   encrypting decorator to seal whole blocks without them being re-split.
//! - [`ChunkStore::open_raw_read`] yields the stored bytes of every chunk in
//!   descriptor order, one chunk in flight at a time.

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::domain::descriptor::{DeletionEntry, FileDescriptor};
use crate::domain::errors::StoreError;

/// Progress callback, invoked with `(bytes_so_far, total_bytes)`.
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send + Sync>;

/// Options for a read session.
pub struct ReadOptions {
    /// Cancellation flag, checked before each chunk and before acting on
    /// any in-flight network event
    pub cancel: CancellationToken,
    /// Optional progress observer; informational only
    pub progress: Option<ProgressFn>,
}

impl ReadOptions {
    /// Options with a fresh token and no progress observer.
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            progress: None,
        }
    }

    /// Attach a progress observer.
    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Use an externally owned cancellation token.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// ObjectReadStream
// ============================================================================

/// One continuous byte stream reconstructed from a file's chunks.
///
/// Pieces arrive in content order through a bounded channel; the producer
/// task cannot run ahead of the consumer by more than the channel capacity,
/// which keeps memory bounded to roughly one chunk.
pub struct ObjectReadStream {
    rx: mpsc::Receiver<Result<Bytes, StoreError>>,
    cancel: CancellationToken,
}

impl ObjectReadStream {
    /// Wrap a producer channel and its cancellation token.
    pub fn new(rx: mpsc::Receiver<Result<Bytes, StoreError>>, cancel: CancellationToken) -> Self {
        Self { rx, cancel }
    }

    /// An already-ended empty stream (zero-length file, no remote calls).
    pub fn empty() -> Self {
        let (_tx, rx) = mpsc::channel(1);
        Self {
            rx,
            cancel: CancellationToken::new(),
        }
    }

    /// Next piece of content, `None` once the stream has ended.
    pub async fn next(&mut self) -> Option<Result<Bytes, StoreError>> {
        self.rx.recv().await
    }

    /// Request cancellation; the producer stops before its next chunk or
    /// in-flight event.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Drain the stream into one buffer. Intended for small files and tests.
    pub async fn read_to_end(mut self) -> Result<Vec<u8>, StoreError> {
        let mut out = Vec::new();
        while let Some(piece) = self.next().await {
            out.extend_from_slice(&piece?);
        }
        Ok(out)
    }
}

// ============================================================================
// Sink and store traits
// ============================================================================

/// Upload side of a raw write session.
#[async_trait::async_trait]
pub trait RawChunkSink: Send {
    /// Upload exactly one complete raw chunk as one remote object and
    /// return its reference. Calls are strictly sequential.
    async fn put_chunk(&mut self, payload: Bytes) -> Result<crate::domain::ChunkRef, StoreError>;
}

/// Port trait for the chunk store stack.
///
/// `max_raw_chunk_size` is the plaintext chunk capacity; an encrypting
/// decorator stores `capacity + 16` bytes per full chunk and relies on the
/// configured capacity leaving that headroom below the backend's hard
/// attachment limit.
#[async_trait::async_trait]
pub trait ChunkStore: Send + Sync {
    /// Backend-imposed ceiling on the raw bytes of one chunk.
    fn max_raw_chunk_size(&self) -> usize;

    /// Open a raw write session for `file`; one object per `put_chunk`.
    async fn open_raw_write(
        &self,
        file: &FileDescriptor,
    ) -> Result<Box<dyn RawChunkSink>, StoreError>;

    /// Stream the stored bytes of `file`'s chunks, in order.
    async fn open_raw_read(
        &self,
        file: &FileDescriptor,
        opts: ReadOptions,
    ) -> Result<ObjectReadStream, StoreError>;

    /// Queue orphaned chunks for rate-limit-safe deletion.
    fn enqueue_removal(&self, entries: Vec<DeletionEntry>);

    /// Drain at most one pending deletion. Driven by a fixed-interval tick.
    async fn process_deletion_queue(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_stream_ends_immediately() {
        let mut stream = ObjectReadStream::empty();
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_read_to_end_concatenates_in_order() {
        let (tx, rx) = mpsc::channel(1);
        let stream = ObjectReadStream::new(rx, CancellationToken::new());

        tokio::spawn(async move {
            tx.send(Ok(Bytes::from_static(b"hello "))).await.unwrap();
            tx.send(Ok(Bytes::from_static(b"world"))).await.unwrap();
        });

        assert_eq!(stream.read_to_end().await.unwrap(), b"hello world");
    }

    #[tokio::test]
    async fn test_read_to_end_surfaces_error() {
        let (tx, rx) = mpsc::channel(1);
        let stream = ObjectReadStream::new(rx, CancellationToken::new());

        tokio::spawn(async move {
            tx.send(Ok(Bytes::from_static(b"partial"))).await.unwrap();
            tx.send(Err(StoreError::RemoteTransport("reset".to_string())))
                .await
                .unwrap();
        });

        assert_eq!(
            stream.read_to_end().await,
            Err(StoreError::RemoteTransport("reset".to_string()))
        );
    }

    #[tokio::test]
    async fn test_cancel_is_visible_to_producer() {
        let (_tx, rx) = mpsc::channel::<Result<Bytes, StoreError>>(1);
        let token = CancellationToken::new();
        let stream = ObjectReadStream::new(rx, token.clone());

        assert!(!token.is_cancelled());
        stream.cancel();
        assert!(token.is_cancelled());
    }
}

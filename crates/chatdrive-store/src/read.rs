//! Ordered chunk reassembly.
//!
//! Given the ordered chunk list of one file, produce a single byte stream
//! identical to the concatenation of each chunk's remote content. The walk
//! is strictly sequential: chunk `i + 1` is not resolved until chunk `i` has
//! fully arrived, which bounds in-flight data to roughly one chunk and
//! preserves ordering without any reordering buffer.
//!
//! Download URLs are ephemeral: they are re-resolved immediately before
//! every fetch attempt and never reused across chunks or retries.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use chatdrive_core::domain::{ChunkRef, ContainerId, StoreError};
use chatdrive_core::ports::chunk_channel::{ChannelError, ObjectBytes, RemoteChunkChannel};
use chatdrive_core::ports::chunk_store::{ObjectReadStream, ReadOptions};

/// Capacity of the reassembled-output channel. One slot keeps the producer
/// at most one piece ahead of the consumer.
const OUTPUT_CAPACITY: usize = 1;

/// Transport-level attempts per chunk before the stream fails.
const MAX_CHUNK_FETCH_ATTEMPTS: u32 = 3;

/// Why the reassembly loop stopped early.
enum StreamEnd {
    /// Cancellation requested; the stream ends cleanly.
    Cancelled,
    /// The consumer dropped the stream.
    Closed,
    /// A chunk failed; the error is forwarded to the consumer.
    Failed(StoreError),
}

/// Sequentially resolves and streams an ordered list of chunk references.
pub struct ChunkStreamReassembler {
    channel: Arc<dyn RemoteChunkChannel>,
    container: ContainerId,
    chunks: Vec<ChunkRef>,
}

impl ChunkStreamReassembler {
    pub fn new(
        channel: Arc<dyn RemoteChunkChannel>,
        container: ContainerId,
        chunks: Vec<ChunkRef>,
    ) -> Self {
        Self {
            channel,
            container,
            chunks,
        }
    }

    /// Start the reassembly task and return its output stream.
    ///
    /// Zero chunks yield an already-ended stream without any network call.
    pub fn spawn(self, opts: ReadOptions) -> ObjectReadStream {
        if self.chunks.is_empty() {
            return ObjectReadStream::empty();
        }
        let (tx, rx) = mpsc::channel(OUTPUT_CAPACITY);
        let cancel = opts.cancel.clone();
        tokio::spawn(self.run(tx, opts));
        ObjectReadStream::new(rx, cancel)
    }

    async fn run(self, tx: mpsc::Sender<Result<Bytes, StoreError>>, opts: ReadOptions) {
        let total: u64 = self.chunks.iter().map(|c| c.size).sum();
        let mut delivered: u64 = 0;

        for (index, chunk) in self.chunks.iter().enumerate() {
            if opts.cancel.is_cancelled() {
                debug!(chunk = index, "read cancelled before chunk");
                return;
            }
            match self
                .stream_chunk(index, chunk, &tx, &opts, total, &mut delivered)
                .await
            {
                Ok(()) => {}
                Err(StreamEnd::Cancelled) => {
                    debug!(chunk = index, "read cancelled mid-chunk");
                    return;
                }
                Err(StreamEnd::Closed) => return,
                Err(StreamEnd::Failed(err)) => {
                    let _ = tx.send(Err(err)).await;
                    return;
                }
            }
        }
    }

    /// Stream one chunk's bytes to the output, verifying its recorded size.
    async fn stream_chunk(
        &self,
        index: usize,
        chunk: &ChunkRef,
        tx: &mpsc::Sender<Result<Bytes, StoreError>>,
        opts: &ReadOptions,
        total: u64,
        delivered: &mut u64,
    ) -> Result<(), StreamEnd> {
        let mut pieces = self
            .open_chunk(index, chunk)
            .await
            .map_err(StreamEnd::Failed)?;

        let mut received: u64 = 0;
        loop {
            let piece = tokio::select! {
                _ = opts.cancel.cancelled() => return Err(StreamEnd::Cancelled),
                piece = pieces.recv() => piece,
            };
            match piece {
                None => break,
                Some(Err(err)) => return Err(StreamEnd::Failed(err.into())),
                Some(Ok(bytes)) => {
                    received += bytes.len() as u64;
                    if received > chunk.size {
                        return Err(StreamEnd::Failed(StoreError::RemoteTransport(format!(
                            "chunk {} returned {received} bytes, expected {}",
                            chunk.id, chunk.size
                        ))));
                    }
                    *delivered += bytes.len() as u64;
                    if tx.send(Ok(bytes)).await.is_err() {
                        return Err(StreamEnd::Closed);
                    }
                    if let Some(progress) = &opts.progress {
                        progress(*delivered, total);
                    }
                }
            }
        }

        if received != chunk.size {
            return Err(StreamEnd::Failed(StoreError::RemoteTransport(format!(
                "chunk {} ended after {received} bytes, expected {}",
                chunk.id, chunk.size
            ))));
        }
        debug!(chunk = index, bytes = received, "chunk reassembled");
        Ok(())
    }

    /// Resolve a fresh URL and open the download for one chunk.
    ///
    /// Transport failures are retried here, and only here, up to
    /// [`MAX_CHUNK_FETCH_ATTEMPTS`] times; the URL is re-resolved on every
    /// attempt. `NotFound` is terminal - retrying cannot create the object.
    async fn open_chunk(&self, index: usize, chunk: &ChunkRef) -> Result<ObjectBytes, StoreError> {
        let mut last_error = None;
        for attempt in 1..=MAX_CHUNK_FETCH_ATTEMPTS {
            let url = match self.channel.fetch_object_url(&self.container, &chunk.id).await {
                Ok(url) => url,
                Err(err @ ChannelError::NotFound(_)) => return Err(err.into()),
                Err(ChannelError::Transport(reason)) => {
                    warn!(chunk = index, attempt, %reason, "url resolution failed");
                    last_error = Some(StoreError::RemoteTransport(reason));
                    continue;
                }
            };
            match self.channel.fetch_object(&url).await {
                Ok(pieces) => return Ok(pieces),
                Err(err @ ChannelError::NotFound(_)) => return Err(err.into()),
                Err(ChannelError::Transport(reason)) => {
                    warn!(chunk = index, attempt, %reason, "chunk fetch failed");
                    last_error = Some(StoreError::RemoteTransport(reason));
                }
            }
        }
        Err(last_error.unwrap_or_else(|| {
            StoreError::RemoteTransport(format!("chunk {} unreachable", chunk.id))
        }))
    }
}

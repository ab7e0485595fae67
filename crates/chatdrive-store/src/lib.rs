//! chatdrive Store - the chunked encrypted streaming object store
//!
//! Turns one logical file read/write into an ordered sequence of bounded,
//! independently sealed remote objects:
//!
//! - [`ChunkBuffer`] - byte accumulator with exact-size flush semantics
//! - [`StreamingCipher`] - per-file AES-256-GCM block sealing
//! - [`ChunkedObjectProvider`] - maps byte streams to chunk boundaries
//! - [`ChunkStreamReassembler`] - ordered, cancellable, memory-bounded reads
//! - [`DeletionQueue`] - rate-limit-safe deferred remote deletion
//! - [`RemoteChunkStore`] / [`CipherChunkStore`] - the store stack over any
//!   remote channel, with encryption as a decorator
//! - [`MemoryChunkChannel`] - in-memory backend for tests and development

pub mod buffer;
pub mod cipher;
pub mod deletion;
pub mod memory;
pub mod provider;
pub mod read;
pub mod store;
pub mod write;

pub use buffer::ChunkBuffer;
pub use cipher::{generate_iv, StoreKey, StreamingCipher};
pub use deletion::{spawn_deletion_ticker, DeletionQueue};
pub use memory::{ChannelCounters, MemoryChunkChannel};
pub use provider::ChunkedObjectProvider;
pub use read::ChunkStreamReassembler;
pub use store::{CipherChunkStore, RemoteChunkStore};
pub use write::ObjectWriteSession;

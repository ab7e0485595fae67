//! Port definitions (driven/secondary ports)
//!
//! Traits implemented by adapter crates: the remote message backend channel
//! and the chunk store stack layered on top of it.

pub mod chunk_channel;
pub mod chunk_store;

pub use chunk_channel::{ChannelError, DeleteOutcome, ObjectBytes, RemoteChunkChannel, StoredObject};
pub use chunk_store::{ChunkStore, ObjectReadStream, ProgressFn, RawChunkSink, ReadOptions};

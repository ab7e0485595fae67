//! chatdrive VFS - the path-addressed metadata layer
//!
//! - [`VirtualMetadataStore`] - a path-addressed tree of directory and file
//!   nodes with a derived path index, serialized as one document
//! - [`MetadataPersistence`] - debounced save of the store to the remote
//!   backend, with a local fallback snapshot and deterministic startup load
//! - [`Drive`] - the facade the file-access-protocol layer calls: stat,
//!   list, read/write streams, remove, move, rename, mkdir

pub mod drive;
pub mod persistence;
pub mod tree;

pub use drive::{Drive, DriveWriteHandle};
pub use persistence::MetadataPersistence;
pub use tree::{ChildEntry, EntryStat, MetadataDocument, VirtualMetadataStore};

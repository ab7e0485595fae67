//! Domain module - entities and value types shared by every crate
//!
//! Contains the file/chunk data model, validated newtypes for identifiers
//! and paths, and the error taxonomy.

pub mod descriptor;
pub mod errors;
pub mod newtypes;

pub use descriptor::{ChunkRef, DeletionEntry, FileDescriptor, IV_LEN, TAG_OVERHEAD};
pub use errors::StoreError;
pub use newtypes::{ContainerId, ObjectId, VfsPath};

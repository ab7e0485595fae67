//! Remote chunk channel port (driven/secondary port)
//!
//! The interface to the message-oriented remote backend. The primary
//! implementation lives in the relay crate and talks to a rate-limited REST
//! API; an in-memory implementation in the store crate backs tests and local
//! development.
//!
//! ## Design Notes
//!
//! - Download URLs are ephemeral: `fetch_object_url` must be called anew
//!   before every fetch attempt and its result never cached.
//! - `delete_object` is idempotent from the caller's perspective:
//!   [`DeleteOutcome::NotFound`] means already deleted.
//! - Object bytes travel through a bounded channel so a slow consumer
//!   naturally throttles the producer.

use bytes::Bytes;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::domain::errors::StoreError;
use crate::domain::newtypes::{ContainerId, ObjectId};

/// Errors crossing the channel boundary
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// The referenced object or document does not exist remotely
    #[error("remote object not found: {0}")]
    NotFound(String),

    /// Network, timeout, or protocol failure talking to the backend
    #[error("transport failure: {0}")]
    Transport(String),
}

impl From<ChannelError> for StoreError {
    fn from(err: ChannelError) -> Self {
        match err {
            ChannelError::NotFound(what) => StoreError::NotFound(what),
            ChannelError::Transport(what) => StoreError::RemoteTransport(what),
        }
    }
}

/// Receiver side of one object download; pieces arrive in content order.
pub type ObjectBytes = mpsc::Receiver<Result<Bytes, ChannelError>>;

/// Result of storing one object in a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Opaque reference to the created object
    pub id: ObjectId,
    /// Download URL valid immediately after the upload (may expire)
    pub download_url: String,
}

/// Outcome of a remote delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The object existed and was deleted
    Deleted,
    /// The object was already gone - treated as success
    NotFound,
}

/// Port trait for the message-oriented remote backend.
#[async_trait::async_trait]
pub trait RemoteChunkChannel: Send + Sync {
    /// Create one remote object from `payload` in the given container.
    ///
    /// `name_hint` carries the owning file's truncated name plus a chunk
    /// index so operators can recognize objects on the backend side.
    async fn send_object(
        &self,
        container: &ContainerId,
        payload: Bytes,
        name_hint: &str,
    ) -> Result<StoredObject, ChannelError>;

    /// Resolve a fresh, possibly short-lived download URL for an object.
    async fn fetch_object_url(
        &self,
        container: &ContainerId,
        object: &ObjectId,
    ) -> Result<String, ChannelError>;

    /// Start downloading an object's bytes from a previously resolved URL.
    async fn fetch_object(&self, url: &str) -> Result<ObjectBytes, ChannelError>;

    /// Delete one object. `NotFound` counts as already deleted.
    async fn delete_object(
        &self,
        container: &ContainerId,
        object: &ObjectId,
    ) -> Result<DeleteOutcome, ChannelError>;

    /// Fetch the single persisted metadata document, if any.
    ///
    /// Implementations must fail with [`ChannelError::Transport`] when more
    /// than one candidate document exists remotely - that indicates external
    /// corruption the store cannot resolve on its own.
    async fn load_metadata(&self) -> Result<Option<Bytes>, ChannelError>;

    /// Store the metadata document at its well-known location,
    /// replacing any previous version in place.
    async fn store_metadata(&self, document: Bytes) -> Result<(), ChannelError>;
}

//! In-memory remote channel backend.
//!
//! Implements [`RemoteChunkChannel`] against process-local state. Used as
//! the development backend and as the test double for the store and vfs
//! crates. Call counters and failure injection make boundary behavior
//! observable without a network.

use std::collections::HashMap;
use std::sync::Mutex;

use bytes::Bytes;
use tokio::sync::mpsc;
use uuid::Uuid;

use chatdrive_core::domain::{ContainerId, ObjectId};
use chatdrive_core::ports::chunk_channel::{
    ChannelError, DeleteOutcome, ObjectBytes, RemoteChunkChannel, StoredObject,
};

/// Default split size for streamed downloads.
const DEFAULT_PIECE_SIZE: usize = 64 * 1024;

/// Per-method call counts, for assertions and debugging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelCounters {
    pub sends: u64,
    pub url_resolutions: u64,
    pub fetches: u64,
    pub deletes: u64,
    pub metadata_loads: u64,
    pub metadata_stores: u64,
}

#[derive(Debug)]
struct StoredPayload {
    container: ContainerId,
    name_hint: String,
    data: Bytes,
}

#[derive(Default)]
struct MemoryState {
    objects: HashMap<String, StoredPayload>,
    metadata: Option<Bytes>,
    counters: ChannelCounters,
    fail_fetches: u32,
    fail_sends: u32,
    fail_metadata_stores: u32,
}

/// Process-local [`RemoteChunkChannel`] implementation.
pub struct MemoryChunkChannel {
    state: Mutex<MemoryState>,
    piece_size: usize,
}

impl MemoryChunkChannel {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            piece_size: DEFAULT_PIECE_SIZE,
        }
    }

    /// Split streamed downloads into pieces of `size` bytes. Small values
    /// exercise piece-boundary handling in tests.
    pub fn with_piece_size(mut self, size: usize) -> Self {
        assert!(size > 0, "piece size must be positive");
        self.piece_size = size;
        self
    }

    /// Snapshot of the per-method call counts.
    pub fn counters(&self) -> ChannelCounters {
        self.state.lock().unwrap().counters
    }

    /// Number of objects currently stored.
    pub fn object_count(&self) -> usize {
        self.state.lock().unwrap().objects.len()
    }

    /// Stored bytes of one object, if present.
    pub fn object_data(&self, object: &ObjectId) -> Option<Bytes> {
        self.state
            .lock()
            .unwrap()
            .objects
            .get(object.as_str())
            .map(|p| p.data.clone())
    }

    /// Name hint recorded for one object, if present.
    pub fn object_name_hint(&self, object: &ObjectId) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .objects
            .get(object.as_str())
            .map(|p| p.name_hint.clone())
    }

    /// Make the next `count` `fetch_object` calls fail with a transport error.
    pub fn fail_next_fetches(&self, count: u32) {
        self.state.lock().unwrap().fail_fetches = count;
    }

    /// Make the next `count` `send_object` calls fail with a transport error.
    pub fn fail_next_sends(&self, count: u32) {
        self.state.lock().unwrap().fail_sends = count;
    }

    /// Make the next `count` `store_metadata` calls fail with a transport error.
    pub fn fail_next_metadata_stores(&self, count: u32) {
        self.state.lock().unwrap().fail_metadata_stores = count;
    }
}

impl Default for MemoryChunkChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl RemoteChunkChannel for MemoryChunkChannel {
    async fn send_object(
        &self,
        container: &ContainerId,
        payload: Bytes,
        name_hint: &str,
    ) -> Result<StoredObject, ChannelError> {
        let mut state = self.state.lock().unwrap();
        state.counters.sends += 1;
        if state.fail_sends > 0 {
            state.fail_sends -= 1;
            return Err(ChannelError::Transport("injected send failure".to_string()));
        }

        let id = Uuid::new_v4().to_string();
        state.objects.insert(
            id.clone(),
            StoredPayload {
                container: container.clone(),
                name_hint: name_hint.to_string(),
                data: payload,
            },
        );
        Ok(StoredObject {
            id: ObjectId::new(id.clone()).expect("uuid is non-empty"),
            download_url: format!("mem://objects/{id}?r=0"),
        })
    }

    async fn fetch_object_url(
        &self,
        _container: &ContainerId,
        object: &ObjectId,
    ) -> Result<String, ChannelError> {
        let mut state = self.state.lock().unwrap();
        state.counters.url_resolutions += 1;
        if !state.objects.contains_key(object.as_str()) {
            return Err(ChannelError::NotFound(format!("object {object}")));
        }
        // A distinct URL per resolution, mirroring ephemeral backend links.
        Ok(format!(
            "mem://objects/{object}?r={}",
            state.counters.url_resolutions
        ))
    }

    async fn fetch_object(&self, url: &str) -> Result<ObjectBytes, ChannelError> {
        let data = {
            let mut state = self.state.lock().unwrap();
            state.counters.fetches += 1;
            if state.fail_fetches > 0 {
                state.fail_fetches -= 1;
                return Err(ChannelError::Transport(
                    "injected fetch failure".to_string(),
                ));
            }

            let id = url
                .strip_prefix("mem://objects/")
                .and_then(|rest| rest.split('?').next())
                .ok_or_else(|| ChannelError::Transport(format!("unrecognized url {url}")))?;
            state
                .objects
                .get(id)
                .map(|p| p.data.clone())
                .ok_or_else(|| ChannelError::NotFound(format!("object {id}")))?
        };

        let (tx, rx) = mpsc::channel(4);
        let piece_size = self.piece_size;
        tokio::spawn(async move {
            let mut offset = 0;
            while offset < data.len() {
                let end = (offset + piece_size).min(data.len());
                if tx.send(Ok(data.slice(offset..end))).await.is_err() {
                    return;
                }
                offset = end;
            }
        });
        Ok(rx)
    }

    async fn delete_object(
        &self,
        _container: &ContainerId,
        object: &ObjectId,
    ) -> Result<DeleteOutcome, ChannelError> {
        let mut state = self.state.lock().unwrap();
        state.counters.deletes += 1;
        match state.objects.remove(object.as_str()) {
            Some(_) => Ok(DeleteOutcome::Deleted),
            None => Ok(DeleteOutcome::NotFound),
        }
    }

    async fn load_metadata(&self) -> Result<Option<Bytes>, ChannelError> {
        let mut state = self.state.lock().unwrap();
        state.counters.metadata_loads += 1;
        Ok(state.metadata.clone())
    }

    async fn store_metadata(&self, document: Bytes) -> Result<(), ChannelError> {
        let mut state = self.state.lock().unwrap();
        state.counters.metadata_stores += 1;
        if state.fail_metadata_stores > 0 {
            state.fail_metadata_stores -= 1;
            return Err(ChannelError::Transport(
                "injected metadata store failure".to_string(),
            ));
        }
        state.metadata = Some(document);
        Ok(())
    }
}

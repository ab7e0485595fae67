//! File descriptors and chunk references
//!
//! A [`FileDescriptor`] is the metadata record for one logical file: plaintext
//! size, timestamps, encryption state, and the ordered chunk list. The order
//! of [`ChunkRef`]s is the byte order of the reconstructed content.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::{ContainerId, ObjectId};

/// Fixed AEAD authentication tag length appended to every sealed block.
pub const TAG_OVERHEAD: usize = 16;

/// Length of the per-file initialization vector.
pub const IV_LEN: usize = 16;

/// Maximum file-name prefix carried in a chunk's remote name hint.
const NAME_HINT_MAX: usize = 24;

// ============================================================================
// ChunkRef
// ============================================================================

/// Reference to one stored chunk.
///
/// `size` is the number of bytes actually stored for this chunk: the
/// ciphertext size (plaintext block + [`TAG_OVERHEAD`]) when the owning file
/// is encrypted, the plaintext size otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRef {
    /// Opaque remote-object reference
    pub id: ObjectId,
    /// Stored byte count for this chunk
    pub size: u64,
}

// ============================================================================
// DeletionEntry
// ============================================================================

/// One pending remote-object deletion, consumed by the deletion queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionEntry {
    /// Remote container holding the object
    pub container: ContainerId,
    /// The object to delete
    pub object: ObjectId,
}

// ============================================================================
// FileDescriptor
// ============================================================================

/// Metadata record for one logical file.
///
/// `size` is always the plaintext byte length - the authoritative size seen
/// by callers. The stored total can be larger when the file is encrypted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    /// Leaf name, unique within the parent directory
    pub name: String,
    /// Plaintext length in bytes
    pub size: u64,
    /// Creation timestamp
    pub created: DateTime<Utc>,
    /// Last content modification timestamp
    pub modified: DateTime<Utc>,
    /// Whether chunk payloads are sealed with the store cipher
    pub encrypted: bool,
    /// Per-file initialization vector, present only when encrypted
    #[serde(default, skip_serializing_if = "Option::is_none", with = "iv_hex")]
    pub iv: Option<[u8; IV_LEN]>,
    /// Ordered chunk sequence; order is content byte order
    pub chunks: Vec<ChunkRef>,
    /// Remote container the chunks live in
    #[serde(rename = "containerId")]
    pub container: ContainerId,
}

impl FileDescriptor {
    /// Create an empty, unencrypted descriptor (zero chunks, size 0).
    pub fn new(name: impl Into<String>, container: ContainerId) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            size: 0,
            created: now,
            modified: now,
            encrypted: false,
            iv: None,
            chunks: Vec::new(),
            container,
        }
    }

    /// Create an empty encrypted descriptor carrying its freshly drawn IV.
    pub fn new_encrypted(
        name: impl Into<String>,
        container: ContainerId,
        iv: [u8; IV_LEN],
    ) -> Self {
        let mut descriptor = Self::new(name, container);
        descriptor.encrypted = true;
        descriptor.iv = Some(iv);
        descriptor
    }

    /// Total bytes held remotely for this file (ciphertext when encrypted).
    pub fn stored_size(&self) -> u64 {
        self.chunks.iter().map(|c| c.size).sum()
    }

    /// The size the access protocol should report remotely.
    ///
    /// With encryption enabled the stored total includes one tag per chunk;
    /// subtracting it keeps callers from waiting for bytes that will never
    /// arrive. Equals [`FileDescriptor::size`] for a consistent descriptor.
    pub fn apparent_size(&self) -> u64 {
        if self.encrypted {
            self.stored_size()
                .saturating_sub((TAG_OVERHEAD * self.chunks.len()) as u64)
        } else {
            self.stored_size()
        }
    }

    /// Clear the chunk list for an overwrite, returning the orphaned entries
    /// that must be enqueued for deletion.
    pub fn clear_chunks(&mut self) -> Vec<DeletionEntry> {
        self.size = 0;
        self.chunks
            .drain(..)
            .map(|chunk| DeletionEntry {
                container: self.container.clone(),
                object: chunk.id,
            })
            .collect()
    }

    /// Deletion entries for every chunk, without mutating the descriptor.
    pub fn deletion_entries(&self) -> Vec<DeletionEntry> {
        self.chunks
            .iter()
            .map(|chunk| DeletionEntry {
                container: self.container.clone(),
                object: chunk.id.clone(),
            })
            .collect()
    }

    /// Remote name hint for chunk `index`: a truncated file name plus the
    /// chunk index, for operator debuggability on the backend side.
    pub fn chunk_name_hint(&self, index: usize) -> String {
        let mut prefix: String = self.name.chars().take(NAME_HINT_MAX).collect();
        if prefix.is_empty() {
            prefix.push('_');
        }
        format!("{prefix}.{index}")
    }
}

// Hex encoding for the optional IV so the metadata document stays readable.
mod iv_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::IV_LEN;

    pub fn serialize<S>(iv: &Option<[u8; IV_LEN]>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match iv {
            Some(bytes) => serializer.serialize_str(&hex::encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<[u8; IV_LEN]>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded: Option<String> = Option::deserialize(deserializer)?;
        match encoded {
            None => Ok(None),
            Some(text) => {
                let bytes = hex::decode(&text).map_err(serde::de::Error::custom)?;
                let array: [u8; IV_LEN] = bytes
                    .try_into()
                    .map_err(|_| serde::de::Error::custom("iv must be 16 bytes"))?;
                Ok(Some(array))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn container() -> ContainerId {
        ContainerId::new("chan-1").unwrap()
    }

    fn chunk(id: &str, size: u64) -> ChunkRef {
        ChunkRef {
            id: ObjectId::new(id).unwrap(),
            size,
        }
    }

    #[test]
    fn test_new_descriptor_is_empty() {
        let descriptor = FileDescriptor::new("report.pdf", container());
        assert_eq!(descriptor.size, 0);
        assert!(descriptor.chunks.is_empty());
        assert!(!descriptor.encrypted);
        assert!(descriptor.iv.is_none());
        assert_eq!(descriptor.created, descriptor.modified);
    }

    #[test]
    fn test_stored_and_apparent_size_plain() {
        let mut descriptor = FileDescriptor::new("a.bin", container());
        descriptor.chunks = vec![chunk("c1", 100), chunk("c2", 50)];
        descriptor.size = 150;

        assert_eq!(descriptor.stored_size(), 150);
        assert_eq!(descriptor.apparent_size(), 150);
    }

    #[test]
    fn test_apparent_size_subtracts_tag_per_chunk() {
        let mut descriptor = FileDescriptor::new_encrypted("a.bin", container(), [7u8; IV_LEN]);
        // Two sealed chunks: 100 + 16 and 50 + 16 stored bytes.
        descriptor.chunks = vec![chunk("c1", 116), chunk("c2", 66)];
        descriptor.size = 150;

        assert_eq!(descriptor.stored_size(), 182);
        assert_eq!(descriptor.apparent_size(), 150);
        assert_eq!(descriptor.apparent_size(), descriptor.size);
    }

    #[test]
    fn test_clear_chunks_returns_deletion_entries() {
        let mut descriptor = FileDescriptor::new("a.bin", container());
        descriptor.chunks = vec![chunk("c1", 10), chunk("c2", 20)];
        descriptor.size = 30;

        let orphaned = descriptor.clear_chunks();

        assert_eq!(descriptor.size, 0);
        assert!(descriptor.chunks.is_empty());
        assert_eq!(orphaned.len(), 2);
        assert_eq!(orphaned[0].object.as_str(), "c1");
        assert_eq!(orphaned[1].object.as_str(), "c2");
        assert!(orphaned.iter().all(|e| e.container == container()));
    }

    #[test]
    fn test_chunk_name_hint_truncates() {
        let descriptor = FileDescriptor::new(
            "a-very-long-file-name-that-keeps-going.bin",
            container(),
        );
        let hint = descriptor.chunk_name_hint(3);
        assert!(hint.ends_with(".3"));
        assert!(hint.len() <= 24 + 1 + 3);
    }

    #[test]
    fn test_serde_iv_as_hex() {
        let descriptor = FileDescriptor::new_encrypted("a.bin", container(), [0xab; IV_LEN]);
        let json = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(json["iv"], serde_json::json!("ab".repeat(IV_LEN)));
        assert_eq!(json["containerId"], serde_json::json!("chan-1"));

        let back: FileDescriptor = serde_json::from_value(json).unwrap();
        assert_eq!(back, descriptor);
    }

    #[test]
    fn test_serde_plain_descriptor_omits_iv() {
        let descriptor = FileDescriptor::new("a.bin", container());
        let json = serde_json::to_value(&descriptor).unwrap();
        assert!(json.get("iv").is_none());

        let back: FileDescriptor = serde_json::from_value(json).unwrap();
        assert!(back.iv.is_none());
        assert!(!back.encrypted);
    }

    #[test]
    fn test_serde_rejects_malformed_iv() {
        let json = serde_json::json!({
            "name": "a.bin",
            "size": 0,
            "created": "2026-01-01T00:00:00Z",
            "modified": "2026-01-01T00:00:00Z",
            "encrypted": true,
            "iv": "abcd",
            "chunks": [],
            "containerId": "chan-1"
        });
        assert!(serde_json::from_value::<FileDescriptor>(json).is_err());
    }
}

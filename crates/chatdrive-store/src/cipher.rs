//! Per-file block sealing with AES-256-GCM.
//!
//! One [`StreamingCipher`] instance serves one file: the store-wide key
//! derived from the operator's passphrase plus the file's 16-byte IV drawn
//! at creation time. Every block of the file is sealed independently under
//! that same key/IV pair - the stored format predates per-block nonces, and
//! readers of existing data depend on it (see DESIGN.md).
//!
//! Block sizing discipline: encrypt-side blocks are sized to the provider's
//! raw-chunk capacity (plaintext side); decrypt-side blocks are sized to the
//! chunk's stored length, i.e. raw capacity plus [`TAG_OVERHEAD`].

use aes_gcm::aead::consts::U16;
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::aes::Aes256;
use aes_gcm::AesGcm;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

use chatdrive_core::domain::{StoreError, IV_LEN, TAG_OVERHEAD};

/// AES-256-GCM parameterized with the store's 16-byte IV length.
type FileCipher = AesGcm<Aes256, U16>;

/// Draw a fresh random IV for a new encrypted file.
pub fn generate_iv() -> [u8; IV_LEN] {
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);
    iv
}

// ============================================================================
// StoreKey
// ============================================================================

/// The store-wide symmetric key, derived from the operator's passphrase.
#[derive(Clone)]
pub struct StoreKey([u8; 32]);

impl StoreKey {
    /// Derive the key as the SHA-256 digest of the passphrase.
    pub fn derive(passphrase: &str) -> Self {
        let digest = Sha256::digest(passphrase.as_bytes());
        Self(digest.into())
    }

    /// Use raw key material directly.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl std::fmt::Debug for StoreKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Key material stays out of logs.
        f.write_str("StoreKey(..)")
    }
}

// ============================================================================
// StreamingCipher
// ============================================================================

/// Seals and opens the fixed-size blocks of one file.
pub struct StreamingCipher {
    cipher: FileCipher,
    iv: [u8; IV_LEN],
}

impl StreamingCipher {
    /// Bind the store key to one file's IV.
    pub fn new(key: &StoreKey, iv: [u8; IV_LEN]) -> Self {
        Self {
            cipher: FileCipher::new(GenericArray::from_slice(&key.0)),
            iv,
        }
    }

    /// Seal one block, producing `plaintext.len() + TAG_OVERHEAD` bytes.
    pub fn encrypt_block(&self, plaintext: &[u8]) -> Result<Vec<u8>, StoreError> {
        self.cipher
            .encrypt(GenericArray::from_slice(&self.iv), plaintext)
            .map_err(|_| StoreError::Authentication("block sealing failed".to_string()))
    }

    /// Open one sealed block. Fails when the authentication tag does not
    /// verify - corrupted or tampered remote data.
    pub fn decrypt_block(&self, ciphertext: &[u8]) -> Result<Vec<u8>, StoreError> {
        if ciphertext.len() < TAG_OVERHEAD {
            return Err(StoreError::Authentication(format!(
                "sealed block of {} bytes is shorter than its tag",
                ciphertext.len()
            )));
        }
        self.cipher
            .decrypt(GenericArray::from_slice(&self.iv), ciphertext)
            .map_err(|_| {
                StoreError::Authentication("authentication tag mismatch".to_string())
            })
    }
}

//! Growable byte accumulator with exact-size flush semantics.
//!
//! Foundation for every chunk and cipher-block boundary in the store. The
//! same type accumulates plaintext up to one chunk's capacity on the write
//! path and ciphertext up to one chunk's stored size (block plus tag) on the
//! read path.

/// A growable byte accumulator.
///
/// `flush()` returns and clears the accumulated bytes; writes after a flush
/// start a fresh, empty accumulation with no residual state.
#[derive(Debug, Default)]
pub struct ChunkBuffer {
    data: Vec<u8>,
}

impl ChunkBuffer {
    /// An empty buffer.
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    /// An empty buffer with `capacity` bytes pre-allocated. The capacity is
    /// advisory; the buffer grows past it if asked to.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
        }
    }

    /// Append `bytes` to the accumulation.
    pub fn write(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Accumulated length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when nothing has been accumulated since the last flush.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Currently allocated capacity. Advisory only.
    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    /// Return the accumulated bytes and reset to empty.
    pub fn flush(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.data)
    }

    /// Remove and return exactly the first `count` accumulated bytes,
    /// keeping any remainder for the next accumulation.
    ///
    /// Panics if fewer than `count` bytes are buffered; callers check
    /// `len()` first.
    pub fn take(&mut self, count: usize) -> Vec<u8> {
        assert!(count <= self.data.len(), "take past accumulated length");
        let rest = self.data.split_off(count);
        std::mem::replace(&mut self.data, rest)
    }
}

//! Store error taxonomy
//!
//! Every fallible operation in the store, vfs, and session layers reports
//! one of these variants. The split matters for callers: transport errors
//! may be retried inside the chunk-fetch primitive, authentication failures
//! signal corrupted or tampered remote data and must never be retried, and
//! invariant violations are caller errors that fail fast.

use thiserror::Error;

/// Errors surfaced by store and filesystem operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Path or remote object absent
    #[error("not found: {0}")]
    NotFound(String),

    /// Structural conflict (duplicate sibling name, path already taken)
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// AEAD tag verification failed - corrupted or tampered remote object
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Network or timeout failure talking to the remote backend
    #[error("remote transport error: {0}")]
    RemoteTransport(String),

    /// Write exceeded the configured hard ceiling
    #[error("capacity exceeded: {written} bytes written, ceiling is {ceiling}")]
    CapacityExceeded {
        /// Bytes the session had accepted when the ceiling was crossed
        written: u64,
        /// The configured ceiling in bytes
        ceiling: u64,
    },

    /// Caller or programmer error (cyclic move, root deletion, bad path)
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

impl StoreError {
    /// Shorthand for a `NotFound` about a path.
    pub fn path_not_found(path: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("path {path}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StoreError::NotFound("path /docs/a.txt".to_string());
        assert_eq!(err.to_string(), "not found: path /docs/a.txt");

        let err = StoreError::CapacityExceeded {
            written: 2048,
            ceiling: 1024,
        };
        assert_eq!(
            err.to_string(),
            "capacity exceeded: 2048 bytes written, ceiling is 1024"
        );
    }

    #[test]
    fn test_error_equality() {
        let err1 = StoreError::AlreadyExists("/a".to_string());
        let err2 = StoreError::AlreadyExists("/a".to_string());
        let err3 = StoreError::AlreadyExists("/b".to_string());

        assert_eq!(err1, err2);
        assert_ne!(err1, err3);
    }

    #[test]
    fn test_path_not_found_helper() {
        let err = StoreError::path_not_found("/missing");
        assert_eq!(err, StoreError::NotFound("path /missing".to_string()));
    }
}

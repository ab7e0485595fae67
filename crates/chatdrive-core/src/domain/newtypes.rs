//! Domain newtypes with validation
//!
//! Strongly-typed wrappers for backend identifiers and virtual paths.
//! Each newtype ensures validity at construction time, so the rest of the
//! codebase never re-checks them.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::StoreError;

// ============================================================================
// Backend identifiers
// ============================================================================

/// Identifier of a remote container (the channel that holds chunk objects)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContainerId(String);

impl ContainerId {
    /// Create a validated container id. Must be non-empty.
    pub fn new(id: impl Into<String>) -> Result<Self, StoreError> {
        let id = id.into();
        if id.is_empty() {
            return Err(StoreError::InvariantViolation(
                "container id must not be empty".to_string(),
            ));
        }
        Ok(Self(id))
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ContainerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ContainerId {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Opaque reference to one remote object (a single stored chunk)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    /// Create a validated object id. Must be non-empty.
    pub fn new(id: impl Into<String>) -> Result<Self, StoreError> {
        let id = id.into();
        if id.is_empty() {
            return Err(StoreError::InvariantViolation(
                "object id must not be empty".to_string(),
            ));
        }
        Ok(Self(id))
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ObjectId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ObjectId {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

// ============================================================================
// Virtual paths
// ============================================================================

/// Validate a single path segment (also used for file/directory names).
///
/// Segments must be non-empty, must not contain the separator, and must not
/// be the relative markers `.` or `..`.
pub fn validate_segment(segment: &str) -> Result<(), StoreError> {
    if segment.is_empty() {
        return Err(StoreError::InvariantViolation(
            "path segment must not be empty".to_string(),
        ));
    }
    if segment.contains('/') {
        return Err(StoreError::InvariantViolation(format!(
            "path segment '{segment}' must not contain '/'"
        )));
    }
    if segment == "." || segment == ".." {
        return Err(StoreError::InvariantViolation(format!(
            "path segment '{segment}' is not allowed"
        )));
    }
    Ok(())
}

/// An absolute, normalized virtual filesystem path.
///
/// Always starts with `/`; the root is exactly `/`. A trailing separator on
/// input (the directory notation used by the access protocol) is stripped
/// during normalization - the tree itself knows which nodes are directories.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VfsPath(String);

impl VfsPath {
    /// The root path, `/`.
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Parse and normalize an absolute path.
    pub fn new(path: impl Into<String>) -> Result<Self, StoreError> {
        let raw = path.into();
        if !raw.starts_with('/') {
            return Err(StoreError::InvariantViolation(format!(
                "path '{raw}' must be absolute"
            )));
        }
        let trimmed = raw.trim_end_matches('/');
        if trimmed.is_empty() {
            return Ok(Self::root());
        }
        for segment in trimmed[1..].split('/') {
            validate_segment(segment)?;
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Borrow the normalized path string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the root path `/`.
    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// The path segments in order, empty for the root.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// The final segment, `None` for the root.
    pub fn leaf(&self) -> Option<&str> {
        if self.is_root() {
            None
        } else {
            self.0.rsplit('/').next()
        }
    }

    /// The parent path, `None` for the root.
    pub fn parent(&self) -> Option<VfsPath> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(0) => Some(Self::root()),
            Some(idx) => Some(Self(self.0[..idx].to_string())),
            None => None,
        }
    }

    /// Append one validated segment.
    pub fn join(&self, segment: &str) -> Result<VfsPath, StoreError> {
        validate_segment(segment)?;
        if self.is_root() {
            Ok(Self(format!("/{segment}")))
        } else {
            Ok(Self(format!("{}/{segment}", self.0)))
        }
    }

    /// True if `self` equals `other` or lies underneath it.
    pub fn starts_with(&self, other: &VfsPath) -> bool {
        if other.is_root() {
            return true;
        }
        self.0 == other.0 || self.0.starts_with(&format!("{}/", other.0))
    }
}

impl Display for VfsPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for VfsPath {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for VfsPath {
    type Error = StoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<VfsPath> for String {
    fn from(path: VfsPath) -> Self {
        path.0
    }
}

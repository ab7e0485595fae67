//! The virtual metadata store: a path-addressed tree of directories and
//! file descriptors.
//!
//! One authoritative tree, owned top-down through an id-keyed arena. Parent
//! links are non-owning node ids used for lookups only; a node's lifetime is
//! decided by its position under the root. A derived absolute-path index is
//! rebuilt at the end of every structural mutation and is therefore always
//! consistent between mutations - mutations themselves are serialized by the
//! store's single owner (one mutex around the store).
//!
//! The whole tree serializes into one JSON document: directory nodes carry
//! `{name, created, children}`, file nodes carry the full descriptor.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use chatdrive_core::domain::newtypes::validate_segment;
use chatdrive_core::domain::{DeletionEntry, FileDescriptor, StoreError, VfsPath};

/// Identifier of one node in the arena. Never reused within one store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct NodeId(u64);

const ROOT: NodeId = NodeId(0);

#[derive(Debug)]
struct DirectoryNode {
    name: String,
    created: DateTime<Utc>,
    /// Children keyed by name: files and directories share one namespace,
    /// and iteration order is the name-sorted listing order.
    children: BTreeMap<String, NodeId>,
}

#[derive(Debug)]
enum NodeKind {
    Directory(DirectoryNode),
    File(FileDescriptor),
}

#[derive(Debug)]
struct NodeEntry {
    /// Non-owning back-reference, `None` only for the root.
    parent: Option<NodeId>,
    kind: NodeKind,
}

// ============================================================================
// Stat and listing types
// ============================================================================

/// Metadata reported to the access-protocol layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryStat {
    pub is_directory: bool,
    /// Plaintext size for files, 0 for directories.
    pub size: u64,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

/// One directory listing entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildEntry {
    pub name: String,
    pub stat: EntryStat,
}

// ============================================================================
// Serialized document model
// ============================================================================

/// One node in the persisted tree.
///
/// Untagged: directory nodes are recognized by their `children` field, file
/// nodes by the descriptor's `size`/`chunks` fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeDocument {
    Directory {
        name: String,
        created: DateTime<Utc>,
        children: Vec<NodeDocument>,
    },
    File(FileDescriptor),
}

/// The single persisted metadata document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataDocument {
    pub version: u32,
    pub root: NodeDocument,
}

/// Current document format version.
pub const DOCUMENT_VERSION: u32 = 1;

// ============================================================================
// VirtualMetadataStore
// ============================================================================

/// Path-addressed CRUD over the directory/file tree.
pub struct VirtualMetadataStore {
    nodes: HashMap<NodeId, NodeEntry>,
    /// Derived absolute-path index; rebuilt after every structural mutation.
    index: HashMap<String, NodeId>,
    next_id: u64,
}

impl VirtualMetadataStore {
    /// A store holding only the empty root directory.
    pub fn new() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(
            ROOT,
            NodeEntry {
                parent: None,
                kind: NodeKind::Directory(DirectoryNode {
                    name: String::new(),
                    created: Utc::now(),
                    children: BTreeMap::new(),
                }),
            },
        );
        let mut store = Self {
            nodes,
            index: HashMap::new(),
            next_id: 1,
        };
        store.rebuild_index();
        store
    }

    /// Total number of nodes, root included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    // ------------------------------------------------------------------
    // Resolution
    // ------------------------------------------------------------------

    fn lookup(&self, path: &VfsPath) -> Option<NodeId> {
        self.index.get(path.as_str()).copied()
    }

    fn entry(&self, id: NodeId) -> &NodeEntry {
        self.nodes.get(&id).expect("arena id is live")
    }

    fn entry_mut(&mut self, id: NodeId) -> &mut NodeEntry {
        self.nodes.get_mut(&id).expect("arena id is live")
    }

    /// True when `path` names an existing file or directory.
    pub fn exists(&self, path: &VfsPath) -> bool {
        self.lookup(path).is_some()
    }

    /// True for a directory, false for a file, `NotFound` otherwise.
    pub fn is_directory(&self, path: &VfsPath) -> Result<bool, StoreError> {
        let id = self
            .lookup(path)
            .ok_or_else(|| StoreError::path_not_found(path))?;
        Ok(matches!(self.entry(id).kind, NodeKind::Directory(_)))
    }

    /// Stat one node.
    pub fn stat(&self, path: &VfsPath) -> Result<EntryStat, StoreError> {
        let id = self
            .lookup(path)
            .ok_or_else(|| StoreError::path_not_found(path))?;
        Ok(self.stat_node(id))
    }

    fn stat_node(&self, id: NodeId) -> EntryStat {
        match &self.entry(id).kind {
            NodeKind::Directory(dir) => EntryStat {
                is_directory: true,
                size: 0,
                created: dir.created,
                modified: dir.created,
            },
            NodeKind::File(file) => EntryStat {
                is_directory: false,
                size: file.size,
                created: file.created,
                modified: file.modified,
            },
        }
    }

    /// Borrow the descriptor at `path`.
    pub fn file(&self, path: &VfsPath) -> Result<&FileDescriptor, StoreError> {
        let id = self
            .lookup(path)
            .ok_or_else(|| StoreError::path_not_found(path))?;
        match &self.entry(id).kind {
            NodeKind::File(file) => Ok(file),
            NodeKind::Directory(_) => Err(StoreError::InvariantViolation(format!(
                "{path} is a directory"
            ))),
        }
    }

    /// Name-ordered listing of a directory's children.
    pub fn list_children(&self, path: &VfsPath) -> Result<Vec<ChildEntry>, StoreError> {
        let id = self
            .lookup(path)
            .ok_or_else(|| StoreError::path_not_found(path))?;
        let dir = match &self.entry(id).kind {
            NodeKind::Directory(dir) => dir,
            NodeKind::File(_) => {
                return Err(StoreError::InvariantViolation(format!(
                    "{path} is not a directory"
                )))
            }
        };
        Ok(dir
            .children
            .iter()
            .map(|(name, child)| ChildEntry {
                name: name.clone(),
                stat: self.stat_node(*child),
            })
            .collect())
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Create any missing directories along `path` (mkdir -p semantics)
    /// and return without error when the full path already is a directory.
    ///
    /// Fails with `AlreadyExists` when a file occupies any segment.
    pub fn create_directory_path(&mut self, path: &VfsPath) -> Result<(), StoreError> {
        self.ensure_directory_path(path)?;
        self.rebuild_index();
        Ok(())
    }

    fn ensure_directory_path(&mut self, path: &VfsPath) -> Result<NodeId, StoreError> {
        let mut current = ROOT;
        let mut walked = VfsPath::root();
        for segment in path.segments() {
            walked = walked.join(segment)?;
            let existing = match &self.entry(current).kind {
                NodeKind::Directory(dir) => dir.children.get(segment).copied(),
                NodeKind::File(_) => unreachable!("walk descends only into directories"),
            };
            current = match existing {
                Some(child) => match &self.entry(child).kind {
                    NodeKind::Directory(_) => child,
                    NodeKind::File(_) => {
                        return Err(StoreError::AlreadyExists(format!(
                            "{walked} is a file"
                        )))
                    }
                },
                None => self.attach_directory(current, segment),
            };
        }
        Ok(current)
    }

    fn attach_directory(&mut self, parent: NodeId, name: &str) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(
            id,
            NodeEntry {
                parent: Some(parent),
                kind: NodeKind::Directory(DirectoryNode {
                    name: name.to_string(),
                    created: Utc::now(),
                    children: BTreeMap::new(),
                }),
            },
        );
        match &mut self.entry_mut(parent).kind {
            NodeKind::Directory(dir) => {
                dir.children.insert(name.to_string(), id);
            }
            NodeKind::File(_) => unreachable!("parent of a new node is a directory"),
        }
        id
    }

    /// Insert a new file descriptor at `path`, creating missing intermediate
    /// directories. The descriptor's name is forced to the path leaf.
    pub fn insert_file(
        &mut self,
        path: &VfsPath,
        mut descriptor: FileDescriptor,
    ) -> Result<(), StoreError> {
        let leaf = path
            .leaf()
            .ok_or_else(|| {
                StoreError::InvariantViolation("cannot create a file at the root".to_string())
            })?
            .to_string();
        let parent_path = path.parent().expect("non-root path has a parent");
        let parent = self.ensure_directory_path(&parent_path)?;

        let collision = match &self.entry(parent).kind {
            NodeKind::Directory(dir) => dir.children.contains_key(&leaf),
            NodeKind::File(_) => unreachable!("ensure_directory_path returns a directory"),
        };
        if collision {
            self.rebuild_index();
            return Err(StoreError::AlreadyExists(path.to_string()));
        }

        descriptor.name = leaf.clone();
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(
            id,
            NodeEntry {
                parent: Some(parent),
                kind: NodeKind::File(descriptor),
            },
        );
        match &mut self.entry_mut(parent).kind {
            NodeKind::Directory(dir) => {
                dir.children.insert(leaf, id);
            }
            NodeKind::File(_) => unreachable!(),
        }
        self.rebuild_index();
        Ok(())
    }

    /// Apply `f` to the descriptor at `path`. The descriptor's name is
    /// pinned back to the path leaf afterwards.
    pub fn update_file<F>(&mut self, path: &VfsPath, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut FileDescriptor),
    {
        let id = self
            .lookup(path)
            .ok_or_else(|| StoreError::path_not_found(path))?;
        let leaf = path.leaf().map(str::to_string);
        match &mut self.entry_mut(id).kind {
            NodeKind::File(file) => {
                f(file);
                if let Some(leaf) = leaf {
                    file.name = leaf;
                }
                Ok(())
            }
            NodeKind::Directory(_) => Err(StoreError::InvariantViolation(format!(
                "{path} is a directory"
            ))),
        }
    }

    /// Move a node to a new absolute path.
    ///
    /// The destination must not exist and its parent must already be a
    /// directory. Moving a directory underneath itself is rejected.
    pub fn move_node(&mut self, from: &VfsPath, to: &VfsPath) -> Result<(), StoreError> {
        if from.is_root() {
            return Err(StoreError::InvariantViolation(
                "cannot move the root".to_string(),
            ));
        }
        let id = self
            .lookup(from)
            .ok_or_else(|| StoreError::path_not_found(from))?;
        if self.exists(to) {
            return Err(StoreError::AlreadyExists(to.to_string()));
        }
        if to.starts_with(from) {
            return Err(StoreError::InvariantViolation(format!(
                "cannot move {from} underneath itself"
            )));
        }
        let new_leaf = to
            .leaf()
            .ok_or_else(|| {
                StoreError::InvariantViolation("cannot move a node onto the root".to_string())
            })?
            .to_string();
        let new_parent_path = to.parent().expect("non-root path has a parent");
        let new_parent = self
            .lookup(&new_parent_path)
            .ok_or_else(|| StoreError::path_not_found(&new_parent_path))?;
        if !matches!(self.entry(new_parent).kind, NodeKind::Directory(_)) {
            return Err(StoreError::InvariantViolation(format!(
                "{new_parent_path} is not a directory"
            )));
        }

        self.detach_from_parent(id);
        self.set_node_name(id, &new_leaf);
        self.entry_mut(id).parent = Some(new_parent);
        match &mut self.entry_mut(new_parent).kind {
            NodeKind::Directory(dir) => {
                dir.children.insert(new_leaf, id);
            }
            NodeKind::File(_) => unreachable!(),
        }
        self.rebuild_index();
        Ok(())
    }

    /// Rename a node in place.
    pub fn rename(&mut self, path: &VfsPath, new_name: &str) -> Result<(), StoreError> {
        validate_segment(new_name)?;
        if path.is_root() {
            return Err(StoreError::InvariantViolation(
                "cannot rename the root".to_string(),
            ));
        }
        let id = self
            .lookup(path)
            .ok_or_else(|| StoreError::path_not_found(path))?;
        let parent = self.entry(id).parent.expect("non-root node has a parent");

        let collision = match &self.entry(parent).kind {
            NodeKind::Directory(dir) => {
                dir.children.contains_key(new_name) && dir.children.get(new_name) != Some(&id)
            }
            NodeKind::File(_) => unreachable!(),
        };
        if collision {
            let sibling = path.parent().expect("non-root").join(new_name)?;
            return Err(StoreError::AlreadyExists(sibling.to_string()));
        }

        self.detach_from_parent(id);
        self.set_node_name(id, new_name);
        match &mut self.entry_mut(parent).kind {
            NodeKind::Directory(dir) => {
                dir.children.insert(new_name.to_string(), id);
            }
            NodeKind::File(_) => unreachable!(),
        }
        self.rebuild_index();
        Ok(())
    }

    /// Remove a node, returning the deletion entries for every descendant
    /// file's chunks so the caller can queue them before anything else runs.
    ///
    /// A non-empty directory is rejected unless `recursive` is set. The
    /// root cannot be removed.
    pub fn remove(
        &mut self,
        path: &VfsPath,
        recursive: bool,
    ) -> Result<Vec<DeletionEntry>, StoreError> {
        if path.is_root() {
            return Err(StoreError::InvariantViolation(
                "cannot remove the root".to_string(),
            ));
        }
        let id = self
            .lookup(path)
            .ok_or_else(|| StoreError::path_not_found(path))?;
        if let NodeKind::Directory(dir) = &self.entry(id).kind {
            if !dir.children.is_empty() && !recursive {
                return Err(StoreError::InvariantViolation(format!(
                    "{path} is not empty"
                )));
            }
        }

        let mut doomed = Vec::new();
        self.collect_subtree(id, &mut doomed);

        let mut entries = Vec::new();
        for node in &doomed {
            if let NodeKind::File(file) = &self.entry(*node).kind {
                entries.extend(file.deletion_entries());
            }
        }

        self.detach_from_parent(id);
        for node in doomed {
            self.nodes.remove(&node);
        }
        self.rebuild_index();
        Ok(entries)
    }

    fn collect_subtree(&self, id: NodeId, out: &mut Vec<NodeId>) {
        out.push(id);
        if let NodeKind::Directory(dir) = &self.entry(id).kind {
            for child in dir.children.values() {
                self.collect_subtree(*child, out);
            }
        }
    }

    fn detach_from_parent(&mut self, id: NodeId) {
        let Some(parent) = self.entry(id).parent else {
            return;
        };
        let name = self.node_name(id).to_string();
        if let NodeKind::Directory(dir) = &mut self.entry_mut(parent).kind {
            dir.children.remove(&name);
        }
    }

    fn node_name(&self, id: NodeId) -> &str {
        match &self.entry(id).kind {
            NodeKind::Directory(dir) => &dir.name,
            NodeKind::File(file) => &file.name,
        }
    }

    fn set_node_name(&mut self, id: NodeId, name: &str) {
        match &mut self.entry_mut(id).kind {
            NodeKind::Directory(dir) => dir.name = name.to_string(),
            NodeKind::File(file) => file.name = name.to_string(),
        }
    }

    // ------------------------------------------------------------------
    // Index maintenance
    // ------------------------------------------------------------------

    /// Rebuild the absolute-path index from the tree. Called at the end of
    /// every structural mutation, never read mid-mutation.
    fn rebuild_index(&mut self) {
        let mut index = HashMap::with_capacity(self.nodes.len());
        let mut stack = vec![(ROOT, VfsPath::root())];
        while let Some((id, path)) = stack.pop() {
            if let NodeKind::Directory(dir) = &self.entry(id).kind {
                for (name, child) in &dir.children {
                    let child_path = path.join(name).expect("tree names are valid segments");
                    stack.push((*child, child_path));
                }
            }
            index.insert(path.as_str().to_string(), id);
        }
        self.index = index;
    }

    // ------------------------------------------------------------------
    // Document conversion
    // ------------------------------------------------------------------

    /// Serialize the whole tree into one document.
    pub fn to_document(&self) -> MetadataDocument {
        MetadataDocument {
            version: DOCUMENT_VERSION,
            root: self.node_document(ROOT),
        }
    }

    fn node_document(&self, id: NodeId) -> NodeDocument {
        match &self.entry(id).kind {
            NodeKind::File(file) => NodeDocument::File(file.clone()),
            NodeKind::Directory(dir) => NodeDocument::Directory {
                name: dir.name.clone(),
                created: dir.created,
                children: dir.children.values().map(|c| self.node_document(*c)).collect(),
            },
        }
    }

    /// Rebuild a store from a persisted document.
    pub fn from_document(document: MetadataDocument) -> Result<Self, StoreError> {
        let NodeDocument::Directory { name, created, children } = document.root else {
            return Err(StoreError::InvariantViolation(
                "metadata root is not a directory".to_string(),
            ));
        };
        if !name.is_empty() {
            return Err(StoreError::InvariantViolation(
                "metadata root must be unnamed".to_string(),
            ));
        }

        let mut store = Self::new();
        if let NodeKind::Directory(dir) = &mut store.entry_mut(ROOT).kind {
            dir.created = created;
        }
        for child in children {
            store.insert_document(ROOT, child, &VfsPath::root())?;
        }
        store.rebuild_index();
        Ok(store)
    }

    fn insert_document(
        &mut self,
        parent: NodeId,
        document: NodeDocument,
        parent_path: &VfsPath,
    ) -> Result<(), StoreError> {
        match document {
            NodeDocument::File(descriptor) => {
                validate_segment(&descriptor.name)?;
                let path = parent_path.join(&descriptor.name)?;
                self.check_sibling(parent, &descriptor.name, &path)?;
                let id = NodeId(self.next_id);
                self.next_id += 1;
                let name = descriptor.name.clone();
                self.nodes.insert(
                    id,
                    NodeEntry {
                        parent: Some(parent),
                        kind: NodeKind::File(descriptor),
                    },
                );
                if let NodeKind::Directory(dir) = &mut self.entry_mut(parent).kind {
                    dir.children.insert(name, id);
                }
                Ok(())
            }
            NodeDocument::Directory { name, created, children } => {
                validate_segment(&name)?;
                let path = parent_path.join(&name)?;
                self.check_sibling(parent, &name, &path)?;
                let id = NodeId(self.next_id);
                self.next_id += 1;
                self.nodes.insert(
                    id,
                    NodeEntry {
                        parent: Some(parent),
                        kind: NodeKind::Directory(DirectoryNode {
                            name: name.clone(),
                            created,
                            children: BTreeMap::new(),
                        }),
                    },
                );
                if let NodeKind::Directory(dir) = &mut self.entry_mut(parent).kind {
                    dir.children.insert(name, id);
                }
                for child in children {
                    self.insert_document(id, child, &path)?;
                }
                Ok(())
            }
        }
    }

    fn check_sibling(
        &self,
        parent: NodeId,
        name: &str,
        path: &VfsPath,
    ) -> Result<(), StoreError> {
        let taken = match &self.entry(parent).kind {
            NodeKind::Directory(dir) => dir.children.contains_key(name),
            NodeKind::File(_) => true,
        };
        if taken {
            return Err(StoreError::InvariantViolation(format!(
                "metadata document has duplicate sibling {path}"
            )));
        }
        Ok(())
    }
}

impl Default for VirtualMetadataStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use chatdrive_core::domain::{ChunkRef, ContainerId, ObjectId};

    use super::*;

    fn path(s: &str) -> VfsPath {
        VfsPath::new(s).unwrap()
    }

    fn container() -> ContainerId {
        ContainerId::new("chan-1").unwrap()
    }

    fn descriptor(name: &str) -> FileDescriptor {
        FileDescriptor::new(name, container())
    }

    fn descriptor_with_chunks(name: &str, ids: &[&str]) -> FileDescriptor {
        let mut d = descriptor(name);
        d.chunks = ids
            .iter()
            .map(|id| ChunkRef {
                id: ObjectId::new(*id).unwrap(),
                size: 1,
            })
            .collect();
        d.size = ids.len() as u64;
        d
    }

    #[test]
    fn test_root_always_resolves() {
        let store = VirtualMetadataStore::new();
        assert!(store.exists(&VfsPath::root()));
        assert!(store.is_directory(&VfsPath::root()).unwrap());
        assert!(store.list_children(&VfsPath::root()).unwrap().is_empty());
    }

    #[test]
    fn test_insert_file_creates_missing_intermediates() {
        let mut store = VirtualMetadataStore::new();
        store
            .insert_file(&path("/a/b/c.txt"), descriptor("c.txt"))
            .unwrap();

        assert!(store.is_directory(&path("/a")).unwrap());
        assert!(store.is_directory(&path("/a/b")).unwrap());
        assert!(!store.is_directory(&path("/a/b/c.txt")).unwrap());
        assert_eq!(store.file(&path("/a/b/c.txt")).unwrap().name, "c.txt");
    }

    #[test]
    fn test_missing_intermediate_yields_not_found_on_reads() {
        let store = VirtualMetadataStore::new();
        assert!(matches!(
            store.stat(&path("/no/such/file")),
            Err(StoreError::NotFound(_))
        ));
        assert!(!store.exists(&path("/no")));
    }

    #[test]
    fn test_sibling_collision_between_file_and_directory() {
        let mut store = VirtualMetadataStore::new();
        store.create_directory_path(&path("/docs")).unwrap();

        // A file may not take a directory's name.
        assert!(matches!(
            store.insert_file(&path("/docs"), descriptor("docs")),
            Err(StoreError::AlreadyExists(_))
        ));

        // A directory may not take a file's name.
        store.insert_file(&path("/notes"), descriptor("notes")).unwrap();
        assert!(matches!(
            store.create_directory_path(&path("/notes/sub")),
            Err(StoreError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_create_directory_path_is_idempotent() {
        let mut store = VirtualMetadataStore::new();
        store.create_directory_path(&path("/a/b")).unwrap();
        store.create_directory_path(&path("/a/b")).unwrap();
        store.create_directory_path(&path("/a/b/c")).unwrap();
        assert!(store.is_directory(&path("/a/b/c")).unwrap());
    }

    #[test]
    fn test_duplicate_file_rejected() {
        let mut store = VirtualMetadataStore::new();
        store.insert_file(&path("/a.txt"), descriptor("a.txt")).unwrap();
        assert!(matches!(
            store.insert_file(&path("/a.txt"), descriptor("a.txt")),
            Err(StoreError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_list_children_is_name_ordered() {
        let mut store = VirtualMetadataStore::new();
        store.insert_file(&path("/zebra.txt"), descriptor("zebra.txt")).unwrap();
        store.create_directory_path(&path("/alpha")).unwrap();
        store.insert_file(&path("/mango.txt"), descriptor("mango.txt")).unwrap();

        let names: Vec<String> = store
            .list_children(&VfsPath::root())
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["alpha", "mango.txt", "zebra.txt"]);
    }

    #[test]
    fn test_update_file_pins_name_to_leaf() {
        let mut store = VirtualMetadataStore::new();
        store.insert_file(&path("/a.txt"), descriptor("a.txt")).unwrap();

        store
            .update_file(&path("/a.txt"), |d| {
                d.size = 42;
                d.name = "sneaky".to_string();
            })
            .unwrap();

        let file = store.file(&path("/a.txt")).unwrap();
        assert_eq!(file.size, 42);
        assert_eq!(file.name, "a.txt");
    }

    #[test]
    fn test_move_file_updates_tree_and_index() {
        let mut store = VirtualMetadataStore::new();
        store.insert_file(&path("/a/old.txt"), descriptor("old.txt")).unwrap();
        store.create_directory_path(&path("/b")).unwrap();

        store.move_node(&path("/a/old.txt"), &path("/b/new.txt")).unwrap();

        assert!(!store.exists(&path("/a/old.txt")));
        assert_eq!(store.file(&path("/b/new.txt")).unwrap().name, "new.txt");
    }

    #[test]
    fn test_move_directory_reindexes_descendants() {
        let mut store = VirtualMetadataStore::new();
        store.insert_file(&path("/a/sub/f.txt"), descriptor("f.txt")).unwrap();

        store.move_node(&path("/a"), &path("/renamed")).unwrap();

        assert!(store.exists(&path("/renamed/sub/f.txt")));
        assert!(!store.exists(&path("/a")));
        assert!(!store.exists(&path("/a/sub/f.txt")));
    }

    #[test]
    fn test_cyclic_move_rejected() {
        let mut store = VirtualMetadataStore::new();
        store.create_directory_path(&path("/a/b")).unwrap();

        assert!(matches!(
            store.move_node(&path("/a"), &path("/a/b/a2")),
            Err(StoreError::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_move_to_occupied_destination_rejected() {
        let mut store = VirtualMetadataStore::new();
        store.insert_file(&path("/a.txt"), descriptor("a.txt")).unwrap();
        store.insert_file(&path("/b.txt"), descriptor("b.txt")).unwrap();

        assert!(matches!(
            store.move_node(&path("/a.txt"), &path("/b.txt")),
            Err(StoreError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_move_to_missing_parent_rejected() {
        let mut store = VirtualMetadataStore::new();
        store.insert_file(&path("/a.txt"), descriptor("a.txt")).unwrap();

        assert!(matches!(
            store.move_node(&path("/a.txt"), &path("/nowhere/a.txt")),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_rename_within_parent() {
        let mut store = VirtualMetadataStore::new();
        store.insert_file(&path("/docs/a.txt"), descriptor("a.txt")).unwrap();

        store.rename(&path("/docs/a.txt"), "b.txt").unwrap();

        assert!(store.exists(&path("/docs/b.txt")));
        assert!(!store.exists(&path("/docs/a.txt")));
        assert_eq!(store.file(&path("/docs/b.txt")).unwrap().name, "b.txt");
    }

    #[test]
    fn test_rename_collision_rejected() {
        let mut store = VirtualMetadataStore::new();
        store.insert_file(&path("/a.txt"), descriptor("a.txt")).unwrap();
        store.insert_file(&path("/b.txt"), descriptor("b.txt")).unwrap();

        assert!(matches!(
            store.rename(&path("/a.txt"), "b.txt"),
            Err(StoreError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_rename_to_same_name_is_allowed() {
        let mut store = VirtualMetadataStore::new();
        store.insert_file(&path("/a.txt"), descriptor("a.txt")).unwrap();
        store.rename(&path("/a.txt"), "a.txt").unwrap();
        assert!(store.exists(&path("/a.txt")));
    }

    #[test]
    fn test_remove_root_rejected() {
        let mut store = VirtualMetadataStore::new();
        assert!(matches!(
            store.remove(&VfsPath::root(), true),
            Err(StoreError::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_remove_non_empty_directory_requires_recursive() {
        let mut store = VirtualMetadataStore::new();
        store.insert_file(&path("/dir/f.txt"), descriptor("f.txt")).unwrap();

        assert!(matches!(
            store.remove(&path("/dir"), false),
            Err(StoreError::InvariantViolation(_))
        ));
        assert!(store.exists(&path("/dir/f.txt")));
    }

    #[test]
    fn test_recursive_remove_collects_every_descendant_chunk() {
        let mut store = VirtualMetadataStore::new();
        store
            .insert_file(&path("/dir/a.txt"), descriptor_with_chunks("a.txt", &["c1", "c2"]))
            .unwrap();
        store
            .insert_file(&path("/dir/sub/b.txt"), descriptor_with_chunks("b.txt", &["c3"]))
            .unwrap();

        let entries = store.remove(&path("/dir"), true).unwrap();

        let mut ids: Vec<&str> = entries.iter().map(|e| e.object.as_str()).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec!["c1", "c2", "c3"]);
        assert!(!store.exists(&path("/dir")));
        assert!(!store.exists(&path("/dir/sub/b.txt")));
        assert_eq!(store.node_count(), 1);
    }

    #[test]
    fn test_remove_single_file() {
        let mut store = VirtualMetadataStore::new();
        store
            .insert_file(&path("/f.txt"), descriptor_with_chunks("f.txt", &["c9"]))
            .unwrap();

        let entries = store.remove(&path("/f.txt"), false).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].object.as_str(), "c9");
        assert!(!store.exists(&path("/f.txt")));
    }

    #[test]
    fn test_document_round_trip() {
        let mut store = VirtualMetadataStore::new();
        store
            .insert_file(&path("/docs/a.txt"), descriptor_with_chunks("a.txt", &["c1"]))
            .unwrap();
        store.create_directory_path(&path("/empty")).unwrap();
        store
            .update_file(&path("/docs/a.txt"), |d| d.size = 123)
            .unwrap();

        let json = serde_json::to_string_pretty(&store.to_document()).unwrap();
        let document: MetadataDocument = serde_json::from_str(&json).unwrap();
        let restored = VirtualMetadataStore::from_document(document).unwrap();

        assert_eq!(restored.node_count(), store.node_count());
        assert_eq!(restored.file(&path("/docs/a.txt")).unwrap().size, 123);
        assert!(restored.is_directory(&path("/empty")).unwrap());
        assert_eq!(
            restored.list_children(&VfsPath::root()).unwrap(),
            store.list_children(&VfsPath::root()).unwrap()
        );
    }

    #[test]
    fn test_document_with_duplicate_siblings_rejected() {
        let descriptor_a = descriptor("same");
        let descriptor_b = descriptor("same");
        let document = MetadataDocument {
            version: DOCUMENT_VERSION,
            root: NodeDocument::Directory {
                name: String::new(),
                created: Utc::now(),
                children: vec![
                    NodeDocument::File(descriptor_a),
                    NodeDocument::File(descriptor_b),
                ],
            },
        };

        assert!(matches!(
            VirtualMetadataStore::from_document(document),
            Err(StoreError::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_document_with_named_root_rejected() {
        let document = MetadataDocument {
            version: DOCUMENT_VERSION,
            root: NodeDocument::Directory {
                name: "root".to_string(),
                created: Utc::now(),
                children: Vec::new(),
            },
        };
        assert!(matches!(
            VirtualMetadataStore::from_document(document),
            Err(StoreError::InvariantViolation(_))
        ));
    }
}

//! Merkle-tree digests over input directory hierarchies.
//!
//! The caller (the build tool) owns a tree of [TreeNode]s describing the
//! inputs of one action. [TreeNodeRepository] computes a [Digest] for
//! every node: a leaf's digest is its file content digest (taken from the
//! [InputDigestCache], never by re-reading bytes), and a directory's
//! digest is the hash of its canonically serialized child listing. Since
//! listings are name-sorted and reference child digests, identical
//! subtrees collapse to identical digests wherever they appear, which is
//! what lets the upload path deduplicate them.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use crate::proto::{Digest, Directory, DirectoryNode, FileNode};

/// A reference to a local input file, relative to the execution root.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct InputFile {
    pub path: PathBuf,
}

impl InputFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

/// Supplies the externally maintained content fingerprint of an input
/// file. Implementations are expected to be cheap lookups into an
/// already-populated cache; a miss is an error, not a cue to hash the
/// file here.
pub trait InputDigestCache: Send + Sync {
    fn digest_for(&self, input: &InputFile) -> io::Result<Digest>;
}

impl InputDigestCache for HashMap<PathBuf, Digest> {
    fn digest_for(&self, input: &InputFile) -> io::Result<Digest> {
        self.get(&input.path).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no cached digest for input {}", input.path.display()),
            )
        })
    }
}

/// A node in the logical input tree. Interior children are keyed by name
/// in a [BTreeMap], so the serialized listing is name-sorted regardless
/// of construction order.
#[derive(Clone, Debug)]
pub enum TreeNode {
    Leaf(InputFile),
    Interior(BTreeMap<String, TreeNode>),
}

impl TreeNode {
    pub fn leaf(input: InputFile) -> Self {
        TreeNode::Leaf(input)
    }

    pub fn interior(children: impl IntoIterator<Item = (String, TreeNode)>) -> Self {
        TreeNode::Interior(children.into_iter().collect())
    }
}

/// Computes and remembers the digest of every node reachable from a root,
/// and maps digests back to the data that produces them for the upload
/// path.
pub struct TreeNodeRepository {
    input_cache: Arc<dyn InputDigestCache>,
    files: HashMap<Digest, InputFile>,
    directories: HashMap<Digest, Directory>,
}

impl TreeNodeRepository {
    pub fn new(input_cache: Arc<dyn InputDigestCache>) -> Self {
        Self {
            input_cache,
            files: HashMap::new(),
            directories: HashMap::new(),
        }
    }

    pub fn input_cache(&self) -> &Arc<dyn InputDigestCache> {
        &self.input_cache
    }

    /// Computes the digest of every node in the subtree and returns the
    /// root digest. Idempotent: digests are pure functions of content, so
    /// repeated calls insert the same entries.
    pub fn compute_merkle_digests(&mut self, root: &TreeNode) -> io::Result<Digest> {
        let mut scratch = HashSet::new();
        self.walk(root, &mut scratch)
    }

    /// Every directory digest and leaf file digest in the subtree; the
    /// set handed to the missing-blob query.
    pub fn get_all_digests(&mut self, root: &TreeNode) -> io::Result<HashSet<Digest>> {
        let mut all = HashSet::new();
        self.walk(root, &mut all)?;
        Ok(all)
    }

    /// Partitions a set of (presumed missing) digests into the concrete
    /// input files and serialized directory records that produce them.
    /// Digests this repository has never computed are ignored.
    pub fn get_data_from_digests(
        &self,
        digests: &HashSet<Digest>,
        files: &mut Vec<InputFile>,
        directories: &mut Vec<Directory>,
    ) {
        for digest in digests {
            if let Some(input) = self.files.get(digest) {
                files.push(input.clone());
            } else if let Some(directory) = self.directories.get(digest) {
                directories.push(directory.clone());
            }
        }
    }

    fn walk(&mut self, node: &TreeNode, out: &mut HashSet<Digest>) -> io::Result<Digest> {
        let digest = match node {
            TreeNode::Leaf(input) => {
                let digest = self.input_cache.digest_for(input)?;
                self.files.insert(digest.clone(), input.clone());
                digest
            }
            TreeNode::Interior(children) => {
                let mut listing = Directory::default();
                for (name, child) in children {
                    let child_digest = self.walk(child, out)?;
                    match child {
                        TreeNode::Leaf(_) => listing.files.push(FileNode {
                            name: name.clone(),
                            digest: Some(child_digest),
                        }),
                        TreeNode::Interior(_) => listing.directories.push(DirectoryNode {
                            name: name.clone(),
                            digest: Some(child_digest),
                        }),
                    }
                }
                let digest = listing.digest();
                self.directories.insert(digest.clone(), listing);
                digest
            }
        };
        out.insert(digest.clone());
        Ok(digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digests;

    fn cache_with(entries: &[(&str, &[u8])]) -> Arc<dyn InputDigestCache> {
        let mut cache = HashMap::new();
        for (path, content) in entries {
            cache.insert(PathBuf::from(path), digests::compute(content));
        }
        Arc::new(cache)
    }

    fn sample_tree() -> TreeNode {
        TreeNode::interior([
            (
                "src".to_string(),
                TreeNode::interior([
                    ("a.rs".to_string(), TreeNode::leaf(InputFile::new("src/a.rs"))),
                    ("b.rs".to_string(), TreeNode::leaf(InputFile::new("src/b.rs"))),
                ]),
            ),
            (
                "README".to_string(),
                TreeNode::leaf(InputFile::new("README")),
            ),
        ])
    }

    fn sample_cache() -> Arc<dyn InputDigestCache> {
        cache_with(&[
            ("src/a.rs", b"fn a() {}"),
            ("src/b.rs", b"fn b() {}"),
            ("README", b"readme"),
        ])
    }

    #[test]
    fn root_digest_independent_of_insertion_order() {
        let forward = sample_tree();
        // Same structure, children supplied in reverse order.
        let reversed = TreeNode::interior([
            (
                "README".to_string(),
                TreeNode::leaf(InputFile::new("README")),
            ),
            (
                "src".to_string(),
                TreeNode::interior([
                    ("b.rs".to_string(), TreeNode::leaf(InputFile::new("src/b.rs"))),
                    ("a.rs".to_string(), TreeNode::leaf(InputFile::new("src/a.rs"))),
                ]),
            ),
        ]);

        let mut repo = TreeNodeRepository::new(sample_cache());
        let d1 = repo.compute_merkle_digests(&forward).unwrap();
        let d2 = repo.compute_merkle_digests(&reversed).unwrap();
        assert_eq!(d1, d2);
    }

    #[test]
    fn identical_subtrees_collapse() {
        let subtree = || {
            TreeNode::interior([(
                "a.rs".to_string(),
                TreeNode::leaf(InputFile::new("src/a.rs")),
            )])
        };
        let tree = TreeNode::interior([
            ("first".to_string(), subtree()),
            ("second".to_string(), subtree()),
        ]);

        let mut repo = TreeNodeRepository::new(cache_with(&[("src/a.rs", b"fn a() {}")]));
        let all = repo.get_all_digests(&tree).unwrap();
        // root + one shared subtree directory + one shared leaf.
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn all_digests_cover_every_node() {
        let mut repo = TreeNodeRepository::new(sample_cache());
        let all = repo.get_all_digests(&sample_tree()).unwrap();
        // Two directories (root, src) and three distinct leaves.
        assert_eq!(all.len(), 5);
    }

    #[test]
    fn data_partition_matches_digest_kind() {
        let mut repo = TreeNodeRepository::new(sample_cache());
        let all = repo.get_all_digests(&sample_tree()).unwrap();

        let mut files = Vec::new();
        let mut directories = Vec::new();
        repo.get_data_from_digests(&all, &mut files, &mut directories);

        assert_eq!(files.len(), 3);
        assert_eq!(directories.len(), 2);
        for directory in &directories {
            assert!(all.contains(&directory.digest()));
        }
    }

    #[test]
    fn leaf_digest_comes_from_cache() {
        let mut repo = TreeNodeRepository::new(cache_with(&[("x", b"content")]));
        let root = TreeNode::leaf(InputFile::new("x"));
        let digest = repo.compute_merkle_digests(&root).unwrap();
        assert_eq!(digest, digests::compute(b"content"));
    }

    #[test]
    fn missing_fingerprint_is_an_error() {
        let mut repo = TreeNodeRepository::new(cache_with(&[]));
        let root = TreeNode::leaf(InputFile::new("unknown"));
        let err = repo.compute_merkle_digests(&root).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}

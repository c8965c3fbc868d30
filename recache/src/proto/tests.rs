use crate::digests;
use crate::fixtures::*;
use crate::proto::{Digest, Directory, FileNode};

#[test]
fn empty_directory_digest_is_empty_blob_digest() {
    // An empty listing serializes to zero bytes, so its digest is the
    // digest of the empty blob.
    assert_eq!(Directory::default().digest(), digests::compute(b""));
}

#[test]
fn directory_digest_depends_on_children() {
    let one = Directory {
        files: vec![FileNode {
            name: "a".to_string(),
            digest: Some(BLOB_A_DIGEST.clone()),
        }],
        ..Default::default()
    };
    let other = Directory {
        files: vec![FileNode {
            name: "b".to_string(),
            digest: Some(BLOB_A_DIGEST.clone()),
        }],
        ..Default::default()
    };
    assert_ne!(one.digest(), other.digest());
    assert_eq!(one.digest(), one.clone().digest());
}

#[test]
fn fixture_directories_have_distinct_digests() {
    assert_ne!(DIRECTORY_WITH_KEEP.digest(), DIRECTORY_COMPLICATED.digest());
}

#[test]
fn digest_display() {
    let digest = Digest {
        hash: "abc123".to_string(),
        size_bytes: 42,
    };
    assert_eq!(digest.to_string(), "abc123/42");
}

#[test]
fn empty_blob_predicate() {
    assert!(EMPTY_BLOB_DIGEST.is_empty_blob());
    assert!(!HELLOWORLD_BLOB_DIGEST.is_empty_blob());
}

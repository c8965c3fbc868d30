//! Shared test fixtures.

use crate::digests;
use crate::proto::{Digest, Directory, DirectoryNode, FileNode};
use bytes::Bytes;
use lazy_static::lazy_static;

pub const HELLOWORLD_BLOB_CONTENTS: &[u8] = b"Hello World!";
pub const EMPTY_BLOB_CONTENTS: &[u8] = b"";

lazy_static! {
    pub static ref HELLOWORLD_BLOB_DIGEST: Digest = digests::compute(HELLOWORLD_BLOB_CONTENTS);
    pub static ref EMPTY_BLOB_DIGEST: Digest = digests::compute(EMPTY_BLOB_CONTENTS);

    /// A small blob, fitting in a single chunk.
    pub static ref BLOB_A: Bytes = vec![0x00, 0x01].into();
    pub static ref BLOB_A_DIGEST: Digest = digests::compute(&BLOB_A);

    /// A 1 MiB blob, large enough to span multiple chunks at the default
    /// chunk size.
    pub static ref BLOB_B: Bytes = (0..255u8).collect::<Vec<u8>>().repeat(4 * 1024).into();
    pub static ref BLOB_B_DIGEST: Digest = digests::compute(&BLOB_B);

    /// A directory listing with a single file child.
    pub static ref DIRECTORY_WITH_KEEP: Directory = Directory {
        files: vec![FileNode {
            name: ".keep".to_string(),
            digest: Some(EMPTY_BLOB_DIGEST.clone()),
        }],
        ..Default::default()
    };

    /// A directory with a file child and [DIRECTORY_WITH_KEEP] as a
    /// subdirectory.
    pub static ref DIRECTORY_COMPLICATED: Directory = Directory {
        files: vec![FileNode {
            name: "hello".to_string(),
            digest: Some(HELLOWORLD_BLOB_DIGEST.clone()),
        }],
        directories: vec![DirectoryNode {
            name: "keep".to_string(),
            digest: Some(DIRECTORY_WITH_KEEP.digest()),
        }],
    };
}

//! Digest computation for cache keys.
//!
//! A [Digest] is the identity of a blob everywhere in this crate: the
//! lowercase-hex SHA-256 of its exact bytes, plus the byte count. Equal
//! content anywhere, anytime, yields an equal digest.

use data_encoding::HEXLOWER;
use sha2::{Digest as _, Sha256};
use std::io;
use std::path::Path;
use tokio::io::AsyncReadExt;

use crate::proto::Digest;

/// Computes the [Digest] of an in-memory byte sequence.
pub fn compute(data: &[u8]) -> Digest {
    Digest {
        hash: HEXLOWER.encode(Sha256::digest(data).as_slice()),
        size_bytes: data.len() as i64,
    }
}

/// Computes the [Digest] of a file's contents, reading it in bounded
/// pieces rather than buffering the whole file.
pub async fn compute_for_file(path: &Path) -> io::Result<Digest> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut size_bytes = 0i64;
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        size_bytes += n as i64;
    }
    Ok(Digest {
        hash: HEXLOWER.encode(hasher.finalize().as_slice()),
        size_bytes,
    })
}

/// The key identifying a serialized action description in the
/// action-result cache. A separate keyspace from the blob CAS, though it
/// wraps the same digest type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ActionKey(Digest);

impl ActionKey {
    /// Derives the key from the serialized action bytes.
    pub fn from_action_bytes(action: &[u8]) -> Self {
        Self(compute(action))
    }

    pub fn digest(&self) -> &Digest {
        &self.0
    }
}

impl From<Digest> for ActionKey {
    fn from(digest: Digest) -> Self {
        Self(digest)
    }
}

impl std::fmt::Display for ActionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

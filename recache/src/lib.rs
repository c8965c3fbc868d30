//! A client for a remote build-action cache, consisting of a
//! content-addressable blob store and an action-result cache, both spoken
//! to over gRPC.
//!
//! [client::RemoteCacheClient] is the entry point; [tree] computes Merkle
//! digests over input hierarchies, [chunker] slices blobs into bounded
//! upload chunks, and [proto] holds the wire types.

pub mod channel;
pub mod chunker;
pub mod client;
pub mod digests;
pub mod errors;
pub mod proto;
pub mod tree;

pub mod fixtures;

pub use chunker::{Chunk, Chunker, ChunkerBuilder, DEFAULT_CHUNK_SIZE};
pub use client::{RemoteCacheClient, RemoteOptions};
pub use digests::ActionKey;
pub use errors::Error;

#[cfg(test)]
mod tests;

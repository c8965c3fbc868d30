//! Message and service definitions for the `recache.v1` wire protocol.
//!
//! The protocol is small and fixed, so the prost structs and tonic stubs
//! are committed here directly, in the shape `tonic-build` emits. This
//! keeps the build free of a protoc toolchain dependency.

use prost::Message;

mod clients;
mod servers;

pub use clients::{action_cache_client, byte_stream_client, content_addressable_storage_client};
pub use servers::{action_cache_server, byte_stream_server, content_addressable_storage_server};

#[cfg(test)]
mod tests;

/// Identity of a blob in the content-addressable store: the lowercase-hex
/// SHA-256 of its exact bytes, plus the byte count.
#[derive(Clone, PartialEq, Eq, Hash, ::prost::Message)]
pub struct Digest {
    #[prost(string, tag = "1")]
    pub hash: ::prost::alloc::string::String,
    #[prost(int64, tag = "2")]
    pub size_bytes: i64,
}

/// A leaf entry in a [Directory] listing.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FileNode {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "2")]
    pub digest: ::core::option::Option<Digest>,
}

/// A child-directory entry in a [Directory] listing. The digest refers to
/// the serialized [Directory] message of the child.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DirectoryNode {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "2")]
    pub digest: ::core::option::Option<Digest>,
}

/// The serialized form of one tree node's immediate children.
///
/// Both lists are sorted by name, so the encoding (and therefore the
/// digest) is a pure function of the children, independent of
/// construction order.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Directory {
    #[prost(message, repeated, tag = "1")]
    pub files: ::prost::alloc::vec::Vec<FileNode>,
    #[prost(message, repeated, tag = "2")]
    pub directories: ::prost::alloc::vec::Vec<DirectoryNode>,
}

/// Per-entry status in a [BatchUpdateBlobsResponse]. `code` uses the
/// canonical gRPC status code space; 0 is OK.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RpcStatus {
    #[prost(int32, tag = "1")]
    pub code: i32,
    #[prost(string, tag = "2")]
    pub message: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FindMissingBlobsRequest {
    #[prost(string, tag = "1")]
    pub instance_name: ::prost::alloc::string::String,
    #[prost(message, repeated, tag = "2")]
    pub blob_digests: ::prost::alloc::vec::Vec<Digest>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FindMissingBlobsResponse {
    #[prost(message, repeated, tag = "1")]
    pub missing_blob_digests: ::prost::alloc::vec::Vec<Digest>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BatchUpdateBlobsRequest {
    #[prost(string, tag = "1")]
    pub instance_name: ::prost::alloc::string::String,
    #[prost(message, repeated, tag = "2")]
    pub requests: ::prost::alloc::vec::Vec<batch_update_blobs_request::Request>,
}

/// Nested message types for `BatchUpdateBlobsRequest`.
pub mod batch_update_blobs_request {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Request {
        #[prost(message, optional, tag = "1")]
        pub content_digest: ::core::option::Option<super::Digest>,
        #[prost(bytes = "bytes", tag = "2")]
        pub data: ::prost::bytes::Bytes,
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BatchUpdateBlobsResponse {
    #[prost(message, repeated, tag = "1")]
    pub responses: ::prost::alloc::vec::Vec<batch_update_blobs_response::Response>,
}

/// Nested message types for `BatchUpdateBlobsResponse`.
pub mod batch_update_blobs_response {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Response {
        #[prost(message, optional, tag = "1")]
        pub blob_digest: ::core::option::Option<super::Digest>,
        #[prost(message, optional, tag = "2")]
        pub status: ::core::option::Option<super::RpcStatus>,
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ReadRequest {
    #[prost(string, tag = "1")]
    pub resource_name: ::prost::alloc::string::String,
    #[prost(int64, tag = "2")]
    pub read_offset: i64,
    #[prost(int64, tag = "3")]
    pub read_limit: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ReadResponse {
    #[prost(bytes = "bytes", tag = "1")]
    pub data: ::prost::bytes::Bytes,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct WriteRequest {
    /// Only set on the first message of a write stream.
    #[prost(string, tag = "1")]
    pub resource_name: ::prost::alloc::string::String,
    #[prost(int64, tag = "2")]
    pub write_offset: i64,
    #[prost(bool, tag = "3")]
    pub finish_write: bool,
    #[prost(bytes = "bytes", tag = "4")]
    pub data: ::prost::bytes::Bytes,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct WriteResponse {
    /// Total number of bytes the server has durably stored for this
    /// resource. Must equal the declared blob size on a finished write.
    #[prost(int64, tag = "1")]
    pub committed_size: i64,
}

/// The cached record of one executed action's outputs.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ActionResult {
    #[prost(message, repeated, tag = "1")]
    pub output_files: ::prost::alloc::vec::Vec<OutputFile>,
    #[prost(message, repeated, tag = "2")]
    pub output_directories: ::prost::alloc::vec::Vec<OutputDirectory>,
    #[prost(int32, tag = "3")]
    pub exit_code: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct OutputFile {
    /// Path relative to the execution root.
    #[prost(string, tag = "1")]
    pub path: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "2")]
    pub digest: ::core::option::Option<Digest>,
    /// Raw contents, inlined by the server for small files. Empty means
    /// "fetch via ByteStream.Read".
    #[prost(bytes = "bytes", tag = "3")]
    pub content: ::prost::bytes::Bytes,
    #[prost(bool, tag = "4")]
    pub is_executable: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct OutputDirectory {
    /// Path relative to the execution root.
    #[prost(string, tag = "1")]
    pub path: ::prost::alloc::string::String,
    /// Digest of the serialized [Directory] tree rooted there.
    #[prost(message, optional, tag = "2")]
    pub digest: ::core::option::Option<Digest>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetActionResultRequest {
    #[prost(string, tag = "1")]
    pub instance_name: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "2")]
    pub action_digest: ::core::option::Option<Digest>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct UpdateActionResultRequest {
    #[prost(string, tag = "1")]
    pub instance_name: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "2")]
    pub action_digest: ::core::option::Option<Digest>,
    #[prost(message, optional, tag = "3")]
    pub action_result: ::core::option::Option<ActionResult>,
}

impl Digest {
    /// Whether this digest denotes the empty blob. The empty blob is
    /// handled locally everywhere and must never trigger a network read.
    pub fn is_empty_blob(&self) -> bool {
        self.size_bytes == 0
    }
}

impl std::fmt::Display for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.hash, self.size_bytes)
    }
}

impl Directory {
    /// Calculates the digest of a Directory, which is the SHA-256 hash of
    /// the Directory message serialized in protobuf canonical form.
    pub fn digest(&self) -> Digest {
        crate::digests::compute(&self.encode_to_vec())
    }
}

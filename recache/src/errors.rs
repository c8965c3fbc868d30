use thiserror::Error;

use crate::proto::Digest;

/// Errors surfaced by remote cache operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The blob (or serialized tree) addressed by this digest is absent
    /// from the remote cache. A recoverable outcome callers branch on,
    /// not a transport failure.
    #[error("blob {0} not found in the remote cache")]
    NotFound(Digest),

    /// An operation this client does not implement.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),

    /// Any other non-OK RPC status. No retries are attempted.
    #[error("rpc failed: {0}")]
    Rpc(#[from] tonic::Status),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The server acknowledged an upload without committing all bytes.
    #[error("server committed {committed} of {} bytes for blob {digest}", digest.size_bytes)]
    ShortCommit { digest: Digest, committed: i64 },

    /// A downloaded blob did not match its declared size.
    #[error("downloaded {got} bytes for blob {digest}, expected {}", digest.size_bytes)]
    SizeMismatch { digest: Digest, got: i64 },

    /// The configured deadline elapsed before all upload streams in a
    /// batch terminated.
    #[error("timed out waiting for upload streams to finish")]
    DeadlineExceeded,

    /// A local step that cannot legitimately fail did. Indicates a broken
    /// invariant, never an expected operational condition.
    #[error("internal error: {0}")]
    Internal(String),

    #[error("invalid client options: {0}")]
    InvalidOptions(String),
}

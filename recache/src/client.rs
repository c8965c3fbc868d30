//! The remote cache client: digest-based deduplication, Merkle-tree
//! uploads, chunked blob transfer, and action-result lookup/storage over
//! gRPC.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use prost::Message;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_stream::wrappers::ReceiverStream;
use tonic::metadata::{Ascii, MetadataValue};
use tonic::transport::Channel;
use tonic::Code;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::chunker::{Chunker, DEFAULT_CHUNK_SIZE};
use crate::digests::{self, ActionKey};
use crate::errors::Error;
use crate::proto::{
    self, action_cache_client::ActionCacheClient, byte_stream_client::ByteStreamClient,
    content_addressable_storage_client::ContentAddressableStorageClient,
};
use crate::tree::{InputDigestCache, InputFile, TreeNode, TreeNodeRepository};

/// Configuration applied uniformly to every RPC issued by a
/// [RemoteCacheClient].
#[derive(Clone, Debug)]
pub struct RemoteOptions {
    /// Namespacing prefix applied to all requests and resource names.
    pub instance_name: String,
    /// Per-call deadline; also bounds the wait for a whole upload batch.
    pub timeout: Duration,
    /// Bearer token attached to every call, if set.
    pub auth_token: Option<String>,
    /// Upper bound on the bytes carried by one upload chunk.
    pub chunk_size: usize,
}

impl Default for RemoteOptions {
    fn default() -> Self {
        Self {
            instance_name: String::new(),
            timeout: Duration::from_secs(60),
            auth_token: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// A client for a remote build-action cache: a content-addressable blob
/// store plus an action-result cache.
///
/// Cheap to share behind an `Arc`; the service stubs are constructed on
/// first use and reused by all calls, and the underlying [Channel]
/// multiplexes concurrent requests.
pub struct RemoteCacheClient {
    channel: Channel,
    options: RemoteOptions,
    auth_header: Option<MetadataValue<Ascii>>,
    cas: OnceLock<ContentAddressableStorageClient<Channel>>,
    byte_stream: OnceLock<ByteStreamClient<Channel>>,
    action_cache: OnceLock<ActionCacheClient<Channel>>,
}

impl RemoteCacheClient {
    pub fn new(channel: Channel, options: RemoteOptions) -> Result<Self, Error> {
        let auth_header = options
            .auth_token
            .as_deref()
            .map(|token| format!("Bearer {}", token).parse::<MetadataValue<Ascii>>())
            .transpose()
            .map_err(|_| Error::InvalidOptions("auth token is not valid ASCII".to_string()))?;
        Ok(Self {
            channel,
            options,
            auth_header,
            cas: OnceLock::new(),
            byte_stream: OnceLock::new(),
            action_cache: OnceLock::new(),
        })
    }

    /// Connects to the endpoint described by `url` (see
    /// [crate::channel::from_url] for the accepted schemes).
    pub async fn from_url(url: &url::Url, options: RemoteOptions) -> Result<Self, Error> {
        let channel = crate::channel::from_url(url)
            .await
            .map_err(|e| Error::InvalidOptions(e.to_string()))?;
        Self::new(channel, options)
    }

    // Service stubs are created lazily and reused across all calls.

    fn cas_client(&self) -> ContentAddressableStorageClient<Channel> {
        self.cas
            .get_or_init(|| ContentAddressableStorageClient::new(self.channel.clone()))
            .clone()
    }

    fn byte_stream_client(&self) -> ByteStreamClient<Channel> {
        self.byte_stream
            .get_or_init(|| ByteStreamClient::new(self.channel.clone()))
            .clone()
    }

    fn action_cache_client(&self) -> ActionCacheClient<Channel> {
        self.action_cache
            .get_or_init(|| ActionCacheClient::new(self.channel.clone()))
            .clone()
    }

    /// Wraps a message in a request carrying the configured deadline and
    /// credentials.
    fn request<T>(&self, message: T) -> tonic::Request<T> {
        let mut request = tonic::Request::new(message);
        request.set_timeout(self.options.timeout);
        if let Some(header) = &self.auth_header {
            request.metadata_mut().insert("authorization", header.clone());
        }
        request
    }

    fn resource_prefix(&self) -> String {
        if self.options.instance_name.is_empty() {
            String::new()
        } else {
            format!("{}/", self.options.instance_name)
        }
    }

    fn blob_resource_name(&self, digest: &proto::Digest) -> String {
        format!(
            "{}blobs/{}/{}",
            self.resource_prefix(),
            digest.hash,
            digest.size_bytes
        )
    }

    fn upload_resource_name(&self, digest: &proto::Digest) -> String {
        format!(
            "{}uploads/{}/blobs/{}/{}",
            self.resource_prefix(),
            Uuid::new_v4(),
            digest.hash,
            digest.size_bytes
        )
    }

    /// Returns the subset of `digests` absent from server storage. An
    /// empty input short-circuits to an empty output with no RPC.
    #[instrument(skip_all, err)]
    pub async fn find_missing_digests(
        &self,
        digests: impl IntoIterator<Item = proto::Digest>,
    ) -> Result<HashSet<proto::Digest>, Error> {
        let blob_digests: Vec<proto::Digest> = digests.into_iter().collect();
        if blob_digests.is_empty() {
            return Ok(HashSet::new());
        }
        let response = self
            .cas_client()
            .find_missing_blobs(self.request(proto::FindMissingBlobsRequest {
                instance_name: self.options.instance_name.clone(),
                blob_digests,
            }))
            .await?
            .into_inner();
        Ok(response.missing_blob_digests.into_iter().collect())
    }

    /// Uploads enough of the tree metadata and data into the remote cache
    /// that the entire tree can be reassembled remotely from the root
    /// digest. Only blobs the server reports missing are transferred:
    /// missing directory listings go in one batched metadata call,
    /// missing leaf files through the chunked byte-stream path.
    #[instrument(skip_all, err)]
    pub async fn upload_tree(
        &self,
        repository: &mut TreeNodeRepository,
        exec_root: &Path,
        root: &TreeNode,
    ) -> Result<(), Error> {
        repository.compute_merkle_digests(root)?;
        let missing = self
            .find_missing_digests(repository.get_all_digests(root)?)
            .await?;

        let mut input_files = Vec::new();
        let mut tree_directories = Vec::new();
        repository.get_data_from_digests(&missing, &mut input_files, &mut tree_directories);

        if !tree_directories.is_empty() {
            let requests = tree_directories
                .iter()
                .map(|directory| {
                    let data = Bytes::from(directory.encode_to_vec());
                    proto::batch_update_blobs_request::Request {
                        content_digest: Some(digests::compute(&data)),
                        data,
                    }
                })
                .collect();
            let response = self
                .cas_client()
                .batch_update_blobs(self.request(proto::BatchUpdateBlobsRequest {
                    instance_name: self.options.instance_name.clone(),
                    requests,
                }))
                .await?
                .into_inner();
            // Any rejected entry aborts the whole call. No retries.
            for entry in response.responses {
                let status = entry.status.unwrap_or_default();
                if status.code != Code::Ok as i32 {
                    return Err(Error::Rpc(tonic::Status::new(
                        Code::from(status.code),
                        status.message,
                    )));
                }
            }
        }

        if !input_files.is_empty() {
            let mut builder = Chunker::builder()
                .chunk_size(self.options.chunk_size)
                .only_use_digests(missing);
            for input in &input_files {
                builder = builder.add_input(input, repository.input_cache().as_ref(), exec_root)?;
            }
            self.upload_chunks(builder.build().await?).await?;
        }
        Ok(())
    }

    /// Uploads all outputs of a locally executed action and appends one
    /// output-file record per file to `result`, in the order the files
    /// were supplied. Files that don't exist locally are skipped — a
    /// result may legitimately lack an output the action didn't produce.
    /// Directories as outputs are not supported.
    #[instrument(skip_all, err)]
    pub async fn upload_all_results(
        &self,
        exec_root: &Path,
        files: &[PathBuf],
        result: &mut proto::ActionResult,
    ) -> Result<(), Error> {
        let mut entries: Vec<(&PathBuf, proto::Digest, bool)> = Vec::new();
        let mut builder = Chunker::builder().chunk_size(self.options.chunk_size);
        for file in files {
            let metadata = match tokio::fs::metadata(file).await {
                Ok(metadata) => metadata,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            if metadata.is_dir() {
                return Err(Error::Unsupported(
                    "storing an output directory is not yet supported",
                ));
            }
            let digest = digests::compute_for_file(file).await?;
            builder = builder.add_file_with_digest(file.clone(), digest.clone());
            entries.push((file, digest, is_executable(&metadata)));
        }

        let missing = self
            .find_missing_digests(entries.iter().map(|(_, digest, _)| digest.clone()))
            .await?;
        if !missing.is_empty() {
            self.upload_chunks(builder.only_use_digests(missing).build().await?)
                .await?;
        }

        for (file, digest, executable) in entries {
            let path = file.strip_prefix(exec_root).unwrap_or(file);
            result.output_files.push(proto::OutputFile {
                path: path.to_string_lossy().into_owned(),
                digest: Some(digest),
                content: Bytes::new(),
                is_executable: executable,
            });
        }
        Ok(())
    }

    /// Puts a file's contents into the cache if not already there, and
    /// returns the digest under which they can be fetched. Bytes are
    /// transferred at most once per content; the missing-check is issued
    /// every call.
    #[instrument(skip_all, fields(file = %file.display()), err)]
    pub async fn upload_file_contents(&self, file: &Path) -> Result<proto::Digest, Error> {
        let digest = digests::compute_for_file(file).await?;
        let missing = self.find_missing_digests([digest.clone()]).await?;
        if !missing.is_empty() {
            let chunker = Chunker::builder()
                .chunk_size(self.options.chunk_size)
                .add_file_with_digest(file.to_path_buf(), digest.clone())
                .build()
                .await?;
            self.upload_chunks(chunker).await?;
        }
        Ok(digest)
    }

    /// Like [RemoteCacheClient::upload_file_contents], but for an input
    /// file whose digest is supplied by the fingerprint cache instead of
    /// read from disk.
    #[instrument(skip_all, err)]
    pub async fn upload_input(
        &self,
        input: &InputFile,
        exec_root: &Path,
        input_cache: &dyn InputDigestCache,
    ) -> Result<proto::Digest, Error> {
        let digest = input_cache.digest_for(input)?;
        let missing = self.find_missing_digests([digest.clone()]).await?;
        if !missing.is_empty() {
            let chunker = Chunker::builder()
                .chunk_size(self.options.chunk_size)
                .add_input(input, input_cache, exec_root)?
                .build()
                .await?;
            self.upload_chunks(chunker).await?;
        }
        Ok(digest)
    }

    /// In-memory form of [RemoteCacheClient::upload_file_contents]. The
    /// empty blob is never transferred (nor checked); its digest is a
    /// valid key everywhere without any upload.
    #[instrument(skip_all, err)]
    pub async fn upload_blob(&self, data: Bytes) -> Result<proto::Digest, Error> {
        let digest = digests::compute(&data);
        if digest.is_empty_blob() {
            return Ok(digest);
        }
        let missing = self.find_missing_digests([digest.clone()]).await?;
        if !missing.is_empty() {
            let chunker = Chunker::builder()
                .chunk_size(self.options.chunk_size)
                .add_blob(data)
                .build()
                .await
                // Chunking in-memory bytes performs no I/O.
                .map_err(|e| Error::Internal(format!("in-memory chunking failed: {}", e)))?;
            self.upload_chunks(chunker).await?;
        }
        Ok(digest)
    }

    /// Streams every chunk the chunker produces, one concurrent write
    /// stream per source blob. Each stream runs as its own task; its
    /// terminal result is the completion message the drain below
    /// aggregates. One failure anywhere fails the whole batch, but only
    /// after every stream has terminated, and the first error observed
    /// wins.
    async fn upload_chunks(&self, mut chunker: Chunker) -> Result<(), Error> {
        let mut streams: JoinSet<Result<(), Error>> = JoinSet::new();
        let mut current: Option<mpsc::Sender<proto::WriteRequest>> = None;

        while let Some(chunk) = chunker.next_chunk().await? {
            let finish_write =
                chunk.offset + chunk.data.len() as u64 == chunk.digest.size_bytes as u64;
            let mut request = proto::WriteRequest {
                resource_name: String::new(),
                write_offset: chunk.offset as i64,
                finish_write,
                data: chunk.data,
            };

            if chunk.offset == 0 {
                // Beginning of a new upload: open a fresh write stream
                // under a random upload id.
                request.resource_name = self.upload_resource_name(&chunk.digest);
                let (tx, rx) = mpsc::channel::<proto::WriteRequest>(16);
                let mut byte_stream = self.byte_stream_client();
                let rpc_request = self.request(ReceiverStream::new(rx));
                let digest = chunk.digest.clone();
                streams.spawn(async move {
                    let response = byte_stream.write(rpc_request).await?.into_inner();
                    // The transport reporting success is not enough; the
                    // server must have committed every byte.
                    if response.committed_size != digest.size_bytes {
                        return Err(Error::ShortCommit {
                            digest,
                            committed: response.committed_size,
                        });
                    }
                    Ok(())
                });
                current = Some(tx);
            }

            let delivered = match &current {
                Some(tx) => tx.send(request).await.is_ok(),
                None => false,
            };
            if !delivered && !finish_write {
                // The stream already terminated (transport error);
                // abandon the rest of this source so chunk production can
                // move on. The error itself surfaces from the drain.
                chunker.skip_current_source();
            }
            if finish_write || !delivered {
                // Close the stream for writing.
                current = None;
            }
        }
        drop(current);

        let drain = async {
            let mut first_error = None;
            while let Some(joined) = streams.join_next().await {
                let outcome = joined
                    .map_err(|e| Error::Internal(format!("upload stream task failed: {}", e)))
                    .and_then(|result| result);
                if let Err(e) = outcome {
                    first_error.get_or_insert(e);
                }
            }
            first_error
        };
        match tokio::time::timeout(self.options.timeout, drain).await {
            Ok(None) => Ok(()),
            Ok(Some(e)) => Err(e),
            Err(_) => Err(Error::DeadlineExceeded),
        }
    }

    async fn read_blob(
        &self,
        digest: &proto::Digest,
    ) -> Result<tonic::codec::Streaming<proto::ReadResponse>, Error> {
        let mut byte_stream = self.byte_stream_client();
        match byte_stream
            .read(self.request(proto::ReadRequest {
                resource_name: self.blob_resource_name(digest),
                read_offset: 0,
                read_limit: 0,
            }))
            .await
        {
            Ok(response) => Ok(response.into_inner()),
            Err(status) if status.code() == Code::NotFound => {
                Err(Error::NotFound(digest.clone()))
            }
            Err(status) => Err(status.into()),
        }
    }

    /// Fetches a blob's bytes. The empty blob is returned without a
    /// network round trip; for everything else the read stream is
    /// concatenated and the total is checked against the declared size.
    #[instrument(skip(self, digest), fields(blob.digest = %digest), err)]
    pub async fn download_blob(&self, digest: &proto::Digest) -> Result<Bytes, Error> {
        if digest.is_empty_blob() {
            return Ok(Bytes::new());
        }
        let mut stream = self.read_blob(digest).await?;
        let mut buf = BytesMut::with_capacity(digest.size_bytes as usize);
        while let Some(reply) = stream.message().await? {
            buf.put(reply.data);
        }
        if buf.len() as i64 != digest.size_bytes {
            return Err(Error::SizeMismatch {
                digest: digest.clone(),
                got: buf.len() as i64,
            });
        }
        Ok(buf.freeze())
    }

    /// Materializes all outputs of a cached action under the execution
    /// root: zero-size and inlined files are written locally, everything
    /// else is streamed from the byte-stream endpoint; the executable bit
    /// is applied afterward. A result with no outputs is a no-op.
    #[instrument(skip_all, err)]
    pub async fn download_all_results(
        &self,
        result: &proto::ActionResult,
        exec_root: &Path,
    ) -> Result<(), Error> {
        if result.output_files.is_empty() && result.output_directories.is_empty() {
            return Ok(());
        }
        for file in &result.output_files {
            let path = exec_root.join(&file.path);
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let digest = file.digest.clone().unwrap_or_default();
            if digest.is_empty_blob() {
                // Handle the empty file locally.
                tokio::fs::write(&path, &[]).await?;
            } else if !file.content.is_empty() {
                tokio::fs::write(&path, &file.content).await?;
            } else {
                let mut stream = self.read_blob(&digest).await?;
                let mut out = tokio::fs::File::create(&path).await?;
                let mut written = 0i64;
                while let Some(reply) = stream.message().await? {
                    written += reply.data.len() as i64;
                    out.write_all(&reply.data).await?;
                }
                out.flush().await?;
                if written != digest.size_bytes {
                    return Err(Error::SizeMismatch {
                        digest,
                        got: written,
                    });
                }
            }
            set_executable(&path, file.is_executable).await?;
        }
        for directory in &result.output_directories {
            let digest = directory.digest.clone().unwrap_or_default();
            self.download_tree(&digest, &exec_root.join(&directory.path))
                .await?;
        }
        Ok(())
    }

    /// Contract: populate `root_location` with the full tree addressed by
    /// `root_digest` (fetch the serialized listing, materialize children,
    /// recurse). Reconstruction is intentionally not implemented; see
    /// DESIGN.md.
    pub async fn download_tree(
        &self,
        _root_digest: &proto::Digest,
        _root_location: &Path,
    ) -> Result<(), Error> {
        Err(Error::Unsupported(
            "downloading an output directory tree is not implemented",
        ))
    }

    /// Returns the cached result for an action, or `None` if the server
    /// has none — an expected outcome, not an error.
    #[instrument(skip_all, fields(action = %action_key), err)]
    pub async fn get_cached_action_result(
        &self,
        action_key: &ActionKey,
    ) -> Result<Option<proto::ActionResult>, Error> {
        let mut action_cache = self.action_cache_client();
        match action_cache
            .get_action_result(self.request(proto::GetActionResultRequest {
                instance_name: self.options.instance_name.clone(),
                action_digest: Some(action_key.digest().clone()),
            }))
            .await
        {
            Ok(response) => Ok(Some(response.into_inner())),
            Err(status) if status.code() == Code::NotFound => Ok(None),
            Err(status) => Err(status.into()),
        }
    }

    /// Stores `result` as the result of the action. A server that
    /// declines to store results (UNIMPLEMENTED) is tolerated.
    #[instrument(skip_all, fields(action = %action_key), err)]
    pub async fn set_cached_action_result(
        &self,
        action_key: &ActionKey,
        result: &proto::ActionResult,
    ) -> Result<(), Error> {
        let mut action_cache = self.action_cache_client();
        match action_cache
            .update_action_result(self.request(proto::UpdateActionResultRequest {
                instance_name: self.options.instance_name.clone(),
                action_digest: Some(action_key.digest().clone()),
                action_result: Some(result.clone()),
            }))
            .await
        {
            Ok(_) => Ok(()),
            Err(status) if status.code() == Code::Unimplemented => {
                warn!("server does not store action results, skipping update");
                Ok(())
            }
            Err(status) => Err(status.into()),
        }
    }
}

#[cfg(unix)]
fn is_executable(metadata: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &std::fs::Metadata) -> bool {
    false
}

#[cfg(unix)]
async fn set_executable(path: &Path, executable: bool) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let metadata = tokio::fs::metadata(path).await?;
    let mut permissions = metadata.permissions();
    let mode = if executable {
        permissions.mode() | 0o111
    } else {
        permissions.mode() & !0o111
    };
    permissions.set_mode(mode);
    tokio::fs::set_permissions(path, permissions).await
}

#[cfg(not(unix))]
async fn set_executable(_path: &Path, _executable: bool) -> io::Result<()> {
    Ok(())
}

//! An in-process cache server for exercising [RemoteCacheClient] over a
//! real gRPC transport (a unix domain socket), with per-method call
//! counters and switchable fault injection.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use futures::stream::BoxStream;
use tokio::net::UnixListener;
use tokio_stream::wrappers::UnixListenerStream;
use tonic::transport::Server;
use tonic::Status;

use crate::client::{RemoteCacheClient, RemoteOptions};
use crate::digests;
use crate::proto::{
    self, action_cache_server::ActionCache, action_cache_server::ActionCacheServer,
    byte_stream_server::ByteStream, byte_stream_server::ByteStreamServer,
    content_addressable_storage_server::ContentAddressableStorage,
    content_addressable_storage_server::ContentAddressableStorageServer, Digest,
};

/// Shared state of the test server. Tests seed and inspect it directly.
#[derive(Default)]
pub struct ServerState {
    pub blobs: Mutex<HashMap<Digest, Bytes>>,
    pub action_results: Mutex<HashMap<Digest, proto::ActionResult>>,

    pub find_missing_calls: AtomicUsize,
    pub batch_update_calls: AtomicUsize,
    pub read_calls: AtomicUsize,
    pub write_calls: AtomicUsize,
    pub get_action_calls: AtomicUsize,
    pub update_action_calls: AtomicUsize,

    /// Write streams for blobs with these hashes fail immediately.
    pub fail_write_hashes: Mutex<HashSet<String>>,
    /// Write streams hang without ever answering.
    pub stall_writes: AtomicBool,
    /// Batch updates reject every entry.
    pub fail_batch_updates: AtomicBool,
    /// Finished writes acknowledge one byte less than was sent.
    pub short_commit: AtomicBool,
    /// Read streams drop the last byte of the blob.
    pub truncate_reads: AtomicBool,
    /// UpdateActionResult answers UNIMPLEMENTED.
    pub unimplemented_updates: AtomicBool,

    /// Metadata captured from the last FindMissingBlobs call.
    pub seen_authorization: Mutex<Option<String>>,
    pub seen_instance_name: Mutex<Option<String>>,
}

impl ServerState {
    pub fn seed_blob(&self, data: &[u8]) -> Digest {
        let digest = digests::compute(data);
        self.blobs
            .lock()
            .unwrap()
            .insert(digest.clone(), Bytes::copy_from_slice(data));
        digest
    }

    pub fn has_blob(&self, digest: &Digest) -> bool {
        self.blobs.lock().unwrap().contains_key(digest)
    }

    pub fn blob_count(&self) -> usize {
        self.blobs.lock().unwrap().len()
    }
}

/// Extracts `{hash}/{size}` from the tail of a blob or upload resource
/// name, tolerating any instance-name prefix.
fn parse_blob_resource(resource: &str) -> Result<Digest, Status> {
    let mut parts = resource.rsplit('/');
    let size_bytes = parts
        .next()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| Status::invalid_argument("malformed resource name: bad size"))?;
    let hash = parts
        .next()
        .ok_or_else(|| Status::invalid_argument("malformed resource name: no hash"))?
        .to_string();
    if parts.next() != Some("blobs") {
        return Err(Status::invalid_argument(
            "malformed resource name: missing blobs segment",
        ));
    }
    Ok(Digest { hash, size_bytes })
}

#[tonic::async_trait]
impl ContentAddressableStorage for ServerState {
    async fn find_missing_blobs(
        &self,
        request: tonic::Request<proto::FindMissingBlobsRequest>,
    ) -> Result<tonic::Response<proto::FindMissingBlobsResponse>, Status> {
        self.find_missing_calls.fetch_add(1, Ordering::SeqCst);
        *self.seen_authorization.lock().unwrap() = request
            .metadata()
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let request = request.into_inner();
        *self.seen_instance_name.lock().unwrap() = Some(request.instance_name.clone());

        let blobs = self.blobs.lock().unwrap();
        let missing_blob_digests = request
            .blob_digests
            .into_iter()
            .filter(|d| !blobs.contains_key(d))
            .collect();
        Ok(tonic::Response::new(proto::FindMissingBlobsResponse {
            missing_blob_digests,
        }))
    }

    async fn batch_update_blobs(
        &self,
        request: tonic::Request<proto::BatchUpdateBlobsRequest>,
    ) -> Result<tonic::Response<proto::BatchUpdateBlobsResponse>, Status> {
        self.batch_update_calls.fetch_add(1, Ordering::SeqCst);
        let request = request.into_inner();
        let mut responses = Vec::with_capacity(request.requests.len());
        for entry in request.requests {
            let digest = entry
                .content_digest
                .ok_or_else(|| Status::invalid_argument("batch entry without digest"))?;
            let status = if self.fail_batch_updates.load(Ordering::SeqCst) {
                proto::RpcStatus {
                    code: tonic::Code::ResourceExhausted as i32,
                    message: "injected batch failure".to_string(),
                }
            } else if digests::compute(&entry.data) != digest {
                proto::RpcStatus {
                    code: tonic::Code::InvalidArgument as i32,
                    message: "digest does not match data".to_string(),
                }
            } else {
                self.blobs
                    .lock()
                    .unwrap()
                    .insert(digest.clone(), entry.data);
                proto::RpcStatus::default()
            };
            responses.push(proto::batch_update_blobs_response::Response {
                blob_digest: Some(digest),
                status: Some(status),
            });
        }
        Ok(tonic::Response::new(proto::BatchUpdateBlobsResponse {
            responses,
        }))
    }
}

#[tonic::async_trait]
impl ByteStream for ServerState {
    type ReadStream = BoxStream<'static, Result<proto::ReadResponse, Status>>;

    async fn read(
        &self,
        request: tonic::Request<proto::ReadRequest>,
    ) -> Result<tonic::Response<Self::ReadStream>, Status> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        let digest = parse_blob_resource(&request.into_inner().resource_name)?;
        let mut data = self
            .blobs
            .lock()
            .unwrap()
            .get(&digest)
            .cloned()
            .ok_or_else(|| Status::not_found(format!("blob {} not found", digest)))?;
        if self.truncate_reads.load(Ordering::SeqCst) && !data.is_empty() {
            data = data.slice(..data.len() - 1);
        }

        let mut replies = Vec::new();
        while !data.is_empty() {
            let n = std::cmp::min(64 * 1024, data.len());
            replies.push(Ok(proto::ReadResponse {
                data: data.split_to(n),
            }));
        }
        Ok(tonic::Response::new(Box::pin(futures::stream::iter(
            replies,
        ))))
    }

    async fn write(
        &self,
        request: tonic::Request<tonic::Streaming<proto::WriteRequest>>,
    ) -> Result<tonic::Response<proto::WriteResponse>, Status> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        if self.stall_writes.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        let mut stream = request.into_inner();

        let first = stream
            .message()
            .await?
            .ok_or_else(|| Status::invalid_argument("empty write stream"))?;
        let digest = parse_blob_resource(&first.resource_name)?;
        if self
            .fail_write_hashes
            .lock()
            .unwrap()
            .contains(&digest.hash)
        {
            return Err(Status::unavailable("injected write failure"));
        }

        let mut data = Vec::with_capacity(digest.size_bytes as usize);
        let mut finished = first.finish_write;
        if first.write_offset != 0 {
            return Err(Status::invalid_argument("write must start at offset 0"));
        }
        data.extend_from_slice(&first.data);
        while !finished {
            let message = stream
                .message()
                .await?
                .ok_or_else(|| Status::invalid_argument("stream ended before finish_write"))?;
            if message.write_offset != data.len() as i64 {
                return Err(Status::invalid_argument("non-contiguous write offset"));
            }
            data.extend_from_slice(&message.data);
            finished = message.finish_write;
        }

        let received = digests::compute(&data);
        if received != digest {
            return Err(Status::invalid_argument(
                "uploaded data does not match resource digest",
            ));
        }
        self.blobs
            .lock()
            .unwrap()
            .insert(digest.clone(), data.into());

        let mut committed_size = digest.size_bytes;
        if self.short_commit.load(Ordering::SeqCst) {
            committed_size -= 1;
        }
        Ok(tonic::Response::new(proto::WriteResponse {
            committed_size,
        }))
    }
}

#[tonic::async_trait]
impl ActionCache for ServerState {
    async fn get_action_result(
        &self,
        request: tonic::Request<proto::GetActionResultRequest>,
    ) -> Result<tonic::Response<proto::ActionResult>, Status> {
        self.get_action_calls.fetch_add(1, Ordering::SeqCst);
        let digest = request
            .into_inner()
            .action_digest
            .ok_or_else(|| Status::invalid_argument("missing action digest"))?;
        self.action_results
            .lock()
            .unwrap()
            .get(&digest)
            .cloned()
            .map(tonic::Response::new)
            .ok_or_else(|| Status::not_found("no cached result for action"))
    }

    async fn update_action_result(
        &self,
        request: tonic::Request<proto::UpdateActionResultRequest>,
    ) -> Result<tonic::Response<proto::ActionResult>, Status> {
        self.update_action_calls.fetch_add(1, Ordering::SeqCst);
        if self.unimplemented_updates.load(Ordering::SeqCst) {
            return Err(Status::unimplemented("result storage disabled"));
        }
        let request = request.into_inner();
        let digest = request
            .action_digest
            .ok_or_else(|| Status::invalid_argument("missing action digest"))?;
        let result = request
            .action_result
            .ok_or_else(|| Status::invalid_argument("missing action result"))?;
        self.action_results
            .lock()
            .unwrap()
            .insert(digest, result.clone());
        Ok(tonic::Response::new(result))
    }
}

/// A running server plus a connected client. Dropping it tears the socket
/// down with the tempdir.
pub struct TestServer {
    pub state: Arc<ServerState>,
    pub client: RemoteCacheClient,
    _tempdir: tempfile::TempDir,
}

/// Spins up all three services on a unix socket in a fresh tempdir and
/// connects a client with the given options.
pub async fn start_server(options: RemoteOptions) -> TestServer {
    let tempdir = tempfile::tempdir().expect("creating tempdir");
    let socket_path = tempdir.path().join("cache.sock");

    let state = Arc::new(ServerState::default());
    let listener = UnixListener::bind(&socket_path).expect("binding socket");
    {
        let state = state.clone();
        tokio::spawn(async move {
            Server::builder()
                .add_service(ContentAddressableStorageServer::from_arc(state.clone()))
                .add_service(ByteStreamServer::from_arc(state.clone()))
                .add_service(ActionCacheServer::from_arc(state))
                .serve_with_incoming(UnixListenerStream::new(listener))
                .await
        });
    }

    let url = url::Url::parse(&format!(
        "grpc+unix://{}?wait-connect=1",
        socket_path.display()
    ))
    .expect("parsing socket url");

    // The server task may not be accepting yet; retry the connect.
    let channel = tokio_retry::Retry::spawn(
        tokio_retry::strategy::ExponentialBackoff::from_millis(20)
            .max_delay(Duration::from_secs(1))
            .take(10),
        || crate::channel::from_url(&url),
    )
    .await
    .expect("connecting to test server");

    let client = RemoteCacheClient::new(channel, options).expect("constructing client");
    TestServer {
        state,
        client,
        _tempdir: tempdir,
    }
}

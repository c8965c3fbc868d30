//! Client stubs for the `recache.v1` services, in the shape `tonic-build`
//! emits for them.

/// Client for the content-addressable storage service.
pub mod content_addressable_storage_client {
    #![allow(
        unused_variables,
        dead_code,
        missing_docs,
        clippy::wildcard_imports,
        clippy::let_unit_value
    )]
    use tonic::codegen::*;

    #[derive(Debug, Clone)]
    pub struct ContentAddressableStorageClient<T> {
        inner: tonic::client::Grpc<T>,
    }

    impl<T> ContentAddressableStorageClient<T>
    where
        T: tonic::client::GrpcService<tonic::body::BoxBody>,
        T::Error: Into<StdError>,
        T::ResponseBody: Body<Data = Bytes> + std::marker::Send + 'static,
        <T::ResponseBody as Body>::Error: Into<StdError> + std::marker::Send,
    {
        pub fn new(inner: T) -> Self {
            let inner = tonic::client::Grpc::new(inner);
            Self { inner }
        }

        /// Queries which of the given blob digests are absent from server
        /// storage.
        pub async fn find_missing_blobs(
            &mut self,
            request: impl tonic::IntoRequest<super::super::FindMissingBlobsRequest>,
        ) -> std::result::Result<
            tonic::Response<super::super::FindMissingBlobsResponse>,
            tonic::Status,
        > {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::unknown(format!("Service was not ready: {}", e.into()))
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static(
                "/recache.v1.ContentAddressableStorage/FindMissingBlobs",
            );
            let mut req = request.into_request();
            req.extensions_mut().insert(GrpcMethod::new(
                "recache.v1.ContentAddressableStorage",
                "FindMissingBlobs",
            ));
            self.inner.unary(req, path, codec).await
        }

        /// Uploads a batch of small blobs in a single unary call.
        pub async fn batch_update_blobs(
            &mut self,
            request: impl tonic::IntoRequest<super::super::BatchUpdateBlobsRequest>,
        ) -> std::result::Result<
            tonic::Response<super::super::BatchUpdateBlobsResponse>,
            tonic::Status,
        > {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::unknown(format!("Service was not ready: {}", e.into()))
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static(
                "/recache.v1.ContentAddressableStorage/BatchUpdateBlobs",
            );
            let mut req = request.into_request();
            req.extensions_mut().insert(GrpcMethod::new(
                "recache.v1.ContentAddressableStorage",
                "BatchUpdateBlobs",
            ));
            self.inner.unary(req, path, codec).await
        }
    }
}

/// Client for the byte-stream service.
pub mod byte_stream_client {
    #![allow(
        unused_variables,
        dead_code,
        missing_docs,
        clippy::wildcard_imports,
        clippy::let_unit_value
    )]
    use tonic::codegen::*;

    #[derive(Debug, Clone)]
    pub struct ByteStreamClient<T> {
        inner: tonic::client::Grpc<T>,
    }

    impl<T> ByteStreamClient<T>
    where
        T: tonic::client::GrpcService<tonic::body::BoxBody>,
        T::Error: Into<StdError>,
        T::ResponseBody: Body<Data = Bytes> + std::marker::Send + 'static,
        <T::ResponseBody as Body>::Error: Into<StdError> + std::marker::Send,
    {
        pub fn new(inner: T) -> Self {
            let inner = tonic::client::Grpc::new(inner);
            Self { inner }
        }

        /// Streams the contents of the blob addressed by the resource
        /// name, as a sequence of data chunks.
        pub async fn read(
            &mut self,
            request: impl tonic::IntoRequest<super::super::ReadRequest>,
        ) -> std::result::Result<
            tonic::Response<tonic::codec::Streaming<super::super::ReadResponse>>,
            tonic::Status,
        > {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::unknown(format!("Service was not ready: {}", e.into()))
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static("/recache.v1.ByteStream/Read");
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new("recache.v1.ByteStream", "Read"));
            self.inner.server_streaming(req, path, codec).await
        }

        /// Uploads one blob as a client-side stream of offset-ordered
        /// chunks; the response carries the cumulative committed size.
        pub async fn write(
            &mut self,
            request: impl tonic::IntoStreamingRequest<Message = super::super::WriteRequest>,
        ) -> std::result::Result<tonic::Response<super::super::WriteResponse>, tonic::Status>
        {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::unknown(format!("Service was not ready: {}", e.into()))
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static("/recache.v1.ByteStream/Write");
            let mut req = request.into_streaming_request();
            req.extensions_mut()
                .insert(GrpcMethod::new("recache.v1.ByteStream", "Write"));
            self.inner.client_streaming(req, path, codec).await
        }
    }
}

/// Client for the action-result cache service.
pub mod action_cache_client {
    #![allow(
        unused_variables,
        dead_code,
        missing_docs,
        clippy::wildcard_imports,
        clippy::let_unit_value
    )]
    use tonic::codegen::*;

    #[derive(Debug, Clone)]
    pub struct ActionCacheClient<T> {
        inner: tonic::client::Grpc<T>,
    }

    impl<T> ActionCacheClient<T>
    where
        T: tonic::client::GrpcService<tonic::body::BoxBody>,
        T::Error: Into<StdError>,
        T::ResponseBody: Body<Data = Bytes> + std::marker::Send + 'static,
        <T::ResponseBody as Body>::Error: Into<StdError> + std::marker::Send,
    {
        pub fn new(inner: T) -> Self {
            let inner = tonic::client::Grpc::new(inner);
            Self { inner }
        }

        /// Looks up the cached result for an action digest. Answers
        /// NOT_FOUND if no result is stored.
        pub async fn get_action_result(
            &mut self,
            request: impl tonic::IntoRequest<super::super::GetActionResultRequest>,
        ) -> std::result::Result<tonic::Response<super::super::ActionResult>, tonic::Status>
        {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::unknown(format!("Service was not ready: {}", e.into()))
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static(
                "/recache.v1.ActionCache/GetActionResult",
            );
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new("recache.v1.ActionCache", "GetActionResult"));
            self.inner.unary(req, path, codec).await
        }

        /// Stores the result for an action digest. Servers may answer
        /// UNIMPLEMENTED if they do not accept client-written results.
        pub async fn update_action_result(
            &mut self,
            request: impl tonic::IntoRequest<super::super::UpdateActionResultRequest>,
        ) -> std::result::Result<tonic::Response<super::super::ActionResult>, tonic::Status>
        {
            self.inner.ready().await.map_err(|e| {
                tonic::Status::unknown(format!("Service was not ready: {}", e.into()))
            })?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static(
                "/recache.v1.ActionCache/UpdateActionResult",
            );
            let mut req = request.into_request();
            req.extensions_mut().insert(GrpcMethod::new(
                "recache.v1.ActionCache",
                "UpdateActionResult",
            ));
            self.inner.unary(req, path, codec).await
        }
    }
}

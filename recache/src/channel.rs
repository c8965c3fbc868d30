//! Constructs a tonic [Channel] from a URL.

use tokio::net::UnixStream;
use tonic::transport::{Channel, Endpoint};

/// Errors occurring when trying to connect to a cache endpoint.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("grpc+ prefix is missing from URL")]
    MissingGrpcPrefix,

    #[error("host may not be set for unix domain sockets")]
    HostSetForUnixSocket,

    #[error("path may not be set")]
    PathMayNotBeSet,

    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),
}

fn wants_wait_connect(url: &url::Url) -> bool {
    url.query_pairs()
        .any(|(k, v)| k == "wait-connect" && v == "1")
}

/// Turns a [url::Url] into a [Channel] if it can be parsed successfully.
/// Supported schemes:
///  - `grpc+http://[::1]:8000`, unencrypted HTTP/2 (h2c)
///  - `grpc+https://[::1]:8000`, encrypted HTTP/2
///  - `grpc+unix:/path/to/socket`, a unix domain socket
///
/// Adding `wait-connect=1` as a URL parameter makes the connection be
/// established eagerly instead of on first use.
pub async fn from_url(url: &url::Url) -> Result<Channel, ChannelError> {
    match url.scheme() {
        "grpc+unix" => {
            if url.host_str().is_some() {
                return Err(ChannelError::HostSetForUnixSocket);
            }

            let connector = tower::service_fn({
                let url = url.clone();
                move |_: tonic::transport::Uri| {
                    let path = url.path().to_string();
                    // tonic wants a hyper-compatible io object, not the
                    // raw tokio stream.
                    async move {
                        UnixStream::connect(path)
                            .await
                            .map(hyper_util::rt::TokioIo::new)
                    }
                }
            });

            // The endpoint URI is never dialed, the connector is.
            let endpoint = Endpoint::from_static("http://[::]:50051");
            if wants_wait_connect(url) {
                Ok(endpoint.connect_with_connector(connector).await?)
            } else {
                Ok(endpoint.connect_with_connector_lazy(connector))
            }
        }
        _ => {
            // A path makes no sense for a gRPC endpoint.
            if !url.path().is_empty() {
                return Err(ChannelError::PathMayNotBeSet);
            }

            // Strip the grpc+ prefix and hand the rest to the regular
            // tonic endpoint logic, which doesn't know about grpc+http[s].
            let stripped = url
                .to_string()
                .strip_prefix("grpc+")
                .map(str::to_owned)
                .ok_or(ChannelError::MissingGrpcPrefix)?;

            let endpoint = Endpoint::try_from(stripped)?;
            if wants_wait_connect(url) {
                Ok(endpoint.connect().await?)
            } else {
                Ok(endpoint.connect_lazy())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::from_url;
    use rstest::rstest;
    use url::Url;

    #[rstest]
    /// Correct scheme to connect to a unix socket (lazily).
    #[case::unix_socket("grpc+unix:///path/to/somewhere", true)]
    /// Eagerly connecting to a nonexistent socket fails.
    #[case::unix_socket_wait_connect("grpc+unix:///path/to/somewhere?wait-connect=1", false)]
    /// A host is invalid for unix sockets.
    #[case::unix_socket_with_host("grpc+unix://host.example/path/to/somewhere", false)]
    /// Correct scheme for a TCP endpoint.
    #[case::http_host_and_port("grpc+http://[::1]:12345", true)]
    #[case::https_host("grpc+https://localhost", true)]
    /// A path is invalid for TCP endpoints.
    #[case::http_host_and_path("grpc+http://localhost/some-path", false)]
    /// Eagerly connecting to a nonexistent host fails.
    #[case::http_wait_connect("grpc+http://nonexist.invalid?wait-connect=1", false)]
    #[tokio::test]
    async fn test_from_url(#[case] url_str: &str, #[case] is_ok: bool) {
        let url = Url::parse(url_str).expect("must parse");
        assert_eq!(from_url(&url).await.is_ok(), is_ok);
    }
}

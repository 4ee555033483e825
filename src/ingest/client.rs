use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

/// Identifying header sent with every feed request
pub const USER_AGENT: &str = concat!("graze/", env!("CARGO_PKG_VERSION"));

/// Response bodies above this size are rejected outright
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024; // 10MB

/// Errors from one feed fetch. Every variant carries the URL so the scheduler
/// can log which feed failed without extra bookkeeping.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level failure (DNS, connection, TLS, timeout) or body-read failure
    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    /// HTTP response with a non-2xx status code
    #[error("{url} returned HTTP status {status}")]
    Status { url: String, status: u16 },
    /// Response body exceeded the size limit
    #[error("{url} response exceeded {limit} bytes")]
    TooLarge { url: String, limit: usize },
}

/// HTTP client for retrieving raw feed bytes.
///
/// One fetch is one GET with the identifying `User-Agent` and a bounded body
/// read; no retries here, a failed fetch is skipped until the feed's next
/// scheduled cycle. Cancellation is by dropping the future: the scheduler
/// races `fetch` against its shutdown token, and reqwest aborts the in-flight
/// request when the future is dropped.
#[derive(Clone)]
pub struct FetchClient {
    http: reqwest::Client,
}

impl FetchClient {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self { http })
    }

    /// Retrieve the raw bytes for one feed URL.
    ///
    /// No partial bytes are returned on error.
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|source| FetchError::Network {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        read_limited_bytes(url, response, MAX_BODY_BYTES).await
    }
}

async fn read_limited_bytes(
    url: &str,
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Fast path: reject on the Content-Length header before reading anything
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(FetchError::TooLarge {
                url: url.to_string(),
                limit,
            });
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|source| FetchError::Network {
            url: url.to_string(),
            source,
        })?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::TooLarge {
                url: url.to_string(),
                limit,
            });
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> FetchClient {
        FetchClient::new(Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_sends_identifying_user_agent() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("user-agent", USER_AGENT))
            .respond_with(ResponseTemplate::new(200).set_body_string("<rss/>"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let bytes = client().fetch(&mock_server.uri()).await.unwrap();
        assert_eq!(bytes, b"<rss/>");
    }

    #[tokio::test]
    async fn test_fetch_non_success_status() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let err = client().fetch(&mock_server.uri()).await.unwrap_err();
        match err {
            FetchError::Status { status: 404, .. } => {}
            e => panic!("Expected Status(404), got {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_fetch_network_error_carries_url() {
        // Nothing is listening on this port
        let err = client()
            .fetch("http://127.0.0.1:1/feed.xml")
            .await
            .unwrap_err();
        match err {
            FetchError::Network { url, .. } => assert_eq!(url, "http://127.0.0.1:1/feed.xml"),
            e => panic!("Expected Network error, got {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_fetch_rejects_oversized_body() {
        let mock_server = MockServer::start().await;
        let body = vec![b'x'; MAX_BODY_BYTES + 1];
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
            .mount(&mock_server)
            .await;

        let err = client().fetch(&mock_server.uri()).await.unwrap_err();
        assert!(matches!(err, FetchError::TooLarge { .. }));
    }
}

//! HTTP client for ranged downloads.
//!
//! [`HttpRangeClient`] issues a single request per call and exposes the
//! response body as a blocking byte stream. It is stateless and makes no
//! retry decisions; resumption is expressed purely through the `Range`
//! header supplied by the caller. The connection is closed when the body is
//! dropped, on every exit path.

use std::io::Read;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::redirect::Policy;
use reqwest::Method;

use crate::error::{DownloadError, DownloadResult};

/// Maximum number of redirects to follow.
const MAX_REDIRECTS: usize = 10;

/// Response to a ranged request.
pub struct RangeResponse {
    /// HTTP status code.
    pub status: u16,
    /// Remaining content length as reported by the server, when known.
    pub content_length: Option<u64>,
    /// The response body. Dropping it closes the connection.
    pub body: Box<dyn Read + Send>,
}

/// A client that can fetch a resource starting at a byte offset.
///
/// Seam for tests; the production implementation is [`HttpRangeClient`].
pub trait RangeClient: Send + Sync {
    /// Issue a GET for `url` starting at `offset` bytes.
    fn get(&self, url: &str, offset: u64) -> DownloadResult<RangeResponse>;
}

/// HTTP(S) implementation of [`RangeClient`] with attempt-scoped timeouts.
pub struct HttpRangeClient {
    client: Client,
    read_timeout: Duration,
}

impl HttpRangeClient {
    /// Create a client with the given connect and read timeouts.
    pub fn new(connect_timeout: Duration, read_timeout: Duration) -> Self {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(read_timeout)
            .redirect(Policy::limited(MAX_REDIRECTS))
            .build()
            .expect("failed to build HTTP client");

        Self {
            client,
            read_timeout,
        }
    }

    /// Issue a single request with the given method and headers.
    ///
    /// Exactly one attempt is made; transport faults map to
    /// [`DownloadError::Network`] or [`DownloadError::Timeout`].
    pub fn request(
        &self,
        url: &str,
        method: Method,
        headers: &[(String, String)],
    ) -> DownloadResult<RangeResponse> {
        let mut request = self.client.request(method, url);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().map_err(|e| {
            if e.is_timeout() {
                DownloadError::Timeout {
                    timeout_secs: self.read_timeout.as_secs(),
                }
            } else {
                DownloadError::Network(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let content_length = response.content_length();

        Ok(RangeResponse {
            status,
            content_length,
            body: Box::new(response),
        })
    }
}

impl RangeClient for HttpRangeClient {
    fn get(&self, url: &str, offset: u64) -> DownloadResult<RangeResponse> {
        let headers = [("Range".to_string(), format!("bytes={}-", offset))];
        self.request(url, Method::GET, &headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_construction() {
        let client = HttpRangeClient::new(Duration::from_secs(10), Duration::from_secs(20));
        assert_eq!(client.read_timeout.as_secs(), 20);
    }
}

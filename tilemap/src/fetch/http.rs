//! HTTP client abstraction for testability.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use super::FetchError;

/// Trait for HTTP tile downloads.
///
/// This abstraction allows for dependency injection and easier testing by
/// enabling mock HTTP clients in tests. Implementations perform a single
/// GET and return the body bytes of a successful response.
pub trait HttpClient: Send + Sync + 'static {
    /// Performs an HTTP GET request.
    ///
    /// # Arguments
    ///
    /// * `url` - The URL to request
    ///
    /// # Returns
    ///
    /// The response body as bytes, or an error for connection failures and
    /// non-2xx status codes.
    fn get(&self, url: &str) -> impl Future<Output = Result<Bytes, FetchError>> + Send;
}

/// Blanket implementation so a shared client can be handed to the worker.
impl<C: HttpClient> HttpClient for Arc<C> {
    fn get(&self, url: &str) -> impl Future<Output = Result<Bytes, FetchError>> + Send {
        C::get(self, url)
    }
}

/// Real HTTP client implementation using reqwest.
///
/// The `User-Agent` header and the request timeout are fixed at
/// construction; every request carries them.
#[derive(Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    /// Creates a new ReqwestClient.
    ///
    /// # Arguments
    ///
    /// * `user_agent` - Value of the `User-Agent` header sent with every GET
    /// * `timeout` - Network-level request timeout
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Http(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client })
    }
}

impl HttpClient for ReqwestClient {
    async fn get(&self, url: &str) -> Result<Bytes, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Http(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        response
            .bytes()
            .await
            .map_err(|e| FetchError::Http(format!("failed to read response: {e}")))
    }
}

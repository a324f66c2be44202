use async_trait::async_trait;
use axum::body::Body as AxumBody;
use hyper::{Request, Response};
use thiserror::Error;

/// Custom error type for upstream HTTP calls
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum HttpClientError {
    /// Error when connection to the upstream fails
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error when the upstream does not answer in time
    #[error("Timeout error after {0:?}")]
    Timeout(std::time::Duration),

    /// Error when the outgoing request cannot be sent as built
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Result type alias for HTTP client operations
pub type HttpClientResult<T> = Result<T, HttpClientError>;

/// HttpClient defines the port (interface) through which proxy routes reach upstream servers
#[async_trait]
pub trait HttpClient: Send + Sync + 'static {
    /// Send an HTTP request upstream
    ///
    /// # Arguments
    /// * `req` - The fully rewritten request, with an absolute URI
    ///
    /// # Returns
    /// The upstream response with a streaming body, or an error
    async fn send_request(&self, req: Request<AxumBody>) -> HttpClientResult<Response<AxumBody>>;
}

use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body as AxumBody;
use eyre::Result;
use hyper::{Request, Response, Version, header, header::HeaderValue};
use hyper_rustls::HttpsConnector;
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::TokioExecutor,
};
use rustls_native_certs::load_native_certs;
use tokio::time::timeout;

use crate::ports::http_client::{HttpClient, HttpClientError, HttpClientResult};

/// Upstream client used by proxy routes: Hyper with a Rustls connector.
///
/// Responsibilities:
/// * Derives the `Host` header from the outgoing absolute URI
/// * Forces request version to HTTP/1.1
/// * Optionally bounds each exchange with a timeout
/// * Converts between Hyper body and Axum body types
pub struct HttpClientAdapter {
    client: Client<HttpsConnector<HttpConnector>, AxumBody>,
    timeout: Option<Duration>,
}

impl HttpClientAdapter {
    /// Create a new HTTP client adapter.
    pub fn new() -> Result<Self> {
        // Install default crypto provider for rustls if not already set
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

        let mut http_connector = HttpConnector::new();
        http_connector.enforce_http(false); // Allow HTTPS URLs

        let mut root_cert_store = rustls::RootCertStore::empty();
        let native_certs = load_native_certs();

        if !native_certs.certs.is_empty() {
            for cert in native_certs.certs {
                if root_cert_store.add(cert).is_err() {
                    tracing::warn!("Failed to add native certificate to rustls RootCertStore");
                }
            }
            tracing::info!("Loaded {} native root certificates.", root_cert_store.len());
        }

        if !native_certs.errors.is_empty() {
            tracing::warn!(
                "Some native certificates failed to load: {:?}",
                native_certs.errors
            );
        }

        let tls_config = rustls::ClientConfig::builder()
            .with_root_certificates(root_cert_store)
            .with_no_client_auth();

        let https_connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_tls_config(tls_config)
            .https_or_http()
            .enable_http1()
            .wrap_connector(http_connector);

        let client = Client::builder(TokioExecutor::new()).build::<_, AxumBody>(https_connector);

        tracing::debug!("Created upstream HTTP client");
        Ok(Self {
            client,
            timeout: None,
        })
    }

    /// Bound every upstream exchange (until response headers arrive) by `duration`.
    pub fn with_timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    fn set_host_header(req: &mut Request<AxumBody>) -> HttpClientResult<()> {
        let Some(host) = req.uri().host() else {
            tracing::error!("Outgoing URI has no host: {}", req.uri());
            return Err(HttpClientError::InvalidRequest(
                "Outgoing URI has no host".to_string(),
            ));
        };
        let value = match req.uri().port() {
            Some(port) => HeaderValue::from_str(&format!("{host}:{}", port.as_u16())),
            None => HeaderValue::from_str(host),
        }
        .map_err(|e| HttpClientError::InvalidRequest(e.to_string()))?;

        req.headers_mut().insert(header::HOST, value);
        Ok(())
    }
}

#[async_trait]
impl HttpClient for HttpClientAdapter {
    async fn send_request(
        &self,
        mut req: Request<AxumBody>,
    ) -> HttpClientResult<Response<AxumBody>> {
        Self::set_host_header(&mut req)?;

        let (mut parts, body) = req.into_parts();
        parts.version = Version::HTTP_11;
        let method = parts.method.clone();
        let uri = parts.uri.clone();

        tracing::debug!("Sending upstream request: {} {}", method, uri);
        tracing::trace!("Outgoing request headers: {:?}", parts.headers);

        let pending = self.client.request(Request::from_parts(parts, body));
        let result = match self.timeout {
            Some(limit) => match timeout(limit, pending).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::error!("Upstream request {} {} timed out after {:?}", method, uri, limit);
                    return Err(HttpClientError::Timeout(limit));
                }
            },
            None => pending.await,
        };

        match result {
            Ok(response) => {
                let (mut parts, hyper_body) = response.into_parts();

                // The body is re-framed by the serving side.
                parts.headers.remove(header::TRANSFER_ENCODING);

                Ok(Response::from_parts(parts, AxumBody::new(hyper_body)))
            }
            Err(e) => {
                tracing::error!("Error making upstream request ({} {}): {}", method, uri, e);
                Err(HttpClientError::ConnectionError(format!(
                    "Request to {method} {uri} failed: {e}"
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_http_client_creation() {
        let client = HttpClientAdapter::new();
        assert!(client.is_ok());
    }

    #[test]
    fn test_host_header_includes_explicit_port() {
        let mut req = Request::builder()
            .uri("http://upstream.local:8081/path")
            .body(AxumBody::empty())
            .unwrap();
        HttpClientAdapter::set_host_header(&mut req).unwrap();
        assert_eq!(
            req.headers().get(header::HOST).unwrap(),
            "upstream.local:8081"
        );
    }

    #[tokio::test]
    async fn test_relative_uri_is_rejected() {
        let client = HttpClientAdapter::new().unwrap();
        let req = Request::builder()
            .uri("/only/a/path")
            .body(AxumBody::empty())
            .unwrap();

        let result = client.send_request(req).await;
        assert!(matches!(result, Err(HttpClientError::InvalidRequest(_))));
    }
}

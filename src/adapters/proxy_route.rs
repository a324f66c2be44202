//! Reverse-proxy route.
//!
//! On every match the configured target is re-resolved against the inbound request:
//! * the `X-ENGINE-DYNAMIC-TAG` / `X-ENGINE-DYNAMIC-VALUE` header pair substitutes text in the
//!   target path,
//! * inbound query parameters override the target's (first value per key),
//! * a target without a host turns the request into a `303 See Other` to the resolved path.
//!
//! Anything else is forwarded through an [`HttpClient`]. With `rewrite` the target replaces the
//! request path outright; without it the request path is appended to the target path.
use std::{collections::BTreeMap, fmt, net::SocketAddr, sync::Arc};

use async_trait::async_trait;
use axum::{body::Body as AxumBody, extract::ConnectInfo};
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri, header};
use hyper::Request;
use thiserror::Error;
use tracing::Instrument;
use url::{Url, form_urlencoded};

use crate::{
    adapters::http_client::HttpClientAdapter,
    core::{HttpRequest, ResponseWriter, Route, Values},
    ports::http_client::HttpClient,
    tracing_setup::create_proxy_span,
};

/// Header naming the placeholder to replace in the target path.
pub const DYNAMIC_TAG_HEADER: &str = "x-engine-dynamic-tag";
/// Header carrying the replacement for [`DYNAMIC_TAG_HEADER`].
pub const DYNAMIC_VALUE_HEADER: &str = "x-engine-dynamic-value";

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Error raised while building a proxy route
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ProxyError {
    #[error("invalid proxy target '{target}': {reason}")]
    InvalidTarget { target: String, reason: String },

    #[error("failed to create upstream client: {0}")]
    Client(String),
}

/// What a proxied request turns into once the target is resolved.
enum Resolution {
    Redirect(String),
    Forward(Request<AxumBody>),
}

/// Route forwarding matched requests to an upstream target.
pub struct ProxyRoute {
    pattern: String,
    method: Method,
    target: String,
    rewrite: bool,
    client: Arc<dyn HttpClient>,
}

/// Build a proxy route with its own upstream client.
pub fn create_proxy_route(
    pattern: impl Into<String>,
    method: Method,
    target: impl Into<String>,
    rewrite: bool,
) -> Result<ProxyRoute, ProxyError> {
    let client = HttpClientAdapter::new().map_err(|e| ProxyError::Client(e.to_string()))?;
    ProxyRoute::new(pattern, method, target, rewrite, Arc::new(client))
}

impl ProxyRoute {
    /// Build a proxy route sending through `client`.
    ///
    /// The target must be an absolute URI (`scheme://authority/...`) or, for redirect-only
    /// targets, a path starting with `/`.
    pub fn new(
        pattern: impl Into<String>,
        method: Method,
        target: impl Into<String>,
        rewrite: bool,
        client: Arc<dyn HttpClient>,
    ) -> Result<Self, ProxyError> {
        let target = target.into();
        validate_target(&target)?;
        Ok(Self {
            pattern: pattern.into(),
            method,
            target,
            rewrite,
            client,
        })
    }

    pub fn with_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.client = client;
        self
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn rewrite(&self) -> bool {
        self.rewrite
    }

    fn resolve(&self, req: &mut HttpRequest) -> Result<Resolution, String> {
        let target: Uri = self
            .target
            .parse()
            .map_err(|e| format!("illegal proxy target {}: {e}", self.target))?;

        let mut path = target.path().to_string();
        if let (Some(tag), Some(value)) = (
            header_str(req.headers(), DYNAMIC_TAG_HEADER),
            header_str(req.headers(), DYNAMIC_VALUE_HEADER),
        ) {
            path = path.replace(tag, value);
        }
        let path = escape_path(&path);

        let query = merge_query(target.query(), req.uri().query());

        let (Some(scheme), Some(authority)) = (target.scheme(), target.authority()) else {
            return Ok(Resolution::Redirect(join_query(path, &query)));
        };

        let (path, query) = if self.rewrite {
            (path, query)
        } else {
            let joined = single_joining_slash(&path, req.uri().path());
            let query = match req.uri().query() {
                Some(raw) if !raw.is_empty() && !query.is_empty() => format!("{query}&{raw}"),
                Some(raw) if !raw.is_empty() => raw.to_string(),
                _ => query,
            };
            (joined, query)
        };

        let uri = Uri::builder()
            .scheme(scheme.clone())
            .authority(authority.clone())
            .path_and_query(join_query(path, &query))
            .build()
            .map_err(|e| format!("cannot build upstream URI: {e}"))?;

        let mut headers = req.headers().clone();
        strip_hop_by_hop(&mut headers);
        headers.remove(header::HOST);
        if let Some(ConnectInfo(peer)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
            append_forwarded_for(&mut headers, &peer.ip().to_string());
        }

        let mut upstream = Request::builder()
            .method(req.method().clone())
            .uri(uri)
            .body(std::mem::take(req.body_mut()))
            .map_err(|e| format!("cannot build upstream request: {e}"))?;
        *upstream.headers_mut() = headers;
        Ok(Resolution::Forward(upstream))
    }
}

impl fmt::Debug for ProxyRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyRoute")
            .field("method", &self.method)
            .field("pattern", &self.pattern)
            .field("target", &self.target)
            .field("rewrite", &self.rewrite)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Route for ProxyRoute {
    fn method(&self) -> &Method {
        &self.method
    }

    fn pattern(&self) -> &str {
        &self.pattern
    }

    async fn handle(&self, _values: &Values, res: &mut ResponseWriter, req: &mut HttpRequest) {
        let upstream = match self.resolve(req) {
            Ok(Resolution::Redirect(location)) => {
                tracing::debug!("Proxy target has no host, redirecting to {}", location);
                res.redirect(&location, StatusCode::SEE_OTHER);
                return;
            }
            Ok(Resolution::Forward(upstream)) => upstream,
            Err(message) => {
                tracing::error!("{}", message);
                res.error(StatusCode::INTERNAL_SERVER_ERROR, &message);
                return;
            }
        };

        let span = create_proxy_span(
            &self.target,
            upstream.method().as_str(),
            upstream.uri().path(),
        );
        let result = self
            .client
            .send_request(upstream)
            .instrument(span.clone())
            .await;

        match result {
            Ok(response) => {
                span.record("http.status_code", response.status().as_u16());
                let (parts, body) = response.into_parts();
                let mut headers = parts.headers;
                strip_hop_by_hop(&mut headers);
                res.headers_mut().extend(headers);
                res.write_header(parts.status);
                res.stream(body);
            }
            Err(e) => {
                tracing::error!("Proxy to {} failed: {}", self.target, e);
                res.write_header(StatusCode::INTERNAL_SERVER_ERROR);
                res.write(e.to_string());
            }
        }
    }
}

pub(crate) fn validate_target(target: &str) -> Result<(), ProxyError> {
    let invalid = |reason: String| ProxyError::InvalidTarget {
        target: target.to_string(),
        reason,
    };
    let uri: Uri = target.parse().map_err(|e| invalid(format!("{e}")))?;
    match (uri.scheme(), uri.authority()) {
        (Some(_), Some(_)) => Ok(()),
        (None, None) if target.starts_with('/') => Ok(()),
        (None, Some(_)) => Err(invalid("missing scheme".to_string())),
        _ => Err(invalid(
            "expected an absolute URI or a path starting with '/'".to_string(),
        )),
    }
}

fn header_str<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
}

/// Merge `request` into `target`: each request key replaces the target's values with its first
/// value. Keys are encoded in sorted order.
fn merge_query(target: Option<&str>, request: Option<&str>) -> String {
    let mut merged: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (key, value) in form_urlencoded::parse(target.unwrap_or_default().as_bytes()) {
        merged
            .entry(key.into_owned())
            .or_default()
            .push(value.into_owned());
    }

    let mut overrides: BTreeMap<String, String> = BTreeMap::new();
    for (key, value) in form_urlencoded::parse(request.unwrap_or_default().as_bytes()) {
        overrides
            .entry(key.into_owned())
            .or_insert_with(|| value.into_owned());
    }
    for (key, value) in overrides {
        merged.insert(key, vec![value]);
    }

    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, values) in &merged {
        for value in values {
            serializer.append_pair(key, value);
        }
    }
    serializer.finish()
}

/// Percent-encode `path` the way a URL serialiser would; existing escapes are kept.
fn escape_path(path: &str) -> String {
    match Url::parse("http://localhost") {
        Ok(mut url) => {
            url.set_path(path);
            url.path().to_string()
        }
        Err(_) => path.to_string(),
    }
}

fn join_query(path: String, query: &str) -> String {
    if query.is_empty() {
        path
    } else {
        format!("{path}?{query}")
    }
}

fn single_joining_slash(a: &str, b: &str) -> String {
    match (a.ends_with('/'), b.starts_with('/')) {
        (true, true) => format!("{a}{}", &b[1..]),
        (false, false) => format!("{a}/{b}"),
        _ => format!("{a}{b}"),
    }
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    // Headers listed in `Connection` are connection-scoped too.
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();
    for name in listed.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}

fn append_forwarded_for(headers: &mut HeaderMap, client: &str) {
    let forwarded = match headers.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(prior) if !prior.is_empty() => format!("{prior}, {client}"),
        _ => client.to_string(),
    };
    if let Ok(value) = HeaderValue::from_str(&forwarded) {
        headers.insert(X_FORWARDED_FOR.clone(), value);
    }
}

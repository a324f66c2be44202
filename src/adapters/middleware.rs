//! Built-in middleware for the global chain.
//!
//! * [`Recovery`] contains panics raised below it and answers `500`.
//! * [`RequestLogger`] logs every request with a serial number, client address and latency.
//! * [`RequestId`] tags the request with a UUID, visible to handlers and echoed in
//!   `X-Request-ID`.
use std::{
    any::Any,
    panic::AssertUnwindSafe,
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant},
};

use async_trait::async_trait;
use futures_util::FutureExt;
use http::{HeaderValue, StatusCode};
use tracing::Instrument;

use crate::{
    core::{Middleware, RequestContext},
    tracing_setup::create_request_span,
};

/// Key under which [`RequestId`] publishes the request id (a `String`).
pub const REQUEST_ID_KEY: &str = "routekit.request_id";

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Catch unwinding panics from downstream handlers.
#[derive(Debug, Default, Clone, Copy)]
pub struct Recovery;

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

#[async_trait]
impl Middleware for Recovery {
    async fn handle(&self, ctx: &mut RequestContext<'_>) {
        let method = ctx.request().method().clone();
        let path = ctx.request().uri().path().to_string();

        let outcome = AssertUnwindSafe(ctx.next()).catch_unwind().await;
        if let Err(panic) = outcome {
            tracing::error!(
                "Recovered from panic while handling {} {}: {}",
                method,
                path,
                panic_message(panic.as_ref())
            );
            if !ctx.written() {
                ctx.response_mut()
                    .error(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error");
            }
        }
    }
}

/// Per-request access log.
#[derive(Debug)]
pub struct RequestLogger {
    serial: AtomicU64,
    slow_threshold: Duration,
}

impl RequestLogger {
    /// Requests taking at least `slow_threshold` are logged at `warn`.
    pub fn new(slow_threshold: Duration) -> Self {
        Self {
            serial: AtomicU64::new(0),
            slow_threshold,
        }
    }

    /// Number of requests seen so far.
    pub fn served(&self) -> u64 {
        self.serial.load(Ordering::Relaxed)
    }

    fn client_address(ctx: &RequestContext<'_>) -> String {
        let headers = ctx.request().headers();
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };
        header("x-real-ip")
            .or_else(|| header("x-forwarded-for"))
            .or_else(|| {
                ctx.request()
                    .extensions()
                    .get::<axum::extract::ConnectInfo<std::net::SocketAddr>>()
                    .map(|info| info.0.to_string())
            })
            .unwrap_or_else(|| "-".to_string())
    }
}

impl Default for RequestLogger {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

#[async_trait]
impl Middleware for RequestLogger {
    async fn handle(&self, ctx: &mut RequestContext<'_>) {
        let start = Instant::now();
        let serial = self.serial.fetch_add(1, Ordering::Relaxed) + 1;
        let method = ctx.request().method().clone();
        let path = ctx.request().uri().path().to_string();
        let client = Self::client_address(ctx);

        tracing::info!("Started-{} {} {} for {}", serial, method, path, client);

        ctx.next().await;

        let elapsed = start.elapsed();
        let status = ctx.response().status().unwrap_or(StatusCode::OK);
        if elapsed >= self.slow_threshold {
            tracing::warn!(
                "Slow request-{} {} {} for {} {} in {:?}",
                serial,
                method,
                path,
                client,
                status,
                elapsed
            );
        } else {
            tracing::info!("Completed-{} {} in {:?}", serial, status, elapsed);
        }
    }
}

/// Attach a fresh UUID v4 to the request.
#[derive(Debug, Default, Clone, Copy)]
pub struct RequestId;

#[async_trait]
impl Middleware for RequestId {
    async fn handle(&self, ctx: &mut RequestContext<'_>) {
        let request_id = uuid::Uuid::new_v4().to_string();

        if let Ok(value) = HeaderValue::from_str(&request_id) {
            ctx.response_mut().headers_mut().insert(REQUEST_ID_HEADER, value);
        }

        let span = create_request_span(
            ctx.request().method().as_str(),
            ctx.request().uri().path(),
            &request_id,
        );
        let values = ctx.values().with(REQUEST_ID_KEY, request_id);
        ctx.next_with(values).instrument(span).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::body::Body as AxumBody;
    use http::Method;
    use http_body_util::BodyExt;

    use super::*;
    use crate::core::{
        HttpRequest, ResponseWriter, RouteHandler, RouteRegistry, Values, dispatch, handler_fn,
    };

    struct Exploding;

    #[async_trait]
    impl RouteHandler for Exploding {
        async fn call(&self, _values: &Values, _res: &mut ResponseWriter, _req: &mut HttpRequest) {
            panic!("handler exploded");
        }
    }

    fn request(uri: &str) -> HttpRequest {
        hyper::Request::builder()
            .method(Method::GET)
            .uri(uri)
            .header("x-real-ip", "203.0.113.9")
            .body(AxumBody::empty())
            .unwrap()
    }

    fn registry() -> Arc<RouteRegistry> {
        let registry = RouteRegistry::new();
        registry
            .add_handler(
                "/panic",
                Method::GET,
                Exploding,
                Vec::new(),
            )
            .unwrap();
        registry
            .add_handler(
                "/ok",
                Method::GET,
                handler_fn(|values, res, _req| {
                    Box::pin(async move {
                        let id = values
                            .get::<String>(REQUEST_ID_KEY)
                            .cloned()
                            .unwrap_or_default();
                        res.write(id);
                    })
                }),
                Vec::new(),
            )
            .unwrap();
        Arc::new(registry)
    }

    #[tokio::test]
    async fn test_recovery_turns_panic_into_internal_error() {
        let recovery: Arc<dyn Middleware> = Arc::new(Recovery);
        let response = dispatch(
            vec![recovery].into(),
            Some(registry()),
            Values::new(),
            request("/panic"),
        )
        .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"Internal Server Error\n");
    }

    #[tokio::test]
    async fn test_request_id_is_visible_downstream_and_echoed() {
        let request_id: Arc<dyn Middleware> = Arc::new(RequestId);
        let response = dispatch(
            vec![request_id].into(),
            Some(registry()),
            Values::new(),
            request("/ok"),
        )
        .await;

        let header = response
            .headers()
            .get(REQUEST_ID_HEADER)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(uuid::Uuid::parse_str(&header).is_ok());

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(String::from_utf8(body.to_vec()).unwrap(), header);
    }

    #[tokio::test]
    async fn test_request_id_scope_ends_after_next() {
        let after: Arc<Mutex<Option<bool>>> = Arc::default();
        let seen = after.clone();
        let probe: Arc<dyn Middleware> = Arc::new(crate::core::middleware_fn(move |ctx| {
            let seen = seen.clone();
            Box::pin(async move {
                ctx.next().await;
                *seen.lock().unwrap() = Some(ctx.values().contains(REQUEST_ID_KEY));
            })
        }));
        let request_id: Arc<dyn Middleware> = Arc::new(RequestId);

        dispatch(
            vec![probe, request_id].into(),
            Some(registry()),
            Values::new(),
            request("/ok"),
        )
        .await;

        assert_eq!(*after.lock().unwrap(), Some(false));
    }

    #[tokio::test]
    async fn test_request_logger_counts_requests() {
        let logger = Arc::new(RequestLogger::new(Duration::ZERO));
        let chain: Arc<dyn Middleware> = logger.clone();

        for _ in 0..3 {
            let response = dispatch(
                vec![chain.clone()].into(),
                Some(registry()),
                Values::new(),
                request("/ok"),
            )
            .await;
            assert_eq!(response.status(), StatusCode::OK);
        }
        assert_eq!(logger.served(), 3);
    }
}

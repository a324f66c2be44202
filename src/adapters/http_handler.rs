use std::{sync::Arc, time::Duration};

use arc_swap::ArcSwapOption;
use axum::{Router, body::Body as AxumBody};
use hyper::{Request, Response};

use crate::{
    adapters::middleware::{Recovery, RequestLogger},
    core::{Middleware, MiddlewareChain, RouteRegistry, Values, dispatch},
};

/// Host-facing entry point of the engine.
///
/// Owns the global middleware chain and the currently bound [`RouteRegistry`]. Both can change
/// while requests are being served: appends only affect requests that start afterwards, and a
/// rebinding is an atomic pointer swap.
pub struct HttpHandler {
    chain: MiddlewareChain,
    registry: ArcSwapOption<RouteRegistry>,
}

impl HttpHandler {
    /// Handler with an empty global chain and no registry bound.
    pub fn new() -> Self {
        Self {
            chain: MiddlewareChain::new(),
            registry: ArcSwapOption::empty(),
        }
    }

    /// Handler whose global chain starts with [`Recovery`] then [`RequestLogger`].
    pub fn with_defaults(slow_request_threshold: Duration) -> Self {
        let handler = Self::new();
        handler.use_middleware(Recovery);
        handler.use_middleware(RequestLogger::new(slow_request_threshold));
        handler
    }

    /// Append to the global chain.
    pub fn use_middleware(&self, middleware: impl Middleware) {
        self.use_shared(Arc::new(middleware));
    }

    pub fn use_shared(&self, middleware: Arc<dyn Middleware>) {
        self.chain.append(middleware);
    }

    /// Bind (or rebind) the registry consulted once the global chain is exhausted.
    pub fn bind(&self, registry: Arc<RouteRegistry>) {
        tracing::info!("Binding route registry");
        self.registry.store(Some(registry));
    }

    pub fn registry(&self) -> Option<Arc<RouteRegistry>> {
        self.registry.load_full()
    }

    /// Dispatch one request through the global chain and the bound registry.
    pub async fn handle_request(&self, req: Request<AxumBody>) -> Response<AxumBody> {
        tracing::debug!("Handling {} request to {}", req.method(), req.uri().path());
        dispatch(
            self.chain.snapshot(),
            self.registry.load_full(),
            Values::new(),
            req,
        )
        .await
    }

    /// An axum router that sends every request to this handler.
    pub fn into_router(self: Arc<Self>) -> Router {
        Router::new().fallback(move |req: Request<AxumBody>| {
            let handler = Arc::clone(&self);
            async move { handler.handle_request(req).await }
        })
    }
}

impl Default for HttpHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use http::{Method, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt; // for oneshot

    use super::*;
    use crate::core::{handler_fn, middleware_fn};

    fn text_registry(text: &'static str) -> Arc<RouteRegistry> {
        let registry = RouteRegistry::new();
        registry
            .add_handler(
                "/hello",
                Method::GET,
                handler_fn(move |_values, res, _req| {
                    Box::pin(async move {
                        res.write(text);
                    })
                }),
                Vec::new(),
            )
            .unwrap();
        Arc::new(registry)
    }

    fn get(uri: &str) -> Request<AxumBody> {
        Request::builder().uri(uri).body(AxumBody::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_unbound_handler_is_not_found() {
        let handler = HttpHandler::new();
        let response = handler.handle_request(get("/hello")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_router_serves_bound_registry() {
        let handler = Arc::new(HttpHandler::with_defaults(Duration::from_secs(1)));
        handler.bind(text_registry("first"));

        let response = handler
            .clone()
            .into_router()
            .oneshot(get("/hello"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"first");

        handler.bind(text_registry("second"));
        let response = handler.into_router().oneshot(get("/hello")).await.unwrap();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"second");
    }

    #[tokio::test]
    async fn test_global_middleware_can_answer_before_registry() {
        let handler = HttpHandler::new();
        handler.bind(text_registry("unreachable"));
        handler.use_middleware(middleware_fn(|ctx| {
            Box::pin(async move {
                ctx.response_mut()
                    .error(StatusCode::SERVICE_UNAVAILABLE, "maintenance");
            })
        }));

        let response = handler.handle_request(get("/hello")).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}

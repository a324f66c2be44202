//! Registry behaviour as seen by a host: configured routes, live removal and API versions.
use std::{io::Write, sync::Arc};

use async_trait::async_trait;
use axum::body::Body as AxumBody;
use http::{Method, Request, Response, StatusCode, header};
use routekit::{
    HttpHandler,
    adapters::{build_handler, build_registry},
    config::{EngineConfigValidator, load_config},
    core::{RouteRegistry, handler_fn},
    ports::http_client::{HttpClient, HttpClientError, HttpClientResult},
};
use tower::ServiceExt; // for oneshot

struct Offline;

#[async_trait]
impl HttpClient for Offline {
    async fn send_request(&self, _req: Request<AxumBody>) -> HttpClientResult<Response<AxumBody>> {
        Err(HttpClientError::ConnectionError("offline".to_string()))
    }
}

fn request(method: Method, uri: &str) -> Request<AxumBody> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(AxumBody::empty())
        .unwrap()
}

fn ok_handler() -> impl routekit::core::RouteHandler {
    handler_fn(|_values, res, _req| {
        Box::pin(async move {
            res.write("ok");
        })
    })
}

#[tokio::test]
async fn test_configured_routes_are_served_under_api_version() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    write!(
        file,
        r#"
api_version = "/v2"

[middleware]
request_logging = false

[[routes]]
type = "redirect"
pattern = "/docs"
location = "https://example.com/docs"

[[routes]]
type = "proxy"
pattern = "/api/**"
method = "post"
target = "http://backend:9000"
"#
    )
    .unwrap();

    let config = load_config(file.path().to_str().unwrap()).unwrap();
    EngineConfigValidator::validate(&config).unwrap();

    let registry = build_registry(&config, Arc::new(Offline)).unwrap();
    assert_eq!(
        registry.routes(),
        vec![
            ("GET".to_string(), "/v2/docs".to_string()),
            ("POST".to_string(), "/v2/api/**".to_string()),
        ]
    );

    let handler = Arc::new(build_handler(&config).unwrap());
    handler.bind(Arc::new(registry));
    let router = handler.into_router();

    let response = router
        .clone()
        .oneshot(request(Method::GET, "/v2/docs"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers()[header::LOCATION],
        "https://example.com/docs"
    );

    // Unversioned path and wrong method both miss.
    let response = router
        .clone()
        .oneshot(request(Method::GET, "/docs"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let response = router
        .clone()
        .oneshot(request(Method::GET, "/v2/api/items"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = router
        .oneshot(request(Method::POST, "/v2/api/items"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_removed_route_stops_matching_on_bound_registry() {
    let registry = Arc::new(RouteRegistry::new());
    registry
        .add_handler("/feature", Method::GET, ok_handler(), Vec::new())
        .unwrap();

    let handler = HttpHandler::new();
    handler.bind(registry.clone());

    let response = handler.handle_request(request(Method::GET, "/feature")).await;
    assert_eq!(response.status(), StatusCode::OK);

    registry.remove_handler("/feature", &Method::GET).unwrap();
    assert!(!registry.exist_handler("/feature", &Method::GET));

    let response = handler.handle_request(request(Method::GET, "/feature")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(registry.remove_handler("/feature", &Method::GET).is_err());
}

#[tokio::test]
async fn test_versioned_batches_coexist() {
    let registry = Arc::new(RouteRegistry::new());
    registry
        .versioned("/v1")
        .add_handler("/status", Method::GET, ok_handler(), Vec::new())
        .unwrap();
    registry
        .versioned("/v2")
        .add_handler("/status", Method::GET, ok_handler(), Vec::new())
        .unwrap();

    assert!(registry.versioned("/v1").exist_handler("/status", &Method::GET));
    assert!(!registry.exist_handler("/status", &Method::GET));

    let handler = HttpHandler::new();
    handler.bind(registry);
    for path in ["/v1/status", "/v2/status"] {
        let response = handler.handle_request(request(Method::GET, path)).await;
        assert_eq!(response.status(), StatusCode::OK, "{path}");
    }
    let response = handler.handle_request(request(Method::GET, "/status")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

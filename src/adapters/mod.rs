pub mod bootstrap;
pub mod http_client;
pub mod http_handler;
pub mod middleware;
pub mod proxy_route;

/// Re-export commonly used types from adapters
pub use bootstrap::{build_client, build_engine, build_handler, build_registry};
pub use http_client::HttpClientAdapter;
pub use http_handler::HttpHandler;
pub use middleware::{REQUEST_ID_KEY, Recovery, RequestId, RequestLogger};
pub use proxy_route::{
    DYNAMIC_TAG_HEADER, DYNAMIC_VALUE_HEADER, ProxyError, ProxyRoute, create_proxy_route,
};

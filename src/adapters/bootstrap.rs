//! Assembly of a ready-to-serve engine from an [`EngineConfig`].
use std::sync::Arc;

use eyre::{Result, WrapErr};
use http::Method;

use crate::{
    adapters::{
        http_client::HttpClientAdapter,
        http_handler::HttpHandler,
        middleware::{Recovery, RequestId, RequestLogger},
        proxy_route::ProxyRoute,
    },
    config::models::{EngineConfig, RouteConfig},
    core::{RouteRegistry, create_redirect_route},
    ports::http_client::HttpClient,
};

/// Upstream client shared by every configured proxy route.
pub fn build_client(config: &EngineConfig) -> Result<Arc<dyn HttpClient>> {
    let mut client = HttpClientAdapter::new().wrap_err("Failed to create upstream HTTP client")?;
    if let Some(limit) = config
        .proxy
        .timeout()
        .wrap_err("Invalid proxy.timeout")?
    {
        client = client.with_timeout(limit);
    }
    Ok(Arc::new(client))
}

/// Register every configured route, in file order, under the configured API version.
pub fn build_registry(config: &EngineConfig, client: Arc<dyn HttpClient>) -> Result<RouteRegistry> {
    let registry = RouteRegistry::new();
    registry.set_api_version(config.api_version.as_str());

    for route in &config.routes {
        let method = Method::from_bytes(route.method().as_bytes())
            .wrap_err_with(|| format!("Invalid method for route {}", route.pattern()))?;

        let added = match route {
            RouteConfig::Proxy {
                pattern,
                target,
                rewrite,
                ..
            } => {
                let proxy = ProxyRoute::new(
                    pattern.as_str(),
                    method,
                    target.as_str(),
                    *rewrite,
                    Arc::clone(&client),
                )
                .wrap_err_with(|| format!("Invalid proxy route {pattern}"))?;
                registry.add_route(proxy, Vec::new())
            }
            RouteConfig::Redirect {
                pattern, location, ..
            } => registry.add_route(
                create_redirect_route(pattern.as_str(), method, location.as_str()),
                Vec::new(),
            ),
        };
        added.wrap_err_with(|| format!("Failed to register route {}", route.pattern()))?;
    }

    tracing::info!("Registered {} configured routes", config.routes.len());
    Ok(registry)
}

/// Global chain per the middleware toggles: Recovery, then the request logger, then request ids.
pub fn build_handler(config: &EngineConfig) -> Result<HttpHandler> {
    let handler = HttpHandler::new();
    handler.use_middleware(Recovery);

    if config.middleware.request_logging {
        let threshold = config
            .logging
            .slow_request_threshold()
            .wrap_err("Invalid logging.slow_request_threshold")?;
        handler.use_middleware(RequestLogger::new(threshold));
    }
    if config.middleware.request_id {
        handler.use_middleware(RequestId);
    }
    Ok(handler)
}

/// Handler with its registry bound, ready for [`HttpHandler::into_router`].
pub fn build_engine(config: &EngineConfig) -> Result<Arc<HttpHandler>> {
    let client = build_client(config)?;
    let registry = build_registry(config, client)?;
    let handler = build_handler(config)?;
    handler.bind(Arc::new(registry));
    Ok(Arc::new(handler))
}

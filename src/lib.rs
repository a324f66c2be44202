//! routekit - an embeddable HTTP request-dispatch engine.
//!
//! A request handed over by the host server runs through an ordered, interruptible chain of
//! global middleware, then through the [`RouteRegistry`](core::RouteRegistry), which picks exactly
//! one route by HTTP method and pattern-matched path and runs that route's own middleware before
//! its handler. Any stage may answer the request and stop the rest.
//!
//! # Features
//! - Path templates with `:name` segments and `**` wildcards, compiled at registration time
//! - API version prefixes, either registry-wide or per batch via `versioned`
//! - Before/after middleware with strictly last-in-first-out unwinding around `next()`
//! - Request-scoped values that a middleware can override for everything below it
//! - Reverse-proxy and redirect routes
//! - Panic recovery, access logging and request ids as built-in middleware
//!
//! # Quick Example
//! ```no_run
//! use std::sync::Arc;
//!
//! use http::Method;
//! use routekit::{HttpHandler, core::{RouteRegistry, handler_fn}};
//!
//! # #[tokio::main] async fn main() -> eyre::Result<()> {
//! let registry = RouteRegistry::new();
//! registry.add_handler(
//!     "/hello/:name",
//!     Method::GET,
//!     handler_fn(|_values, res, _req| Box::pin(async move {
//!         res.write("{\"hello\":true}");
//!     })),
//!     Vec::new(),
//! )?;
//!
//! let handler = Arc::new(HttpHandler::with_defaults(std::time::Duration::from_secs(1)));
//! handler.bind(Arc::new(registry));
//!
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//! axum::serve(listener, handler.into_router()).await?;
//! # Ok(()) }
//! ```
//!
//! # Architecture
//! The crate separates **ports** (traits) from **adapters** (implementations) while keeping the
//! dispatch engine inside `core`, which depends on neither.
//!
//! # Error Handling
//! Registration returns typed errors ([`RouterError`](core::RouterError)); configuration loading
//! and the binary use `eyre::Result` with `WrapErr` context.
pub mod config;
pub mod ports;
pub mod tracing_setup;
pub mod utils;

pub mod adapters;
pub mod core;

// Re-export the specific types needed by the binary crate and embedders
pub use crate::{
    adapters::{HttpClientAdapter, HttpHandler},
    core::{RouteRegistry, RouterError},
    ports::http_client::HttpClient,
    utils::GracefulShutdown,
};

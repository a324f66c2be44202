//! Call shapes for route handlers and middleware.
//!
//! Both shapes are traits so that a mismatched handler is a compile error instead of a
//! registration failure. [`handler_fn`] and [`middleware_fn`] adapt closures returning boxed
//! futures.
use async_trait::async_trait;
use axum::body::Body as AxumBody;
use futures_util::future::BoxFuture;
use hyper::Request;

use crate::core::{context::RequestContext, response::ResponseWriter, values::Values};

/// Inbound request type handled by the engine.
pub type HttpRequest = Request<AxumBody>;

/// Terminal endpoint logic of a route.
#[async_trait]
pub trait RouteHandler: Send + Sync + 'static {
    async fn call(&self, values: &Values, res: &mut ResponseWriter, req: &mut HttpRequest);
}

/// A cross-cutting handler run before the route handler.
///
/// Implementations either write a response, which stops the chain, or continue it with
/// [`RequestContext::next`]. Code after the awaited `next()` runs once everything downstream
/// has returned.
#[async_trait]
pub trait Middleware: Send + Sync + 'static {
    async fn handle(&self, ctx: &mut RequestContext<'_>);
}

/// Route handler backed by a closure; see [`handler_fn`].
pub struct HandlerFn<F> {
    f: F,
}

/// Wrap a closure as a [`RouteHandler`].
///
/// ```no_run
/// use routekit::core::handler_fn;
///
/// let hello = handler_fn(|_values, res, _req| {
///     Box::pin(async move {
///         res.write("hello");
///     })
/// });
/// # let _ = hello;
/// ```
pub fn handler_fn<F>(f: F) -> HandlerFn<F>
where
    F: for<'a> Fn(&'a Values, &'a mut ResponseWriter, &'a mut HttpRequest) -> BoxFuture<'a, ()>
        + Send
        + Sync
        + 'static,
{
    HandlerFn { f }
}

#[async_trait]
impl<F> RouteHandler for HandlerFn<F>
where
    F: for<'a> Fn(&'a Values, &'a mut ResponseWriter, &'a mut HttpRequest) -> BoxFuture<'a, ()>
        + Send
        + Sync
        + 'static,
{
    async fn call(&self, values: &Values, res: &mut ResponseWriter, req: &mut HttpRequest) {
        (self.f)(values, res, req).await
    }
}

/// Middleware backed by a closure; see [`middleware_fn`].
pub struct MiddlewareFn<F> {
    f: F,
}

/// Wrap a closure as a [`Middleware`].
pub fn middleware_fn<F>(f: F) -> MiddlewareFn<F>
where
    F: for<'a, 'b> Fn(&'a mut RequestContext<'b>) -> BoxFuture<'a, ()> + Send + Sync + 'static,
{
    MiddlewareFn { f }
}

#[async_trait]
impl<F> Middleware for MiddlewareFn<F>
where
    F: for<'a, 'b> Fn(&'a mut RequestContext<'b>) -> BoxFuture<'a, ()> + Send + Sync + 'static,
{
    async fn handle(&self, ctx: &mut RequestContext<'_>) {
        (self.f)(ctx).await
    }
}

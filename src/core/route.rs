//! Addressable endpoints.
use std::fmt;

use async_trait::async_trait;
use http::{Method, StatusCode};

use crate::core::{
    handler::{HttpRequest, RouteHandler},
    response::ResponseWriter,
    values::Values,
};

/// One endpoint: a method, a path template and the logic run on a match.
///
/// Routes are immutable once built; the registry only reads `method` and `pattern` while
/// registering and calls `handle` while dispatching.
#[async_trait]
pub trait Route: Send + Sync + 'static {
    fn method(&self) -> &Method;

    fn pattern(&self) -> &str;

    async fn handle(&self, values: &Values, res: &mut ResponseWriter, req: &mut HttpRequest);
}

/// A route backed by a [`RouteHandler`].
pub struct HandlerRoute {
    pattern: String,
    method: Method,
    handler: Box<dyn RouteHandler>,
}

impl fmt::Debug for HandlerRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRoute")
            .field("method", &self.method)
            .field("pattern", &self.pattern)
            .finish_non_exhaustive()
    }
}

/// Build a route from a pattern, a method and a handler.
pub fn create_route(
    pattern: impl Into<String>,
    method: Method,
    handler: impl RouteHandler,
) -> HandlerRoute {
    HandlerRoute {
        pattern: pattern.into(),
        method,
        handler: Box::new(handler),
    }
}

#[async_trait]
impl Route for HandlerRoute {
    fn method(&self) -> &Method {
        &self.method
    }

    fn pattern(&self) -> &str {
        &self.pattern
    }

    async fn handle(&self, values: &Values, res: &mut ResponseWriter, req: &mut HttpRequest) {
        self.handler.call(values, res, req).await;
    }
}

/// A route answering every match with `303 See Other` to a fixed location.
#[derive(Debug, Clone)]
pub struct RedirectRoute {
    pattern: String,
    method: Method,
    location: String,
}

pub fn create_redirect_route(
    pattern: impl Into<String>,
    method: Method,
    location: impl Into<String>,
) -> RedirectRoute {
    RedirectRoute {
        pattern: pattern.into(),
        method,
        location: location.into(),
    }
}

impl RedirectRoute {
    pub fn location(&self) -> &str {
        &self.location
    }
}

#[async_trait]
impl Route for RedirectRoute {
    fn method(&self) -> &Method {
        &self.method
    }

    fn pattern(&self) -> &str {
        &self.pattern
    }

    async fn handle(&self, _values: &Values, res: &mut ResponseWriter, _req: &mut HttpRequest) {
        res.redirect(&self.location, StatusCode::SEE_OTHER);
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body as AxumBody;
    use http::header;

    use super::*;
    use crate::core::handler::handler_fn;

    fn request() -> HttpRequest {
        hyper::Request::builder()
            .uri("/old")
            .body(AxumBody::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_handler_route_delegates_to_handler() {
        let route = create_route(
            "/hello",
            Method::GET,
            handler_fn(|values, res, _req| {
                Box::pin(async move {
                    let name = values.get::<String>("name").cloned().unwrap_or_default();
                    res.write(format!("hello {name}"));
                })
            }),
        );
        assert_eq!(route.method(), Method::GET);
        assert_eq!(route.pattern(), "/hello");

        let values = Values::new().with("name", "ann".to_string());
        let mut res = ResponseWriter::new();
        route.handle(&values, &mut res, &mut request()).await;
        assert_eq!(res.status(), Some(StatusCode::OK));
        assert_eq!(res.size(), "hello ann".len() as u64);
    }

    #[tokio::test]
    async fn test_redirect_route_uses_see_other() {
        let route = create_redirect_route("/old", Method::GET, "/new");
        let mut res = ResponseWriter::new();
        route.handle(&Values::new(), &mut res, &mut request()).await;

        assert_eq!(res.status(), Some(StatusCode::SEE_OTHER));
        assert_eq!(res.headers().get(header::LOCATION).unwrap(), "/new");
    }
}

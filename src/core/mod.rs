pub mod chain;
pub mod context;
pub mod handler;
pub mod pattern;
pub mod registry;
pub mod response;
pub mod route;
pub mod values;

pub use chain::{Chain, MiddlewareChain};
pub use context::{RequestContext, dispatch};
pub use handler::{
    HandlerFn, HttpRequest, Middleware, MiddlewareFn, RouteHandler, handler_fn, middleware_fn,
};
pub use pattern::{PathParams, PatternError, RoutePattern};
pub use registry::{PATH_PARAMS_KEY, RouteRegistry, RouterError, VersionedRegistrar};
pub use response::ResponseWriter;
pub use route::{HandlerRoute, RedirectRoute, Route, create_redirect_route, create_route};
pub use values::Values;

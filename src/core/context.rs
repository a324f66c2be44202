//! Per-request dispatch state.
//!
//! A [`RequestContext`] is a cursor over a middleware list plus the action taken once the list
//! is exhausted. The same type drives both the global chain (exhaustion hands the request to
//! the [`RouteRegistry`]) and a matched route's own chain (exhaustion invokes the route).
//!
//! `run` walks the chain from the cursor. `next` advances the cursor and re-enters `run`, so a
//! middleware that awaits `next()` resumes only after every handler below it has returned; the
//! "after" halves unwind strictly last-in-first-out.
use std::sync::Arc;

use axum::body::Body as AxumBody;
use futures_util::future::BoxFuture;
use hyper::Response;

use crate::core::{
    chain::Chain,
    handler::{HttpRequest, Middleware},
    registry::RouteRegistry,
    response::ResponseWriter,
    route::Route,
    values::Values,
};

/// The request and response owned by one dispatch.
pub(crate) struct Exchange {
    pub(crate) request: HttpRequest,
    pub(crate) response: ResponseWriter,
}

impl Exchange {
    pub(crate) fn new(request: HttpRequest) -> Self {
        Self {
            request,
            response: ResponseWriter::new(),
        }
    }
}

/// What happens once the active chain is exhausted without a response.
#[derive(Clone)]
pub(crate) enum Terminal {
    Registry(Arc<RouteRegistry>),
    Route(Arc<dyn Route>),
    None,
}

/// Execution state of one request through one middleware chain.
pub struct RequestContext<'a> {
    chain: Chain,
    index: usize,
    terminal: Terminal,
    exchange: &'a mut Exchange,
    values: Values,
}

impl<'a> RequestContext<'a> {
    pub(crate) fn new(
        chain: Chain,
        terminal: Terminal,
        exchange: &'a mut Exchange,
        values: Values,
    ) -> Self {
        Self {
            chain,
            index: 0,
            terminal,
            exchange,
            values,
        }
    }

    /// Context for a matched route, sharing this context's request and response.
    pub(crate) fn route_context(
        &mut self,
        chain: Chain,
        route: Arc<dyn Route>,
        values: Values,
    ) -> RequestContext<'_> {
        RequestContext::new(chain, Terminal::Route(route), &mut *self.exchange, values)
    }

    pub fn request(&self) -> &HttpRequest {
        &self.exchange.request
    }

    pub fn request_mut(&mut self) -> &mut HttpRequest {
        &mut self.exchange.request
    }

    pub fn response(&self) -> &ResponseWriter {
        &self.exchange.response
    }

    pub fn response_mut(&mut self) -> &mut ResponseWriter {
        &mut self.exchange.response
    }

    /// Whether anything in this dispatch has written a status yet.
    pub fn written(&self) -> bool {
        self.exchange.response.written()
    }

    /// Current value view.
    pub fn values(&self) -> &Values {
        &self.values
    }

    pub fn value<T: std::any::Any>(&self, key: &str) -> Option<&T> {
        self.values.get(key)
    }

    /// Replace the value view for everything that runs after this call in the current stack.
    pub fn update(&mut self, values: Values) {
        self.values = values;
    }

    /// Walk the chain from the cursor, then run the terminal action if nothing has answered.
    pub fn run(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            while self.index < self.chain.len() {
                let middleware = Arc::clone(&self.chain[self.index]);
                middleware.handle(self).await;

                self.index += 1;
                if self.written() {
                    return;
                }
            }

            if self.written() {
                return;
            }

            match self.terminal.clone() {
                Terminal::Registry(registry) => {
                    registry.handle(self).await;
                    if !self.written() {
                        self.exchange.response.no_content();
                    }
                }
                Terminal::Route(route) => {
                    route
                        .handle(
                            &self.values,
                            &mut self.exchange.response,
                            &mut self.exchange.request,
                        )
                        .await;
                    if !self.written() {
                        self.exchange.response.no_content();
                    }
                }
                Terminal::None => self.exchange.response.not_found(),
            }
        })
    }

    /// Yield to the rest of the chain.
    pub fn next(&mut self) -> BoxFuture<'_, ()> {
        self.index += 1;
        self.run()
    }

    /// Yield to the rest of the chain with `values` installed; the previous view is back in
    /// place once the downstream handlers return.
    pub fn next_with(&mut self, values: Values) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let previous = std::mem::replace(&mut self.values, values);
            self.next().await;
            self.values = previous;
        })
    }
}

/// Run one request through `chain` and, once exhausted, through `registry`.
///
/// Without a registry an unanswered request ends as `404 Not Found`.
pub async fn dispatch(
    chain: Chain,
    registry: Option<Arc<RouteRegistry>>,
    values: Values,
    request: HttpRequest,
) -> Response<AxumBody> {
    let mut exchange = Exchange::new(request);
    let terminal = match registry {
        Some(registry) => Terminal::Registry(registry),
        None => Terminal::None,
    };

    RequestContext::new(chain, terminal, &mut exchange, values)
        .run()
        .await;

    exchange.response.into_response()
}

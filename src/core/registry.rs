//! Method-indexed route table and the dispatch step that consults it.
//!
//! Routes live in per-method buckets kept in registration order. Each entry remembers the API
//! version prefix in force when it was registered and is compiled against `version + pattern`.
//! Dispatch copies one bucket under the read lock and scans the copy, so registration never
//! blocks on, or is observed half-done by, requests in flight.
use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use http::Method;
use percent_encoding::percent_decode_str;
use thiserror::Error;

use crate::core::{
    chain::Chain,
    context::RequestContext,
    handler::{Middleware, RouteHandler},
    pattern::{PatternError, RoutePattern},
    route::{Route, create_route},
};

/// Key under which the matched route's [`PathParams`](crate::core::PathParams) are published.
pub const PATH_PARAMS_KEY: &str = "routekit.path_params";

/// Errors raised while changing the route table.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum RouterError {
    #[error("duplicate route: apiVersion '{api_version}', pattern '{pattern}', method {method}")]
    DuplicateRoute {
        api_version: String,
        pattern: String,
        method: String,
    },

    #[error("route not found: apiVersion '{api_version}', pattern '{pattern}', method {method}")]
    RouteNotFound {
        api_version: String,
        pattern: String,
        method: String,
    },

    #[error(transparent)]
    InvalidPattern(#[from] PatternError),
}

struct CompiledRoute {
    version: String,
    route: Arc<dyn Route>,
    middleware: Chain,
    matcher: RoutePattern,
}

impl CompiledRoute {
    fn is(&self, version: &str, pattern: &str) -> bool {
        self.version == version && self.route.pattern() == pattern
    }
}

#[derive(Default)]
struct RegistryState {
    api_version: String,
    routes: HashMap<String, Vec<Arc<CompiledRoute>>>,
}

/// Thread-safe route table.
#[derive(Default)]
pub struct RouteRegistry {
    state: RwLock<RegistryState>,
}

fn method_key(method: &Method) -> String {
    method.as_str().to_ascii_uppercase()
}

impl RouteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // The table is only changed by single pushes and whole-bucket replacement, so a lock
    // poisoned by a panicking writer still guards a consistent table.
    fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set the version prefix applied to routes registered from now on.
    pub fn set_api_version(&self, version: impl Into<String>) {
        self.write().api_version = version.into();
    }

    pub fn api_version(&self) -> String {
        self.read().api_version.clone()
    }

    /// A registrar that applies `version` to its registrations, leaving the registry-wide
    /// setting alone.
    pub fn versioned(&self, version: impl Into<String>) -> VersionedRegistrar<'_> {
        VersionedRegistrar {
            registry: self,
            version: version.into(),
        }
    }

    /// Register `route` with its own middleware, under the current API version.
    pub fn add_route<R: Route>(
        &self,
        route: R,
        middleware: Vec<Arc<dyn Middleware>>,
    ) -> Result<(), RouterError> {
        self.insert(None, Arc::new(route), middleware)
    }

    /// Register a bare handler; shorthand for [`create_route`] plus [`RouteRegistry::add_route`].
    pub fn add_handler(
        &self,
        pattern: impl Into<String>,
        method: Method,
        handler: impl RouteHandler,
        middleware: Vec<Arc<dyn Middleware>>,
    ) -> Result<(), RouterError> {
        self.add_route(create_route(pattern, method, handler), middleware)
    }

    pub fn remove_route(&self, route: &dyn Route) -> Result<(), RouterError> {
        self.remove(None, route.pattern(), route.method())
    }

    pub fn remove_handler(&self, pattern: &str, method: &Method) -> Result<(), RouterError> {
        self.remove(None, pattern, method)
    }

    pub fn exist_route(&self, route: &dyn Route) -> bool {
        self.exists(None, route.pattern(), route.method())
    }

    pub fn exist_handler(&self, pattern: &str, method: &Method) -> bool {
        self.exists(None, pattern, method)
    }

    /// Registered `(method, effective pattern)` pairs, in registration order per method.
    pub fn routes(&self) -> Vec<(String, String)> {
        let state = self.read();
        let mut methods: Vec<&String> = state.routes.keys().collect();
        methods.sort();
        methods
            .into_iter()
            .flat_map(|method| {
                state.routes[method]
                    .iter()
                    .map(move |compiled| (method.clone(), compiled.matcher.template().to_string()))
            })
            .collect()
    }

    fn insert(
        &self,
        version: Option<&str>,
        route: Arc<dyn Route>,
        middleware: Vec<Arc<dyn Middleware>>,
    ) -> Result<(), RouterError> {
        let key = method_key(route.method());
        let mut state = self.write();
        let version = version.map_or_else(|| state.api_version.clone(), str::to_string);

        let bucket = state.routes.get(&key);
        if bucket.is_some_and(|routes| routes.iter().any(|c| c.is(&version, route.pattern()))) {
            return Err(RouterError::DuplicateRoute {
                api_version: version,
                pattern: route.pattern().to_string(),
                method: key,
            });
        }

        let effective = format!("{}{}", version, route.pattern());
        let matcher = RoutePattern::compile(&effective)?;
        tracing::info!("Registered route [{}]:{}", key, effective);

        state
            .routes
            .entry(key)
            .or_default()
            .push(Arc::new(CompiledRoute {
                version,
                route,
                middleware: middleware.into(),
                matcher,
            }));
        Ok(())
    }

    fn remove(&self, version: Option<&str>, pattern: &str, method: &Method) -> Result<(), RouterError> {
        let key = method_key(method);
        let mut state = self.write();
        let version = version.map_or_else(|| state.api_version.clone(), str::to_string);

        let position = state
            .routes
            .get(&key)
            .and_then(|routes| routes.iter().position(|c| c.is(&version, pattern)));
        let Some(index) = position else {
            return Err(RouterError::RouteNotFound {
                api_version: version,
                pattern: pattern.to_string(),
                method: key,
            });
        };

        if let Some(routes) = state.routes.get_mut(&key) {
            routes.remove(index);
            if routes.is_empty() {
                state.routes.remove(&key);
            }
        }
        tracing::info!("Removed route [{}]:{}{}", key, version, pattern);
        Ok(())
    }

    fn exists(&self, version: Option<&str>, pattern: &str, method: &Method) -> bool {
        let state = self.read();
        let version = version.unwrap_or(state.api_version.as_str());
        state
            .routes
            .get(&method_key(method))
            .is_some_and(|routes| routes.iter().any(|c| c.is(version, pattern)))
    }

    fn bucket(&self, key: &str) -> Vec<Arc<CompiledRoute>> {
        self.read().routes.get(key).cloned().unwrap_or_default()
    }

    /// Resolve the request to its first matching route and run that route's chain.
    ///
    /// Writes `404 Not Found` when no route accepts the request path.
    pub async fn handle(&self, ctx: &mut RequestContext<'_>) {
        let key = method_key(ctx.request().method());
        // Patterns match the decoded path, so `%2F` separates segments.
        let path = percent_decode_str(ctx.request().uri().path())
            .decode_utf8_lossy()
            .into_owned();

        let matched = self.bucket(&key).into_iter().find_map(|compiled| {
            compiled
                .matcher
                .captures(&path)
                .map(|params| (compiled, params))
        });

        let Some((compiled, params)) = matched else {
            tracing::debug!("No route for [{}]:{}", key, path);
            ctx.response_mut().not_found();
            return;
        };

        tracing::debug!(
            "Dispatching [{}]:{} to {}",
            key,
            path,
            compiled.matcher.template()
        );
        let values = ctx.values().with(PATH_PARAMS_KEY, params);
        ctx.route_context(
            Arc::clone(&compiled.middleware),
            Arc::clone(&compiled.route),
            values,
        )
        .run()
        .await;
    }
}

impl fmt::Debug for RouteRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteRegistry")
            .field("api_version", &self.api_version())
            .field("routes", &self.routes())
            .finish()
    }
}

/// Registration handle bound to an explicit API version; see [`RouteRegistry::versioned`].
pub struct VersionedRegistrar<'a> {
    registry: &'a RouteRegistry,
    version: String,
}

impl VersionedRegistrar<'_> {
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn add_route<R: Route>(
        &self,
        route: R,
        middleware: Vec<Arc<dyn Middleware>>,
    ) -> Result<(), RouterError> {
        self.registry
            .insert(Some(&self.version), Arc::new(route), middleware)
    }

    pub fn add_handler(
        &self,
        pattern: impl Into<String>,
        method: Method,
        handler: impl RouteHandler,
        middleware: Vec<Arc<dyn Middleware>>,
    ) -> Result<(), RouterError> {
        self.add_route(create_route(pattern, method, handler), middleware)
    }

    pub fn remove_handler(&self, pattern: &str, method: &Method) -> Result<(), RouterError> {
        self.registry.remove(Some(&self.version), pattern, method)
    }

    pub fn exist_handler(&self, pattern: &str, method: &Method) -> bool {
        self.registry.exists(Some(&self.version), pattern, method)
    }
}

//! Route groups shared between feature modules and the servers.
//!
//! A group is a cloneable handle. Feature modules register routes on it
//! during construction; the owning server assembles every group into its
//! router when its start hook runs.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, Mutex};

use axum::{routing::MethodRouter, Router};
use thiserror::Error;

use crate::http::api::ApiServer;
use crate::http::server::HttpServer;
use crate::lifecycle::Lifecycle;
use crate::module::{Inputs, Module, Outputs};
use crate::BoxError;

/// Tag of the versioned API group.
pub const API_V1: &str = "api-v1";
/// Tag of the API documentation group.
pub const SWAGGER: &str = "swagger";

pub const MODULE_NAME: &str = "router-module";
pub const HTTP_MODULE_NAME: &str = "http-router-module";

/// Error type for route registration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("route {prefix}{path} is already registered")]
    Duplicate { prefix: String, path: String },

    #[error("invalid route path `{path}`: must start with '/'")]
    InvalidPath { path: String },
}

#[derive(Default)]
struct RouteTable {
    router: Router,
    paths: BTreeSet<String>,
}

/// Routes mounted under one path prefix of the framework server.
#[derive(Clone)]
pub struct RouteGroup {
    prefix: Arc<str>,
    table: Arc<Mutex<RouteTable>>,
}

impl RouteGroup {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: Arc::from(prefix),
            table: Arc::new(Mutex::new(RouteTable::default())),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Add a route relative to the group prefix. Each path may be
    /// registered once; chain methods on one [`MethodRouter`] instead.
    pub fn route(&self, path: &str, method_router: MethodRouter) -> Result<(), RouteError> {
        if !path.starts_with('/') {
            return Err(RouteError::InvalidPath { path: path.to_string() });
        }
        let mut table = self.table.lock().expect("route table mutex poisoned");
        if !table.paths.insert(path.to_string()) {
            return Err(RouteError::Duplicate {
                prefix: self.prefix.to_string(),
                path: path.to_string(),
            });
        }
        let router = std::mem::take(&mut table.router);
        table.router = router.route(path, method_router);
        tracing::debug!(prefix = %self.prefix, path = %path, "Route registered");
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.table.lock().expect("route table mutex poisoned").paths.is_empty()
    }

    /// Snapshot of the registered routes, `None` when nothing was added.
    pub fn build(&self) -> Option<Router> {
        let table = self.table.lock().expect("route table mutex poisoned");
        (!table.paths.is_empty()).then(|| table.router.clone())
    }
}

impl fmt::Debug for RouteGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let routes = self.table.lock().map(|t| t.paths.len()).unwrap_or_default();
        f.debug_struct("RouteGroup")
            .field("prefix", &self.prefix)
            .field("routes", &routes)
            .finish()
    }
}

/// Path-prefix mux on the plain server. Handlers see paths with the prefix
/// stripped.
#[derive(Debug, Clone)]
pub struct ServeMux(RouteGroup);

impl ServeMux {
    pub(crate) fn new(prefix: &str) -> Self {
        Self(RouteGroup::new(prefix))
    }

    pub fn prefix(&self) -> &str {
        self.0.prefix()
    }

    pub fn handle(&self, path: &str, method_router: MethodRouter) -> Result<(), RouteError> {
        self.0.route(path, method_router)
    }

    pub(crate) fn build(&self) -> Option<Router> {
        self.0.build()
    }
}

/// Declares the `api-v1` and `swagger` groups on the framework server.
pub fn module() -> Module {
    Module::new(MODULE_NAME, construct)
        .requires::<ApiServer>()
        .provides_named::<RouteGroup>(API_V1)
        .provides_named::<RouteGroup>(SWAGGER)
}

async fn construct(inputs: Inputs, _: Lifecycle) -> Result<Outputs, BoxError> {
    let server = inputs.get::<ApiServer>()?;
    Ok(Outputs::new()
        .with_named(API_V1, server.group("/api/v1"))
        .with_named(SWAGGER, server.group("/swagger")))
}

/// Declares the `api-v1` mux on the plain server.
pub fn http_module() -> Module {
    Module::new(HTTP_MODULE_NAME, construct_mux)
        .requires::<HttpServer>()
        .provides_named::<ServeMux>(API_V1)
}

async fn construct_mux(inputs: Inputs, _: Lifecycle) -> Result<Outputs, BoxError> {
    let server = inputs.get::<HttpServer>()?;
    Ok(Outputs::new().with_named(API_V1, server.mount("/api/v1")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, routing::get};
    use tower::ServiceExt;

    #[test]
    fn groups_start_empty() {
        let group = RouteGroup::new("/api/v1");
        assert!(group.is_empty());
        assert!(group.build().is_none());
    }

    #[tokio::test]
    async fn clones_share_routes() {
        let group = RouteGroup::new("/api/v1");
        group.clone().route("/ping", get(|| async { "pong" })).unwrap();
        assert!(!group.is_empty());

        let router = Router::new().nest(group.prefix(), group.build().unwrap());
        let response = router
            .oneshot(Request::get("/api/v1/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
    }

    #[test]
    fn duplicate_path_is_an_error() {
        let group = RouteGroup::new("/api/v1");
        group.route("/hello", get(|| async { "one" })).unwrap();
        let err = group.clone().route("/hello", get(|| async { "two" })).unwrap_err();
        assert_eq!(
            err,
            RouteError::Duplicate {
                prefix: "/api/v1".to_string(),
                path: "/hello".to_string()
            }
        );
        assert_eq!(err.to_string(), "route /api/v1/hello is already registered");
        assert!(group.build().is_some());
    }

    #[test]
    fn relative_path_is_an_error() {
        let mux = ServeMux::new("/api/v1");
        assert!(matches!(
            mux.handle("hello", get(|| async { "hi" })),
            Err(RouteError::InvalidPath { .. })
        ));
        assert!(mux.build().is_none());
    }
}

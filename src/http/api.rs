//! Framework HTTP server and its module.
//!
//! Middleware, outermost first: request id, tracing, request id propagation,
//! panic recovery, body limit, CORS, metrics, optional rate limiting.
//! Unmatched paths fall through to a 404 [`ApiError`].

use std::any::Any;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{middleware::from_fn_with_state, response::IntoResponse, response::Response, Router};
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::CorsLayer,
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::{ApiConfig, Configuration, Stage};
use crate::http::error::ApiError;
use crate::http::router::RouteGroup;
use crate::http::server::{Server, ServerError};
use crate::lifecycle::{Hook, HookContext, Lifecycle};
use crate::module::{Inputs, Module, Outputs};
use crate::net::ListenAddress;
use crate::observability::metrics;
use crate::security::{rate_limit_middleware, RateLimiter};
use crate::BoxError;

pub const MODULE_NAME: &str = "api-server-module";

/// Framework server: route groups nested under their prefixes.
#[derive(Clone)]
pub struct ApiServer {
    inner: Arc<ApiServerInner>,
}

struct ApiServerInner {
    config: ApiConfig,
    stage: Stage,
    server: Server,
    groups: Mutex<Vec<RouteGroup>>,
}

impl ApiServer {
    const METRICS_LABEL: &'static str = "api";

    pub fn new(config: ApiConfig, stage: Stage) -> Result<Self, ServerError> {
        let address = ListenAddress::parse(&config.host)?;
        Ok(Self {
            inner: Arc::new(ApiServerInner {
                server: Server::new(config.service.clone(), address),
                config,
                stage,
                groups: Mutex::new(Vec::new()),
            }),
        })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    pub fn stage(&self) -> Stage {
        self.inner.stage
    }

    /// Route group under `prefix`. The same prefix always yields the same group.
    pub fn group(&self, prefix: &str) -> RouteGroup {
        let mut groups = self.inner.groups.lock().expect("route group mutex poisoned");
        if let Some(existing) = groups.iter().find(|group| group.prefix() == prefix) {
            return existing.clone();
        }
        let group = RouteGroup::new(prefix);
        groups.push(group.clone());
        group
    }

    /// Assemble every non-empty group plus the middleware stack.
    pub fn router(&self) -> Router {
        let config = &self.inner.config;
        let groups = self.inner.groups.lock().expect("route group mutex poisoned").clone();

        let mut router = groups
            .iter()
            .fold(Router::new(), |router, group| match group.build() {
                Some(routes) => router.nest(group.prefix(), routes),
                None => router,
            })
            .fallback(not_found);

        if config.rate_limit {
            let limiter = Arc::new(RateLimiter::new(
                config.rate_limit_max,
                Duration::from_secs(config.rate_limit_window_secs),
            ));
            router = router.layer(from_fn_with_state(limiter, rate_limit_middleware));
        }

        router
            .layer(from_fn_with_state(Self::METRICS_LABEL, metrics::track_requests))
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(CatchPanicLayer::custom(handle_panic))
                    .layer(RequestBodyLimitLayer::new(config.body_limit_bytes))
                    .layer(CorsLayer::permissive()),
            )
    }

    pub async fn start(&self) -> Result<(), ServerError> {
        self.inner.server.start(self.router()).await
    }

    pub async fn stop(&self, ctx: &HookContext) -> Result<(), ServerError> {
        self.inner.server.stop(ctx).await
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.inner.server.local_addr()
    }
}

impl std::fmt::Debug for ApiServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiServer")
            .field("service", &self.inner.config.service)
            .field("address", &self.inner.server.address().to_string())
            .field("stage", &self.inner.stage)
            .field("local_addr", &self.local_addr())
            .finish()
    }
}

async fn not_found() -> ApiError {
    ApiError::not_found()
}

fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = %detail, "Handler panicked");
    ApiError::internal(detail.to_string()).into_response()
}

/// Provides [`ApiServer`] from `[api]` and registers its start/stop hooks.
pub fn module() -> Module {
    Module::new(MODULE_NAME, construct)
        .requires::<Configuration>()
        .provides::<ApiServer>()
}

async fn construct(inputs: Inputs, lifecycle: Lifecycle) -> Result<Outputs, BoxError> {
    let configuration = inputs.get::<Configuration>()?;
    let server = ApiServer::new(configuration.section()?, configuration.stage())?;

    let (starting, stopping) = (server.clone(), server.clone());
    lifecycle.append(
        Hook::new()
            .on_start(move |_| async move {
                starting.start().await?;
                Ok::<(), BoxError>(())
            })
            .on_stop(move |ctx| async move {
                stopping.stop(&ctx).await?;
                Ok::<(), BoxError>(())
            }),
    );

    Ok(Outputs::new().with(server))
}

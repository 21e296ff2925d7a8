//! HTTP server core and the plain server module.
//!
//! # Responsibilities
//! - Validate the listen address at construction, bind at start
//! - Run the serve loop on its own task, log its failures
//! - Graceful shutdown bounded by the stop hook deadline, connections
//!   force-closed after it
//! - Plain server: prefix-stripping mux, request timeout, request tracing

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use axum::{middleware::from_fn_with_state, Router};
use axum_server::Handle;
use thiserror::Error;
use tokio::task::{JoinError, JoinHandle};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::{Configuration, HttpConfig};
use crate::http::router::ServeMux;
use crate::lifecycle::{Hook, HookContext, Lifecycle};
use crate::module::{Inputs, Module, Outputs};
use crate::net::{ListenAddress, ListenerError};
use crate::observability::metrics;
use crate::BoxError;

pub const MODULE_NAME: &str = "http-server-module";

/// Error type for server start and stop.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{name} server is already started")]
    AlreadyStarted { name: String },

    #[error("{name} server is not started")]
    NotStarted { name: String },

    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("{name} server did not drain within {timeout:?}, connections closed")]
    ShutdownTimeout { name: String, timeout: Duration },

    #[error("{name} serve task failed: {source}")]
    Task {
        name: String,
        #[source]
        source: JoinError,
    },
}

/// Closes every connection and aborts the serve task when dropped, so a
/// cancelled stop hook still releases the listener.
struct ServeTask {
    handle: Handle,
    task: JoinHandle<()>,
}

impl ServeTask {
    fn force_close(&self) {
        self.handle.shutdown();
        self.task.abort();
    }
}

impl Drop for ServeTask {
    fn drop(&mut self) {
        self.force_close();
    }
}

enum Slot {
    Idle,
    Running(ServeTask),
    Stopped,
}

/// Listener plus serve loop, shared by both server flavours.
pub(crate) struct Server {
    name: String,
    address: ListenAddress,
    slot: tokio::sync::Mutex<Slot>,
    local_addr: OnceLock<SocketAddr>,
}

impl Server {
    pub(crate) fn new(name: impl Into<String>, address: ListenAddress) -> Self {
        Self {
            name: name.into(),
            address,
            slot: tokio::sync::Mutex::new(Slot::Idle),
            local_addr: OnceLock::new(),
        }
    }

    pub(crate) fn address(&self) -> &ListenAddress {
        &self.address
    }

    pub(crate) fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.get().copied()
    }

    /// Bind and spawn the serve loop. Returns once the socket is listening.
    pub(crate) async fn start(&self, router: Router) -> Result<(), ServerError> {
        let mut slot = self.slot.lock().await;
        if !matches!(*slot, Slot::Idle) {
            return Err(ServerError::AlreadyStarted { name: self.name.clone() });
        }

        let listener = self.address.bind().await?;
        let bind_error = |source| ListenerError::Bind {
            address: self.address.clone(),
            source,
        };
        let local = listener.local_addr().map_err(bind_error)?;
        let listener = listener.into_std().map_err(bind_error)?;

        let handle = Handle::new();
        let name = self.name.clone();
        let app = router.into_make_service_with_connect_info::<SocketAddr>();
        let server = axum_server::from_tcp(listener).handle(handle.clone());
        let task = tokio::spawn(async move {
            match server.serve(app).await {
                Ok(()) => tracing::info!(server = %name, "Server stopped"),
                Err(e) => tracing::warn!(server = %name, error = %e, "Server terminated unexpectedly"),
            }
        });

        let _ = self.local_addr.set(local);
        *slot = Slot::Running(ServeTask { handle, task });
        tracing::info!(server = %self.name, address = %local, "Server listening");
        Ok(())
    }

    /// Stop accepting, let in-flight requests drain until the hook deadline,
    /// then close the remaining connections.
    pub(crate) async fn stop(&self, ctx: &HookContext) -> Result<(), ServerError> {
        let mut slot = self.slot.lock().await;
        let mut serving = match std::mem::replace(&mut *slot, Slot::Stopped) {
            Slot::Running(serving) => serving,
            Slot::Idle => {
                *slot = Slot::Idle;
                return Err(ServerError::NotStarted { name: self.name.clone() });
            }
            Slot::Stopped => return Ok(()),
        };

        tracing::info!(
            server = %self.name,
            connections = serving.handle.connection_count(),
            "Shutting down server"
        );
        serving.handle.graceful_shutdown(None);

        match tokio::time::timeout_at(ctx.deadline(), &mut serving.task).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(source)) => Err(ServerError::Task {
                name: self.name.clone(),
                source,
            }),
            Err(_) => {
                tracing::warn!(
                    server = %self.name,
                    connections = serving.handle.connection_count(),
                    "Drain deadline passed, closing connections"
                );
                serving.force_close();
                Err(ServerError::ShutdownTimeout {
                    name: self.name.clone(),
                    timeout: ctx.timeout(),
                })
            }
        }
    }
}

/// Plain HTTP server: a set of prefix-mounted muxes.
#[derive(Clone)]
pub struct HttpServer {
    inner: Arc<HttpServerInner>,
}

struct HttpServerInner {
    config: HttpConfig,
    server: Server,
    mounts: Mutex<Vec<ServeMux>>,
}

impl HttpServer {
    const METRICS_LABEL: &'static str = "http";

    pub fn new(config: HttpConfig) -> Result<Self, ServerError> {
        let address = ListenAddress::parse(&config.host)?;
        Ok(Self {
            inner: Arc::new(HttpServerInner {
                server: Server::new(config.service.clone(), address),
                config,
                mounts: Mutex::new(Vec::new()),
            }),
        })
    }

    pub fn config(&self) -> &HttpConfig {
        &self.inner.config
    }

    /// Mux mounted at `prefix`. Mounting the same prefix twice returns the
    /// existing mux.
    pub fn mount(&self, prefix: &str) -> ServeMux {
        let mut mounts = self.inner.mounts.lock().expect("mount table mutex poisoned");
        if let Some(existing) = mounts.iter().find(|mux| mux.prefix() == prefix) {
            return existing.clone();
        }
        let mux = ServeMux::new(prefix);
        mounts.push(mux.clone());
        mux
    }

    /// Assemble the mounted muxes into one router.
    #[allow(deprecated)]
    pub fn router(&self) -> Router {
        let mounts = self.inner.mounts.lock().expect("mount table mutex poisoned").clone();
        let router = mounts.iter().fold(Router::new(), |router, mux| match mux.build() {
            Some(routes) => router.nest(mux.prefix(), routes),
            None => router,
        });

        router
            .layer(from_fn_with_state(Self::METRICS_LABEL, metrics::track_requests))
            .layer(TimeoutLayer::new(Duration::from_secs(self.inner.config.timeout_secs)))
            .layer(TraceLayer::new_for_http())
    }

    pub async fn start(&self) -> Result<(), ServerError> {
        self.inner.server.start(self.router()).await
    }

    pub async fn stop(&self, ctx: &HookContext) -> Result<(), ServerError> {
        self.inner.server.stop(ctx).await
    }

    /// Bound address, available once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.inner.server.local_addr()
    }
}

impl std::fmt::Debug for HttpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpServer")
            .field("service", &self.inner.config.service)
            .field("address", &self.inner.server.address().to_string())
            .field("local_addr", &self.local_addr())
            .finish()
    }
}

/// Provides [`HttpServer`] from `[http]` and registers its start/stop hooks.
pub fn module() -> Module {
    Module::new(MODULE_NAME, construct)
        .requires::<Configuration>()
        .provides::<HttpServer>()
}

async fn construct(inputs: Inputs, lifecycle: Lifecycle) -> Result<Outputs, BoxError> {
    let config: HttpConfig = inputs.get::<Configuration>()?.section()?;
    let server = HttpServer::new(config)?;

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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Phase;

    fn config(host: &str) -> HttpConfig {
        HttpConfig {
            service: "test".to_string(),
            protocol: "tcp".to_string(),
            host: host.to_string(),
            timeout_secs: 5,
        }
    }

    fn stop_context() -> HookContext {
        HookContext::new(Phase::Stop, Duration::from_secs(5))
    }

    #[test]
    fn invalid_address_fails_construction() {
        assert!(matches!(HttpServer::new(config("nowhere")), Err(ServerError::Listener(_))));
    }

    #[tokio::test]
    async fn start_twice_is_rejected() {
        let server = HttpServer::new(config("127.0.0.1:0")).unwrap();
        server.start().await.unwrap();
        assert!(server.local_addr().is_some());
        assert!(matches!(server.start().await, Err(ServerError::AlreadyStarted { .. })));
        server.stop(&stop_context()).await.unwrap();
    }

    #[tokio::test]
    async fn stop_before_start_is_rejected() {
        let server = HttpServer::new(config("127.0.0.1:0")).unwrap();
        assert!(matches!(server.stop(&stop_context()).await, Err(ServerError::NotStarted { .. })));
    }

    #[tokio::test]
    async fn stop_releases_the_port() {
        let server = HttpServer::new(config("127.0.0.1:0")).unwrap();
        server.start().await.unwrap();
        let addr = server.local_addr().unwrap();
        server.stop(&stop_context()).await.unwrap();

        let rebound = tokio::net::TcpListener::bind(addr).await;
        assert!(rebound.is_ok());
    }

    #[tokio::test]
    async fn drain_deadline_closes_in_flight_connections() {
        let server = HttpServer::new(config("127.0.0.1:0")).unwrap();
        server
            .mount("/api/v1")
            .handle(
                "/slow",
                axum::routing::get(|| async {
                    tokio::time::sleep(Duration::from_secs(3)).await;
                    "done"
                }),
            )
            .unwrap();
        server.start().await.unwrap();
        let addr = server.local_addr().unwrap();

        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        let in_flight = tokio::spawn(async move { client.get(format!("http://{addr}/api/v1/slow")).send().await });
        tokio::time::sleep(Duration::from_millis(100)).await;

        let ctx = HookContext::new(Phase::Stop, Duration::from_millis(300));
        let stopped = server.stop(&ctx).await;
        assert!(
            matches!(stopped, Err(ServerError::ShutdownTimeout { timeout, .. }) if timeout == Duration::from_millis(300)),
            "{stopped:?}"
        );

        let outcome = tokio::time::timeout(Duration::from_secs(2), in_flight)
            .await
            .expect("in-flight request should end once connections are closed")
            .unwrap();
        assert!(outcome.is_err(), "request completed after forced close: {outcome:?}");
        assert!(tokio::net::TcpListener::bind(addr).await.is_ok());
    }

    #[test]
    fn mounting_a_prefix_twice_shares_the_mux() {
        let server = HttpServer::new(config("127.0.0.1:0")).unwrap();
        let first = server.mount("/api/v1");
        first.handle("/hello", axum::routing::get(|| async { "hi" })).unwrap();
        let second = server.mount("/api/v1");
        assert!(second.build().is_some());
    }
}

//! Metrics collection and exposition.
//!
//! # Metrics
//! - `lifecycle_hook_duration_seconds` (histogram): hook latency by phase, module
//! - `lifecycle_hook_failures_total` (counter): failed or timed out hooks
//! - `http_requests_total` (counter): requests by server, method, status
//! - `http_request_duration_seconds` (histogram): request latency by server
//!
//! Recording is a no-op until a recorder is installed. `metrics-module`
//! installs the Prometheus recorder and serves it on its own listener, which
//! is released by the module's stop hook.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::task::JoinHandle;

use crate::config::{Configuration, MetricsConfig};
use crate::lifecycle::{Hook, Lifecycle, Phase};
use crate::module::{Inputs, Module, Outputs};
use crate::BoxError;

pub const MODULE_NAME: &str = "metrics-module";

pub fn record_hook(phase: Phase, module: &str, elapsed: Duration, ok: bool) {
    let module = module.to_string();
    metrics::histogram!(
        "lifecycle_hook_duration_seconds",
        "phase" => phase.as_str(),
        "module" => module.clone()
    )
    .record(elapsed.as_secs_f64());

    if !ok {
        metrics::counter!("lifecycle_hook_failures_total", "phase" => phase.as_str(), "module" => module).increment(1);
    }
}

pub fn record_request(server: &'static str, method: &str, status: u16, start: Instant) {
    metrics::counter!(
        "http_requests_total",
        "server" => server,
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("http_request_duration_seconds", "server" => server).record(start.elapsed().as_secs_f64());
}

/// Middleware recording one counter and one latency sample per request.
pub async fn track_requests(State(server): State<&'static str>, request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let response = next.run(request).await;
    record_request(server, method.as_str(), response.status().as_u16(), start);
    response
}

/// Serves the Prometheus exporter while the application runs, when
/// `[metrics].enabled` is set.
pub fn module() -> Module {
    Module::new(MODULE_NAME, construct).requires::<Configuration>()
}

async fn construct(inputs: Inputs, lifecycle: Lifecycle) -> Result<Outputs, BoxError> {
    let config: MetricsConfig = inputs.get::<Configuration>()?.section_or_default()?;
    if !config.enabled {
        tracing::debug!("Metrics exporter disabled");
        return Ok(Outputs::new());
    }

    let address: SocketAddr = config.address.parse()?;
    let exporter: Arc<Mutex<Option<JoinHandle<()>>>> = Arc::default();
    let (serving, stopping) = (exporter.clone(), exporter);
    lifecycle.append(
        Hook::new()
            .on_start(move |_| async move {
                let task = start_exporter(address)?;
                *serving.lock().expect("exporter slot poisoned") = Some(task);
                Ok::<(), BoxError>(())
            })
            .on_stop(move |_| async move {
                if let Some(task) = stopping.lock().expect("exporter slot poisoned").take() {
                    task.abort();
                    tracing::info!(address = %address, "Metrics exporter stopped");
                }
                Ok::<(), BoxError>(())
            }),
    );
    Ok(Outputs::new())
}

/// Bind the exporter listener and serve it on a task. The global recorder can
/// only be set once per process; later installs keep the first one.
fn start_exporter(address: SocketAddr) -> Result<JoinHandle<()>, BoxError> {
    let (recorder, exporter) = PrometheusBuilder::new().with_http_listener(address).build()?;
    if metrics::set_global_recorder(recorder).is_err() {
        tracing::warn!("A metrics recorder is already installed, keeping it");
    }

    let task = tokio::spawn(async move {
        if let Err(e) = exporter.await {
            tracing::warn!(error = ?e, "Metrics exporter terminated unexpectedly");
        }
    });
    tracing::info!(address = %address, "Metrics exporter listening");
    Ok(task)
}

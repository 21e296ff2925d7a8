//! Top-level runner: build the graph, start, wait, stop.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

use crate::lifecycle::registry::{HookRegistry, LifecycleError, State};
use crate::lifecycle::shutdown::{Shutdown, Shutdowner};
use crate::lifecycle::signals;
use crate::module::{resolver, Graph, Module, ResolveError};

/// Name of the built-in module that provides the [`Shutdowner`].
pub const SHUTDOWNER_MODULE: &str = "shutdowner";

/// Exit code used when a second termination signal interrupts teardown.
const FORCED_EXIT_CODE: i32 = 130;

/// Errors that abort the application before it reaches the running state.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

/// Application assembly: a name, a version, and the modules to compose.
#[derive(Debug)]
pub struct App {
    name: String,
    version: String,
    modules: Vec<Module>,
    start_timeout: Duration,
    stop_timeout: Duration,
}

impl App {
    /// Default bound for every start and stop hook.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: String::from("0.0.0"),
            modules: Vec::new(),
            start_timeout: Self::DEFAULT_TIMEOUT,
            stop_timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn module(mut self, module: Module) -> Self {
        self.modules.push(module);
        self
    }

    pub fn modules(mut self, modules: impl IntoIterator<Item = Module>) -> Self {
        self.modules.extend(modules);
        self
    }

    pub fn start_timeout(mut self, timeout: Duration) -> Self {
        self.start_timeout = timeout;
        self
    }

    pub fn stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    /// Resolve the module graph and run every constructor.
    ///
    /// No hook runs here. A [`Shutdowner`] is always available to modules.
    pub async fn build(self) -> Result<Application, ResolveError> {
        let shutdown = Shutdown::new();

        let mut modules = Vec::with_capacity(self.modules.len() + 1);
        modules.push(Module::supply(SHUTDOWNER_MODULE, shutdown.shutdowner()));
        modules.extend(self.modules);

        let mut registry = HookRegistry::new(self.start_timeout, self.stop_timeout);
        let graph = resolver::construct(modules, &mut registry).await.inspect_err(|e| {
            tracing::error!(app = %self.name, error = %e, "failed to build application");
        })?;

        tracing::info!(
            app = %self.name,
            version = %self.version,
            modules = graph.construction_order().len(),
            hooks = registry.len(),
            "Dependency graph resolved"
        );

        Ok(Application {
            name: self.name,
            version: self.version,
            graph,
            registry,
            shutdown,
        })
    }

    /// Build, start, block until a termination signal, then stop.
    pub async fn run(self) -> Result<(), AppError> {
        self.build().await?.run().await
    }
}

/// A built application: the resolved graph plus its hook registry.
#[derive(Debug)]
pub struct Application {
    name: String,
    version: String,
    graph: Graph,
    registry: HookRegistry,
    shutdown: Shutdown,
}

impl Application {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn state(&self) -> State {
        self.registry.state()
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Clone of a resolved untagged value.
    pub fn get<T: Clone + 'static>(&self) -> Option<T> {
        self.graph.get::<T>()
    }

    /// Clone of a resolved tagged value.
    pub fn get_named<T: Clone + 'static>(&self, tag: &'static str) -> Option<T> {
        self.graph.get_named::<T>(tag)
    }

    pub fn shutdowner(&self) -> Shutdowner {
        self.shutdown.shutdowner()
    }

    /// Run all start hooks. See [`HookRegistry::start`].
    pub async fn start(&mut self) -> Result<(), LifecycleError> {
        tracing::info!(app = %self.name, version = %self.version, hooks = self.registry.len(), "Starting application");
        self.registry.start().await?;
        tracing::info!(app = %self.name, "Application started");
        Ok(())
    }

    /// Run all stop hooks. See [`HookRegistry::stop`].
    pub async fn stop(&mut self) -> Result<(), LifecycleError> {
        if self.registry.state() == State::Running {
            tracing::info!(app = %self.name, "Stopping application");
        }
        self.registry.stop().await
    }

    /// Start, wait for SIGINT/SIGTERM or a requested shutdown, then stop.
    ///
    /// Stop hook failures are logged and not returned. A second signal during
    /// teardown exits the process immediately.
    pub async fn run(mut self) -> Result<(), AppError> {
        self.start().await?;

        tokio::select! {
            signal = signals::terminate() => {
                tracing::info!(signal = %signal, "Termination signal received");
            }
            reason = self.shutdown.requested() => {
                tracing::info!(reason = %reason, "Shutdown requested");
            }
        }

        let watchdog = tokio::spawn(async {
            let signal = signals::terminate().await;
            tracing::error!(signal = %signal, "Second termination signal received, exiting immediately");
            std::process::exit(FORCED_EXIT_CODE);
        });
        self.teardown().await;
        watchdog.abort();
        Ok(())
    }

    /// Like [`Application::run`] but waits on `signal` instead of OS signals.
    pub async fn run_until<F>(mut self, signal: F) -> Result<(), AppError>
    where
        F: Future<Output = ()>,
    {
        self.start().await?;

        tokio::select! {
            _ = signal => {
                tracing::info!("Stop signal received");
            }
            reason = self.shutdown.requested() => {
                tracing::info!(reason = %reason, "Shutdown requested");
            }
        }

        self.teardown().await;
        Ok(())
    }

    async fn teardown(&mut self) {
        match self.stop().await {
            Ok(()) => tracing::info!(app = %self.name, "Shutdown complete"),
            Err(e) => tracing::error!(app = %self.name, error = %e, "Shutdown completed with errors"),
        }
    }
}

//! Lifecycle hooks and the per-module registration handle.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt};
use tokio::time::Instant;

use crate::BoxError;

/// Type-erased hook callable.
pub(crate) type HookFn = Box<dyn FnOnce(HookContext) -> BoxFuture<'static, Result<(), BoxError>> + Send>;

/// Which half of the lifecycle a hook invocation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Start,
    Stop,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Start => "start",
            Phase::Stop => "stop",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Context handed to every hook invocation.
///
/// The deadline is enforced by the registry: a hook still running when it
/// passes is dropped and reported as timed out. Hooks owning resources should
/// race their graceful path against [`HookContext::deadline`] and release the
/// resource forcibly when it elapses.
#[derive(Debug, Clone)]
pub struct HookContext {
    phase: Phase,
    timeout: Duration,
    deadline: Instant,
}

impl HookContext {
    pub(crate) fn new(phase: Phase, timeout: Duration) -> Self {
        Self {
            phase,
            timeout,
            deadline: deadline_after(timeout),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Total time budget granted to this invocation.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Time left before the deadline, zero once it has passed.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}

/// `now + timeout`, saturating to a far-future instant instead of overflowing.
fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout)
        .unwrap_or_else(|| now + Duration::from_secs(FAR_FUTURE_SECS))
}

const FAR_FUTURE_SECS: u64 = 86_400 * 365 * 30;

/// A pair of optional start/stop callables registered by a module.
///
/// Each callable runs at most once. A hook without a start callable still
/// counts as started, so its stop callable runs during teardown.
#[derive(Default)]
pub struct Hook {
    pub(crate) module: String,
    pub(crate) on_start: Option<HookFn>,
    pub(crate) on_stop: Option<HookFn>,
}

impl Hook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the callable invoked when the application starts.
    pub fn on_start<F, Fut>(mut self, f: F) -> Self
    where
        F: FnOnce(HookContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.on_start = Some(Box::new(move |ctx| f(ctx).boxed()));
        self
    }

    /// Set the callable invoked when the application stops.
    pub fn on_stop<F, Fut>(mut self, f: F) -> Self
    where
        F: FnOnce(HookContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.on_stop = Some(Box::new(move |ctx| f(ctx).boxed()));
        self
    }

    /// A hook with only an infallible stop callable.
    pub fn stop_only<F, Fut>(f: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::new().on_stop(move |_| async move {
            f().await;
            Ok::<(), BoxError>(())
        })
    }

    /// Name of the module that registered this hook.
    pub fn module(&self) -> &str {
        &self.module
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook")
            .field("module", &self.module)
            .field("on_start", &self.on_start.is_some())
            .field("on_stop", &self.on_stop.is_some())
            .finish()
    }
}

/// Handle through which a module constructor registers hooks.
///
/// Each constructor receives its own handle. Hooks appended to it are moved
/// into the application's registry only after the constructor succeeds, so a
/// module that fails to construct never has its hooks invoked. Hooks appended
/// after the constructor has returned are discarded.
#[derive(Clone)]
pub struct Lifecycle {
    module: Arc<str>,
    hooks: Arc<Mutex<Vec<Hook>>>,
}

impl Lifecycle {
    pub(crate) fn for_module(module: &str) -> Self {
        Self {
            module: Arc::from(module),
            hooks: Arc::default(),
        }
    }

    /// Register a hook on behalf of this module.
    pub fn append(&self, mut hook: Hook) {
        hook.module = self.module.to_string();
        self.hooks.lock().expect("lifecycle hook buffer poisoned").push(hook);
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub(crate) fn drain(&self) -> Vec<Hook> {
        std::mem::take(&mut *self.hooks.lock().expect("lifecycle hook buffer poisoned"))
    }
}

impl fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifecycle").field("module", &self.module).finish()
    }
}

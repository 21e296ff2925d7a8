//! Ordered hook registry and the start/stop state machine.
//!
//! # States
//! ```text
//! Unstarted → Starting → Running → Stopping → Stopped
//!                 │
//!                 └──→ StartFailed (started hooks already unwound)
//! ```
//!
//! Start hooks run in registration order, stop hooks in the exact reverse of
//! the hooks that actually started. Hooks never run concurrently with each
//! other.

use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;

use crate::lifecycle::hook::{Hook, HookContext, HookFn, Phase};
use crate::observability::metrics;
use crate::BoxError;

/// Lifecycle state of a [`HookRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Unstarted,
    Starting,
    Running,
    Stopping,
    Stopped,
    StartFailed,
}

/// Failure of a single hook invocation.
#[derive(Debug, Error)]
pub enum HookError {
    #[error("{phase} hook of module `{module}` failed: {source}")]
    Failed {
        module: String,
        phase: Phase,
        #[source]
        source: BoxError,
    },

    #[error("{phase} hook of module `{module}` timed out after {timeout:?}")]
    TimedOut {
        module: String,
        phase: Phase,
        timeout: Duration,
    },
}

impl HookError {
    /// Module that registered the failing hook.
    pub fn module(&self) -> &str {
        match self {
            HookError::Failed { module, .. } | HookError::TimedOut { module, .. } => module,
        }
    }
}

/// Errors returned by [`HookRegistry::start`] and [`HookRegistry::stop`].
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// `start` was called on a registry that is no longer unstarted.
    #[error("lifecycle cannot start from state {0:?}")]
    AlreadyStarted(State),

    /// A start hook failed; every previously started hook has been stopped.
    #[error("module `{module}` failed to start: {cause}")]
    Start {
        module: String,
        #[source]
        cause: HookError,
        /// Stop hook failures recorded while unwinding.
        rollback: Vec<HookError>,
    },

    /// One or more stop hooks failed. All stop hooks were still attempted.
    #[error("{} stop hook(s) failed: {}", .0.len(), summarize(.0))]
    Stop(Vec<HookError>),
}

fn summarize(errors: &[HookError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Process-wide ordered sequence of lifecycle hooks.
#[derive(Debug)]
pub struct HookRegistry {
    hooks: Vec<Hook>,
    /// Indices of hooks whose start completed, in start order.
    started: Vec<usize>,
    state: State,
    start_timeout: Duration,
    stop_timeout: Duration,
}

impl HookRegistry {
    pub fn new(start_timeout: Duration, stop_timeout: Duration) -> Self {
        Self {
            hooks: Vec::new(),
            started: Vec::new(),
            state: State::Unstarted,
            start_timeout,
            stop_timeout,
        }
    }

    /// Append a hook. Hooks appended after start are ignored.
    pub fn append(&mut self, hook: Hook) {
        if self.state != State::Unstarted {
            tracing::warn!(module = %hook.module, state = ?self.state, "ignoring hook appended after start");
            return;
        }
        self.hooks.push(hook);
    }

    pub(crate) fn extend(&mut self, hooks: impl IntoIterator<Item = Hook>) {
        for hook in hooks {
            self.append(hook);
        }
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Run every start hook in registration order.
    ///
    /// On the first failure the remaining hooks are skipped and the hooks
    /// that did start are stopped in reverse order before returning.
    pub async fn start(&mut self) -> Result<(), LifecycleError> {
        if self.state != State::Unstarted {
            return Err(LifecycleError::AlreadyStarted(self.state));
        }
        self.state = State::Starting;

        for idx in 0..self.hooks.len() {
            let hook = &mut self.hooks[idx];
            if let Some(on_start) = hook.on_start.take() {
                let module = hook.module.clone();
                tracing::debug!(module = %module, "running start hook");

                if let Err(cause) = invoke(&module, Phase::Start, on_start, self.start_timeout).await {
                    tracing::error!(module = %module, error = %cause, "start hook failed, unwinding started hooks");
                    self.state = State::StartFailed;
                    let rollback = self.unwind().await;
                    return Err(LifecycleError::Start {
                        module,
                        cause,
                        rollback,
                    });
                }
            }
            self.started.push(idx);
        }

        self.state = State::Running;
        Ok(())
    }

    /// Run the stop hook of every started hook in reverse start order.
    ///
    /// Failures are collected and do not prevent earlier hooks from being
    /// stopped. Calling `stop` again, or after a failed start, does nothing.
    pub async fn stop(&mut self) -> Result<(), LifecycleError> {
        match self.state {
            State::Stopping | State::Stopped | State::StartFailed => return Ok(()),
            State::Unstarted | State::Starting | State::Running => {}
        }

        self.state = State::Stopping;
        let errors = self.unwind().await;
        self.state = State::Stopped;

        if errors.is_empty() {
            Ok(())
        } else {
            Err(LifecycleError::Stop(errors))
        }
    }

    async fn unwind(&mut self) -> Vec<HookError> {
        let mut errors = Vec::new();
        while let Some(idx) = self.started.pop() {
            let hook = &mut self.hooks[idx];
            let Some(on_stop) = hook.on_stop.take() else {
                continue;
            };
            let module = hook.module.clone();
            tracing::debug!(module = %module, "running stop hook");

            if let Err(e) = invoke(&module, Phase::Stop, on_stop, self.stop_timeout).await {
                tracing::warn!(module = %module, error = %e, "stop hook failed");
                errors.push(e);
            }
        }
        errors
    }
}

async fn invoke(module: &str, phase: Phase, hook: HookFn, timeout: Duration) -> Result<(), HookError> {
    let ctx = HookContext::new(phase, timeout);
    let deadline = ctx.deadline();
    let begin = Instant::now();

    let outcome = match tokio::time::timeout_at(deadline, hook(ctx)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(source)) => Err(HookError::Failed {
            module: module.to_string(),
            phase,
            source,
        }),
        Err(_) => Err(HookError::TimedOut {
            module: module.to_string(),
            phase,
            timeout,
        }),
    };

    metrics::record_hook(phase, module, begin.elapsed(), outcome.is_ok());
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    type Events = Arc<Mutex<Vec<String>>>;

    fn recording(module: &str, events: &Events, fail_start: bool) -> Hook {
        let (start_events, stop_events) = (events.clone(), events.clone());
        let (start_name, stop_name) = (module.to_string(), module.to_string());
        let mut hook = Hook::new()
            .on_start(move |_| async move {
                start_events.lock().unwrap().push(format!("start:{start_name}"));
                if fail_start {
                    Err::<(), BoxError>("boom".into())
                } else {
                    Ok(())
                }
            })
            .on_stop(move |_| async move {
                stop_events.lock().unwrap().push(format!("stop:{stop_name}"));
                Ok::<(), BoxError>(())
            });
        hook.module = module.to_string();
        hook
    }

    fn registry() -> HookRegistry {
        HookRegistry::new(Duration::from_secs(1), Duration::from_millis(100))
    }

    #[tokio::test]
    async fn stops_in_reverse_start_order() {
        let events = Events::default();
        let mut registry = registry();
        for name in ["a", "b", "c"] {
            registry.append(recording(name, &events, false));
        }

        registry.start().await.unwrap();
        assert_eq!(registry.state(), State::Running);
        registry.stop().await.unwrap();
        assert_eq!(registry.state(), State::Stopped);

        assert_eq!(
            *events.lock().unwrap(),
            ["start:a", "start:b", "start:c", "stop:c", "stop:b", "stop:a"]
        );
    }

    #[tokio::test]
    async fn failed_start_unwinds_only_started_hooks() {
        let events = Events::default();
        let mut registry = registry();
        registry.append(recording("a", &events, false));
        registry.append(recording("b", &events, false));
        registry.append(recording("c", &events, true));
        registry.append(recording("d", &events, false));

        let err = registry.start().await.unwrap_err();
        match &err {
            LifecycleError::Start { module, rollback, .. } => {
                assert_eq!(module, "c");
                assert!(rollback.is_empty());
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(registry.state(), State::StartFailed);
        assert_eq!(
            *events.lock().unwrap(),
            ["start:a", "start:b", "start:c", "stop:b", "stop:a"]
        );

        // Teardown already happened during the unwind.
        registry.stop().await.unwrap();
        assert_eq!(events.lock().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn second_stop_is_a_no_op() {
        let events = Events::default();
        let mut registry = registry();
        registry.append(recording("a", &events, false));

        registry.start().await.unwrap();
        registry.stop().await.unwrap();
        registry.stop().await.unwrap();

        assert_eq!(*events.lock().unwrap(), ["start:a", "stop:a"]);
    }

    #[tokio::test]
    async fn start_twice_is_rejected() {
        let mut registry = registry();
        registry.start().await.unwrap();
        assert!(matches!(
            registry.start().await,
            Err(LifecycleError::AlreadyStarted(State::Running))
        ));
    }

    #[tokio::test]
    async fn stop_hook_timeout_does_not_block_remaining_hooks() {
        let events = Events::default();
        let mut registry = registry();
        registry.append(recording("a", &events, false));
        let mut stuck = Hook::new().on_stop(|_| async {
            std::future::pending::<()>().await;
            Ok::<(), BoxError>(())
        });
        stuck.module = "stuck".to_string();
        registry.append(stuck);

        registry.start().await.unwrap();
        let err = registry.stop().await.unwrap_err();

        match err {
            LifecycleError::Stop(errors) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].module(), "stuck");
                assert!(matches!(errors[0], HookError::TimedOut { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(*events.lock().unwrap(), ["start:a", "stop:a"]);
    }
}

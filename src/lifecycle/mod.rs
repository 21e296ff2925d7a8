//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Build (runner.rs):
//!     App modules → resolver → constructors append hooks → HookRegistry
//!
//! Start (registry.rs):
//!     hooks in registration order → first failure unwinds started hooks
//!
//! Run (runner.rs, signals.rs, shutdown.rs):
//!     SIGTERM/SIGINT or Shutdowner request → begin teardown
//!
//! Stop (registry.rs):
//!     started hooks in reverse order, each bounded by the stop timeout
//! ```
//!
//! # Design Decisions
//! - Hooks never run concurrently with each other
//! - Teardown is best-effort: every started hook gets its stop call
//! - Serve loops run detached; their failures are only logged

pub mod hook;
pub mod registry;
pub mod runner;
pub mod shutdown;
pub mod signals;

pub use hook::{Hook, HookContext, Lifecycle, Phase};
pub use registry::{HookError, HookRegistry, LifecycleError, State};
pub use runner::{App, AppError, Application};
pub use shutdown::{Shutdown, Shutdowner};

//! Database subsystem.
//!
//! One shared `PgPool`, connected during module construction and closed by
//! the last stop hook to run.

pub mod pool;

pub use pool::{connect, connect_options, pool_options};

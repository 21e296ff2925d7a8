//! Request admission controls for the framework server.
//!
//! # Design Decisions
//! - Limiting is per peer IP, in memory, per process
//! - Disabled unless `[api].rate_limit` is set

pub mod rate_limit;

pub use rate_limit::{rate_limit_middleware, RateLimiter};

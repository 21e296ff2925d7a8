//! Ronin service skeleton.
//!
//! Modules declare what they require and provide; the resolver orders and
//! constructs them, and the lifecycle runner starts and stops their hooks.
//!
//! ```text
//!   config-module ─┬─▶ metrics-module
//!                  ├─▶ database-module ──────────────────────────┐
//!                  ├─▶ http-server-module ─▶ http-router-module ─┤
//!                  └─▶ api-server-module ──▶ router-module ──────┴─▶ hello-handler
//! ```

// Composition and lifecycle
pub mod lifecycle;
pub mod module;

// Ambient
pub mod config;
pub mod observability;

// Infrastructure modules
pub mod database;
pub mod http;
pub mod net;
pub mod security;

// Features
pub mod features;

use crate::config::Configuration;
use crate::lifecycle::App;
use crate::module::Module;

/// Error type crossing constructor and hook boundaries.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub const CONFIG_MODULE: &str = "config-module";

pub use lifecycle::{Application, Shutdowner};

/// The full module set, in registration order.
///
/// The pool is ordered before both servers so its stop hook runs after
/// theirs and in-flight requests keep database access while draining.
pub fn modules(config: Configuration) -> Vec<Module> {
    vec![
        Module::supply(CONFIG_MODULE, config),
        observability::metrics::module(),
        http::server::module(),
        http::api::module(),
        http::router::module(),
        http::router::http_module(),
        database::pool::module()
            .before(http::server::MODULE_NAME)
            .before(http::api::MODULE_NAME),
        features::hello::module(),
    ]
}

/// Application assembled from configuration.
pub fn application(config: Configuration) -> App {
    let app = config.app();
    App::new(app.name.clone())
        .version(env!("CARGO_PKG_VERSION"))
        .start_timeout(std::time::Duration::from_secs(app.start_timeout_secs))
        .stop_timeout(std::time::Duration::from_secs(app.stop_timeout_secs))
        .modules(modules(config))
}

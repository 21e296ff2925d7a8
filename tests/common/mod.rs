//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use ronin_codebase::config::Configuration;
use ronin_codebase::lifecycle::{Hook, Lifecycle};
use ronin_codebase::module::{Inputs, Module, Outputs};
use ronin_codebase::BoxError;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};

/// Ordered log of hook invocations, e.g. `["start:a", "stop:a"]`.
#[derive(Clone, Default)]
pub struct Events(Arc<Mutex<Vec<String>>>);

impl Events {
    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

/// How a recording hook behaves.
#[derive(Clone, Copy, Default)]
pub struct Behavior {
    pub fail_start: bool,
    pub fail_stop: bool,
    pub start_only: bool,
}

/// A module with one hook that records its start and stop calls.
pub fn recording(name: &'static str, events: &Events, behavior: Behavior) -> Module {
    let events = events.clone();
    Module::new(name, move |_: Inputs, lifecycle: Lifecycle| async move {
        let (on_start, on_stop) = (events.clone(), events);
        let mut hook = Hook::new().on_start(move |_| async move {
            on_start.push(format!("start:{name}"));
            if behavior.fail_start {
                return Err::<(), BoxError>(format!("{name} refused to start").into());
            }
            Ok(())
        });
        if !behavior.start_only {
            hook = hook.on_stop(move |_| async move {
                on_stop.push(format!("stop:{name}"));
                if behavior.fail_stop {
                    return Err::<(), BoxError>(format!("{name} refused to stop").into());
                }
                Ok(())
            });
        }
        lifecycle.append(hook);
        Ok::<_, BoxError>(Outputs::new())
    })
}

pub fn config(http_host: &str, api_host: &str) -> Configuration {
    Configuration::from_toml_str(&format!(
        r#"
        [app]
        name = "ronin-test"
        start_timeout_secs = 5
        stop_timeout_secs = 5

        [http]
        host = "{http_host}"

        [api]
        host = "{api_host}"

        [database]
        host = "127.0.0.1"
        port = 1
        user = "ronin"
        password = "ronin"
        name = "ronin"
        connect_timeout_secs = 1
        "#
    ))
    .unwrap()
}

/// A pool pointing at a closed port. Never connects until used.
pub fn lazy_pool() -> PgPool {
    PgPoolOptions::new()
        .acquire_timeout(Duration::from_millis(200))
        .connect_lazy_with(PgConnectOptions::new().host("127.0.0.1").port(1))
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

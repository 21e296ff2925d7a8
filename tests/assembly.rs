//! The production module set resolves as expected.

mod common;

use ronin_codebase::module::construction_order;
use ronin_codebase::{application, modules};

#[test]
fn pool_is_constructed_before_both_servers() {
    let modules = modules(common::config(":8080", ":8081"));
    let order = construction_order(&modules).unwrap();
    assert_eq!(
        order,
        [
            "config-module",
            "metrics-module",
            "database-module",
            "http-server-module",
            "api-server-module",
            "router-module",
            "http-router-module",
            "hello-handler",
        ]
    );
}

#[tokio::test]
async fn unreachable_database_aborts_build() {
    let result = application(common::config("127.0.0.1:0", "127.0.0.1:0")).build().await;
    let err = result.unwrap_err();
    assert!(err.to_string().contains("database-module"), "{err}");
}

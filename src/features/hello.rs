//! Hello-world feature wired onto both servers.
//!
//! - `GET /api/v1/hello-conn` pings the database and returns an envelope
//! - `POST /api/v1/hello-conn` echoes a `{world, name}` body
//! - `GET /api/v1/hello` on the plain server returns a fixed line of text

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::{get, MethodRouter},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::PgPool;

use crate::http::{ApiError, Envelope, RouteGroup, ServeMux, API_V1};
use crate::lifecycle::Lifecycle;
use crate::module::{Inputs, Module, Outputs};
use crate::BoxError;

pub const MODULE_NAME: &str = "hello-handler";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Hello {
    pub world: String,
    pub name: String,
}

/// `GET` pings the database, `POST` echoes the body.
pub fn hello_conn_route(pool: PgPool) -> MethodRouter {
    get(hello_conn).post(echo).with_state(pool)
}

async fn hello_conn(State(pool): State<PgPool>) -> Result<Json<Envelope<Value>>, ApiError> {
    sqlx::query("SELECT 1").execute(&pool).await?;
    Ok(Json(Envelope::new(json!({ "Hello": "World" }))))
}

async fn echo(payload: Result<Json<Hello>, JsonRejection>) -> Result<Json<Hello>, ApiError> {
    let Json(hello) = payload?;
    tracing::debug!(world = %hello.world, name = %hello.name, "Echoing hello");
    Ok(Json(hello))
}

async fn sign_in() -> &'static str {
    "Customer Sign in\n"
}

pub fn module() -> Module {
    Module::new(MODULE_NAME, construct)
        .requires_named::<RouteGroup>(API_V1)
        .requires_named::<ServeMux>(API_V1)
        .requires::<PgPool>()
}

async fn construct(inputs: Inputs, _: Lifecycle) -> Result<Outputs, BoxError> {
    let group = inputs.named::<RouteGroup>(API_V1)?;
    let mux = inputs.named::<ServeMux>(API_V1)?;
    let pool = inputs.get::<PgPool>()?;

    group.route("/hello-conn", hello_conn_route(pool))?;
    mux.handle("/hello", get(sign_in))?;
    Ok(Outputs::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
    };
    use axum::Router;
    use sqlx::postgres::PgPoolOptions;
    use std::time::Duration;
    use tower::ServiceExt;

    fn routes(pool: PgPool) -> Router {
        Router::new().route("/hello-conn", hello_conn_route(pool))
    }

    fn unreachable_pool() -> PgPool {
        let options = sqlx::postgres::PgConnectOptions::new().host("127.0.0.1").port(1);
        PgPoolOptions::new()
            .acquire_timeout(Duration::from_millis(200))
            .connect_lazy_with(options)
    }

    #[tokio::test]
    async fn post_echoes_body() {
        let request = Request::post("/hello-conn")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"world":"earth","name":"ronin"}"#))
            .unwrap();
        let response = routes(unreachable_pool()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let hello: Hello = serde_json::from_slice(&body).unwrap();
        assert_eq!(hello, Hello { world: "earth".into(), name: "ronin".into() });
    }

    #[tokio::test]
    async fn malformed_body_is_a_client_error() {
        let request = Request::post("/hello-conn")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = routes(unreachable_pool()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unreachable_database_is_masked() {
        let request = Request::get("/hello-conn").body(Body::empty()).unwrap();
        let response = routes(unreachable_pool()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], crate::http::error::DATABASE_ERROR_MESSAGE.as_bytes());
    }
}

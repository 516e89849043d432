//! Service routes next to the GraphQL endpoint: liveness, readiness and API metadata.

use crate::routes::graphql::GRAPHQL_PATH;
use crate::schema::SchemaGenerator;
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use std::time::Duration;

const READY_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Serialize)]
struct Liveness {
    status: &'static str,
}

#[derive(Serialize)]
struct Readiness {
    status: &'static str,
    database: &'static str,
    schema: &'static str,
}

#[derive(Serialize)]
struct ApiInfo {
    name: &'static str,
    version: &'static str,
    api: String,
    endpoint: &'static str,
    query_type: String,
    mutation_type: String,
}

async fn health() -> Json<Liveness> {
    Json(Liveness { status: "ok" })
}

fn check(ok: bool) -> &'static str {
    if ok {
        "ok"
    } else {
        "unavailable"
    }
}

/// 200 once the pool answers and the generated schema resolves a trivial query, else 503.
async fn ready(State(state): State<AppState>) -> (StatusCode, Json<Readiness>) {
    let ping = sqlx::query("SELECT 1").fetch_optional(&state.pool);
    let database = matches!(tokio::time::timeout(READY_TIMEOUT, ping).await, Ok(Ok(_)));
    let schema = state.schema.execute("{ __typename }").await.is_ok();
    if !database {
        tracing::warn!(api = %state.api_name, "readiness: database unreachable");
    }
    let status = if database && schema {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let body = Readiness {
        status: if status == StatusCode::OK { "ok" } else { "degraded" },
        database: check(database),
        schema: check(schema),
    };
    (status, Json(body))
}

async fn info(State(state): State<AppState>) -> Json<ApiInfo> {
    let names = SchemaGenerator::new(&state.api_name);
    Json(ApiInfo {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        endpoint: GRAPHQL_PATH,
        query_type: names.query_type_name(),
        mutation_type: names.mutation_type_name(),
        api: state.api_name,
    })
}

/// GET /health, GET /ready, GET /info.
pub fn service_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/info", get(info))
        .with_state(state)
}

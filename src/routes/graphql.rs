//! GraphQL endpoint: POST executes against the generated schema, GET serves GraphiQL.

use crate::extractors::GraphqlRequestContext;
use crate::state::AppState;
use async_graphql::http::GraphiQLSource;
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use tower_http::limit::RequestBodyLimitLayer;

pub const GRAPHQL_PATH: &str = "/graphql";

async fn graphiql(headers: HeaderMap) -> impl IntoResponse {
    let accepts_html = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("text/html"))
        .unwrap_or(false);
    if accepts_html {
        Html(GraphiQLSource::build().endpoint(GRAPHQL_PATH).finish()).into_response()
    } else {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            Json(serde_json::json!({
                "error": "use POST with Content-Type: application/json"
            })),
        )
            .into_response()
    }
}

/// Request headers are handed to hooks through `RequestContext` request data.
async fn execute(
    State(state): State<AppState>,
    GraphqlRequestContext(request_ctx): GraphqlRequestContext,
    Json(request): Json<async_graphql::Request>,
) -> Json<async_graphql::Response> {
    let response = state.schema.execute(request.data(request_ctx)).await;
    if response.is_err() {
        tracing::debug!(errors = ?response.errors, "graphql request failed");
    }
    Json(response)
}

/// GET/POST /graphql. Request bodies over `max_body_bytes` are rejected with 413.
pub fn graphql_routes(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route(GRAPHQL_PATH, get(graphiql).post(execute))
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .with_state(state)
}

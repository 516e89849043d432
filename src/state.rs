//! Shared application state for all routes.

use async_graphql::dynamic::Schema;
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    /// Generated once at startup; regenerate and rebuild the router to pick up metadata changes.
    pub schema: Schema,
    pub api_name: String,
}

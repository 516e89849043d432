//! Example consumer: generates a GraphQL API from a database schema (or a JSON config) and serves it.
//!
//! Run from repo root: `cargo run -p example-consumer`

use async_trait::async_trait;
use graphql_schemagen::{
    graphql_routes, service_routes, load_from_path, AppError, AppState, EntitySource, HookContext,
    HookOperation, Hooks, PgCatalog, PgSessionFactory, PreHookResult, SchemaGenerator, SchemaHook, Settings,
};
use serde_json::Value;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Logs every read; set `X-Read-Only: stop` on a request to see a pre-hook abort it.
struct AuditReads;

#[async_trait]
impl SchemaHook for AuditReads {
    async fn pre(&self, ctx: &HookContext<'_>, _args: &Value) -> Result<PreHookResult, AppError> {
        tracing::info!(entity = %ctx.entity.name, field = ctx.field, "read");
        let stop = ctx
            .request
            .and_then(|r| r.header("x-read-only"))
            .is_some_and(|v| v == "stop");
        Ok(if stop { PreHookResult::Stop } else { PreHookResult::Continue })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("graphql_schemagen=info,example_consumer=info")),
        )
        .init();

    let settings = Settings::from_env()?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&settings.database_url)
        .await?;

    let source: Box<dyn EntitySource> = match &settings.config_path {
        Some(path) => Box::new(load_from_path(path).await?),
        None => Box::new(PgCatalog::new(pool.clone(), settings.db_schema.clone())),
    };

    let generated = SchemaGenerator::new(settings.api_name.clone())
        .ignore(settings.ignore.clone())
        .with_hooks(Hooks::new().with(HookOperation::Read, AuditReads))
        .generate_from(source.as_ref(), Arc::new(PgSessionFactory::new(pool.clone())))
        .await?;
    tracing::info!(
        queries = generated.query_fields.len(),
        mutations = generated.mutation_fields.len(),
        "schema generated"
    );

    let state = AppState {
        pool,
        schema: generated.into_schema()?,
        api_name: settings.api_name.clone(),
    };
    let app = service_routes(state.clone()).merge(graphql_routes(state, settings.max_body_bytes));

    let listener = TcpListener::bind(&settings.bind).await?;
    tracing::info!("listening on http://{}/graphql", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

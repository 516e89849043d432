//! GraphQL schema generator: derives a list/create/update/delete API from relational table metadata.

pub mod case;
pub mod config;
pub mod error;
pub mod extractors;
pub mod routes;
pub mod schema;
pub mod sql;
pub mod state;
pub mod store;

pub use config::{load_from_path, load_from_pool, resolve, EntityDescriptor, EntitySource, FullConfig, PgCatalog, Settings, StaticEntities};
pub use error::{AppError, ConfigError, SchemaError};
pub use routes::{graphql_routes, service_routes};
pub use schema::{GeneratedSchema, HookContext, HookOperation, Hooks, PostHookResult, PreHookResult, RequestContext, SchemaGenerator, SchemaHook};
pub use state::AppState;
pub use store::{in_session, MemoryStore, PgSessionFactory, Session, SessionFactory};

//! GraphQL schema generation from entity metadata.

pub mod args;
pub mod builders;
pub mod generator;
pub mod hooks;
pub mod registry;
pub mod resolvers;
pub mod types;
pub mod vocabulary;

pub use builders::EntityBinding;
pub use generator::{GeneratedSchema, SchemaGenerator};
pub use hooks::{HookContext, HookOperation, Hooks, PostHookResult, PreHookResult, RequestContext, SchemaHook};
pub use registry::TypeRegistry;
pub use types::{ScalarType, TypeConverters, TypeMask};
pub use vocabulary::{FilterClause, FilterOperation, OrderClause, OrderOperation, Pagination};

mod graphql;
mod service;

pub use graphql::{graphql_routes, GRAPHQL_PATH};
pub use service::service_routes;

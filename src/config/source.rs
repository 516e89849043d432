//! Where entity descriptors come from.

use crate::config::{load_from_pool, resolve, EntityDescriptor, FullConfig};
use crate::error::ConfigError;
use async_trait::async_trait;
use sqlx::PgPool;

/// Produces normalized entity descriptors. The schema generator only ever sees
/// the result; it never inspects a database or config file itself.
#[async_trait]
pub trait EntitySource: Send + Sync {
    async fn entities(&self) -> Result<Vec<EntityDescriptor>, ConfigError>;
}

#[async_trait]
impl EntitySource for FullConfig {
    async fn entities(&self) -> Result<Vec<EntityDescriptor>, ConfigError> {
        resolve(self)
    }
}

/// Descriptors built in code.
#[derive(Clone, Debug, Default)]
pub struct StaticEntities(pub Vec<EntityDescriptor>);

#[async_trait]
impl EntitySource for StaticEntities {
    async fn entities(&self) -> Result<Vec<EntityDescriptor>, ConfigError> {
        Ok(self.0.clone())
    }
}

/// Reflects tables of one PostgreSQL schema.
#[derive(Clone, Debug)]
pub struct PgCatalog {
    pub pool: PgPool,
    pub schema: String,
}

impl PgCatalog {
    pub fn new(pool: PgPool, schema: impl Into<String>) -> Self {
        Self {
            pool,
            schema: schema.into(),
        }
    }
}

#[async_trait]
impl EntitySource for PgCatalog {
    async fn entities(&self) -> Result<Vec<EntityDescriptor>, ConfigError> {
        let config = load_from_pool(&self.pool, &self.schema).await?;
        resolve(&config)
    }
}

//! Store session seam: what generated resolvers need from a data store.

pub mod memory;
pub mod postgres;

use crate::config::EntityDescriptor;
use crate::error::AppError;
use crate::schema::{FilterClause, OrderClause, Pagination};
use async_trait::async_trait;
use futures::future::BoxFuture;

pub use memory::{MemoryStore, StoreStats};
pub use postgres::PgSessionFactory;

/// One row as column name -> JSON value.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Filters are combined with AND. Without an order clause rows come back in key order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SelectQuery {
    pub filters: Vec<FilterClause>,
    pub order: Option<OrderClause>,
    pub pagination: Pagination,
}

/// A unit of work against the store. Nothing is visible to other sessions until `commit`;
/// dropping an uncommitted session discards its work and releases it.
#[async_trait]
pub trait Session: Send {
    async fn select(&mut self, entity: &EntityDescriptor, query: &SelectQuery) -> Result<Vec<Row>, AppError>;

    /// Insert one row; returns it as stored (generated key and defaults included).
    async fn insert(&mut self, entity: &EntityDescriptor, row: &Row) -> Result<Row, AppError>;

    /// Apply `changes` to the row matching `key`. `None` when no row matches.
    async fn update(&mut self, entity: &EntityDescriptor, key: &Row, changes: &Row) -> Result<Option<Row>, AppError>;

    /// Delete every row matching `key` (all given columns equal); returns the count.
    async fn delete(&mut self, entity: &EntityDescriptor, key: &Row) -> Result<u64, AppError>;

    async fn commit(self: Box<Self>) -> Result<(), AppError>;

    async fn rollback(self: Box<Self>) -> Result<(), AppError>;
}

pub type BoxSession = Box<dyn Session>;

#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self) -> Result<BoxSession, AppError>;
}

/// Run `work` in a fresh session: commit on success, roll back on error.
/// The session is released before this returns, either way.
pub async fn in_session<T, F>(factory: &dyn SessionFactory, work: F) -> Result<T, AppError>
where
    T: Send,
    F: for<'s> FnOnce(&'s mut BoxSession) -> BoxFuture<'s, Result<T, AppError>>,
{
    let mut session = factory.open().await?;
    match work(&mut session).await {
        Ok(value) => {
            session.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = session.rollback().await {
                tracing::warn!(error = %rollback_err, "rollback failed");
            }
            Err(err)
        }
    }
}

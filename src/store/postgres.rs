//! PostgreSQL sessions: one transaction per session, opened from the pool.

use super::{BoxSession, Row, SelectQuery, Session, SessionFactory};
use crate::config::EntityDescriptor;
use crate::error::AppError;
use crate::sql::{self, PgBindValue, QueryBuf};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgPool, PgRow};
use sqlx::query::Query;
use sqlx::{Postgres, Transaction};
use tracing::debug;

#[derive(Clone)]
pub struct PgSessionFactory {
    pool: PgPool,
}

impl PgSessionFactory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionFactory for PgSessionFactory {
    async fn open(&self) -> Result<BoxSession, AppError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgSession { tx }))
    }
}

/// Dropping the session without `commit` rolls the transaction back and returns the connection.
pub struct PgSession {
    tx: Transaction<'static, Postgres>,
}

fn bind_all(q: &QueryBuf) -> Query<'_, Postgres, PgArguments> {
    debug!(sql = %q.sql, params = ?q.params, "query");
    q.params
        .iter()
        .fold(sqlx::query(&q.sql), |query, p| query.bind(PgBindValue::from(p)))
}

/// Constraint violations surface as data-access errors carrying the database message.
fn data_access(e: sqlx::Error) -> AppError {
    match e {
        sqlx::Error::Database(db) => AppError::DataAccess(db.message().to_string()),
        other => AppError::Db(other),
    }
}

impl PgSession {
    async fn fetch_all(&mut self, q: &QueryBuf) -> Result<Vec<Row>, AppError> {
        let rows = bind_all(q).fetch_all(&mut *self.tx).await.map_err(data_access)?;
        Ok(rows.iter().map(row_to_json).collect())
    }

    async fn fetch_optional(&mut self, q: &QueryBuf) -> Result<Option<Row>, AppError> {
        let row = bind_all(q).fetch_optional(&mut *self.tx).await.map_err(data_access)?;
        Ok(row.as_ref().map(row_to_json))
    }
}

#[async_trait]
impl Session for PgSession {
    async fn select(&mut self, entity: &EntityDescriptor, query: &SelectQuery) -> Result<Vec<Row>, AppError> {
        self.fetch_all(&sql::select(entity, query)).await
    }

    async fn insert(&mut self, entity: &EntityDescriptor, row: &Row) -> Result<Row, AppError> {
        let q = sql::insert(entity, row);
        let row = bind_all(&q).fetch_one(&mut *self.tx).await.map_err(data_access)?;
        Ok(row_to_json(&row))
    }

    async fn update(&mut self, entity: &EntityDescriptor, key: &Row, changes: &Row) -> Result<Option<Row>, AppError> {
        self.fetch_optional(&sql::update(entity, key, changes)).await
    }

    async fn delete(&mut self, entity: &EntityDescriptor, key: &Row) -> Result<u64, AppError> {
        let q = sql::delete(entity, key);
        let result = bind_all(&q).execute(&mut *self.tx).await.map_err(data_access)?;
        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        self.tx.commit().await.map_err(data_access)
    }

    async fn rollback(self: Box<Self>) -> Result<(), AppError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

fn row_to_json(row: &PgRow) -> Row {
    use sqlx::Column;
    use sqlx::Row as _;
    row.columns()
        .iter()
        .map(|col| (col.name().to_string(), cell_to_value(row, col.name())))
        .collect()
}

fn cell_to_value(row: &PgRow, name: &str) -> Value {
    use sqlx::Row as _;
    if let Ok(Some(n)) = row.try_get::<Option<i16>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<f32>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n as f64) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(name) {
        return Value::Bool(b);
    }
    if let Ok(Some(u)) = row.try_get::<Option<uuid::Uuid>, _>(name) {
        return Value::String(u.to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
        return Value::String(d.to_rfc3339());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDateTime>, _>(name) {
        return Value::String(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDate>, _>(name) {
        return Value::String(d.format("%Y-%m-%d").to_string());
    }
    if let Ok(Some(t)) = row.try_get::<Option<chrono::NaiveTime>, _>(name) {
        return Value::String(t.format("%H:%M:%S%.f").to_string());
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    if let Ok(Some(j)) = row.try_get::<Option<Value>, _>(name) {
        return j;
    }
    Value::Null
}

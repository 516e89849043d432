//! In-process store with snapshot sessions. Used by tests and demos; keeps counters
//! so callers can check that sessions are always released and failed work is rolled back.
//!
//! A session reads from a snapshot taken at open and records its writes in a journal.
//! Commit replays the journal onto the current tables, so concurrent sessions merge;
//! a write that conflicts with another session's committed work fails the commit.

use crate::config::{ColumnDefault, EntityDescriptor};
use crate::error::AppError;
use crate::schema::types::is_integer_type;
use crate::schema::vocabulary::value_text;
use crate::schema::{FilterClause, FilterOperation, OrderOperation};
use crate::store::{BoxSession, Row, SelectQuery, Session, SessionFactory};
use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub opened: u64,
    pub released: u64,
    pub commits: u64,
    pub rollbacks: u64,
    /// Insert/update/delete calls that were part of a committed session.
    pub committed_mutations: u64,
}

type Tables = HashMap<String, Vec<Row>>;

#[derive(Default)]
struct Shared {
    tables: Mutex<Tables>,
    /// Last auto-assigned key per table. Like a database sequence, never rolled back.
    sequences: Mutex<HashMap<String, i64>>,
    stats: Mutex<StoreStats>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn table_key(entity: &EntityDescriptor) -> String {
    format!("{}.{}", entity.schema.as_deref().unwrap_or("public"), entity.table_name)
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the rows of an entity's table.
    pub fn seed(&self, entity: &EntityDescriptor, rows: Vec<Row>) {
        lock(&self.shared.tables).insert(table_key(entity), rows);
    }

    /// Committed rows of an entity's table.
    pub fn rows(&self, entity: &EntityDescriptor) -> Vec<Row> {
        lock(&self.shared.tables)
            .get(&table_key(entity))
            .cloned()
            .unwrap_or_default()
    }

    pub fn stats(&self) -> StoreStats {
        *lock(&self.shared.stats)
    }
}

#[async_trait]
impl SessionFactory for MemoryStore {
    async fn open(&self) -> Result<BoxSession, AppError> {
        let snapshot = lock(&self.shared.tables).clone();
        lock(&self.shared.stats).opened += 1;
        Ok(Box::new(MemorySession {
            shared: self.shared.clone(),
            staged: snapshot,
            journal: Vec::new(),
        }))
    }
}

enum Change {
    Insert(Row),
    Update { key: Row, changes: Row },
    Delete(Row),
}

struct Pending {
    entity: EntityDescriptor,
    change: Change,
}

pub struct MemorySession {
    shared: Arc<Shared>,
    staged: Tables,
    journal: Vec<Pending>,
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        lock(&self.shared.stats).released += 1;
    }
}

impl MemorySession {
    fn table(&mut self, entity: &EntityDescriptor) -> &mut Vec<Row> {
        self.staged.entry(table_key(entity)).or_default()
    }

    fn record(&mut self, entity: &EntityDescriptor, change: Change) {
        self.journal.push(Pending {
            entity: entity.clone(),
            change,
        });
    }

    /// Next key from the table's sequence, never below a key already committed or staged.
    fn next_key(&self, entity: &EntityDescriptor, column: &str) -> i64 {
        let key = table_key(entity);
        let highest = |rows: Option<&Vec<Row>>| {
            rows.into_iter()
                .flatten()
                .filter_map(|r| r.get(column).and_then(Value::as_i64))
                .max()
                .unwrap_or(0)
        };
        let committed = highest(lock(&self.shared.tables).get(&key));
        let staged = highest(self.staged.get(&key));
        let mut sequences = lock(&self.shared.sequences);
        let next = sequences.get(&key).copied().unwrap_or(0).max(committed).max(staged) + 1;
        sequences.insert(key, next);
        next
    }
}

fn check_columns(entity: &EntityDescriptor, row: &Row) -> Result<(), AppError> {
    match row.keys().find(|k| entity.column(k).is_none()) {
        Some(unknown) => Err(AppError::UnknownField {
            entity: entity.name.clone(),
            field: unknown.clone(),
        }),
        None => Ok(()),
    }
}

fn not_null_violation(entity: &EntityDescriptor, column: &str) -> AppError {
    AppError::DataAccess(format!(
        "null value in column \"{}\" of relation \"{}\" violates not-null constraint",
        column, entity.table_name
    ))
}

fn duplicate_key(entity: &EntityDescriptor) -> AppError {
    AppError::DataAccess(format!(
        "duplicate key value violates unique constraint on \"{}\"",
        entity.table_name
    ))
}

fn matches_key(row: &Row, key: &Row) -> bool {
    key.iter()
        .all(|(k, v)| row.get(k).map(|cell| compare(cell, v) == Some(Ordering::Equal)).unwrap_or(false))
}

fn key_of(entity: &EntityDescriptor, row: &Row) -> Row {
    entity
        .primary_key
        .iter()
        .map(|pk| (pk.clone(), row.get(pk).cloned().unwrap_or(Value::Null)))
        .collect()
}

fn apply_changes(entity: &EntityDescriptor, row: &mut Row, changes: &Row) {
    for (name, value) in changes {
        if !entity.is_primary_key(name) {
            row.insert(name.clone(), value.clone());
        }
    }
}

/// Replay one journaled write onto committed tables.
fn replay(tables: &mut Tables, pending: &Pending) -> Result<(), AppError> {
    let entity = &pending.entity;
    let table = tables.entry(table_key(entity)).or_default();
    match &pending.change {
        Change::Insert(row) => {
            let key = key_of(entity, row);
            if table.iter().any(|r| matches_key(r, &key)) {
                return Err(duplicate_key(entity));
            }
            table.push(row.clone());
        }
        Change::Update { key, changes } => {
            let Some(row) = table.iter_mut().find(|r| matches_key(r, key)) else {
                return Err(AppError::DataAccess(format!(
                    "row of \"{}\" was deleted by a concurrent session",
                    entity.table_name
                )));
            };
            apply_changes(entity, row, changes);
        }
        Change::Delete(key) => table.retain(|r| !matches_key(r, key)),
    }
    Ok(())
}

#[async_trait]
impl Session for MemorySession {
    async fn select(&mut self, entity: &EntityDescriptor, query: &SelectQuery) -> Result<Vec<Row>, AppError> {
        let mut rows: Vec<Row> = self
            .table(entity)
            .iter()
            .filter(|row| query.filters.iter().all(|f| matches_filter(row, f)))
            .cloned()
            .collect();
        match &query.order {
            Some(order) => rows.sort_by(|a, b| {
                let ord = sort_order(a.get(&order.field), b.get(&order.field));
                match order.direction {
                    OrderOperation::Asc => ord,
                    OrderOperation::Desc => ord.reverse(),
                }
            }),
            None => rows.sort_by(|a, b| {
                entity
                    .primary_key
                    .iter()
                    .map(|pk| sort_order(a.get(pk), b.get(pk)))
                    .find(|ord| ord.is_ne())
                    .unwrap_or(Ordering::Equal)
            }),
        }
        let offset = usize::try_from(query.pagination.offset()).unwrap_or(usize::MAX);
        let limit = usize::try_from(query.pagination.limit()).unwrap_or(0);
        Ok(rows.into_iter().skip(offset).take(limit).collect())
    }

    async fn insert(&mut self, entity: &EntityDescriptor, row: &Row) -> Result<Row, AppError> {
        check_columns(entity, row)?;
        let auto_key = match entity.primary_key.as_slice() {
            [pk] => entity
                .column(pk)
                .filter(|c| is_integer_type(&c.sql_type) && !row.contains_key(pk))
                .map(|c| c.name.clone()),
            _ => None,
        };
        let mut stored = Row::new();
        for column in &entity.columns {
            let value = match row.get(&column.name) {
                Some(v) if v.is_null() && !column.nullable => return Err(not_null_violation(entity, &column.name)),
                Some(v) => v.clone(),
                None if auto_key.as_deref() == Some(column.name.as_str()) => {
                    Value::from(self.next_key(entity, &column.name))
                }
                None => match &column.default {
                    Some(ColumnDefault::Literal(v)) => v.clone(),
                    Some(ColumnDefault::Expression(_)) => Value::Null,
                    None if !column.nullable => return Err(not_null_violation(entity, &column.name)),
                    None => Value::Null,
                },
            };
            stored.insert(column.name.clone(), value);
        }
        let key = key_of(entity, &stored);
        let table = self.table(entity);
        if table.iter().any(|r| matches_key(r, &key)) {
            return Err(duplicate_key(entity));
        }
        table.push(stored.clone());
        self.record(entity, Change::Insert(stored.clone()));
        Ok(stored)
    }

    async fn update(&mut self, entity: &EntityDescriptor, key: &Row, changes: &Row) -> Result<Option<Row>, AppError> {
        check_columns(entity, changes)?;
        if let Some((name, _)) = changes
            .iter()
            .find(|(name, value)| value.is_null() && entity.column(name).is_some_and(|c| !c.nullable))
        {
            return Err(not_null_violation(entity, name));
        }
        let table = self.table(entity);
        let Some(row) = table.iter_mut().find(|r| matches_key(r, key)) else {
            return Ok(None);
        };
        apply_changes(entity, row, changes);
        let updated = row.clone();
        self.record(
            entity,
            Change::Update {
                key: key.clone(),
                changes: changes.clone(),
            },
        );
        Ok(Some(updated))
    }

    async fn delete(&mut self, entity: &EntityDescriptor, key: &Row) -> Result<u64, AppError> {
        let table = self.table(entity);
        let before = table.len();
        table.retain(|r| !matches_key(r, key));
        let deleted = (before - table.len()) as u64;
        self.record(entity, Change::Delete(key.clone()));
        Ok(deleted)
    }

    /// All journaled writes land together or not at all.
    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        let mutations = self.journal.len() as u64;
        if mutations > 0 {
            let mut tables = lock(&self.shared.tables);
            let mut merged = tables.clone();
            let replayed = self.journal.iter().try_for_each(|pending| replay(&mut merged, pending));
            if let Err(e) = replayed {
                drop(tables);
                lock(&self.shared.stats).rollbacks += 1;
                return Err(e);
            }
            *tables = merged;
        }
        let mut stats = lock(&self.shared.stats);
        stats.commits += 1;
        stats.committed_mutations += mutations;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), AppError> {
        lock(&self.shared.stats).rollbacks += 1;
        Ok(())
    }
}

fn as_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// SQL-like comparison of two non-null scalars. `None` when either is null or they are incomparable.
/// Text compares as text; a string is read as a number only against a number.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, _) | (_, Value::Null) => None,
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Number(_), _) | (_, Value::Number(_)) => as_number(a)?.partial_cmp(&as_number(b)?),
        _ => (a == b).then_some(Ordering::Equal),
    }
}

/// Nulls sort after every value (PostgreSQL's default for ASC).
fn sort_order(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(x), Some(y)) => compare(x, y).unwrap_or(Ordering::Equal),
    }
}

fn matches_filter(row: &Row, f: &FilterClause) -> bool {
    let cell = row.get(&f.field).unwrap_or(&Value::Null);
    let eq = |v: &Value| compare(cell, v) == Some(Ordering::Equal);
    let contains = |case_insensitive: bool| {
        let (Some(v), false) = (f.v.as_ref(), cell.is_null()) else {
            return None;
        };
        let (hay, needle) = (value_text(cell), value_text(v));
        Some(if case_insensitive {
            hay.to_lowercase().contains(&needle.to_lowercase())
        } else {
            hay.contains(&needle)
        })
    };
    let list = f.vl.as_deref().unwrap_or(&[]);
    match f.op {
        FilterOperation::Eq | FilterOperation::Is => match &f.v {
            None => cell.is_null(),
            Some(v) => eq(v),
        },
        FilterOperation::Neq => match &f.v {
            None => !cell.is_null(),
            Some(v) => !cell.is_null() && !eq(v),
        },
        FilterOperation::IsNot => match &f.v {
            None => !cell.is_null(),
            Some(v) => !eq(v),
        },
        FilterOperation::IsNull => cell.is_null(),
        FilterOperation::IsNotNull => !cell.is_null(),
        FilterOperation::Lt => f.v.as_ref().and_then(|v| compare(cell, v)) == Some(Ordering::Less),
        FilterOperation::Gt => f.v.as_ref().and_then(|v| compare(cell, v)) == Some(Ordering::Greater),
        FilterOperation::Like => contains(false) == Some(true),
        FilterOperation::NotLike => contains(false) == Some(false),
        FilterOperation::ILike => contains(true) == Some(true),
        FilterOperation::NotILike => contains(true) == Some(false),
        FilterOperation::In => list.iter().any(eq),
        FilterOperation::NotIn => !cell.is_null() && !list.iter().any(eq),
        FilterOperation::Between => match list {
            [low, high] => {
                matches!(compare(cell, low), Some(Ordering::Greater | Ordering::Equal))
                    && matches!(compare(cell, high), Some(Ordering::Less | Ordering::Equal))
            }
            _ => false,
        },
    }
}

//! Builds parameterized SELECT, INSERT, UPDATE, DELETE for one entity.

use crate::config::{ColumnDescriptor, EntityDescriptor};
use crate::schema::types::normalize_native_type;
use crate::schema::{FilterClause, FilterOperation, OrderOperation};
use crate::store::{Row, SelectQuery};
use serde_json::Value;

/// Quote identifier for PostgreSQL (safe: names are validated identifiers).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

fn qualified_table(entity: &EntityDescriptor) -> String {
    match &entity.schema {
        Some(schema) => format!("{}.{}", quoted(schema), quoted(&entity.table_name)),
        None => quoted(&entity.table_name),
    }
}

#[derive(Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: Value) -> usize {
        self.params.push(v);
        self.params.len()
    }

    /// `$n::<type>` so text-ish parameters bind to any column type.
    fn typed_param(&mut self, column: &ColumnDescriptor, v: Value) -> String {
        let n = self.push_param(v);
        if normalize_native_type(&column.sql_type).ends_with("[]") {
            // Arrays arrive as JSON lists.
            return format!(
                "(SELECT array_agg(e) FROM jsonb_array_elements_text(${}::jsonb) e)::{}",
                n, column.sql_type
            );
        }
        format!("${}::{}", n, cast_type(&column.sql_type))
    }
}

/// Pseudo-types are not valid cast targets.
fn cast_type(sql_type: &str) -> String {
    match normalize_native_type(sql_type).as_str() {
        "serial" | "serial4" => "integer".into(),
        "bigserial" | "serial8" => "bigint".into(),
        "smallserial" | "serial2" => "smallint".into(),
        _ => sql_type.to_string(),
    }
}

/// Types sqlx decodes directly into a JSON cell; everything else is selected as text.
const DECODED_TYPES: &[&str] = &[
    "smallint", "integer", "int", "int2", "int4", "int8", "bigint", "smallserial", "serial", "bigserial", "serial2",
    "serial4", "serial8", "real", "float", "float4", "float8", "double precision", "boolean", "bool", "text",
    "varchar", "character varying", "char", "character", "bpchar", "name", "uuid", "date", "time",
    "time without time zone", "timestamp", "timestamp without time zone", "timestamp with time zone", "timestamptz",
    "json", "jsonb",
];

fn select_expr(c: &ColumnDescriptor) -> String {
    let q = quoted(&c.name);
    let t = normalize_native_type(&c.sql_type);
    if t.ends_with("[]") {
        format!("to_jsonb({}) AS {}", q, q)
    } else if DECODED_TYPES.contains(&t.as_str()) {
        q
    } else {
        format!("{}::text AS {}", q, q)
    }
}

fn select_column_list(entity: &EntityDescriptor) -> String {
    entity
        .columns
        .iter()
        .map(select_expr)
        .collect::<Vec<_>>()
        .join(", ")
}

fn filter_sql(q: &mut QueryBuf, entity: &EntityDescriptor, f: &FilterClause) -> String {
    let Some(column) = entity.column(&f.field) else {
        return "FALSE".into();
    };
    let col = quoted(&column.name);
    let list = f.vl.as_deref().unwrap_or(&[]);
    match (f.op, &f.v) {
        (FilterOperation::Eq | FilterOperation::Is, None) | (FilterOperation::IsNull, _) => format!("{} IS NULL", col),
        (FilterOperation::Neq | FilterOperation::IsNot, None) | (FilterOperation::IsNotNull, _) => {
            format!("{} IS NOT NULL", col)
        }
        (FilterOperation::Eq, Some(v)) => format!("{} = {}", col, q.typed_param(column, v.clone())),
        (FilterOperation::Neq, Some(v)) => format!("{} <> {}", col, q.typed_param(column, v.clone())),
        (FilterOperation::Is, Some(v)) => format!("{} IS NOT DISTINCT FROM {}", col, q.typed_param(column, v.clone())),
        (FilterOperation::IsNot, Some(v)) => format!("{} IS DISTINCT FROM {}", col, q.typed_param(column, v.clone())),
        (FilterOperation::Lt, Some(v)) => format!("{} < {}", col, q.typed_param(column, v.clone())),
        (FilterOperation::Gt, Some(v)) => format!("{} > {}", col, q.typed_param(column, v.clone())),
        (FilterOperation::Like | FilterOperation::NotLike | FilterOperation::ILike | FilterOperation::NotILike, Some(_)) => {
            let keyword = match f.op {
                FilterOperation::Like => "LIKE",
                FilterOperation::NotLike => "NOT LIKE",
                FilterOperation::ILike => "ILIKE",
                _ => "NOT ILIKE",
            };
            let n = q.push_param(Value::String(f.like_pattern().unwrap_or_default()));
            format!("{}::text {} ${}", col, keyword, n)
        }
        (FilterOperation::In, _) if list.is_empty() => "FALSE".into(),
        (FilterOperation::NotIn, _) if list.is_empty() => format!("{} IS NOT NULL", col),
        (FilterOperation::In | FilterOperation::NotIn, _) => {
            let placeholders: Vec<String> = list.iter().map(|v| q.typed_param(column, v.clone())).collect();
            let keyword = if f.op == FilterOperation::In { "IN" } else { "NOT IN" };
            format!("{} {} ({})", col, keyword, placeholders.join(", "))
        }
        (FilterOperation::Between, _) => match list {
            [low, high] => {
                let low = q.typed_param(column, low.clone());
                let high = q.typed_param(column, high.clone());
                format!("{} BETWEEN {} AND {}", col, low, high)
            }
            _ => "FALSE".into(),
        },
        (FilterOperation::Lt | FilterOperation::Gt | FilterOperation::Like | FilterOperation::NotLike, None)
        | (FilterOperation::ILike | FilterOperation::NotILike, None) => "FALSE".into(),
    }
}

fn key_condition(q: &mut QueryBuf, entity: &EntityDescriptor, key: &Row) -> String {
    let parts: Vec<String> = entity
        .columns
        .iter()
        .filter_map(|c| key.get(&c.name).map(|v| (c, v)))
        .map(|(c, v)| format!("{} = {}", quoted(&c.name), q.typed_param(c, v.clone())))
        .collect();
    if parts.is_empty() {
        "FALSE".into()
    } else {
        parts.join(" AND ")
    }
}

/// SELECT with filters (AND), one optional ORDER BY (key order otherwise), LIMIT/OFFSET.
pub fn select(entity: &EntityDescriptor, query: &SelectQuery) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_parts: Vec<String> = query.filters.iter().map(|f| filter_sql(&mut q, entity, f)).collect();
    let where_clause = if where_parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", where_parts.join(" AND "))
    };
    let order_clause = match &query.order {
        Some(o) => format!(
            " ORDER BY {} {}",
            quoted(&o.field),
            match o.direction {
                OrderOperation::Asc => "ASC",
                OrderOperation::Desc => "DESC",
            }
        ),
        None => format!(
            " ORDER BY {}",
            entity.primary_key.iter().map(|c| quoted(c)).collect::<Vec<_>>().join(", ")
        ),
    };
    q.sql = format!(
        "SELECT {} FROM {}{}{} LIMIT {} OFFSET {}",
        select_column_list(entity),
        qualified_table(entity),
        where_clause,
        order_clause,
        query.pagination.limit(),
        query.pagination.offset()
    );
    q
}

/// INSERT of the columns present in `row`; absent columns take their database default.
pub fn insert(entity: &EntityDescriptor, row: &Row) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for c in &entity.columns {
        if let Some(v) = row.get(&c.name) {
            cols.push(quoted(&c.name));
            placeholders.push(q.typed_param(c, v.clone()));
        }
    }
    let values = if cols.is_empty() {
        " DEFAULT VALUES".to_string()
    } else {
        format!(" ({}) VALUES ({})", cols.join(", "), placeholders.join(", "))
    };
    q.sql = format!(
        "INSERT INTO {}{} RETURNING {}",
        qualified_table(entity),
        values,
        select_column_list(entity)
    );
    q
}

/// UPDATE by key: SET only non-key columns present in `changes`. With nothing to set this is a SELECT by key.
pub fn update(entity: &EntityDescriptor, key: &Row, changes: &Row) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut sets = Vec::new();
    for c in &entity.columns {
        if c.primary_key {
            continue;
        }
        if let Some(v) = changes.get(&c.name) {
            sets.push(format!("{} = {}", quoted(&c.name), q.typed_param(c, v.clone())));
        }
    }
    let table = qualified_table(entity);
    let returning = select_column_list(entity);
    let condition = key_condition(&mut q, entity, key);
    q.sql = if sets.is_empty() {
        format!("SELECT {} FROM {} WHERE {}", returning, table, condition)
    } else {
        format!(
            "UPDATE {} SET {} WHERE {} RETURNING {}",
            table,
            sets.join(", "),
            condition,
            returning
        )
    };
    q
}

/// DELETE every row matching the key columns.
pub fn delete(entity: &EntityDescriptor, key: &Row) -> QueryBuf {
    let mut q = QueryBuf::new();
    let condition = key_condition(&mut q, entity, key);
    q.sql = format!("DELETE FROM {} WHERE {}", qualified_table(entity), condition);
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::resolved::fixtures;
    use crate::schema::{OrderClause, Pagination};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn row(v: Value) -> Row {
        match v {
            Value::Object(m) => m,
            _ => unreachable!(),
        }
    }

    #[test]
    fn select_with_filters_order_and_page() {
        let mut user = fixtures::user();
        user.schema = Some("app".into());
        let query = SelectQuery {
            filters: vec![
                FilterClause::new("age", FilterOperation::Gt, Some(json!(17)), None).unwrap(),
                FilterClause::new("name", FilterOperation::ILike, Some(json!("an")), None).unwrap(),
                FilterClause::new("age", FilterOperation::Between, None, Some(vec![json!(1), json!(99)])).unwrap(),
                FilterClause::new("age", FilterOperation::Eq, None, None).unwrap(),
            ],
            order: Some(OrderClause {
                field: "name".into(),
                direction: OrderOperation::Asc,
            }),
            pagination: Pagination::new(3, 10).unwrap(),
        };
        let q = select(&user, &query);
        assert_eq!(
            q.sql,
            "SELECT \"id\", \"name\", \"age\" FROM \"app\".\"users\" WHERE \"age\" > $1::integer AND \"name\"::text ILIKE $2 \
             AND \"age\" BETWEEN $3::integer AND $4::integer AND \"age\" IS NULL ORDER BY \"name\" ASC LIMIT 10 OFFSET 20"
        );
        assert_eq!(q.params, vec![json!(17), json!("%an%"), json!(1), json!(99)]);
    }

    #[test]
    fn in_lists_and_null_safe_comparison() {
        let user = fixtures::user();
        let query = SelectQuery {
            filters: vec![
                FilterClause::new("id", FilterOperation::In, None, Some(vec![json!(1), json!(2)])).unwrap(),
                FilterClause::new("age", FilterOperation::IsNot, Some(json!(18)), None).unwrap(),
                FilterClause::new("id", FilterOperation::NotIn, None, Some(vec![])).unwrap(),
            ],
            ..Default::default()
        };
        let q = select(&user, &query);
        assert!(q.sql.contains("\"id\" IN ($1::integer, $2::integer)"));
        assert!(q.sql.contains("\"age\" IS DISTINCT FROM $3::integer"));
        assert!(q.sql.contains("\"id\" IS NOT NULL"));
        assert!(q.sql.ends_with("ORDER BY \"id\" LIMIT 50 OFFSET 0"));
    }

    #[test]
    fn insert_update_delete() {
        let mut user = fixtures::user();
        user.columns[0].sql_type = "serial".into();
        user.columns[2].sql_type = "numeric(5,1)".into();

        let q = insert(&user, &row(json!({ "name": "Ann", "age": "18.5" })));
        assert_eq!(
            q.sql,
            "INSERT INTO \"users\" (\"name\", \"age\") VALUES ($1::varchar(120), $2::numeric(5,1)) \
             RETURNING \"id\", \"name\", \"age\"::text AS \"age\""
        );

        let q = update(&user, &row(json!({ "id": 7 })), &row(json!({ "id": 8, "name": "Bo" })));
        assert_eq!(
            q.sql,
            "UPDATE \"users\" SET \"name\" = $1::varchar(120) WHERE \"id\" = $2::integer \
             RETURNING \"id\", \"name\", \"age\"::text AS \"age\""
        );
        assert_eq!(q.params, vec![json!("Bo"), json!(7)]);

        let q = update(&user, &row(json!({ "id": 7 })), &Row::new());
        assert!(q.sql.starts_with("SELECT "));

        let links = fixtures::user_group();
        let q = delete(&links, &row(json!({ "user_id": 1, "group_id": 2 })));
        assert_eq!(
            q.sql,
            "DELETE FROM \"user_groups\" WHERE \"user_id\" = $1::integer AND \"group_id\" = $2::integer"
        );
        assert_eq!(delete(&links, &Row::new()).sql, "DELETE FROM \"user_groups\" WHERE FALSE");
    }
}

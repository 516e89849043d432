//! Reflect entity config from a live PostgreSQL catalog.

use crate::config::types::*;
use crate::error::ConfigError;
use sqlx::PgPool;
use std::collections::HashMap;

const TABLES_SQL: &str = r#"
SELECT c.relname::text AS table_name,
       obj_description(c.oid, 'pg_class') AS comment
FROM pg_class c
JOIN pg_namespace n ON n.oid = c.relnamespace
WHERE n.nspname = $1 AND c.relkind IN ('r', 'p')
ORDER BY c.relname
"#;

const COLUMNS_SQL: &str = r#"
SELECT c.relname::text AS table_name,
       a.attname::text AS column_name,
       format_type(a.atttypid, a.atttypmod) AS native_type,
       NOT a.attnotnull AS nullable,
       pg_get_expr(d.adbin, d.adrelid) AS column_default,
       col_description(c.oid, a.attnum) AS comment
FROM pg_attribute a
JOIN pg_class c ON c.oid = a.attrelid
JOIN pg_namespace n ON n.oid = c.relnamespace
LEFT JOIN pg_attrdef d ON d.adrelid = a.attrelid AND d.adnum = a.attnum
WHERE n.nspname = $1 AND c.relkind IN ('r', 'p') AND a.attnum > 0 AND NOT a.attisdropped
ORDER BY c.relname, a.attnum
"#;

const PRIMARY_KEYS_SQL: &str = r#"
SELECT c.relname::text AS table_name,
       a.attname::text AS column_name
FROM pg_index i
JOIN pg_class c ON c.oid = i.indrelid
JOIN pg_namespace n ON n.oid = c.relnamespace
JOIN LATERAL unnest(i.indkey) WITH ORDINALITY AS k(attnum, ord) ON true
JOIN pg_attribute a ON a.attrelid = c.oid AND a.attnum = k.attnum
WHERE n.nspname = $1 AND i.indisprimary
ORDER BY c.relname, k.ord
"#;

/// Load full config for every ordinary or partitioned table in `schema`.
/// Tables without a primary key are skipped (with a warning): they cannot be updated or deleted by key.
pub async fn load_from_pool(pool: &PgPool, schema: &str) -> Result<FullConfig, ConfigError> {
    let tables: Vec<(String, Option<String>)> = fetch(pool, TABLES_SQL, schema).await?;
    let columns: Vec<(String, String, String, bool, Option<String>, Option<String>)> =
        fetch(pool, COLUMNS_SQL, schema).await?;
    let keys: Vec<(String, String)> = fetch(pool, PRIMARY_KEYS_SQL, schema).await?;

    let mut pk_by_table: HashMap<String, Vec<String>> = HashMap::new();
    for (table, column) in keys {
        pk_by_table.entry(table).or_default().push(column);
    }

    let mut config = FullConfig::default();
    for (name, comment) in tables {
        let Some(mut pk) = pk_by_table.remove(&name) else {
            tracing::warn!(schema = %schema, table = %name, "skipping table without primary key");
            continue;
        };
        let primary_key = if pk.len() == 1 {
            PrimaryKeyConfig::Single(pk.remove(0))
        } else {
            PrimaryKeyConfig::Composite(pk)
        };
        config.tables.push(TableConfig {
            id: name.clone(),
            schema: Some(schema.to_string()),
            name,
            entity_name: None,
            comment,
            primary_key,
        });
    }

    let known: std::collections::HashSet<&str> = config.tables.iter().map(|t| t.id.as_str()).collect();
    let columns: Vec<ColumnConfig> = columns
        .into_iter()
        .filter(|(table, ..)| known.contains(table.as_str()))
        .map(|(table_id, name, native_type, nullable, default, comment)| ColumnConfig {
            table_id,
            name,
            type_: ColumnTypeConfig::Simple(native_type),
            nullable,
            default: default.map(|expression| ColumnDefaultConfig::Expression { expression }),
            comment,
        })
        .collect();
    config.columns = columns;

    tracing::debug!(
        schema = %schema,
        tables = config.tables.len(),
        columns = config.columns.len(),
        "reflected catalog"
    );
    Ok(config)
}

async fn fetch<T>(pool: &PgPool, sql: &str, schema: &str) -> Result<Vec<T>, ConfigError>
where
    T: for<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> + Send + Unpin,
{
    tracing::debug!(sql = %sql.trim(), schema = %schema, "query");
    sqlx::query_as::<_, T>(sql)
        .bind(schema)
        .fetch_all(pool)
        .await
        .map_err(|e| ConfigError::Load(e.to_string()))
}

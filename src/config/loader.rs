//! Load config from JSON files and resolve it into entity descriptors.

use crate::case::to_pascal_case;
use crate::config::resolved::{ColumnDefault, ColumnDescriptor, EntityDescriptor};
use crate::config::types::*;
use crate::config::{validate, FullConfig};
use crate::error::ConfigError;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

/// Build entity descriptors from full config (validates first).
/// Entity order follows table order; column order follows config order.
pub fn resolve(config: &FullConfig) -> Result<Vec<EntityDescriptor>, ConfigError> {
    validate(config)?;

    let columns_by_table: HashMap<_, Vec<&ColumnConfig>> = config
        .columns
        .iter()
        .fold(HashMap::new(), |mut m, c| {
            m.entry(c.table_id.as_str()).or_default().push(c);
            m
        });

    let mut entities = Vec::with_capacity(config.tables.len());
    for table in &config.tables {
        let table_columns = columns_by_table
            .get(table.id.as_str())
            .map(|v| v.as_slice())
            .unwrap_or(&[]);
        let pk_names: Vec<String> = table.primary_key.columns().into_iter().map(String::from).collect();

        let columns = table_columns
            .iter()
            .map(|c| {
                let primary_key = pk_names.contains(&c.name);
                ColumnDescriptor {
                    name: c.name.clone(),
                    sql_type: c.type_.native(),
                    nullable: c.nullable && !primary_key,
                    default: c.default.as_ref().map(resolve_default),
                    primary_key,
                    doc: c.comment.clone(),
                }
            })
            .collect();

        entities.push(EntityDescriptor {
            name: table
                .entity_name
                .clone()
                .unwrap_or_else(|| to_pascal_case(&table.name)),
            table_name: table.name.clone(),
            schema: table.schema.clone(),
            doc: table.comment.clone(),
            columns,
            primary_key: pk_names,
        });
    }
    Ok(entities)
}

fn resolve_default(d: &ColumnDefaultConfig) -> ColumnDefault {
    match d {
        ColumnDefaultConfig::Literal(v) => ColumnDefault::Literal(v.clone()),
        ColumnDefaultConfig::Expression { expression } => parse_default_expression(expression),
    }
}

/// Interpret a SQL default clause as reported by the catalog.
/// Quoted strings (`'abc'::text`), numbers and booleans are literals; everything else
/// (`nextval(...)`, `now()`, `CURRENT_TIMESTAMP`) is computed by the database.
pub fn parse_default_expression(expr: &str) -> ColumnDefault {
    let trimmed = expr.trim();
    // strip a trailing cast: '18'::integer, 'x'::character varying
    let body = match trimmed.find("::") {
        Some(idx) if !trimmed[..idx].contains('(') => trimmed[..idx].trim(),
        _ => trimmed,
    };
    let body = body.trim_start_matches('(').trim_end_matches(')').trim();
    if body.len() >= 2 && body.starts_with('\'') && body.ends_with('\'') {
        let inner = body[1..body.len() - 1].replace("''", "'");
        return ColumnDefault::Literal(Value::String(inner));
    }
    if let Ok(n) = body.parse::<i64>() {
        return ColumnDefault::Literal(Value::Number(n.into()));
    }
    if let Ok(f) = body.parse::<f64>() {
        if let Some(n) = serde_json::Number::from_f64(f) {
            return ColumnDefault::Literal(Value::Number(n));
        }
    }
    match body.to_ascii_lowercase().as_str() {
        "true" => ColumnDefault::Literal(Value::Bool(true)),
        "false" => ColumnDefault::Literal(Value::Bool(false)),
        _ => ColumnDefault::Expression(trimmed.to_string()),
    }
}

/// Load full config from a JSON file (`{ "tables": [...], "columns": [...] }`)
/// or from a directory holding `tables.json` and `columns.json`.
pub async fn load_from_path(path: impl AsRef<Path>) -> Result<FullConfig, ConfigError> {
    let path = path.as_ref();
    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    if meta.is_dir() {
        let tables: Vec<TableConfig> = read_json(&path.join("tables.json")).await?;
        let columns: Vec<ColumnConfig> = read_json(&path.join("columns.json")).await?;
        Ok(FullConfig { tables, columns })
    } else {
        read_json(path).await
    }
}

async fn read_json<T>(path: &Path) -> Result<T, ConfigError>
where
    T: for<'de> serde::Deserialize<'de>,
{
    tracing::debug!(path = %path.display(), "loading config");
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    serde_json::from_str(&raw).map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn sample() -> FullConfig {
        serde_json::from_value(json!({
            "tables": [
                { "id": "t_users", "name": "users", "entity_name": "User", "comment": "Registered user", "primary_key": "id" },
                { "id": "t_links", "name": "user_groups", "primary_key": ["user_id", "group_id"] }
            ],
            "columns": [
                { "table_id": "t_users", "name": "id", "type": "serial", "nullable": false, "default": { "expression": "nextval('users_id_seq'::regclass)" } },
                { "table_id": "t_users", "name": "name", "type": { "name": "varchar", "params": [120] }, "nullable": false },
                { "table_id": "t_users", "name": "age", "type": "integer", "default": "18", "comment": "Age in years" },
                { "table_id": "t_links", "name": "user_id", "type": "integer" },
                { "table_id": "t_links", "name": "group_id", "type": "integer" }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn resolves_entities_in_table_order() {
        let entities = resolve(&sample()).unwrap();
        assert_eq!(entities.len(), 2);

        let user = &entities[0];
        assert_eq!(user.name, "User");
        assert_eq!(user.table_name, "users");
        assert_eq!(user.doc.as_deref(), Some("Registered user"));
        assert_eq!(user.primary_key, vec!["id".to_string()]);
        let names: Vec<_> = user.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "name", "age"]);
        assert_eq!(user.column("name").unwrap().sql_type, "varchar(120)");
        assert_eq!(user.column("age").unwrap().literal_default(), Some(&json!("18")));
        assert!(matches!(user.column("id").unwrap().default, Some(ColumnDefault::Expression(_))));

        let links = &entities[1];
        assert_eq!(links.name, "UserGroups");
        assert!(links.is_associative());
        // key columns are never nullable
        assert!(links.columns.iter().all(|c| !c.nullable));
    }

    #[test]
    fn default_expressions() {
        assert_eq!(parse_default_expression("18"), ColumnDefault::Literal(json!(18)));
        assert_eq!(parse_default_expression("'draft'::character varying"), ColumnDefault::Literal(json!("draft")));
        assert_eq!(parse_default_expression("'it''s'::text"), ColumnDefault::Literal(json!("it's")));
        assert_eq!(parse_default_expression("0.5"), ColumnDefault::Literal(json!(0.5)));
        assert_eq!(parse_default_expression("(-1)"), ColumnDefault::Literal(json!(-1)));
        assert_eq!(parse_default_expression("true"), ColumnDefault::Literal(json!(true)));
        assert_eq!(
            parse_default_expression("nextval('users_id_seq'::regclass)"),
            ColumnDefault::Expression("nextval('users_id_seq'::regclass)".into())
        );
        assert_eq!(parse_default_expression("now()"), ColumnDefault::Expression("now()".into()));
    }

    #[tokio::test]
    async fn loads_single_file_and_directory() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = sample();

        let file = dir.path().join("entities.json");
        std::fs::write(&file, serde_json::to_string(&cfg).unwrap()).unwrap();
        let loaded = load_from_path(&file).await.unwrap();
        assert_eq!(loaded.tables.len(), 2);
        assert_eq!(loaded.columns.len(), 5);

        let sub = dir.path().join("split");
        std::fs::create_dir(&sub).unwrap();
        std::fs::write(sub.join("tables.json"), serde_json::to_string(&cfg.tables).unwrap()).unwrap();
        std::fs::write(sub.join("columns.json"), serde_json::to_string(&cfg.columns).unwrap()).unwrap();
        let loaded = load_from_path(&sub).await.unwrap();
        assert_eq!(resolve(&loaded).unwrap().len(), 2);

        assert!(matches!(load_from_path(dir.path().join("missing.json")).await, Err(ConfigError::Load(_))));
    }
}

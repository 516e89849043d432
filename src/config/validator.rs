//! Config validation: referential integrity and identifier safety.
//!
//! Identifiers and native type names end up quoted or spliced (as casts) into SQL,
//! so they are checked here once, before anything is generated.

use crate::config::FullConfig;
use crate::error::ConfigError;
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

fn identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static regex"))
}

fn native_type_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_ .]*(\(\s*\d+(\s*,\s*\d+)*\s*\))?[A-Za-z0-9_ ]*(\[\])?$")
            .expect("static regex")
    })
}

/// Valid GraphQL / SQL identifier (table, column, entity or schema name).
pub fn is_identifier(s: &str) -> bool {
    identifier_re().is_match(s)
}

/// Valid native type spelling, e.g. `varchar(255)`, `timestamp with time zone`, `sample.status`.
pub fn is_native_type(s: &str) -> bool {
    native_type_re().is_match(s.trim())
}

fn check_identifier(kind: &'static str, value: &str) -> Result<(), ConfigError> {
    if is_identifier(value) {
        Ok(())
    } else {
        Err(ConfigError::InvalidIdentifier {
            kind,
            value: value.to_string(),
        })
    }
}

pub fn validate(config: &FullConfig) -> Result<(), ConfigError> {
    let table_ids: HashSet<&str> = config.tables.iter().map(|t| t.id.as_str()).collect();

    let mut table_names = HashSet::new();
    for t in &config.tables {
        check_identifier("table name", &t.name)?;
        if let Some(schema) = &t.schema {
            check_identifier("schema name", schema)?;
        }
        if let Some(entity) = &t.entity_name {
            check_identifier("entity name", entity)?;
        }
        let qualified = format!("{}.{}", t.schema.as_deref().unwrap_or(""), t.name);
        if !table_names.insert(qualified) {
            return Err(ConfigError::DuplicateTable(t.name.clone()));
        }

        let pk_cols = t.primary_key.columns();
        if pk_cols.is_empty() {
            return Err(ConfigError::MissingPrimaryKey(t.name.clone()));
        }
        let table_columns: HashSet<&str> = config
            .columns
            .iter()
            .filter(|c| c.table_id == t.id)
            .map(|c| c.name.as_str())
            .collect();
        for pk in &pk_cols {
            if !table_columns.contains(pk) {
                return Err(ConfigError::InvalidPrimaryKey {
                    table_id: t.id.clone(),
                    column: (*pk).to_string(),
                });
            }
        }
    }

    let mut column_keys = HashSet::new();
    for c in &config.columns {
        if !table_ids.contains(c.table_id.as_str()) {
            return Err(ConfigError::MissingReference {
                kind: "table",
                id: c.table_id.clone(),
            });
        }
        check_identifier("column name", &c.name)?;
        let native = c.type_.native();
        if !is_native_type(&native) {
            return Err(ConfigError::InvalidIdentifier {
                kind: "column type",
                value: native,
            });
        }
        if !column_keys.insert((c.table_id.as_str(), c.name.as_str())) {
            return Err(ConfigError::Validation(format!(
                "duplicate column {} in table {}",
                c.name, c.table_id
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(v: serde_json::Value) -> FullConfig {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn native_type_spellings() {
        for ok in ["integer", "varchar(255)", "numeric(10, 2)", "timestamp with time zone", "sample.order_status", "text[]"] {
            assert!(is_native_type(ok), "{ok}");
        }
        for bad in ["int; drop table x", "text)--", "", "1abc"] {
            assert!(!is_native_type(bad), "{bad}");
        }
    }

    #[test]
    fn primary_key_must_exist() {
        let c = config(json!({
            "tables": [{ "id": "t", "name": "users", "primary_key": "id" }],
            "columns": [{ "table_id": "t", "name": "name", "type": "text" }]
        }));
        assert!(matches!(validate(&c), Err(ConfigError::InvalidPrimaryKey { column, .. }) if column == "id"));
    }

    #[test]
    fn column_must_reference_table() {
        let c = config(json!({
            "tables": [{ "id": "t", "name": "users", "primary_key": "id" }],
            "columns": [
                { "table_id": "t", "name": "id", "type": "integer" },
                { "table_id": "nope", "name": "x", "type": "text" }
            ]
        }));
        assert!(matches!(validate(&c), Err(ConfigError::MissingReference { kind: "table", .. })));
    }

    #[test]
    fn rejects_unsafe_identifiers_and_duplicates() {
        let c = config(json!({
            "tables": [{ "id": "t", "name": "users\"; --", "primary_key": "id" }],
            "columns": [{ "table_id": "t", "name": "id", "type": "integer" }]
        }));
        assert!(matches!(validate(&c), Err(ConfigError::InvalidIdentifier { .. })));

        let c = config(json!({
            "tables": [
                { "id": "a", "name": "users", "primary_key": "id" },
                { "id": "b", "name": "users", "primary_key": "id" }
            ],
            "columns": [
                { "table_id": "a", "name": "id", "type": "integer" },
                { "table_id": "b", "name": "id", "type": "integer" }
            ]
        }));
        assert!(matches!(validate(&c), Err(ConfigError::DuplicateTable(t)) if t == "users"));
    }

    #[test]
    fn empty_composite_key_is_missing_key() {
        let c = config(json!({
            "tables": [{ "id": "t", "name": "links", "primary_key": [] }],
            "columns": [{ "table_id": "t", "name": "a", "type": "integer" }]
        }));
        assert!(matches!(validate(&c), Err(ConfigError::MissingPrimaryKey(_))));
    }
}

//! Resolved entity model: config validated and flattened for schema generation.
//!
//! These descriptors are plain data. Every `EntitySource` produces them and the
//! schema builders consume them without reflecting on anything else.

use serde_json::Value;

/// Column default as seen by the generator.
#[derive(Clone, Debug, PartialEq)]
pub enum ColumnDefault {
    /// Scalar literal, applied when a create request omits the column.
    Literal(Value),
    /// Computed by the database (sequence, `now()`, ...). Counts as "has a default".
    Expression(String),
}

#[derive(Clone, Debug)]
pub struct ColumnDescriptor {
    pub name: String,
    /// Native type as declared, e.g. `varchar(255)` or `timestamp with time zone`.
    pub sql_type: String,
    pub nullable: bool,
    pub default: Option<ColumnDefault>,
    pub primary_key: bool,
    pub doc: Option<String>,
}

impl ColumnDescriptor {
    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    pub fn literal_default(&self) -> Option<&Value> {
        match &self.default {
            Some(ColumnDefault::Literal(v)) => Some(v),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct EntityDescriptor {
    /// Type name, e.g. `User`.
    pub name: String,
    /// Storage table, e.g. `users`.
    pub table_name: String,
    pub schema: Option<String>,
    pub doc: Option<String>,
    pub columns: Vec<ColumnDescriptor>,
    /// Primary key column names, in key order.
    pub primary_key: Vec<String>,
}

impl EntityDescriptor {
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn primary_key_columns(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.primary_key.iter().filter_map(|pk| self.column(pk))
    }

    pub fn is_primary_key(&self, column: &str) -> bool {
        self.primary_key.iter().any(|pk| pk == column)
    }

    /// Many-to-many link table: every column belongs to the primary key.
    pub fn is_associative(&self) -> bool {
        !self.columns.is_empty() && self.columns.iter().all(|c| self.is_primary_key(&c.name))
    }

    /// Lower-cased type name used in mutation field names (`create_user`).
    pub fn lower_name(&self) -> String {
        self.name.to_lowercase()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use serde_json::json;

    pub fn column(name: &str, sql_type: &str) -> ColumnDescriptor {
        ColumnDescriptor {
            name: name.into(),
            sql_type: sql_type.into(),
            nullable: true,
            default: None,
            primary_key: false,
            doc: None,
        }
    }

    pub fn pk(name: &str) -> ColumnDescriptor {
        ColumnDescriptor {
            nullable: false,
            primary_key: true,
            default: Some(ColumnDefault::Expression("nextval('users_id_seq')".into())),
            ..column(name, "integer")
        }
    }

    /// `User { id PK, name NOT NULL, age NULL DEFAULT 18 }`
    pub fn user() -> EntityDescriptor {
        EntityDescriptor {
            name: "User".into(),
            table_name: "users".into(),
            schema: None,
            doc: Some("Registered user".into()),
            columns: vec![
                pk("id"),
                ColumnDescriptor {
                    nullable: false,
                    ..column("name", "varchar(120)")
                },
                ColumnDescriptor {
                    default: Some(ColumnDefault::Literal(json!(18))),
                    ..column("age", "integer")
                },
            ],
            primary_key: vec!["id".into()],
        }
    }

    /// `UserGroup { user_id PK, group_id PK }`
    pub fn user_group() -> EntityDescriptor {
        EntityDescriptor {
            name: "UserGroup".into(),
            table_name: "user_groups".into(),
            schema: None,
            doc: None,
            columns: vec![
                ColumnDescriptor { default: None, ..pk("user_id") },
                ColumnDescriptor { default: None, ..pk("group_id") },
            ],
            primary_key: vec!["user_id".into(), "group_id".into()],
        }
    }
}

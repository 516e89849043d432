#![allow(dead_code)]

use async_graphql::dynamic::Schema;
use graphql_schemagen::config::{ColumnDefault, ColumnDescriptor, EntityDescriptor};
use graphql_schemagen::{Hooks, MemoryStore, RequestContext, SchemaGenerator};
use serde_json::{json, Value};
use std::sync::Arc;

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

pub fn key(name: &str) -> ColumnDescriptor {
    ColumnDescriptor {
        nullable: false,
        primary_key: true,
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
            ColumnDescriptor {
                default: Some(ColumnDefault::Expression("nextval('users_id_seq'::regclass)".into())),
                ..key("id")
            },
            ColumnDescriptor {
                nullable: false,
                ..column("name", "character varying(120)")
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
        columns: vec![key("user_id"), key("group_id")],
        primary_key: vec!["user_id".into(), "group_id".into()],
    }
}

pub fn build_schema(store: &MemoryStore, hooks: Hooks) -> Schema {
    SchemaGenerator::new("test")
        .with_hooks(hooks)
        .generate(&[user(), user_group()], Arc::new(store.clone()))
        .expect("generate")
        .into_schema()
        .expect("schema")
}

pub async fn execute(schema: &Schema, query: &str) -> async_graphql::Response {
    schema.execute(query).await
}

pub async fn execute_with(schema: &Schema, query: &str, ctx: RequestContext) -> async_graphql::Response {
    schema.execute(async_graphql::Request::new(query).data(ctx)).await
}

/// Data of a response that must have succeeded.
pub fn data(resp: async_graphql::Response) -> Value {
    assert!(resp.errors.is_empty(), "unexpected errors: {:?}", resp.errors);
    resp.data.into_json().expect("json data")
}

/// `extensions.code` of the first error.
pub fn error_code(resp: &async_graphql::Response) -> Option<String> {
    let ext = resp.errors.first()?.extensions.as_ref()?;
    match ext.get("code")? {
        async_graphql::Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

pub fn row(v: Value) -> serde_json::Map<String, Value> {
    match v {
        Value::Object(m) => m,
        other => panic!("not an object: {other}"),
    }
}

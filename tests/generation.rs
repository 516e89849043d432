mod common;

use common::*;
use graphql_schemagen::config::ColumnDescriptor;
use graphql_schemagen::schema::ScalarType;
use graphql_schemagen::{Hooks, MemoryStore, SchemaError, SchemaGenerator, StaticEntities};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::Arc;

async fn introspect(query: &str) -> Value {
    let schema = build_schema(&MemoryStore::new(), Hooks::new());
    data(execute(&schema, query).await)
}

#[tokio::test]
async fn create_input_follows_nullability_and_defaults() {
    let out = introspect(
        r#"{ __type(name: "UserCreateInput") { inputFields { name defaultValue type { kind name ofType { name } } } } }"#,
    )
    .await;
    assert_eq!(
        out["__type"]["inputFields"],
        json!([
            { "name": "name", "defaultValue": null, "type": { "kind": "NON_NULL", "name": null, "ofType": { "name": "String" } } },
            { "name": "age", "defaultValue": "18", "type": { "kind": "SCALAR", "name": "Int", "ofType": null } }
        ])
    );
}

#[tokio::test]
async fn update_input_requires_the_key() {
    let out = introspect(r#"{ __type(name: "UserUpdateInput") { inputFields { name type { kind name ofType { name } } } } }"#).await;
    assert_eq!(
        out["__type"]["inputFields"][0],
        json!({ "name": "id", "type": { "kind": "NON_NULL", "name": null, "ofType": { "name": "ID" } } })
    );
    assert_eq!(out["__type"]["inputFields"][1]["type"]["kind"], json!("SCALAR"));
}

#[tokio::test]
async fn mutation_root_has_three_fields_per_owned_entity() {
    let out = introspect(
        r#"{ __type(name: "Mutation_test") { fields { name type { name } args { name type { kind ofType { name } } } } } }"#,
    )
    .await;
    assert_eq!(
        out["__type"]["fields"],
        json!([
            { "name": "create_user", "type": { "name": "CreateUser" },
              "args": [{ "name": "user_data", "type": { "kind": "NON_NULL", "ofType": { "name": "UserCreateInput" } } }] },
            { "name": "update_user", "type": { "name": "UpdateUser" },
              "args": [{ "name": "user_data", "type": { "kind": "NON_NULL", "ofType": { "name": "UserUpdateInput" } } }] },
            { "name": "delete_user", "type": { "name": "DeleteUser" },
              "args": [{ "name": "id", "type": { "kind": "NON_NULL", "ofType": { "name": "Int" } } }] }
        ])
    );
}

#[tokio::test]
async fn query_root_lists_every_entity() {
    let out = introspect(
        r#"{ __type(name: "Query_test") { description fields { name args { name defaultValue } } } }"#,
    )
    .await;
    assert_eq!(out["__type"]["description"], json!("Root Query Class for \"test\""));
    let fields = out["__type"]["fields"].as_array().unwrap();
    let names: Vec<&str> = fields.iter().filter_map(|f| f["name"].as_str()).collect();
    assert_eq!(names, vec!["users", "user_groups"]);
    assert_eq!(
        fields[0]["args"],
        json!([
            { "name": "filters", "defaultValue": null },
            { "name": "order_by", "defaultValue": null },
            { "name": "page", "defaultValue": "1" },
            { "name": "perpage", "defaultValue": "50" }
        ])
    );
}

#[tokio::test]
async fn object_type_documents_its_key() {
    let out = introspect(r#"{ __type(name: "User") { description fields { name type { kind ofType { name } } } } }"#).await;
    assert_eq!(out["__type"]["description"], json!("Registered user\npk: \"id\""));
    assert_eq!(
        out["__type"]["fields"][0],
        json!({ "name": "id", "type": { "kind": "NON_NULL", "ofType": { "name": "ID" } } })
    );
}

#[tokio::test]
async fn shared_vocabulary_types() {
    let out = introspect(
        r#"{
            ops: __type(name: "FilterOperation") { enumValues { name } }
            dirs: __type(name: "OrderByOperation") { enumValues { name } }
            fields: __type(name: "UserFieldEnum") { enumValues { name } }
            intOp: __type(name: "IntFilterOp") { inputFields { name } }
        }"#,
    )
    .await;
    assert_eq!(out["ops"]["enumValues"].as_array().unwrap().len(), 15);
    assert_eq!(out["dirs"]["enumValues"], json!([{ "name": "ASC" }, { "name": "DESC" }]));
    assert_eq!(out["fields"]["enumValues"], json!([{ "name": "id" }, { "name": "name" }, { "name": "age" }]));
    assert_eq!(out["intOp"]["inputFields"], json!([{ "name": "op" }, { "name": "v" }, { "name": "vl" }]));
}

#[tokio::test]
async fn custom_scalars_are_registered_once() {
    let mut invoice = user();
    invoice.name = "Invoice".into();
    invoice.table_name = "invoices".into();
    invoice.columns.push(column("total", "numeric(10,2)"));
    invoice.columns.push(column("body", "citext"));
    let mut payment = user();
    payment.name = "Payment".into();
    payment.table_name = "payments".into();
    payment.columns.push(column("amount", "numeric"));

    let mut generator = SchemaGenerator::new("billing");
    generator.converters_mut().register("citext", ScalarType::String);
    let schema = generator
        .generate_from(
            &StaticEntities(vec![invoice, payment]),
            Arc::new(MemoryStore::new()),
        )
        .await
        .unwrap()
        .into_schema()
        .unwrap();
    let sdl = schema.sdl();
    assert_eq!(sdl.matches("scalar Decimal").count(), 1);
    assert_eq!(sdl.matches("input DecimalFilterOp").count(), 1);
}

#[test]
fn unknown_native_type_aborts_generation() {
    let mut entity = user();
    entity.columns.push(ColumnDescriptor {
        doc: Some("free-text search".into()),
        ..column("search", "tsvector")
    });
    let err = SchemaGenerator::new("api")
        .generate(&[entity], Arc::new(MemoryStore::new()))
        .err()
        .unwrap();
    assert!(matches!(err, SchemaError::UnsupportedColumnType { ref column, .. } if column == "search"));
}

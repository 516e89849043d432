//! Resolver arguments (already validated by GraphQL) into store-level values.

use crate::error::AppError;
use crate::schema::builders::{column_for_enum_item, EntityBinding};
use crate::schema::vocabulary::{FilterClause, FilterOperation, OrderClause, OrderOperation, Pagination};
use crate::schema::vocabulary::{DEFAULT_PAGE, DEFAULT_PERPAGE};
use crate::store::{Row, SelectQuery};
use async_graphql::dynamic::ResolverContext;
use serde_json::{Map, Value};

/// Field arguments as a JSON object.
pub fn args_to_json(ctx: &ResolverContext<'_>) -> Result<Map<String, Value>, AppError> {
    let value = async_graphql::Value::Object(ctx.args.as_index_map().clone())
        .into_json()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Ok(Map::new()),
    }
}

fn unknown_field(binding: &EntityBinding, field: &str) -> AppError {
    AppError::UnknownField {
        entity: binding.entity.name.clone(),
        field: field.to_string(),
    }
}

fn int_arg(args: &Map<String, Value>, name: &str, default: i64) -> Result<i64, AppError> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(default),
        Some(v) => v
            .as_i64()
            .ok_or_else(|| AppError::Validation(format!("{} must be an integer", name))),
    }
}

pub(crate) fn object_arg<'a>(args: &'a Map<String, Value>, name: &str) -> Result<&'a Map<String, Value>, AppError> {
    match args.get(name) {
        Some(Value::Object(map)) => Ok(map),
        _ => Err(AppError::Validation(format!("missing input object {}", name))),
    }
}

/// `filters`, `order_by`, `page`, `perpage` into a select query.
/// Entries of one `QueryParams` object, and all objects of the list, are combined with AND.
pub fn parse_list_args(binding: &EntityBinding, args: &Map<String, Value>) -> Result<SelectQuery, AppError> {
    let mut filters = Vec::new();
    let params = match args.get("filters") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.clone(),
        Some(single @ Value::Object(_)) => vec![single.clone()],
        Some(_) => return Err(AppError::Validation("filters must be a list".into())),
    };
    for param in params {
        let Value::Object(columns) = param else { continue };
        for (field, filter) in columns {
            if binding.entity.column(&field).is_none() {
                return Err(unknown_field(binding, &field));
            }
            let Value::Object(filter) = filter else { continue };
            filters.push(parse_filter(binding, &field, &filter)?);
        }
    }

    let order = match args.get("order_by") {
        None | Some(Value::Null) => None,
        Some(Value::Object(o)) => {
            let item = o.get("f").and_then(Value::as_str).unwrap_or_default();
            let column = column_for_enum_item(&binding.entity, item).ok_or_else(|| unknown_field(binding, item))?;
            let direction: OrderOperation = o.get("o").and_then(Value::as_str).unwrap_or("ASC").parse()?;
            Some(OrderClause {
                field: column.name.clone(),
                direction,
            })
        }
        Some(_) => return Err(AppError::Validation("order_by must be an object".into())),
    };

    let pagination = Pagination::new(
        int_arg(args, "page", DEFAULT_PAGE)?,
        int_arg(args, "perpage", DEFAULT_PERPAGE)?,
    )?;

    Ok(SelectQuery {
        filters,
        order,
        pagination,
    })
}

fn parse_filter(binding: &EntityBinding, field: &str, filter: &Map<String, Value>) -> Result<FilterClause, AppError> {
    let op: FilterOperation = match filter.get("op") {
        Some(Value::String(s)) => s.parse()?,
        Some(other) => return Err(AppError::UnknownFilterOperation(other.to_string())),
        None => return Err(AppError::Validation(format!("filter on {} has no op", field))),
    };
    let coerce = |v: &Value| match binding.filter_scalar(field) {
        Some(s) => s.coerce(v),
        None => v.clone(),
    };
    let v = filter.get("v").map(coerce);
    let vl = match filter.get("vl") {
        Some(Value::Array(items)) => Some(items.iter().map(coerce).collect()),
        _ => None,
    };
    FilterClause::new(field, op, v, vl)
}

/// Create input into a row: unknown names rejected, key columns ignored, literal defaults filled.
pub fn parse_create_input(binding: &EntityBinding, data: &Map<String, Value>) -> Result<Row, AppError> {
    let mut row = Row::new();
    for (field, value) in data {
        let Some(column) = binding.entity.column(field) else {
            return Err(unknown_field(binding, field));
        };
        if column.primary_key {
            continue;
        }
        row.insert(field.clone(), binding.coerce(field, value));
    }
    for column in &binding.entity.columns {
        if column.primary_key || row.contains_key(&column.name) {
            continue;
        }
        if let Some(default) = column.literal_default() {
            row.insert(column.name.clone(), binding.coerce(&column.name, default));
        }
    }
    Ok(row)
}

/// Update input into `(key, changes)`. Every key column must be present; keys never appear in changes.
pub fn parse_update_input(binding: &EntityBinding, data: &Map<String, Value>) -> Result<(Row, Row), AppError> {
    let key = key_from(binding, data)?;
    let mut changes = Row::new();
    for (field, value) in data {
        let Some(column) = binding.entity.column(field) else {
            return Err(unknown_field(binding, field));
        };
        if column.primary_key {
            continue;
        }
        changes.insert(field.clone(), binding.coerce(field, value));
    }
    Ok((key, changes))
}

/// Delete arguments (one per key column) into a key.
pub fn parse_delete_args(binding: &EntityBinding, args: &Map<String, Value>) -> Result<Row, AppError> {
    key_from(binding, args)
}

fn key_from(binding: &EntityBinding, data: &Map<String, Value>) -> Result<Row, AppError> {
    let mut key = Row::new();
    for pk in &binding.entity.primary_key {
        match data.get(pk) {
            Some(v) if !v.is_null() => {
                key.insert(pk.clone(), binding.coerce(pk, v));
            }
            _ => {
                return Err(AppError::Validation(format!(
                    "{} requires key column {}",
                    binding.entity.name, pk
                )))
            }
        }
    }
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::resolved::fixtures;
    use crate::schema::types::{TypeConverters, TypeMask};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn user() -> EntityBinding {
        EntityBinding::new(fixtures::user(), &TypeConverters::default(), &TypeMask::id_to_int()).unwrap()
    }

    fn obj(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => unreachable!(),
        }
    }

    #[test]
    fn list_args_with_filter_order_and_page() {
        let q = parse_list_args(
            &user(),
            &obj(json!({
                "filters": [{ "age": { "op": "GT", "v": 17 }, "name": null }, { "id": { "op": "IN", "vl": ["1", 2] } }],
                "order_by": { "f": "name", "o": "DESC" },
                "page": 2,
                "perpage": 10
            })),
        )
        .unwrap();
        assert_eq!(q.filters.len(), 2);
        assert_eq!(q.filters[0].op, FilterOperation::Gt);
        assert_eq!(q.filters[0].v, Some(json!(17)));
        assert_eq!(q.filters[1].vl, Some(vec![json!(1), json!(2)]));
        assert_eq!(
            q.order,
            Some(OrderClause {
                field: "name".into(),
                direction: OrderOperation::Desc
            })
        );
        assert_eq!((q.pagination.limit(), q.pagination.offset()), (10, 10));
    }

    #[test]
    fn defaults_when_absent() {
        let q = parse_list_args(&user(), &Map::new()).unwrap();
        assert!(q.filters.is_empty());
        assert!(q.order.is_none());
        assert_eq!(q.pagination, Pagination::default());
    }

    #[test]
    fn unknown_names_are_rejected() {
        let err = parse_list_args(&user(), &obj(json!({ "filters": [{ "email": { "op": "EQ", "v": "x" } }] }))).unwrap_err();
        assert!(matches!(err, AppError::UnknownField { field, .. } if field == "email"));
        let err = parse_list_args(&user(), &obj(json!({ "order_by": { "f": "email", "o": "ASC" } }))).unwrap_err();
        assert!(matches!(err, AppError::UnknownField { .. }));
        let err = parse_list_args(&user(), &obj(json!({ "filters": [{ "age": { "op": "ABOUT", "v": 1 } }] }))).unwrap_err();
        assert!(matches!(err, AppError::UnknownFilterOperation(op) if op == "ABOUT"));
    }

    #[test]
    fn create_input_fills_defaults_and_drops_key() {
        let row = parse_create_input(&user(), &obj(json!({ "id": 99, "name": "Ann" }))).unwrap();
        assert_eq!(Value::Object(row), json!({ "name": "Ann", "age": 18 }));
        let row = parse_create_input(&user(), &obj(json!({ "name": "Bo", "age": null }))).unwrap();
        assert_eq!(row.get("age"), Some(&Value::Null));
        assert!(parse_create_input(&user(), &obj(json!({ "nick": "x" }))).is_err());
    }

    #[test]
    fn update_input_splits_key_from_changes() {
        let (key, changes) = parse_update_input(&user(), &obj(json!({ "id": "5", "age": 19 }))).unwrap();
        assert_eq!(Value::Object(key), json!({ "id": 5 }));
        assert_eq!(Value::Object(changes), json!({ "age": 19 }));
        assert!(matches!(parse_update_input(&user(), &obj(json!({ "age": 19 }))), Err(AppError::Validation(_))));
    }
}

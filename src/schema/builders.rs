//! Per-entity schema fragments: object type, filter/order inputs, create/update inputs,
//! delete arguments and mutation payloads.
//!
//! Every builder registers what it produces in the run's [`TypeRegistry`] and returns the
//! type name, so shared types (filter-op inputs, field enums, custom scalars) are defined once.

use crate::case::to_camel_case;
use crate::config::{ColumnDescriptor, EntityDescriptor};
use crate::error::SchemaError;
use crate::schema::registry::TypeRegistry;
use crate::schema::types::{ScalarType, TypeConverters, TypeMask};
use crate::schema::vocabulary::{FILTER_OPERATION_TYPE, ORDER_OPERATION_TYPE};
use async_graphql::dynamic::{
    Enum, Field, FieldFuture, FieldValue, InputObject, InputValue, Object, ResolverContext, TypeRef,
};
use async_graphql::Value as GqlValue;
use serde_json::Value;
use std::collections::HashMap;

const SHARED_OWNER: &str = "shared";

/// An entity together with the scalar of each column, resolved once per generation run.
/// Resolvers hold an `Arc` of this as their immutable snapshot.
#[derive(Clone, Debug)]
pub struct EntityBinding {
    pub entity: EntityDescriptor,
    scalars: HashMap<String, ScalarType>,
    filter_scalars: HashMap<String, ScalarType>,
}

impl EntityBinding {
    /// Map every column up front; an unmapped native type fails here, at generation time.
    pub fn new(entity: EntityDescriptor, converters: &TypeConverters, filter_mask: &TypeMask) -> Result<Self, SchemaError> {
        let mut scalars = HashMap::with_capacity(entity.columns.len());
        let mut filter_scalars = HashMap::with_capacity(entity.columns.len());
        for column in &entity.columns {
            let scalar = converters.map_column_type(&entity, column, None)?;
            filter_scalars.insert(column.name.clone(), filter_mask.apply(scalar.clone()));
            scalars.insert(column.name.clone(), scalar);
        }
        Ok(Self {
            entity,
            scalars,
            filter_scalars,
        })
    }

    pub fn scalar(&self, column: &str) -> Option<&ScalarType> {
        self.scalars.get(column)
    }

    /// Scalar used for filter operands and key arguments (after the filter mask).
    pub fn filter_scalar(&self, column: &str) -> Option<&ScalarType> {
        self.filter_scalars.get(column)
    }

    pub fn coerce(&self, column: &str, value: &Value) -> Value {
        match self.scalar(column) {
            Some(s) => s.coerce(value),
            None => value.clone(),
        }
    }

    /// Registry owner for the entity's own types: schema-qualified table name.
    pub fn owner(&self) -> String {
        format!(
            "{}.{}",
            self.entity.schema.as_deref().unwrap_or("public"),
            self.entity.table_name
        )
    }

    fn columns(&self) -> impl Iterator<Item = (&ColumnDescriptor, &ScalarType)> {
        self.entity
            .columns
            .iter()
            .filter_map(|c| self.scalars.get(&c.name).map(|s| (c, s)))
    }
}

pub fn create_input_name(entity: &EntityDescriptor) -> String {
    format!("{}CreateInput", entity.name)
}

pub fn update_input_name(entity: &EntityDescriptor) -> String {
    format!("{}UpdateInput", entity.name)
}

pub fn query_params_name(entity: &EntityDescriptor) -> String {
    format!("{}QueryParams", entity.name)
}

pub fn order_params_name(entity: &EntityDescriptor) -> String {
    format!("{}OrderByParams", entity.name)
}

pub fn field_enum_name(entity: &EntityDescriptor) -> String {
    format!("{}FieldEnum", entity.name)
}

/// Enum item naming a column in `{Entity}FieldEnum`.
pub fn field_enum_item(column: &str) -> String {
    to_camel_case(column)
}

/// Column named by a field-enum item.
pub fn column_for_enum_item<'a>(entity: &'a EntityDescriptor, item: &str) -> Option<&'a ColumnDescriptor> {
    entity
        .columns
        .iter()
        .find(|c| field_enum_item(&c.name) == item || c.name == item)
}

/// Entity doc followed by its key, e.g. `Registered user\npk: "id"`.
pub fn object_description(entity: &EntityDescriptor) -> String {
    let pk = entity
        .primary_key
        .iter()
        .map(|c| format!("\"{}\"", c))
        .collect::<Vec<_>>()
        .join(", ");
    match entity.doc.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
        Some(doc) => format!("{}\npk: {}", doc, pk),
        None => format!("pk: {}", pk),
    }
}

fn parent_field(ctx: &ResolverContext<'_>, name: &str) -> Option<GqlValue> {
    match ctx.parent_value.as_value() {
        Some(GqlValue::Object(map)) => map.get(name).filter(|v| !matches!(v, GqlValue::Null)).cloned(),
        _ => None,
    }
}

/// Field read straight from the parent JSON object.
fn parent_value_field(name: &str, ty: TypeRef, scalar: Option<ScalarType>) -> Field {
    let key = name.to_string();
    Field::new(name, ty, move |ctx| {
        let key = key.clone();
        let scalar = scalar.clone();
        FieldFuture::new(async move {
            Ok(parent_field(&ctx, &key).map(|v| {
                let v = match &scalar {
                    Some(s) => s.present(v),
                    None => v,
                };
                FieldValue::value(v)
            }))
        })
    })
}

/// Register custom scalars used by the entity's columns.
pub fn register_scalars(binding: &EntityBinding, registry: &mut TypeRegistry) -> Result<(), SchemaError> {
    let mut seen: Vec<&ScalarType> = binding.scalars.values().chain(binding.filter_scalars.values()).collect();
    seen.sort_by(|a, b| a.type_name().cmp(b.type_name()));
    seen.dedup();
    for scalar in seen {
        if let Some(def) = scalar.definition() {
            registry.register(scalar.type_name(), "scalar", || def)?;
        }
    }
    Ok(())
}

/// Register the shared `FilterOperation` and `OrderByOperation` enums.
pub fn register_vocabulary(registry: &mut TypeRegistry) -> Result<(), SchemaError> {
    registry.register(FILTER_OPERATION_TYPE, SHARED_OWNER, crate::schema::FilterOperation::enum_type)?;
    registry.register(ORDER_OPERATION_TYPE, SHARED_OWNER, crate::schema::OrderOperation::enum_type)?;
    Ok(())
}

pub fn build_object_type(binding: &EntityBinding, registry: &mut TypeRegistry) -> Result<String, SchemaError> {
    let name = binding.entity.name.clone();
    registry.register(&name, &binding.owner(), || {
        binding.columns().fold(
            Object::new(&name).description(object_description(&binding.entity)),
            |obj, (column, scalar)| {
                let ty = if column.nullable {
                    TypeRef::named(scalar.type_name())
                } else {
                    TypeRef::named_nn(scalar.type_name())
                };
                let mut field = parent_value_field(&column.name, ty, Some(scalar.clone()));
                if let Some(doc) = &column.doc {
                    field = field.description(doc);
                }
                obj.field(field)
            },
        )
    })?;
    Ok(name)
}

/// `{Type}FilterOp { op: FilterOperation!, v: Type, vl: [Type] }`, shared by every column of that type.
pub fn filter_op_type(scalar: &ScalarType, registry: &mut TypeRegistry) -> Result<String, SchemaError> {
    let type_name = scalar.type_name();
    let name = format!("{}FilterOp", type_name);
    registry.register(&name, SHARED_OWNER, || {
        InputObject::new(&name)
            .field(InputValue::new("op", TypeRef::named_nn(FILTER_OPERATION_TYPE)))
            .field(InputValue::new("v", TypeRef::named(type_name)))
            .field(InputValue::new("vl", TypeRef::named_list(type_name)))
    })?;
    Ok(name)
}

/// `{Entity}QueryParams`: one optional filter-op field per column.
pub fn build_read_filter_input(binding: &EntityBinding, registry: &mut TypeRegistry) -> Result<String, SchemaError> {
    let mut fields = Vec::with_capacity(binding.entity.columns.len());
    for column in &binding.entity.columns {
        if let Some(scalar) = binding.filter_scalar(&column.name) {
            fields.push((column.name.clone(), filter_op_type(scalar, registry)?));
        }
    }
    let name = query_params_name(&binding.entity);
    registry.register(&name, &binding.owner(), || {
        fields.iter().fold(InputObject::new(&name), |input, (column, op_type)| {
            input.field(InputValue::new(column, TypeRef::named(op_type)))
        })
    })?;
    Ok(name)
}

/// `{Entity}FieldEnum`: the entity's column names (camelCase items).
pub fn build_field_enum(binding: &EntityBinding, registry: &mut TypeRegistry) -> Result<String, SchemaError> {
    let name = field_enum_name(&binding.entity);
    registry.register(&name, &binding.owner(), || {
        binding
            .entity
            .columns
            .iter()
            .fold(Enum::new(&name), |e, c| e.item(field_enum_item(&c.name)))
    })?;
    Ok(name)
}

/// `{Entity}OrderByParams { f: {Entity}FieldEnum!, o: OrderByOperation! }`.
pub fn build_order_input(binding: &EntityBinding, registry: &mut TypeRegistry) -> Result<String, SchemaError> {
    let field_enum = build_field_enum(binding, registry)?;
    let name = order_params_name(&binding.entity);
    registry.register(&name, &binding.owner(), || {
        InputObject::new(&name)
            .field(InputValue::new("f", TypeRef::named_nn(&field_enum)))
            .field(InputValue::new("o", TypeRef::named_nn(ORDER_OPERATION_TYPE)))
    })?;
    Ok(name)
}

#[derive(Clone, Debug, PartialEq)]
pub struct CreateFieldRule {
    pub required: bool,
    /// Literal default, already coerced to the column's scalar.
    pub default: Option<Value>,
}

/// Required iff NOT NULL without any default. A literal default is attached to the input field.
pub fn create_field_rule(binding: &EntityBinding, column: &ColumnDescriptor) -> CreateFieldRule {
    CreateFieldRule {
        required: !column.nullable && !column.has_default(),
        default: column
            .literal_default()
            .map(|v| binding.coerce(&column.name, v)),
    }
}

/// `{Entity}CreateInput`: every non-key column.
pub fn build_create_input(binding: &EntityBinding, registry: &mut TypeRegistry) -> Result<String, SchemaError> {
    let name = create_input_name(&binding.entity);
    registry.register(&name, &binding.owner(), || {
        binding
            .columns()
            .filter(|(c, _)| !c.primary_key)
            .fold(InputObject::new(&name), |input, (column, scalar)| {
                let rule = create_field_rule(binding, column);
                let ty = if rule.required {
                    TypeRef::named_nn(scalar.type_name())
                } else {
                    TypeRef::named(scalar.type_name())
                };
                let mut field = InputValue::new(&column.name, ty);
                if let Some(default) = rule.default.and_then(|d| GqlValue::from_json(d).ok()) {
                    field = field.default_value(default);
                }
                if let Some(doc) = &column.doc {
                    field = field.description(doc);
                }
                input.field(field)
            })
    })?;
    Ok(name)
}

/// `{Entity}UpdateInput`: key columns required (row locator), all others optional.
pub fn build_update_input(binding: &EntityBinding, registry: &mut TypeRegistry) -> Result<String, SchemaError> {
    let name = update_input_name(&binding.entity);
    registry.register(&name, &binding.owner(), || {
        binding
            .columns()
            .fold(InputObject::new(&name), |input, (column, scalar)| {
                let ty = if column.primary_key {
                    TypeRef::named_nn(scalar.type_name())
                } else {
                    TypeRef::named(scalar.type_name())
                };
                input.field(InputValue::new(&column.name, ty))
            })
    })?;
    Ok(name)
}

/// One required argument per key column, typed through the filter mask (`ID` keys become `Int!`).
pub fn build_delete_arguments(binding: &EntityBinding) -> Vec<InputValue> {
    binding
        .entity
        .primary_key
        .iter()
        .filter_map(|pk| {
            binding
                .filter_scalar(pk)
                .map(|s| InputValue::new(pk, TypeRef::named_nn(s.type_name())))
        })
        .collect()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PayloadTypes {
    pub create: String,
    pub update: String,
    pub delete: String,
}

pub const DELETED_COUNT: &str = "deleted_count";

/// `Create{E} { e: E }`, `Update{E} { e: E }`, `Delete{E} { deleted_count: Int }`.
pub fn build_payload_types(binding: &EntityBinding, registry: &mut TypeRegistry) -> Result<PayloadTypes, SchemaError> {
    let entity = &binding.entity;
    let key = entity.lower_name();
    let owner = binding.owner();
    let names = PayloadTypes {
        create: format!("Create{}", entity.name),
        update: format!("Update{}", entity.name),
        delete: format!("Delete{}", entity.name),
    };
    for payload in [&names.create, &names.update] {
        registry.register(payload, &owner, || {
            Object::new(payload).field(parent_value_field(&key, TypeRef::named(&entity.name), None))
        })?;
    }
    registry.register(&names.delete, &owner, || {
        Object::new(&names.delete).field(parent_value_field(DELETED_COUNT, TypeRef::named(TypeRef::INT), None))
    })?;
    Ok(names)
}

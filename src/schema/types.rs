//! Native column type -> GraphQL scalar mapping.

use crate::config::{ColumnDescriptor, EntityDescriptor};
use crate::error::SchemaError;
use async_graphql::dynamic::{Scalar, TypeRef};
use async_graphql::Value as GqlValue;
use serde_json::Value;
use std::collections::HashMap;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ScalarType {
    Id,
    Int,
    Float,
    String,
    Boolean,
    Decimal,
    Date,
    DateTime,
    Time,
    Uuid,
    Json,
    /// Caller-defined scalar, registered by name.
    Custom(String),
}

impl ScalarType {
    pub fn type_name(&self) -> &str {
        match self {
            ScalarType::Id => TypeRef::ID,
            ScalarType::Int => TypeRef::INT,
            ScalarType::Float => TypeRef::FLOAT,
            ScalarType::String => TypeRef::STRING,
            ScalarType::Boolean => TypeRef::BOOLEAN,
            ScalarType::Decimal => "Decimal",
            ScalarType::Date => "Date",
            ScalarType::DateTime => "DateTime",
            ScalarType::Time => "Time",
            ScalarType::Uuid => "UUID",
            ScalarType::Json => "JSON",
            ScalarType::Custom(name) => name,
        }
    }

    /// Scalar definition to register in the schema; `None` for built-ins.
    pub fn definition(&self) -> Option<Scalar> {
        let description = match self {
            ScalarType::Decimal => "Arbitrary precision number, serialized as a string",
            ScalarType::Date => "Calendar date, `YYYY-MM-DD`",
            ScalarType::DateTime => "Timestamp in RFC 3339 format",
            ScalarType::Time => "Time of day, `HH:MM:SS[.ffffff]`",
            ScalarType::Uuid => "UUID in hyphenated form",
            ScalarType::Json => "Arbitrary JSON value",
            ScalarType::Custom(_) => return Some(Scalar::new(self.type_name())),
            _ => return None,
        };
        Some(Scalar::new(self.type_name()).description(description))
    }

    /// Best-effort conversion of a JSON input to this scalar's canonical form.
    /// Values that do not convert are returned unchanged and left to the store to reject.
    pub fn coerce(&self, value: &Value) -> Value {
        match (self, value) {
            (ScalarType::Id | ScalarType::Int, Value::String(s)) => s
                .trim()
                .parse::<i64>()
                .map(|n| Value::Number(n.into()))
                .unwrap_or_else(|_| value.clone()),
            (ScalarType::Float, Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .unwrap_or_else(|| value.clone()),
            (ScalarType::Boolean, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "t" => Value::Bool(true),
                "false" | "f" => Value::Bool(false),
                _ => value.clone(),
            },
            (ScalarType::Decimal, Value::Number(n)) => Value::String(n.to_string()),
            _ => value.clone(),
        }
    }

    /// Output form of a stored value: `ID` is always rendered as a string.
    pub fn present(&self, value: GqlValue) -> GqlValue {
        match (self, value) {
            (ScalarType::Id, GqlValue::Number(n)) => GqlValue::String(n.to_string()),
            (_, v) => v,
        }
    }
}

/// Scalar substitution applied after mapping (e.g. `ID -> Int` in filter operands).
#[derive(Clone, Debug, Default)]
pub struct TypeMask(HashMap<ScalarType, ScalarType>);

impl TypeMask {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, from: ScalarType, to: ScalarType) -> Self {
        self.0.insert(from, to);
        self
    }

    /// Identifiers are compared as plain integers.
    pub fn id_to_int() -> Self {
        Self::new().with(ScalarType::Id, ScalarType::Int)
    }

    pub fn apply(&self, scalar: ScalarType) -> ScalarType {
        self.0.get(&scalar).cloned().unwrap_or(scalar)
    }
}

/// Lower-case, drop type parameters, collapse whitespace:
/// `character varying(120)` -> `character varying`, `timestamp(3) with time zone` -> `timestamp with time zone`.
pub fn normalize_native_type(native: &str) -> String {
    let mut out = String::with_capacity(native.len());
    let mut depth = 0usize;
    for c in native.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ if depth > 0 => {}
            c => out.extend(c.to_lowercase()),
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ").replace(" []", "[]")
}

const INTEGER_TYPES: &[&str] = &[
    "smallint", "integer", "int", "int2", "int4", "int8", "bigint", "smallserial", "serial", "bigserial", "serial2",
    "serial4", "serial8",
];

pub fn is_integer_type(native: &str) -> bool {
    INTEGER_TYPES.contains(&normalize_native_type(native).as_str())
}

/// Conversion table from normalized native type to scalar. Arrays (`text[]`) map to `JSON`.
#[derive(Clone, Debug)]
pub struct TypeConverters {
    by_native: HashMap<String, ScalarType>,
}

impl Default for TypeConverters {
    fn default() -> Self {
        let mut c = TypeConverters {
            by_native: HashMap::new(),
        };
        for t in INTEGER_TYPES {
            c.register(t, ScalarType::Int);
        }
        for t in ["real", "float", "float4", "float8", "double precision"] {
            c.register(t, ScalarType::Float);
        }
        for t in ["numeric", "decimal"] {
            c.register(t, ScalarType::Decimal);
        }
        for t in ["boolean", "bool"] {
            c.register(t, ScalarType::Boolean);
        }
        for t in ["text", "varchar", "character varying", "char", "character", "bpchar", "citext", "name"] {
            c.register(t, ScalarType::String);
        }
        c.register("date", ScalarType::Date);
        for t in ["time", "time without time zone", "time with time zone", "timetz"] {
            c.register(t, ScalarType::Time);
        }
        for t in ["timestamp", "timestamp without time zone", "timestamp with time zone", "timestamptz"] {
            c.register(t, ScalarType::DateTime);
        }
        c.register("uuid", ScalarType::Uuid);
        for t in ["json", "jsonb"] {
            c.register(t, ScalarType::Json);
        }
        c
    }
}

impl TypeConverters {
    /// Add or override the scalar for a native type.
    pub fn register(&mut self, native: &str, scalar: ScalarType) -> &mut Self {
        self.by_native.insert(normalize_native_type(native), scalar);
        self
    }

    pub fn lookup(&self, native: &str) -> Option<ScalarType> {
        let key = normalize_native_type(native);
        if let Some(s) = self.by_native.get(&key) {
            return Some(s.clone());
        }
        key.ends_with("[]").then_some(ScalarType::Json)
    }

    /// Scalar for a column. Integer primary keys become `ID`; the mask, if any, is applied last.
    pub fn map_column_type(
        &self,
        entity: &EntityDescriptor,
        column: &ColumnDescriptor,
        mask: Option<&TypeMask>,
    ) -> Result<ScalarType, SchemaError> {
        let mut scalar = self
            .lookup(&column.sql_type)
            .ok_or_else(|| SchemaError::UnsupportedColumnType {
                entity: entity.name.clone(),
                column: column.name.clone(),
                native_type: column.sql_type.clone(),
            })?;
        if column.primary_key && scalar == ScalarType::Int {
            scalar = ScalarType::Id;
        }
        Ok(match mask {
            Some(m) => m.apply(scalar),
            None => scalar,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::resolved::fixtures;
    use serde_json::json;

    #[test]
    fn normalizes_native_names() {
        assert_eq!(normalize_native_type("character varying(120)"), "character varying");
        assert_eq!(normalize_native_type("timestamp(3)  WITH time zone"), "timestamp with time zone");
        assert_eq!(normalize_native_type("numeric(10, 2)"), "numeric");
        assert_eq!(normalize_native_type("integer []"), "integer[]");
    }

    #[test]
    fn maps_columns_with_id_mask() {
        let conv = TypeConverters::default();
        let user = fixtures::user();
        let id = user.column("id").unwrap();
        assert_eq!(conv.map_column_type(&user, id, None).unwrap(), ScalarType::Id);
        assert_eq!(conv.map_column_type(&user, id, Some(&TypeMask::id_to_int())).unwrap(), ScalarType::Int);
        let name = user.column("name").unwrap();
        assert_eq!(conv.map_column_type(&user, name, Some(&TypeMask::id_to_int())).unwrap(), ScalarType::String);
    }

    #[test]
    fn unknown_native_type_fails() {
        let conv = TypeConverters::default();
        let mut user = fixtures::user();
        user.columns.push(fixtures::column("shape", "polygon"));
        let err = conv.map_column_type(&user, user.column("shape").unwrap(), None).unwrap_err();
        assert!(matches!(err, SchemaError::UnsupportedColumnType { native_type, .. } if native_type == "polygon"));
    }

    #[test]
    fn registered_conversion_overrides_default() {
        let mut conv = TypeConverters::default();
        conv.register("polygon", ScalarType::Custom("Polygon".into()))
            .register("numeric", ScalarType::Float);
        assert_eq!(conv.lookup("POLYGON"), Some(ScalarType::Custom("Polygon".into())));
        assert_eq!(conv.lookup("numeric(12,4)"), Some(ScalarType::Float));
        assert_eq!(conv.lookup("text[]"), Some(ScalarType::Json));
    }

    #[test]
    fn coerces_and_presents() {
        assert_eq!(ScalarType::Int.coerce(&json!("18")), json!(18));
        assert_eq!(ScalarType::Id.coerce(&json!(" 7")), json!(7));
        assert_eq!(ScalarType::Int.coerce(&json!("abc")), json!("abc"));
        assert_eq!(ScalarType::Boolean.coerce(&json!("TRUE")), json!(true));
        assert_eq!(ScalarType::Float.coerce(&json!("0.5")), json!(0.5));
        assert_eq!(ScalarType::Decimal.coerce(&json!(12)), json!("12"));
        assert_eq!(ScalarType::Id.present(GqlValue::from(3)), GqlValue::from("3"));
        assert_eq!(ScalarType::Int.present(GqlValue::from(3)), GqlValue::from(3));
        assert_eq!(ScalarType::Id.present(GqlValue::from("a1")), GqlValue::from("a1"));
        assert!(is_integer_type("BIGSERIAL"));
        assert!(!is_integer_type("numeric"));
    }
}

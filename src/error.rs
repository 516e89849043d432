//! Typed errors and GraphQL error mapping.

use async_graphql::ErrorExtensions;
use thiserror::Error;

/// Problems with the entity metadata itself (raw config or reflected catalog).
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing reference: {kind} id '{id}'")]
    MissingReference { kind: &'static str, id: String },
    #[error("invalid primary key: table {table_id} column {column}")]
    InvalidPrimaryKey { table_id: String, column: String },
    #[error("table {0} has no primary key")]
    MissingPrimaryKey(String),
    #[error("duplicate table: {0}")]
    DuplicateTable(String),
    #[error("invalid {kind}: '{value}'")]
    InvalidIdentifier { kind: &'static str, value: String },
    #[error("config load: {0}")]
    Load(String),
    #[error("validation: {0}")]
    Validation(String),
}

/// Generation-time failures. Any of these aborts schema construction.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("unsupported column type '{native_type}' for {entity}.{column}")]
    UnsupportedColumnType {
        entity: String,
        column: String,
        native_type: String,
    },
    #[error("type '{name}' already registered by {existing}, cannot register it again for {attempted}")]
    DuplicateType {
        name: String,
        existing: String,
        attempted: String,
    },
    #[error("duplicate field '{name}' on {root}")]
    DuplicateField { root: String, name: String },
    #[error("no entities to generate a schema from")]
    Empty,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("schema build: {0}")]
    Build(String),
}

/// Request-time failures raised by generated resolvers.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("unknown filter operation: {0}")]
    UnknownFilterOperation(String),
    #[error("unknown field '{field}' on {entity}")]
    UnknownField { entity: String, field: String },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("aborted by hook: {0}")]
    HookAborted(String),
    #[error("validation: {0}")]
    Validation(String),
    #[error("data access: {0}")]
    DataAccess(String),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
}

impl AppError {
    /// Stable machine-readable code, exposed as `extensions.code`.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::UnknownFilterOperation(_) => "UNKNOWN_FILTER_OPERATION",
            AppError::UnknownField { .. } => "UNKNOWN_FIELD",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::HookAborted(_) => "HOOK_ABORTED",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::DataAccess(_) => "DATA_ACCESS_ERROR",
            AppError::Db(e) => {
                if let sqlx::Error::RowNotFound = e {
                    "NOT_FOUND"
                } else {
                    "DATA_ACCESS_ERROR"
                }
            }
        }
    }
}

impl ErrorExtensions for AppError {
    fn extend(&self) -> async_graphql::Error {
        let code = self.code();
        async_graphql::Error::new(self.to_string()).extend_with(|_, e| e.set("code", code))
    }
}

//! Process settings from the environment (and `.env` via dotenvy).

use crate::error::ConfigError;
use std::path::PathBuf;

pub const DEFAULT_DATABASE_URL: &str = "postgres://localhost/schemagen";
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    pub database_url: String,
    /// Suffix of the root type names (`Query_{api_name}`, `Mutation_{api_name}`).
    pub api_name: String,
    /// PostgreSQL schema reflected when no config path is set.
    pub db_schema: String,
    /// JSON entity config; when unset the database catalog is reflected instead.
    pub config_path: Option<PathBuf>,
    /// Entity names left out of the generated schema.
    pub ignore: Vec<String>,
    pub bind: String,
    pub max_body_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.into(),
            api_name: "api".into(),
            db_schema: "public".into(),
            config_path: None,
            ignore: Vec::new(),
            bind: "0.0.0.0:3000".into(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl Settings {
    /// Load `.env` (if present) and read settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`; unset or blank values keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut s = Settings::default();
        if let Some(v) = get("DATABASE_URL") {
            s.database_url = v;
        }
        if let Some(v) = get("SCHEMAGEN_API_NAME") {
            if !crate::config::is_identifier(&v) {
                return Err(ConfigError::InvalidIdentifier {
                    kind: "api name",
                    value: v,
                });
            }
            s.api_name = v;
        }
        if let Some(v) = get("SCHEMAGEN_DB_SCHEMA") {
            s.db_schema = v;
        }
        s.config_path = get("SCHEMAGEN_CONFIG_PATH").map(PathBuf::from);
        if let Some(v) = get("SCHEMAGEN_IGNORE") {
            s.ignore = v
                .split(',')
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(v) = get("SCHEMAGEN_BIND") {
            s.bind = v;
        }
        if let Some(v) = get("SCHEMAGEN_MAX_BODY_BYTES") {
            s.max_body_bytes = v
                .parse()
                .map_err(|_| ConfigError::Validation(format!("SCHEMAGEN_MAX_BODY_BYTES: not a byte count: {}", v)))?;
        }
        Ok(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        assert_eq!(Settings::from_lookup(lookup(&[])).unwrap(), Settings::default());
    }

    #[test]
    fn reads_overrides() {
        let s = Settings::from_lookup(lookup(&[
            ("SCHEMAGEN_API_NAME", "shop"),
            ("SCHEMAGEN_IGNORE", "AuditLog, ,Session"),
            ("SCHEMAGEN_CONFIG_PATH", "entities.json"),
            ("SCHEMAGEN_MAX_BODY_BYTES", "2048"),
            ("SCHEMAGEN_BIND", "  "),
        ]))
        .unwrap();
        assert_eq!(s.api_name, "shop");
        assert_eq!(s.ignore, vec!["AuditLog".to_string(), "Session".to_string()]);
        assert_eq!(s.config_path, Some(PathBuf::from("entities.json")));
        assert_eq!(s.max_body_bytes, 2048);
        assert_eq!(s.bind, "0.0.0.0:3000");
    }

    #[test]
    fn rejects_bad_values() {
        assert!(Settings::from_lookup(lookup(&[("SCHEMAGEN_API_NAME", "my-api")])).is_err());
        assert!(Settings::from_lookup(lookup(&[("SCHEMAGEN_MAX_BODY_BYTES", "lots")])).is_err());
    }
}

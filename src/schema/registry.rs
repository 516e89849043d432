//! Generated type registry: one definition per type name, per generation run.

use crate::error::SchemaError;
use async_graphql::dynamic::Type;
use std::collections::HashMap;

/// Each type is registered under an owner key (entity key, scalar, shared vocabulary ...).
/// Re-registering a name with the same owner returns the existing entry; a different owner
/// is a conflict and fails generation.
#[derive(Default)]
pub struct TypeRegistry {
    owners: HashMap<String, String>,
    types: Vec<(String, Type)>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name` unless already present. `build` runs only for new names.
    /// Returns whether the type was added.
    pub fn register<F, T>(&mut self, name: &str, owner: &str, build: F) -> Result<bool, SchemaError>
    where
        F: FnOnce() -> T,
        T: Into<Type>,
    {
        if let Some(existing) = self.owners.get(name) {
            if existing == owner {
                return Ok(false);
            }
            return Err(SchemaError::DuplicateType {
                name: name.to_string(),
                existing: existing.clone(),
                attempted: owner.to_string(),
            });
        }
        self.owners.insert(name.to_string(), owner.to_string());
        self.types.push((name.to_string(), build().into()));
        Ok(true)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.owners.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.types.iter().map(|(n, _)| n.as_str())
    }

    /// Types in registration order.
    pub fn into_types(self) -> Vec<Type> {
        self.types.into_iter().map(|(_, t)| t).collect()
    }
}

//! Walks the entity set and assembles the query and mutation roots.

use crate::config::{EntityDescriptor, EntitySource};
use crate::error::SchemaError;
use crate::schema::builders::{
    build_create_input, build_delete_arguments, build_object_type, build_order_input, build_payload_types,
    build_read_filter_input, build_update_input, register_scalars, register_vocabulary, EntityBinding,
};
use crate::schema::hooks::{HookOperation, Hooks};
use crate::schema::registry::TypeRegistry;
use crate::schema::resolvers::{
    make_create_resolver, make_delete_resolver, make_list_resolver, make_update_resolver, ResolverEnv,
};
use crate::schema::types::{TypeConverters, TypeMask};
use crate::schema::vocabulary::{DEFAULT_PAGE, DEFAULT_PERPAGE};
use crate::store::SessionFactory;
use async_graphql::dynamic::{Field, InputValue, Object, Schema, Type, TypeRef};
use std::sync::Arc;
use tracing::{debug, trace};

#[derive(Clone, Debug)]
pub struct SchemaGenerator {
    api_name: String,
    converters: TypeConverters,
    filter_mask: TypeMask,
    hooks: Hooks,
    ignore: Vec<String>,
}

/// Generated roots plus every named type they reference. Callers may add their own
/// fields to `query`/`mutation` or types to `types` before building the schema.
pub struct GeneratedSchema {
    pub query: Object,
    pub mutation: Option<Object>,
    pub types: Vec<Type>,
    pub query_name: String,
    pub mutation_name: String,
    pub query_fields: Vec<String>,
    pub mutation_fields: Vec<String>,
}

impl SchemaGenerator {
    pub fn new(api_name: impl Into<String>) -> Self {
        Self {
            api_name: api_name.into(),
            converters: TypeConverters::default(),
            filter_mask: TypeMask::id_to_int(),
            hooks: Hooks::new(),
            ignore: Vec::new(),
        }
    }

    pub fn with_converters(mut self, converters: TypeConverters) -> Self {
        self.converters = converters;
        self
    }

    /// Register extra native type conversions in place.
    pub fn converters_mut(&mut self) -> &mut TypeConverters {
        &mut self.converters
    }

    pub fn with_filter_mask(mut self, mask: TypeMask) -> Self {
        self.filter_mask = mask;
        self
    }

    pub fn with_hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Skip entities by entity name or table name.
    pub fn ignore<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn query_type_name(&self) -> String {
        format!("Query_{}", self.api_name)
    }

    pub fn mutation_type_name(&self) -> String {
        format!("Mutation_{}", self.api_name)
    }

    fn is_ignored(&self, entity: &EntityDescriptor) -> bool {
        self.ignore.iter().any(|n| *n == entity.name || *n == entity.table_name)
    }

    fn env(&self, binding: &Arc<EntityBinding>, sessions: &Arc<dyn SessionFactory>, op: HookOperation, field: &str) -> ResolverEnv {
        ResolverEnv {
            binding: binding.clone(),
            sessions: sessions.clone(),
            hook: self.hooks.get(op),
            field: field.to_string(),
        }
    }

    /// One list field per entity; create/update/delete for every entity that is not associative.
    /// Each run uses a fresh type registry, so generating twice is safe.
    pub fn generate(
        &self,
        entities: &[EntityDescriptor],
        sessions: Arc<dyn SessionFactory>,
    ) -> Result<GeneratedSchema, SchemaError> {
        let mut registry = TypeRegistry::new();
        register_vocabulary(&mut registry)?;

        let query_name = self.query_type_name();
        let mutation_name = self.mutation_type_name();
        let mut query = Object::new(&query_name).description(format!("Root Query Class for \"{}\"", self.api_name));
        let mut mutation =
            Object::new(&mutation_name).description(format!("Root Mutation Class for \"{}\"", self.api_name));
        let mut query_fields = Vec::new();
        let mut mutation_fields = Vec::new();

        for entity in entities {
            if self.is_ignored(entity) {
                debug!(entity = %entity.name, "ignored");
                continue;
            }
            let binding = Arc::new(EntityBinding::new(entity.clone(), &self.converters, &self.filter_mask)?);
            register_scalars(&binding, &mut registry)?;
            let object = build_object_type(&binding, &mut registry)?;
            let params = build_read_filter_input(&binding, &mut registry)?;
            let order = build_order_input(&binding, &mut registry)?;

            let list_name = entity.table_name.clone();
            claim_field(&mut query_fields, &query_name, &list_name)?;
            query = query.field(
                Field::new(
                    &list_name,
                    TypeRef::named_list(&object),
                    make_list_resolver(self.env(&binding, &sessions, HookOperation::Read, &list_name)),
                )
                .description(format!("List {} rows", entity.name))
                .argument(InputValue::new("filters", TypeRef::named_list(&params)))
                .argument(InputValue::new("order_by", TypeRef::named(&order)))
                .argument(InputValue::new("page", TypeRef::named(TypeRef::INT)).default_value(DEFAULT_PAGE))
                .argument(InputValue::new("perpage", TypeRef::named(TypeRef::INT)).default_value(DEFAULT_PERPAGE)),
            );

            if entity.is_associative() {
                debug!(entity = %entity.name, table = %entity.table_name, "associative table, no mutations");
                continue;
            }

            let create_input = build_create_input(&binding, &mut registry)?;
            let update_input = build_update_input(&binding, &mut registry)?;
            let payloads = build_payload_types(&binding, &mut registry)?;
            let lower = entity.lower_name();
            let data_arg = format!("{}_data", lower);

            let create_name = format!("create_{}", lower);
            claim_field(&mut mutation_fields, &mutation_name, &create_name)?;
            mutation = mutation.field(
                Field::new(
                    &create_name,
                    TypeRef::named(&payloads.create),
                    make_create_resolver(self.env(&binding, &sessions, HookOperation::Create, &create_name)),
                )
                .argument(InputValue::new(&data_arg, TypeRef::named_nn(&create_input))),
            );

            let update_name = format!("update_{}", lower);
            claim_field(&mut mutation_fields, &mutation_name, &update_name)?;
            mutation = mutation.field(
                Field::new(
                    &update_name,
                    TypeRef::named(&payloads.update),
                    make_update_resolver(self.env(&binding, &sessions, HookOperation::Update, &update_name)),
                )
                .argument(InputValue::new(&data_arg, TypeRef::named_nn(&update_input))),
            );

            let delete_name = format!("delete_{}", lower);
            claim_field(&mut mutation_fields, &mutation_name, &delete_name)?;
            let delete_field = build_delete_arguments(&binding).into_iter().fold(
                Field::new(
                    &delete_name,
                    TypeRef::named(&payloads.delete),
                    make_delete_resolver(self.env(&binding, &sessions, HookOperation::Delete, &delete_name)),
                ),
                |field, arg| field.argument(arg),
            );
            mutation = mutation.field(delete_field);

            debug!(entity = %entity.name, table = %entity.table_name, "generated");
        }

        if query_fields.is_empty() {
            return Err(SchemaError::Empty);
        }
        Ok(GeneratedSchema {
            query,
            mutation: (!mutation_fields.is_empty()).then_some(mutation),
            types: registry.into_types(),
            query_name,
            mutation_name,
            query_fields,
            mutation_fields,
        })
    }

    /// Load entities from `source`, then [`generate`](Self::generate).
    pub async fn generate_from(
        &self,
        source: &dyn EntitySource,
        sessions: Arc<dyn SessionFactory>,
    ) -> Result<GeneratedSchema, SchemaError> {
        let entities = source.entities().await?;
        self.generate(&entities, sessions)
    }
}

fn claim_field(fields: &mut Vec<String>, root: &str, name: &str) -> Result<(), SchemaError> {
    if fields.iter().any(|f| f == name) {
        return Err(SchemaError::DuplicateField {
            root: root.to_string(),
            name: name.to_string(),
        });
    }
    fields.push(name.to_string());
    Ok(())
}

impl GeneratedSchema {
    /// Assemble the executable schema.
    pub fn into_schema(self) -> Result<Schema, SchemaError> {
        let mutation_name = self.mutation.as_ref().map(|_| self.mutation_name.as_str());
        let mut builder = Schema::build(&self.query_name, mutation_name, None).register(self.query);
        if let Some(mutation) = self.mutation {
            builder = builder.register(mutation);
        }
        for ty in self.types {
            builder = builder.register(ty);
        }
        let schema = builder.finish().map_err(|e| SchemaError::Build(e.to_string()))?;
        trace!(sdl = %schema.sdl(), "generated schema");
        Ok(schema)
    }
}

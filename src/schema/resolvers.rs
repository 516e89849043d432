//! Resolver factories: one closure per generated root field.
//!
//! Each resolver runs its operation in its own store session, wrapped by the
//! operation's hook (if any). Errors reach the client with an `extensions.code`.

use crate::error::AppError;
use crate::schema::args::{args_to_json, object_arg, parse_create_input, parse_delete_args, parse_list_args, parse_update_input};
use crate::schema::builders::{EntityBinding, DELETED_COUNT};
use crate::schema::hooks::{run_hooked, HookContext, HookOperation, RequestContext, SchemaHook};
use crate::store::{in_session, SessionFactory};
use async_graphql::dynamic::{FieldFuture, FieldValue, ResolverContext};
use async_graphql::{ErrorExtensions, Value as GqlValue};
use serde_json::{json, Map, Value};
use std::future::Future;
use std::sync::Arc;

/// Everything a resolver closure owns: the entity snapshot, the session factory,
/// the hook for its operation and the root field name it serves.
#[derive(Clone)]
pub struct ResolverEnv {
    pub binding: Arc<EntityBinding>,
    pub sessions: Arc<dyn SessionFactory>,
    pub hook: Option<Arc<dyn SchemaHook>>,
    pub field: String,
}

fn to_gql(v: Value) -> Result<GqlValue, AppError> {
    GqlValue::from_json(v).map_err(|e| AppError::Validation(e.to_string()))
}

/// Parse the field arguments, then run `body` between the hook's pre and post steps.
async fn hooked<B, Fut>(
    env: &ResolverEnv,
    operation: HookOperation,
    ctx: &ResolverContext<'_>,
    body: B,
) -> Result<Value, AppError>
where
    B: FnOnce(Map<String, Value>) -> Fut,
    Fut: Future<Output = Result<Value, AppError>>,
{
    let args = args_to_json(ctx)?;
    let hook_ctx = HookContext {
        operation,
        entity: &env.binding.entity,
        field: &env.field,
        request: ctx.data_opt::<RequestContext>(),
    };
    let args_value = Value::Object(args.clone());
    run_hooked(env.hook.as_deref(), &hook_ctx, &args_value, || body(args)).await
}

/// `{table}(filters, order_by, page, perpage): [E]`
pub fn make_list_resolver(env: ResolverEnv) -> impl for<'a> Fn(ResolverContext<'a>) -> FieldFuture<'a> + Send + Sync + 'static {
    move |ctx| {
        let env = env.clone();
        FieldFuture::new(async move {
            let binding = env.binding.clone();
            let sessions = env.sessions.clone();
            let result = hooked(&env, HookOperation::Read, &ctx, |args| async move {
                let query = parse_list_args(&binding, &args)?;
                let rows = in_session(sessions.as_ref(), move |s| {
                    Box::pin(async move { s.select(&binding.entity, &query).await })
                })
                .await?;
                Ok(Value::Array(rows.into_iter().map(Value::Object).collect()))
            })
            .await
            .map_err(|e| e.extend())?;

            match result {
                Value::Null => Ok(None),
                Value::Array(rows) => {
                    let items = rows
                        .into_iter()
                        .map(|row| to_gql(row).map(FieldValue::value))
                        .collect::<Result<Vec<_>, _>>()
                        .map_err(|e| e.extend())?;
                    Ok(Some(FieldValue::list(items)))
                }
                _ => Err(AppError::Validation(format!("{} must resolve to a list", env.field)).extend()),
            }
        })
    }
}

/// `create_{e}({e}_data: {E}CreateInput!): Create{E}`
pub fn make_create_resolver(env: ResolverEnv) -> impl for<'a> Fn(ResolverContext<'a>) -> FieldFuture<'a> + Send + Sync + 'static {
    move |ctx| {
        let env = env.clone();
        FieldFuture::new(async move {
            let binding = env.binding.clone();
            let sessions = env.sessions.clone();
            let key = binding.entity.lower_name();
            let data_arg = format!("{}_data", key);
            let result = hooked(&env, HookOperation::Create, &ctx, |args| async move {
                let row = parse_create_input(&binding, object_arg(&args, &data_arg)?)?;
                let stored = in_session(sessions.as_ref(), move |s| {
                    Box::pin(async move { s.insert(&binding.entity, &row).await })
                })
                .await?;
                Ok(Value::Object(stored))
            })
            .await
            .map_err(|e| e.extend())?;
            let payload = to_gql(json!({ key: result })).map_err(|e| e.extend())?;
            Ok(Some(FieldValue::value(payload)))
        })
    }
}

/// `update_{e}({e}_data: {E}UpdateInput!): Update{E}`. A key matching no row is `NotFound`.
pub fn make_update_resolver(env: ResolverEnv) -> impl for<'a> Fn(ResolverContext<'a>) -> FieldFuture<'a> + Send + Sync + 'static {
    move |ctx| {
        let env = env.clone();
        FieldFuture::new(async move {
            let binding = env.binding.clone();
            let sessions = env.sessions.clone();
            let key = binding.entity.lower_name();
            let data_arg = format!("{}_data", key);
            let result = hooked(&env, HookOperation::Update, &ctx, |args| async move {
                let (row_key, changes) = parse_update_input(&binding, object_arg(&args, &data_arg)?)?;
                let updated = in_session(sessions.as_ref(), move |s| {
                    Box::pin(async move {
                        s.update(&binding.entity, &row_key, &changes).await?.ok_or_else(|| {
                            AppError::NotFound(format!("{} {}", binding.entity.name, Value::Object(row_key.clone())))
                        })
                    })
                })
                .await?;
                Ok(Value::Object(updated))
            })
            .await
            .map_err(|e| e.extend())?;
            let payload = to_gql(json!({ key: result })).map_err(|e| e.extend())?;
            Ok(Some(FieldValue::value(payload)))
        })
    }
}

/// `delete_{e}(<key columns>): Delete{E}`. Deletes every row matching all given key values.
pub fn make_delete_resolver(env: ResolverEnv) -> impl for<'a> Fn(ResolverContext<'a>) -> FieldFuture<'a> + Send + Sync + 'static {
    move |ctx| {
        let env = env.clone();
        FieldFuture::new(async move {
            let binding = env.binding.clone();
            let sessions = env.sessions.clone();
            let result = hooked(&env, HookOperation::Delete, &ctx, |args| async move {
                let row_key = parse_delete_args(&binding, &args)?;
                let deleted = in_session(sessions.as_ref(), move |s| {
                    Box::pin(async move { s.delete(&binding.entity, &row_key).await })
                })
                .await?;
                Ok(json!({ DELETED_COUNT: deleted }))
            })
            .await
            .map_err(|e| e.extend())?;
            Ok(Some(FieldValue::value(to_gql(result).map_err(|e| e.extend())?)))
        })
    }
}

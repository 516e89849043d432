//! Pre/post interception around generated resolvers, one hook per operation kind.

use crate::config::EntityDescriptor;
use crate::error::AppError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HookOperation {
    Read,
    Create,
    Update,
    Delete,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PreHookResult {
    Continue,
    Stop,
}

/// Outcome of a post-hook. `Replace` always wins, whatever the value (`null`, `0`, `[]` included).
#[derive(Clone, Debug, PartialEq)]
pub enum PostHookResult {
    Keep,
    Replace(Value),
}

/// Request metadata made available to hooks (inserted by the HTTP layer as schema request data).
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    headers: HashMap<String, String>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

pub struct HookContext<'a> {
    pub operation: HookOperation,
    pub entity: &'a EntityDescriptor,
    /// Root field being resolved, e.g. `users` or `create_user`.
    pub field: &'a str,
    pub request: Option<&'a RequestContext>,
}

/// `args` is the field's argument object; `result` is the operation's JSON value
/// (array of rows for reads, the row for create/update, `{ "deleted_count": n }` for delete).
/// Errors returned by a hook propagate to the caller unchanged.
#[async_trait]
pub trait SchemaHook: Send + Sync {
    async fn pre(&self, _ctx: &HookContext<'_>, _args: &Value) -> Result<PreHookResult, AppError> {
        Ok(PreHookResult::Continue)
    }

    async fn post(&self, _ctx: &HookContext<'_>, _args: &Value, _result: &Value) -> Result<PostHookResult, AppError> {
        Ok(PostHookResult::Keep)
    }
}

#[derive(Clone, Default)]
pub struct Hooks {
    by_operation: HashMap<HookOperation, Arc<dyn SchemaHook>>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, operation: HookOperation, hook: impl SchemaHook + 'static) -> Self {
        self.insert(operation, Arc::new(hook));
        self
    }

    pub fn insert(&mut self, operation: HookOperation, hook: Arc<dyn SchemaHook>) {
        self.by_operation.insert(operation, hook);
    }

    pub fn get(&self, operation: HookOperation) -> Option<Arc<dyn SchemaHook>> {
        self.by_operation.get(&operation).cloned()
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.by_operation.keys()).finish()
    }
}

/// Run `body` between the hook's pre and post steps. Without a hook this is just `body`.
pub async fn run_hooked<F, Fut>(
    hook: Option<&dyn SchemaHook>,
    ctx: &HookContext<'_>,
    args: &Value,
    body: F,
) -> Result<Value, AppError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Value, AppError>>,
{
    let Some(hook) = hook else {
        return body().await;
    };
    if hook.pre(ctx, args).await? == PreHookResult::Stop {
        tracing::debug!(field = %ctx.field, entity = %ctx.entity.name, "pre-hook stopped operation");
        return Err(AppError::HookAborted(format!("pre-hook stopped {}", ctx.field)));
    }
    let result = body().await?;
    match hook.post(ctx, args, &result).await? {
        PostHookResult::Keep => Ok(result),
        PostHookResult::Replace(replacement) => Ok(replacement),
    }
}

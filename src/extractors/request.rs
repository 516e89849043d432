//! Collect request headers into the hook-visible request context.

use crate::schema::RequestContext;
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};

/// Extractor for the headers of a GraphQL request. Non-UTF-8 header values are skipped.
#[derive(Clone, Debug)]
pub struct GraphqlRequestContext(pub RequestContext);

#[async_trait]
impl<S> FromRequestParts<S> for GraphqlRequestContext
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ctx = parts
            .headers
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str(), v.trim())))
            .fold(RequestContext::new(), |ctx, (name, value)| ctx.with_header(name, value));
        Ok(GraphqlRequestContext(ctx))
    }
}

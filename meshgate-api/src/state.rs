//! Shared application state for Axum routers.

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::{header::AUTHORIZATION, HeaderMap};
use meshgate_access::RequesterIdentity;

use crate::pipeline::QueryPipeline;

/// Maps request headers to a requester identity.
///
/// Authentication proper happens elsewhere; implementations only look up
/// who an already-verified credential belongs to. Unknown or missing
/// credentials resolve to anonymous.
pub trait IdentityResolver: Send + Sync {
    fn resolve(&self, headers: &HeaderMap) -> RequesterIdentity;
}

/// Every request is anonymous.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnonymousResolver;

impl IdentityResolver for AnonymousResolver {
    fn resolve(&self, _headers: &HeaderMap) -> RequesterIdentity {
        RequesterIdentity::anonymous()
    }
}

/// Static `Authorization: Api-Key <key>` lookup.
#[derive(Debug, Clone, Default)]
pub struct ApiKeyResolver {
    keys: HashMap<String, RequesterIdentity>,
}

impl ApiKeyResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(mut self, key: impl Into<String>, identity: RequesterIdentity) -> Self {
        self.keys.insert(key.into(), identity);
        self
    }
}

impl IdentityResolver for ApiKeyResolver {
    fn resolve(&self, headers: &HeaderMap) -> RequesterIdentity {
        headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Api-Key "))
            .and_then(|key| self.keys.get(key.trim()))
            .copied()
            .unwrap_or_default()
    }
}

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<QueryPipeline>,
    pub identity: Arc<dyn IdentityResolver>,
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(pipeline: QueryPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            identity: Arc::new(AnonymousResolver),
            start_time: std::time::Instant::now(),
        }
    }

    pub fn with_identity(mut self, identity: Arc<dyn IdentityResolver>) -> Self {
        self.identity = identity;
        self
    }
}

crate::impl_from_ref!(Arc<QueryPipeline>, pipeline);
crate::impl_from_ref!(Arc<dyn IdentityResolver>, identity);
crate::impl_from_ref!(std::time::Instant, start_time);

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_api_key_resolver() {
        let resolver = ApiKeyResolver::new().with_key("k-123", RequesterIdentity::user(7));

        let mut headers = HeaderMap::new();
        assert_eq!(resolver.resolve(&headers), RequesterIdentity::anonymous());

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Api-Key k-123"));
        assert_eq!(resolver.resolve(&headers), RequesterIdentity::user(7));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer k-123"));
        assert_eq!(resolver.resolve(&headers), RequesterIdentity::anonymous());
    }
}

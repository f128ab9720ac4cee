//! Named-route binding: endpoint name to search handler.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use crate::collection::{Authorizer, Decorator, Queryable};
use crate::errors::{Result, SearchError};
use crate::params::RawRequest;
use crate::pipeline::SearchEndpoint;
use crate::record::Record;

pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = Result<Value>> + Send + 'a>>;

/// Object-safe face of a search endpoint, so endpoints over different collections
/// can share one registry.
pub trait SearchHandler: Send + Sync {
    fn name(&self) -> &str;

    fn handle(&self, request: RawRequest) -> HandlerFuture<'_>;
}

impl<Q, A, D> SearchHandler for SearchEndpoint<Q, A, D>
where
    Q: Queryable + Clone + Send + Sync,
    Q::Record: Send,
    A: Authorizer<Q>,
    D: Decorator<Q::Record>,
    D::Output: Record,
{
    fn name(&self) -> &str {
        SearchEndpoint::name(self)
    }

    fn handle(&self, request: RawRequest) -> HandlerFuture<'_> {
        Box::pin(self.respond(request))
    }
}

#[derive(Default, Clone)]
pub struct EndpointRegistry {
    endpoints: BTreeMap<String, Arc<dyn SearchHandler>>,
}

impl EndpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a handler under its own name. Registering a name twice is a configuration error.
    pub fn register(&mut self, handler: impl SearchHandler + 'static) -> Result<()> {
        self.register_arc(Arc::new(handler))
    }

    pub fn register_arc(&mut self, handler: Arc<dyn SearchHandler>) -> Result<()> {
        let name = handler.name().to_string();
        if self.endpoints.contains_key(&name) {
            return Err(SearchError::config(format!("search endpoint '{name}' is already registered")));
        }
        log::debug!("registered search endpoint {name}");
        self.endpoints.insert(name, handler);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn SearchHandler>> {
        self.endpoints.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.endpoints.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.endpoints.keys().map(String::as_str)
    }

    /// Route a request to the named endpoint and return its JSON array.
    pub async fn dispatch(&self, name: &str, request: RawRequest) -> Result<Value> {
        let handler = self.endpoints.get(name).ok_or_else(|| SearchError::UnknownEndpoint {
            name: name.to_string(),
        })?;
        handler.handle(request).await
    }
}

impl std::fmt::Debug for EndpointRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointRegistry")
            .field("endpoints", &self.endpoints.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SearchOptions;
    use crate::memory::MemoryCollection;
    use crate::record::Document;
    use serde_json::json;

    fn endpoint(name: &str) -> SearchEndpoint<MemoryCollection<Document>> {
        let rows = vec![json!({"id": 1, "display_name": "one"})];
        let collection = MemoryCollection::new(rows.into_iter().filter_map(Document::from_value).collect());
        SearchEndpoint::new(name, collection, SearchOptions::new()).expect("endpoint")
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut registry = EndpointRegistry::new();
        registry.register(endpoint("users")).expect("first registration");
        let err = registry.register(endpoint("users")).expect_err("duplicate");
        assert!(err.is_configuration());
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["users"]);
    }

    #[tokio::test]
    async fn dispatch_routes_by_name() {
        let mut registry = EndpointRegistry::new();
        registry.register(endpoint("users")).expect("register");

        let value = registry
            .dispatch("users", RawRequest::from_query_string("id_eq=1"))
            .await
            .expect("dispatch");
        assert_eq!(value, json!([{"value": 1, "text": "one"}]));

        let err = registry
            .dispatch("posts", RawRequest::new())
            .await
            .expect_err("unknown");
        assert!(matches!(err, SearchError::UnknownEndpoint { ref name } if name == "posts"));
    }
}

//! Parameter-driven search endpoints.
//!
//! A [`SearchEndpoint`] turns free-form request parameters into a filtered, ordered,
//! windowed and authorization-scoped query over a [`Queryable`] collection, then projects
//! each hit into `{ value, text, ...extra }` for autocomplete-style widgets.
//!
//! ```
//! # async fn demo() -> searchpoint::Result<()> {
//! use searchpoint::{MemoryCollection, RawRequest, SearchEndpoint, SearchOptions};
//! use searchpoint::record::Document;
//! use serde_json::json;
//!
//! let docs = vec![json!({"id": 1, "name": "Smith Co"}), json!({"id": 2, "name": "Jones"})];
//! let companies = MemoryCollection::new(docs.into_iter().filter_map(Document::from_value).collect());
//! let endpoint = SearchEndpoint::new(
//!     "companies",
//!     companies,
//!     SearchOptions::new().display_method("name").highlight("name").term_key_rename("name_cont"),
//! )?;
//!
//! let rows = endpoint.respond(RawRequest::from_query_string("term=Smith")).await?;
//! assert_eq!(rows, json!([{"value": 1, "text": "<mark>Smith</mark> Co"}]));
//! # Ok(())
//! # }
//! # tokio::runtime::Runtime::new().unwrap().block_on(demo()).unwrap();
//! ```

extern crate self as searchpoint;

pub mod collection;
pub mod config;
pub mod errors;
pub mod filters;
pub mod highlight;
pub mod memory;
pub mod normalize;
pub mod order;
pub mod params;
pub mod pipeline;
pub mod project;
pub mod record;
pub mod redisearch;
pub mod registry;
pub mod scope;

pub use collection::{Authorizer, Decorator, FnAuthorizer, Plain, Queryable, Unrestricted};
pub use config::{ExtraPayload, SearchConfiguration, SearchOptions};
pub use errors::{Result, SearchError};
pub use filters::{Compiled, FilterParams, Predicate};
pub use highlight::{Highlighter, MarkHighlighter};
pub use memory::{MemoryCollection, ScopeRegistry};
pub use order::{OrderClause, SortOrder, Window};
pub use params::{ParamValue, Params, Principal, RawRequest};
pub use pipeline::{SearchEndpoint, SearchPlan};
pub use project::ProjectedRow;
pub use record::{Document, Record};
pub use redisearch::RedisCollection;
pub use registry::{EndpointRegistry, SearchHandler};
pub use searchpoint_macros::Record;

// Re-export redis so hosts build connections against the same version.
pub use redis;
pub use redis::aio::ConnectionManager;

#[doc(hidden)]
pub mod __private {
    pub use serde_json;
}

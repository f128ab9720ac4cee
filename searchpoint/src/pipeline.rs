//! The search endpoint: configuration, normalization, short-circuit, scopes, predicate,
//! materialization, decoration and projection, in that order.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::collection::{Authorizer, Decorator, Plain, Queryable, Unrestricted};
use crate::config::{self, ExtraPayload, SearchConfiguration, SearchOptions};
use crate::errors::Result;
use crate::filters::{Compiled, FilterParams, compile};
use crate::highlight::{Highlighter, MarkHighlighter, highlight_term};
use crate::normalize::{Normalized, normalize};
use crate::order::{OrderClause, Window};
use crate::params::RawRequest;
use crate::project::{ProjectedRow, Projector};
use crate::record::{Record, ensure_known_field};
use crate::scope::{self, window_for};

/// A configured search endpoint bound to one base collection.
///
/// ```no_run
/// # async fn demo() -> searchpoint::Result<()> {
/// use searchpoint::{MemoryCollection, RawRequest, SearchEndpoint, SearchOptions};
/// use searchpoint::record::Document;
///
/// let articles = MemoryCollection::<Document>::new(Vec::new());
/// let endpoint = SearchEndpoint::new("articles", articles, SearchOptions::new().display_method("title"))?;
/// let rows = endpoint.respond(RawRequest::from_query_string("title_cont=rust")).await?;
/// # let _ = rows;
/// # Ok(())
/// # }
/// ```
pub struct SearchEndpoint<Q, A = Unrestricted, D = Plain>
where
    Q: Queryable,
    D: Decorator<Q::Record>,
{
    name: String,
    base: Q,
    options: SearchOptions<D::Output>,
    authorizer: A,
    decorator: D,
    highlighter: Arc<dyn Highlighter>,
}

impl<Q> SearchEndpoint<Q>
where
    Q: Queryable,
    Q::Record: Record,
{
    pub fn new(name: impl Into<String>, base: Q, options: SearchOptions<Q::Record>) -> Result<Self> {
        Self::decorated(name, base, Plain, options)
    }
}

impl<Q, D> SearchEndpoint<Q, Unrestricted, D>
where
    Q: Queryable,
    D: Decorator<Q::Record>,
    D::Output: Record,
{
    /// Endpoint whose records pass through `decorator` before projection; field names
    /// in `options` refer to the decorated type.
    pub fn decorated(name: impl Into<String>, base: Q, decorator: D, options: SearchOptions<D::Output>) -> Result<Self> {
        options.validate()?;
        options.validate_fields()?;
        Ok(Self {
            name: name.into(),
            base,
            options,
            authorizer: Unrestricted,
            decorator,
            highlighter: Arc::new(MarkHighlighter::new()),
        })
    }
}

impl<Q, A, D> SearchEndpoint<Q, A, D>
where
    Q: Queryable,
    D: Decorator<Q::Record>,
{
    pub fn with_authorizer<B: Authorizer<Q>>(self, authorizer: B) -> SearchEndpoint<Q, B, D> {
        SearchEndpoint {
            name: self.name,
            base: self.base,
            options: self.options,
            authorizer,
            decorator: self.decorator,
            highlighter: self.highlighter,
        }
    }

    #[inline]
    pub fn with_highlighter(mut self, highlighter: impl Highlighter + 'static) -> Self {
        self.highlighter = Arc::new(highlighter);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &SearchOptions<D::Output> {
        &self.options
    }
}

impl<Q, A, D> SearchEndpoint<Q, A, D>
where
    Q: Queryable + Clone,
    A: Authorizer<Q>,
    D: Decorator<Q::Record>,
    D::Output: Record,
{
    /// Run the whole pipeline and return the projected rows.
    pub async fn search(&self, mut request: RawRequest) -> Result<Vec<ProjectedRow>> {
        let config = self.configure(&request)?;
        let normalized = normalize(&mut request, &config);

        let predicate = match compile(&normalized.filters) {
            Compiled::Empty => {
                log::debug!("{}: no filter input, returning no rows", self.name);
                return Ok(Vec::new());
            }
            Compiled::Filter(predicate) => predicate,
        };

        let collection = scope::resolve(
            self.base.clone(),
            &config,
            &normalized,
            &self.authorizer,
            request.principal(),
        )?;
        let records = collection.filter(&predicate)?.load().await?;
        log::debug!("{}: loaded {} records", self.name, records.len());

        let projector = Projector::new(&config, &normalized.filters, self.highlighter.as_ref());
        records
            .into_iter()
            .map(|record| projector.project(&self.decorator.decorate(record)))
            .collect()
    }

    /// [`search`](Self::search) serialized as the wire JSON array.
    pub async fn respond(&self, request: RawRequest) -> Result<Value> {
        let rows = self.search(request).await?;
        Ok(Value::Array(rows.into_iter().map(Value::from).collect()))
    }

    /// Describe what [`search`](Self::search) would do, without touching the collection.
    pub fn plan(&self, mut request: RawRequest) -> Result<SearchPlan> {
        let config = self.configure(&request)?;
        let normalized = normalize(&mut request, &config);
        Ok(SearchPlan::new(&self.name, &config, normalized))
    }

    fn configure(&self, request: &RawRequest) -> Result<SearchConfiguration<D::Output>> {
        let config = config::resolve(&self.options, request)?;
        if let (Some(_), ExtraPayload::Fields(names)) = (request.get(config::PAYLOAD_PARAM), &config.extra_payload) {
            for name in names {
                ensure_known_field::<D::Output>(name)?;
            }
        }
        Ok(config)
    }
}

impl<Q, A, D> fmt::Debug for SearchEndpoint<Q, A, D>
where
    Q: Queryable + fmt::Debug,
    D: Decorator<Q::Record>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchEndpoint")
            .field("name", &self.name)
            .field("base", &self.base)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Explain output: everything the pipeline decided before executing a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchPlan {
    pub endpoint: String,
    pub filters: FilterParams,
    /// No filter input: the search returns no rows and nothing below is applied.
    pub short_circuit: bool,
    pub default_scopes: Vec<String>,
    pub scopes: Vec<String>,
    pub includes: Vec<String>,
    pub order: OrderClause,
    pub window: Window,
    pub highlight_term: Option<String>,
}

impl SearchPlan {
    fn new<R>(endpoint: &str, config: &SearchConfiguration<R>, normalized: Normalized) -> Self {
        let window = window_for(config, &normalized);
        let term = config
            .highlight_field
            .as_deref()
            .and_then(|key| highlight_term(&normalized.filters, key));
        let default_scopes = if normalized.skip_default_scopes {
            Vec::new()
        } else {
            config.default_scope_names.clone()
        };

        Self {
            endpoint: endpoint.to_string(),
            short_circuit: normalized.filters.is_empty(),
            default_scopes,
            scopes: normalized
                .scope
                .map(|spec| spec.names().to_vec())
                .unwrap_or_default(),
            includes: config.eager_load_hints.clone(),
            order: config.order_clause.clone(),
            window,
            highlight_term: term,
            filters: normalized.filters,
        }
    }
}

//! Endpoint options and their per-request resolution.
//!
//! [`SearchOptions`] is the static, per-endpoint tier: built in code or loaded from TOML.
//! [`resolve`] folds in the few request-overridable values and yields an immutable
//! [`SearchConfiguration`] for a single invocation.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::errors::{Result, SearchError};
use crate::order::{OrderClause, SortOrder};
use crate::params::{ParamValue, RawRequest};
use crate::record::{Record, ensure_known_field};

pub const DEFAULT_VALUE_METHOD: &str = "id";
pub const DEFAULT_DISPLAY_METHOD: &str = "display_name";
pub const DEFAULT_PER_PAGE: u64 = 500;
pub const DEFAULT_TERM_KEY: &str = "term";
/// Request parameter that replaces the configured extra payload with a field list.
pub const PAYLOAD_PARAM: &str = "additional_payload";

pub type PayloadFn<R> = Arc<dyn Fn(&R) -> Map<String, Value> + Send + Sync>;

/// Extra keys merged into every projected row.
pub enum ExtraPayload<R> {
    /// Read each named field from the record.
    Fields(Vec<String>),
    /// Compute the extra keys; the returned map is merged last and wins on conflicts.
    Computed(PayloadFn<R>),
}

impl<R> ExtraPayload<R> {
    pub fn fields<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        ExtraPayload::Fields(names.into_iter().map(Into::into).collect())
    }

    pub fn computed<F>(compute: F) -> Self
    where
        F: Fn(&R) -> Map<String, Value> + Send + Sync + 'static,
    {
        ExtraPayload::Computed(Arc::new(compute))
    }
}

impl<R> Default for ExtraPayload<R> {
    fn default() -> Self {
        ExtraPayload::Fields(Vec::new())
    }
}

impl<R> Clone for ExtraPayload<R> {
    fn clone(&self) -> Self {
        match self {
            ExtraPayload::Fields(names) => ExtraPayload::Fields(names.clone()),
            ExtraPayload::Computed(compute) => ExtraPayload::Computed(Arc::clone(compute)),
        }
    }
}

impl<R> fmt::Debug for ExtraPayload<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtraPayload::Fields(names) => f.debug_tuple("Fields").field(names).finish(),
            ExtraPayload::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

impl<'de, R> Deserialize<'de> for ExtraPayload<R> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Ok(ExtraPayload::Fields(one_or_many(deserializer)?))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

fn one_or_many<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Vec<String>, D::Error> {
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(name) => vec![name],
        OneOrMany::Many(names) => names,
    })
}

fn default_value_method() -> String {
    DEFAULT_VALUE_METHOD.to_string()
}

fn default_display_method() -> String {
    DEFAULT_DISPLAY_METHOD.to_string()
}

fn default_per_page() -> u64 {
    DEFAULT_PER_PAGE
}

fn default_order_clause() -> OrderClause {
    OrderClause::by("id", SortOrder::Desc)
}

fn default_term_key() -> String {
    DEFAULT_TERM_KEY.to_string()
}

/// Static options for one search endpoint.
///
/// ```
/// use searchpoint::config::SearchOptions;
/// use searchpoint::record::Document;
///
/// let options: SearchOptions<Document> = SearchOptions::from_toml_str(r#"
///     display_method = "title"
///     default_scope = "visible"
///     term_key_rename = "title_cont"
///     order_clause = "title asc"
/// "#).unwrap();
/// assert_eq!(options.default_scope, vec!["visible".to_string()]);
/// assert_eq!(options.default_per_page, 500);
/// ```
#[derive(Deserialize)]
#[serde(bound = "", deny_unknown_fields)]
pub struct SearchOptions<R> {
    #[serde(default = "default_value_method")]
    pub value_method: String,
    #[serde(default = "default_display_method")]
    pub display_method: String,
    /// Filter key whose value gets highlighted inside the display text.
    #[serde(default)]
    pub highlight: Option<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub default_scope: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub includes: Vec<String>,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub additional_payload: ExtraPayload<R>,
    #[serde(default)]
    pub skip_pagination: bool,
    #[serde(default = "default_per_page")]
    pub default_per_page: u64,
    #[serde(default = "default_order_clause")]
    pub order_clause: OrderClause,
    #[serde(default = "default_term_key")]
    pub json_term_key: String,
    #[serde(default)]
    pub term_key_rename: Option<String>,
}

impl<R> Default for SearchOptions<R> {
    fn default() -> Self {
        Self {
            value_method: default_value_method(),
            display_method: default_display_method(),
            highlight: None,
            default_scope: Vec::new(),
            includes: Vec::new(),
            limit: None,
            additional_payload: ExtraPayload::default(),
            skip_pagination: false,
            default_per_page: default_per_page(),
            order_clause: default_order_clause(),
            json_term_key: default_term_key(),
            term_key_rename: None,
        }
    }
}

impl<R> Clone for SearchOptions<R> {
    fn clone(&self) -> Self {
        Self {
            value_method: self.value_method.clone(),
            display_method: self.display_method.clone(),
            highlight: self.highlight.clone(),
            default_scope: self.default_scope.clone(),
            includes: self.includes.clone(),
            limit: self.limit,
            additional_payload: self.additional_payload.clone(),
            skip_pagination: self.skip_pagination,
            default_per_page: self.default_per_page,
            order_clause: self.order_clause.clone(),
            json_term_key: self.json_term_key.clone(),
            term_key_rename: self.term_key_rename.clone(),
        }
    }
}

impl<R> fmt::Debug for SearchOptions<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchOptions")
            .field("value_method", &self.value_method)
            .field("display_method", &self.display_method)
            .field("highlight", &self.highlight)
            .field("default_scope", &self.default_scope)
            .field("includes", &self.includes)
            .field("limit", &self.limit)
            .field("additional_payload", &self.additional_payload)
            .field("skip_pagination", &self.skip_pagination)
            .field("default_per_page", &self.default_per_page)
            .field("order_clause", &self.order_clause)
            .field("json_term_key", &self.json_term_key)
            .field("term_key_rename", &self.term_key_rename)
            .finish()
    }
}

impl<R> SearchOptions<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    #[inline]
    pub fn value_method(mut self, field: impl Into<String>) -> Self {
        self.value_method = field.into();
        self
    }

    #[inline]
    pub fn display_method(mut self, field: impl Into<String>) -> Self {
        self.display_method = field.into();
        self
    }

    #[inline]
    pub fn highlight(mut self, key: impl Into<String>) -> Self {
        self.highlight = Some(key.into());
        self
    }

    #[inline]
    pub fn default_scope(mut self, name: impl Into<String>) -> Self {
        self.default_scope.push(name.into());
        self
    }

    #[inline]
    pub fn includes(mut self, hint: impl Into<String>) -> Self {
        self.includes.push(hint.into());
        self
    }

    #[inline]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    #[inline]
    pub fn additional_payload(mut self, payload: ExtraPayload<R>) -> Self {
        self.additional_payload = payload;
        self
    }

    #[inline]
    pub fn skip_pagination(mut self, skip: bool) -> Self {
        self.skip_pagination = skip;
        self
    }

    #[inline]
    pub fn default_per_page(mut self, per_page: u64) -> Self {
        self.default_per_page = per_page;
        self
    }

    #[inline]
    pub fn order_clause(mut self, clause: OrderClause) -> Self {
        self.order_clause = clause;
        self
    }

    #[inline]
    pub fn json_term_key(mut self, key: impl Into<String>) -> Self {
        self.json_term_key = key.into();
        self
    }

    #[inline]
    pub fn term_key_rename(mut self, key: impl Into<String>) -> Self {
        self.term_key_rename = Some(key.into());
        self
    }

    /// Wiring-time checks that do not depend on any request.
    pub fn validate(&self) -> Result<()> {
        if self.default_per_page == 0 {
            return Err(SearchError::config("default_per_page must be greater than zero"));
        }
        if self.json_term_key.trim().is_empty() {
            return Err(SearchError::config("json_term_key must not be empty"));
        }
        if self.value_method.is_empty() || self.display_method.is_empty() {
            return Err(SearchError::config("value_method and display_method must name a field"));
        }
        if self.default_scope.iter().chain(&self.includes).any(|name| name.trim().is_empty()) {
            return Err(SearchError::config("scope and include names must not be empty"));
        }
        Ok(())
    }

    /// Field names the projection reads, checked against a static record schema.
    pub fn validate_fields(&self) -> Result<()>
    where
        R: Record,
    {
        ensure_known_field::<R>(&self.value_method)?;
        ensure_known_field::<R>(&self.display_method)?;
        if let ExtraPayload::Fields(names) = &self.additional_payload {
            for name in names {
                ensure_known_field::<R>(name)?;
            }
        }
        Ok(())
    }
}

/// Fully resolved settings for one invocation.
pub struct SearchConfiguration<R> {
    pub value_field: String,
    pub display_field: String,
    pub highlight_field: Option<String>,
    pub default_scope_names: Vec<String>,
    pub eager_load_hints: Vec<String>,
    pub result_limit: Option<u64>,
    pub skip_pagination: bool,
    pub default_page_size: u64,
    pub order_clause: OrderClause,
    pub term_param_key: String,
    pub term_key_rename: Option<String>,
    pub extra_payload: ExtraPayload<R>,
}

impl<R> fmt::Debug for SearchConfiguration<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchConfiguration")
            .field("value_field", &self.value_field)
            .field("display_field", &self.display_field)
            .field("highlight_field", &self.highlight_field)
            .field("default_scope_names", &self.default_scope_names)
            .field("eager_load_hints", &self.eager_load_hints)
            .field("result_limit", &self.result_limit)
            .field("skip_pagination", &self.skip_pagination)
            .field("default_page_size", &self.default_page_size)
            .field("order_clause", &self.order_clause)
            .field("term_param_key", &self.term_param_key)
            .field("term_key_rename", &self.term_key_rename)
            .field("extra_payload", &self.extra_payload)
            .finish()
    }
}

impl<R> SearchConfiguration<R> {
    /// Key the term value lands under in the filter map.
    pub fn term_target_key(&self) -> &str {
        self.term_key_rename.as_deref().unwrap_or(&self.term_param_key)
    }
}

/// Resolve static options against a request. Only the extra payload is request-overridable.
pub fn resolve<R>(options: &SearchOptions<R>, request: &RawRequest) -> Result<SearchConfiguration<R>> {
    options.validate()?;

    let extra_payload = match request.get(PAYLOAD_PARAM) {
        Some(requested) => ExtraPayload::Fields(requested_payload_fields(requested)),
        None => options.additional_payload.clone(),
    };

    Ok(SearchConfiguration {
        value_field: options.value_method.clone(),
        display_field: options.display_method.clone(),
        highlight_field: options.highlight.clone(),
        default_scope_names: options.default_scope.clone(),
        eager_load_hints: options.includes.clone(),
        result_limit: options.limit,
        skip_pagination: options.skip_pagination,
        default_page_size: options.default_per_page,
        order_clause: options.order_clause.clone(),
        term_param_key: options.json_term_key.clone(),
        term_key_rename: options.term_key_rename.clone(),
        extra_payload,
    })
}

fn requested_payload_fields(requested: &ParamValue) -> Vec<String> {
    requested
        .to_strings()
        .iter()
        .flat_map(|name| name.split(','))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

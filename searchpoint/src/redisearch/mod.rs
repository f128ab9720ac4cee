//! RediSearch-backed queryable collection over RedisJSON documents.
//!
//! Filter keys are translated with the index schema (see [`condition_for`]); scopes are
//! pre-built [`FilterCondition`]s. Everything accumulates into [`SearchParams`] and a
//! single `FT.SEARCH` runs on [`Queryable::load`].

mod index;
mod query;

use std::borrow::Cow;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use redis::{Value, aio::ConnectionManager, cmd, from_redis_value};
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::collection::Queryable;
use crate::errors::{Result, SearchError};
use crate::filters::Predicate;
use crate::order::{OrderClause, SortOrder, Window};

pub use index::{IndexField, IndexFieldType, IndexSchema, ensure_index};
pub use query::{
    FilterCondition, NumericBound, condition_for, escape_for_tag_query, escape_for_text_contains,
    escape_for_text_exact, escape_for_text_prefix,
};

/// `LIMIT` count used when the window is unbounded.
pub const UNBOUNDED_LIMIT: u64 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchSort {
    pub field: String,
    pub order: SortOrder,
}

/// Accumulated query state, independent of any connection.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchParams {
    /// ANDed at the top level.
    pub conditions: Vec<FilterCondition>,
    pub sort: Option<SearchSort>,
    pub window: Window,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchParams {
    pub fn new() -> Self {
        Self {
            conditions: Vec::new(),
            sort: None,
            window: Window::Unbounded,
        }
    }

    #[inline]
    pub fn with_condition(mut self, condition: FilterCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn build_query(&self) -> String {
        let clauses: Vec<String> = self
            .conditions
            .iter()
            .map(FilterCondition::to_query_clause)
            .filter(|clause| !clause.is_empty())
            .collect();
        if clauses.is_empty() {
            "*".to_string()
        } else {
            clauses.join(" ")
        }
    }

    /// `(offset, count)` for the `LIMIT` argument.
    pub fn limit_args(&self) -> (u64, u64) {
        (self.window.offset(), self.window.count().unwrap_or(UNBOUNDED_LIMIT))
    }
}

pub struct RedisCollection<R> {
    conn: ConnectionManager,
    schema: Arc<IndexSchema>,
    scopes: Arc<HashMap<String, FilterCondition>>,
    includes: Arc<BTreeSet<String>>,
    params: SearchParams,
    _record: PhantomData<fn() -> R>,
}

impl<R> Clone for RedisCollection<R> {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
            schema: Arc::clone(&self.schema),
            scopes: Arc::clone(&self.scopes),
            includes: Arc::clone(&self.includes),
            params: self.params.clone(),
            _record: PhantomData,
        }
    }
}

impl<R> fmt::Debug for RedisCollection<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisCollection")
            .field("index", &self.schema.name)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl<R> RedisCollection<R> {
    pub fn new(conn: ConnectionManager, schema: IndexSchema) -> Self {
        Self {
            conn,
            schema: Arc::new(schema),
            scopes: Arc::new(HashMap::new()),
            includes: Arc::new(BTreeSet::new()),
            params: SearchParams::new(),
            _record: PhantomData,
        }
    }

    /// Register named scopes. Replaces any previously registered set.
    #[inline]
    pub fn with_scopes<S: Into<String>>(mut self, scopes: impl IntoIterator<Item = (S, FilterCondition)>) -> Self {
        self.scopes = Arc::new(scopes.into_iter().map(|(name, condition)| (name.into(), condition)).collect());
        self
    }

    /// Accepted eager-load names. Documents are stored whole, so loading them is a no-op.
    #[inline]
    pub fn with_includes<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.includes = Arc::new(names.into_iter().map(Into::into).collect());
        self
    }

    /// Narrow by an extra condition; the hook authorizers use.
    #[inline]
    pub fn restrict(mut self, condition: FilterCondition) -> Self {
        self.params.conditions.push(condition);
        self
    }

    pub fn params(&self) -> &SearchParams {
        &self.params
    }

    pub fn schema(&self) -> &IndexSchema {
        &self.schema
    }

    pub async fn ensure_index(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        ensure_index(&mut conn, &self.schema).await
    }
}

impl<R> Queryable for RedisCollection<R>
where
    R: DeserializeOwned + Send,
{
    type Record = R;

    fn apply_scope(mut self, name: &str) -> Result<Self> {
        let condition = self
            .scopes
            .get(name)
            .cloned()
            .ok_or_else(|| SearchError::UnknownScope { name: name.to_string() })?;
        self.params.conditions.push(condition);
        Ok(self)
    }

    fn eager_load(self, hints: &[String]) -> Result<Self> {
        match hints.iter().find(|hint| !self.includes.contains(*hint)) {
            Some(unknown) => Err(SearchError::UnknownInclude { name: unknown.clone() }),
            None => Ok(self),
        }
    }

    fn order(mut self, clause: &OrderClause) -> Result<Self> {
        let term = match clause.terms() {
            [] => {
                self.params.sort = None;
                return Ok(self);
            }
            [term] => term,
            _ => {
                return Err(SearchError::config(format!(
                    "RediSearch sorts by a single field, got '{clause}'"
                )));
            }
        };
        let field = self
            .schema
            .find_field(&term.field)
            .filter(|field| field.sortable)
            .ok_or_else(|| SearchError::config(format!("'{}' is not a sortable index field", term.field)))?;
        self.params.sort = Some(SearchSort {
            field: field.name.clone(),
            order: term.order,
        });
        Ok(self)
    }

    fn limit(mut self, limit: u64) -> Self {
        self.params.window = Window::Limit { limit };
        self
    }

    fn page(mut self, page: u64, per_page: u64) -> Self {
        self.params.window = Window::Page { page, per_page };
        self
    }

    fn filter(mut self, predicate: &Predicate) -> Result<Self> {
        for condition in predicate.conditions() {
            if let Some(translated) = condition_for(&self.schema, &condition)? {
                self.params.conditions.push(translated);
            }
        }
        Ok(self)
    }

    async fn load(self) -> Result<Vec<R>> {
        let mut conn = self.conn;
        execute_search(&mut conn, &self.schema.name, &self.params).await
    }
}

pub async fn execute_search<T>(conn: &mut ConnectionManager, index_name: &str, params: &SearchParams) -> Result<Vec<T>>
where
    T: DeserializeOwned,
{
    let query = params.build_query();
    log::debug!("FT.SEARCH {index_name} {query}");

    let mut command = cmd("FT.SEARCH");
    command.arg(index_name);
    command.arg(query);

    if let Some(sort) = &params.sort {
        command.arg("SORTBY").arg(&sort.field).arg(sort.order.as_str());
    }

    let (start, count) = params.limit_args();
    command.arg("LIMIT").arg(start).arg(count);
    command.arg("RETURN").arg(1).arg("$");
    command.arg("DIALECT").arg(3);

    let raw: Value = command.query_async(conn).await?;
    let values: Vec<Value> = from_redis_value(&raw).map_err(|err| SearchError::Other {
        message: Cow::Owned(format!("Failed to parse search response: {}", err)),
    })?;

    // [total, key, doc, key, doc, ...]
    let mut items = Vec::with_capacity(values.len() / 2);
    let mut idx = 1;
    while idx + 1 < values.len() {
        let json_payload = extract_json_payload(&values[idx + 1])?;
        let item: T = serde_json::from_str(&json_payload).map_err(|err| SearchError::Other {
            message: Cow::Owned(format!("Failed to deserialize search document: {}", err)),
        })?;
        items.push(item);
        idx += 2;
    }
    Ok(items)
}

fn extract_json_payload(value: &Value) -> Result<String> {
    match value {
        Value::Array(items) => {
            for chunk in items.chunks(2) {
                let [alias, payload] = chunk else {
                    continue;
                };
                let alias: String = from_redis_value(alias).map_err(|err| SearchError::Other {
                    message: Cow::Owned(format!("Invalid field alias in search document: {}", err)),
                })?;
                if alias == "$" {
                    return normalize_json_payload(value_to_string(payload)?);
                }
            }
            Err(SearchError::Other {
                message: Cow::Borrowed("Search response missing JSON payload"),
            })
        }
        other => normalize_json_payload(value_to_string(other)?),
    }
}

/// DIALECT 3 wraps `$` results in an array; unwrap the single document.
fn normalize_json_payload(payload: String) -> Result<String> {
    let trimmed = payload.trim();
    if !(trimmed.starts_with('[') && trimmed.ends_with(']')) {
        return Ok(payload);
    }

    let value: JsonValue = serde_json::from_str(trimmed).map_err(|err| SearchError::Other {
        message: Cow::Owned(format!("Failed to parse JSON payload array: {}", err)),
    })?;
    match value.as_array().and_then(|items| items.first()) {
        Some(first) => serde_json::to_string(first).map_err(|err| SearchError::Other {
            message: Cow::Owned(format!("Failed to serialize JSON payload element: {}", err)),
        }),
        None => Ok(payload),
    }
}

fn value_to_string(value: &Value) -> Result<String> {
    match value {
        Value::BulkString(bytes) => String::from_utf8(bytes.clone()).map_err(|err| SearchError::Other {
            message: Cow::Owned(format!("Invalid UTF-8 in search response: {}", err)),
        }),
        Value::SimpleString(status) => Ok(status.clone()),
        Value::VerbatimString { text, .. } => Ok(text.clone()),
        _ => from_redis_value::<String>(value).map_err(|err| SearchError::Other {
            message: Cow::Owned(format!("Unexpected search value type: {}", err)),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_params_match_everything() {
        let params = SearchParams::new();
        assert_eq!(params.build_query(), "*");
        assert_eq!(params.limit_args(), (0, UNBOUNDED_LIMIT));
    }

    #[test]
    fn conditions_are_conjoined_and_window_maps_to_limit() {
        let mut params = SearchParams::new()
            .with_condition(FilterCondition::tag_eq("status", "live"))
            .with_condition(FilterCondition::text_contains("title", "rust"));
        params.window = Window::Page { page: 3, per_page: 20 };
        assert_eq!(params.build_query(), "(@status:{live}) (@title:*rust*)");
        assert_eq!(params.limit_args(), (40, 20));

        params.window = Window::Limit { limit: 5 };
        assert_eq!(params.limit_args(), (0, 5));
    }

    #[test]
    fn dialect_three_payload_arrays_are_unwrapped() {
        let payload = Value::Array(vec![
            Value::BulkString(b"$".to_vec()),
            Value::BulkString(br#"[{"id":1}]"#.to_vec()),
        ]);
        assert_eq!(extract_json_payload(&payload).expect("payload"), r#"{"id":1}"#);
        assert!(extract_json_payload(&Value::Array(Vec::new())).is_err());
    }
}

//! In-process queryable collection.
//!
//! Scopes, authorization restrictions and predicates accumulate as a conjunction and
//! are only evaluated by [`Queryable::load`], which then stable-sorts by the order
//! clause and cuts the window. Useful for tests, fixtures and the CLI.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::collection::Queryable;
use crate::errors::{Result, SearchError};
use crate::filters::{Compiled, Condition, FilterOperator, FilterParams, Predicate, compile};
use crate::order::{OrderClause, SortOrder, Window};
use crate::params::ParamValue;
use crate::record::Record;

pub type RecordFilter<R> = Arc<dyn Fn(&R) -> bool + Send + Sync>;

enum ScopeDef<R> {
    Closure(RecordFilter<R>),
    Declarative(Vec<Condition>),
}

impl<R> Clone for ScopeDef<R> {
    fn clone(&self) -> Self {
        match self {
            ScopeDef::Closure(filter) => ScopeDef::Closure(Arc::clone(filter)),
            ScopeDef::Declarative(conditions) => ScopeDef::Declarative(conditions.clone()),
        }
    }
}

/// Named scopes a [`MemoryCollection`] can apply.
pub struct ScopeRegistry<R> {
    scopes: HashMap<String, ScopeDef<R>>,
}

impl<R> Default for ScopeRegistry<R> {
    fn default() -> Self {
        Self {
            scopes: HashMap::new(),
        }
    }
}

impl<R> fmt::Debug for ScopeRegistry<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.scopes.keys().collect();
        names.sort();
        f.debug_struct("ScopeRegistry").field("scopes", &names).finish()
    }
}

impl<R> ScopeRegistry<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a scope backed by a record predicate.
    #[inline]
    pub fn scope<F>(mut self, name: impl Into<String>, filter: F) -> Self
    where
        F: Fn(&R) -> bool + Send + Sync + 'static,
    {
        self.scopes.insert(name.into(), ScopeDef::Closure(Arc::new(filter)));
        self
    }

    /// Register a scope written as filter parameters, e.g. `{ published_true = "1" }`.
    #[inline]
    pub fn scope_params(mut self, name: impl Into<String>, params: FilterParams) -> Self {
        let conditions = match compile(&params) {
            Compiled::Filter(predicate) => predicate.conditions(),
            Compiled::Empty => Vec::new(),
        };
        self.scopes.insert(name.into(), ScopeDef::Declarative(conditions));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.scopes.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.scopes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

enum Filter<R> {
    Record(RecordFilter<R>),
    Conditions(Vec<Condition>),
}

impl<R> Clone for Filter<R> {
    fn clone(&self) -> Self {
        match self {
            Filter::Record(filter) => Filter::Record(Arc::clone(filter)),
            Filter::Conditions(conditions) => Filter::Conditions(conditions.clone()),
        }
    }
}

impl<R: Record> Filter<R> {
    fn accepts(&self, record: &R) -> bool {
        match self {
            Filter::Record(filter) => filter(record),
            Filter::Conditions(conditions) => conditions.iter().all(|condition| holds(record, condition)),
        }
    }
}

pub struct MemoryCollection<R> {
    records: Arc<Vec<R>>,
    scopes: Arc<ScopeRegistry<R>>,
    includes: Arc<BTreeSet<String>>,
    filters: Vec<Filter<R>>,
    applied_scopes: Vec<String>,
    loaded_includes: Vec<String>,
    order: OrderClause,
    window: Window,
}

impl<R> Clone for MemoryCollection<R> {
    fn clone(&self) -> Self {
        Self {
            records: Arc::clone(&self.records),
            scopes: Arc::clone(&self.scopes),
            includes: Arc::clone(&self.includes),
            filters: self.filters.clone(),
            applied_scopes: self.applied_scopes.clone(),
            loaded_includes: self.loaded_includes.clone(),
            order: self.order.clone(),
            window: self.window,
        }
    }
}

impl<R> fmt::Debug for MemoryCollection<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryCollection")
            .field("records", &self.records.len())
            .field("scopes", &self.scopes)
            .field("applied_scopes", &self.applied_scopes)
            .field("filters", &self.filters.len())
            .field("order", &self.order)
            .field("window", &self.window)
            .finish()
    }
}

impl<R> MemoryCollection<R> {
    pub fn new(records: Vec<R>) -> Self {
        Self {
            records: Arc::new(records),
            scopes: Arc::new(ScopeRegistry::new()),
            includes: Arc::new(BTreeSet::new()),
            filters: Vec::new(),
            applied_scopes: Vec::new(),
            loaded_includes: Vec::new(),
            order: OrderClause::none(),
            window: Window::Unbounded,
        }
    }

    #[inline]
    pub fn with_scopes(mut self, scopes: ScopeRegistry<R>) -> Self {
        self.scopes = Arc::new(scopes);
        self
    }

    /// Eager-load names this collection accepts. Loading is a no-op in memory.
    #[inline]
    pub fn with_includes<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.includes = Arc::new(names.into_iter().map(Into::into).collect());
        self
    }

    /// Narrow by an arbitrary record predicate; the hook authorizers use.
    #[inline]
    pub fn restrict<F>(mut self, filter: F) -> Self
    where
        F: Fn(&R) -> bool + Send + Sync + 'static,
    {
        self.filters.push(Filter::Record(Arc::new(filter)));
        self
    }

    pub fn applied_scopes(&self) -> &[String] {
        &self.applied_scopes
    }

    pub fn loaded_includes(&self) -> &[String] {
        &self.loaded_includes
    }

    pub fn window(&self) -> Window {
        self.window
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<R> MemoryCollection<R>
where
    R: Record + Clone,
{
    fn materialize(&self) -> Vec<R> {
        let mut rows: Vec<R> = self
            .records
            .iter()
            .filter(|record| self.filters.iter().all(|filter| filter.accepts(record)))
            .cloned()
            .collect();

        if !self.order.is_empty() {
            rows.sort_by(|a, b| compare_records(a, b, &self.order));
        }

        let offset = usize::try_from(self.window.offset()).unwrap_or(usize::MAX);
        let count = self
            .window
            .count()
            .map_or(usize::MAX, |count| usize::try_from(count).unwrap_or(usize::MAX));
        rows.into_iter().skip(offset).take(count).collect()
    }
}

impl<R> Queryable for MemoryCollection<R>
where
    R: Record + Clone + Send + Sync,
{
    type Record = R;

    fn apply_scope(mut self, name: &str) -> Result<Self> {
        let scope = self
            .scopes
            .scopes
            .get(name)
            .cloned()
            .ok_or_else(|| SearchError::UnknownScope { name: name.to_string() })?;
        self.filters.push(match scope {
            ScopeDef::Closure(filter) => Filter::Record(filter),
            ScopeDef::Declarative(conditions) => Filter::Conditions(conditions),
        });
        self.applied_scopes.push(name.to_string());
        Ok(self)
    }

    fn eager_load(mut self, hints: &[String]) -> Result<Self> {
        if let Some(unknown) = hints.iter().find(|hint| !self.includes.contains(*hint)) {
            return Err(SearchError::UnknownInclude { name: unknown.clone() });
        }
        self.loaded_includes.extend(hints.iter().cloned());
        Ok(self)
    }

    fn order(mut self, clause: &OrderClause) -> Result<Self> {
        self.order = clause.clone();
        Ok(self)
    }

    fn limit(mut self, limit: u64) -> Self {
        self.window = Window::Limit { limit };
        self
    }

    fn page(mut self, page: u64, per_page: u64) -> Self {
        self.window = Window::Page { page, per_page };
        self
    }

    fn filter(mut self, predicate: &Predicate) -> Result<Self> {
        let conditions = predicate.conditions();
        for condition in conditions.iter().filter(|condition| condition.operator.takes_list()) {
            condition.list_operands()?;
        }
        self.filters.push(Filter::Conditions(conditions));
        Ok(self)
    }

    async fn load(self) -> Result<Vec<R>> {
        Ok(self.materialize())
    }
}

/// A condition holds when any of its known attributes matches. Conditions over
/// attributes the record does not expose are ignored.
fn holds<R: Record>(record: &R, condition: &Condition) -> bool {
    let values: Vec<Value> = condition
        .attributes
        .iter()
        .filter_map(|attribute| record.field(attribute))
        .collect();
    if values.is_empty() {
        return true;
    }
    values.iter().any(|value| matches_value(value, condition))
}

fn matches_value(value: &Value, condition: &Condition) -> bool {
    use FilterOperator as Op;

    let operand = condition.first_value();
    let operand = operand.as_deref();
    match condition.operator {
        Op::Eq => operand.is_some_and(|expected| equals(value, expected)),
        Op::NotEq => operand.is_some_and(|expected| !equals(value, expected)),
        Op::EqAny | Op::In => condition.values().iter().any(|expected| equals(value, expected)),
        Op::NotIn => !condition.values().iter().any(|expected| equals(value, expected)),
        Op::Cont | Op::ICont => operand.is_some_and(|needle| lower_text(value).contains(&needle.to_lowercase())),
        Op::NotCont => operand.is_some_and(|needle| !lower_text(value).contains(&needle.to_lowercase())),
        Op::ContAny => condition
            .values()
            .iter()
            .any(|needle| lower_text(value).contains(&needle.to_lowercase())),
        Op::Start => operand.is_some_and(|prefix| lower_text(value).starts_with(&prefix.to_lowercase())),
        Op::NotStart => operand.is_some_and(|prefix| !lower_text(value).starts_with(&prefix.to_lowercase())),
        Op::End => operand.is_some_and(|suffix| lower_text(value).ends_with(&suffix.to_lowercase())),
        Op::NotEnd => operand.is_some_and(|suffix| !lower_text(value).ends_with(&suffix.to_lowercase())),
        Op::Gt => operand.is_some_and(|bound| compare_operand(value, bound) == Some(Ordering::Greater)),
        Op::Gteq => operand.is_some_and(|bound| {
            matches!(compare_operand(value, bound), Some(Ordering::Greater | Ordering::Equal))
        }),
        Op::Lt => operand.is_some_and(|bound| compare_operand(value, bound) == Some(Ordering::Less)),
        Op::Lteq => operand.is_some_and(|bound| {
            matches!(compare_operand(value, bound), Some(Ordering::Less | Ordering::Equal))
        }),
        Op::Null => value.is_null() == condition.flag(),
        Op::NotNull => value.is_null() != condition.flag(),
        Op::Present => is_present(value) == condition.flag(),
        Op::Blank => is_present(value) != condition.flag(),
        Op::True => value == &Value::Bool(condition.flag()),
        Op::False => value == &Value::Bool(!condition.flag()),
    }
}

fn equals(value: &Value, expected: &str) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => ParamValue::from(expected).is_truthy() == *flag && is_boolean_text(expected),
        Value::Number(number) => numbers_equal(number, expected.trim()),
        Value::String(text) => text == expected,
        Value::Array(items) => items.iter().any(|item| equals(item, expected)),
        Value::Object(_) => false,
    }
}

/// Integers compare exactly; floats only when either side has a fractional part.
fn numbers_equal(number: &serde_json::Number, expected: &str) -> bool {
    if let Ok(expected) = expected.parse::<i64>() {
        if let Some(actual) = number.as_i64() {
            return actual == expected;
        }
        if number.is_u64() {
            return false;
        }
    }
    if let Ok(expected) = expected.parse::<u64>() {
        if let Some(actual) = number.as_u64() {
            return actual == expected;
        }
        if number.is_i64() {
            return false;
        }
    }
    match (number.as_f64(), expected.parse::<f64>()) {
        (Some(actual), Ok(expected)) => actual == expected,
        _ => false,
    }
}

fn is_boolean_text(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "true" | "false" | "t" | "f" | "1" | "0" | "yes" | "no" | "on" | "off"
    )
}

fn lower_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.to_lowercase(),
        Value::Null => String::new(),
        other => other.to_string().to_lowercase(),
    }
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(text) => !text.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}

/// Numbers compare numerically, strings lexically; anything else is incomparable.
fn compare_operand(value: &Value, operand: &str) -> Option<Ordering> {
    match value {
        Value::Number(number) => {
            let bound = operand.trim().parse::<f64>().ok()?;
            number.as_f64()?.partial_cmp(&bound)
        }
        Value::String(text) => Some(text.as_str().cmp(operand)),
        _ => None,
    }
}

fn compare_records<R: Record>(a: &R, b: &R, clause: &OrderClause) -> Ordering {
    for term in clause.terms() {
        let left = a.field(&term.field).unwrap_or(Value::Null);
        let right = b.field(&term.field).unwrap_or(Value::Null);
        let ordering = compare_values(&left, &right);
        let ordering = match term.order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Total order over JSON values: null, then booleans, numbers, strings, arrays and objects.
fn compare_values(left: &Value, right: &Value) -> Ordering {
    match (left, right) {
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => {
            let a = a.as_f64().unwrap_or(f64::NAN);
            let b = b.as_f64().unwrap_or(f64::NAN);
            a.total_cmp(&b)
        }
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Array(a), Value::Array(b)) => a.len().cmp(&b.len()),
        _ => type_rank(left).cmp(&type_rank(right)),
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::FilterParams;
    use crate::record::Document;
    use serde_json::json;

    fn articles() -> MemoryCollection<Document> {
        let rows = vec![
            json!({"id": 1, "title": "Rust in Action", "published": true, "views": 120, "author_id": 7}),
            json!({"id": 2, "title": "Async Rust", "published": false, "views": 40, "author_id": 8}),
            json!({"id": 3, "title": "Ruby Tricks", "published": true, "views": 75, "author_id": null}),
            json!({"id": 4, "title": "rusty tools", "published": true, "views": 5, "author_id": 7}),
        ];
        MemoryCollection::new(rows.into_iter().filter_map(Document::from_value).collect())
            .with_scopes(
                ScopeRegistry::new()
                    .scope("popular", |doc: &Document| {
                        doc.field("views").and_then(|v| v.as_u64()).is_some_and(|v| v >= 50)
                    })
                    .scope_params("published", [("published_true", "1")].into_iter().collect()),
            )
            .with_includes(["author"])
    }

    fn ids(rows: &[Document]) -> Vec<u64> {
        rows.iter()
            .filter_map(|doc| doc.field("id").and_then(|id| id.as_u64()))
            .collect()
    }

    fn predicate(pairs: &[(&str, &str)]) -> Predicate {
        let params: FilterParams = pairs.iter().copied().collect();
        match compile(&params) {
            Compiled::Filter(predicate) => predicate,
            Compiled::Empty => panic!("expected predicate"),
        }
    }

    async fn search(collection: MemoryCollection<Document>, pairs: &[(&str, &str)]) -> Vec<u64> {
        let rows = collection
            .filter(&predicate(pairs))
            .expect("filter")
            .order(&OrderClause::by("id", SortOrder::Asc))
            .expect("order")
            .load()
            .await
            .expect("load");
        ids(&rows)
    }

    #[tokio::test]
    async fn contains_is_case_insensitive() {
        assert_eq!(search(articles(), &[("title_cont", "rust")]).await, vec![1, 2, 4]);
        assert_eq!(search(articles(), &[("title_not_cont", "rust")]).await, vec![3]);
    }

    #[tokio::test]
    async fn numeric_and_boolean_comparisons() {
        assert_eq!(search(articles(), &[("views_gteq", "75")]).await, vec![1, 3]);
        assert_eq!(search(articles(), &[("views_lt", "40")]).await, vec![4]);
        assert_eq!(search(articles(), &[("published_eq", "false")]).await, vec![2]);
        assert_eq!(search(articles(), &[("author_id_eq", "7")]).await, vec![1, 4]);
    }

    #[tokio::test]
    async fn list_and_null_operators() {
        assert_eq!(search(articles(), &[("id_in", "2,3")]).await, vec![2, 3]);
        assert_eq!(search(articles(), &[("author_id_null", "1")]).await, vec![3]);
        assert_eq!(search(articles(), &[("author_id_not_null", "true")]).await, vec![1, 2, 4]);
    }

    #[tokio::test]
    async fn boolean_switches_negate_and_skip_nulls() {
        let rows = vec![
            json!({"id": 1, "published": true}),
            json!({"id": 2, "published": false}),
            json!({"id": 3, "published": null}),
        ];
        let collection = || MemoryCollection::new(rows.iter().cloned().filter_map(Document::from_value).collect());

        assert_eq!(search(collection(), &[("published_true", "1")]).await, vec![1]);
        assert_eq!(search(collection(), &[("published_true", "0")]).await, vec![2]);
        assert_eq!(search(collection(), &[("published_false", "1")]).await, vec![2]);
        assert_eq!(search(collection(), &[("published_false", "0")]).await, vec![1]);
    }

    #[tokio::test]
    async fn large_integer_ids_compare_exactly() {
        let rows = vec![
            json!({"id": 9007199254740992u64}),
            json!({"id": 9007199254740993u64}),
            json!({"id": -9007199254740993i64}),
            json!({"id": 2.5}),
        ];
        let collection = || MemoryCollection::new(rows.iter().cloned().filter_map(Document::from_value).collect());
        let matched = |rows: Vec<Document>| -> Vec<Value> { rows.iter().filter_map(|doc| doc.field("id")).collect() };

        let rows = collection()
            .filter(&predicate(&[("id_eq", "9007199254740993")]))
            .expect("filter")
            .load()
            .await
            .expect("load");
        assert_eq!(matched(rows), vec![json!(9007199254740993u64)]);

        let rows = collection()
            .filter(&predicate(&[("id_in", "-9007199254740993,2.5")]))
            .expect("filter")
            .load()
            .await
            .expect("load");
        assert_eq!(matched(rows), vec![json!(-9007199254740993i64), json!(2.5)]);
    }

    #[test]
    fn blank_list_operands_are_rejected() {
        for key in ["id_in", "id_not_in", "id_eq_any", "title_cont_any"] {
            let result = articles().filter(&predicate(&[(key, ",")]));
            assert!(
                matches!(result, Err(SearchError::InvalidRequest { .. })),
                "{key} was accepted"
            );
        }
    }

    #[tokio::test]
    async fn or_attributes_and_unknown_keys() {
        assert_eq!(search(articles(), &[("title_or_body_start", "ruby")]).await, vec![3]);
        assert_eq!(search(articles(), &[("term", "ignored"), ("id_eq", "1")]).await, vec![1]);
    }

    #[tokio::test]
    async fn scopes_restrictions_and_predicates_conjoin() {
        let collection = articles()
            .apply_scope("published")
            .expect("scope")
            .apply_scope("popular")
            .expect("scope")
            .restrict(|doc: &Document| doc.field("author_id") == Some(json!(7)));
        assert_eq!(collection.applied_scopes(), &["published".to_string(), "popular".to_string()]);
        assert_eq!(search(collection, &[("title_cont", "r")]).await, vec![1]);
    }

    #[tokio::test]
    async fn window_applies_after_filter_and_sort() {
        let rows = articles()
            .page(2, 2)
            .order(&OrderClause::by("views", SortOrder::Desc))
            .expect("order")
            .filter(&predicate(&[("published_true", "1")]))
            .expect("filter")
            .load()
            .await
            .expect("load");
        assert_eq!(ids(&rows), vec![4]);

        let rows = articles().page(9, 2).load().await.expect("load");
        assert!(rows.is_empty());

        let rows = articles()
            .order(&OrderClause::by("id", SortOrder::Desc))
            .expect("order")
            .limit(2)
            .load()
            .await
            .expect("load");
        assert_eq!(ids(&rows), vec![4, 3]);
    }

    #[test]
    fn unknown_scope_and_include_fail_fast() {
        assert!(matches!(
            articles().apply_scope("archived"),
            Err(SearchError::UnknownScope { .. })
        ));
        assert!(matches!(
            articles().eager_load(&["comments".to_string()]),
            Err(SearchError::UnknownInclude { .. })
        ));
        let loaded = articles().eager_load(&["author".to_string()]).expect("known include");
        assert_eq!(loaded.loaded_includes(), &["author".to_string()]);
    }
}

//! Cleaned filter parameters and the predicate compiled from them.
//!
//! The predicate is deliberately thin: it carries the cleaned key/value map unchanged
//! and leaves operator interpretation to the collection. [`grammar`] holds the
//! shared key grammar collections use for that interpretation.

pub mod grammar;

use serde::Serialize;

use crate::params::{ParamValue, Params};

pub use grammar::{Condition, FilterOperator};

/// Filter input that survived normalization, keyed by predicate key.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FilterParams(Params);

impl FilterParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Option<ParamValue> {
        self.0.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<ParamValue> {
        self.0.remove(key)
    }

    pub fn retain(&mut self, keep: impl FnMut(&String, &mut ParamValue) -> bool) {
        self.0.retain(keep);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.0.iter()
    }

    pub fn as_params(&self) -> &Params {
        &self.0
    }
}

impl From<Params> for FilterParams {
    fn from(params: Params) -> Self {
        Self(params)
    }
}

impl<K: Into<String>, V: Into<ParamValue>> FromIterator<(K, V)> for FilterParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Conjunction of every cleaned filter entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Predicate {
    params: FilterParams,
}

impl Predicate {
    pub fn params(&self) -> &FilterParams {
        &self.params
    }

    /// Entries that parse as conditions, in key order. Other keys are skipped.
    pub fn conditions(&self) -> Vec<Condition> {
        self.params
            .iter()
            .filter_map(|(key, value)| {
                let parsed = Condition::parse(key, value);
                if parsed.is_none() {
                    log::debug!("ignoring filter key without a known operator: {key}");
                }
                parsed
            })
            .collect()
    }
}

/// Outcome of predicate compilation.
#[derive(Debug, Clone, PartialEq)]
pub enum Compiled {
    /// Nothing to filter on: the search must return no rows without touching storage.
    Empty,
    Filter(Predicate),
}

impl Compiled {
    pub fn is_empty(&self) -> bool {
        matches!(self, Compiled::Empty)
    }
}

pub fn compile(params: &FilterParams) -> Compiled {
    if params.is_empty() {
        Compiled::Empty
    } else {
        Compiled::Filter(Predicate { params: params.clone() })
    }
}

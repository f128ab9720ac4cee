//! Ordering clauses and the result window (limit or page).

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::SearchError;

static FIELD_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$").expect("valid field regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderTerm {
    pub field: String,
    pub order: SortOrder,
}

impl OrderTerm {
    pub fn new(field: impl Into<String>, order: SortOrder) -> Self {
        Self {
            field: field.into(),
            order,
        }
    }
}

/// Validated `ORDER BY`-style clause, e.g. `"published_at desc, id"`.
///
/// An empty clause means "leave the collection's natural order alone".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OrderClause {
    terms: Vec<OrderTerm>,
}

impl OrderClause {
    pub fn new(terms: impl IntoIterator<Item = OrderTerm>) -> Self {
        Self {
            terms: terms.into_iter().collect(),
        }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn by(field: impl Into<String>, order: SortOrder) -> Self {
        Self::new([OrderTerm::new(field, order)])
    }

    pub fn terms(&self) -> &[OrderTerm] {
        &self.terms
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

impl FromStr for OrderClause {
    type Err = SearchError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let mut terms = Vec::new();
        for part in raw.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }

            let mut tokens = part.split_whitespace();
            let field = tokens.next().unwrap_or_default();
            if !FIELD_NAME.is_match(field) {
                return Err(SearchError::config(format!("invalid order field '{field}' in '{raw}'")));
            }

            let order = match tokens.next().map(str::to_ascii_lowercase).as_deref() {
                None | Some("asc") => SortOrder::Asc,
                Some("desc") => SortOrder::Desc,
                Some(other) => {
                    return Err(SearchError::config(format!(
                        "invalid sort direction '{other}' in order clause '{raw}'"
                    )));
                }
            };

            if tokens.next().is_some() {
                return Err(SearchError::config(format!("malformed order clause '{raw}'")));
            }
            terms.push(OrderTerm::new(field, order));
        }
        Ok(Self { terms })
    }
}

impl fmt::Display for OrderClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, term) in self.terms.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} {}", term.field, term.order.as_str().to_ascii_lowercase())?;
        }
        Ok(())
    }
}

impl Serialize for OrderClause {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for OrderClause {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Which slice of the ordered result a search returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Window {
    /// Hard cap on the number of rows, ignoring any paging input.
    Limit { limit: u64 },
    /// 1-based page of `per_page` rows.
    Page { page: u64, per_page: u64 },
    Unbounded,
}

impl Window {
    /// A configured limit always wins; pagination applies only when it is not skipped.
    pub fn select(limit: Option<u64>, skip_pagination: bool, page: u64, per_page: u64) -> Self {
        match limit {
            Some(limit) => Window::Limit { limit },
            None if skip_pagination => Window::Unbounded,
            None => Window::Page {
                page: page.max(1),
                per_page,
            },
        }
    }

    #[inline]
    pub fn offset(&self) -> u64 {
        match self {
            Window::Page { page, per_page } => page.saturating_sub(1).saturating_mul(*per_page),
            Window::Limit { .. } | Window::Unbounded => 0,
        }
    }

    /// Maximum number of rows, `None` when unbounded.
    #[inline]
    pub fn count(&self) -> Option<u64> {
        match self {
            Window::Limit { limit } => Some(*limit),
            Window::Page { per_page, .. } => Some(*per_page),
            Window::Unbounded => None,
        }
    }
}

//! Request parameters as they arrive from the host.
//!
//! Values follow the shape of Rails-style query strings: scalars, arrays (`ids[]=1&ids[]=2`)
//! and nested groups (`q[title_cont]=rust`). Typed hosts can also build them directly,
//! which is how booleans and numbers end up in the map.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Ordered parameter map. Ordering keeps predicates and serialized plans deterministic.
pub type Params = BTreeMap<String, ParamValue>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
    List(Vec<ParamValue>),
    Group(Params),
}

impl ParamValue {
    /// Blank means "carries no filter input": null, whitespace-only text, empty list or group.
    ///
    /// Booleans are never blank, so an explicit `false` is a real filter value.
    pub fn is_blank(&self) -> bool {
        match self {
            ParamValue::Null => true,
            ParamValue::Bool(_) | ParamValue::Number(_) => false,
            ParamValue::Text(text) => text.trim().is_empty(),
            ParamValue::List(items) => items.is_empty(),
            ParamValue::Group(group) => group.is_empty(),
        }
    }

    /// Whether a filter cleaner should drop this value.
    ///
    /// Arrays are dropped only when every element is droppable; an empty array qualifies.
    pub fn is_droppable(&self) -> bool {
        match self {
            ParamValue::Bool(false) => false,
            ParamValue::List(items) => items.iter().all(ParamValue::is_droppable),
            other => other.is_blank(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn as_group(&self) -> Option<&Params> {
        match self {
            ParamValue::Group(group) => Some(group),
            _ => None,
        }
    }

    /// Interpret a flag the way form posts and query strings send them.
    pub fn is_truthy(&self) -> bool {
        match self {
            ParamValue::Bool(flag) => *flag,
            ParamValue::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
            ParamValue::Text(text) => matches!(
                text.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "t" | "yes" | "on"
            ),
            ParamValue::Null | ParamValue::List(_) | ParamValue::Group(_) => false,
        }
    }

    /// Positive integer reading used for paging parameters; anything else is `None`.
    pub fn as_positive_u64(&self) -> Option<u64> {
        let parsed = match self {
            ParamValue::Number(number) => number.as_u64(),
            ParamValue::Text(text) => text.trim().parse::<u64>().ok(),
            _ => None,
        }?;
        (parsed > 0).then_some(parsed)
    }

    /// Flatten into string values, the form comparisons and query builders consume.
    pub fn to_strings(&self) -> Vec<String> {
        match self {
            ParamValue::Null => Vec::new(),
            ParamValue::List(items) => items.iter().flat_map(ParamValue::to_strings).collect(),
            other => vec![other.to_string()],
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            ParamValue::Null => JsonValue::Null,
            ParamValue::Bool(flag) => JsonValue::Bool(*flag),
            ParamValue::Number(number) => JsonValue::Number(number.clone()),
            ParamValue::Text(text) => JsonValue::String(text.clone()),
            ParamValue::List(items) => JsonValue::Array(items.iter().map(ParamValue::to_json).collect()),
            ParamValue::Group(group) => JsonValue::Object(
                group
                    .iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Null => Ok(()),
            ParamValue::Bool(flag) => write!(f, "{flag}"),
            ParamValue::Number(number) => write!(f, "{number}"),
            ParamValue::Text(text) => f.write_str(text),
            ParamValue::List(_) | ParamValue::Group(_) => write!(f, "{}", self.to_json()),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Number(value.into())
    }
}

impl From<u64> for ParamValue {
    fn from(value: u64) -> Self {
        ParamValue::Number(value.into())
    }
}

impl<T: Into<ParamValue>> From<Vec<T>> for ParamValue {
    fn from(values: Vec<T>) -> Self {
        ParamValue::List(values.into_iter().map(Into::into).collect())
    }
}

impl From<Params> for ParamValue {
    fn from(group: Params) -> Self {
        ParamValue::Group(group)
    }
}

/// The acting identity authorizers receive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    #[serde(default)]
    pub roles: BTreeSet<String>,
}

impl Principal {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            roles: BTreeSet::new(),
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into());
        self
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

/// Incoming search request: parameters plus who is asking.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRequest {
    params: Params,
    principal: Option<Principal>,
}

impl RawRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_params(params: Params) -> Self {
        Self {
            params,
            principal: None,
        }
    }

    /// Parse a query string using bracket conventions for arrays and nested groups.
    ///
    /// ```
    /// use searchpoint::params::{ParamValue, RawRequest};
    ///
    /// let request = RawRequest::from_query_string("q[title_cont]=rust&ids[]=1&ids[]=2&term=ab");
    /// let q = request.get("q").and_then(ParamValue::as_group).unwrap();
    /// assert_eq!(q.get("title_cont"), Some(&ParamValue::from("rust")));
    /// assert_eq!(request.get("ids"), Some(&ParamValue::from(vec!["1", "2"])));
    /// ```
    pub fn from_query_string(query: &str) -> Self {
        let query = query.trim().trim_start_matches('?');
        let mut params = Params::new();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            if key.is_empty() {
                continue;
            }
            let segments = split_key(&key);
            insert_path(&mut params, &segments, value.into_owned());
        }
        Self::from_params(params)
    }

    #[inline]
    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.principal = Some(principal);
        self
    }

    #[inline]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.params.get(key)
    }

    /// Remove and return a parameter; control parameters are consumed this way.
    pub fn take(&mut self, key: &str) -> Option<ParamValue> {
        self.params.remove(key)
    }

    pub fn into_parts(self) -> (Params, Option<Principal>) {
        (self.params, self.principal)
    }
}

/// `a[b][]` -> `["a", "b", ""]`. Keys with unbalanced brackets are taken literally.
fn split_key(key: &str) -> Vec<String> {
    let Some(open) = key.find('[') else {
        return vec![key.to_string()];
    };
    if open == 0 {
        return vec![key.to_string()];
    }

    let mut segments = vec![key[..open].to_string()];
    let mut rest = &key[open..];
    while !rest.is_empty() {
        let Some(stripped) = rest.strip_prefix('[') else {
            return vec![key.to_string()];
        };
        let Some(close) = stripped.find(']') else {
            return vec![key.to_string()];
        };
        segments.push(stripped[..close].to_string());
        rest = &stripped[close + 1..];
    }
    segments
}

fn insert_path(target: &mut Params, segments: &[String], value: String) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };

    match rest.split_first() {
        None => {
            target.insert(head.clone(), ParamValue::Text(value));
        }
        Some((next, tail)) if next.is_empty() => {
            let entry = target.entry(head.clone()).or_insert_with(|| ParamValue::List(Vec::new()));
            if !matches!(entry, ParamValue::List(_)) {
                *entry = ParamValue::List(Vec::new());
            }
            if let ParamValue::List(items) = entry {
                if tail.is_empty() {
                    items.push(ParamValue::Text(value));
                } else {
                    let mut group = Params::new();
                    insert_path(&mut group, tail, value);
                    items.push(ParamValue::Group(group));
                }
            }
        }
        Some(_) => {
            let entry = target.entry(head.clone()).or_insert_with(|| ParamValue::Group(Params::new()));
            if !matches!(entry, ParamValue::Group(_)) {
                *entry = ParamValue::Group(Params::new());
            }
            if let ParamValue::Group(group) = entry {
                insert_path(group, rest, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_values() {
        assert!(ParamValue::Null.is_blank());
        assert!(ParamValue::from("  ").is_blank());
        assert!(ParamValue::List(Vec::new()).is_blank());
        assert!(ParamValue::Group(Params::new()).is_blank());
        assert!(!ParamValue::Bool(false).is_blank());
        assert!(!ParamValue::from("x").is_blank());
    }

    #[test]
    fn false_is_never_droppable() {
        assert!(!ParamValue::Bool(false).is_droppable());
        assert!(!ParamValue::from(vec![false]).is_droppable());
        assert!(ParamValue::from(vec!["", " "]).is_droppable());
        assert!(ParamValue::from(Vec::<String>::new()).is_droppable());
        assert!(!ParamValue::from(vec!["", "x"]).is_droppable());
    }

    #[test]
    fn parses_nested_query_strings() {
        let request = RawRequest::from_query_string("?q[author][name_eq]=Ann&tags[]=a&tags[]=b&page=2&term=");
        let q = request.get("q").and_then(ParamValue::as_group).expect("q group");
        let author = q.get("author").and_then(ParamValue::as_group).expect("author group");
        assert_eq!(author.get("name_eq"), Some(&ParamValue::from("Ann")));
        assert_eq!(request.get("tags"), Some(&ParamValue::from(vec!["a", "b"])));
        assert_eq!(request.get("page"), Some(&ParamValue::from("2")));
        assert_eq!(request.get("term"), Some(&ParamValue::from("")));
    }

    #[test]
    fn malformed_bracket_keys_are_literal() {
        let request = RawRequest::from_query_string("a[b=1&[x]=2");
        assert_eq!(request.get("a[b"), Some(&ParamValue::from("1")));
        assert_eq!(request.get("[x]"), Some(&ParamValue::from("2")));
    }

    #[test]
    fn decodes_percent_and_plus() {
        let request = RawRequest::from_query_string("term=Smith+Co%2C+Ltd");
        assert_eq!(request.get("term"), Some(&ParamValue::from("Smith Co, Ltd")));
    }

    #[test]
    fn truthy_flags() {
        assert!(ParamValue::from("true").is_truthy());
        assert!(ParamValue::from("1").is_truthy());
        assert!(ParamValue::Bool(true).is_truthy());
        assert!(!ParamValue::from("false").is_truthy());
        assert!(!ParamValue::from("").is_truthy());
    }

    #[test]
    fn paging_numbers() {
        assert_eq!(ParamValue::from("3").as_positive_u64(), Some(3));
        assert_eq!(ParamValue::from("0").as_positive_u64(), None);
        assert_eq!(ParamValue::from("abc").as_positive_u64(), None);
        assert_eq!(ParamValue::from(7_u64).as_positive_u64(), Some(7));
    }

    #[test]
    fn take_removes_the_parameter() {
        let mut request = RawRequest::new().with_param("scope", "published");
        assert_eq!(request.take("scope"), Some(ParamValue::from("published")));
        assert!(request.get("scope").is_none());
    }
}

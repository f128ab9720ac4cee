//! Predicate-key grammar shared by every collection implementation.
//!
//! A filter key reads `<attribute>[_or_<attribute>...]_<operator>`:
//!
//! | Key                     | Attributes        | Operator  |
//! |-------------------------|-------------------|-----------|
//! | `title_cont`            | `title`           | `Cont`    |
//! | `id_eq`                 | `id`              | `Eq`      |
//! | `name_or_email_i_cont`  | `name`, `email`   | `ICont`   |
//! | `published_at_not_null` | `published_at`    | `NotNull` |
//! | `author_id_in`          | `author_id`       | `In`      |
//!
//! Keys that do not end in a known operator are not conditions at all.

use serde::Serialize;

use crate::errors::{Result, SearchError};
use crate::params::ParamValue;

const ATTRIBUTE_SEPARATOR: &str = "_or_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    Eq,
    NotEq,
    EqAny,
    In,
    NotIn,
    Cont,
    NotCont,
    ICont,
    ContAny,
    Start,
    NotStart,
    End,
    NotEnd,
    Gt,
    Gteq,
    Lt,
    Lteq,
    Null,
    NotNull,
    Present,
    Blank,
    True,
    False,
}

impl FilterOperator {
    /// Longest suffixes first so `not_eq` is never read as `eq`.
    const BY_SUFFIX_LENGTH: [FilterOperator; 23] = [
        FilterOperator::NotStart,
        FilterOperator::NotCont,
        FilterOperator::NotNull,
        FilterOperator::ContAny,
        FilterOperator::Present,
        FilterOperator::NotEnd,
        FilterOperator::NotIn,
        FilterOperator::NotEq,
        FilterOperator::ICont,
        FilterOperator::EqAny,
        FilterOperator::Start,
        FilterOperator::Blank,
        FilterOperator::False,
        FilterOperator::Gteq,
        FilterOperator::Lteq,
        FilterOperator::Cont,
        FilterOperator::Null,
        FilterOperator::True,
        FilterOperator::End,
        FilterOperator::Eq,
        FilterOperator::In,
        FilterOperator::Gt,
        FilterOperator::Lt,
    ];

    pub const fn suffix(self) -> &'static str {
        match self {
            FilterOperator::Eq => "eq",
            FilterOperator::NotEq => "not_eq",
            FilterOperator::EqAny => "eq_any",
            FilterOperator::In => "in",
            FilterOperator::NotIn => "not_in",
            FilterOperator::Cont => "cont",
            FilterOperator::NotCont => "not_cont",
            FilterOperator::ICont => "i_cont",
            FilterOperator::ContAny => "cont_any",
            FilterOperator::Start => "start",
            FilterOperator::NotStart => "not_start",
            FilterOperator::End => "end",
            FilterOperator::NotEnd => "not_end",
            FilterOperator::Gt => "gt",
            FilterOperator::Gteq => "gteq",
            FilterOperator::Lt => "lt",
            FilterOperator::Lteq => "lteq",
            FilterOperator::Null => "null",
            FilterOperator::NotNull => "not_null",
            FilterOperator::Present => "present",
            FilterOperator::Blank => "blank",
            FilterOperator::True => "true",
            FilterOperator::False => "false",
        }
    }

    /// Operators whose value is a set of alternatives rather than one operand.
    pub const fn takes_list(self) -> bool {
        matches!(
            self,
            FilterOperator::EqAny | FilterOperator::In | FilterOperator::NotIn | FilterOperator::ContAny
        )
    }

    /// Operators whose value is only a switch (`published_true=1`).
    pub const fn is_flag(self) -> bool {
        matches!(
            self,
            FilterOperator::Null
                | FilterOperator::NotNull
                | FilterOperator::Present
                | FilterOperator::Blank
                | FilterOperator::True
                | FilterOperator::False
        )
    }
}

/// One parsed filter entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Condition {
    /// Alternatives joined by `_or_`; the condition holds when any attribute matches.
    pub attributes: Vec<String>,
    pub operator: FilterOperator,
    pub value: ParamValue,
}

impl Condition {
    pub fn parse(key: &str, value: &ParamValue) -> Option<Self> {
        for operator in FilterOperator::BY_SUFFIX_LENGTH {
            let Some(head) = key
                .strip_suffix(operator.suffix())
                .and_then(|rest| rest.strip_suffix('_'))
            else {
                continue;
            };
            if head.is_empty() {
                continue;
            }

            let attributes: Vec<String> = head.split(ATTRIBUTE_SEPARATOR).map(str::to_string).collect();
            if attributes.iter().any(String::is_empty) {
                return None;
            }

            return Some(Self {
                attributes,
                operator,
                value: value.clone(),
            });
        }
        None
    }

    /// Operand strings; list operators also split comma-separated text.
    pub fn values(&self) -> Vec<String> {
        let values = self.value.to_strings();
        if self.operator.takes_list() && matches!(self.value, ParamValue::Text(_)) {
            return values
                .iter()
                .flat_map(|value| value.split(','))
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
                .collect();
        }
        values
    }

    /// Operands of a list operator; an empty set is rejected.
    pub fn list_operands(&self) -> Result<Vec<String>> {
        let values = self.values();
        if values.is_empty() {
            return Err(SearchError::invalid_request(format!(
                "filter '{}_{}' needs at least one value",
                self.attributes.join(ATTRIBUTE_SEPARATOR),
                self.operator.suffix()
            )));
        }
        Ok(values)
    }

    /// First operand, used by scalar operators.
    pub fn first_value(&self) -> Option<String> {
        self.values().into_iter().next()
    }

    /// Switch value for flag operators; a false switch negates the operator.
    pub fn flag(&self) -> bool {
        match &self.value {
            ParamValue::List(items) => items.iter().any(ParamValue::is_truthy),
            other => other.is_truthy(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(key: &str) -> Option<Condition> {
        Condition::parse(key, &ParamValue::from("x"))
    }

    #[test]
    fn longest_suffix_wins() {
        assert_eq!(parse("title_not_eq").map(|c| c.operator), Some(FilterOperator::NotEq));
        assert_eq!(parse("title_eq").map(|c| c.operator), Some(FilterOperator::Eq));
        assert_eq!(parse("count_gteq").map(|c| c.operator), Some(FilterOperator::Gteq));
        assert_eq!(parse("name_i_cont").map(|c| c.operator), Some(FilterOperator::ICont));
        assert_eq!(parse("published_at_not_null").map(|c| c.operator), Some(FilterOperator::NotNull));
    }

    #[test]
    fn attribute_names_keep_underscores() {
        let condition = parse("author_id_in").expect("condition");
        assert_eq!(condition.attributes, vec!["author_id".to_string()]);
        assert_eq!(condition.operator, FilterOperator::In);
    }

    #[test]
    fn or_joins_alternative_attributes() {
        let condition = parse("name_or_email_cont").expect("condition");
        assert_eq!(condition.attributes, vec!["name".to_string(), "email".to_string()]);
    }

    #[test]
    fn keys_without_operator_are_not_conditions() {
        assert!(parse("term").is_none());
        assert!(parse("_eq").is_none());
        assert!(parse("eq").is_none());
        assert!(parse("name_or__cont").is_none());
    }

    #[test]
    fn list_operators_split_text() {
        let condition = Condition::parse("id_in", &ParamValue::from("1, 2,3")).expect("condition");
        assert_eq!(condition.values(), vec!["1", "2", "3"]);

        let listed = Condition::parse("id_in", &ParamValue::from(vec!["4", "5"])).expect("condition");
        assert_eq!(listed.values(), vec!["4", "5"]);
    }

    #[test]
    fn list_operators_reject_blank_sets() {
        let condition = Condition::parse("status_in", &ParamValue::from(" , ")).expect("condition");
        assert!(condition.values().is_empty());
        let err = condition.list_operands().unwrap_err();
        assert!(matches!(err, SearchError::InvalidRequest { .. }), "{err:?}");
        assert!(err.to_string().contains("status_in"));
    }

    #[test]
    fn flags_follow_truthiness() {
        assert!(Condition::parse("published_true", &ParamValue::from("1")).expect("c").flag());
        assert!(!Condition::parse("published_true", &ParamValue::from("0")).expect("c").flag());
    }
}

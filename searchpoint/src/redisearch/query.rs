//! # RediSearch query clauses and escaping
//!
//! | Function                          | Input           | Output           | Use Case                  |
//! |-----------------------------------|-----------------|------------------|---------------------------|
//! | `escape_for_tag_query(value)`     | `"test-user"`   | `"test\-user"`   | TAG field: `@field:{...}` |
//! | `escape_for_text_prefix(value)`   | `"cli-kv/data"` | `"cli kv data*"` | `*_start` on TEXT fields  |
//! | `escape_for_text_contains(value)` | `"hello"`       | `"*hello*"`      | `*_cont` on TEXT fields   |
//! | `escape_for_text_exact(value)`    | `"John Doe"`    | `"\"John Doe\""` | `*_eq` on TEXT fields     |
//!
//! TAG fields match exactly and need `$ { } \ | - .` escaped. TEXT fields are tokenized
//! on `-` and `/` at index time, so prefix queries tokenize the same way.

use crate::errors::{Result, SearchError};
use crate::filters::{Condition, FilterOperator};

use super::index::{IndexFieldType, IndexSchema};

pub(crate) const TAG_SEPARATOR: &str = "|";

/// One end of a numeric range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumericBound {
    Unbounded,
    Inclusive(f64),
    Exclusive(f64),
}

impl NumericBound {
    fn render(self, infinity: &str) -> String {
        match self {
            NumericBound::Unbounded => infinity.to_string(),
            NumericBound::Inclusive(value) => format_numeric(value),
            NumericBound::Exclusive(value) => format!("({}", format_numeric(value)),
        }
    }
}

/// A composable RediSearch filter condition.
///
/// ```
/// use searchpoint::redisearch::FilterCondition;
///
/// let visible = FilterCondition::or([
///     FilterCondition::bool_eq("private", false),
///     FilterCondition::tag_eq("owner", "user-1"),
/// ]);
/// assert_eq!(visible.to_query_clause(), "((@private:{false})|(@owner:{user\\-1}))");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum FilterCondition {
    TagEquals { field: String, values: Vec<String> },
    NumericRange { field: String, min: NumericBound, max: NumericBound },
    BooleanEquals { field: String, value: bool },
    TextPrefix { field: String, value: String },
    TextContains { field: String, value: String },
    TextExact { field: String, value: String },
    And(Vec<FilterCondition>),
    Or(Vec<FilterCondition>),
    Not(Box<FilterCondition>),
}

impl FilterCondition {
    #[inline]
    pub fn tag_eq(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::TagEquals {
            field: field.into(),
            values: vec![value.into()],
        }
    }

    /// Matches any of `values`.
    #[inline]
    pub fn tag_in<S: Into<String>>(field: impl Into<String>, values: impl IntoIterator<Item = S>) -> Self {
        Self::TagEquals {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    #[inline]
    pub fn bool_eq(field: impl Into<String>, value: bool) -> Self {
        Self::BooleanEquals {
            field: field.into(),
            value,
        }
    }

    #[inline]
    pub fn numeric_range(field: impl Into<String>, min: NumericBound, max: NumericBound) -> Self {
        Self::NumericRange {
            field: field.into(),
            min,
            max,
        }
    }

    #[inline]
    pub fn numeric_eq(field: impl Into<String>, value: f64) -> Self {
        Self::numeric_range(field, NumericBound::Inclusive(value), NumericBound::Inclusive(value))
    }

    #[inline]
    pub fn text_prefix(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::TextPrefix {
            field: field.into(),
            value: value.into(),
        }
    }

    #[inline]
    pub fn text_contains(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::TextContains {
            field: field.into(),
            value: value.into(),
        }
    }

    #[inline]
    pub fn text_exact(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::TextExact {
            field: field.into(),
            value: value.into(),
        }
    }

    #[inline]
    pub fn and(conditions: impl IntoIterator<Item = FilterCondition>) -> Self {
        Self::And(conditions.into_iter().collect())
    }

    #[inline]
    pub fn or(conditions: impl IntoIterator<Item = FilterCondition>) -> Self {
        Self::Or(conditions.into_iter().collect())
    }

    #[inline]
    pub fn negate(condition: FilterCondition) -> Self {
        Self::Not(Box::new(condition))
    }

    pub fn to_query_clause(&self) -> String {
        match self {
            Self::TagEquals { field, values } => {
                let escaped: Vec<String> = values.iter().map(|v| escape_for_tag_query(v)).collect();
                format!("(@{}:{{{}}})", field, escaped.join(TAG_SEPARATOR))
            }
            Self::NumericRange { field, min, max } => {
                format!("(@{}:[{} {}])", field, min.render("-inf"), max.render("+inf"))
            }
            Self::BooleanEquals { field, value } => format!("(@{}:{{{}}})", field, value),
            Self::TextPrefix { field, value } => format!("(@{}:{})", field, escape_for_text_prefix(value)),
            Self::TextContains { field, value } => format!("(@{}:{})", field, escape_for_text_contains(value)),
            Self::TextExact { field, value } => format!("(@{}:{})", field, escape_for_text_exact(value)),
            Self::And(conditions) => join_clauses(conditions, " "),
            Self::Or(conditions) => join_clauses(conditions, "|"),
            Self::Not(condition) => {
                let clause = condition.to_query_clause();
                if clause.is_empty() {
                    String::new()
                } else {
                    format!("-{clause}")
                }
            }
        }
    }
}

fn join_clauses(conditions: &[FilterCondition], separator: &str) -> String {
    let clauses: Vec<String> = conditions
        .iter()
        .map(FilterCondition::to_query_clause)
        .filter(|clause| !clause.is_empty())
        .collect();
    match clauses.len() {
        0 => String::new(),
        1 => clauses.into_iter().next().unwrap_or_default(),
        _ => format!("({})", clauses.join(separator)),
    }
}

/// Translate a parsed filter key into a RediSearch condition using the index schema.
///
/// Attributes missing from the schema are skipped; `Ok(None)` means the whole condition
/// is ignored. Operators the field type cannot express are [`SearchError::InvalidRequest`].
pub fn condition_for(schema: &IndexSchema, condition: &Condition) -> Result<Option<FilterCondition>> {
    let mut leaves = Vec::new();
    for attribute in &condition.attributes {
        let Some(field) = schema.find_field(attribute) else {
            log::debug!("ignoring filter on unindexed attribute {attribute}");
            continue;
        };
        leaves.push(leaf(&field.name, field.field_type, condition)?);
    }

    Ok(match leaves.len() {
        0 => None,
        1 => leaves.pop(),
        _ => Some(FilterCondition::Or(leaves)),
    })
}

fn leaf(field: &str, field_type: IndexFieldType, condition: &Condition) -> Result<FilterCondition> {
    use FilterOperator as Op;

    let operand = || {
        condition
            .first_value()
            .ok_or_else(|| SearchError::invalid_request(format!("filter on '{field}' needs a value")))
    };
    let operands = || condition.list_operands();

    let built = match (field_type, condition.operator) {
        (IndexFieldType::Tag, Op::Eq) => FilterCondition::tag_eq(field, operand()?),
        (IndexFieldType::Tag, Op::NotEq) => FilterCondition::negate(FilterCondition::tag_eq(field, operand()?)),
        (IndexFieldType::Tag, Op::EqAny | Op::In) => FilterCondition::tag_in(field, operands()?),
        (IndexFieldType::Tag, Op::NotIn) => FilterCondition::negate(FilterCondition::tag_in(field, operands()?)),
        (IndexFieldType::Tag, Op::True) => FilterCondition::bool_eq(field, condition.flag()),
        (IndexFieldType::Tag, Op::False) => FilterCondition::bool_eq(field, !condition.flag()),

        (IndexFieldType::Numeric, Op::Eq) => FilterCondition::numeric_eq(field, number(field, &operand()?)?),
        (IndexFieldType::Numeric, Op::NotEq) => {
            FilterCondition::negate(FilterCondition::numeric_eq(field, number(field, &operand()?)?))
        }
        (IndexFieldType::Numeric, Op::EqAny | Op::In | Op::NotIn) => {
            let any = operands()?
                .iter()
                .map(|value| -> Result<FilterCondition> { Ok(FilterCondition::numeric_eq(field, number(field, value)?)) })
                .collect::<Result<Vec<_>>>()?;
            if condition.operator == Op::NotIn {
                FilterCondition::negate(FilterCondition::Or(any))
            } else {
                FilterCondition::Or(any)
            }
        }
        (IndexFieldType::Numeric, Op::Gt) => FilterCondition::numeric_range(
            field,
            NumericBound::Exclusive(number(field, &operand()?)?),
            NumericBound::Unbounded,
        ),
        (IndexFieldType::Numeric, Op::Gteq) => FilterCondition::numeric_range(
            field,
            NumericBound::Inclusive(number(field, &operand()?)?),
            NumericBound::Unbounded,
        ),
        (IndexFieldType::Numeric, Op::Lt) => FilterCondition::numeric_range(
            field,
            NumericBound::Unbounded,
            NumericBound::Exclusive(number(field, &operand()?)?),
        ),
        (IndexFieldType::Numeric, Op::Lteq) => FilterCondition::numeric_range(
            field,
            NumericBound::Unbounded,
            NumericBound::Inclusive(number(field, &operand()?)?),
        ),

        (IndexFieldType::Text, Op::Eq) => FilterCondition::text_exact(field, operand()?),
        (IndexFieldType::Text, Op::NotEq) => FilterCondition::negate(FilterCondition::text_exact(field, operand()?)),
        (IndexFieldType::Text, Op::Cont | Op::ICont) => FilterCondition::text_contains(field, operand()?),
        (IndexFieldType::Text, Op::NotCont) => {
            FilterCondition::negate(FilterCondition::text_contains(field, operand()?))
        }
        (IndexFieldType::Text, Op::ContAny) => FilterCondition::or(
            operands()?
                .into_iter()
                .map(|value| FilterCondition::text_contains(field, value)),
        ),
        (IndexFieldType::Text, Op::Start) => FilterCondition::text_prefix(field, operand()?),
        (IndexFieldType::Text, Op::NotStart) => {
            FilterCondition::negate(FilterCondition::text_prefix(field, operand()?))
        }

        (field_type, operator) => {
            return Err(SearchError::invalid_request(format!(
                "operator '{}' is not supported on {field_type:?} field '{field}'",
                operator.suffix()
            )));
        }
    };
    Ok(built)
}

fn number(field: &str, raw: &str) -> Result<f64> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| SearchError::invalid_request(format!("'{raw}' is not a number for field '{field}'")))
}

/// Escape a value for TAG field queries.
///
/// ```
/// use searchpoint::redisearch::escape_for_tag_query;
///
/// assert_eq!(escape_for_tag_query("active"), "active");
/// assert_eq!(escape_for_tag_query("New York"), "New York");
/// assert_eq!(escape_for_tag_query("test-user|admin"), "test\\-user\\|admin");
/// assert_eq!(escape_for_tag_query("{$1.5}"), "\\{\\$1\\.5\\}");
/// ```
pub fn escape_for_tag_query(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            // '.' is the JSON path separator, '-' the NOT operator
            '$' | '{' | '}' | '\\' | '|' | '.' | '-' => {
                escaped.push('\\');
                escaped.push(ch);
            }
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Tokenize on `-` and `/`, escape each token and wildcard the last one.
///
/// ```
/// use searchpoint::redisearch::escape_for_text_prefix;
///
/// assert_eq!(escape_for_text_prefix("config"), "config*");
/// assert_eq!(escape_for_text_prefix("cli-kv/data"), "cli kv data*");
/// assert_eq!(escape_for_text_prefix("config/db/"), "config db*");
/// assert_eq!(escape_for_text_prefix("user:name"), "user\\:name*");
/// ```
pub fn escape_for_text_prefix(value: &str) -> String {
    let tokens: Vec<&str> = value.split(['-', '/']).filter(|s| !s.is_empty()).collect();
    let Some((last, head)) = tokens.split_last() else {
        return "*".to_string();
    };

    let mut parts: Vec<String> = head.iter().map(|token| escape_text_token(token)).collect();
    parts.push(format!("{}*", escape_text_token(last)));
    parts.join(" ")
}

/// ```
/// use searchpoint::redisearch::escape_for_text_contains;
///
/// assert_eq!(escape_for_text_contains("hello"), "*hello*");
/// assert_eq!(escape_for_text_contains("name@domain"), "*name\\@domain*");
/// assert_eq!(escape_for_text_contains("50%"), "*50\\%*");
/// ```
pub fn escape_for_text_contains(value: &str) -> String {
    format!("*{}*", escape_text_value(value))
}

/// Quote a phrase for exact matching.
///
/// ```
/// use searchpoint::redisearch::escape_for_text_exact;
///
/// assert_eq!(escape_for_text_exact("John Doe"), "\"John Doe\"");
/// assert_eq!(escape_for_text_exact("say \"hi\""), "\"say \\\"hi\\\"\"");
/// ```
pub fn escape_for_text_exact(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() + 2);
    escaped.push('"');
    for ch in value.chars() {
        if matches!(ch, '\\' | '"') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('"');
    escaped
}

// '-' and '/' stay: they are tokenizers in TEXT fields.
fn escape_text_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if is_query_special(ch) || matches!(ch, '*' | '%') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

// Wildcards are left to the caller.
fn escape_text_token(token: &str) -> String {
    let mut escaped = String::with_capacity(token.len());
    for ch in token.chars() {
        if is_query_special(ch) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn is_query_special(ch: char) -> bool {
    matches!(
        ch,
        '\\' | '(' | ')' | '|' | '\'' | '"' | '[' | ']' | '{' | '}' | ':' | '@' | '?' | '~' | '&' | '!' | '.'
    )
}

fn format_numeric(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParamValue;
    use crate::redisearch::index::IndexField;

    fn schema() -> IndexSchema {
        IndexSchema::new("idx:articles")
            .with_field(IndexField::tag("status"))
            .with_field(IndexField::tag("published"))
            .with_field(IndexField::numeric("views").sortable())
            .with_field(IndexField::text("title"))
            .with_field(IndexField::text("body"))
    }

    fn clause(key: &str, value: impl Into<ParamValue>) -> Result<Option<String>> {
        let condition = Condition::parse(key, &value.into()).expect("known operator");
        Ok(condition_for(&schema(), &condition)?.map(|c| c.to_query_clause()))
    }

    #[test]
    fn tag_operators() {
        assert_eq!(clause("status_eq", "in-review").unwrap(), Some("(@status:{in\\-review})".into()));
        assert_eq!(clause("status_in", "a,b").unwrap(), Some("(@status:{a|b})".into()));
        assert_eq!(clause("status_not_eq", "draft").unwrap(), Some("-(@status:{draft})".into()));
        assert_eq!(clause("published_true", "1").unwrap(), Some("(@published:{true})".into()));
        assert_eq!(clause("published_false", "0").unwrap(), Some("(@published:{true})".into()));
        assert_eq!(clause("published_true", "0").unwrap(), Some("(@published:{false})".into()));
        assert_eq!(clause("published_false", "1").unwrap(), Some("(@published:{false})".into()));
    }

    #[test]
    fn numeric_bounds() {
        assert_eq!(clause("views_gt", "10").unwrap(), Some("(@views:[(10 +inf])".into()));
        assert_eq!(clause("views_lteq", "2.5").unwrap(), Some("(@views:[-inf 2.5])".into()));
        assert_eq!(clause("views_eq", "7").unwrap(), Some("(@views:[7 7])".into()));
        assert!(matches!(clause("views_gt", "many"), Err(SearchError::InvalidRequest { .. })));
    }

    #[test]
    fn text_operators_and_or_attributes() {
        assert_eq!(clause("title_cont", "rust").unwrap(), Some("(@title:*rust*)".into()));
        assert_eq!(clause("title_start", "as-ync").unwrap(), Some("(@title:as ync*)".into()));
        assert_eq!(
            clause("title_or_body_cont", "rust").unwrap(),
            Some("((@title:*rust*)|(@body:*rust*))".into())
        );
    }

    #[test]
    fn unindexed_attributes_are_ignored_and_unsupported_pairs_fail() {
        assert_eq!(clause("missing_eq", "x").unwrap(), None);
        assert!(matches!(clause("title_gt", "x"), Err(SearchError::InvalidRequest { .. })));
        assert!(matches!(clause("status_null", "1"), Err(SearchError::InvalidRequest { .. })));
    }

    #[test]
    fn blank_list_operands_are_rejected_for_every_field_type() {
        for key in ["status_in", "status_not_in", "views_in", "views_eq_any", "views_not_in", "title_cont_any"] {
            let result = clause(key, ",");
            assert!(
                matches!(result, Err(SearchError::InvalidRequest { .. })),
                "{key} produced {result:?}"
            );
        }
        let listed: Vec<&str> = Vec::new();
        assert!(matches!(clause("status_in", listed), Err(SearchError::InvalidRequest { .. })));
    }

    #[test]
    fn composites_skip_empty_clauses() {
        let condition = FilterCondition::and([
            FilterCondition::Or(Vec::new()),
            FilterCondition::tag_eq("status", "live"),
        ]);
        assert_eq!(condition.to_query_clause(), "(@status:{live})");
        assert_eq!(FilterCondition::negate(FilterCondition::And(Vec::new())).to_query_clause(), "");
    }
}

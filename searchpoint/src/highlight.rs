//! Term highlighting inside display text.

use regex::RegexBuilder;

use crate::filters::{Condition, FilterParams};

pub const MARK_OPEN: &str = "<mark>";
pub const MARK_CLOSE: &str = "</mark>";

pub trait Highlighter: Send + Sync {
    /// Wrap every occurrence of `term` in `text`. Text without a match comes back unmarked.
    fn highlight(&self, text: &str, term: &str) -> String;
}

/// Wraps matches in `<mark>` and HTML-escapes everything else, like a view helper would.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkHighlighter {
    case_insensitive: bool,
}

impl MarkHighlighter {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn case_insensitive(mut self, enabled: bool) -> Self {
        self.case_insensitive = enabled;
        self
    }
}

impl Highlighter for MarkHighlighter {
    fn highlight(&self, text: &str, term: &str) -> String {
        let pattern = RegexBuilder::new(&regex::escape(term))
            .case_insensitive(self.case_insensitive)
            .build();
        let Ok(pattern) = pattern else {
            return escape_html(text);
        };

        let mut out = String::with_capacity(text.len() + MARK_OPEN.len() + MARK_CLOSE.len());
        let mut cursor = 0;
        for found in pattern.find_iter(text) {
            out.push_str(&escape_html(&text[cursor..found.start()]));
            out.push_str(MARK_OPEN);
            out.push_str(&escape_html(found.as_str()));
            out.push_str(MARK_CLOSE);
            cursor = found.end();
        }
        out.push_str(&escape_html(&text[cursor..]));
        out
    }
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Value to highlight for `key`: the exact filter key first, otherwise the first
/// condition over that attribute (`name` finds `name_cont`). Only non-blank text counts.
pub fn highlight_term(filters: &FilterParams, key: &str) -> Option<String> {
    if let Some(value) = filters.get(key) {
        return value
            .as_str()
            .filter(|term| !term.trim().is_empty())
            .map(str::to_string);
    }

    filters.iter().find_map(|(filter_key, value)| {
        let condition = Condition::parse(filter_key, value)?;
        if !condition.attributes.iter().any(|attribute| attribute == key) {
            return None;
        }
        value
            .as_str()
            .filter(|term| !term.trim().is_empty())
            .map(str::to_string)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParamValue;

    #[test]
    fn marks_every_occurrence() {
        let marked = MarkHighlighter::new().highlight("Smith Co and Smithers", "Smith");
        assert_eq!(marked, "<mark>Smith</mark> Co and <mark>Smith</mark>ers");
    }

    #[test]
    fn unmatched_text_is_escaped_but_unmarked() {
        assert_eq!(MarkHighlighter::new().highlight("A & B", "zzz"), "A &amp; B");
    }

    #[test]
    fn case_sensitivity_is_opt_out() {
        assert_eq!(MarkHighlighter::new().highlight("smith", "Smith"), "smith");
        let loose = MarkHighlighter::new().case_insensitive(true);
        assert_eq!(loose.highlight("smith", "Smith"), "<mark>smith</mark>");
    }

    #[test]
    fn regex_metacharacters_are_literal() {
        assert_eq!(MarkHighlighter::new().highlight("a.b axb", "a.b"), "<mark>a.b</mark> axb");
    }

    #[test]
    fn exact_key_wins_over_condition_lookup() {
        let filters: FilterParams = [("name", "Exact"), ("name_cont", "Cont")].into_iter().collect();
        assert_eq!(highlight_term(&filters, "name").as_deref(), Some("Exact"));
    }

    #[test]
    fn condition_attribute_matches_highlight_field() {
        let filters: FilterParams = [("name_or_email_cont", "smi")].into_iter().collect();
        assert_eq!(highlight_term(&filters, "email").as_deref(), Some("smi"));
        assert_eq!(highlight_term(&filters, "title"), None);
    }

    #[test]
    fn non_text_values_are_not_highlighted() {
        let mut filters = FilterParams::new();
        filters.insert("name_eq", ParamValue::Bool(false));
        assert_eq!(highlight_term(&filters, "name"), None);
    }
}

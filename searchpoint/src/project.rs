//! Result Projector: record to `{ value, text, ...extra }`.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::{ExtraPayload, SearchConfiguration};
use crate::errors::{Result, SearchError};
use crate::filters::FilterParams;
use crate::highlight::{Highlighter, highlight_term};
use crate::record::Record;

pub const VALUE_KEY: &str = "value";
pub const TEXT_KEY: &str = "text";

/// One serialized search hit. Keys keep insertion order: `value`, `text`, then extras.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ProjectedRow(Map<String, Value>);

impl ProjectedRow {
    pub fn value(&self) -> Option<&Value> {
        self.0.get(VALUE_KEY)
    }

    pub fn text(&self) -> Option<&str> {
        self.0.get(TEXT_KEY).and_then(Value::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<ProjectedRow> for Value {
    fn from(row: ProjectedRow) -> Self {
        Value::Object(row.0)
    }
}

pub struct Projector<'a, R> {
    config: &'a SearchConfiguration<R>,
    highlighter: &'a dyn Highlighter,
    term: Option<String>,
}

impl<'a, R: Record> Projector<'a, R> {
    pub fn new(config: &'a SearchConfiguration<R>, filters: &FilterParams, highlighter: &'a dyn Highlighter) -> Self {
        let term = config
            .highlight_field
            .as_deref()
            .and_then(|key| highlight_term(filters, key));
        Self {
            config,
            highlighter,
            term,
        }
    }

    pub fn project(&self, record: &R) -> Result<ProjectedRow> {
        let mut row = Map::new();
        row.insert(VALUE_KEY.to_string(), read(record, &self.config.value_field)?);

        let text = display_text(read(record, &self.config.display_field)?);
        let text = match &self.term {
            Some(term) => self.highlighter.highlight(&text, term),
            None => text,
        };
        row.insert(TEXT_KEY.to_string(), Value::String(text));

        match &self.config.extra_payload {
            ExtraPayload::Fields(names) => {
                for name in names {
                    row.insert(name.clone(), read(record, name)?);
                }
            }
            ExtraPayload::Computed(compute) => row.extend(compute(record)),
        }

        Ok(ProjectedRow(row))
    }

    /// Lazily project a sequence; the first failing record ends the iteration with its error.
    pub fn project_iter<'r, I>(&'r self, records: I) -> impl Iterator<Item = Result<ProjectedRow>> + 'r
    where
        I: IntoIterator<Item = &'r R>,
        I::IntoIter: 'r,
        R: 'r,
    {
        records.into_iter().map(move |record| self.project(record))
    }
}

fn read<R: Record>(record: &R, name: &str) -> Result<Value> {
    record.field(name).ok_or_else(|| SearchError::UnknownField {
        name: name.to_string(),
    })
}

fn display_text(value: Value) -> String {
    match value {
        Value::String(text) => text,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

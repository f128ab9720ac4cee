//! Typed field access for searchable records.
//!
//! Field reads go through [`Record::field`] instead of dynamic method dispatch, so an
//! unknown field name is detectable when an endpoint is wired up. Structs usually get
//! their implementation from `#[derive(Record)]`.

use serde_json::{Map, Value};

pub trait Record {
    /// Read a field by name; `None` when the record does not expose that field.
    fn field(&self, name: &str) -> Option<Value>;

    /// Every readable field name, or `None` for records without a fixed schema.
    fn known_fields() -> Option<&'static [&'static str]>
    where
        Self: Sized,
    {
        None
    }
}

/// Schema-less record over a JSON object. Missing keys read as `null`.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Document(pub Map<String, Value>);

impl Document {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Wraps objects; any other JSON value becomes `None`.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }
}

impl Record for Document {
    fn field(&self, name: &str) -> Option<Value> {
        Some(self.0.get(name).cloned().unwrap_or(Value::Null))
    }
}

impl<R: Record> Record for std::sync::Arc<R> {
    fn field(&self, name: &str) -> Option<Value> {
        (**self).field(name)
    }

    fn known_fields() -> Option<&'static [&'static str]> {
        R::known_fields()
    }
}

/// Checks a field name against a record type's static schema. Dynamic schemas accept anything.
pub fn ensure_known_field<R: Record>(name: &str) -> crate::errors::Result<()> {
    match R::known_fields() {
        Some(fields) if !fields.contains(&name) => Err(crate::errors::SearchError::UnknownField {
            name: name.to_string(),
        }),
        _ => Ok(()),
    }
}

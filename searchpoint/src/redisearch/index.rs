use redis::{aio::ConnectionManager, cmd};
use serde::Deserialize;

use crate::errors::Result;

use super::query::TAG_SEPARATOR;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexFieldType {
    Tag,
    Text,
    Numeric,
}

impl IndexFieldType {
    const fn keyword(self) -> &'static str {
        match self {
            IndexFieldType::Tag => "TAG",
            IndexFieldType::Text => "TEXT",
            IndexFieldType::Numeric => "NUMERIC",
        }
    }
}

/// One attribute of a JSON index: `<path> AS <name> <type> [SORTABLE]`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IndexField {
    pub path: String,
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: IndexFieldType,
    #[serde(default)]
    pub sortable: bool,
}

impl IndexField {
    /// Field indexed from the top-level JSON key of the same name.
    pub fn new(name: impl Into<String>, field_type: IndexFieldType) -> Self {
        let name = name.into();
        Self {
            path: format!("$.{name}"),
            name,
            field_type,
            sortable: false,
        }
    }

    pub fn tag(name: impl Into<String>) -> Self {
        Self::new(name, IndexFieldType::Tag)
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, IndexFieldType::Text)
    }

    pub fn numeric(name: impl Into<String>) -> Self {
        Self::new(name, IndexFieldType::Numeric)
    }

    #[inline]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    #[inline]
    pub fn sortable(mut self) -> Self {
        self.sortable = true;
        self
    }
}

/// A RediSearch index over JSON documents.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IndexSchema {
    pub name: String,
    #[serde(default)]
    pub prefixes: Vec<String>,
    #[serde(default)]
    pub fields: Vec<IndexField>,
}

impl IndexSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefixes: Vec::new(),
            fields: Vec::new(),
        }
    }

    #[inline]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefixes.push(prefix.into());
        self
    }

    #[inline]
    pub fn with_field(mut self, field: IndexField) -> Self {
        self.fields.push(field);
        self
    }

    pub fn find_field(&self, name: &str) -> Option<&IndexField> {
        self.fields.iter().find(|field| field.name == name)
    }
}

/// Create the index unless it already exists.
pub async fn ensure_index(conn: &mut ConnectionManager, schema: &IndexSchema) -> Result<()> {
    let indexes: Vec<String> = cmd("FT._LIST").query_async(conn).await?;
    if indexes.iter().any(|name| name == &schema.name) {
        return Ok(());
    }

    let mut command = cmd("FT.CREATE");
    command.arg(schema.name.as_str());
    command.arg("ON").arg("JSON");
    command.arg("PREFIX").arg(schema.prefixes.len());
    for prefix in &schema.prefixes {
        command.arg(prefix.as_str());
    }

    command.arg("SCHEMA");
    for field in &schema.fields {
        command.arg(field.path.as_str());
        command.arg("AS").arg(field.name.as_str());
        command.arg(field.field_type.keyword());
        if field.field_type == IndexFieldType::Tag {
            command.arg("SEPARATOR").arg(TAG_SEPARATOR);
        }
        if field.sortable {
            command.arg("SORTABLE");
        }
    }

    if let Err(err) = command.query_async::<()>(conn).await {
        if index_exists_error(&err) {
            return Ok(());
        }
        return Err(err.into());
    }
    log::debug!("created search index {}", schema.name);
    Ok(())
}

fn index_exists_error(err: &redis::RedisError) -> bool {
    let msg = err.to_string().to_ascii_lowercase();
    msg.contains("already exists") && msg.contains("index")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_default_to_top_level_paths() {
        let field = IndexField::numeric("views").sortable();
        assert_eq!(field.path, "$.views");
        assert!(field.sortable);
        assert_eq!(IndexField::tag("author").with_path("$.author.id").path, "$.author.id");
    }

    #[test]
    fn schema_deserializes_from_toml() {
        let schema: IndexSchema = toml::from_str(
            r#"
            name = "idx:articles"
            prefixes = ["article:"]

            [[fields]]
            path = "$.title"
            name = "title"
            type = "text"

            [[fields]]
            path = "$.views"
            name = "views"
            type = "numeric"
            sortable = true
            "#,
        )
        .expect("valid schema");
        assert_eq!(schema.find_field("views").map(|f| f.field_type), Some(IndexFieldType::Numeric));
        assert!(schema.find_field("body").is_none());
    }
}

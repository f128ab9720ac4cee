use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use searchpoint::record::Document;
use searchpoint::{
    Authorizer, MemoryCollection, Params, Principal, ScopeRegistry, SearchEndpoint, SearchError, SearchOptions,
};
use serde::Deserialize;
use serde_json::Value;

pub type CliEndpoint = SearchEndpoint<MemoryCollection<Document>, AccessPolicy>;

/// Endpoint definition read from a TOML file.
///
/// ```toml
/// name = "companies"
/// includes = ["owner"]
///
/// [endpoint]
/// display_method = "name"
/// term_key_rename = "name_cont"
/// highlight = "name_cont"
/// default_scope = "active"
///
/// [scopes.active]
/// status_eq = "active"
///
/// [access]
/// owner_field = "owner_id"
/// bypass_role = "admin"
/// ```
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndpointFile {
    #[serde(default = "default_endpoint_name")]
    pub name: String,
    #[serde(default, rename = "endpoint")]
    pub options: SearchOptions<Document>,
    /// Scope name to the filter params it applies.
    #[serde(default)]
    pub scopes: BTreeMap<String, Params>,
    #[serde(default)]
    pub includes: Vec<String>,
    #[serde(default)]
    pub access: AccessPolicy,
}

fn default_endpoint_name() -> String {
    "search".to_string()
}

/// Row-level access: principals only see documents whose `owner_field` matches their id.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccessPolicy {
    #[serde(default)]
    pub owner_field: Option<String>,
    /// Principals with this role see every document.
    #[serde(default)]
    pub bypass_role: Option<String>,
}

impl Authorizer<MemoryCollection<Document>> for AccessPolicy {
    fn authorize(
        &self,
        principal: Option<&Principal>,
        collection: MemoryCollection<Document>,
    ) -> searchpoint::Result<MemoryCollection<Document>> {
        let Some(field) = self.owner_field.clone() else {
            return Ok(collection);
        };
        let Some(principal) = principal else {
            return Err(SearchError::Forbidden {
                message: format!("documents are scoped by '{field}', pass --principal"),
            });
        };
        if self.bypass_role.as_deref().is_some_and(|role| principal.has_role(role)) {
            return Ok(collection);
        }

        let owner = principal.id.clone();
        Ok(collection.restrict(move |doc: &Document| match doc.0.get(&field) {
            Some(Value::String(id)) => *id == owner,
            Some(Value::Number(id)) => id.to_string() == owner,
            _ => false,
        }))
    }
}

pub struct EndpointContext {
    pub config_path: PathBuf,
    pub file: EndpointFile,
}

impl EndpointContext {
    pub async fn load(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read endpoint config {}", path.display()))?;
        let file: EndpointFile =
            toml::from_str(&raw).with_context(|| format!("Failed to parse endpoint config {}", path.display()))?;
        Ok(Self {
            config_path: path.to_path_buf(),
            file,
        })
    }

    /// Wire the configured endpoint over `records`.
    pub fn endpoint(&self, records: Vec<Document>) -> Result<CliEndpoint> {
        let scopes = self
            .file
            .scopes
            .iter()
            .fold(ScopeRegistry::new(), |registry, (name, params)| {
                registry.scope_params(name.as_str(), params.clone().into())
            });
        let collection = MemoryCollection::new(records)
            .with_scopes(scopes)
            .with_includes(self.file.includes.iter().cloned());

        let endpoint = SearchEndpoint::new(self.file.name.as_str(), collection, self.file.options.clone())
            .with_context(|| format!("Invalid endpoint in {}", self.config_path.display()))?;
        Ok(endpoint.with_authorizer(self.file.access.clone()))
    }
}

/// Read a JSON array of objects.
pub async fn load_records(path: &Path) -> Result<Vec<Document>> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read records {}", path.display()))?;
    let value: Value =
        serde_json::from_str(&raw).with_context(|| format!("Failed to parse records {}", path.display()))?;
    let Value::Array(items) = value else {
        bail!("{} must contain a JSON array of objects", path.display());
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match Document::from_value(item) {
            Some(doc) => Ok(doc),
            None => bail!("record #{index} in {} is not a JSON object", path.display()),
        })
        .collect()
}

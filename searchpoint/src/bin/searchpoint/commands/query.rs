use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use searchpoint::{Principal, RawRequest};

use crate::context::{EndpointContext, load_records};
use crate::examples::ExampleGroup;
use crate::output::OutputManager;

pub const EXAMPLES: &[ExampleGroup] = &[
    ExampleGroup {
        title: "Autocomplete",
        commands: &[
            "searchpoint query --records companies.json --config companies.toml \"term=acme\"",
            "searchpoint query --records companies.json --config companies.toml \"q[name_start]=ac&page=2\"",
        ],
    },
    ExampleGroup {
        title: "Scopes & Access",
        commands: &[
            "searchpoint query --records docs.json --config docs.toml --principal u1 \"term=plan&scope=recent\"",
            "searchpoint query --records docs.json --config docs.toml --principal u9 --role admin \"term=id:42\"",
            "searchpoint --output json query --records docs.json --config docs.toml \"q[title_cont]=rust\"",
        ],
    },
];

#[derive(Args)]
pub struct QueryArgs {
    /// JSON file holding an array of documents to search
    #[arg(long, value_name = "FILE")]
    pub records: PathBuf,

    /// Endpoint definition (TOML)
    #[arg(long, value_name = "FILE", env = "SEARCHPOINT_CONFIG")]
    pub config: PathBuf,

    /// Identity the search runs as
    #[arg(long, value_name = "ID")]
    pub principal: Option<String>,

    /// Role granted to the principal (repeatable)
    #[arg(long = "role", value_name = "ROLE", requires = "principal")]
    pub roles: Vec<String>,

    /// Request parameters as a query string, e.g. "term=acme&page=2"
    #[arg(default_value = "")]
    pub query: String,
}

pub(crate) fn build_request(query: &str, principal: Option<String>, roles: &[String]) -> RawRequest {
    let request = RawRequest::from_query_string(query);
    match principal {
        Some(id) => {
            let principal = roles.iter().fold(Principal::new(id), |principal, role| principal.with_role(role.as_str()));
            request.with_principal(principal)
        }
        None => request,
    }
}

pub async fn handle_query(args: QueryArgs, output: &OutputManager) -> Result<()> {
    let ctx = EndpointContext::load(&args.config).await?;
    output.verbose(&format!("Endpoint '{}' from {}", ctx.file.name, ctx.config_path.display()));

    let records = load_records(&args.records).await?;
    output.verbose(&format!("{} records from {}", records.len(), args.records.display()));

    let endpoint = ctx.endpoint(records)?;
    let request = build_request(&args.query, args.principal, &args.roles);
    let rows = endpoint
        .search(request)
        .await
        .with_context(|| format!("Search on '{}' failed", endpoint.name()))?;

    output.display(&rows)?;
    if rows.is_empty() {
        output.info("No rows matched");
    } else {
        output.success(&format!("{} row(s)", rows.len()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn principal_carries_every_role() {
        let roles = vec!["admin".to_string(), "ops".to_string()];
        let request = build_request("term=ac", Some("u1".to_string()), &roles);
        let principal = request.principal().expect("principal");
        assert_eq!(principal.id, "u1");
        assert!(principal.has_role("admin") && principal.has_role("ops"));
        assert!(request.get("term").is_some());
    }

    #[test]
    fn every_example_carries_filter_input() {
        use searchpoint::record::Document;
        use searchpoint::{MemoryCollection, SearchEndpoint, SearchOptions};

        let endpoint = SearchEndpoint::new("docs", MemoryCollection::<Document>::new(Vec::new()), SearchOptions::new())
            .expect("endpoint");
        for command in EXAMPLES.iter().flat_map(|group| group.commands.iter()) {
            let query = command.rsplit('"').nth(1).expect("quoted query");
            let plan = endpoint.plan(build_request(query, None, &[])).expect("plan");
            assert!(!plan.short_circuit, "{command} would return no rows");
        }
    }

    #[test]
    fn anonymous_request_has_no_principal() {
        assert!(build_request("", None, &[]).principal().is_none());
    }
}

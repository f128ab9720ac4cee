use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use crate::commands::query::build_request;
use crate::context::EndpointContext;
use crate::examples::ExampleGroup;
use crate::output::OutputManager;

pub const EXAMPLES: &[ExampleGroup] = &[ExampleGroup {
    title: "Inspect the plan",
    commands: &[
        "searchpoint explain --config companies.toml \"term=acme\"",
        "searchpoint explain --config companies.toml \"scope=active,recent&page=3\"",
        "searchpoint --output json explain --config companies.toml \"q[name_cont]=ac&skip_default_scopes=1\"",
    ],
}];

#[derive(Args)]
pub struct ExplainArgs {
    /// Endpoint definition (TOML)
    #[arg(long, value_name = "FILE", env = "SEARCHPOINT_CONFIG")]
    pub config: PathBuf,

    /// Request parameters as a query string
    #[arg(default_value = "")]
    pub query: String,
}

pub async fn handle_explain(args: ExplainArgs, output: &OutputManager) -> Result<()> {
    let ctx = EndpointContext::load(&args.config).await?;
    let endpoint = ctx.endpoint(Vec::new())?;
    let plan = endpoint
        .plan(build_request(&args.query, None, &[]))
        .with_context(|| format!("Could not plan a search on '{}'", endpoint.name()))?;

    output.heading(&format!("Search plan for '{}'", plan.endpoint));
    output.display(&plan)?;
    if plan.short_circuit {
        output.warning("No filter input: the endpoint responds with an empty list");
    } else if !ctx.file.scopes.is_empty() {
        output.info("Registered scopes:");
        for name in ctx.file.scopes.keys() {
            output.bullet(name);
        }
    }
    Ok(())
}

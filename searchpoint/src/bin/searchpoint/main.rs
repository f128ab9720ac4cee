mod commands;
mod context;
mod examples;
mod output;
mod theme;

use std::fmt::Write;

use anyhow::Result;
use clap::builder::Styles;
use clap::builder::styling::AnsiColor;
use clap::{ColorChoice, Command, CommandFactory, FromArgMatches, Parser, Subcommand};

use commands::{
    explain::{ExplainArgs, handle_explain},
    query::{QueryArgs, handle_query},
};
use examples::{ExampleGroup, command_examples};
use output::{GlobalOptions, OutputFormat, OutputManager};
use theme::Tone;

const ENVIRONMENT_VARIABLES: &[(&str, &str)] = &[
    ("SEARCHPOINT_CONFIG", "Endpoint definition used when --config is omitted"),
    ("RUST_LOG", "Log filter, e.g. searchpoint=debug"),
];

#[derive(Parser)]
#[command(name = "searchpoint")]
#[command(version)]
#[command(
    about = "Run and inspect parameter-driven search endpoints",
    long_about = r#"Run and inspect searchpoint endpoints against local JSON documents:

• Query-string parameters are normalized exactly as a host application would
• Scopes, access rules and ordering come from a TOML endpoint definition
• Results print as the { value, text, ... } rows autocomplete widgets consume

Commands:
  query     Run a search and print the projected rows
  explain   Show the search plan without executing it
"#
)]
#[command(subcommand_required = true, arg_required_else_help = true)]
struct Cli {
    /// Output format
    #[arg(long, value_enum, default_value = "table", global = true)]
    output: OutputFormat,

    /// Suppress output (only errors will be shown)
    #[arg(short = 'q', long, global = true)]
    quiet: bool,

    /// Enable verbose output
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn from_env_args() -> Self {
        let matches = command(colored::control::ShouldColorize::from_env().should_colorize()).get_matches();
        Cli::from_arg_matches(&matches).unwrap_or_else(|err| err.exit())
    }
}

/// The derived command plus the help appendices: per-command examples and environment variables.
fn command(color: bool) -> Command {
    let mut command = Cli::command()
        .color(if color { ColorChoice::Auto } else { ColorChoice::Never })
        .styles(help_styles())
        .after_long_help(environment_help(color));
    for example in command_examples() {
        let text = examples_help(example.groups, color);
        command = command.mut_subcommand(example.name, |sub| sub.after_long_help(text));
    }
    command
}

fn examples_help(groups: &[ExampleGroup], color: bool) -> String {
    let mut help = Tone::Key.paint("Examples:", color);
    for group in groups {
        let _ = write!(help, "\n  {}", Tone::Title.paint(group.title, color));
        for line in group.commands {
            let _ = write!(help, "\n    {}", Tone::Command.line(line, color));
        }
        help.push('\n');
    }
    help
}

fn environment_help(color: bool) -> String {
    let mut help = Tone::Key.paint("Environment:", color);
    for (name, purpose) in ENVIRONMENT_VARIABLES {
        let _ = write!(help, "\n  {:<20} {purpose}", Tone::Key.paint(name, color));
    }
    let _ = write!(
        help,
        "\n\n{}",
        Tone::Trace.paint("Run 'searchpoint <command> --help' for examples.", color)
    );
    help
}

fn help_styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default().bold())
        .usage(AnsiColor::BrightBlue.on_default().bold())
        .literal(AnsiColor::Magenta.on_default())
        .placeholder(AnsiColor::BrightBlack.on_default())
        .error(AnsiColor::Red.on_default().bold())
}

#[derive(Subcommand)]
enum Commands {
    /// Run a search over JSON documents and print the rows
    Query(QueryArgs),

    /// Show how a request would be searched, without running it
    Explain(ExplainArgs),
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let cli = Cli::from_env_args();
    if cli.no_color {
        colored::control::set_override(false);
    }

    let output = OutputManager::new(GlobalOptions {
        output_format: cli.output.clone(),
        quiet: cli.quiet,
        verbose: cli.verbose,
        no_color: cli.no_color,
    });

    if let Err(err) = execute(cli.command, &output).await {
        output.error(&format!("{err:#}"));
        std::process::exit(1);
    }
}

async fn execute(command: Commands, output: &OutputManager) -> Result<()> {
    match command {
        Commands::Query(args) => handle_query(args, output).await,
        Commands::Explain(args) => handle_explain(args, output).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli = Cli::try_parse_from([
            "searchpoint",
            "query",
            "--records",
            "docs.json",
            "--config",
            "docs.toml",
            "--output",
            "json",
            "--quiet",
            "term=acme",
        ])
        .expect("valid invocation");
        assert_eq!(cli.output, OutputFormat::Json);
        assert!(cli.quiet);
        let Commands::Query(args) = cli.command else {
            panic!("expected query");
        };
        assert_eq!(args.query, "term=acme");
        assert!(args.principal.is_none());
    }

    #[test]
    fn examples_render_without_color() {
        let text = examples_help(commands::explain::EXAMPLES, false);
        assert!(text.starts_with("Examples:\n  Inspect the plan\n"));
        assert!(text.contains("→ searchpoint explain --config companies.toml"));
    }

    #[test]
    fn long_help_lists_examples_and_environment() {
        let mut command = command(false);
        let top = command.render_long_help().to_string();
        assert!(top.contains("SEARCHPOINT_CONFIG"));
        assert!(top.contains("RUST_LOG"));

        let query = command.find_subcommand_mut("query").expect("query subcommand");
        let help = query.render_long_help().to_string();
        assert!(help.contains("Scopes & Access"));
        assert!(help.contains("term=id:42"));
    }
}

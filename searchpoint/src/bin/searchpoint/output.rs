use anyhow::Result;
use clap::ValueEnum;
use comfy_table::{Attribute, Cell, Color as TableColor, Table};
use searchpoint::{ProjectedRow, SearchPlan, Window};
use serde::Serialize;
use serde_json::Value;

use crate::theme::Tone;

/// Output format options for CLI commands
#[derive(Clone, Debug, ValueEnum, Default, PartialEq)]
pub enum OutputFormat {
    /// Formatted table output (default)
    #[default]
    Table,
    /// JSON output, exactly what the endpoint would respond with
    Json,
    /// Compact single-line-per-row output
    Compact,
}

/// Global CLI options that affect output and behavior
#[derive(Clone, Debug, Default)]
pub struct GlobalOptions {
    pub output_format: OutputFormat,
    pub quiet: bool,
    pub verbose: bool,
    pub no_color: bool,
}

/// Data that knows how to render itself as a table or a compact line.
pub trait TableDisplay {
    fn to_table(&self, options: &GlobalOptions) -> Table;
    fn to_compact(&self) -> String;
}

pub struct OutputManager {
    pub options: GlobalOptions,
}

impl OutputManager {
    pub fn new(options: GlobalOptions) -> Self {
        Self { options }
    }

    /// Display data according to the configured output format
    pub fn display<T>(&self, data: &T) -> Result<()>
    where
        T: Serialize + TableDisplay,
    {
        if self.options.quiet {
            return Ok(());
        }

        match self.options.output_format {
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(data)?;
                println!("{json}");
            }
            OutputFormat::Table => {
                let table = data.to_table(&self.options);
                println!("{table}");
            }
            OutputFormat::Compact => {
                println!("{}", data.to_compact());
            }
        }
        Ok(())
    }

    pub fn success(&self, message: &str) {
        if self.chatty() {
            println!("{}", self.line(Tone::Matched, message));
        }
    }

    /// Errors are printed even in quiet mode.
    pub fn error(&self, message: &str) {
        eprintln!("{}", self.line(Tone::Failed, message));
    }

    pub fn warning(&self, message: &str) {
        if self.chatty() {
            eprintln!("{}", self.line(Tone::Caution, message));
        }
    }

    /// Only shown with `--verbose`.
    pub fn verbose(&self, message: &str) {
        if self.options.verbose && !self.options.quiet {
            eprintln!("{}", self.line(Tone::Trace, message));
        }
    }

    pub fn info(&self, message: &str) {
        if self.chatty() {
            println!("{}", self.line(Tone::Note, message));
        }
    }

    pub fn heading(&self, text: &str) {
        if !self.chatty() {
            return;
        }
        if self.options.no_color {
            println!("\n{text}\n{}", "=".repeat(text.chars().count()));
        } else {
            println!("\n{}", Tone::Title.paint(text, true));
        }
    }

    pub fn bullet(&self, text: &str) {
        if self.chatty() {
            println!("  {} {text}", Tone::Trace.paint(Tone::Title.marker(), !self.options.no_color));
        }
    }

    fn line(&self, tone: Tone, message: &str) -> String {
        tone.line(message, !self.options.no_color)
    }

    // Decorations would corrupt machine-readable output.
    fn chatty(&self) -> bool {
        !self.options.quiet && self.options.output_format != OutputFormat::Json
    }
}

fn themed_table(options: &GlobalOptions) -> Table {
    let mut table = Table::new();
    if options.no_color {
        table.load_preset(comfy_table::presets::ASCII_FULL);
    } else {
        table.load_preset(comfy_table::presets::UTF8_FULL_CONDENSED);
    }
    table
}

fn header_cells<'a>(headers: impl IntoIterator<Item = &'a str>, options: &GlobalOptions) -> Vec<Cell> {
    headers
        .into_iter()
        .map(|header| {
            let cell = Cell::new(header).add_attribute(Attribute::Bold);
            if options.no_color { cell } else { cell.fg(TableColor::Cyan) }
        })
        .collect()
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn describe_window(window: &Window) -> String {
    match window {
        Window::Limit { limit } => format!("limit {limit}"),
        Window::Page { page, per_page } => format!("page {page} ({per_page} per page)"),
        Window::Unbounded => "unbounded".to_string(),
    }
}

fn join_or_dash(names: &[String]) -> String {
    if names.is_empty() { "-".to_string() } else { names.join(", ") }
}

/// Columns in first-seen order, so `value` and `text` lead.
fn row_columns(rows: &[ProjectedRow]) -> Vec<&str> {
    let mut columns: Vec<&str> = Vec::new();
    for key in rows.iter().flat_map(ProjectedRow::keys) {
        if !columns.contains(&key.as_str()) {
            columns.push(key);
        }
    }
    columns
}

impl TableDisplay for Vec<ProjectedRow> {
    fn to_table(&self, options: &GlobalOptions) -> Table {
        let mut table = themed_table(options);
        if self.is_empty() {
            table.add_row(vec![Cell::new("No results")]);
            return table;
        }

        let columns = row_columns(self);
        table.set_header(header_cells(columns.iter().copied(), options));
        for row in self {
            table.add_row(
                columns
                    .iter()
                    .map(|column| Cell::new(row.get(column).map(display_value).unwrap_or_default()))
                    .collect::<Vec<_>>(),
            );
        }
        table
    }

    fn to_compact(&self) -> String {
        if self.is_empty() {
            return "No results".to_string();
        }
        self.iter()
            .map(|row| {
                format!(
                    "{}\t{}",
                    row.value().map(display_value).unwrap_or_default(),
                    row.text().unwrap_or_default()
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl TableDisplay for SearchPlan {
    fn to_table(&self, options: &GlobalOptions) -> Table {
        let mut table = themed_table(options);
        table.set_header(header_cells(["Step", "Decision"], options));

        let filters = serde_json::to_string(&self.filters).unwrap_or_default();
        let highlight = self.highlight_term.clone().unwrap_or_else(|| "-".to_string());
        let rows = [
            ("Endpoint", self.endpoint.clone()),
            ("Filters", filters),
            ("Short circuit", self.short_circuit.to_string()),
            ("Default scopes", join_or_dash(&self.default_scopes)),
            ("Scopes", join_or_dash(&self.scopes)),
            ("Includes", join_or_dash(&self.includes)),
            ("Order", self.order.to_string()),
            ("Window", describe_window(&self.window)),
            ("Highlight term", highlight),
        ];
        for (step, decision) in rows {
            table.add_row(vec![Cell::new(step).add_attribute(Attribute::Bold), Cell::new(decision)]);
        }
        table
    }

    fn to_compact(&self) -> String {
        if self.short_circuit {
            return format!("{}: no filter input, returns no rows", self.endpoint);
        }
        let filters = serde_json::to_string(&self.filters).unwrap_or_default();
        format!(
            "{} filters={filters} order=\"{}\" window=\"{}\"",
            self.endpoint,
            self.order,
            describe_window(&self.window)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use searchpoint::record::Document;
    use searchpoint::{MemoryCollection, RawRequest, SearchEndpoint, SearchOptions};
    use serde_json::json;

    async fn rows() -> Vec<ProjectedRow> {
        let docs = [json!({"id": 1, "name": "Ada", "team": "core"}), json!({"id": 2, "name": "Grace", "team": "ops"})];
        let endpoint = SearchEndpoint::new(
            "people",
            MemoryCollection::new(docs.into_iter().filter_map(Document::from_value).collect()),
            SearchOptions::new()
                .display_method("name")
                .order_clause("id asc".parse().expect("clause"))
                .additional_payload(searchpoint::ExtraPayload::fields(["team"])),
        )
        .expect("endpoint");
        endpoint
            .search(RawRequest::from_query_string("name_present=1"))
            .await
            .expect("search")
    }

    #[tokio::test]
    async fn row_columns_follow_projection_order() {
        let rows = rows().await;
        assert_eq!(row_columns(&rows), vec!["value", "text", "team"]);
        assert_eq!(rows.to_compact(), "1\tAda\n2\tGrace");
    }

    #[test]
    fn empty_results_render_placeholder() {
        let rows: Vec<ProjectedRow> = Vec::new();
        assert_eq!(rows.to_compact(), "No results");
        assert!(rows.to_table(&GlobalOptions::default()).to_string().contains("No results"));
    }

    #[test]
    fn windows_read_naturally() {
        assert_eq!(describe_window(&Window::Limit { limit: 5 }), "limit 5");
        assert_eq!(describe_window(&Window::Page { page: 2, per_page: 25 }), "page 2 (25 per page)");
        assert_eq!(describe_window(&Window::Unbounded), "unbounded");
    }

    #[test]
    fn quiet_mode_displays_nothing() {
        let manager = OutputManager::new(GlobalOptions {
            quiet: true,
            ..Default::default()
        });
        assert!(manager.display(&Vec::<ProjectedRow>::new()).is_ok());
    }
}

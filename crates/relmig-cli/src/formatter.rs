//! Output formatters for execution reports and plans.

use clap::ValueEnum;
use comfy_table::Table;
use relmig_core::{ExecutionPlan, ExecutionReport, MigrationCommand};

/// Characters of command text shown in a plan table.
const PREVIEW_WIDTH: usize = 60;

/// Output format for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// ASCII table format
    Table,
    /// JSON format
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Trait for formatting output.
pub trait Formatter: Send + Sync {
    /// Format the report of a completed execution.
    fn format_report(&self, report: &ExecutionReport) -> String;

    /// Format how a command sequence is split into batches.
    fn format_plan(&self, commands: &[MigrationCommand], plan: &ExecutionPlan) -> String;
}

/// Create a formatter for the given output format.
pub fn create_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Table => Box::new(TableFormatter),
        OutputFormat::Json => Box::new(JsonFormatter),
    }
}

/// Table formatter using comfy-table.
pub struct TableFormatter;

impl Formatter for TableFormatter {
    fn format_report(&self, report: &ExecutionReport) -> String {
        let mut table = Table::new();
        table.set_header(vec!["Metric", "Value"]);
        table.add_row(vec![
            "Commands executed".to_string(),
            report.commands_executed.to_string(),
        ]);
        table.add_row(vec![
            "Outside transaction".to_string(),
            report.suppressed_commands.to_string(),
        ]);
        table.add_row(vec![
            "Transactions committed".to_string(),
            report.transactions_committed.to_string(),
        ]);
        table.add_row(vec![
            "Rows affected".to_string(),
            report.rows_affected.to_string(),
        ]);
        table.add_row(vec![
            "Elapsed".to_string(),
            format!("{:.3}s", report.elapsed.as_secs_f64()),
        ]);
        table.to_string()
    }

    fn format_plan(&self, commands: &[MigrationCommand], plan: &ExecutionPlan) -> String {
        if plan.batches().is_empty() {
            return "No commands".to_string();
        }

        let mut table = Table::new();
        table.set_header(vec!["Batch", "Commands", "Mode", "First command"]);

        for (n, batch) in plan.batches().iter().enumerate() {
            let range = if batch.len() == 1 {
                batch.start.to_string()
            } else {
                format!("{}-{}", batch.start, batch.end - 1)
            };
            let mode = if batch.transactional {
                "transaction"
            } else {
                "no transaction"
            };
            let first = commands
                .get(batch.start)
                .map(|c| first_line(c.command_text()))
                .unwrap_or_default();

            table.add_row(vec![(n + 1).to_string(), range, mode.to_string(), first]);
        }

        format!(
            "{}\n{} command(s), {} transaction(s)",
            table,
            plan.command_count(),
            plan.transaction_count()
        )
    }
}

/// JSON formatter.
pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn format_report(&self, report: &ExecutionReport) -> String {
        serde_json::json!({
            "commands_executed": report.commands_executed,
            "suppressed_commands": report.suppressed_commands,
            "transactions_committed": report.transactions_committed,
            "rows_affected": report.rows_affected,
            "elapsed_ms": report.elapsed.as_millis() as u64,
        })
        .to_string()
    }

    fn format_plan(&self, _commands: &[MigrationCommand], plan: &ExecutionPlan) -> String {
        serde_json::json!({
            "commands": plan.command_count(),
            "transactions": plan.transaction_count(),
            "batches": plan.batches(),
            "steps": plan.steps(),
        })
        .to_string()
    }
}

fn first_line(text: &str) -> String {
    let line = text.lines().next().unwrap_or_default().trim();
    if line.chars().count() > PREVIEW_WIDTH {
        let cut: String = line.chars().take(PREVIEW_WIDTH).collect();
        format!("{}...", cut)
    } else {
        line.to_string()
    }
}

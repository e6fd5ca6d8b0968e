//! Output rendering and formatting

use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Color, ContentArrangement, Table};
use serde::Serialize;
use shardex_engine::ExecutionResult;
use shardex_events::{EventMessage, FailureContext};
use shardex_types::{ExecutionUnit, SqlType};
use std::io;

use crate::error::CliError;
use crate::sqlite::StatementOutcome;

/// Result of one unit, as reported to the user
#[derive(Debug, Serialize)]
pub struct UnitReport {
    pub index: usize,
    pub data_source: String,
    pub sql: String,
    pub result: ExecutionResult<StatementOutcome>,
}

/// Final report of a `run` command
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub sql_type: SqlType,
    pub strict: bool,
    pub units: Vec<UnitReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub events: Option<Vec<EventMessage>>,
}

impl RunReport {
    pub fn new(
        sql_type: SqlType,
        strict: bool,
        units: &[ExecutionUnit],
        results: Vec<ExecutionResult<StatementOutcome>>,
    ) -> Self {
        let units = units
            .iter()
            .zip(results)
            .enumerate()
            .map(|(index, (unit, result))| UnitReport {
                index,
                data_source: unit.data_source().to_string(),
                sql: unit.sql().to_string(),
                result,
            })
            .collect();
        Self {
            sql_type,
            strict,
            units,
            events: None,
        }
    }
}

/// Output renderer for CLI results
#[derive(Clone)]
pub struct OutputRenderer {
    /// Use JSON output format
    json_output: bool,
}

impl OutputRenderer {
    /// Create new output renderer
    pub fn new(json_output: bool) -> Self {
        Self { json_output }
    }

    /// Render a run report
    pub fn render_report(&self, report: &RunReport) -> io::Result<()> {
        if self.json_output {
            render_json(report)
        } else {
            self.render_table(report);
            Ok(())
        }
    }

    /// Render a plain message
    pub fn render_text(&self, text: &str) -> io::Result<()> {
        if self.json_output {
            render_json(&serde_json::json!({ "message": text }))
        } else {
            println!("{text}");
            Ok(())
        }
    }

    /// Render a failure; in JSON mode the error goes to stdout as a document
    pub fn render_error(&self, error: &CliError) {
        if self.json_output {
            let failure = FailureContext::new(
                error.user_code(),
                error.to_string(),
                error.user_hint(),
                error.is_retryable(),
            );
            let _ = render_json(&serde_json::json!({ "error": failure }));
        } else {
            eprintln!("Error: {error}");
        }
    }

    fn render_table(&self, report: &RunReport) {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);

        table.set_header(vec![
            Cell::new("#").add_attribute(Attribute::Bold),
            Cell::new("Data source").add_attribute(Attribute::Bold),
            Cell::new("Status").add_attribute(Attribute::Bold),
            Cell::new("Rows affected").add_attribute(Attribute::Bold),
            Cell::new("Rows returned").add_attribute(Attribute::Bold),
        ]);

        for unit in &report.units {
            let (status, affected, returned) = match &unit.result {
                ExecutionResult::Present(outcome) => (
                    Cell::new("ok").fg(Color::Green),
                    outcome.rows_affected.to_string(),
                    outcome.rows.len().to_string(),
                ),
                ExecutionResult::Absent => (
                    Cell::new("absent").fg(Color::Yellow),
                    "-".to_string(),
                    "-".to_string(),
                ),
            };
            table.add_row(vec![
                Cell::new(unit.index),
                Cell::new(&unit.data_source),
                status,
                Cell::new(affected),
                Cell::new(returned),
            ]);
        }

        let mode = if report.strict { "strict" } else { "lenient" };
        println!("{} operation, {} units ({mode})", report.sql_type, report.units.len());
        println!("{table}");

        if report.sql_type.returns_rows() {
            for unit in &report.units {
                if let ExecutionResult::Present(outcome) = &unit.result {
                    render_rows(unit, outcome);
                }
            }
        }
    }
}

fn render_rows(unit: &UnitReport, outcome: &StatementOutcome) {
    let Some(serde_json::Value::Object(first)) = outcome.rows.first() else {
        return;
    };
    let columns: Vec<&String> = first.keys().collect();

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            columns
                .iter()
                .map(|c| Cell::new(c).add_attribute(Attribute::Bold))
                .collect::<Vec<_>>(),
        );
    for row in &outcome.rows {
        table.add_row(
            columns
                .iter()
                .map(|c| Cell::new(format_value(row.get(c.as_str()))))
                .collect::<Vec<_>>(),
        );
    }

    println!();
    println!("{} ::: {}", unit.data_source, unit.sql);
    println!("{table}");
}

fn render_json<T: Serialize + ?Sized>(value: &T) -> io::Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
    println!("{json}");
    Ok(())
}

fn format_value(value: Option<&serde_json::Value>) -> String {
    match value {
        None | Some(serde_json::Value::Null) => "NULL".to_string(),
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

//! Output formatting for the CLI
//!
//! Renders aggregate reports, single reports and layer listings as JSON or
//! as a human-readable table with category-based coloring.

use clap::ValueEnum;
use colored::{ColoredString, Colorize};
use serde::Serialize;
use std::io::{self, Write};

use crate::contracts::*;

/// Output format options for CLI results
#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug, Default)]
pub enum OutputFormat {
    /// Human-readable table format with colors
    #[default]
    Table,
    /// JSON format for machine processing
    Json,
}

fn colored_category(category: HealthCategory) -> ColoredString {
    let label = format!("{} {}", category.icon(), category.as_str().to_uppercase());
    match category {
        HealthCategory::Healthy => label.green(),
        HealthCategory::Degraded => label.yellow(),
        HealthCategory::Failed => label.red(),
        HealthCategory::Offline => label.red().bold(),
        HealthCategory::Unknown => label.dimmed(),
    }
}

fn yes_no(flag: bool) -> ColoredString {
    if flag {
        "healthy".green()
    } else {
        "unhealthy".red()
    }
}

fn write_json<W: Write, T: Serialize>(out: &mut W, value: &T) -> io::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    writeln!(out, "{}", json)
}

/// Render an aggregate report
pub fn render_aggregate<W: Write>(
    out: &mut W,
    report: &AggregateReport,
    format: OutputFormat,
) -> io::Result<()> {
    match format {
        OutputFormat::Json => write_json(out, report),
        OutputFormat::Table => render_aggregate_table(out, report),
    }
}

fn render_aggregate_table<W: Write>(out: &mut W, report: &AggregateReport) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", "Graphmart Health".cyan().bold())?;
    writeln!(out, "{}", "=".repeat(60))?;

    for artifact in &report.artifacts {
        render_status_line(out, artifact)?;
    }
    writeln!(out)?;

    if !report.search_index_details.is_empty() {
        writeln!(out, "{}", "Search index:".cyan().bold())?;
        for detail in &report.search_index_details {
            for error in &detail.errors {
                writeln!(out, "  {} {}: {}", "✗".red(), detail.artifact_id, error)?;
            }
        }
        writeln!(out, "  {}", yes_no(report.search_index_healthy))?;
    }

    if !report.anzograph_details.is_empty() {
        writeln!(out, "{}", "AnzoGraph:".cyan().bold())?;
        for detail in report.anzograph_details.iter().filter(|d| !d.is_connected) {
            writeln!(
                out,
                "  {} {}: {}",
                "✗".red(),
                detail.artifact_id,
                detail.error.as_deref().unwrap_or("not connected")
            )?;
        }
        writeln!(out, "  {}", yes_no(report.anzograph_healthy))?;
    }

    if let Some(auth) = &report.auth_details {
        writeln!(out, "{}", "Authentication:".cyan().bold())?;
        match &auth.error {
            Some(error) => writeln!(out, "  {} {}", "✗".red(), error)?,
            None => writeln!(out, "  {} {:.0}ms", "✓".green(), auth.response_time_ms)?,
        }
    }

    writeln!(out, "{}", "-".repeat(60))?;
    let summary = HealthCategory::ALL
        .iter()
        .map(|c| format!("{} {}", report.count(*c), c))
        .collect::<Vec<_>>()
        .join(", ");
    writeln!(out, "{} ({}ms)", summary, report.duration_ms)?;
    let overall = if report.overall_healthy {
        "OVERALL: HEALTHY".green().bold()
    } else {
        "OVERALL: UNHEALTHY".red().bold()
    };
    writeln!(out, "{}", overall)
}

/// One line per artifact, with its explanation underneath
pub fn render_status_line<W: Write>(out: &mut W, report: &StatusReport) -> io::Result<()> {
    writeln!(
        out,
        "{:<14} {} ({})",
        colored_category(report.category),
        report.title,
        report.raw_status
    )?;
    if let Some(explanation) = &report.explanation {
        writeln!(out, "{:<14} └─ {}", "", explanation.dimmed())?;
    }
    Ok(())
}

/// Render a single report
pub fn render_report<W: Write>(
    out: &mut W,
    report: &StatusReport,
    format: OutputFormat,
) -> io::Result<()> {
    match format {
        OutputFormat::Json => write_json(out, report),
        OutputFormat::Table => render_status_line(out, report),
    }
}

/// Render a layer listing
pub fn render_layers<W: Write>(
    out: &mut W,
    title: &str,
    layers: &[LayerStatusReport],
    format: OutputFormat,
) -> io::Result<()> {
    if format == OutputFormat::Json {
        return write_json(out, &layers);
    }

    writeln!(out, "{}", format!("Layers of {}", title).cyan().bold())?;
    for layer in layers {
        let marker = if !layer.enabled {
            "○".dimmed()
        } else if layer.has_error {
            "✗".red()
        } else {
            "✓".green()
        };
        writeln!(out, "  {} {}", marker, layer.title)?;
        if let Some(error) = &layer.error_message {
            writeln!(out, "      {}", error.red())?;
        }
    }
    Ok(())
}

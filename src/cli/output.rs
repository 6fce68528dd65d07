//! Output formatting for the `status` command.

use anyhow::{Context, Result};
use serde::Serialize;

use crate::certs::SlotStatus;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Yaml,
    Table,
}

impl OutputFormat {
    /// Parse output format from string
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "yaml" => Ok(OutputFormat::Yaml),
            "table" => Ok(OutputFormat::Table),
            _ => anyhow::bail!(
                "Unsupported output format: '{}'. Use 'json', 'yaml', or 'table'.",
                s
            ),
        }
    }
}

/// Render a status report in the requested format.
pub fn render_status(report: &[SlotStatus], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => to_json(&report),
        OutputFormat::Yaml => to_yaml(&report),
        OutputFormat::Table => Ok(status_table(report)),
    }
}

fn to_json<T: Serialize>(data: &T) -> Result<String> {
    serde_json::to_string_pretty(data).context("Failed to serialize to JSON")
}

fn to_yaml<T: Serialize>(data: &T) -> Result<String> {
    serde_yaml::to_string(data).context("Failed to serialize to YAML")
}

const COLUMNS: [(&str, usize); 6] = [
    ("SLOT", 18),
    ("CA CERT", 8),
    ("CA KEY", 8),
    ("HOST CERT", 10),
    ("HOST KEY", 9),
    ("EXPIRES", 25),
];

fn status_table(report: &[SlotStatus]) -> String {
    let mut lines = Vec::with_capacity(report.len() + 2);

    let header: Vec<String> =
        COLUMNS.iter().map(|(name, width)| format!("{:<width$}", name, width = width)).collect();
    lines.push(header.join(" ").trim_end().to_string());

    let total_width: usize = COLUMNS.iter().map(|(_, w)| w + 1).sum();
    lines.push("-".repeat(total_width.saturating_sub(1)));

    for status in report {
        let expires = status
            .host_certificate
            .as_ref()
            .map(|info| info.not_after.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "-".to_string());
        let cells = [
            status.slot.to_string(),
            mark(status.ca_cert),
            mark(status.ca_key),
            mark(status.host_cert),
            mark(status.host_key),
            expires,
        ];
        let row: Vec<String> = cells
            .iter()
            .zip(COLUMNS.iter())
            .map(|(cell, (_, width))| format!("{:<width$}", cell, width = width))
            .collect();
        lines.push(row.join(" ").trim_end().to_string());
    }

    lines.join("\n")
}

fn mark(present: bool) -> String {
    let mark = if present { "yes" } else { "no" };
    mark.to_string()
}

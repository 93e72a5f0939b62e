//! Batch report rendering: comparison table and JSON export.

use crate::batch::BatchReport;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("cannot write report {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot serialize report: {0}")]
    Json(#[from] serde_json::Error),
}

const RUN_WIDTH: usize = 40;

/// Fixed-width comparison table, one row per successful run.
pub fn render_table(report: &BatchReport) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<w$} {:>10} {:>10} {:>14} {:>12} {:>7} {:>16}\n",
        "Run",
        "Return %",
        "Max DD %",
        "Realized PnL",
        "Commission",
        "Fills",
        "Final Equity",
        w = RUN_WIDTH
    ));
    out.push_str(&"-".repeat(RUN_WIDTH + 75));
    out.push('\n');

    for (key, summary) in &report.results {
        out.push_str(&format!(
            "{:<w$} {:>+10.2} {:>10.2} {:>14.2} {:>12.2} {:>7} {:>16.2}\n",
            truncate(&key.to_string(), RUN_WIDTH),
            summary.total_return_pct,
            summary.max_drawdown_pct,
            summary.realized_pnl,
            summary.total_commission,
            summary.fill_count,
            summary.final_equity,
            w = RUN_WIDTH
        ));
    }

    if !report.failures.is_empty() {
        out.push_str(&format!("\nFailed runs ({}):\n", report.failures.len()));
        for failure in &report.failures {
            out.push_str(&format!("  {}: {}\n", failure.key, failure.message));
        }
    }
    out
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(width.saturating_sub(1)).collect();
    cut.push('~');
    cut
}

pub fn to_json(report: &BatchReport) -> Result<String, ReportError> {
    Ok(serde_json::to_string_pretty(report)?)
}

pub fn write_json(report: &BatchReport, path: &Path) -> Result<(), ReportError> {
    let json = to_json(report)?;
    std::fs::write(path, json).map_err(|source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!(path = %path.display(), runs = report.results.len(), "report written");
    Ok(())
}

//! SQL script export for manual review

use super::plan::{CleanupAction, RiskTier};
use crate::error::Result;
use chrono::{DateTime, Local, Utc};
use std::path::{Path, PathBuf};
use tracing::info;

/// Render an action as a standalone SQL script. Actions that must not run
/// are written commented out.
pub fn render_script(action: &CleanupAction, generated_at: DateTime<Utc>) -> String {
    let mut out = String::new();
    out.push_str(&format!("-- {}\n", action.title));
    out.push_str(&format!(
        "-- Generated: {}\n",
        generated_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
    ));
    out.push_str(&format!("-- Risk: {}\n", action.risk_tier));
    out.push_str("--\n");
    for line in textwrap(&action.description, 76) {
        out.push_str(&format!("-- {}\n", line));
    }
    out.push_str(&format!("-- Filter: {}\n", action.predicate));
    out.push_str(&format!(
        "-- Estimated rows: {}\n",
        action.estimated_row_count
    ));
    out.push_str(&format!("-- Impact: {}\n", action.impact));
    if let Some(guard) = &action.guard {
        out.push_str(&format!("-- WARNING: {}\n", guard));
    }
    out.push_str("--\n-- Back up the database before running this script.\n\n");

    match &action.statement {
        Some(statement) if action.is_executable() => {
            out.push_str(statement);
            out.push_str(";\n");
        }
        Some(statement) => {
            out.push_str("-- DO NOT RUN\n");
            out.push_str(&format!("-- {};\n", statement));
        }
        None => out.push_str("-- No statement for this action.\n"),
    }

    if action.is_executable() {
        out.push_str("\n-- Reclaim space afterwards:\n-- VACUUM;\n");
    }
    out
}

/// Default file name for an exported action, numbered from one
pub fn script_file_name(number: usize, action: &CleanupAction, at: DateTime<Utc>) -> String {
    let tier = match action.risk_tier {
        RiskTier::Safe => "safe",
        RiskTier::Conservative => "conservative",
        RiskTier::Dangerous => "dangerous",
        RiskTier::Blocked => "blocked",
    };
    format!(
        "cleanup_action_{}_{}_{}.sql",
        number,
        tier,
        at.with_timezone(&Local).format("%Y%m%d_%H%M%S")
    )
}

/// Write the script to `path`, creating parent directories
pub fn write_script(action: &CleanupAction, generated_at: DateTime<Utc>, path: &Path) -> Result<PathBuf> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, render_script(action, generated_at))?;
    info!(path = %path.display(), "wrote cleanup script");
    Ok(path.to_path_buf())
}

fn textwrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if !current.is_empty() && current.len() + word.len() + 1 > width {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

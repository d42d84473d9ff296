//! Colored terminal output helpers.
//!
//! All user-facing output goes through these functions so we get
//! consistent styling across every command.

use comfy_table::{ContentArrangement, Table};
use console::style;

use crate::vault::{CredentialHistoryEntry, CredentialInfo, CredentialStatus, ValidationResult};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Print a green success message: "check_mark {msg}"
pub fn success(msg: &str) {
    println!("{} {}", style("\u{2713}").green().bold(), msg);
}

/// Print a red error message: "x_mark {msg}"
pub fn error(msg: &str) {
    eprintln!("{} {}", style("\u{2717}").red().bold(), msg);
}

/// Print a yellow warning: "warning_sign {msg}"
pub fn warning(msg: &str) {
    eprintln!("{} {}", style("\u{26a0}").yellow().bold(), msg);
}

/// Print a blue info message: "info_sign {msg}"
pub fn info(msg: &str) {
    println!("{} {}", style("\u{2139}").blue().bold(), msg);
}

/// Print a dim tip/hint: "arrow {msg}"
pub fn tip(msg: &str) {
    println!("{} {}", style("\u{2192}").dim(), style(msg).dim());
}

/// Print a table of credentials (Name, Type, Status, Tags, Updated, Rotated).
pub fn print_credentials_table(credentials: &[CredentialInfo]) {
    if credentials.is_empty() {
        info("No credentials stored yet.");
        tip("Run `credvault set <NAME>` to add your first credential.");
        return;
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Name", "Type", "Status", "Tags", "Updated", "Rotated"]);

    for c in credentials {
        let status = match c.status {
            CredentialStatus::Active => style(c.status.to_string()).green().to_string(),
            CredentialStatus::Expired => style(c.status.to_string()).red().to_string(),
        };
        table.add_row(vec![
            c.name.clone(),
            c.kind.to_string(),
            status,
            c.tags.join(", "),
            c.updated_at.format(TIME_FORMAT).to_string(),
            c.rotated_at
                .map_or_else(|| "-".to_string(), |t| t.format(TIME_FORMAT).to_string()),
        ]);
    }

    println!("{table}");
}

/// Print history entries, oldest first.
pub fn print_history_table(name: &str, entries: &[CredentialHistoryEntry]) {
    if entries.is_empty() {
        info(&format!("No history recorded for '{name}'."));
        return;
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Time", "Action", "Actor", "Details"]);

    for entry in entries {
        let details: Vec<String> = entry
            .details
            .iter()
            .map(|(k, v)| match v {
                serde_json::Value::String(s) => format!("{k}={s}"),
                other => format!("{k}={other}"),
            })
            .collect();
        table.add_row(vec![
            entry.timestamp.format(TIME_FORMAT).to_string(),
            colorize_action(&entry.action),
            entry.actor.clone().unwrap_or_else(|| "-".to_string()),
            if details.is_empty() {
                "-".to_string()
            } else {
                details.join(", ")
            },
        ]);
    }

    println!("{table}");
}

/// Print a validation report.
pub fn print_validation(name: &str, result: &ValidationResult) {
    let score = result.clamped_score();
    let rendered = match score {
        80..=100 => style(score).green().bold(),
        50..=79 => style(score).yellow().bold(),
        _ => style(score).red().bold(),
    };
    println!("{} score: {rendered}/100", style(name).bold());

    for err in &result.errors {
        error(err);
    }
    for warn in &result.warnings {
        warning(warn);
    }
    if let Some(remaining) = result.expires_in {
        info(&format!("expires in {}", format_remaining(remaining)));
    }
    if result.is_valid && result.warnings.is_empty() {
        success("No issues found.");
    }
}

/// Colorize lifecycle action names for display.
pub fn colorize_action(action: &str) -> String {
    match action {
        a if a == "create" || a.starts_with("create_") => style(action).green().to_string(),
        a if a == "update" || a.starts_with("update_") => style(action).blue().to_string(),
        a if a == "delete" || a.starts_with("delete_") => style(action).red().to_string(),
        a if a == "rotate" || a.starts_with("rotat") => style(action).yellow().to_string(),
        a if a.ends_with("_error") => style(action).red().bold().to_string(),
        _ => action.to_string(),
    }
}

fn format_remaining(remaining: chrono::Duration) -> String {
    let days = remaining.num_days();
    if days > 0 {
        format!("{days}d {}h", remaining.num_hours() - days * 24)
    } else {
        format!("{}h {}m", remaining.num_hours(), remaining.num_minutes() % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colorize_action_returns_string() {
        // Just verify it doesn't panic for known and unknown actions.
        assert!(!colorize_action("create").is_empty());
        assert!(!colorize_action("rotation_due").is_empty());
        assert!(!colorize_action("fetch_error").is_empty());
        assert_eq!(colorize_action("cache_hit"), "cache_hit");
    }

    #[test]
    fn remaining_time_formats() {
        assert_eq!(
            format_remaining(chrono::Duration::days(3) + chrono::Duration::hours(5)),
            "3d 5h"
        );
        assert_eq!(
            format_remaining(chrono::Duration::hours(2) + chrono::Duration::minutes(15)),
            "2h 15m"
        );
    }
}

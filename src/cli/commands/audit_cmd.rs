//! `credvault audit` — display the audit log.
//!
//! Usage:
//!   credvault audit               # show last 50 entries
//!   credvault audit --last 20     # show last 20
//!   credvault audit --since 7d    # entries from last 7 days

use chrono::Utc;

use crate::audit::{AuditEntry, AuditLog, Severity};
use crate::cli::output;
use crate::cli::{data_path, load_settings, parse_duration, Cli};
use crate::errors::Result;

/// Execute the `audit` command.
pub fn execute(cli: &Cli, last: usize, since: Option<&str>) -> Result<()> {
    let settings = load_settings(cli)?;
    let audit = AuditLog::open(&data_path(&settings)?)?;

    let since_dt = match since {
        Some(s) => Some(Utc::now() - parse_duration(s)?),
        None => None,
    };

    let entries = audit.query(last, since_dt)?;

    if entries.is_empty() {
        output::info("No audit entries found.");
        return Ok(());
    }

    print_audit_table(&entries);

    Ok(())
}

/// Print audit entries in a formatted table.
pub fn print_audit_table(entries: &[AuditEntry]) {
    use comfy_table::{ContentArrangement, Table};
    use console::style;

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Time", "Severity", "Action", "Credential", "Actor"]);

    for entry in entries {
        table.add_row(vec![
            entry.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            colorize_severity(&entry.severity),
            output::colorize_action(&entry.action),
            entry.credential.clone(),
            entry.actor.clone().unwrap_or_else(|| "-".to_string()),
        ]);
    }

    println!(
        "{}",
        style(format!("{} audit entries:", entries.len())).bold()
    );
    println!("{table}");
}

fn colorize_severity(raw: &str) -> String {
    use console::style;

    match Severity::from_stored(raw) {
        Severity::Info => style(raw).dim().to_string(),
        Severity::Warning => style(raw).yellow().to_string(),
        Severity::Error => style(raw).red().bold().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditSink, SecurityEvent, CATEGORY_OPERATION};

    #[test]
    fn colorize_severity_returns_string() {
        assert!(!colorize_severity("info").is_empty());
        assert!(!colorize_severity("error").is_empty());
        assert!(!colorize_severity("unknown").is_empty());
    }

    #[test]
    fn audit_with_since_filter() {
        let dir = tempfile::TempDir::new().unwrap();
        let audit = AuditLog::open(dir.path()).unwrap();

        let event = SecurityEvent::new(
            CATEGORY_OPERATION,
            "db",
            "delete_success",
            Severity::Warning,
            None,
            None,
        );
        audit.log_security_event(&event).unwrap();

        // Query with "1h" should include recent entries.
        let since = Utc::now() - parse_duration("1h").unwrap();
        let entries = audit.query(10, Some(since)).unwrap();
        assert_eq!(entries.len(), 1);
    }
}

//! CLI module — Clap argument parser, output helpers, and command implementations.

pub mod commands;
pub mod output;

use std::collections::BTreeMap;
use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use crate::audit::{AuditSink, TracingAuditSink};
use crate::backend::FileBackend;
use crate::config::Settings;
use crate::errors::{CredVaultError, Result};
use crate::vault::{CredentialStore, HistoryStore, MemoryHistory, OpContext};

/// Subdirectory of the data dir holding credential records.
const RECORDS_DIR: &str = "records";

/// credvault CLI: credential lifecycle manager.
#[derive(Parser)]
#[command(
    name = "credvault",
    about = "Encrypted credential store with rotation and validation",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Data directory (default: `data_dir` from .credvault.toml, else .credvault)
    #[arg(long, global = true)]
    pub data_dir: Option<String>,

    /// Namespace the credentials live in (default: credvault)
    #[arg(long, global = true)]
    pub namespace: Option<String>,

    /// Base64 encryption key (generate one with `credvault keygen`)
    #[arg(
        long,
        global = true,
        env = "CREDVAULT_ENCRYPTION_KEY",
        hide_env_values = true
    )]
    pub encryption_key: Option<String>,

    /// Identity recorded in audit events and history
    #[arg(long, global = true, env = "CREDVAULT_ACTOR")]
    pub actor: Option<String>,
}

/// All available subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Create a new credential
    Set(WriteArgs),

    /// Overwrite an existing credential
    Update(WriteArgs),

    /// Print a credential's value
    Get {
        /// Credential name
        name: String,
        /// Print the whole credential as JSON
        #[arg(long)]
        json: bool,
    },

    /// List all credentials (values are never shown)
    List,

    /// Delete a credential
    Delete {
        /// Credential name
        name: String,
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Replace a credential's value and record the rotation
    Rotate {
        /// Credential name
        name: String,
        /// New value (omit for interactive prompt)
        value: Option<String>,
    },

    /// Score a stored credential
    Validate {
        /// Credential name
        name: String,
    },

    /// Show the lifecycle history of a credential
    History {
        /// Credential name
        name: String,
    },

    /// View the audit log of credential operations
    #[cfg(feature = "audit-log")]
    Audit {
        /// Number of entries to show (default: 50)
        #[arg(long, default_value = "50")]
        last: usize,
        /// Show entries since a duration ago (e.g. 7d, 24h, 30m)
        #[arg(long)]
        since: Option<String>,
    },

    /// Generate a new random encryption key
    Keygen,
}

/// Arguments shared by `set` and `update`.
#[derive(clap::Args)]
pub struct WriteArgs {
    /// Credential name (e.g. stripe-api)
    pub name: String,

    /// Credential value (omit for interactive prompt)
    pub value: Option<String>,

    /// Credential type: api_key, token, secret, certificate, password, oauth
    #[arg(short = 't', long = "type")]
    pub kind: Option<String>,

    /// Free-text description
    #[arg(short, long)]
    pub description: Option<String>,

    /// Tag (repeatable)
    #[arg(long = "tag")]
    pub tags: Vec<String>,

    /// Metadata entry as key=value (repeatable)
    #[arg(long = "meta")]
    pub meta: Vec<String>,

    /// Expire after a duration (e.g. 30d, 12h)
    #[arg(long)]
    pub expires_in: Option<String>,
}

// ---------------------------------------------------------------------------
// Shared helpers used by multiple commands
// ---------------------------------------------------------------------------

/// Load `.credvault.toml` from the working directory and apply CLI overrides.
pub fn load_settings(cli: &Cli) -> Result<Settings> {
    let cwd = std::env::current_dir()?;
    let mut settings = Settings::load(&cwd)?;

    if let Some(dir) = &cli.data_dir {
        settings.data_dir = dir.clone();
    }
    if let Some(ns) = &cli.namespace {
        settings.namespace = ns.clone();
    }
    settings.apply_key_override(cli.encryption_key.clone());
    Ok(settings)
}

/// Full path of the data directory, created if missing.
pub fn data_path(settings: &Settings) -> Result<PathBuf> {
    let cwd = std::env::current_dir()?;
    let path = settings.data_path(&cwd);
    std::fs::create_dir_all(&path).map_err(|_| CredVaultError::DataDir(path.clone()))?;
    Ok(path)
}

/// Open the file-backed store described by the CLI arguments.
pub fn open_store(cli: &Cli) -> Result<Arc<CredentialStore>> {
    let settings = load_settings(cli)?;
    let data_dir = data_path(&settings)?;
    let (audit, history) = audit_collaborators(&data_dir);

    let backend = Arc::new(FileBackend::new(data_dir.join(RECORDS_DIR)));
    let store = CredentialStore::builder(backend)
        .settings(&settings)?
        .audit_sink(audit)
        .history_store(history)
        .build();
    Ok(Arc::new(store))
}

/// The SQLite audit log serves as both sink and history when it opens;
/// otherwise events go to tracing and history stays in memory.
#[cfg(feature = "audit-log")]
fn audit_collaborators(data_dir: &std::path::Path) -> (Arc<dyn AuditSink>, Arc<dyn HistoryStore>) {
    match crate::audit::AuditLog::open(data_dir) {
        Ok(log) => {
            let log = Arc::new(log);
            let sink: Arc<dyn AuditSink> = log.clone();
            let history: Arc<dyn HistoryStore> = log;
            (sink, history)
        }
        Err(err) => {
            tracing::warn!(error = %err, "audit database unavailable, falling back to tracing");
            fallback_collaborators()
        }
    }
}

#[cfg(not(feature = "audit-log"))]
fn audit_collaborators(_data_dir: &std::path::Path) -> (Arc<dyn AuditSink>, Arc<dyn HistoryStore>) {
    fallback_collaborators()
}

fn fallback_collaborators() -> (Arc<dyn AuditSink>, Arc<dyn HistoryStore>) {
    let sink: Arc<dyn AuditSink> = Arc::new(TracingAuditSink);
    let history: Arc<dyn HistoryStore> = Arc::new(MemoryHistory::new());
    (sink, history)
}

/// Operation context carrying the acting identity.
///
/// Uses `--actor` / `CREDVAULT_ACTOR`, else the login name from `USER`.
pub fn op_context(cli: &Cli) -> OpContext {
    let actor = cli
        .actor
        .clone()
        .or_else(|| std::env::var("USER").ok())
        .filter(|a| !a.is_empty());
    match actor {
        Some(actor) => OpContext::background().with_actor(actor),
        None => OpContext::background(),
    }
}

/// Determine a credential value from one of three sources.
pub fn read_value(name: &str, value: Option<&str>) -> Result<String> {
    let secret_value = if let Some(v) = value {
        // Source 1: Inline value on the command line.
        output::warning("Value provided on command line — it may appear in shell history.");
        v.to_string()
    } else if !io::stdin().is_terminal() {
        // Source 2: Piped input (stdin is not a terminal).
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        buf.trim_end().to_string()
    } else {
        // Source 3: Interactive secure prompt (default).
        dialoguer::Password::new()
            .with_prompt(format!("Enter value for {name}"))
            .interact()
            .map_err(|e| CredVaultError::CommandFailed(format!("input prompt: {e}")))?
    };

    if secret_value.is_empty() {
        return Err(CredVaultError::InvalidInput(
            "credential value is required".into(),
        ));
    }
    Ok(secret_value)
}

/// Parse a human-friendly duration string like "7d", "24h", "30m".
pub fn parse_duration(input: &str) -> Result<chrono::Duration> {
    let input = input.trim();

    let (num_str, unit) = if let Some(s) = input.strip_suffix('d') {
        (s, 'd')
    } else if let Some(s) = input.strip_suffix('h') {
        (s, 'h')
    } else if let Some(s) = input.strip_suffix('m') {
        (s, 'm')
    } else {
        return Err(CredVaultError::CommandFailed(format!(
            "invalid duration '{input}' — use format like 7d, 24h, or 30m"
        )));
    };

    let num: i64 = num_str.parse().map_err(|_| {
        CredVaultError::CommandFailed(format!(
            "invalid duration '{input}' — number part is not valid"
        ))
    })?;

    let duration = match unit {
        'd' => chrono::Duration::try_days(num),
        'h' => chrono::Duration::try_hours(num),
        _ => chrono::Duration::try_minutes(num),
    };

    duration.ok_or_else(|| {
        CredVaultError::CommandFailed(format!("invalid duration '{input}' — out of range"))
    })
}

/// Parse repeated `key=value` arguments into a metadata map.
pub fn parse_metadata(entries: &[String]) -> Result<BTreeMap<String, String>> {
    let mut metadata = BTreeMap::new();
    for entry in entries {
        let (key, value) = entry.split_once('=').ok_or_else(|| {
            CredVaultError::InvalidInput(format!("metadata '{entry}' must look like key=value"))
        })?;
        if key.is_empty() {
            return Err(CredVaultError::InvalidInput(format!(
                "metadata '{entry}' has an empty key"
            )));
        }
        metadata.insert(key.to_string(), value.to_string());
    }
    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_units() {
        assert_eq!(parse_duration("7d").unwrap(), chrono::Duration::days(7));
        assert_eq!(parse_duration("24h").unwrap(), chrono::Duration::hours(24));
        assert_eq!(parse_duration(" 30m ").unwrap(), chrono::Duration::minutes(30));
    }

    #[test]
    fn parse_duration_invalid() {
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("7x").is_err());
        assert!(parse_duration("d").is_err());
        assert!(parse_duration(&format!("{}d", i64::MAX)).is_err());
    }

    #[test]
    fn metadata_pairs() {
        let meta = parse_metadata(&["owner=payments".into(), "url=https://x?a=b".into()]).unwrap();
        assert_eq!(meta["owner"], "payments");
        // Only the first '=' splits.
        assert_eq!(meta["url"], "https://x?a=b");
    }

    #[test]
    fn metadata_rejects_malformed_entries() {
        assert!(parse_metadata(&["no-equals".into()]).is_err());
        assert!(parse_metadata(&["=value".into()]).is_err());
    }

    #[test]
    fn cli_parses_write_flags() {
        let cli = Cli::try_parse_from([
            "credvault",
            "--namespace",
            "payments",
            "set",
            "stripe",
            "sk-live-abc",
            "--type",
            "token",
            "--tag",
            "prod",
            "--tag",
            "billing",
            "--meta",
            "owner=payments",
            "--expires-in",
            "30d",
        ])
        .unwrap();

        assert_eq!(cli.namespace.as_deref(), Some("payments"));
        match cli.command {
            Commands::Set(args) => {
                assert_eq!(args.name, "stripe");
                assert_eq!(args.value.as_deref(), Some("sk-live-abc"));
                assert_eq!(args.kind.as_deref(), Some("token"));
                assert_eq!(args.tags, ["prod", "billing"]);
                assert_eq!(args.meta, ["owner=payments"]);
                assert_eq!(args.expires_in.as_deref(), Some("30d"));
            }
            _ => panic!("expected set"),
        }
    }
}

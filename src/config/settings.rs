use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{CredVaultError, Result};

/// Environment variable that overrides `encryption_key`.
pub const ENCRYPTION_KEY_ENV: &str = "CREDVAULT_ENCRYPTION_KEY";

/// Project-level configuration, loaded from `.credvault.toml`.
///
/// Every field has a default so credvault works without any config file
/// at all (apart from the encryption key, which has no sensible default).
#[derive(Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Namespace the credential records live in.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Prefix of every record name (`<prefix>-<credential name>`).
    #[serde(default = "default_secret_prefix")]
    pub secret_prefix: String,

    /// Base64-encoded 32-byte key. Required when encryption is enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption_key: Option<String>,

    #[serde(default = "default_true")]
    pub enable_encryption: bool,

    #[serde(default = "default_true")]
    pub enable_audit_log: bool,

    /// Rotation policy in days; 0 disables the rotation monitor.
    #[serde(default = "default_auto_rotation_days")]
    pub auto_rotation_days: i64,

    /// Reject `set`/`update` input that fails validation with errors.
    #[serde(default = "default_true")]
    pub validation_enabled: bool,

    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Deadline for a single backend call; 0 means no deadline.
    #[serde(default = "default_op_timeout_secs")]
    pub op_timeout_secs: u64,

    /// Directory (relative to the project root) holding records and the audit db.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

// ── Serde default helpers ────────────────────────────────────────────

fn default_namespace() -> String {
    "credvault".to_string()
}

fn default_secret_prefix() -> String {
    "credvault-creds".to_string()
}

fn default_true() -> bool {
    true
}

fn default_auto_rotation_days() -> i64 {
    90
}

fn default_cache_ttl_secs() -> u64 {
    300 // 5 minutes
}

fn default_op_timeout_secs() -> u64 {
    30
}

fn default_data_dir() -> String {
    ".credvault".to_string()
}

// ── Implementation ───────────────────────────────────────────────────

impl Default for Settings {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            secret_prefix: default_secret_prefix(),
            encryption_key: None,
            enable_encryption: default_true(),
            enable_audit_log: default_true(),
            auto_rotation_days: default_auto_rotation_days(),
            validation_enabled: default_true(),
            cache_ttl_secs: default_cache_ttl_secs(),
            op_timeout_secs: default_op_timeout_secs(),
            data_dir: default_data_dir(),
        }
    }
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("namespace", &self.namespace)
            .field("secret_prefix", &self.secret_prefix)
            .field("encryption_key", &self.encryption_key.as_ref().map(|_| "<redacted>"))
            .field("enable_encryption", &self.enable_encryption)
            .field("enable_audit_log", &self.enable_audit_log)
            .field("auto_rotation_days", &self.auto_rotation_days)
            .field("validation_enabled", &self.validation_enabled)
            .field("cache_ttl_secs", &self.cache_ttl_secs)
            .field("op_timeout_secs", &self.op_timeout_secs)
            .field("data_dir", &self.data_dir)
            .finish()
    }
}

impl Settings {
    /// Name of the config file we look for in the project root.
    pub const FILE_NAME: &'static str = ".credvault.toml";

    /// Load settings from `<project_dir>/.credvault.toml`, then apply the
    /// `CREDVAULT_ENCRYPTION_KEY` override.
    ///
    /// If the file does not exist, defaults are returned.
    /// If the file exists but cannot be parsed, an error is returned.
    pub fn load(project_dir: &Path) -> Result<Self> {
        let mut settings = Self::load_file(project_dir)?;
        if let Ok(key) = std::env::var(ENCRYPTION_KEY_ENV) {
            settings.apply_key_override(Some(key));
        }
        Ok(settings)
    }

    /// Load only the file, without looking at the environment.
    pub fn load_file(project_dir: &Path) -> Result<Self> {
        let config_path = project_dir.join(Self::FILE_NAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path)?;

        let settings: Settings = toml::from_str(&contents).map_err(|e| {
            CredVaultError::ConfigError(format!("Failed to parse {}: {e}", config_path.display()))
        })?;

        Ok(settings)
    }

    /// Replace the configured key when `key` is present and non-empty.
    pub fn apply_key_override(&mut self, key: Option<String>) {
        if let Some(key) = key.filter(|k| !k.trim().is_empty()) {
            self.encryption_key = Some(key.trim().to_string());
        }
    }

    /// Full path of the data directory.
    ///
    /// Example: `project_dir/.credvault`
    pub fn data_path(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.data_dir)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Per-call backend deadline, `None` when disabled.
    pub fn op_timeout(&self) -> Option<Duration> {
        (self.op_timeout_secs > 0).then(|| Duration::from_secs(self.op_timeout_secs))
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn default_settings_are_sensible() {
        let s = Settings::default();
        assert_eq!(s.namespace, "credvault");
        assert_eq!(s.secret_prefix, "credvault-creds");
        assert!(s.encryption_key.is_none());
        assert!(s.enable_encryption);
        assert!(s.enable_audit_log);
        assert_eq!(s.auto_rotation_days, 90);
        assert!(s.validation_enabled);
        assert_eq!(s.cache_ttl(), Duration::from_secs(300));
        assert_eq!(s.op_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(s.data_dir, ".credvault");
    }

    #[test]
    fn load_returns_defaults_when_no_config_file() {
        let tmp = TempDir::new().unwrap();
        let settings = Settings::load_file(tmp.path()).unwrap();
        assert_eq!(settings.namespace, "credvault");
    }

    #[test]
    fn load_parses_toml_file() {
        let tmp = TempDir::new().unwrap();
        let config = r#"
namespace = "payments"
secret_prefix = "pay"
encryption_key = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA="
enable_encryption = false
enable_audit_log = false
auto_rotation_days = 30
validation_enabled = false
cache_ttl_secs = 60
op_timeout_secs = 0
data_dir = "secrets"
"#;
        fs::write(tmp.path().join(".credvault.toml"), config).unwrap();

        let settings = Settings::load_file(tmp.path()).unwrap();
        assert_eq!(settings.namespace, "payments");
        assert_eq!(settings.secret_prefix, "pay");
        assert!(settings.encryption_key.is_some());
        assert!(!settings.enable_encryption);
        assert!(!settings.enable_audit_log);
        assert_eq!(settings.auto_rotation_days, 30);
        assert!(!settings.validation_enabled);
        assert_eq!(settings.cache_ttl(), Duration::from_secs(60));
        assert_eq!(settings.op_timeout(), None);
        assert_eq!(settings.data_path(tmp.path()), tmp.path().join("secrets"));
    }

    #[test]
    fn load_uses_defaults_for_missing_fields() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(".credvault.toml"), "namespace = \"prod\"\n").unwrap();

        let settings = Settings::load_file(tmp.path()).unwrap();
        assert_eq!(settings.namespace, "prod");
        // Rest should be defaults
        assert_eq!(settings.secret_prefix, "credvault-creds");
        assert_eq!(settings.auto_rotation_days, 90);
    }

    #[test]
    fn load_errors_on_invalid_toml() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(".credvault.toml"), "not valid {{toml").unwrap();

        let result = Settings::load_file(tmp.path());
        assert!(matches!(result, Err(CredVaultError::ConfigError(_))));
    }

    #[test]
    fn key_override_ignores_blank_values() {
        let mut s = Settings {
            encryption_key: Some("from-file".into()),
            ..Settings::default()
        };
        s.apply_key_override(Some("   ".into()));
        assert_eq!(s.encryption_key.as_deref(), Some("from-file"));

        s.apply_key_override(Some(" from-env\n".into()));
        assert_eq!(s.encryption_key.as_deref(), Some("from-env"));

        s.apply_key_override(None);
        assert_eq!(s.encryption_key.as_deref(), Some("from-env"));
    }

    #[test]
    fn debug_redacts_the_key() {
        let s = Settings {
            encryption_key: Some("super-secret".into()),
            ..Settings::default()
        };
        let rendered = format!("{s:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}

use std::path::PathBuf;

use thiserror::Error;

/// Failures of the AES-256-GCM value cipher.
#[derive(Debug, Error)]
pub enum CipherError {
    #[error("Encryption is enabled but no encryption key is configured")]
    MissingKey,

    #[error("Invalid encryption key: {0}")]
    InvalidKey(String),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Decryption failed — {0}")]
    Decryption(String),
}

/// Failures mapping a credential to or from a backend record.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Invalid credential name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("Record '{0}' does not carry the configured credential prefix")]
    ForeignRecord(String),

    #[error("Record '{record}' is missing field '{field}'")]
    MissingField { record: String, field: &'static str },

    #[error("Record '{record}' has an invalid '{field}' field: {reason}")]
    InvalidField {
        record: String,
        field: &'static str,
        reason: String,
    },

    #[error("Record '{record}' has an invalid '{field}' timestamp")]
    InvalidTimestamp {
        record: String,
        field: &'static str,
        #[source]
        source: chrono::ParseError,
    },

    #[error("Metadata key '{0}' is empty, malformed, or uses the reserved prefix")]
    InvalidMetadataKey(String),

    #[error("Tag '{0}' is empty or contains a comma")]
    InvalidTag(String),

    #[error("Record '{0}' is encrypted but encryption is disabled")]
    EncryptionDisabled(String),

    #[error("Cipher error: {0}")]
    Cipher(#[from] CipherError),
}

/// Failures reported by a [`SecretBackend`](crate::backend::SecretBackend).
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Record '{0}' not found")]
    NotFound(String),

    #[error("Record '{0}' already exists")]
    AlreadyExists(String),

    #[error("Backend IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Backend serialization error: {0}")]
    Serialization(String),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

/// Failures of an [`AuditSink`](crate::audit::AuditSink) or history store.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Audit log unavailable: {0}")]
    Unavailable(String),

    #[error("Audit write failed: {0}")]
    Write(String),
}

/// All errors that can occur in credvault.
#[derive(Debug, Error)]
pub enum CredVaultError {
    // --- Caller input ---
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // --- Lookup / lifecycle ---
    #[error("Credential '{0}' not found")]
    NotFound(String),

    #[error("Credential '{0}' already exists (use `update` to change it)")]
    Conflict(String),

    // --- Data integrity ---
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Cipher error: {0}")]
    Cipher(#[from] CipherError),

    // --- External collaborators ---
    #[error("Secret store error: {0}")]
    ExternalStore(#[source] BackendError),

    #[error("Operation canceled: {0}")]
    Canceled(String),

    #[error("Audit error: {0}")]
    Audit(#[from] AuditError),

    // --- Config errors ---
    #[error("Config file error: {0}")]
    ConfigError(String),

    #[error("Data directory {0} is not usable")]
    DataDir(PathBuf),

    // --- IO errors ---
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // --- CLI errors ---
    #[error("Command failed: {0}")]
    CommandFailed(String),

    // --- Context wrapper added by every store operation ---
    #[error("{op} '{name}' failed: {source}")]
    Operation {
        op: &'static str,
        name: String,
        #[source]
        source: Box<CredVaultError>,
    },
}

impl CredVaultError {
    /// Wrap this error with the store operation and credential it came from.
    pub fn context(self, op: &'static str, name: &str) -> Self {
        CredVaultError::Operation {
            op,
            name: name.to_string(),
            source: Box::new(self),
        }
    }

    /// The underlying error with every `Operation` layer peeled off.
    pub fn kind(&self) -> &CredVaultError {
        match self {
            CredVaultError::Operation { source, .. } => source.kind(),
            other => other,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.kind(), CredVaultError::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self.kind(), CredVaultError::Conflict(_))
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self.kind(), CredVaultError::Canceled(_))
    }
}

impl From<BackendError> for CredVaultError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::NotFound(name) => CredVaultError::NotFound(name),
            BackendError::AlreadyExists(name) => CredVaultError::Conflict(name),
            other => CredVaultError::ExternalStore(other),
        }
    }
}

/// Convenience type alias for credvault results.
pub type Result<T> = std::result::Result<T, CredVaultError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_peels_operation_layers() {
        let err = CredVaultError::NotFound("db-pass".into())
            .context("get", "db-pass")
            .context("rotate", "db-pass");

        assert!(err.is_not_found());
        assert!(matches!(err.kind(), CredVaultError::NotFound(n) if n == "db-pass"));
        assert!(err.to_string().starts_with("rotate 'db-pass' failed"));
    }

    #[test]
    fn backend_errors_map_to_taxonomy() {
        let not_found: CredVaultError = BackendError::NotFound("x".into()).into();
        assert!(not_found.is_not_found());

        let conflict: CredVaultError = BackendError::AlreadyExists("x".into()).into();
        assert!(conflict.is_conflict());

        let other: CredVaultError = BackendError::Unavailable("down".into()).into();
        assert!(matches!(other, CredVaultError::ExternalStore(_)));
    }
}

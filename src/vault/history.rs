//! Lifecycle history of credentials.
//!
//! History entries are append-only.  The store writes them best-effort:
//! a failed append is logged and never undoes the operation it describes.

use std::collections::HashMap;

use parking_lot::RwLock;

use super::credential::CredentialHistoryEntry;
use crate::errors::AuditError;

/// Where lifecycle entries are kept.
pub trait HistoryStore: Send + Sync {
    fn append(&self, entry: &CredentialHistoryEntry) -> Result<(), AuditError>;

    /// Entries for `credential`, oldest first.
    fn list(&self, credential: &str) -> Result<Vec<CredentialHistoryEntry>, AuditError>;
}

/// Process-local history, lost on restart.
#[derive(Debug, Default)]
pub struct MemoryHistory {
    entries: RwLock<HashMap<String, Vec<CredentialHistoryEntry>>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HistoryStore for MemoryHistory {
    fn append(&self, entry: &CredentialHistoryEntry) -> Result<(), AuditError> {
        self.entries
            .write()
            .entry(entry.credential.clone())
            .or_default()
            .push(entry.clone());
        Ok(())
    }

    fn list(&self, credential: &str) -> Result<Vec<CredentialHistoryEntry>, AuditError> {
        Ok(self
            .entries
            .read()
            .get(credential)
            .cloned()
            .unwrap_or_default())
    }
}

//! In-process secret store.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{LabelSelector, Record, SecretBackend};
use crate::errors::BackendError;

/// A `SecretBackend` that keeps records in memory, keyed by
/// `(namespace, name)`.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    records: RwLock<HashMap<(String, String), Record>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records across all namespaces.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Store a record as-is, bypassing the create/update contract.
    ///
    /// Lets tests plant malformed or foreign records.
    pub fn insert_raw(&self, namespace: &str, record: Record) {
        self.records
            .write()
            .insert((namespace.to_string(), record.name.clone()), record);
    }

    fn key(namespace: &str, name: &str) -> (String, String) {
        (namespace.to_string(), name.to_string())
    }
}

#[async_trait]
impl SecretBackend for MemoryBackend {
    async fn create(&self, namespace: &str, record: Record) -> Result<Record, BackendError> {
        let mut records = self.records.write();
        let key = Self::key(namespace, &record.name);
        if records.contains_key(&key) {
            return Err(BackendError::AlreadyExists(record.name));
        }
        records.insert(key, record.clone());
        Ok(record)
    }

    async fn get(&self, namespace: &str, name: &str) -> Result<Record, BackendError> {
        self.records
            .read()
            .get(&Self::key(namespace, name))
            .cloned()
            .ok_or_else(|| BackendError::NotFound(name.to_string()))
    }

    async fn update(&self, namespace: &str, record: Record) -> Result<Record, BackendError> {
        let mut records = self.records.write();
        match records.get_mut(&Self::key(namespace, &record.name)) {
            Some(slot) => {
                *slot = record.clone();
                Ok(record)
            }
            None => Err(BackendError::NotFound(record.name)),
        }
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), BackendError> {
        self.records
            .write()
            .remove(&Self::key(namespace, name))
            .map(|_| ())
            .ok_or_else(|| BackendError::NotFound(name.to_string()))
    }

    async fn list(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<Record>, BackendError> {
        let mut matching: Vec<Record> = self
            .records
            .read()
            .iter()
            .filter(|((ns, _), record)| ns == namespace && selector.matches(&record.labels))
            .map(|(_, record)| record.clone())
            .collect();
        matching.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(matching)
    }
}

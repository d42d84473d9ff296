//! External secret store boundary.
//!
//! The credential store never persists anything itself; it talks to a
//! namespaced record store through [`SecretBackend`].  Two backends ship
//! with the crate:
//! - [`MemoryBackend`]: process-local, used by tests and embedders
//! - [`FileBackend`]: one JSON document per record under a directory

pub mod file;
pub mod memory;

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::BackendError;

pub use file::FileBackend;
pub use memory::MemoryBackend;

/// A named record in the external store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub name: String,

    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    #[serde(default)]
    pub annotations: BTreeMap<String, String>,

    /// Byte-valued fields, serialized as base64 strings in JSON.
    #[serde(default, with = "base64_map")]
    pub data: BTreeMap<String, Vec<u8>>,
}

impl Record {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Read a data field as UTF-8 text.
    pub fn data_str(&self, field: &str) -> Option<&str> {
        self.data
            .get(field)
            .and_then(|bytes| std::str::from_utf8(bytes).ok())
    }
}

/// Equality-based label filter (`key=value,key2=value2`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSelector {
    terms: Vec<(String, String)>,
}

impl LabelSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `key` to equal `value`.
    pub fn require(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.terms.push((key.into(), value.into()));
        self
    }

    /// Returns `true` if every term matches `labels`.
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.terms
            .iter()
            .all(|(k, v)| labels.get(k).is_some_and(|actual| actual == v))
    }
}

impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.terms.iter().map(|(k, v)| format!("{k}={v}")).collect();
        f.write_str(&rendered.join(","))
    }
}

/// The contract required from the external secret store.
///
/// `create` must be atomic and non-overwriting: it fails with
/// [`BackendError::AlreadyExists`] when a record of that name exists.
/// `get`, `update` and `delete` fail with [`BackendError::NotFound`] when
/// the record is absent.
#[async_trait]
pub trait SecretBackend: Send + Sync {
    async fn create(&self, namespace: &str, record: Record) -> Result<Record, BackendError>;

    async fn get(&self, namespace: &str, name: &str) -> Result<Record, BackendError>;

    async fn update(&self, namespace: &str, record: Record) -> Result<Record, BackendError>;

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), BackendError>;

    async fn list(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<Record>, BackendError>;
}

// ---------------------------------------------------------------------------
// Serde helpers for base64-encoded byte maps
// ---------------------------------------------------------------------------

mod base64_map {
    use std::collections::BTreeMap;

    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S>(
        data: &BTreeMap<String, Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_map(data.iter().map(|(k, v)| (k, BASE64.encode(v))))
    }

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<BTreeMap<String, Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = BTreeMap::<String, String>::deserialize(deserializer)?;
        encoded
            .into_iter()
            .map(|(k, v)| {
                BASE64
                    .decode(&v)
                    .map(|bytes| (k, bytes))
                    .map_err(serde::de::Error::custom)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_matches_all_terms() {
        let mut labels = BTreeMap::new();
        labels.insert("type".to_string(), "credential".to_string());
        labels.insert("managed-by".to_string(), "credvault".to_string());

        let selector = LabelSelector::new()
            .require("type", "credential")
            .require("managed-by", "credvault");
        assert!(selector.matches(&labels));
        assert_eq!(selector.to_string(), "type=credential,managed-by=credvault");

        let other = LabelSelector::new().require("type", "config");
        assert!(!other.matches(&labels));
        assert!(LabelSelector::new().matches(&labels));
    }

    #[test]
    fn record_data_is_base64_in_json() {
        let mut record = Record::new("creds-db");
        record.data.insert("value".into(), b"hello".to_vec());

        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"value\":\"aGVsbG8=\""));

        let back: Record = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
        assert_eq!(back.data_str("value"), Some("hello"));
    }
}

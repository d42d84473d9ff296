//! Directory-backed secret store.
//!
//! Layout: `<root>/<namespace>/<record-name>.json`, one JSON document per
//! record.  Writes go to a temp file in the same directory first:
//! - `create` hard-links the temp file into place, which fails if the
//!   target exists, so creation is atomic and never overwrites
//! - `update` renames the temp file over the target
//!
//! Readers never see a half-written record.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use uuid::Uuid;

use super::{LabelSelector, Record, SecretBackend};
use crate::errors::BackendError;

/// A `SecretBackend` persisting records as JSON files under `root`.
#[derive(Debug, Clone)]
pub struct FileBackend {
    root: PathBuf,
}

impl FileBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn namespace_dir(&self, namespace: &str) -> Result<PathBuf, BackendError> {
        validate_path_component(namespace)?;
        Ok(self.root.join(namespace))
    }

    fn record_path(&self, namespace: &str, name: &str) -> Result<PathBuf, BackendError> {
        validate_path_component(name)?;
        Ok(self.namespace_dir(namespace)?.join(format!("{name}.json")))
    }

    /// Serialize `record` into a fresh temp file next to its final path.
    async fn write_temp(&self, dir: &Path, record: &Record) -> Result<PathBuf, BackendError> {
        let buf = serde_json::to_vec_pretty(record)
            .map_err(|e| BackendError::Serialization(format!("{}: {e}", record.name)))?;

        fs::create_dir_all(dir).await?;
        let tmp_path = dir.join(format!(".{}.{}.tmp", record.name, Uuid::new_v4().simple()));
        fs::write(&tmp_path, &buf).await?;
        restrict_permissions(&tmp_path).await;
        Ok(tmp_path)
    }
}

#[async_trait]
impl SecretBackend for FileBackend {
    async fn create(&self, namespace: &str, record: Record) -> Result<Record, BackendError> {
        let path = self.record_path(namespace, &record.name)?;
        let dir = self.namespace_dir(namespace)?;
        let tmp_path = self.write_temp(&dir, &record).await?;

        let linked = fs::hard_link(&tmp_path, &path).await;
        let _ = fs::remove_file(&tmp_path).await;

        match linked {
            Ok(()) => Ok(record),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                Err(BackendError::AlreadyExists(record.name))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, namespace: &str, name: &str) -> Result<Record, BackendError> {
        let path = self.record_path(namespace, name)?;
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(BackendError::NotFound(name.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes)
            .map_err(|e| BackendError::Serialization(format!("{}: {e}", path.display())))
    }

    async fn update(&self, namespace: &str, record: Record) -> Result<Record, BackendError> {
        let path = self.record_path(namespace, &record.name)?;
        if !fs::try_exists(&path).await? {
            return Err(BackendError::NotFound(record.name));
        }

        let dir = self.namespace_dir(namespace)?;
        let tmp_path = self.write_temp(&dir, &record).await?;
        if let Err(e) = fs::rename(&tmp_path, &path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }
        Ok(record)
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), BackendError> {
        let path = self.record_path(namespace, name)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(BackendError::NotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<Record>, BackendError> {
        let dir = self.namespace_dir(namespace)?;
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_record = path.extension().is_some_and(|ext| ext == "json")
                && !entry.file_name().to_string_lossy().starts_with('.');
            if !is_record {
                continue;
            }

            let bytes = fs::read(&path).await?;
            match serde_json::from_slice::<Record>(&bytes) {
                Ok(record) if selector.matches(&record.labels) => records.push(record),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable record file");
                }
            }
        }

        records.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(records)
    }
}

/// Reject names that would escape the backend root or collide with temp files.
fn validate_path_component(component: &str) -> Result<(), BackendError> {
    let safe = !component.is_empty()
        && !component.starts_with('.')
        && component
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-' || b == b'.');
    if safe {
        Ok(())
    } else {
        Err(BackendError::Unavailable(format!(
            "'{component}' is not a valid file backend name"
        )))
    }
}

/// Owner-only permissions on record files.
async fn restrict_permissions(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        let _ = fs::set_permissions(path, perms).await;
    }
    #[cfg(not(unix))]
    let _ = path;
}

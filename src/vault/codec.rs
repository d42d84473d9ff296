//! Mapping between `Credential` and the external store's `Record`.
//!
//! Record layout:
//!
//! | where        | key                              | contents                          |
//! |--------------|----------------------------------|-----------------------------------|
//! | name         | `<prefix>-<credential name>`     |                                   |
//! | labels       | `credvault.io/type`              | `credential`                      |
//! |              | `credvault.io/cred-type`         | credential type                   |
//! |              | `credvault.io/managed-by`        | `credvault`                       |
//! | data         | `value`                          | base64 AEAD blob, or plaintext    |
//! |              | `type`, `description`            | text                              |
//! |              | `encrypted`                      | `true` / `false`                  |
//! |              | `created_at`, `updated_at`, ...  | RFC 3339 with sub-second digits   |
//! | annotations  | `credvault.io/meta-<key>`        | one per metadata entry            |
//! |              | `credvault.io/tags`              | comma-joined tags                 |
//!
//! Everything under the reserved `credvault.io/` prefix belongs to the
//! codec.  Metadata keys and tags are checked on encode so that nothing a
//! caller supplies can collide with it or be split differently on decode.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};

use super::credential::{Credential, CredentialInfo, CredentialStatus, CredentialType};
use crate::backend::{LabelSelector, Record};
use crate::crypto::Cipher;
use crate::errors::CodecError;

/// Prefix reserved for codec-owned labels and annotations.
pub const RESERVED_PREFIX: &str = "credvault.io/";

pub const LABEL_TYPE: &str = "credvault.io/type";
pub const LABEL_CRED_TYPE: &str = "credvault.io/cred-type";
pub const LABEL_MANAGED_BY: &str = "credvault.io/managed-by";
pub const LABEL_TYPE_VALUE: &str = "credential";
pub const MANAGED_BY_VALUE: &str = "credvault";

pub const META_ANNOTATION_PREFIX: &str = "credvault.io/meta-";
pub const TAGS_ANNOTATION: &str = "credvault.io/tags";

const FIELD_VALUE: &str = "value";
const FIELD_TYPE: &str = "type";
const FIELD_DESCRIPTION: &str = "description";
const FIELD_ENCRYPTED: &str = "encrypted";
const FIELD_CREATED_AT: &str = "created_at";
const FIELD_UPDATED_AT: &str = "updated_at";
const FIELD_EXPIRES_AT: &str = "expires_at";
const FIELD_ROTATED_AT: &str = "rotated_at";

/// Longest credential name accepted, leaving room for the record prefix.
pub const MAX_NAME_LEN: usize = 200;

/// Typed, bidirectional credential codec.
#[derive(Debug, Clone)]
pub struct CredentialCodec {
    prefix: String,
    cipher: Cipher,
}

impl CredentialCodec {
    pub fn new(prefix: impl Into<String>, cipher: Cipher) -> Self {
        Self {
            prefix: prefix.into(),
            cipher,
        }
    }

    pub fn cipher(&self) -> &Cipher {
        &self.cipher
    }

    /// Whether encoded values are ciphertext.
    pub fn encrypts(&self) -> bool {
        self.cipher.is_enabled()
    }

    /// Selector matching every record this codec produces.
    pub fn selector(&self) -> LabelSelector {
        LabelSelector::new()
            .require(LABEL_TYPE, LABEL_TYPE_VALUE)
            .require(LABEL_MANAGED_BY, MANAGED_BY_VALUE)
    }

    /// Derive the record name for a credential name.
    pub fn record_name(&self, name: &str) -> Result<String, CodecError> {
        validate_name(name)?;
        Ok(format!("{}-{name}", self.prefix))
    }

    /// Recover the credential name from a record name.
    pub fn credential_name(&self, record_name: &str) -> Result<String, CodecError> {
        let name = record_name
            .strip_prefix(self.prefix.as_str())
            .and_then(|rest| rest.strip_prefix('-'))
            .ok_or_else(|| CodecError::ForeignRecord(record_name.to_string()))?;
        validate_name(name)?;
        Ok(name.to_string())
    }

    /// Encode a credential, encrypting its value when the cipher is enabled.
    pub fn to_record(&self, cred: &Credential) -> Result<Record, CodecError> {
        let mut record = Record::new(self.record_name(&cred.name)?);

        record.labels.insert(LABEL_TYPE.into(), LABEL_TYPE_VALUE.into());
        record
            .labels
            .insert(LABEL_CRED_TYPE.into(), cred.kind.as_str().into());
        record
            .labels
            .insert(LABEL_MANAGED_BY.into(), MANAGED_BY_VALUE.into());

        self.write_fields(&mut record, cred)?;
        write_annotations(&mut record.annotations, cred)?;
        Ok(record)
    }

    /// Overwrite the mutable parts of `existing` with `cred`.
    ///
    /// Keeps the record's `created_at`, `type` and labels; replaces every
    /// codec-owned annotation and leaves foreign annotations alone.
    pub fn merge_into(&self, existing: &Record, cred: &Credential) -> Result<Record, CodecError> {
        let created_at = existing
            .data
            .get(FIELD_CREATED_AT)
            .cloned()
            .ok_or_else(|| CodecError::MissingField {
                record: existing.name.clone(),
                field: FIELD_CREATED_AT,
            })?;
        let kind = existing.data.get(FIELD_TYPE).cloned();

        let mut record = existing.clone();
        self.write_fields(&mut record, cred)?;
        record.data.insert(FIELD_CREATED_AT.into(), created_at);
        if let Some(kind) = kind {
            record.data.insert(FIELD_TYPE.into(), kind);
        }
        if cred.expires_at.is_none() {
            record.data.remove(FIELD_EXPIRES_AT);
        }

        record
            .annotations
            .retain(|key, _| !key.starts_with(RESERVED_PREFIX));
        write_annotations(&mut record.annotations, cred)?;
        Ok(record)
    }

    /// Decode a record, decrypting the value when it is marked encrypted.
    pub fn from_record(&self, record: &Record) -> Result<Credential, CodecError> {
        let name = self.credential_name(&record.name)?;
        let encrypted = read_encrypted(record)?;

        let stored = record
            .data_str(FIELD_VALUE)
            .ok_or_else(|| CodecError::MissingField {
                record: record.name.clone(),
                field: FIELD_VALUE,
            })?;

        let value = if encrypted {
            if !self.cipher.is_enabled() {
                return Err(CodecError::EncryptionDisabled(record.name.clone()));
            }
            self.cipher.decrypt(stored)?
        } else {
            stored.to_string()
        };

        Ok(Credential {
            name,
            kind: read_type(record)?,
            value,
            encrypted,
            metadata: read_metadata(record),
            tags: read_tags(record),
            description: record.data_str(FIELD_DESCRIPTION).unwrap_or_default().to_string(),
            created_at: read_required_time(record, FIELD_CREATED_AT)?,
            updated_at: read_required_time(record, FIELD_UPDATED_AT)?,
            expires_at: read_optional_time(record, FIELD_EXPIRES_AT)?,
            rotated_at: read_optional_time(record, FIELD_ROTATED_AT)?,
        })
    }

    /// Decode the value-free projection. The value field is never read.
    pub fn info_from_record(&self, record: &Record) -> Result<CredentialInfo, CodecError> {
        let expires_at = read_optional_time(record, FIELD_EXPIRES_AT)?;
        Ok(CredentialInfo {
            name: self.credential_name(&record.name)?,
            kind: read_type(record)?,
            description: record.data_str(FIELD_DESCRIPTION).unwrap_or_default().to_string(),
            metadata: read_metadata(record),
            tags: read_tags(record),
            encrypted: read_encrypted(record)?,
            created_at: read_required_time(record, FIELD_CREATED_AT)?,
            updated_at: read_required_time(record, FIELD_UPDATED_AT)?,
            expires_at,
            rotated_at: read_optional_time(record, FIELD_ROTATED_AT)?,
            status: CredentialStatus::from_expiry(expires_at),
        })
    }

    fn write_fields(&self, record: &mut Record, cred: &Credential) -> Result<(), CodecError> {
        let value = self.cipher.encrypt(&cred.value)?;
        let encrypted = self.cipher.is_enabled();

        let data = &mut record.data;
        data.insert(FIELD_VALUE.into(), value.into_bytes());
        data.insert(FIELD_TYPE.into(), cred.kind.as_str().as_bytes().to_vec());
        data.insert(FIELD_DESCRIPTION.into(), cred.description.as_bytes().to_vec());
        data.insert(FIELD_ENCRYPTED.into(), encrypted.to_string().into_bytes());
        data.insert(FIELD_CREATED_AT.into(), format_time(cred.created_at));
        data.insert(FIELD_UPDATED_AT.into(), format_time(cred.updated_at));
        if let Some(t) = cred.expires_at {
            data.insert(FIELD_EXPIRES_AT.into(), format_time(t));
        }
        if let Some(t) = cred.rotated_at {
            data.insert(FIELD_ROTATED_AT.into(), format_time(t));
        }
        Ok(())
    }
}

/// Validate a credential name.
///
/// Allowed: ASCII letters, digits, underscores, hyphens, periods.
/// Must be non-empty and at most `MAX_NAME_LEN` characters.
pub fn validate_name(name: &str) -> Result<(), CodecError> {
    let invalid = |reason: &str| CodecError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.is_empty() {
        return Err(invalid("name cannot be empty"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(invalid("name is too long"));
    }
    if name.starts_with('.') {
        return Err(invalid("name cannot start with a period"));
    }
    if !name
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-' || b == b'.')
    {
        return Err(invalid(
            "only ASCII letters, digits, underscores, hyphens, and periods are allowed",
        ));
    }
    Ok(())
}

fn validate_metadata_key(key: &str) -> Result<(), CodecError> {
    let well_formed = !key.is_empty()
        && key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-' || b == b'.');
    if !well_formed || key.starts_with(RESERVED_PREFIX) {
        return Err(CodecError::InvalidMetadataKey(key.to_string()));
    }
    Ok(())
}

fn write_annotations(
    annotations: &mut BTreeMap<String, String>,
    cred: &Credential,
) -> Result<(), CodecError> {
    for (key, value) in &cred.metadata {
        validate_metadata_key(key)?;
        annotations.insert(format!("{META_ANNOTATION_PREFIX}{key}"), value.clone());
    }

    if !cred.tags.is_empty() {
        if let Some(bad) = cred.tags.iter().find(|t| t.is_empty() || t.contains(',')) {
            return Err(CodecError::InvalidTag(bad.clone()));
        }
        annotations.insert(TAGS_ANNOTATION.into(), cred.tags.join(","));
    }
    Ok(())
}

fn read_metadata(record: &Record) -> BTreeMap<String, String> {
    record
        .annotations
        .iter()
        .filter_map(|(key, value)| {
            key.strip_prefix(META_ANNOTATION_PREFIX)
                .map(|k| (k.to_string(), value.clone()))
        })
        .collect()
}

fn read_tags(record: &Record) -> Vec<String> {
    match record.annotations.get(TAGS_ANNOTATION) {
        Some(joined) if !joined.is_empty() => joined.split(',').map(str::to_string).collect(),
        _ => Vec::new(),
    }
}

fn read_type(record: &Record) -> Result<CredentialType, CodecError> {
    match record.data_str(FIELD_TYPE) {
        None | Some("") => Ok(CredentialType::default()),
        Some(raw) => raw.parse().map_err(|_| CodecError::InvalidField {
            record: record.name.clone(),
            field: FIELD_TYPE,
            reason: format!("unknown credential type '{raw}'"),
        }),
    }
}

fn read_encrypted(record: &Record) -> Result<bool, CodecError> {
    match record.data_str(FIELD_ENCRYPTED) {
        None | Some("false") => Ok(false),
        Some("true") => Ok(true),
        Some(other) => Err(CodecError::InvalidField {
            record: record.name.clone(),
            field: FIELD_ENCRYPTED,
            reason: format!("expected true or false, got '{other}'"),
        }),
    }
}

fn format_time(t: DateTime<Utc>) -> Vec<u8> {
    t.to_rfc3339_opts(SecondsFormat::AutoSi, true).into_bytes()
}

fn parse_time(
    record: &Record,
    field: &'static str,
    raw: &str,
) -> Result<DateTime<Utc>, CodecError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|source| CodecError::InvalidTimestamp {
            record: record.name.clone(),
            field,
            source,
        })
}

fn read_required_time(record: &Record, field: &'static str) -> Result<DateTime<Utc>, CodecError> {
    let raw = record.data_str(field).ok_or_else(|| CodecError::MissingField {
        record: record.name.clone(),
        field,
    })?;
    parse_time(record, field, raw)
}

fn read_optional_time(
    record: &Record,
    field: &'static str,
) -> Result<Option<DateTime<Utc>>, CodecError> {
    record
        .data_str(field)
        .map(|raw| parse_time(record, field, raw))
        .transpose()
}

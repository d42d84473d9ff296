//! Credential types handled by the store.
//!
//! A `Credential` always carries its plaintext value in memory; only the
//! codec ever sees ciphertext.  `CredentialInfo` is the listing
//! projection and has no value field at all.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::CredVaultError;

/// Kind of credential; drives the per-type validation rules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialType {
    #[default]
    ApiKey,
    Token,
    Secret,
    Certificate,
    Password,
    #[serde(rename = "oauth")]
    OAuth,
}

impl CredentialType {
    pub const ALL: [CredentialType; 6] = [
        CredentialType::ApiKey,
        CredentialType::Token,
        CredentialType::Secret,
        CredentialType::Certificate,
        CredentialType::Password,
        CredentialType::OAuth,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialType::ApiKey => "api_key",
            CredentialType::Token => "token",
            CredentialType::Secret => "secret",
            CredentialType::Certificate => "certificate",
            CredentialType::Password => "password",
            CredentialType::OAuth => "oauth",
        }
    }
}

impl fmt::Display for CredentialType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CredentialType {
    type Err = CredVaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CredentialType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| CredVaultError::InvalidInput(format!("unknown credential type '{s}'")))
    }
}

/// A named sensitive value with lifecycle metadata.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub name: String,

    #[serde(rename = "type")]
    pub kind: CredentialType,

    /// Plaintext value. Never printed by `Debug`.
    pub value: String,

    /// Whether the persisted form of `value` is ciphertext.
    pub encrypted: bool,

    #[serde(default)]
    pub metadata: BTreeMap<String, String>,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub description: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotated_at: Option<DateTime<Utc>>,
}

impl Credential {
    /// A new credential stamped with the current time.
    pub fn new(name: impl Into<String>, kind: CredentialType, value: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            kind,
            value: value.into(),
            created_at: now,
            updated_at: now,
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Returns `true` once `expires_at` is in the past.
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|t| t < Utc::now())
    }

    /// The value-free projection used for listing.
    pub fn info(&self) -> CredentialInfo {
        CredentialInfo {
            name: self.name.clone(),
            kind: self.kind,
            description: self.description.clone(),
            metadata: self.metadata.clone(),
            tags: self.tags.clone(),
            encrypted: self.encrypted,
            created_at: self.created_at,
            updated_at: self.updated_at,
            expires_at: self.expires_at,
            rotated_at: self.rotated_at,
            status: CredentialStatus::from_expiry(self.expires_at),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("value", &"<redacted>")
            .field("encrypted", &self.encrypted)
            .field("metadata", &self.metadata)
            .field("tags", &self.tags)
            .field("description", &self.description)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .field("expires_at", &self.expires_at)
            .field("rotated_at", &self.rotated_at)
            .finish()
    }
}

/// Derived lifecycle status shown in listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialStatus {
    Active,
    Expired,
}

impl CredentialStatus {
    pub fn from_expiry(expires_at: Option<DateTime<Utc>>) -> Self {
        match expires_at {
            Some(t) if t < Utc::now() => CredentialStatus::Expired,
            _ => CredentialStatus::Active,
        }
    }
}

impl fmt::Display for CredentialStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialStatus::Active => f.write_str("active"),
            CredentialStatus::Expired => f.write_str("expired"),
        }
    }
}

/// Non-sensitive information about a credential (no value).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialInfo {
    pub name: String,

    #[serde(rename = "type")]
    pub kind: CredentialType,

    pub description: String,
    pub metadata: BTreeMap<String, String>,
    pub tags: Vec<String>,
    pub encrypted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotated_at: Option<DateTime<Utc>>,

    pub status: CredentialStatus,
}

impl CredentialInfo {
    /// Timestamp rotation age is measured from.
    pub fn last_rotation(&self) -> DateTime<Utc> {
        self.rotated_at.unwrap_or(self.created_at)
    }
}

/// Outcome of running the validation engine over a credential.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,

    /// Starts at 100 and drops per issue; may go below zero.
    pub score: i32,

    #[serde(default, skip_serializing_if = "Option::is_none", with = "duration_secs")]
    pub expires_in: Option<chrono::Duration>,

    pub last_tested: DateTime<Utc>,
}

impl ValidationResult {
    /// Score limited to 0..=100 for display.
    pub fn clamped_score(&self) -> u8 {
        self.score.clamp(0, 100) as u8
    }
}

/// A recorded lifecycle event (create, update, rotate, delete).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialHistoryEntry {
    pub id: Uuid,
    pub credential: String,
    pub action: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,

    pub timestamp: DateTime<Utc>,

    #[serde(default)]
    pub details: BTreeMap<String, serde_json::Value>,
}

impl CredentialHistoryEntry {
    pub fn new(credential: &str, action: &str, actor: Option<&str>) -> Self {
        Self {
            id: Uuid::new_v4(),
            credential: credential.to_string(),
            action: action.to_string(),
            actor: actor.map(str::to_string),
            timestamp: Utc::now(),
            details: BTreeMap::new(),
        }
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }
}

/// Serialize `Option<chrono::Duration>` as whole seconds.
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S>(value: &Option<chrono::Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(d) => serializer.serialize_some(&d.num_seconds()),
            None => serializer.serialize_none(),
        }
    }

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Option<chrono::Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<i64>::deserialize(deserializer)?.map(chrono::Duration::seconds))
    }
}

//! Security audit events.
//!
//! The store reports every access and mutation to an [`AuditSink`].  The
//! call is fire-and-forget from the store's point of view: a sink error is
//! logged through `tracing` and never fails the operation.
//!
//! Sinks shipped here:
//! - [`NoopAuditSink`]: discards everything
//! - [`TracingAuditSink`]: forwards events to the `tracing` subscriber
//! - [`MemoryAuditSink`]: keeps events in memory (tests, embedding)
//! - `AuditLog`: SQLite-backed, behind the `audit-log` feature

#[cfg(feature = "audit-log")]
pub mod sqlite;

use std::fmt;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::errors::AuditError;

#[cfg(feature = "audit-log")]
pub use sqlite::{AuditEntry, AuditLog};

/// Event category for reads.
pub const CATEGORY_ACCESS: &str = "credential_access";
/// Event category for mutations and other sensitive operations.
pub const CATEGORY_OPERATION: &str = "credential_operation";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured security event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityEvent {
    pub category: String,
    pub description: String,
    pub actor: Option<String>,
    pub severity: Severity,
    pub credential: String,
    pub action: String,
    pub timestamp: DateTime<Utc>,
}

impl SecurityEvent {
    /// Build an event for `action` on `credential`, appending the error
    /// text to the description when there is one.
    pub fn new(
        category: &str,
        credential: &str,
        action: &str,
        severity: Severity,
        actor: Option<&str>,
        error: Option<&dyn std::error::Error>,
    ) -> Self {
        let kind = if category == CATEGORY_ACCESS {
            "Credential access"
        } else {
            "Credential operation"
        };
        let mut description = format!("{kind}: {credential} - {action}");
        if let Some(err) = error {
            description.push_str(&format!(" (error: {err})"));
        }

        Self {
            category: category.to_string(),
            description,
            actor: actor.map(str::to_string),
            severity,
            credential: credential.to_string(),
            action: action.to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Destination for security events.
pub trait AuditSink: Send + Sync {
    fn log_security_event(&self, event: &SecurityEvent) -> Result<(), AuditError>;
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn log_security_event(&self, _event: &SecurityEvent) -> Result<(), AuditError> {
        Ok(())
    }
}

/// Emits events as `tracing` records on the `credvault::audit` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn log_security_event(&self, event: &SecurityEvent) -> Result<(), AuditError> {
        let actor = event.actor.as_deref().unwrap_or("-");
        match event.severity {
            Severity::Info => tracing::info!(
                target: "credvault::audit",
                category = %event.category, credential = %event.credential,
                action = %event.action, actor, "{}", event.description
            ),
            Severity::Warning => tracing::warn!(
                target: "credvault::audit",
                category = %event.category, credential = %event.credential,
                action = %event.action, actor, "{}", event.description
            ),
            Severity::Error => tracing::error!(
                target: "credvault::audit",
                category = %event.category, credential = %event.credential,
                action = %event.action, actor, "{}", event.description
            ),
        }
        Ok(())
    }
}

/// Keeps every event in memory, in arrival order.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<SecurityEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SecurityEvent> {
        self.events.lock().clone()
    }

    /// Actions recorded so far, e.g. `["create_success", "fetch_success"]`.
    pub fn actions(&self) -> Vec<String> {
        self.events.lock().iter().map(|e| e.action.clone()).collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl AuditSink for MemoryAuditSink {
    fn log_security_event(&self, event: &SecurityEvent) -> Result<(), AuditError> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CredVaultError;

    #[test]
    fn description_includes_error_text() {
        let err = CredVaultError::NotFound("db".into());
        let event = SecurityEvent::new(
            CATEGORY_ACCESS,
            "db",
            "fetch_error",
            Severity::Warning,
            Some("alice"),
            Some(&err),
        );
        assert_eq!(
            event.description,
            "Credential access: db - fetch_error (error: Credential 'db' not found)"
        );
        assert_eq!(event.actor.as_deref(), Some("alice"));
    }

    #[test]
    fn memory_sink_records_in_order() {
        let sink = MemoryAuditSink::new();
        for action in ["create_success", "fetch_success"] {
            let event =
                SecurityEvent::new(CATEGORY_OPERATION, "db", action, Severity::Info, None, None);
            sink.log_security_event(&event).unwrap();
        }
        assert_eq!(sink.actions(), ["create_success", "fetch_success"]);
        sink.clear();
        assert!(sink.events().is_empty());
    }

    #[test]
    fn severity_renders_lowercase() {
        assert_eq!(Severity::Warning.to_string(), "warning");
        assert_eq!(serde_json::to_string(&Severity::Error).unwrap(), "\"error\"");
    }
}

//! Vault module — credential lifecycle.
//!
//! This module provides:
//! - `Credential` and its projections (`credential`)
//! - Record encoding with encryption-at-rest (`codec`)
//! - Per-store TTL cache (`cache`)
//! - Scoring validation engine (`validation`)
//! - Lifecycle history storage (`history`)
//! - Per-call cancellation and deadlines (`context`)
//! - High-level `CredentialStore` (`store`) and its rotation monitor (`monitor`)

pub mod cache;
pub mod codec;
pub mod context;
pub mod credential;
pub mod history;
pub mod monitor;
pub mod store;
pub mod validation;

// Re-export the most commonly used items.
pub use cache::CredentialCache;
pub use codec::CredentialCodec;
pub use context::OpContext;
pub use credential::{
    Credential, CredentialHistoryEntry, CredentialInfo, CredentialStatus, CredentialType,
    ValidationResult,
};
pub use history::{HistoryStore, MemoryHistory};
pub use monitor::{MonitorHandle, RotationMonitor};
pub use store::{CredentialStore, CredentialStoreBuilder};
pub use validation::{TypeRule, Validator};

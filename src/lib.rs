//! credvault — credential lifecycle management.
//!
//! Encrypted-at-rest storage of API keys, tokens, passwords and other
//! secrets over a pluggable secret backend, with a per-store cache,
//! rotation tracking, validation scoring and security auditing.

pub mod audit;
pub mod backend;
pub mod cli;
pub mod config;
pub mod crypto;
pub mod errors;
pub mod vault;

pub use errors::{CredVaultError, Result};
pub use vault::{Credential, CredentialStore, CredentialType, OpContext};

//! Cryptographic primitives for credvault.
//!
//! This module provides:
//! - AES-256-GCM value encryption with an explicit passthrough mode (`cipher`)
//! - The zeroizing 32-byte key type and its base64 form (`keys`)

pub mod cipher;
pub mod keys;

pub use cipher::Cipher;
pub use keys::EncryptionKey;

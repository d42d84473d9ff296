//! The 256-bit key used to encrypt credential values at rest.
//!
//! Keys are configured as base64 text (`encryption_key` in
//! `.credvault.toml` or `CREDVAULT_ENCRYPTION_KEY`) and must decode to
//! exactly 32 bytes.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::RngCore;
use zeroize::Zeroize;

use crate::errors::CipherError;

/// Length of an AES-256 key (256 bits).
pub const KEY_LEN: usize = 32;

/// A 32-byte encryption key that zeroes its memory when dropped.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct EncryptionKey {
    bytes: [u8; KEY_LEN],
}

impl EncryptionKey {
    /// Create a key from raw bytes.
    pub fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    /// Decode a base64 key, rejecting anything that is not exactly 32 bytes.
    pub fn from_base64(encoded: &str) -> Result<Self, CipherError> {
        let mut decoded = BASE64
            .decode(encoded.trim())
            .map_err(|e| CipherError::InvalidKey(format!("not valid base64: {e}")))?;

        if decoded.len() != KEY_LEN {
            let len = decoded.len();
            decoded.zeroize();
            return Err(CipherError::InvalidKey(format!(
                "key must be {KEY_LEN} bytes, got {len}"
            )));
        }

        let mut bytes = [0u8; KEY_LEN];
        bytes.copy_from_slice(&decoded);
        decoded.zeroize();
        Ok(Self { bytes })
    }

    /// Generate a fresh random key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        rand::rng().fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Render the key as base64 text, the form accepted by `from_base64`.
    pub fn to_base64(&self) -> String {
        BASE64.encode(self.bytes)
    }

    /// Access the raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EncryptionKey(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base64_roundtrip() {
        let key = EncryptionKey::generate();
        let parsed = EncryptionKey::from_base64(&key.to_base64()).unwrap();
        assert_eq!(key.as_bytes(), parsed.as_bytes());
    }

    #[test]
    fn rejects_wrong_length() {
        let short = BASE64.encode([7u8; 16]);
        assert!(matches!(
            EncryptionKey::from_base64(&short),
            Err(CipherError::InvalidKey(_))
        ));
    }

    #[test]
    fn rejects_invalid_base64() {
        assert!(EncryptionKey::from_base64("not base64 !!").is_err());
    }

    #[test]
    fn debug_output_is_redacted() {
        let key = EncryptionKey::new([1u8; KEY_LEN]);
        assert_eq!(format!("{key:?}"), "EncryptionKey(<redacted>)");
    }
}

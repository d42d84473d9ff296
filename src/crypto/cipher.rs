//! AES-256-GCM authenticated encryption of credential values.
//!
//! Each call to `encrypt` generates a fresh random 12-byte nonce and
//! prepends it to the ciphertext.  The whole blob is base64 encoded so it
//! can be stored in a record's byte-oriented `value` field as text.
//!
//! Layout of the decoded blob:
//!   [ 12-byte nonce | ciphertext + 16-byte auth tag ]
//!
//! A `Cipher` built without a key is in explicit passthrough mode: both
//! operations return their input unchanged.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use super::keys::EncryptionKey;
use crate::errors::CipherError;

/// Size of the AES-256-GCM nonce in bytes.
pub const NONCE_LEN: usize = 12;

/// Value cipher shared by the codec.
#[derive(Clone, Debug)]
pub struct Cipher {
    key: Option<EncryptionKey>,
}

impl Cipher {
    /// An encrypting cipher using `key`.
    pub fn new(key: EncryptionKey) -> Self {
        Self { key: Some(key) }
    }

    /// A passthrough cipher (encryption disabled).
    pub fn disabled() -> Self {
        Self { key: None }
    }

    /// Build a cipher from configuration.
    ///
    /// Enabled encryption without a key is an error, never a silent
    /// fallback to passthrough.
    pub fn from_config(enable: bool, key: Option<&str>) -> Result<Self, CipherError> {
        if !enable {
            return Ok(Self::disabled());
        }
        match key {
            Some(k) if !k.trim().is_empty() => Ok(Self::new(EncryptionKey::from_base64(k)?)),
            _ => Err(CipherError::MissingKey),
        }
    }

    /// Returns `true` when values are encrypted at rest.
    pub fn is_enabled(&self) -> bool {
        self.key.is_some()
    }

    /// Encrypt `plaintext`, returning base64(nonce || ciphertext).
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CipherError> {
        let Some(key) = &self.key else {
            return Ok(plaintext.to_string());
        };

        let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
            .map_err(|e| CipherError::Encryption(format!("invalid key length: {e}")))?;

        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

        let ciphertext = cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| CipherError::Encryption(format!("encryption error: {e}")))?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(blob))
    }

    /// Decrypt a blob produced by `encrypt`.
    pub fn decrypt(&self, blob: &str) -> Result<String, CipherError> {
        let Some(key) = &self.key else {
            return Ok(blob.to_string());
        };

        let data = BASE64
            .decode(blob)
            .map_err(|_| CipherError::Decryption("ciphertext is not valid base64".into()))?;

        if data.len() < NONCE_LEN {
            return Err(CipherError::Decryption("ciphertext too short".into()));
        }

        let (nonce_bytes, ciphertext) = data.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);

        let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
            .map_err(|_| CipherError::Decryption("invalid key length".into()))?;

        let plaintext = cipher.decrypt(nonce, ciphertext).map_err(|_| {
            CipherError::Decryption("wrong key or tampered ciphertext".into())
        })?;

        String::from_utf8(plaintext)
            .map_err(|_| CipherError::Decryption("plaintext is not valid UTF-8".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(byte: u8) -> EncryptionKey {
        EncryptionKey::new([byte; 32])
    }

    #[test]
    fn disabled_cipher_is_identity() {
        let cipher = Cipher::disabled();
        assert!(!cipher.is_enabled());
        assert_eq!(cipher.encrypt("plain").unwrap(), "plain");
        assert_eq!(cipher.decrypt("plain").unwrap(), "plain");
    }

    #[test]
    fn from_config_requires_key_when_enabled() {
        assert!(matches!(
            Cipher::from_config(true, None),
            Err(CipherError::MissingKey)
        ));
        assert!(matches!(
            Cipher::from_config(true, Some("  ")),
            Err(CipherError::MissingKey)
        ));
        assert!(!Cipher::from_config(false, None).unwrap().is_enabled());

        let encoded = key(3).to_base64();
        assert!(Cipher::from_config(true, Some(&encoded)).unwrap().is_enabled());
    }

    #[test]
    fn tampered_blob_fails_authentication() {
        let cipher = Cipher::new(key(9));
        let blob = cipher.encrypt("s3cr3t!").unwrap();

        let mut raw = BASE64.decode(&blob).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        let tampered = BASE64.encode(raw);

        assert!(matches!(
            cipher.decrypt(&tampered),
            Err(CipherError::Decryption(_))
        ));
    }

    #[test]
    fn short_blob_is_rejected() {
        let cipher = Cipher::new(key(1));
        let short = BASE64.encode([0u8; 5]);
        assert!(matches!(cipher.decrypt(&short), Err(CipherError::Decryption(_))));
    }
}

//! Authenticated symmetric encryption for share payloads.
//!
//! # Responsibilities
//! - Generate one fresh session key per exchange
//! - Encrypt each share into an opaque blob with a random nonce
//! - Decrypt and authenticate blobs once the key is revealed
//!
//! # Design Decisions
//! - ChaCha20-Poly1305 with a 12-byte nonce prepended to each blob
//! - Tampering is caught by the AEAD tag before any plaintext is produced,
//!   independent of the Merkle commitment check
//! - `SessionKey` redacts itself in Debug output so the key cannot leak
//!   through logs

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;
use std::fmt;
use thiserror::Error;

/// Session key length in bytes.
pub const KEY_SIZE: usize = 32;
/// Nonce length prepended to every ciphertext blob.
pub const NONCE_SIZE: usize = 12;
/// Poly1305 authentication tag length appended by the AEAD.
pub const TAG_SIZE: usize = 16;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CipherError {
    /// AEAD refused the plaintext, only reachable at lengths far beyond any
    /// share payload.
    #[error("encryption failed")]
    EncryptionFailed,
    /// Blob failed authentication or is too short to contain a nonce and tag.
    #[error("decryption failed: ciphertext is corrupt or the key is wrong")]
    DecryptionFailed,
    /// Key material of the wrong length.
    #[error("invalid key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },
}

/// Symmetric key for one exchange session.
///
/// Held exclusively by the seller until reveal; the buyer reconstructs it
/// from the `KeyRevealed` ledger event.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionKey([u8; KEY_SIZE]);

impl SessionKey {
    /// Generate a fresh random key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Reconstruct a key from revealed bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CipherError> {
        let bytes: [u8; KEY_SIZE] = bytes.try_into().map_err(|_| CipherError::InvalidKeyLength {
            expected: KEY_SIZE,
            actual: bytes.len(),
        })?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    /// Encrypt a plaintext into `nonce || ciphertext || tag`.
    ///
    /// Each call draws a fresh nonce, so encrypting the same plaintext twice
    /// yields different blobs.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
        let cipher = ChaCha20Poly1305::new((&self.0).into());
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext)
            .map_err(|_| CipherError::EncryptionFailed)?;
        let mut blob = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);
        Ok(blob)
    }

    /// Decrypt and authenticate a blob produced by [`SessionKey::encrypt`].
    pub fn decrypt(&self, blob: &[u8]) -> Result<Vec<u8>, CipherError> {
        if blob.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CipherError::DecryptionFailed);
        }
        let (nonce_bytes, ciphertext) = blob.split_at(NONCE_SIZE);
        let cipher = ChaCha20Poly1305::new((&self.0).into());
        let nonce = Nonce::from_slice(nonce_bytes);
        cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| CipherError::DecryptionFailed)
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionKey(redacted)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let key = SessionKey::generate();
        let blob = key.encrypt(b"share payload").unwrap();
        assert_eq!(key.decrypt(&blob).unwrap(), b"share payload");
    }

    #[test]
    fn blob_layout_has_nonce_and_tag_overhead() {
        let key = SessionKey::generate();
        let blob = key.encrypt(b"12345").unwrap();
        assert_eq!(blob.len(), NONCE_SIZE + 5 + TAG_SIZE);
    }

    #[test]
    fn tampered_blob_is_rejected() {
        let key = SessionKey::generate();
        let mut blob = key.encrypt(b"share payload").unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 0x01;
        assert_eq!(key.decrypt(&blob), Err(CipherError::DecryptionFailed));
    }

    #[test]
    fn wrong_key_is_rejected() {
        let key = SessionKey::generate();
        let other = SessionKey::generate();
        let blob = key.encrypt(b"share payload").unwrap();
        assert_eq!(other.decrypt(&blob), Err(CipherError::DecryptionFailed));
    }

    #[test]
    fn truncated_blob_is_rejected() {
        let key = SessionKey::generate();
        assert_eq!(key.decrypt(&[0u8; 10]), Err(CipherError::DecryptionFailed));
    }

    #[test]
    fn fresh_nonce_per_encryption() {
        let key = SessionKey::generate();
        assert_ne!(
            key.encrypt(b"same input").unwrap(),
            key.encrypt(b"same input").unwrap()
        );
    }

    #[test]
    fn key_reconstruction_checks_length() {
        let key = SessionKey::generate();
        let rebuilt = SessionKey::from_bytes(key.as_bytes()).unwrap();
        assert_eq!(rebuilt, key);
        assert_eq!(
            SessionKey::from_bytes(&[0u8; 16]),
            Err(CipherError::InvalidKeyLength { expected: KEY_SIZE, actual: 16 })
        );
    }

    #[test]
    fn debug_output_is_redacted() {
        let key = SessionKey::generate();
        assert_eq!(format!("{key:?}"), "SessionKey(redacted)");
    }
}

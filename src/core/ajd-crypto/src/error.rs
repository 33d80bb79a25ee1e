//! Cryptographic error types.

use thiserror::Error;

/// Errors that can occur during cryptographic operations.
///
/// Authentication failures are deliberately kept apart from every other
/// kind: when [`CryptoError::Authentication`] is returned by a decryption,
/// all plaintext produced so far must be discarded.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Random generation failed.
    #[error("random generation failed: {0}")]
    Entropy(String),

    /// Key derivation failed.
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// Hash or MAC computation failed.
    #[error("digest failed: {0}")]
    Digest(String),

    /// Cipher misuse or initialization failure.
    #[error("cipher error: {0}")]
    Cipher(String),

    /// Authentication tag verification failed.
    #[error("authentication failed")]
    Authentication,
}

impl CryptoError {
    /// Returns `true` if this error reports a failed tag verification.
    ///
    /// Callers use this to apply a "discard untrusted plaintext" policy
    /// specifically on that path.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(self, Self::Authentication)
    }
}

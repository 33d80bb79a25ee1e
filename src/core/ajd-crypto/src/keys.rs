//! Key material types with automatic memory zeroization.
//!
//! [`SymmetricKey`] implements `Zeroize` and `ZeroizeOnDrop` so key bytes
//! are erased from memory when no longer needed. [`Iv`] is public data but
//! shares the same fixed-size handling.

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::cipher::{IV_SIZE, KEY_SIZE};
use crate::error::CryptoError;
use crate::kdf::{derive_key_into, Pbkdf2Params};
use crate::random::fill_random;

fn copy_exact<const N: usize>(bytes: &[u8], what: &str) -> Result<[u8; N], CryptoError> {
    if bytes.len() != N {
        return Err(CryptoError::Cipher(format!(
            "expected {}-byte {}, got {}",
            N,
            what,
            bytes.len()
        )));
    }

    let mut out = [0u8; N];
    out.copy_from_slice(bytes);
    Ok(out)
}

/// A 128-bit cipher key with automatic zeroization.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey {
    bytes: [u8; KEY_SIZE],
}

impl SymmetricKey {
    /// Generates a new random key.
    pub fn generate() -> Result<Self, CryptoError> {
        let mut key = Self {
            bytes: [0u8; KEY_SIZE],
        };
        fill_random(&mut key.bytes)?;
        Ok(key)
    }

    /// Derives a key from a password with PBKDF2-HMAC-SHA256.
    ///
    /// Only `params.iterations` is used; the output is always one key.
    pub fn derive(password: &[u8], salt: &[u8], params: &Pbkdf2Params) -> Result<Self, CryptoError> {
        let mut key = Self {
            bytes: [0u8; KEY_SIZE],
        };
        derive_key_into(&mut key.bytes, password, salt, params.iterations)?;
        Ok(key)
    }

    /// Creates a key from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not exactly 16 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        Ok(Self {
            bytes: copy_exact(bytes, "key")?,
        })
    }

    /// Returns the raw key bytes.
    ///
    /// Use with caution - the returned slice is not zeroized automatically.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymmetricKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// A 128-bit cipher IV.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Iv {
    bytes: [u8; IV_SIZE],
}

impl Iv {
    /// Generates a new random IV.
    pub fn generate() -> Result<Self, CryptoError> {
        let mut bytes = [0u8; IV_SIZE];
        fill_random(&mut bytes)?;
        Ok(Self { bytes })
    }

    /// Creates an IV from raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        Ok(Self {
            bytes: copy_exact(bytes, "IV")?,
        })
    }

    /// Returns the raw IV bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

//! Password-based key derivation.
//!
//! Provides PBKDF2 (RFC 8018) with HMAC-SHA256 as the pseudorandom function.
//! Used to stretch low-entropy passwords into cipher and MAC keys.

use hmac::Hmac;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::debug;
use zeroize::Zeroizing;

use crate::error::CryptoError;
use crate::hash::DIGEST_SIZE;
use crate::{Block, BLOCK_SIZE};

/// Default PBKDF2 iteration count.
pub const DEFAULT_ITERATIONS: u32 = 10_000;

/// Default derived key length in bytes (one cipher key).
pub const DEFAULT_OUTPUT_LENGTH: usize = BLOCK_SIZE;

/// Largest output PBKDF2-HMAC-SHA256 can produce: `(2^32 - 1)` blocks.
const MAX_OUTPUT_LENGTH: u64 = (u32::MAX as u64) * DIGEST_SIZE as u64;

/// Tunable PBKDF2 parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pbkdf2Params {
    /// Number of HMAC iterations.
    pub iterations: u32,
    /// Length of the derived key in bytes.
    pub output_length: usize,
}

impl Default for Pbkdf2Params {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
            output_length: DEFAULT_OUTPUT_LENGTH,
        }
    }
}

/// Derives `output_length` bytes from `password` and `salt` with PBKDF2-HMAC-SHA256.
///
/// Identical arguments always produce identical output.
///
/// # Arguments
///
/// * `password` - The secret to stretch
/// * `salt` - Per-key salt (should be random and at least 16 bytes)
/// * `iterations` - Iteration count, see [`DEFAULT_ITERATIONS`]
/// * `output_length` - Desired key length in bytes
///
/// # Returns
///
/// Derived key wrapped in `Zeroizing` for automatic memory cleanup.
pub fn derive_key(
    password: &[u8],
    salt: &[u8],
    iterations: u32,
    output_length: usize,
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    validate(iterations, output_length)?;

    let mut okm = Zeroizing::new(Vec::new());
    okm.try_reserve_exact(output_length)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
    okm.resize(output_length, 0);

    derive_key_into(&mut okm, password, salt, iterations)?;
    Ok(okm)
}

/// Derives a key using the given parameter set.
pub fn derive_key_with(
    password: &[u8],
    salt: &[u8],
    params: &Pbkdf2Params,
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    derive_key(password, salt, params.iterations, params.output_length)
}

/// Fills `output` with key material; its length is the derived key length.
pub fn derive_key_into(
    output: &mut [u8],
    password: &[u8],
    salt: &[u8],
    iterations: u32,
) -> Result<(), CryptoError> {
    validate(iterations, output.len())?;

    debug!(
        iterations,
        output_length = output.len(),
        salt_length = salt.len(),
        "deriving key with PBKDF2-HMAC-SHA256"
    );

    pbkdf2::pbkdf2::<Hmac<Sha256>>(password, salt, iterations, output)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))
}

/// Checks parameters before any output is allocated.
fn validate(iterations: u32, output_length: usize) -> Result<(), CryptoError> {
    if iterations == 0 {
        return Err(CryptoError::KeyDerivation(
            "iteration count must be > 0".to_string(),
        ));
    }

    if output_length == 0 {
        return Err(CryptoError::KeyDerivation(
            "output length must be > 0".to_string(),
        ));
    }

    if output_length as u64 > MAX_OUTPUT_LENGTH {
        return Err(CryptoError::KeyDerivation(
            "output length too large for PBKDF2-HMAC-SHA256".to_string(),
        ));
    }

    Ok(())
}

/// Derives a single 16-byte key block.
pub fn derive_block(
    password: &[u8],
    salt: &[u8],
    iterations: u32,
) -> Result<Zeroizing<Block>, CryptoError> {
    let mut block = Zeroizing::new(Block::default());
    derive_key_into(&mut *block, password, salt, iterations)?;
    Ok(block)
}

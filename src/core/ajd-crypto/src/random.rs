//! Cryptographically secure random generation.
//!
//! Uses the operating system's CSPRNG for all random number generation.
//! Unlike a panicking `fill_bytes`, every generator here reports failure
//! through [`CryptoError::Entropy`].

use rand::{rngs::OsRng, RngCore};
use tracing::warn;
use zeroize::Zeroizing;

use crate::cipher::{IV_SIZE, KEY_SIZE};
use crate::error::CryptoError;
use crate::Block;

/// Reports whether the OS generator is able to produce output.
///
/// Returns `false` only on a degraded platform. Treat `false` as fatal
/// unless entropy is added through some system facility outside this crate.
pub fn is_seeded() -> bool {
    let mut sample = [0u8; 1];
    match OsRng.try_fill_bytes(&mut sample) {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "OS random generator is not available");
            false
        }
    }
}

/// Overwrites `buffer` with cryptographically secure random bytes.
///
/// A zero-length buffer is a no-op. If this fails the buffer contents are
/// unspecified and must not be used.
pub fn fill_random(buffer: &mut [u8]) -> Result<(), CryptoError> {
    if buffer.is_empty() {
        return Ok(());
    }

    OsRng
        .try_fill_bytes(buffer)
        .map_err(|e| CryptoError::Entropy(e.to_string()))
}

/// Generates `len` cryptographically secure random bytes.
pub fn generate_bytes(len: usize) -> Result<Vec<u8>, CryptoError> {
    let mut bytes = vec![0u8; len];
    fill_random(&mut bytes)?;
    Ok(bytes)
}

/// Generates a random 16-byte block, e.g. for a salt.
pub fn generate_block() -> Result<Block, CryptoError> {
    let mut block = Block::default();
    fill_random(&mut block)?;
    Ok(block)
}

/// Generates a random 128-bit cipher key.
///
/// The key is wrapped in `Zeroizing` so it is cleared from memory when dropped.
pub fn generate_key() -> Result<Zeroizing<[u8; KEY_SIZE]>, CryptoError> {
    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    fill_random(&mut *key)?;
    Ok(key)
}

/// Generates a random 128-bit IV.
pub fn generate_iv() -> Result<[u8; IV_SIZE], CryptoError> {
    let mut iv = [0u8; IV_SIZE];
    fill_random(&mut iv)?;
    Ok(iv)
}

//! SHA-256 digests and HMAC-SHA256 message authentication codes.
//!
//! A [`Hasher`] is either plain or keyed, fixed at construction. It can be
//! updated any number of times; [`Hasher::finalize`] returns the result and
//! resets the accumulator so the same instance can compute another digest.

use hmac::{Hmac, Mac};
use sha2::{Digest as _, Sha256};
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::error::CryptoError;

type HmacSha256 = Hmac<Sha256>;

/// Size of a SHA-256 digest or HMAC-SHA256 tag in bytes.
pub const DIGEST_SIZE: usize = 32;

/// A SHA-256 digest or HMAC-SHA256 tag.
pub type Digest = [u8; DIGEST_SIZE];

#[derive(Clone)]
enum Engine {
    Plain(Sha256),
    Keyed(HmacSha256),
}

/// Streaming hash or MAC context.
///
/// Not internally synchronised; use one instance per thread of work.
#[derive(Clone)]
pub struct Hasher {
    engine: Engine,
}

impl Hasher {
    /// Creates a plain SHA-256 hasher.
    pub fn new() -> Self {
        Self {
            engine: Engine::Plain(Sha256::new()),
        }
    }

    /// Creates an HMAC-SHA256 hasher keyed with `key`.
    ///
    /// Any key length is accepted.
    pub fn keyed(key: &[u8]) -> Result<Self, CryptoError> {
        let mac = HmacSha256::new_from_slice(key).map_err(|e| CryptoError::Digest(e.to_string()))?;

        Ok(Self {
            engine: Engine::Keyed(mac),
        })
    }

    /// Returns `true` if this hasher computes a MAC.
    pub fn is_keyed(&self) -> bool {
        matches!(self.engine, Engine::Keyed(_))
    }

    /// Appends `data` to the pending input.
    pub fn update(&mut self, data: &[u8]) -> &mut Self {
        match &mut self.engine {
            Engine::Plain(sha) => sha.update(data),
            Engine::Keyed(mac) => mac.update(data),
        }
        self
    }

    /// Returns the digest of everything supplied since construction or the
    /// previous `finalize`, and resets the accumulator.
    pub fn finalize(&mut self) -> Digest {
        let mut out = [0u8; DIGEST_SIZE];
        match &mut self.engine {
            Engine::Plain(sha) => out.copy_from_slice(&sha.finalize_reset()),
            Engine::Keyed(mac) => out.copy_from_slice(&mac.finalize_reset().into_bytes()),
        }
        out
    }

    /// Finalizes and compares the result against `expected` in constant time.
    ///
    /// The accumulator is reset whether or not the comparison succeeds.
    pub fn verify(&mut self, expected: &[u8]) -> Result<(), CryptoError> {
        let computed = self.finalize();
        if bool::from(computed.as_slice().ct_eq(expected)) {
            Ok(())
        } else {
            warn!(keyed = self.is_keyed(), "digest verification failed");
            Err(CryptoError::Authentication)
        }
    }
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Hasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hasher")
            .field("keyed", &self.is_keyed())
            .finish_non_exhaustive()
    }
}

/// Computes the SHA-256 digest of `data`.
pub fn digest(data: &[u8]) -> Digest {
    Hasher::new().update(data).finalize()
}

/// Computes the HMAC-SHA256 of `data` under `key`.
pub fn mac(key: &[u8], data: &[u8]) -> Result<Digest, CryptoError> {
    Ok(Hasher::keyed(key)?.update(data).finalize())
}

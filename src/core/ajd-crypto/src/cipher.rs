//! Streaming AES-128-GCM authenticated encryption.
//!
//! A [`Cipher`] is created for one direction and one message. Associated
//! data goes in first, then any number of [`Cipher::transform`] calls, then
//! exactly one [`Cipher::seal`] (encrypt) or [`Cipher::verify`] (decrypt).
//!
//! The IV is 128 bits. GCM derives its initial counter block from such an
//! IV through GHASH, so output is identical to any conforming AES-GCM
//! implementation configured for 16-byte nonces.
//!
//! Plaintext returned by a decrypting `transform` is unauthenticated until
//! `verify` succeeds. On [`CryptoError::Authentication`] it must be discarded.

use aes::cipher::{BlockEncrypt, KeyInit, KeyIvInit, StreamCipher};
use aes::Aes128;
use ctr::Ctr32BE;
use ghash::universal_hash::UniversalHash;
use ghash::GHash;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};
use zeroize::{Zeroize, Zeroizing};

use crate::error::CryptoError;
use crate::BLOCK_SIZE;

/// Size of an AES-128 key in bytes.
pub const KEY_SIZE: usize = 16;

/// Size of the IV in bytes.
pub const IV_SIZE: usize = 16;

/// Size of a GCM authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

/// Largest message GCM can protect under one IV: `2^39 - 256` bits.
pub const MAX_MESSAGE_SIZE: u64 = (1 << 36) - 32;

/// A GCM authentication tag.
pub type Tag = [u8; TAG_SIZE];

/// Direction of a [`Cipher`], fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Plaintext in, ciphertext out, tag produced by `seal`.
    Encrypt,
    /// Ciphertext in, plaintext out, tag checked by `verify`.
    Decrypt,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Encrypt => write!(f, "encrypt"),
            Self::Decrypt => write!(f, "decrypt"),
        }
    }
}

/// GHASH over a byte stream that arrives in arbitrary pieces.
///
/// Holds back a partial block until it is completed or explicitly padded.
struct Authenticator {
    ghash: GHash,
    pending: Zeroizing<[u8; BLOCK_SIZE]>,
    pending_len: usize,
}

impl Authenticator {
    fn new(ghash: GHash) -> Self {
        Self {
            ghash,
            pending: Zeroizing::new([0u8; BLOCK_SIZE]),
            pending_len: 0,
        }
    }

    fn absorb(&mut self, mut data: &[u8]) {
        if self.pending_len > 0 {
            let take = (BLOCK_SIZE - self.pending_len).min(data.len());
            self.pending[self.pending_len..self.pending_len + take].copy_from_slice(&data[..take]);
            self.pending_len += take;
            data = &data[take..];

            if self.pending_len < BLOCK_SIZE {
                return;
            }
            self.ghash.update_padded(&self.pending[..]);
            self.pending_len = 0;
        }

        let whole = data.len() - data.len() % BLOCK_SIZE;
        let (blocks, rest) = data.split_at(whole);
        // exact multiple of the block size, so no padding is applied here
        self.ghash.update_padded(blocks);

        self.pending[..rest.len()].copy_from_slice(rest);
        self.pending_len = rest.len();
    }

    /// Zero-pads the stream to a block boundary.
    fn pad(&mut self) {
        if self.pending_len > 0 {
            self.ghash.update_padded(&self.pending[..self.pending_len]);
            self.pending_len = 0;
        }
    }

    fn finish(mut self, aad_len: u64, msg_len: u64) -> ghash::Block {
        self.pad();

        let mut lengths = ghash::Block::default();
        lengths[..8].copy_from_slice(&(aad_len * 8).to_be_bytes());
        lengths[8..].copy_from_slice(&(msg_len * 8).to_be_bytes());
        self.ghash.update(&[lengths]);

        self.ghash.finalize()
    }
}

/// Clears an intermediate block derived from the key.
fn wipe(block: &mut ghash::Block) {
    block.as_mut_slice().zeroize();
}

/// Live GCM state; dropped when the cipher is finalized.
///
/// The AES key schedule and the GHASH key are wiped on drop by the
/// primitive crates; the tag mask is held in `Zeroizing`.
struct Gcm {
    keystream: Ctr32BE<Aes128>,
    auth: Authenticator,
    tag_mask: Zeroizing<[u8; TAG_SIZE]>,
    aad_len: u64,
    msg_len: u64,
    in_data: bool,
}

impl Gcm {
    fn new(key: &[u8], iv: &[u8]) -> Result<Self, CryptoError> {
        if key.len() != KEY_SIZE {
            return Err(CryptoError::Cipher(format!(
                "expected {}-byte key, got {}",
                KEY_SIZE,
                key.len()
            )));
        }

        if iv.len() != IV_SIZE {
            return Err(CryptoError::Cipher(format!(
                "expected {}-byte IV, got {}",
                IV_SIZE,
                iv.len()
            )));
        }

        let aes = Aes128::new_from_slice(key).map_err(|e| CryptoError::Cipher(e.to_string()))?;

        let mut h = ghash::Block::default();
        aes.encrypt_block(&mut h);

        // J0 = GHASH_H(IV || 0^64 || [len(IV)]_64) for IVs other than 96 bits
        let mut j0_hash = GHash::new(&h);
        j0_hash.update_padded(iv);
        let mut iv_bits = ghash::Block::default();
        iv_bits[8..].copy_from_slice(&((IV_SIZE as u64) * 8).to_be_bytes());
        j0_hash.update(&[iv_bits]);
        let mut j0 = j0_hash.finalize();

        let mut mask = j0;
        aes.encrypt_block(&mut mask);
        let mut tag_mask = Zeroizing::new([0u8; TAG_SIZE]);
        tag_mask.copy_from_slice(&mask);
        wipe(&mut mask);

        let mut counter = j0;
        let low = u32::from_be_bytes([counter[12], counter[13], counter[14], counter[15]]);
        counter[12..].copy_from_slice(&low.wrapping_add(1).to_be_bytes());

        let keystream = Ctr32BE::<Aes128>::new_from_slices(key, &counter);
        wipe(&mut counter);
        wipe(&mut j0);
        let keystream = keystream.map_err(|e| CryptoError::Cipher(e.to_string()))?;

        let auth = Authenticator::new(GHash::new(&h));
        wipe(&mut h);

        Ok(Self {
            keystream,
            auth,
            tag_mask,
            aad_len: 0,
            msg_len: 0,
            in_data: false,
        })
    }

    fn associate(&mut self, aad: &[u8]) -> Result<(), CryptoError> {
        if self.in_data {
            return Err(CryptoError::Cipher(
                "associated data must be supplied before any transform".to_string(),
            ));
        }

        self.aad_len = self
            .aad_len
            .checked_add(aad.len() as u64)
            .filter(|len| *len <= u64::MAX / 8)
            .ok_or_else(|| CryptoError::Cipher("associated data too long".to_string()))?;
        self.auth.absorb(aad);
        Ok(())
    }

    fn apply(&mut self, direction: Direction, buf: &mut [u8]) -> Result<(), CryptoError> {
        if !self.in_data {
            self.auth.pad();
            self.in_data = true;
        }

        let msg_len = self
            .msg_len
            .checked_add(buf.len() as u64)
            .filter(|len| *len <= MAX_MESSAGE_SIZE)
            .ok_or_else(|| CryptoError::Cipher("message exceeds GCM length limit".to_string()))?;

        match direction {
            Direction::Encrypt => {
                self.keystream
                    .try_apply_keystream(buf)
                    .map_err(|e| CryptoError::Cipher(e.to_string()))?;
                self.auth.absorb(buf);
            }
            Direction::Decrypt => {
                self.auth.absorb(buf);
                self.keystream
                    .try_apply_keystream(buf)
                    .map_err(|e| CryptoError::Cipher(e.to_string()))?;
            }
        }

        self.msg_len = msg_len;
        Ok(())
    }

    fn tag(self) -> Tag {
        let mut tag = self.auth.finish(self.aad_len, self.msg_len);
        for (t, m) in tag.iter_mut().zip(self.tag_mask.iter()) {
            *t ^= m;
        }

        let mut out = [0u8; TAG_SIZE];
        out.copy_from_slice(&tag);
        out
    }
}

/// A one-shot AES-128-GCM encryption or decryption context.
///
/// Not internally synchronised; use one instance per message.
pub struct Cipher {
    direction: Direction,
    expected_tag: Option<Tag>,
    state: Option<Gcm>,
}

impl Cipher {
    /// Creates an encrypting context.
    ///
    /// # Arguments
    ///
    /// * `key` - 16-byte AES key
    /// * `iv` - 16-byte IV, never reused with the same key
    pub fn encryptor(key: &[u8], iv: &[u8]) -> Result<Self, CryptoError> {
        let state = Gcm::new(key, iv)?;
        debug!(direction = %Direction::Encrypt, "cipher initialized");

        Ok(Self {
            direction: Direction::Encrypt,
            expected_tag: None,
            state: Some(state),
        })
    }

    /// Creates a decrypting context that will check `tag` in [`Cipher::verify`].
    pub fn decryptor(key: &[u8], iv: &[u8], tag: &[u8]) -> Result<Self, CryptoError> {
        if tag.len() != TAG_SIZE {
            return Err(CryptoError::Cipher(format!(
                "expected {}-byte tag, got {}",
                TAG_SIZE,
                tag.len()
            )));
        }

        let state = Gcm::new(key, iv)?;
        let mut expected = [0u8; TAG_SIZE];
        expected.copy_from_slice(tag);
        debug!(direction = %Direction::Decrypt, "cipher initialized");

        Ok(Self {
            direction: Direction::Decrypt,
            expected_tag: Some(expected),
            state: Some(state),
        })
    }

    /// Returns the direction fixed at construction.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Returns `true` once `seal` or `verify` has been called.
    pub fn is_finalized(&self) -> bool {
        self.state.is_none()
    }

    /// Authenticates `aad` without encrypting it.
    ///
    /// May be called several times; the pieces are concatenated. Fails once
    /// any data has been transformed.
    pub fn associate_data(&mut self, aad: &[u8]) -> Result<&mut Self, CryptoError> {
        self.live()?.associate(aad)?;
        Ok(self)
    }

    /// Encrypts or decrypts `input`, returning output of the same length.
    pub fn transform(&mut self, input: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut output = input.to_vec();
        self.transform_in_place(&mut output)?;
        Ok(output)
    }

    /// Encrypts or decrypts `buf` in place.
    pub fn transform_in_place(&mut self, buf: &mut [u8]) -> Result<(), CryptoError> {
        let direction = self.direction;
        self.live()?.apply(direction, buf)
    }

    /// Writes the transform of `input` into `output`, which must be the same length.
    pub fn transform_into(&mut self, input: &[u8], output: &mut [u8]) -> Result<(), CryptoError> {
        if input.len() != output.len() {
            return Err(CryptoError::Cipher(format!(
                "output buffer is {} bytes, input is {}",
                output.len(),
                input.len()
            )));
        }

        output.copy_from_slice(input);
        self.transform_in_place(output)
    }

    /// Finishes encryption and returns the tag over all associated data and ciphertext.
    pub fn seal(&mut self) -> Result<Tag, CryptoError> {
        if self.direction != Direction::Encrypt {
            return Err(CryptoError::Cipher(
                "seal called on a decrypting cipher".to_string(),
            ));
        }

        let state = self.finish()?;
        debug!(aad_len = state.aad_len, msg_len = state.msg_len, "cipher sealed");
        Ok(state.tag())
    }

    /// Finishes decryption and checks the tag supplied at construction.
    ///
    /// Comparison is constant time and the error carries no detail.
    pub fn verify(&mut self) -> Result<(), CryptoError> {
        if self.direction != Direction::Decrypt {
            return Err(CryptoError::Cipher(
                "verify called on an encrypting cipher".to_string(),
            ));
        }

        let state = self.finish()?;
        let expected = self
            .expected_tag
            .ok_or_else(|| CryptoError::Cipher("no tag registered".to_string()))?;

        let computed = state.tag();
        if bool::from(computed[..].ct_eq(&expected[..])) {
            Ok(())
        } else {
            warn!("authentication tag mismatch");
            Err(CryptoError::Authentication)
        }
    }

    fn live(&mut self) -> Result<&mut Gcm, CryptoError> {
        self.state
            .as_mut()
            .ok_or_else(|| CryptoError::Cipher("use after finalize".to_string()))
    }

    fn finish(&mut self) -> Result<Gcm, CryptoError> {
        self.state
            .take()
            .ok_or_else(|| CryptoError::Cipher("use after finalize".to_string()))
    }
}

impl std::fmt::Debug for Cipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cipher")
            .field("direction", &self.direction)
            .field("finalized", &self.is_finalized())
            .finish_non_exhaustive()
    }
}

/// Encrypts `plaintext` in one call, returning the ciphertext and its tag.
pub fn encrypt(
    key: &[u8],
    iv: &[u8],
    associated_data: &[u8],
    plaintext: &[u8],
) -> Result<(Vec<u8>, Tag), CryptoError> {
    let mut cipher = Cipher::encryptor(key, iv)?;
    cipher.associate_data(associated_data)?;
    let ciphertext = cipher.transform(plaintext)?;
    let tag = cipher.seal()?;
    Ok((ciphertext, tag))
}

/// Decrypts `ciphertext` in one call.
///
/// The plaintext is only returned once the tag has been verified; on
/// failure it is wiped before the error is returned.
pub fn decrypt(
    key: &[u8],
    iv: &[u8],
    associated_data: &[u8],
    ciphertext: &[u8],
    tag: &[u8],
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let mut cipher = Cipher::decryptor(key, iv, tag)?;
    cipher.associate_data(associated_data)?;
    let plaintext = Zeroizing::new(cipher.transform(ciphertext)?);
    cipher.verify()?;
    Ok(plaintext)
}

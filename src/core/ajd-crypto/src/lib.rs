//! # AJD Crypto
//!
//! A small authenticated cryptography toolkit.
//!
//! This crate provides:
//! - Secure random generation from the operating system CSPRNG
//! - Password-based key derivation (PBKDF2-HMAC-SHA256)
//! - Plain and keyed hashing (SHA-256, HMAC-SHA256)
//! - Streaming authenticated encryption (AES-128-GCM)
//!
//! Every context type ([`Hasher`], [`Cipher`]) owns its primitive state
//! exclusively. They are `Send` but not internally synchronised: share one
//! across threads only behind external locking, or better, give each unit
//! of work its own instance.
//!
//! ```
//! use ajd_crypto::{random, Cipher, Hasher};
//!
//! let key = random::generate_key()?;
//! let iv = random::generate_iv()?;
//!
//! let mut enc = Cipher::encryptor(&*key, &iv)?;
//! enc.associate_data(b"header")?;
//! let ciphertext = enc.transform(b"can you keep a secret?")?;
//! let tag = enc.seal()?;
//!
//! let mut dec = Cipher::decryptor(&*key, &iv, &tag)?;
//! dec.associate_data(b"header")?;
//! let plaintext = dec.transform(&ciphertext)?;
//! dec.verify()?;
//! assert_eq!(plaintext, b"can you keep a secret?");
//!
//! let digest = Hasher::new().update(b"hello").update(b"world").finalize();
//! assert_eq!(digest.len(), 32);
//! # Ok::<(), ajd_crypto::CryptoError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cipher;
pub mod error;
pub mod hash;
pub mod kdf;
pub mod keys;
pub mod random;

pub use cipher::{Cipher, Direction, Tag};
pub use error::CryptoError;
pub use hash::{Digest, Hasher};
pub use kdf::{derive_key, Pbkdf2Params};
pub use keys::{Iv, SymmetricKey};
pub use random::{fill_random, is_seeded};

/// A fixed 16-byte block, used for keys, IVs, salts and tags.
pub type Block = [u8; BLOCK_SIZE];

/// Size of a [`Block`] in bytes.
pub const BLOCK_SIZE: usize = 16;

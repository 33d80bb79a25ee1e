//! Integration tests for the ajd-crypto toolkit.
//!
//! These tests drive every component together: a password is stretched into
//! a key, a message is sealed under a fresh IV, and the result is opened again.

// Allow unwrap() in tests - panics are acceptable for test assertions
#![allow(clippy::disallowed_methods)]

use anyhow::{Context, Result};
use zeroize::Zeroizing;

use ajd_crypto::{cipher, random, Block, Cipher, Iv, Pbkdf2Params, SymmetricKey, Tag};

// ============================================================================
// Password Envelope
// ============================================================================

/// Everything needed to open a password-protected message, except the password.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub salt: Block,
    pub iv: Iv,
    pub header: Vec<u8>,
    pub ciphertext: Vec<u8>,
    pub tag: Tag,
}

/// Encrypts `plaintext` under a key derived from `password`.
///
/// `header` travels in the clear but is covered by the tag.
pub fn seal_with_password(
    password: &[u8],
    header: &[u8],
    plaintext: &[u8],
    params: &Pbkdf2Params,
) -> Result<Envelope> {
    let salt = random::generate_block().context("Failed to generate salt")?;
    let iv = Iv::generate().context("Failed to generate IV")?;
    let key = SymmetricKey::derive(password, &salt, params).context("Failed to derive key")?;

    let mut cipher = Cipher::encryptor(key.as_bytes(), iv.as_bytes())?;
    cipher.associate_data(header)?;
    let ciphertext = cipher.transform(plaintext)?;
    let tag = cipher.seal()?;

    Ok(Envelope {
        salt,
        iv,
        header: header.to_vec(),
        ciphertext,
        tag,
    })
}

/// Opens an envelope produced by [`seal_with_password`].
pub fn open_with_password(
    password: &[u8],
    envelope: &Envelope,
    params: &Pbkdf2Params,
) -> Result<Zeroizing<Vec<u8>>> {
    let key = SymmetricKey::derive(password, &envelope.salt, params)
        .context("Failed to derive key")?;

    let plaintext = cipher::decrypt(
        key.as_bytes(),
        envelope.iv.as_bytes(),
        &envelope.header,
        &envelope.ciphertext,
        &envelope.tag,
    )?;

    Ok(plaintext)
}

#[cfg(test)]
mod tests {
    use super::*;

    use ajd_crypto::{hash, kdf, CryptoError, Hasher};
    use proptest::collection::vec;
    use proptest::prelude::*;
    use proptest::sample::Index;

    /// Keeps PBKDF2 cheap so property tests stay fast.
    fn fast_params() -> Pbkdf2Params {
        Pbkdf2Params {
            iterations: 2,
            ..Pbkdf2Params::default()
        }
    }

    fn is_auth_failure(err: &anyhow::Error) -> bool {
        err.downcast_ref::<CryptoError>()
            .is_some_and(CryptoError::is_authentication_failure)
    }

    #[test]
    fn test_password_envelope_roundtrip() {
        let params = Pbkdf2Params::default();
        let envelope =
            seal_with_password(b"correct horse", b"v1", b"can you keep a secret?", &params)
                .unwrap();

        let plaintext = open_with_password(b"correct horse", &envelope, &params).unwrap();
        assert_eq!(&plaintext[..], b"can you keep a secret?");
    }

    #[test]
    fn test_wrong_password_fails_authentication() {
        let params = fast_params();
        let envelope = seal_with_password(b"right", b"", b"secret", &params).unwrap();

        let err = open_with_password(b"wrong", &envelope, &params).unwrap_err();
        assert!(is_auth_failure(&err));
    }

    #[test]
    fn test_wrong_iteration_count_fails_authentication() {
        let envelope = seal_with_password(b"pw", b"", b"secret", &fast_params()).unwrap();

        let other = Pbkdf2Params {
            iterations: 3,
            ..fast_params()
        };
        let err = open_with_password(b"pw", &envelope, &other).unwrap_err();
        assert!(is_auth_failure(&err));
    }

    #[test]
    fn test_tampered_header_fails_authentication() {
        let params = fast_params();
        let mut envelope = seal_with_password(b"pw", b"header", b"secret", &params).unwrap();
        envelope.header[0] ^= 1;

        let err = open_with_password(b"pw", &envelope, &params).unwrap_err();
        assert!(is_auth_failure(&err));
    }

    #[test]
    fn test_fresh_salt_and_iv_per_envelope() {
        let params = fast_params();
        let a = seal_with_password(b"pw", b"", b"same message", &params).unwrap();
        let b = seal_with_password(b"pw", b"", b"same message", &params).unwrap();

        assert_ne!(a.salt, b.salt);
        assert_ne!(a.iv, b.iv);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn test_mac_key_from_password() {
        let key = kdf::derive_key(b"pass", b"salt", 2, 32).unwrap();

        let mut mac = Hasher::keyed(&key).unwrap();
        mac.update(b"hello").update(b"world");
        let tag = mac.finalize();

        assert_eq!(tag, hash::mac(&key, b"helloworld").unwrap());
        assert_ne!(tag, hash::digest(b"helloworld"));
    }

    #[test]
    fn test_independent_instances_in_parallel() {
        std::thread::scope(|scope| {
            for i in 0..8u8 {
                scope.spawn(move || {
                    let key = random::generate_key().unwrap();
                    let iv = random::generate_iv().unwrap();
                    let message = vec![i; 1000 + usize::from(i)];

                    let (ciphertext, tag) = cipher::encrypt(&*key, &iv, &[i], &message).unwrap();
                    let plaintext = cipher::decrypt(&*key, &iv, &[i], &ciphertext, &tag).unwrap();
                    assert_eq!(&plaintext[..], &message[..]);
                });
            }
        });
    }

    proptest! {
        #[test]
        fn prop_cipher_roundtrip(
            key in any::<[u8; 16]>(),
            iv in any::<[u8; 16]>(),
            aad in vec(any::<u8>(), 0..64),
            plaintext in vec(any::<u8>(), 0..512),
        ) {
            let mut enc = Cipher::encryptor(&key, &iv).unwrap();
            enc.associate_data(&aad).unwrap();
            let ciphertext = enc.transform(&plaintext).unwrap();
            let tag = enc.seal().unwrap();
            prop_assert_eq!(ciphertext.len(), plaintext.len());

            let mut dec = Cipher::decryptor(&key, &iv, &tag).unwrap();
            dec.associate_data(&aad).unwrap();
            let decrypted = dec.transform(&ciphertext).unwrap();
            prop_assert!(dec.verify().is_ok());
            prop_assert_eq!(decrypted, plaintext);
        }

        #[test]
        fn prop_ciphertext_bit_flip_detected(
            key in any::<[u8; 16]>(),
            iv in any::<[u8; 16]>(),
            plaintext in vec(any::<u8>(), 1..256),
            at in any::<Index>(),
            bit in 0u8..8,
        ) {
            let (mut ciphertext, tag) = cipher::encrypt(&key, &iv, b"", &plaintext).unwrap();
            let i = at.index(ciphertext.len());
            ciphertext[i] ^= 1 << bit;

            let result = cipher::decrypt(&key, &iv, b"", &ciphertext, &tag);
            prop_assert!(matches!(result, Err(CryptoError::Authentication)));
        }

        #[test]
        fn prop_tag_bit_flip_detected(
            key in any::<[u8; 16]>(),
            iv in any::<[u8; 16]>(),
            plaintext in vec(any::<u8>(), 0..128),
            at in any::<Index>(),
            bit in 0u8..8,
        ) {
            let (ciphertext, mut tag) = cipher::encrypt(&key, &iv, b"", &plaintext).unwrap();
            let i = at.index(tag.len());
            tag[i] ^= 1 << bit;

            let result = cipher::decrypt(&key, &iv, b"", &ciphertext, &tag);
            prop_assert!(matches!(result, Err(CryptoError::Authentication)));
        }

        #[test]
        fn prop_aad_bit_flip_detected(
            key in any::<[u8; 16]>(),
            iv in any::<[u8; 16]>(),
            mut aad in vec(any::<u8>(), 1..64),
            plaintext in vec(any::<u8>(), 0..128),
            at in any::<Index>(),
            bit in 0u8..8,
        ) {
            let (ciphertext, tag) = cipher::encrypt(&key, &iv, &aad, &plaintext).unwrap();
            let i = at.index(aad.len());
            aad[i] ^= 1 << bit;

            let result = cipher::decrypt(&key, &iv, &aad, &ciphertext, &tag);
            prop_assert!(matches!(result, Err(CryptoError::Authentication)));
        }

        #[test]
        fn prop_cipher_streaming_equivalence(
            key in any::<[u8; 16]>(),
            iv in any::<[u8; 16]>(),
            aad in vec(any::<u8>(), 0..64),
            plaintext in vec(any::<u8>(), 0..512),
            aad_split in any::<Index>(),
            split in any::<Index>(),
        ) {
            let (expected_ct, expected_tag) = cipher::encrypt(&key, &iv, &aad, &plaintext).unwrap();

            let a = aad_split.index(aad.len() + 1);
            let p = split.index(plaintext.len() + 1);

            let mut enc = Cipher::encryptor(&key, &iv).unwrap();
            enc.associate_data(&aad[..a]).unwrap().associate_data(&aad[a..]).unwrap();
            let mut ciphertext = enc.transform(&plaintext[..p]).unwrap();
            ciphertext.extend(enc.transform(&plaintext[p..]).unwrap());

            prop_assert_eq!(ciphertext, expected_ct);
            prop_assert_eq!(enc.seal().unwrap(), expected_tag);
        }

        #[test]
        fn prop_hash_streaming_equivalence(
            a in vec(any::<u8>(), 0..300),
            b in vec(any::<u8>(), 0..300),
            key in proptest::option::of(vec(any::<u8>(), 0..80)),
        ) {
            let joined = [a.as_slice(), b.as_slice()].concat();
            let new_hasher = || match &key {
                Some(k) => Hasher::keyed(k).unwrap(),
                None => Hasher::new(),
            };

            let split = new_hasher().update(&a).update(&b).finalize();
            let whole = new_hasher().update(&joined).finalize();
            prop_assert_eq!(split, whole);
        }

        #[test]
        fn prop_hash_reusable_after_finalize(
            first in vec(any::<u8>(), 0..200),
            second in vec(any::<u8>(), 0..200),
        ) {
            let mut hasher = Hasher::new();
            hasher.update(&first);
            let _ = hasher.finalize();

            let reused = hasher.update(&second).finalize();
            prop_assert_eq!(reused, hash::digest(&second));
        }

        #[test]
        fn prop_derivation_deterministic(
            password in vec(any::<u8>(), 0..32),
            salt in vec(any::<u8>(), 0..32),
            iterations in 1u32..4,
            length in 1usize..80,
        ) {
            let first = kdf::derive_key(&password, &salt, iterations, length).unwrap();
            let second = kdf::derive_key(&password, &salt, iterations, length).unwrap();
            prop_assert_eq!(&first[..], &second[..]);
            prop_assert_eq!(first.len(), length);

            let mut other_password = password.clone();
            other_password.push(0);
            let changed = kdf::derive_key(&other_password, &salt, iterations, length).unwrap();
            prop_assert_ne!(&first[..], &changed[..]);
        }

        #[test]
        fn prop_password_envelope_roundtrip(
            password in vec(any::<u8>(), 1..32),
            header in vec(any::<u8>(), 0..32),
            plaintext in vec(any::<u8>(), 0..256),
        ) {
            let params = fast_params();
            let envelope = seal_with_password(&password, &header, &plaintext, &params).unwrap();
            let opened = open_with_password(&password, &envelope, &params).unwrap();
            prop_assert_eq!(&opened[..], &plaintext[..]);
        }
    }

    #[test]
    fn test_published_vectors() {
        let key = kdf::derive_key(b"password", b"salt", 1, 32).unwrap();
        assert_eq!(
            hex::encode(&key[..]),
            "120fb6cffcf8b32c43e7225256c4f837a86548c92ccc35480805987cb70be17b"
        );

        assert_eq!(
            hex::encode(hash::digest(b"")),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );

        let mac = hash::mac(&[0x0b; 20], &hex::decode("4869205468657265").unwrap()).unwrap();
        assert_eq!(
            hex::encode(mac),
            "b0344c61d8db38535ca8afceaf0bf12b881dc200c9833da726e9376c2e32cff7"
        );
    }
}

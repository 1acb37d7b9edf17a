//! Encryption-at-rest primitives and bearer token handling shared by the chat services.
//!
//! Ciphertexts produced here are AES-256-GCM with a random 96-bit nonce. The
//! nonce is not embedded by [`encrypt_at_rest`]; callers decide the storage
//! layout (the chat service stores `nonce || ciphertext || tag`).

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::{rngs::OsRng, RngCore};

pub mod jwt;

/// Key length for AES-256.
pub const KEY_LEN: usize = 32;
/// Nonce length for AES-GCM.
pub const NONCE_LEN: usize = 12;
/// Authentication tag appended by AES-GCM.
pub const TAG_LEN: usize = 16;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid key length: expected 32 bytes, got {0}")]
    InvalidKeyLength(usize),
    #[error("invalid nonce length: expected 12 bytes, got {0}")]
    InvalidNonceLength(usize),
    #[error("encryption error")]
    Encryption,
    #[error("decryption error")]
    Decryption,
}

pub fn generate_nonce() -> [u8; NONCE_LEN] {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

pub fn generate_key() -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    OsRng.fill_bytes(&mut key);
    key
}

fn cipher_for(key: &[u8]) -> Result<Aes256Gcm, CryptoError> {
    Aes256Gcm::new_from_slice(key).map_err(|_| CryptoError::InvalidKeyLength(key.len()))
}

/// Encrypt `plaintext` under `key`. Output is ciphertext followed by the tag.
pub fn encrypt_at_rest(plaintext: &[u8], key: &[u8], nonce: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if nonce.len() != NONCE_LEN {
        return Err(CryptoError::InvalidNonceLength(nonce.len()));
    }
    cipher_for(key)?
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|_| CryptoError::Encryption)
}

/// Decrypt and authenticate `ciphertext` produced by [`encrypt_at_rest`].
pub fn decrypt_at_rest(ciphertext: &[u8], key: &[u8], nonce: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if nonce.len() != NONCE_LEN {
        return Err(CryptoError::InvalidNonceLength(nonce.len()));
    }
    if ciphertext.len() < TAG_LEN {
        return Err(CryptoError::Decryption);
    }
    cipher_for(key)?
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| CryptoError::Decryption)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = generate_key();
        let nonce = generate_nonce();
        let plaintext = "héllo wörld 你好 🎉".as_bytes();

        let ciphertext = encrypt_at_rest(plaintext, &key, &nonce).unwrap();
        assert_ne!(ciphertext.as_slice(), plaintext);
        assert_eq!(ciphertext.len(), plaintext.len() + TAG_LEN);

        let decrypted = decrypt_at_rest(&ciphertext, &key, &nonce).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_wrong_key_fails() {
        let nonce = generate_nonce();
        let ciphertext = encrypt_at_rest(b"secret", &generate_key(), &nonce).unwrap();

        let result = decrypt_at_rest(&ciphertext, &generate_key(), &nonce);
        assert_eq!(result, Err(CryptoError::Decryption));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let key = generate_key();
        let nonce = generate_nonce();
        let mut ciphertext = encrypt_at_rest(b"secret", &key, &nonce).unwrap();
        ciphertext[0] ^= 0xff;

        assert_eq!(
            decrypt_at_rest(&ciphertext, &key, &nonce),
            Err(CryptoError::Decryption)
        );
    }

    #[test]
    fn test_rejects_bad_lengths() {
        assert_eq!(
            encrypt_at_rest(b"x", &[0u8; 16], &generate_nonce()),
            Err(CryptoError::InvalidKeyLength(16))
        );
        assert_eq!(
            encrypt_at_rest(b"x", &generate_key(), &[0u8; 24]),
            Err(CryptoError::InvalidNonceLength(24))
        );
        assert_eq!(
            decrypt_at_rest(&[1, 2, 3], &generate_key(), &generate_nonce()),
            Err(CryptoError::Decryption)
        );
    }

    #[test]
    fn test_nonces_are_random() {
        assert_ne!(generate_nonce(), generate_nonce());
    }
}

use crypto_core::{decrypt_at_rest, encrypt_at_rest, generate_nonce, CryptoError, NONCE_LEN, TAG_LEN};

/// Server-managed authenticated encryption for message bodies.
///
/// Stored layout is `nonce (12) || ciphertext || tag (16)`, so a blob is
/// self-contained and can be decrypted with the process key alone.
#[derive(Clone)]
pub struct MessageCipher {
    key: [u8; 32],
}

impl std::fmt::Debug for MessageCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageCipher").finish_non_exhaustive()
    }
}

impl MessageCipher {
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<Vec<u8>, CryptoError> {
        let nonce = generate_nonce();
        let ciphertext = encrypt_at_rest(plaintext.as_bytes(), &self.key, &nonce)?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);
        Ok(blob)
    }

    pub fn decrypt(&self, blob: &[u8]) -> Result<String, CryptoError> {
        if blob.len() < NONCE_LEN + TAG_LEN {
            return Err(CryptoError::Decryption);
        }
        let (nonce, ciphertext) = blob.split_at(NONCE_LEN);
        let plaintext = decrypt_at_rest(ciphertext, &self.key, nonce)?;
        String::from_utf8(plaintext).map_err(|_| CryptoError::Decryption)
    }

    pub fn encrypt_optional(&self, plaintext: Option<&str>) -> Result<Option<Vec<u8>>, CryptoError> {
        plaintext.map(|text| self.encrypt(text)).transpose()
    }

    pub fn decrypt_optional(&self, blob: Option<&[u8]>) -> Result<Option<String>, CryptoError> {
        blob.map(|bytes| self.decrypt(bytes)).transpose()
    }
}

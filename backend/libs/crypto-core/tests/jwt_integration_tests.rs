/// Integration tests for crypto-core token and at-rest encryption helpers
///
/// This test module covers:
/// - Tokens shared between independently built key sets
/// - Algorithm pinning
/// - Ciphertext tampering
use chrono::Duration;
use crypto_core::jwt::{AuthError, Claims, JwtKeys};
use crypto_core::{decrypt_at_rest, encrypt_at_rest, generate_key, generate_nonce, CryptoError};

const SECRET: &[u8] = b"integration-secret";

#[test]
fn token_verifies_with_keys_built_from_same_secret() {
    let issuer = JwtKeys::from_secret(SECRET).unwrap();
    let verifier = JwtKeys::from_secret(SECRET).unwrap();

    let token = issuer.issue("alice", Duration::hours(1)).unwrap();
    let claims = verifier.verify(&token).unwrap();

    assert_eq!(claims.sub, "alice");
    assert!(claims.iat.is_some());
}

#[test]
fn algorithm_is_pinned() {
    let hs256 = JwtKeys::from_secret(SECRET).unwrap();
    let hs512 = JwtKeys::from_secret_and_algorithm(SECRET, "HS512").unwrap();

    let token = hs512.issue("alice", Duration::hours(1)).unwrap();
    assert_eq!(hs256.verify(&token), Err(AuthError::InvalidSignature));
    assert!(hs512.verify(&token).is_ok());
}

#[test]
fn non_hmac_algorithms_are_refused() {
    assert!(JwtKeys::from_secret_and_algorithm(SECRET, "RS256").is_err());
    assert!(JwtKeys::from_secret(b"").is_err());
}

#[test]
fn subjectless_token_is_malformed() {
    let keys = JwtKeys::from_secret(SECRET).unwrap();
    let token = keys
        .sign(&Claims {
            sub: String::new(),
            exp: chrono::Utc::now().timestamp() + 60,
            iat: None,
        })
        .unwrap();

    assert_eq!(keys.verify(&token), Err(AuthError::Malformed));
}

#[test]
fn tampered_ciphertext_fails_to_decrypt() {
    let key = generate_key();
    let nonce = generate_nonce();
    let mut ciphertext = encrypt_at_rest(b"meet at noon", &key, &nonce).unwrap();

    let last = ciphertext.len() - 1;
    ciphertext[last] ^= 0x01;

    assert_eq!(
        decrypt_at_rest(&ciphertext, &key, &nonce),
        Err(CryptoError::Decryption)
    );
}

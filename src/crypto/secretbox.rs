//! Symmetric authenticated encryption: XSalsa20-Poly1305 with a fresh
//! random nonce prepended to the ciphertext on every call.

use crypto_secretbox::aead::{Aead, AeadCore, OsRng};
use crypto_secretbox::{KeyInit, XSalsa20Poly1305};

use crate::crypto::keys::SecretKey;
use crate::error::{MensagoError, Result};

const NONCE_LEN: usize = 24;

/// Encrypts `plaintext` under `key`, returning `nonce || ciphertext`.
pub fn encrypt(plaintext: &[u8], key: &SecretKey) -> Result<Vec<u8>> {
    let cipher = XSalsa20Poly1305::new(key.as_bytes().into());
    let nonce = XSalsa20Poly1305::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| MensagoError::DecryptionFailure(format!("encrypt failed: {e}")))?;

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(nonce.as_slice());
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypts a value produced by [`encrypt`]: splits the leading nonce from
/// the ciphertext before opening it.
pub fn decrypt(sealed: &[u8], key: &SecretKey) -> Result<Vec<u8>> {
    if sealed.len() < NONCE_LEN {
        return Err(MensagoError::BadData("ciphertext too short".into()));
    }
    let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
    let cipher = XSalsa20Poly1305::new(key.as_bytes().into());
    let nonce = crypto_secretbox::Nonce::from_slice(nonce_bytes);
    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|e| MensagoError::DecryptionFailure(format!("decrypt failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_decrypt_round_trips() {
        let key = SecretKey::generate();
        let sealed = encrypt(b"a secret message", &key).unwrap();
        let opened = decrypt(&sealed, &key).unwrap();
        assert_eq!(opened, b"a secret message");
    }

    #[test]
    fn nonce_is_fresh_each_call() {
        let key = SecretKey::generate();
        let a = encrypt(b"same plaintext", &key).unwrap();
        let b = encrypt(b"same plaintext", &key).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_key_fails() {
        let key = SecretKey::generate();
        let other = SecretKey::generate();
        let sealed = encrypt(b"data", &key).unwrap();
        assert!(decrypt(&sealed, &other).is_err());
    }

    #[test]
    fn truncated_ciphertext_rejected() {
        let key = SecretKey::generate();
        assert!(decrypt(&[0u8; 10], &key).is_err());
    }
}

//! Anonymous sealed-box encryption, addressed to a public key with no
//! sender identity attached.
//!
//! A sealed box encrypts to a recipient's public key using an ephemeral
//! sender keypair whose public half is prepended to the ciphertext — the
//! recipient needs only their own private key to open it, never the
//! sender's identity.

use crypto_box::aead::{Aead, AeadCore, OsRng};
use crypto_box::{PublicKey as BoxPublicKey, SalsaBox, SecretKey as BoxSecretKey};

use crate::crypto::cryptostring::CryptoString;
use crate::crypto::keys::EncryptionPair;
use crate::error::{MensagoError, Result};

const CURVE25519: &str = "CURVE25519";

fn box_public_key(cs: &CryptoString) -> Result<BoxPublicKey> {
    if cs.prefix() != CURVE25519 {
        return Err(MensagoError::UnsupportedEncryptionType(
            cs.prefix().to_string(),
        ));
    }
    let raw = cs.raw_data()?;
    let arr: [u8; 32] = raw
        .try_into()
        .map_err(|_| MensagoError::BadData("encryption key must be 32 bytes".into()))?;
    Ok(BoxPublicKey::from(arr))
}

/// Seals `plaintext` to `recipient_public`, returning a `CURVE25519`-typed
/// crypto string whose data is the ephemeral public key, nonce, and
/// ciphertext concatenated.
pub fn seal(plaintext: &[u8], recipient_public: &CryptoString) -> Result<CryptoString> {
    let recipient = box_public_key(recipient_public)?;
    let ephemeral = BoxSecretKey::generate(&mut OsRng);
    let salsa_box = SalsaBox::new(&recipient, &ephemeral);
    let nonce = SalsaBox::generate_nonce(&mut OsRng);
    let ciphertext = salsa_box
        .encrypt(&nonce, plaintext)
        .map_err(|e| MensagoError::DecryptionFailure(format!("seal failed: {e}")))?;

    let mut out = Vec::with_capacity(32 + 24 + ciphertext.len());
    out.extend_from_slice(ephemeral.public_key().as_bytes());
    out.extend_from_slice(nonce.as_slice());
    out.extend_from_slice(&ciphertext);
    CryptoString::from_raw(CURVE25519, &out)
}

/// Opens a value produced by [`seal`] using `recipient`'s private key.
pub fn open(sealed: &CryptoString, recipient: &EncryptionPair) -> Result<Vec<u8>> {
    if sealed.prefix() != CURVE25519 {
        return Err(MensagoError::UnsupportedEncryptionType(
            sealed.prefix().to_string(),
        ));
    }
    let raw = sealed.raw_data()?;
    if raw.len() < 32 + 24 {
        return Err(MensagoError::BadData("sealed value too short".into()));
    }
    let (ephemeral_public, rest) = raw.split_at(32);
    let (nonce_bytes, ciphertext) = rest.split_at(24);

    let ephemeral_arr: [u8; 32] = ephemeral_public
        .try_into()
        .expect("split_at(32) guarantees length");
    let ephemeral = BoxPublicKey::from(ephemeral_arr);

    let private_raw = recipient.private_string()?.raw_data()?;
    let private_arr: [u8; 32] = private_raw
        .try_into()
        .map_err(|_| MensagoError::BadData("private key must be 32 bytes".into()))?;
    let secret = BoxSecretKey::from(private_arr);

    let salsa_box = SalsaBox::new(&ephemeral, &secret);
    let nonce = crypto_box::Nonce::from_slice(nonce_bytes);
    salsa_box
        .decrypt(nonce, ciphertext)
        .map_err(|e| MensagoError::DecryptionFailure(format!("open failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_open_round_trips() {
        let pair = EncryptionPair::generate();
        let sealed = seal(b"hello recipient", &pair.public_string().unwrap()).unwrap();
        let opened = open(&sealed, &pair).unwrap();
        assert_eq!(opened, b"hello recipient");
    }

    #[test]
    fn wrong_recipient_fails() {
        let pair = EncryptionPair::generate();
        let other = EncryptionPair::generate();
        let sealed = seal(b"secret", &pair.public_string().unwrap()).unwrap();
        assert!(open(&sealed, &other).is_err());
    }

    #[test]
    fn seal_rejects_wrong_prefix() {
        let bad = CryptoString::from_raw("ED25519", &[0u8; 32]).unwrap();
        assert!(seal(b"data", &bad).is_err());
    }
}

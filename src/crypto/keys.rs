//! # Key Management
//!
//! Encryption pairs (X25519, typed `CURVE25519`), signing pairs (Ed25519,
//! typed `ED25519`), and secret keys (XSalsa20, typed `XSALSA20`).
//!
//! ## Key file format
//!
//! Each key type persists as a small JSON record validated against a fixed
//! schema. Asymmetric pairs carry four fields; secret keys carry two:
//!
//! ```text
//! EncryptionPair / SigningPair          SecretKey
//! ┌───────────────────────────┐         ┌───────────────────┐
//! │ Public:     <CryptoString>│         │ Key:     <CryptoString>│
//! │ PublicHash: <CryptoString>│         │ KeyHash: <CryptoString>│
//! │ Private:    <CryptoString>│         └───────────────────┘
//! │ PrivateHash:<CryptoString>│
//! └───────────────────────────┘
//! ```
//!
//! Every hash is computed over the *raw* decoded key bytes with
//! [`crate::crypto::hashing::DEFAULT_ALGORITHM`], never over the base85
//! text — hashing the encoded form would make the fingerprint depend on
//! an encoding detail rather than the key material itself.

use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::cryptostring::CryptoString;
use crate::crypto::hashing::{hash_default, DEFAULT_ALGORITHM};
use crate::error::{MensagoError, Result};

const CURVE25519: &str = "CURVE25519";
const ED25519: &str = "ED25519";
const XSALSA20: &str = "XSALSA20";

/// On-disk record shared by [`EncryptionPair`] and [`SigningPair`].
#[derive(Serialize, Deserialize)]
struct PairFile {
    #[serde(rename = "Public")]
    public: CryptoString,
    #[serde(rename = "PublicHash")]
    public_hash: CryptoString,
    #[serde(rename = "Private")]
    private: CryptoString,
    #[serde(rename = "PrivateHash")]
    private_hash: CryptoString,
}

/// On-disk record for [`SecretKey`].
#[derive(Serialize, Deserialize)]
struct KeyFile {
    #[serde(rename = "Key")]
    key: CryptoString,
    #[serde(rename = "KeyHash")]
    key_hash: CryptoString,
}

fn write_new_file(path: &Path, contents: &str) -> Result<()> {
    if path.exists() {
        return Err(MensagoError::ResourceExists(path.display().to_string()));
    }
    fs::write(path, contents)?;
    Ok(())
}

/// An X25519 encryption keypair, typed `CURVE25519`.
#[derive(ZeroizeOnDrop)]
pub struct EncryptionPair {
    #[zeroize(skip)] // x25519_dalek handles its own zeroization
    secret: StaticSecret,
    #[zeroize(skip)]
    public: X25519PublicKey,
}

impl EncryptionPair {
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = X25519PublicKey::from(&secret);
        Self { secret, public }
    }

    pub fn public_string(&self) -> Result<CryptoString> {
        CryptoString::from_raw(CURVE25519, self.public.as_bytes())
    }

    pub fn private_string(&self) -> Result<CryptoString> {
        CryptoString::from_raw(CURVE25519, &self.secret.to_bytes())
    }

    /// Fingerprint of the public key over its raw bytes.
    pub fn public_hash(&self) -> Result<CryptoString> {
        hash_default(self.public.as_bytes())
    }

    /// Fingerprint of the private key over its raw bytes.
    pub fn private_hash(&self) -> Result<CryptoString> {
        hash_default(&self.secret.to_bytes())
    }

    pub fn public_bytes(&self) -> [u8; 32] {
        *self.public.as_bytes()
    }

    pub fn diffie_hellman(&self, their_public: &CryptoString) -> Result<[u8; 32]> {
        if their_public.prefix() != CURVE25519 {
            return Err(MensagoError::UnsupportedEncryptionType(
                their_public.prefix().to_string(),
            ));
        }
        let raw = their_public.raw_data()?;
        let arr: [u8; 32] = raw
            .try_into()
            .map_err(|_| MensagoError::BadData("encryption key must be 32 bytes".into()))?;
        let their = X25519PublicKey::from(arr);
        Ok(self.secret.diffie_hellman(&their).to_bytes())
    }

    /// Persists this pair to `path` as the four-field JSON record. Fails
    /// with `ResourceExists` if `path` is already occupied.
    pub fn save(&self, path: &Path) -> Result<()> {
        let record = PairFile {
            public: self.public_string()?,
            public_hash: self.public_hash()?,
            private: self.private_string()?,
            private_hash: self.private_hash()?,
        };
        write_new_file(path, &serde_json::to_string_pretty(&record)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let record: PairFile = serde_json::from_str(&text)?;
        if record.public.prefix() != CURVE25519 || record.private.prefix() != CURVE25519 {
            return Err(MensagoError::UnsupportedEncryptionType(
                record.public.prefix().to_string(),
            ));
        }
        verify_fingerprint(&record.public, &record.public_hash)?;
        verify_fingerprint(&record.private, &record.private_hash)?;

        let raw = record.private.raw_data()?;
        let arr: [u8; 32] = raw
            .try_into()
            .map_err(|_| MensagoError::BadData("encryption key must be 32 bytes".into()))?;
        let secret = StaticSecret::from(arr);
        let public = X25519PublicKey::from(&secret);
        Ok(Self { secret, public })
    }
}

/// An Ed25519 signing keypair, typed `ED25519`.
#[derive(ZeroizeOnDrop)]
pub struct SigningPair {
    #[zeroize(skip)] // ed25519_dalek::SigningKey handles its own zeroization
    secret: SigningKey,
}

impl SigningPair {
    pub fn generate() -> Self {
        Self {
            secret: SigningKey::generate(&mut OsRng),
        }
    }

    pub fn public_string(&self) -> Result<CryptoString> {
        CryptoString::from_raw(ED25519, self.secret.verifying_key().as_bytes())
    }

    pub fn private_string(&self) -> Result<CryptoString> {
        CryptoString::from_raw(ED25519, &self.secret.to_bytes())
    }

    pub fn public_hash(&self) -> Result<CryptoString> {
        hash_default(self.secret.verifying_key().as_bytes())
    }

    pub fn private_hash(&self) -> Result<CryptoString> {
        hash_default(&self.secret.to_bytes())
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.secret.verifying_key()
    }

    /// Reconstructs a pair from a bare `ED25519:<base85>` private key
    /// string, without the key-file envelope `load` expects. Used when a
    /// keycard entry is signed with a key handed over in isolation, e.g.
    /// during chaining.
    pub fn from_private_string(private: &CryptoString) -> Result<Self> {
        if private.prefix() != ED25519 {
            return Err(MensagoError::UnsupportedEncryptionType(
                private.prefix().to_string(),
            ));
        }
        let raw = private.raw_data()?;
        let arr: [u8; 32] = raw
            .try_into()
            .map_err(|_| MensagoError::BadData("signing key must be 32 bytes".into()))?;
        Ok(Self {
            secret: SigningKey::from_bytes(&arr),
        })
    }

    /// Produces a detached `ED25519:<base85>` signature over `data`.
    pub fn sign(&self, data: &[u8]) -> Result<CryptoString> {
        let sig = self.secret.sign(data);
        CryptoString::from_raw(ED25519, &sig.to_bytes())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let record = PairFile {
            public: self.public_string()?,
            public_hash: self.public_hash()?,
            private: self.private_string()?,
            private_hash: self.private_hash()?,
        };
        write_new_file(path, &serde_json::to_string_pretty(&record)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let record: PairFile = serde_json::from_str(&text)?;
        if record.public.prefix() != ED25519 || record.private.prefix() != ED25519 {
            return Err(MensagoError::UnsupportedEncryptionType(
                record.public.prefix().to_string(),
            ));
        }
        verify_fingerprint(&record.public, &record.public_hash)?;
        verify_fingerprint(&record.private, &record.private_hash)?;

        let raw = record.private.raw_data()?;
        let arr: [u8; 32] = raw
            .try_into()
            .map_err(|_| MensagoError::BadData("signing key must be 32 bytes".into()))?;
        Ok(Self {
            secret: SigningKey::from_bytes(&arr),
        })
    }
}

/// Verifies a detached `ED25519` signature made by [`SigningPair::sign`].
pub fn verify_detached(public: &CryptoString, data: &[u8], signature: &CryptoString) -> Result<()> {
    if public.prefix() != ED25519 {
        return Err(MensagoError::UnsupportedEncryptionType(
            public.prefix().to_string(),
        ));
    }
    let raw = public.raw_data()?;
    let arr: [u8; 32] = raw
        .try_into()
        .map_err(|_| MensagoError::BadData("verifying key must be 32 bytes".into()))?;
    let verifying_key = VerifyingKey::from_bytes(&arr)
        .map_err(|e| MensagoError::VerificationError(e.to_string()))?;

    let sig_raw = signature.raw_data()?;
    let sig_arr: [u8; 64] = sig_raw
        .try_into()
        .map_err(|_| MensagoError::BadData("signature must be 64 bytes".into()))?;
    let sig = ed25519_dalek::Signature::from_bytes(&sig_arr);

    verifying_key
        .verify(data, &sig)
        .map_err(|e| MensagoError::VerificationError(e.to_string()))
}

/// A single symmetric key, typed `XSALSA20`.
#[derive(ZeroizeOnDrop)]
pub struct SecretKey {
    key: [u8; 32],
}

impl SecretKey {
    pub fn generate() -> Self {
        let mut key = [0u8; 32];
        OsRng.fill_bytes(&mut key);
        Self { key }
    }

    pub fn from_bytes(key: [u8; 32]) -> Self {
        Self { key }
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.key
    }

    pub fn key_string(&self) -> Result<CryptoString> {
        CryptoString::from_raw(XSALSA20, &self.key)
    }

    pub fn key_hash(&self) -> Result<CryptoString> {
        hash_default(&self.key)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let record = KeyFile {
            key: self.key_string()?,
            key_hash: self.key_hash()?,
        };
        write_new_file(path, &serde_json::to_string_pretty(&record)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let record: KeyFile = serde_json::from_str(&text)?;
        if record.key.prefix() != XSALSA20 {
            return Err(MensagoError::UnsupportedEncryptionType(
                record.key.prefix().to_string(),
            ));
        }
        verify_fingerprint(&record.key, &record.key_hash)?;
        let raw = record.key.raw_data()?;
        let arr: [u8; 32] = raw
            .try_into()
            .map_err(|_| MensagoError::BadData("secret key must be 32 bytes".into()))?;
        Ok(Self { key: arr })
    }
}

impl Drop for SecretKey {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

fn verify_fingerprint(value: &CryptoString, expected_hash: &CryptoString) -> Result<()> {
    let raw = value.raw_data()?;
    let algo = if expected_hash.prefix().is_empty() {
        DEFAULT_ALGORITHM
    } else {
        expected_hash.prefix()
    };
    let recomputed = crate::crypto::hashing::hash(&raw, algo)?;
    if &recomputed != expected_hash {
        return Err(MensagoError::HashMismatch(
            "key fingerprint does not match stored key bytes".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn encryption_pair_generation_is_unique() {
        let a = EncryptionPair::generate();
        let b = EncryptionPair::generate();
        assert_ne!(a.public_bytes(), b.public_bytes());
    }

    #[test]
    fn diffie_hellman_agrees() {
        let alice = EncryptionPair::generate();
        let bob = EncryptionPair::generate();
        let shared_a = alice.diffie_hellman(&bob.public_string().unwrap()).unwrap();
        let shared_b = bob.diffie_hellman(&alice.public_string().unwrap()).unwrap();
        assert_eq!(shared_a, shared_b);
    }

    #[test]
    fn signing_round_trips() {
        let pair = SigningPair::generate();
        let sig = pair.sign(b"hello world").unwrap();
        verify_detached(&pair.public_string().unwrap(), b"hello world", &sig).unwrap();
        assert!(verify_detached(&pair.public_string().unwrap(), b"tampered", &sig).is_err());
    }

    #[test]
    fn encryption_pair_save_load_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("enc.json");
        let pair = EncryptionPair::generate();
        pair.save(&path).unwrap();

        let loaded = EncryptionPair::load(&path).unwrap();
        assert_eq!(pair.public_bytes(), loaded.public_bytes());
    }

    #[test]
    fn save_refuses_to_overwrite() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("enc.json");
        let pair = EncryptionPair::generate();
        pair.save(&path).unwrap();
        assert!(matches!(
            pair.save(&path).unwrap_err(),
            MensagoError::ResourceExists(_)
        ));
    }

    #[test]
    fn secret_key_save_load_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("secret.json");
        let key = SecretKey::generate();
        key.save(&path).unwrap();

        let loaded = SecretKey::load(&path).unwrap();
        assert_eq!(key.as_bytes(), loaded.as_bytes());
    }
}

//! Content-addressed hashing, producing [`CryptoString`] values.
//!
//! Four algorithm prefixes are recognized as valid `CryptoString` hash
//! tags — `BLAKE2B-256`, `BLAKE3-256`, `SHA-256`, `SHA3-256` — but BLAKE3
//! has no binding wired up here, so `BLAKE3-256` parses and round-trips as
//! a prefix while [`hash`] rejects it with
//! [`MensagoError::UnsupportedHashType`].

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use sha2::Sha256;
use sha3::Sha3_256;

use crate::crypto::CryptoString;
use crate::error::{MensagoError, Result};

type Blake2b256 = Blake2b<U32>;

/// The default hash algorithm used for fingerprints throughout this crate.
pub const DEFAULT_ALGORITHM: &str = "BLAKE2B-256";

/// Computes a [`CryptoString`]-wrapped hash of `data` under `algo`.
///
/// `algo` must be one of `BLAKE2B-256`, `SHA-256`, `SHA3-256`. Any other
/// value — including the otherwise-valid `BLAKE3-256` prefix — fails with
/// [`MensagoError::UnsupportedHashType`].
pub fn hash(data: &[u8], algo: &str) -> Result<CryptoString> {
    let digest: Vec<u8> = match algo {
        "BLAKE2B-256" => Blake2b256::digest(data).to_vec(),
        "SHA-256" => Sha256::digest(data).to_vec(),
        "SHA3-256" => Sha3_256::digest(data).to_vec(),
        other => {
            return Err(MensagoError::UnsupportedHashType(other.to_string()));
        }
    };
    CryptoString::from_raw(algo, &digest)
}

/// Convenience wrapper computing a hash with [`DEFAULT_ALGORITHM`].
pub fn hash_default(data: &[u8]) -> Result<CryptoString> {
    hash(data, DEFAULT_ALGORITHM)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        let a = hash(b"hello", "BLAKE2B-256").unwrap();
        let b = hash(b"hello", "BLAKE2B-256").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_algorithms_disagree() {
        let a = hash(b"hello", "SHA-256").unwrap();
        let b = hash(b"hello", "SHA3-256").unwrap();
        assert_ne!(a.data(), b.data());
    }

    #[test]
    fn blake3_prefix_rejected_by_hash() {
        let err = hash(b"hello", "BLAKE3-256").unwrap_err();
        assert!(matches!(err, MensagoError::UnsupportedHashType(_)));
    }

    #[test]
    fn unknown_algorithm_rejected() {
        assert!(hash(b"hello", "MD5").is_err());
    }
}

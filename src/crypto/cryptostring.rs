//! # Typed Crypto Strings
//!
//! A `CryptoString` bundles a cryptographic key, hash, or signature with the
//! algorithm that produced it, in a form that is safe to embed in JSON and
//! CRLF-joined keycard text alike: `<PREFIX>:<base85-data>`.
//!
//! ```text
//! ED25519:)8id(gE02^S<{3H>9B;X4{DuYcb`%wo^mC&1lN88
//! └──┬──┘ └──────────────────┬────────────────────┘
//!  prefix                  base85 data
//! ```
//!
//! The prefix names the algorithm (1–15 uppercase ASCII letters, digits, or
//! dashes); the data is always base85-decodable raw bytes. Equality is
//! component-wise, and an empty prefix or empty data marks the value
//! invalid — there is deliberately no "half valid" state.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{MensagoError, Result};

static PREFIX_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z0-9-]{1,15}$").unwrap());

/// A typed, algorithm-tagged, base85-encoded byte string.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CryptoString {
    prefix: String,
    data: String,
}

impl CryptoString {
    /// Returns an empty (invalid) instance.
    pub fn empty() -> Self {
        Self {
            prefix: String::new(),
            data: String::new(),
        }
    }

    /// Parses `prefix:data`, validating the prefix shape and that `data`
    /// base85-decodes.
    pub fn parse(s: &str) -> Result<Self> {
        validate(s)?;
        let (prefix, data) = s.split_once(':').expect("validate() guarantees a colon");
        Ok(Self {
            prefix: prefix.to_string(),
            data: data.to_string(),
        })
    }

    /// Builds a `CryptoString` directly from a prefix and raw (undecoded)
    /// bytes, base85-encoding them.
    pub fn from_raw(prefix: &str, raw: &[u8]) -> Result<Self> {
        if !PREFIX_PATTERN.is_match(prefix) {
            return Err(MensagoError::BadParameterValue(format!(
                "prefix is non-compliant: {prefix}"
            )));
        }
        Ok(Self {
            prefix: prefix.to_string(),
            data: base85::encode(raw),
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The base85-encoded data portion, unchanged from input.
    pub fn data(&self) -> &str {
        &self.data
    }

    /// Decodes the data portion back into raw bytes.
    pub fn raw_data(&self) -> Result<Vec<u8>> {
        base85::decode(&self.data)
            .map_err(|e| MensagoError::BadData(format!("base85 decode failed: {e}")))
    }

    /// False if the prefix and/or the data is missing.
    pub fn is_valid(&self) -> bool {
        !self.prefix.is_empty() && !self.data.is_empty()
    }

    pub fn as_string(&self) -> String {
        self.to_string()
    }

    pub fn as_bytes(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl fmt::Display for CryptoString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.prefix, self.data)
    }
}

impl TryFrom<String> for CryptoString {
    type Error = MensagoError;

    fn try_from(value: String) -> Result<Self> {
        CryptoString::parse(&value)
    }
}

impl From<CryptoString> for String {
    fn from(value: CryptoString) -> Self {
        value.to_string()
    }
}

/// Checks a string against the CryptoString format without constructing one.
pub fn validate(s: &str) -> Result<()> {
    let (prefix, rest) = s
        .split_once(':')
        .ok_or_else(|| MensagoError::BadParameterValue("prefix is non-compliant".into()))?;

    if !PREFIX_PATTERN.is_match(prefix) {
        return Err(MensagoError::BadParameterValue(
            "prefix is non-compliant".into(),
        ));
    }

    base85::decode(rest)
        .map_err(|e| MensagoError::BadParameterValue(format!("error decoding data: {e}")))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_from_raw() {
        let cs = CryptoString::from_raw("ED25519", &[1, 2, 3, 4]).unwrap();
        assert!(cs.is_valid());
        assert_eq!(cs.raw_data().unwrap(), vec![1, 2, 3, 4]);
        let reparsed = CryptoString::parse(&cs.as_string()).unwrap();
        assert_eq!(cs, reparsed);
    }

    #[test]
    fn rejects_bad_prefix() {
        assert!(CryptoString::parse("lowercase:abc").is_err());
        assert!(CryptoString::parse("WAY-TOO-LONG-A-PREFIX:abc").is_err());
    }

    #[test]
    fn rejects_missing_colon() {
        assert!(CryptoString::parse("ED25519").is_err());
    }

    #[test]
    fn empty_is_invalid() {
        assert!(!CryptoString::empty().is_valid());
    }

    #[test]
    fn equality_is_componentwise() {
        let a = CryptoString::parse("SHA-256:00").unwrap();
        let b = CryptoString::parse("SHA-256:00").unwrap();
        assert_eq!(a, b);
    }
}

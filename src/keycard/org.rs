//! # Organization Entries
//!
//! Constructors and chain operations for `Organization`-typed [`Entry`]
//! values.

use crate::address::WAddress;
use crate::crypto::hashing::DEFAULT_ALGORITHM;
use crate::crypto::keys::{EncryptionPair, SigningPair};
use crate::crypto::CryptoString;
use crate::error::{MensagoError, Result};
use crate::time;

use super::entry::{Entry, EntryType};

/// Freshly-generated keys produced by [`new_root`] or [`chain`], returned
/// alongside the new entry so the caller can persist them.
pub struct OrgKeys {
    pub primary_signing: SigningPair,
    pub encryption: EncryptionPair,
    /// Populated only when a key rotation generated a fresh secondary
    /// signing key; `None` when the prior primary key was demoted into the
    /// `Secondary-Verification-Key` slot instead.
    pub secondary_signing: Option<SigningPair>,
}

/// Builds the first entry of a brand-new organization keycard: `Index=1`,
/// `Time-To-Live=30`, `Timestamp=now`, `Expires` 365 days out, and a fresh
/// primary signing/encryption keypair. The caller still owes the entry its
/// hash and `Organization` signature.
pub fn new_root(name: &str, contact_admin: &str) -> Result<(Entry, SigningPair, EncryptionPair)> {
    let mut addr = WAddress::new();
    addr.set(contact_admin)?;

    let mut entry = Entry::new(EntryType::Organization);
    entry.set_field("Index", "1");
    entry.set_field("Name", name);
    entry.set_field("Contact-Admin", &addr.as_string());
    entry.set_field("Time-To-Live", "30");
    entry.set_field("Timestamp", &time::now_timestamp());
    entry.set_expiration(None);

    let signing = SigningPair::generate();
    let encryption = EncryptionPair::generate();
    entry.set_field("Primary-Verification-Key", &signing.public_string()?.as_string());
    entry.set_field("Encryption-Key", &encryption.public_string()?.as_string());

    Ok((entry, signing, encryption))
}

/// Produces the next entry in the chain, signed for custody with
/// `signing_key` (the tail entry's own primary signing private key).
///
/// Always rotates the primary signing and encryption keys. When
/// `rotate_optional` is set, a fresh secondary signing key is generated as
/// well; otherwise the old primary verification key is carried forward as
/// the new `Secondary-Verification-Key`, keeping one still-trusted old key
/// around during ordinary rotation.
pub fn chain(previous: &Entry, signing_key: &CryptoString, rotate_optional: bool) -> Result<(Entry, OrgKeys)> {
    if previous.entry_type() != EntryType::Organization {
        return Err(MensagoError::BadParameterValue("not an organization entry".into()));
    }
    if signing_key.prefix() != "ED25519" {
        return Err(MensagoError::UnsupportedEncryptionType(
            signing_key.prefix().to_string(),
        ));
    }
    previous.is_compliant().map_err(|e| {
        MensagoError::NotCompliant(format!("previous entry is not compliant: {e}"))
    })?;

    let prev_index: i64 = previous
        .get("Index")
        .ok_or_else(|| MensagoError::RequiredFieldMissing("Index".into()))?
        .parse()
        .map_err(|_| MensagoError::BadData("bad Index field".into()))?;

    let mut entry = previous.clone();
    entry.set_field("Index", &(prev_index + 1).to_string());
    entry.set_field("Timestamp", &time::now_timestamp());
    entry.set_expiration(None);
    entry.set_previous_hash(previous.hash());

    let old_primary = previous
        .get("Primary-Verification-Key")
        .ok_or_else(|| MensagoError::RequiredFieldMissing("Primary-Verification-Key".into()))?
        .to_string();

    let primary_signing = SigningPair::generate();
    let encryption = EncryptionPair::generate();
    entry.set_field(
        "Primary-Verification-Key",
        &primary_signing.public_string()?.as_string(),
    );
    entry.set_field("Encryption-Key", &encryption.public_string()?.as_string());

    let secondary_signing = if rotate_optional {
        let pair = SigningPair::generate();
        entry.set_field("Secondary-Verification-Key", &pair.public_string()?.as_string());
        Some(pair)
    } else {
        entry.set_field("Secondary-Verification-Key", &old_primary);
        None
    };

    entry.sign(signing_key, "Custody")?;

    Ok((
        entry,
        OrgKeys {
            primary_signing,
            encryption,
            secondary_signing,
        },
    ))
}

/// Verifies that `entry` legitimately follows `previous` in a keycard:
/// type match, `Custody` signature present, `Index` contiguity, and the
/// `Custody` signature verifying against `previous`'s primary key.
pub fn verify_chain(entry: &Entry, previous: &Entry) -> Result<()> {
    if previous.entry_type() != EntryType::Organization || entry.entry_type() != EntryType::Organization {
        return Err(MensagoError::BadParameterValue("not an organization entry".into()));
    }

    let custody = entry
        .signature("Custody")
        .filter(|s| !s.is_empty())
        .ok_or_else(|| MensagoError::SignatureMissing("Custody-Signature".into()))?;
    if custody.is_empty() {
        return Err(MensagoError::SignatureMissing("Custody-Signature".into()));
    }

    let verify_key_str = previous
        .get("Primary-Verification-Key")
        .filter(|v| !v.is_empty())
        .ok_or_else(|| MensagoError::RequiredFieldMissing("Primary-Verification-Key".into()))?;
    let verify_key = CryptoString::parse(verify_key_str)?;

    let prev_index: i64 = previous
        .get("Index")
        .ok_or_else(|| MensagoError::RequiredFieldMissing("Index".into()))?
        .parse()
        .map_err(|_| MensagoError::BadData("bad Index field".into()))?;
    let this_index: i64 = entry
        .get("Index")
        .ok_or_else(|| MensagoError::RequiredFieldMissing("Index".into()))?
        .parse()
        .map_err(|_| MensagoError::BadData("bad Index field".into()))?;
    if this_index != prev_index + 1 {
        return Err(MensagoError::InvalidKeycard(
            "entry index does not follow previous entry".into(),
        ));
    }

    entry.verify_signature(&verify_key, "Custody")
}

/// Generates the hash over the default algorithm and produces the final
/// `Organization` signature, completing a freshly built entry.
pub fn finalize(entry: &mut Entry, primary_signing: &SigningPair) -> Result<()> {
    entry.generate_hash(DEFAULT_ALGORITHM)?;
    entry.sign(&primary_signing.private_string()?, "Organization")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> (Entry, SigningPair, EncryptionPair) {
        let (mut entry, signing, encryption) = new_root(
            "Example, Inc.",
            "c590b44c-798d-4055-8d72-725a7942f3f6/acme.com",
        )
        .unwrap();
        finalize(&mut entry, &signing).unwrap();
        (entry, signing, encryption)
    }

    #[test]
    fn root_entry_is_compliant() {
        let (entry, _, _) = root();
        assert!(entry.is_compliant().is_ok());
    }

    #[test]
    fn chain_then_verify_succeeds() {
        let (root_entry, signing, _) = root();
        let (mut next, keys) = chain(&root_entry, &signing.private_string().unwrap(), false).unwrap();
        finalize(&mut next, &keys.primary_signing).unwrap();
        assert!(next.is_compliant().is_ok());
        assert!(verify_chain(&next, &root_entry).is_ok());
    }

    #[test]
    fn chain_rejects_noncompliant_previous() {
        let (mut entry, _, _) = new_root(
            "Example, Inc.",
            "c590b44c-798d-4055-8d72-725a7942f3f6/acme.com",
        )
        .unwrap();
        // never hashed/signed -- not compliant
        let signing = SigningPair::generate();
        entry.set_field("Name", "Example, Inc."); // no-op touch
        assert!(chain(&entry, &signing.private_string().unwrap(), false).is_err());
    }

    #[test]
    fn verify_chain_rejects_wrong_index() {
        let (root_entry, signing, _) = root();
        let (mut next, keys) = chain(&root_entry, &signing.private_string().unwrap(), false).unwrap();
        next.set_field("Index", "99");
        finalize(&mut next, &keys.primary_signing).unwrap();
        assert!(verify_chain(&next, &root_entry).is_err());
    }
}

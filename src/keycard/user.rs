//! # User Entries
//!
//! Constructors and chain operations for `User`-typed [`Entry`] values.

use crate::address::{Domain, UUID};
use crate::crypto::hashing::DEFAULT_ALGORITHM;
use crate::crypto::keys::{EncryptionPair, SigningPair};
use crate::crypto::CryptoString;
use crate::error::{MensagoError, Result};
use crate::time;

use super::entry::{Entry, EntryType};

/// Keys produced by [`new_root`] or [`chain`].
pub struct UserKeys {
    pub primary_signing: SigningPair,
    pub contact_request_signing: SigningPair,
    pub contact_request_encryption: EncryptionPair,
    /// `Some` only when `rotate_optional` forced a primary-encryption
    /// rotation; otherwise the previous entry's keys carry forward
    /// unchanged in `entry.fields`.
    pub primary_encryption: Option<EncryptionPair>,
    pub alternate_encryption: Option<EncryptionPair>,
}

/// Builds the first entry of a brand-new user keycard: `Index=1`,
/// `Time-To-Live=7`, `Timestamp` backdated five minutes (the clock-skew
/// cushion every new user entry applies), `Expires` 90 days out, and fresh
/// contact-request and primary-encryption keypairs.
pub fn new_root(
    workspace_id: &UUID,
    domain: &Domain,
    user_id: Option<&str>,
) -> Result<(Entry, SigningPair, EncryptionPair, EncryptionPair)> {
    if !workspace_id.is_valid() || !domain.is_valid() {
        return Err(MensagoError::BadParameterValue("bad workspace id or domain".into()));
    }

    let mut entry = Entry::new(EntryType::User);
    entry.set_field("Index", "1");
    entry.set_field("Workspace-ID", workspace_id.as_string());
    entry.set_field("Domain", domain.as_string());
    if let Some(uid) = user_id {
        entry.set_field("User-ID", uid);
    }
    entry.set_field("Time-To-Live", "7");
    entry.set_field("Timestamp", &time::now_timestamp_backdated(5));
    entry.set_expiration(None);

    let primary_signing = SigningPair::generate();
    let contact_request_signing = SigningPair::generate();
    let contact_request_encryption = EncryptionPair::generate();
    let primary_encryption = EncryptionPair::generate();

    entry.set_field(
        "Contact-Request-Verification-Key",
        &contact_request_signing.public_string()?.as_string(),
    );
    entry.set_field(
        "Contact-Request-Encryption-Key",
        &contact_request_encryption.public_string()?.as_string(),
    );
    entry.set_field(
        "Public-Encryption-Key",
        &primary_encryption.public_string()?.as_string(),
    );

    Ok((entry, primary_signing, contact_request_signing, contact_request_encryption))
}

/// Produces the next entry in the chain, signed for custody with
/// `crsign_key` (the tail entry's own contact-request signing private
/// key, not the primary signing key).
///
/// The primary signing key and both contact-request keys are always
/// refreshed. `Public-Encryption-Key` / `Alternate-Encryption-Key` are only
/// refreshed when `rotate_optional` is set — otherwise the prior entry's
/// values are carried forward unchanged.
pub fn chain(previous: &Entry, crsign_key: &CryptoString, rotate_optional: bool) -> Result<(Entry, UserKeys)> {
    if previous.entry_type() != EntryType::User {
        return Err(MensagoError::BadParameterValue("not a user entry".into()));
    }
    if crsign_key.prefix() != "ED25519" {
        return Err(MensagoError::UnsupportedEncryptionType(
            crsign_key.prefix().to_string(),
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
    entry.set_field("Timestamp", &time::now_timestamp_backdated(5));
    entry.set_expiration(None);
    entry.set_previous_hash(previous.hash());

    let primary_signing = SigningPair::generate();
    let contact_request_signing = SigningPair::generate();
    let contact_request_encryption = EncryptionPair::generate();

    entry.set_field(
        "Contact-Request-Verification-Key",
        &contact_request_signing.public_string()?.as_string(),
    );
    entry.set_field(
        "Contact-Request-Encryption-Key",
        &contact_request_encryption.public_string()?.as_string(),
    );

    let (primary_encryption, alternate_encryption) = if rotate_optional {
        let primary = EncryptionPair::generate();
        let alternate = EncryptionPair::generate();
        entry.set_field("Public-Encryption-Key", &primary.public_string()?.as_string());
        entry.set_field("Alternate-Encryption-Key", &alternate.public_string()?.as_string());
        (Some(primary), Some(alternate))
    } else {
        (None, None)
    };

    entry.sign(crsign_key, "Custody")?;

    Ok((
        entry,
        UserKeys {
            primary_signing,
            contact_request_signing,
            contact_request_encryption,
            primary_encryption,
            alternate_encryption,
        },
    ))
}

/// Verifies that `entry` legitimately follows `previous`: type match,
/// `Custody` signature present, `Index` contiguity, and the `Custody`
/// signature verifying against `previous`'s contact-request verification
/// key.
pub fn verify_chain(entry: &Entry, previous: &Entry) -> Result<()> {
    if previous.entry_type() != EntryType::User || entry.entry_type() != EntryType::User {
        return Err(MensagoError::BadParameterValue("not a user entry".into()));
    }

    let custody = entry
        .signature("Custody")
        .filter(|s| !s.is_empty())
        .ok_or_else(|| MensagoError::SignatureMissing("Custody-Signature".into()))?;
    if custody.is_empty() {
        return Err(MensagoError::SignatureMissing("Custody-Signature".into()));
    }

    let verify_key_str = previous
        .get("Contact-Request-Verification-Key")
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            MensagoError::RequiredFieldMissing("Contact-Request-Verification-Key".into())
        })?;
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

/// Completes a user entry the way a real `ADDENTRY` round-trip does:
/// the organization signs `Organization` first (in production this is the
/// home server's counter-signature, applied client-side via
/// [`crate::protocol::commands::addentry`]), then the hash is generated
/// over everything up to that point, then the user signs `User`. A user
/// entry can never reach `is_compliant()` without an `Organization`
/// signature -- the schema requires it -- so there is no local-only
/// shortcut here the way there is for organization entries.
pub fn finalize(
    entry: &mut Entry,
    org_signing: &SigningPair,
    primary_signing: &SigningPair,
) -> Result<()> {
    entry.sign(&org_signing.private_string()?, "Organization")?;
    entry.generate_hash(DEFAULT_ALGORITHM)?;
    entry.sign(&primary_signing.private_string()?, "User")
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A standalone organization signing key, standing in for the home
    /// server's counter-signing key during the simulated `ADDENTRY`
    /// round-trip these tests perform locally.
    fn org_key() -> SigningPair {
        SigningPair::generate()
    }

    fn root(org: &SigningPair) -> (Entry, SigningPair, SigningPair) {
        let wid = UUID::generate();
        let mut domain = Domain::new();
        domain.set("example.com").unwrap();
        let (mut entry, primary, crsign, _) =
            new_root(&wid, &domain, Some("alice")).unwrap();
        finalize(&mut entry, org, &primary).unwrap();
        (entry, primary, crsign)
    }

    #[test]
    fn root_entry_is_compliant() {
        let (entry, _, _) = root(&org_key());
        assert!(entry.is_compliant().is_ok());
    }

    #[test]
    fn uncountersigned_entry_is_not_compliant() {
        // Without an Organization signature a user entry can never be
        // compliant -- there is no local-only shortcut.
        let wid = UUID::generate();
        let mut domain = Domain::new();
        domain.set("example.com").unwrap();
        let (entry, _, _, _) = new_root(&wid, &domain, Some("alice")).unwrap();
        assert!(entry.is_compliant().is_err());
    }

    #[test]
    fn chain_then_verify_succeeds() {
        let org = org_key();
        let (root_entry, _, crsign) = root(&org);
        let (mut next, keys) = chain(&root_entry, &crsign.private_string().unwrap(), false).unwrap();
        finalize(&mut next, &org, &keys.primary_signing).unwrap();
        assert!(next.is_compliant().is_ok());
        assert!(verify_chain(&next, &root_entry).is_ok());

        // non-optional rotation leaves primary encryption key untouched
        assert_eq!(
            next.get("Public-Encryption-Key"),
            root_entry.get("Public-Encryption-Key")
        );
    }

    #[test]
    fn chain_with_rotation_refreshes_encryption_keys() {
        let org = org_key();
        let (root_entry, _, crsign) = root(&org);
        let (mut next, keys) = chain(&root_entry, &crsign.private_string().unwrap(), true).unwrap();
        finalize(&mut next, &org, &keys.primary_signing).unwrap();
        assert!(keys.primary_encryption.is_some());
        assert_ne!(
            next.get("Public-Encryption-Key"),
            root_entry.get("Public-Encryption-Key")
        );
    }

    #[test]
    fn verify_chain_rejects_wrong_custody_key() {
        let org = org_key();
        let (root_entry, _, _) = root(&org);
        let wrong = SigningPair::generate();
        let (mut next, keys) = chain(&root_entry, &wrong.private_string().unwrap(), false).unwrap();
        finalize(&mut next, &org, &keys.primary_signing).unwrap();
        assert!(verify_chain(&next, &root_entry).is_err());
    }
}

//! # Keycard
//!
//! [`Keycard`] is an ordered, hash-chained sequence of [`Entry`] values of
//! one consistent type.
//!
//! `Keycard::chain` delegates straight to the type-specific `chain()` free
//! functions in [`crate::keycard::org`] / [`crate::keycard::user`]: it
//! produces a `Custody`-signed candidate entry and hands the caller its
//! freshly generated key material, nothing more. Finishing the entry off
//! (hashing it, producing its own role signature) is a deliberately
//! separate step: an organization entry can finalize itself locally with
//! `org::finalize` since no other party is involved, but a user entry's
//! `Organization` signature can only come from the home server's
//! `ADDENTRY` counter-signature
//! ([`crate::protocol::commands::addentry`]) — finalizing eagerly inside
//! `chain()` would be outright wrong for the user case.

use std::fs;
use std::path::Path;

use crate::crypto::CryptoString;
use crate::error::{MensagoError, Result};

use super::entry::{Entry, EntryType};
use super::{org, user};

const BEGIN_MARKER: &str = "----- BEGIN ENTRY -----";
const END_MARKER: &str = "----- END ENTRY -----";

/// The freshly generated key material handed back by [`Keycard::chain`],
/// tagged by which entry type actually produced it.
pub enum ChainedKeys {
    Organization(org::OrgKeys),
    User(user::UserKeys),
}

/// An ordered, hash-chained sequence of same-typed keycard entries.
#[derive(Debug, Clone, Default)]
pub struct Keycard {
    entries: Vec<Entry>,
}

impl Keycard {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Mutable access to the entry list, for callers finishing off the tail
    /// entry after [`Keycard::chain`] (e.g. `org::finalize`, or applying a
    /// server counter-signature).
    pub fn entries_mut(&mut self) -> &mut [Entry] {
        &mut self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn card_type(&self) -> Option<EntryType> {
        self.entries.first().map(|e| e.entry_type())
    }

    /// Appends `entry` to the chain. The first entry sets the card's type;
    /// later entries must match it.
    pub fn append(&mut self, entry: Entry) -> Result<()> {
        if let Some(existing) = self.card_type() {
            if existing != entry.entry_type() {
                return Err(MensagoError::BadParameterValue(
                    "entry type does not match keycard type".into(),
                ));
            }
        }
        self.entries.push(entry);
        Ok(())
    }

    /// Produces and appends the next entry in the chain, signed for
    /// custody with `signing_key` (the tail entry's governing key: its
    /// primary signing key for an organization card, its contact-request
    /// signing key for a user card). This is as far as `chain()` goes; the
    /// returned key material lets the caller finish the entry off
    /// afterward.
    pub fn chain(&mut self, signing_key: &CryptoString, rotate_optional: bool) -> Result<ChainedKeys> {
        let tail = self
            .entries
            .last()
            .ok_or_else(|| MensagoError::ResourceNotFound("keycard has no entries".into()))?;

        let keys = match tail.entry_type() {
            EntryType::Organization => {
                let (next, keys) = org::chain(tail, signing_key, rotate_optional)?;
                self.entries.push(next);
                ChainedKeys::Organization(keys)
            }
            EntryType::User => {
                let (next, keys) = user::chain(tail, signing_key, rotate_optional)?;
                self.entries.push(next);
                ChainedKeys::User(keys)
            }
        };
        Ok(keys)
    }

    /// Verifies every adjacent pair in the chain. A single-entry card is
    /// trivially valid; an empty card is `ResourceNotFound`.
    pub fn verify(&self) -> Result<()> {
        if self.entries.is_empty() {
            return Err(MensagoError::ResourceNotFound("keycard has no entries".into()));
        }
        for pair in self.entries.windows(2) {
            let (previous, entry) = (&pair[0], &pair[1]);
            match entry.entry_type() {
                EntryType::Organization => org::verify_chain(entry, previous)?,
                EntryType::User => user::verify_chain(entry, previous)?,
            }
        }
        Ok(())
    }

    /// Writes every entry framed by `----- BEGIN ENTRY -----` /
    /// `----- END ENTRY -----` markers, CRLF throughout. Fails with
    /// `ResourceExists` unless `clobber` is set.
    pub fn save(&self, path: &Path, clobber: bool) -> Result<()> {
        if path.exists() && !clobber {
            return Err(MensagoError::ResourceExists(path.display().to_string()));
        }

        let mut out = Vec::new();
        for entry in &self.entries {
            out.extend_from_slice(BEGIN_MARKER.as_bytes());
            out.extend_from_slice(b"\r\n");
            out.extend_from_slice(&entry.make_bytestring(-1));
            out.extend_from_slice(END_MARKER.as_bytes());
            out.extend_from_slice(b"\r\n");
        }
        fs::write(path, out)?;
        Ok(())
    }

    /// Reads a keycard file written by [`Keycard::save`]. Every entry in
    /// the file must carry the same `Type`.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let mut card = Keycard::new();
        let mut card_type: Option<EntryType> = None;
        let mut current: Vec<&str> = Vec::new();
        let mut in_entry = false;

        for raw_line in text.lines() {
            let line = raw_line.trim_end_matches('\r');
            if line == BEGIN_MARKER {
                in_entry = true;
                current.clear();
                continue;
            }
            if line == END_MARKER {
                if !in_entry {
                    return Err(MensagoError::BadData("END ENTRY without BEGIN ENTRY".into()));
                }
                in_entry = false;

                let type_line = current
                    .iter()
                    .find(|l| l.starts_with("Type:"))
                    .ok_or_else(|| MensagoError::BadData("entry missing Type field".into()))?;
                let type_value = type_line
                    .strip_prefix("Type:")
                    .expect("prefix just matched");
                let entry_type = match type_value {
                    "Organization" => EntryType::Organization,
                    "User" => EntryType::User,
                    other => {
                        return Err(MensagoError::BadData(format!(
                            "unsupported keycard type: {other}"
                        )))
                    }
                };
                if let Some(existing) = card_type {
                    if existing != entry_type {
                        return Err(MensagoError::BadData(
                            "keycard file mixes entry types".into(),
                        ));
                    }
                } else {
                    card_type = Some(entry_type);
                }

                let mut entry = Entry::new(entry_type);
                let body = current.join("\r\n");
                entry.set_from_bytes(body.as_bytes())?;
                card.entries.push(entry);
                continue;
            }
            if in_entry {
                if !line.contains(':') {
                    return Err(MensagoError::BadData(format!("malformed line: {line}")));
                }
                current.push(line);
            }
        }

        if in_entry {
            return Err(MensagoError::BadData("unterminated entry".into()));
        }

        Ok(card)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{Domain, UUID};
    use crate::crypto::hashing::DEFAULT_ALGORITHM;
    use crate::crypto::keys::SigningPair;
    use tempfile::tempdir;

    fn sample_org_card() -> (Keycard, SigningPair) {
        let (mut root, signing, _) = super::org::new_root(
            "Example, Inc.",
            "c590b44c-798d-4055-8d72-725a7942f3f6/acme.com",
        )
        .unwrap();
        root.generate_hash(DEFAULT_ALGORITHM).unwrap();
        root.sign(&signing.private_string().unwrap(), "Organization")
            .unwrap();

        let mut card = Keycard::new();
        card.append(root).unwrap();
        (card, signing)
    }

    #[test]
    fn single_entry_card_verifies() {
        let (card, _) = sample_org_card();
        assert!(card.verify().is_ok());
    }

    #[test]
    fn chained_card_verifies() {
        let (mut card, signing) = sample_org_card();
        let keys = card.chain(&signing.private_string().unwrap(), false).unwrap();
        assert_eq!(card.entries().len(), 2);
        assert!(matches!(keys, ChainedKeys::Organization(_)));
        // chain() stops at Custody -- the tail isn't hashed/self-signed yet.
        assert!(card.entries()[1].hash().is_empty());
        assert!(card.verify().is_ok());
    }

    #[test]
    fn chain_then_finalize_org_entry_is_compliant() {
        let (mut card, signing) = sample_org_card();
        let keys = card.chain(&signing.private_string().unwrap(), false).unwrap();
        let ChainedKeys::Organization(keys) = keys else {
            panic!("expected organization keys");
        };
        let tail = &mut card.entries_mut()[1];
        org::finalize(tail, &keys.primary_signing).unwrap();
        assert!(tail.is_compliant().is_ok());
        assert!(card.verify().is_ok());
    }

    #[test]
    fn save_then_load_round_trips() {
        let (mut card, signing) = sample_org_card();
        card.chain(&signing.private_string().unwrap(), false).unwrap();

        let dir = tempdir().unwrap();
        let path = dir.path().join("card.keycard");
        card.save(&path, false).unwrap();

        let loaded = Keycard::load(&path).unwrap();
        assert_eq!(loaded.entries().len(), 2);
        assert!(loaded.verify().is_ok());
    }

    #[test]
    fn save_refuses_to_clobber() {
        let (card, _) = sample_org_card();
        let dir = tempdir().unwrap();
        let path = dir.path().join("card.keycard");
        card.save(&path, false).unwrap();
        assert!(matches!(
            card.save(&path, false).unwrap_err(),
            MensagoError::ResourceExists(_)
        ));
        assert!(card.save(&path, true).is_ok());
    }

    #[test]
    fn append_rejects_mismatched_type() {
        let (mut card, _) = sample_org_card();
        let wid = UUID::generate();
        let mut domain = Domain::new();
        domain.set("example.com").unwrap();
        let (user_entry, _, _, _) = super::user::new_root(&wid, &domain, None).unwrap();
        assert!(card.append(user_entry).is_err());
    }
}

//! # Keycard Entry
//!
//! `Entry` is the shared implementation behind both keycard entry types.
//! [`crate::keycard::org`] and [`crate::keycard::user`] supply the
//! type-specific field order, required-field list, and signature schema,
//! and the type-specific `chain`/`verify_chain` logic that needs to know
//! which keys govern custody.
//!
//! ## Byte-exact serialization
//!
//! [`Entry::make_bytestring`] is the single canonical linearization every
//! signing and verification step operates on — CRLF-joined, platform line
//! endings never involved. See [`crate::keycard`] for the construction
//! state machine this supports.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

use crate::address::{Domain, UUID};
use crate::crypto::{hash, keys::verify_detached, CryptoString};
use crate::error::{MensagoError, Result};
use crate::time;

/// Which of the two keycard subject types an entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryType {
    Organization,
    User,
}

impl EntryType {
    pub fn as_str(self) -> &'static str {
        match self {
            EntryType::Organization => "Organization",
            EntryType::User => "User",
        }
    }
}

/// One slot in an entry's signature schema: either a named `ED25519`
/// signature role, or the hash slot (which renders as `Previous-Hash` /
/// `Hash` instead of `<Role>-Signature`).
#[derive(Debug, Clone, Copy)]
pub struct SigSlot {
    pub name: &'static str,
    pub optional: bool,
    pub is_hash: bool,
}

pub const ORG_FIELD_ORDER: &[&str] = &[
    "Index",
    "Name",
    "Contact-Admin",
    "Contact-Abuse",
    "Contact-Support",
    "Language",
    "Primary-Verification-Key",
    "Secondary-Verification-Key",
    "Encryption-Key",
    "Time-To-Live",
    "Expires",
    "Timestamp",
];

pub const ORG_REQUIRED_FIELDS: &[&str] = &[
    "Index",
    "Name",
    "Contact-Admin",
    "Primary-Verification-Key",
    "Encryption-Key",
    "Time-To-Live",
    "Expires",
    "Timestamp",
];

pub const ORG_SIG_SCHEMA: &[SigSlot] = &[
    SigSlot {
        name: "Custody",
        optional: true,
        is_hash: false,
    },
    SigSlot {
        name: "Hash",
        optional: false,
        is_hash: true,
    },
    SigSlot {
        name: "Organization",
        optional: false,
        is_hash: false,
    },
];

pub const USER_FIELD_ORDER: &[&str] = &[
    "Index",
    "Name",
    "Workspace-ID",
    "User-ID",
    "Domain",
    "Contact-Request-Verification-Key",
    "Contact-Request-Encryption-Key",
    "Public-Encryption-Key",
    "Alternate-Encryption-Key",
    "Time-To-Live",
    "Expires",
    "Timestamp",
];

pub const USER_REQUIRED_FIELDS: &[&str] = &[
    "Index",
    "Workspace-ID",
    "Domain",
    "Contact-Request-Verification-Key",
    "Contact-Request-Encryption-Key",
    "Public-Encryption-Key",
    "Time-To-Live",
    "Expires",
    "Timestamp",
];

pub const USER_SIG_SCHEMA: &[SigSlot] = &[
    SigSlot {
        name: "Custody",
        optional: true,
        is_hash: false,
    },
    SigSlot {
        name: "Organization",
        optional: false,
        is_hash: false,
    },
    SigSlot {
        name: "Hash",
        optional: false,
        is_hash: true,
    },
    SigSlot {
        name: "User",
        optional: false,
        is_hash: false,
    },
];

static WADDRESS_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[\da-fA-F]{8}-?[\da-fA-F]{4}-?[\da-fA-F]{4}-?[\da-fA-F]{4}-?[\da-fA-F]{12}/([a-zA-Z0-9]+\.)+[a-zA-Z0-9]+$").unwrap()
});
static WID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[\da-fA-F]{8}-?[\da-fA-F]{4}-?[\da-fA-F]{4}-?[\da-fA-F]{4}-?[\da-fA-F]{12}$")
        .unwrap()
});
static LANGUAGE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z]{2,3}(,[a-zA-Z]{2,3})*$").unwrap());
static USERID_ILLEGAL_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[\\/\s"]"#).unwrap());
static TIMESTAMP_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{8}T\d{6}Z$").unwrap());
static DATE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{8}$").unwrap());

/// A single keycard entry: an ordered map of fields, a signatures map, a
/// previous-hash/hash pair, and the type tag that selects its schema.
#[derive(Debug, Clone)]
pub struct Entry {
    entry_type: EntryType,
    fields: HashMap<String, String>,
    signatures: HashMap<String, String>,
    prev_hash: String,
    hash: String,
}

impl Entry {
    pub(crate) fn new(entry_type: EntryType) -> Self {
        Self {
            entry_type,
            fields: HashMap::new(),
            signatures: HashMap::new(),
            prev_hash: String::new(),
            hash: String::new(),
        }
    }

    pub fn entry_type(&self) -> EntryType {
        self.entry_type
    }

    fn field_order(&self) -> &'static [&'static str] {
        match self.entry_type {
            EntryType::Organization => ORG_FIELD_ORDER,
            EntryType::User => USER_FIELD_ORDER,
        }
    }

    fn required_fields(&self) -> &'static [&'static str] {
        match self.entry_type {
            EntryType::Organization => ORG_REQUIRED_FIELDS,
            EntryType::User => USER_REQUIRED_FIELDS,
        }
    }

    fn signature_schema(&self) -> &'static [SigSlot] {
        match self.entry_type {
            EntryType::Organization => ORG_SIG_SCHEMA,
            EntryType::User => USER_SIG_SCHEMA,
        }
    }

    fn hash_slot_index(&self) -> usize {
        self.signature_schema()
            .iter()
            .position(|s| s.is_hash)
            .expect("every schema declares exactly one hash slot")
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn fields(&self) -> &HashMap<String, String> {
        &self.fields
    }

    pub fn signature(&self, role: &str) -> Option<&str> {
        self.signatures.get(role).map(String::as_str)
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn previous_hash(&self) -> &str {
        &self.prev_hash
    }

    pub fn set_previous_hash(&mut self, prev_hash: &str) {
        self.prev_hash = prev_hash.to_string();
    }

    /// Records a signature value handed over by a counterparty (e.g. the
    /// organization's counter-signature returned during `ADDENTRY`)
    /// without recomputing it locally the way [`Entry::sign`] does.
    pub fn set_signature(&mut self, role: &str, value: &str) {
        self.signatures.insert(role.to_string(), value.to_string());
    }

    /// Records a hash value handed over by a counterparty, bypassing
    /// [`Entry::generate_hash`]'s local computation.
    pub fn set_hash(&mut self, value: &str) {
        self.hash = value.to_string();
    }

    /// Sets a single field. Any edit invalidates every signature and the
    /// hash, returning the entry to its unsigned, unhashed state.
    pub fn set_field(&mut self, name: &str, value: &str) {
        self.fields.insert(name.to_string(), value.to_string());
        self.signatures.clear();
        self.hash.clear();
    }

    /// Sets the `Expires` field `days` after now, defaulting per entry
    /// type (365 for organizations, 90 for users) and capped at 1095.
    pub fn set_expiration(&mut self, days: Option<i64>) {
        let days = days.unwrap_or(match self.entry_type {
            EntryType::Organization => 365,
            EntryType::User => 90,
        });
        let days = days.min(1095);
        self.fields
            .insert("Expires".to_string(), time::expires_after(&chrono::Utc::now(), days));
    }

    /// The CRLF-joined canonical linearization. `level` selects how many
    /// signature-schema slots to include; negative or out-of-range means
    /// all of them.
    pub fn make_bytestring(&self, level: i32) -> Vec<u8> {
        let mut lines: Vec<Vec<u8>> = Vec::new();
        lines.push(format!("Type:{}", self.entry_type.as_str()).into_bytes());

        for field in self.field_order() {
            if let Some(value) = self.fields.get(*field) {
                if !value.is_empty() {
                    lines.push(format!("{field}:{value}").into_bytes());
                }
            }
        }

        let schema = self.signature_schema();
        let level = if level < 0 || level as usize > schema.len() {
            schema.len()
        } else {
            level as usize
        };

        for slot in &schema[..level] {
            if slot.is_hash {
                if !self.prev_hash.is_empty() {
                    lines.push(format!("Previous-Hash:{}", self.prev_hash).into_bytes());
                }
                if !self.hash.is_empty() {
                    lines.push(format!("Hash:{}", self.hash).into_bytes());
                }
            } else if let Some(sig) = self.signatures.get(slot.name) {
                if !sig.is_empty() {
                    lines.push(format!("{}-Signature:{}", slot.name, sig).into_bytes());
                }
            }
        }

        lines.push(Vec::new());
        lines.join(&b"\r\n"[..])
    }

    /// Recomputes the hash over `make_bytestring(hash_slot_index + 1)`
    /// without storing it.
    pub fn get_hash(&self, algo: &str) -> Result<CryptoString> {
        let level = (self.hash_slot_index() + 1) as i32;
        hash(&self.make_bytestring(level), algo)
    }

    /// Computes and stores the hash.
    pub fn generate_hash(&mut self, algo: &str) -> Result<()> {
        self.hash = self.get_hash(algo)?.as_string();
        Ok(())
    }

    /// Recomputes the hash with the algorithm named by the stored hash's
    /// prefix and compares.
    pub fn verify_hash(&self) -> Result<()> {
        let current = CryptoString::parse(&self.hash)
            .map_err(|_| MensagoError::InvalidKeycard(format!("{} is not a valid hash", self.hash)))?;
        let recomputed = self.get_hash(current.prefix())?;
        if recomputed.as_string() != self.hash {
            return Err(MensagoError::HashMismatch(
                "entry hash does not match recomputed value".into(),
            ));
        }
        Ok(())
    }

    /// Signs `role` with `signing_key` (must be `ED25519`). Clears every
    /// signature at or after `role`'s schema position, and clears the hash
    /// if `role` precedes the hash slot.
    pub fn sign(&mut self, signing_key: &CryptoString, role: &str) -> Result<()> {
        if !signing_key.is_valid() {
            return Err(MensagoError::BadParameterValue("signing key".into()));
        }
        if signing_key.prefix() != "ED25519" {
            return Err(MensagoError::UnsupportedEncryptionType(
                signing_key.prefix().to_string(),
            ));
        }

        let schema = self.signature_schema();
        let position = schema
            .iter()
            .position(|s| s.name == role)
            .ok_or_else(|| MensagoError::BadParameterValue(format!("unknown signature role {role}")))?;

        for slot in &schema[position..] {
            if !slot.is_hash {
                self.signatures.insert(slot.name.to_string(), String::new());
            }
        }
        if position < self.hash_slot_index() {
            self.hash.clear();
        }

        let pair = crate::crypto::keys::SigningPair::from_private_string(signing_key)?;
        let data = self.make_bytestring((position + 1) as i32);
        let sig = pair.sign(&data)?;
        self.signatures.insert(role.to_string(), sig.as_string());
        Ok(())
    }

    /// Verifies `role`'s stored signature against `verify_key`.
    pub fn verify_signature(&self, verify_key: &CryptoString, role: &str) -> Result<()> {
        if !verify_key.is_valid() {
            return Err(MensagoError::BadParameterValue("bad verify key".into()));
        }
        if verify_key.prefix() != "ED25519" {
            return Err(MensagoError::UnsupportedEncryptionType(
                verify_key.prefix().to_string(),
            ));
        }

        let schema = self.signature_schema();
        let position = schema
            .iter()
            .position(|s| s.name == role)
            .ok_or_else(|| MensagoError::BadParameterValue("bad signature type".into()))?;

        let sig_str = self
            .signatures
            .get(role)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| MensagoError::SignatureMissing(role.to_string()))?;
        let sig = CryptoString::parse(sig_str)?;

        let data = self.make_bytestring(position as i32);
        verify_detached(verify_key, &data, &sig)
    }

    fn validate_integer(&self, field: &str, min: Option<i64>, max: Option<i64>) -> Result<i64> {
        let raw = self
            .fields
            .get(field)
            .ok_or_else(|| MensagoError::BadParameterValue(format!("field {field} does not exist")))?;
        let value: i64 = raw
            .parse()
            .map_err(|_| MensagoError::BadData("bad field value".into()))?;
        if value < 0 {
            return Err(MensagoError::BadData("bad field value".into()));
        }
        if let Some(min) = min {
            if value < min {
                return Err(MensagoError::BadData(format!("field {field} less than minimum")));
            }
        }
        if let Some(max) = max {
            if value > max {
                return Err(MensagoError::BadData(format!("field {field} greater than maximum")));
            }
        }
        Ok(value)
    }

    /// Checks presence and well-formedness of `Timestamp`/`Expires`, and
    /// that `Expires > Timestamp`.
    pub fn is_timestamp_valid(&self) -> Result<()> {
        let expires = self
            .fields
            .get("Expires")
            .ok_or_else(|| MensagoError::RequiredFieldMissing("Expires".into()))?;
        if !DATE_PATTERN.is_match(expires) || time::parse_date(expires).is_none() {
            return Err(MensagoError::BadData("bad expiration date".into()));
        }

        let timestamp = self
            .fields
            .get("Timestamp")
            .ok_or_else(|| MensagoError::RequiredFieldMissing("Timestamp".into()))?;
        if !TIMESTAMP_PATTERN.is_match(timestamp) || time::parse_timestamp(timestamp).is_none() {
            return Err(MensagoError::BadData("bad timestamp".into()));
        }

        let expire_date = time::parse_date(expires).unwrap();
        let timestamp_time = time::parse_timestamp(timestamp).unwrap();
        if timestamp_time.date_naive() > expire_date {
            return Err(MensagoError::BadData("bad timestamp".into()));
        }
        Ok(())
    }

    fn validate_common_data(&self) -> Result<()> {
        self.validate_integer("Index", Some(1), None)?;

        if let Some(name) = self.fields.get("Name") {
            if name.trim().is_empty() || name.chars().count() >= 64 {
                return Err(MensagoError::BadData("bad name value".into()));
            }
        }

        self.validate_integer("Time-To-Live", Some(1), Some(30))?;
        self.is_timestamp_valid()
    }

    fn validate_org_data(&self) -> Result<()> {
        if self.entry_type != EntryType::Organization {
            return Err(MensagoError::BadData("invalid entry type".into()));
        }
        self.validate_common_data()?;

        let admin = self
            .fields
            .get("Contact-Admin")
            .ok_or_else(|| MensagoError::RequiredFieldMissing("Contact-Admin".into()))?;
        if !WADDRESS_PATTERN.is_match(admin) {
            return Err(MensagoError::BadData("bad admin contact address".into()));
        }

        for keyfield in ["Primary-Verification-Key", "Encryption-Key"] {
            let value = self
                .fields
                .get(keyfield)
                .ok_or_else(|| MensagoError::RequiredFieldMissing(keyfield.to_string()))?;
            if CryptoString::parse(value).is_err() {
                return Err(MensagoError::BadData(format!("bad key field {keyfield}")));
            }
        }

        for contactfield in ["Contact-Support", "Contact-Abuse"] {
            if let Some(value) = self.fields.get(contactfield) {
                if !WADDRESS_PATTERN.is_match(value) {
                    return Err(MensagoError::BadData(format!(
                        "bad contact address {contactfield}"
                    )));
                }
            }
        }

        if let Some(lang) = self.fields.get("Language") {
            if !LANGUAGE_PATTERN.is_match(lang) {
                return Err(MensagoError::BadData("bad language list".into()));
            }
        }

        if let Some(key) = self.fields.get("Secondary-Verification-Key") {
            if CryptoString::parse(key).is_err() {
                return Err(MensagoError::BadData("bad secondary verification key".into()));
            }
        }

        Ok(())
    }

    fn validate_user_data(&self) -> Result<()> {
        if self.entry_type != EntryType::User {
            return Err(MensagoError::BadData("invalid entry type".into()));
        }
        self.validate_common_data()?;

        let wid = self
            .fields
            .get("Workspace-ID")
            .ok_or_else(|| MensagoError::RequiredFieldMissing("Workspace-ID".into()))?;
        if !WID_PATTERN.is_match(wid) {
            return Err(MensagoError::BadData("bad workspace ID".into()));
        }

        let domain = self
            .fields
            .get("Domain")
            .ok_or_else(|| MensagoError::RequiredFieldMissing("Domain".into()))?;
        let mut d = Domain::new();
        if d.set(domain).is_err() || domain.chars().count() >= 64 {
            return Err(MensagoError::BadData("bad domain value".into()));
        }

        for keyfield in [
            "Contact-Request-Verification-Key",
            "Contact-Request-Encryption-Key",
            "Public-Encryption-Key",
        ] {
            let value = self
                .fields
                .get(keyfield)
                .ok_or_else(|| MensagoError::RequiredFieldMissing(keyfield.to_string()))?;
            if CryptoString::parse(value).is_err() {
                return Err(MensagoError::BadData(format!("bad key field {keyfield}")));
            }
        }

        if let Some(uid) = self.fields.get("User-ID") {
            if USERID_ILLEGAL_PATTERN.is_match(uid) || uid.chars().count() >= 64 {
                return Err(MensagoError::BadData("bad user id value".into()));
            }
        }

        if let Some(key) = self.fields.get("Alternate-Encryption-Key") {
            if CryptoString::parse(key).is_err() {
                return Err(MensagoError::BadData("bad alternate encryption key".into()));
            }
        }

        Ok(())
    }

    /// Presence of required fields, whitespace-free, plus the type-specific
    /// field-shape validations.
    pub fn is_data_compliant(&self) -> Result<()> {
        for field in self.required_fields() {
            let value = self
                .fields
                .get(*field)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| MensagoError::RequiredFieldMissing(field.to_string()))?;
            if value.trim() != value.as_str() {
                return Err(MensagoError::BadData(format!(
                    "leading/trailing whitespace in field {field}"
                )));
            }
        }

        match self.entry_type {
            EntryType::Organization => self.validate_org_data(),
            EntryType::User => self.validate_user_data(),
        }
    }

    /// Data compliance plus: every non-optional signature role populated,
    /// and the hash set.
    pub fn is_compliant(&self) -> Result<()> {
        self.is_data_compliant()?;

        for slot in self.signature_schema() {
            if slot.is_hash {
                if self.hash.is_empty() {
                    return Err(MensagoError::SignatureMissing("Hash".into()));
                }
                continue;
            }
            let populated = self
                .signatures
                .get(slot.name)
                .map(|s| !s.is_empty())
                .unwrap_or(false);
            if slot.optional {
                if self.signatures.contains_key(slot.name) && !populated {
                    return Err(MensagoError::SignatureMissing(format!(
                        "{}-Signature",
                        slot.name
                    )));
                }
            } else if !populated {
                return Err(MensagoError::SignatureMissing(format!(
                    "{}-Signature",
                    slot.name
                )));
            }
        }
        Ok(())
    }

    /// Parses the CRLF-joined fields/signatures produced by
    /// [`Entry::make_bytestring`] back into this entry. Rejects any line
    /// not matching `<field>:<value>`.
    pub fn set_from_bytes(&mut self, data: &[u8]) -> Result<()> {
        let text = std::str::from_utf8(data)
            .map_err(|e| MensagoError::ExceptionThrown(e.to_string()))?;
        self.signatures.clear();
        self.hash.clear();

        for line in text.split("\r\n") {
            if line.trim().is_empty() {
                continue;
            }
            let (key, value) = line
                .split_once(':')
                .ok_or_else(|| MensagoError::BadData(line.to_string()))?;

            if key == "Type" {
                if value != self.entry_type.as_str() {
                    return Err(MensagoError::BadData(format!(
                        "can't use {value} data on a {} entry",
                        self.entry_type.as_str()
                    )));
                }
            } else if key == "Previous-Hash" {
                self.prev_hash = value.to_string();
            } else if key == "Hash" {
                self.hash = value.to_string();
            } else if let Some(role) = key.strip_suffix("-Signature") {
                if !["Custody", "User", "Organization"].contains(&role) {
                    return Err(MensagoError::BadData(format!("bad signature line {role}")));
                }
                self.signatures.insert(role.to_string(), value.to_string());
            } else {
                self.fields.insert(key.to_string(), value.to_string());
            }
        }
        Ok(())
    }
}

impl std::fmt::Display for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            String::from_utf8_lossy(&self.make_bytestring(-1))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keycard::org;

    #[test]
    fn make_bytestring_orders_fields_and_skips_empty() {
        let mut entry = Entry::new(EntryType::Organization);
        entry.set_field("Name", "Example, Inc.");
        entry.set_field("Index", "1");
        let bytes = entry.make_bytestring(0);
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("Type:Organization\r\n"));
        assert!(text.contains("Index:1\r\n"));
        assert!(text.contains("Name:Example, Inc.\r\n"));
    }

    #[test]
    fn hash_and_sign_round_trip() {
        let (mut entry, signing, _) = org::new_root(
            "Example, Inc.",
            "c590b44c-798d-4055-8d72-725a7942f3f6/acme.com",
        )
        .unwrap();
        entry.generate_hash("BLAKE2B-256").unwrap();
        entry.sign(&signing.private_string().unwrap(), "Organization").unwrap();
        assert!(entry
            .verify_signature(&signing.public_string().unwrap(), "Organization")
            .is_ok());
        assert!(entry.verify_hash().is_ok());
    }

    #[test]
    fn mutation_invalidates_signature() {
        let (mut entry, signing, _) = org::new_root(
            "Example, Inc.",
            "c590b44c-798d-4055-8d72-725a7942f3f6/acme.com",
        )
        .unwrap();
        entry.generate_hash("BLAKE2B-256").unwrap();
        entry.sign(&signing.private_string().unwrap(), "Organization").unwrap();
        entry.set_field("Language", "en");
        assert!(entry
            .verify_signature(&signing.public_string().unwrap(), "Organization")
            .is_err());
    }
}

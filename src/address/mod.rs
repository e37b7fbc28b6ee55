//! # Addresses
//!
//! `Domain`, `UserID`, `UUID`, `MAddress`, and `WAddress` — the small
//! validated value types that the keycard, envelope, and protocol
//! components all build their typed fields on top of.

use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

use crate::error::{MensagoError, Result};

static DOMAIN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([a-zA-Z0-9-]+\.)+[a-zA-Z0-9-]+$").unwrap());
static ILLEGAL_USERID_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s\\/]").unwrap());

/// A validated Internet domain: one or more dot-separated labels of ASCII
/// letters, digits, and hyphens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Domain {
    value: String,
}

impl Domain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lowercases and trims `text`, then validates it as a domain.
    pub fn set(&mut self, text: &str) -> Result<()> {
        let candidate = text.trim().to_lowercase();
        if !DOMAIN_PATTERN.is_match(&candidate) {
            self.value.clear();
            return Err(MensagoError::BadParameterValue(format!(
                "invalid domain: {text}"
            )));
        }
        self.value = candidate;
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        DOMAIN_PATTERN.is_match(&self.value)
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    pub fn as_string(&self) -> &str {
        &self.value
    }
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// A canonical lowercase, hyphenated UUID (type 4 only is generated, but
/// any well-formed UUID may be assigned).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct UUID {
    value: String,
}

impl UUID {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generates a fresh random (v4) UUID and assigns it.
    pub fn generate() -> Self {
        Self {
            value: Uuid::new_v4().to_string(),
        }
    }

    pub fn set(&mut self, text: &str) -> Result<()> {
        let candidate = text.trim().to_lowercase();
        if Uuid::parse_str(&candidate).is_err() {
            self.value.clear();
            return Err(MensagoError::BadParameterValue(format!(
                "invalid UUID: {text}"
            )));
        }
        self.value = candidate;
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        Uuid::parse_str(&self.value).is_ok()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    pub fn as_string(&self) -> &str {
        &self.value
    }
}

impl std::fmt::Display for UUID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// A Mensago user ID: up to 64 code points, no whitespace, no slash or
/// backslash, case-folded. A value that also parses as a UUID sets
/// [`UserID::is_wid`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct UserID {
    value: String,
    widflag: bool,
}

impl UserID {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, text: &str) -> Result<()> {
        let candidate = text.trim().to_lowercase();
        if candidate.is_empty()
            || ILLEGAL_USERID_PATTERN.is_match(&candidate)
            || candidate.chars().count() > 64
        {
            self.value.clear();
            self.widflag = false;
            return Err(MensagoError::BadParameterValue(format!(
                "invalid user ID: {text}"
            )));
        }
        self.widflag = Uuid::parse_str(&candidate).is_ok();
        self.value = candidate;
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        !self.value.is_empty()
            && !ILLEGAL_USERID_PATTERN.is_match(&self.value)
            && self.value.chars().count() <= 64
    }

    pub fn is_wid(&self) -> bool {
        self.widflag
    }

    /// Returns the user ID reinterpreted as a workspace UUID, if it is one.
    pub fn as_wid(&self) -> Option<UUID> {
        if !self.widflag {
            return None;
        }
        Some(UUID {
            value: self.value.clone(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    pub fn as_string(&self) -> &str {
        &self.value
    }
}

impl std::fmt::Display for UserID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// A full Mensago address, `userid/domain`, where `userid` may be
/// alphabetic or a workspace UUID (`id_type` distinguishes the two: 1 =
/// workspace UUID, 2 = user ID).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct MAddress {
    id: UserID,
    id_type: u8,
    domain: Domain,
}

impl MAddress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, addr: &str) -> Result<()> {
        let parts: Vec<&str> = addr.split('/').collect();
        if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
            return Err(MensagoError::BadParameterValue("bad address given".into()));
        }

        let mut id = UserID::new();
        id.set(parts[0])?;
        let mut domain = Domain::new();
        domain.set(parts[1])?;

        self.id_type = if id.is_wid() { 1 } else { 2 };
        self.id = id;
        self.domain = domain;
        Ok(())
    }

    pub fn set_from_userid(&mut self, uid: UserID, domain: Domain) -> Result<()> {
        if !uid.is_valid() || !domain.is_valid() {
            return Err(MensagoError::BadParameterValue("bad parameter".into()));
        }
        self.id_type = if uid.is_wid() { 1 } else { 2 };
        self.id = uid;
        self.domain = domain;
        Ok(())
    }

    pub fn set_from_wid(&mut self, wid: &UUID, domain: Domain) -> Result<()> {
        if !wid.is_valid() || !domain.is_valid() {
            return Err(MensagoError::BadParameterValue("bad parameter".into()));
        }
        let mut id = UserID::new();
        id.set(wid.as_string())?;
        self.id = id;
        self.domain = domain;
        self.id_type = 1;
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        (self.id_type == 1 || self.id_type == 2) && self.id.is_valid() && self.domain.is_valid()
    }

    pub fn is_empty(&self) -> bool {
        self.id.is_empty() && self.domain.is_empty()
    }

    pub fn as_string(&self) -> String {
        format!("{}/{}", self.id.as_string(), self.domain.as_string())
    }

    pub fn id(&self) -> &UserID {
        &self.id
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }
}

impl std::fmt::Display for MAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_string())
    }
}

impl std::str::FromStr for MAddress {
    type Err = MensagoError;

    fn from_str(s: &str) -> Result<Self> {
        let mut out = MAddress::new();
        out.set(s)?;
        Ok(out)
    }
}

/// A workspace address, `wid/domain`, with the UUID half strictly
/// required — simpler than [`MAddress`], which additionally tracks the
/// `id_type` discriminant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct WAddress {
    id: UUID,
    domain: Domain,
}

impl WAddress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, addr: &str) -> Result<()> {
        let parts: Vec<&str> = addr.split('/').collect();
        if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
            return Err(MensagoError::BadParameterValue("bad address given".into()));
        }

        let mut id = UUID::new();
        id.set(parts[0])?;
        let mut domain = Domain::new();
        domain.set(parts[1])?;

        self.id = id;
        self.domain = domain;
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.id.is_empty() && self.domain.is_empty()
    }

    /// True as long as both halves are non-empty; each half was already
    /// validated when it was set, so this doesn't re-check their shape.
    pub fn is_valid(&self) -> bool {
        !self.id.is_empty() && !self.domain.is_empty()
    }

    pub fn as_string(&self) -> String {
        format!("{}/{}", self.id.as_string(), self.domain.as_string())
    }

    pub fn id(&self) -> &UUID {
        &self.id
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    /// Lossless upgrade to an [`MAddress`] for a value known to be a
    /// workspace address.
    pub fn as_maddress(&self) -> Result<MAddress> {
        let mut out = MAddress::new();
        out.set_from_wid(&self.id, self.domain.clone())?;
        Ok(out)
    }
}

impl std::fmt::Display for WAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_string())
    }
}

impl std::str::FromStr for WAddress {
    type Err = MensagoError;

    fn from_str(s: &str) -> Result<Self> {
        let mut out = WAddress::new();
        out.set(s)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_accepts_valid_and_rejects_invalid() {
        let mut d = Domain::new();
        assert!(d.set("Example.COM").is_ok());
        assert_eq!(d.as_string(), "example.com");
        assert!(d.set("not a domain").is_err());
    }

    #[test]
    fn uuid_generate_is_valid() {
        let id = UUID::generate();
        assert!(id.is_valid());
    }

    #[test]
    fn userid_detects_workspace_id() {
        let mut uid = UserID::new();
        uid.set("4418bf6c-000b-4bb3-8111-316e72030468").unwrap();
        assert!(uid.is_wid());
        assert!(uid.as_wid().is_some());
    }

    #[test]
    fn userid_rejects_illegal_characters() {
        let mut uid = UserID::new();
        assert!(uid.set("has a space").is_err());
        assert!(uid.set("has/slash").is_err());
    }

    #[test]
    fn maddress_round_trips() {
        let mut addr = MAddress::new();
        addr.set("c590b44c-798d-4055-8d72-725a7942f3f6/acme.com").unwrap();
        assert!(addr.is_valid());
        assert_eq!(
            addr.as_string(),
            "c590b44c-798d-4055-8d72-725a7942f3f6/acme.com"
        );
    }

    #[test]
    fn maddress_rejects_missing_half() {
        let mut addr = MAddress::new();
        assert!(addr.set("noslash").is_err());
        assert!(addr.set("/acme.com").is_err());
    }

    #[test]
    fn waddress_as_maddress_upgrades() {
        let mut wa = WAddress::new();
        wa.set("4418bf6c-000b-4bb3-8111-316e72030468/example.com")
            .unwrap();
        let ma = wa.as_maddress().unwrap();
        assert_eq!(ma.as_string(), wa.as_string());
    }
}

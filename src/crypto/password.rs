//! Password hashing and complexity policy.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand_core::OsRng;
use zeroize::Zeroize;

use crate::error::{MensagoError, Result};

/// Qualitative strength label: very weak, weak, medium, strong, very
/// strong. `Error` is the degenerate case — a password exhibiting none of
/// the five character-class features at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strength {
    Error,
    VeryWeak,
    Weak,
    Medium,
    Strong,
    VeryStrong,
}

impl Strength {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strength::Error => "error",
            Strength::VeryWeak => "very weak",
            Strength::Weak => "weak",
            Strength::Medium => "medium",
            Strength::Strong => "strong",
            Strength::VeryStrong => "very strong",
        }
    }
}

/// Counts how many of the five character-class features (uppercase,
/// lowercase, digit, punctuation, non-ASCII) a password exhibits.
fn password_score(text: &str) -> u8 {
    let mut score = 0u8;
    if text.chars().any(|c| c.is_ascii_uppercase()) {
        score += 1;
    }
    if text.chars().any(|c| c.is_ascii_lowercase()) {
        score += 1;
    }
    if text.chars().any(|c| c.is_ascii_digit()) {
        score += 1;
    }
    if text.chars().any(|c| c.is_ascii_punctuation()) {
        score += 1;
    }
    if text.chars().any(|c| !c.is_ascii()) {
        score += 1;
    }
    score
}

fn score_label(score: u8) -> Strength {
    match score {
        0 => Strength::Error,
        1 => Strength::VeryWeak,
        2 => Strength::Weak,
        3 => Strength::Medium,
        4 => Strength::Strong,
        _ => Strength::VeryStrong,
    }
}

/// Scores a candidate password's character-class diversity against the
/// policy: minimum 8 characters; under 12 characters requires at least 3 of
/// the 5 character-class features (uppercase, lowercase, digit, punctuation,
/// non-ASCII). Always returns the score-derived label, even for a password
/// that [`Password::set`] goes on to reject — a caller surfacing the
/// rejection reason wants the real label, not a placeholder.
pub fn check_password_complexity(text: &str) -> Strength {
    if text.chars().count() < 8 {
        return Strength::VeryWeak;
    }
    score_label(password_score(text))
}

/// True when `text` fails the complexity policy above and [`Password::set`]
/// should refuse it.
fn is_too_weak(text: &str) -> bool {
    let count = text.chars().count();
    if count < 8 {
        return true;
    }
    let score = password_score(text);
    (count < 12 && score < 3) || score < 2
}

/// A workspace password: an Argon2id PHC hash string plus a strength label.
///
/// `strength` is populated by [`Password::set`] but left empty by
/// [`Password::assign`], which loads an already-hashed password from
/// storage and has no plaintext left to score; [`Password::is_valid`]
/// tolerates that — it only requires `hashstring` to be present.
#[derive(Debug, Clone, Default)]
pub struct Password {
    hashstring: String,
    strength: Option<Strength>,
}

impl Password {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hashes `text` with Argon2id after enforcing the complexity policy.
    pub fn set(&mut self, text: &str) -> Result<()> {
        let strength = check_password_complexity(text);
        if is_too_weak(text) {
            return Err(MensagoError::BadParameterValue(format!(
                "password too weak: {}",
                strength.as_str()
            )));
        }

        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();
        let hash = argon2
            .hash_password(text.as_bytes(), &salt)
            .map_err(|e| MensagoError::Internal(format!("argon2 hashing failed: {e}")))?;

        self.hashstring = hash.to_string();
        self.strength = Some(strength);
        Ok(())
    }

    /// Assigns an already-computed PHC hash string, e.g. when loading a
    /// workspace record from the profile database. Leaves `strength` unset.
    pub fn assign(&mut self, hashstring: &str) {
        self.hashstring = hashstring.to_string();
        self.strength = None;
    }

    /// Verifies `text` against the stored hash.
    pub fn verify(&self, text: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(&self.hashstring) else {
            return false;
        };
        Argon2::default()
            .verify_password(text.as_bytes(), &parsed)
            .is_ok()
    }

    /// True as long as a hash string is present — `strength` may be absent
    /// (see [`Password::assign`]).
    pub fn is_valid(&self) -> bool {
        !self.hashstring.is_empty()
    }

    pub fn hashstring(&self) -> &str {
        &self.hashstring
    }

    pub fn strength(&self) -> Option<Strength> {
        self.strength
    }
}

impl Drop for Password {
    fn drop(&mut self) {
        self.hashstring.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_password_is_very_weak() {
        assert_eq!(check_password_complexity("abc123"), Strength::VeryWeak);
    }

    #[test]
    fn set_then_verify_round_trips() {
        let mut pw = Password::new();
        pw.set("Tr0ub4dor&3xtra").unwrap();
        assert!(pw.is_valid());
        assert!(pw.verify("Tr0ub4dor&3xtra"));
        assert!(!pw.verify("wrong password"));
    }

    #[test]
    fn assign_leaves_strength_empty_but_valid() {
        let mut pw = Password::new();
        pw.assign("$argon2id$v=19$m=19456,t=2,p=1$c29tZXNhbHQ$aGFzaA");
        assert!(pw.strength().is_none());
        assert!(pw.is_valid());
    }

    #[test]
    fn weak_password_rejected_by_set() {
        let mut pw = Password::new();
        assert!(pw.set("short").is_err());
    }
}

//! # Error Handling
//!
//! This module provides the error taxonomy used across the Mensago client
//! library.
//!
//! ## Error Hierarchy
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           ERROR HIERARCHY                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  MensagoError (top-level)                                              │
//! │  │                                                                      │
//! │  ├── Input Errors                                                      │
//! │  │   ├── BadParameterValue   - a value is malformed                    │
//! │  │   ├── BadData             - a data blob failed validation           │
//! │  │   ├── OutOfRange          - index/size outside allowed bounds       │
//! │  │   └── BadType             - wrong shape (dict/list/string) for field│
//! │  │                                                                      │
//! │  ├── State Errors                                                      │
//! │  │   ├── ResourceExists      - something is already there              │
//! │  │   ├── ResourceNotFound    - something is missing                    │
//! │  │   ├── Busy                - a one-time operation already happened   │
//! │  │   ├── NotCompliant        - a keycard entry fails compliance        │
//! │  │   ├── RequiredFieldMissing                                          │
//! │  │   ├── SignatureMissing                                              │
//! │  │   ├── InvalidKeycard                                                │
//! │  │   └── HashMismatch                                                  │
//! │  │                                                                      │
//! │  ├── Security Errors                                                   │
//! │  │   ├── DecryptionFailure                                             │
//! │  │   ├── VerificationError                                             │
//! │  │   ├── UnsupportedEncryptionType                                     │
//! │  │   └── UnsupportedHashType                                           │
//! │  │                                                                      │
//! │  ├── Transport Errors                                                  │
//! │  │   ├── NetworkError                                                  │
//! │  │   ├── InvalidJson                                                   │
//! │  │   ├── InvalidMessage                                                │
//! │  │   ├── MessageTooLarge                                               │
//! │  │   └── ServerError         - wraps the server's {Code,Status,Info}   │
//! │  │                                                                      │
//! │  ├── Protocol Errors                                                   │
//! │  │   └── Protocol(ProtocolCode) - the full MsgXxx enumeration          │
//! │  │                                                                      │
//! │  └── Internal Errors                                                   │
//! │      ├── Internal                                                      │
//! │      ├── ExceptionThrown                                               │
//! │      ├── Filesystem                                                    │
//! │      └── Unimplemented                                                 │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Unlike an exception-based design, every fallible operation in this crate
//! returns `Result<T, MensagoError>`; there is no ambient exception channel.
//! [`MensagoError::category`] gives coarse-grained dispatch (is this worth
//! retrying, does it need user action) without matching every variant.

use crate::protocol::codes::ProtocolCode;
use thiserror::Error;

/// Result type alias used throughout this crate.
pub type Result<T> = std::result::Result<T, MensagoError>;

/// Coarse error category, grouping the fine-grained [`MensagoError`]
/// variants for callers that want to branch on kind rather than match
/// every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    State,
    Security,
    Transport,
    Protocol,
    Internal,
}

/// The complete error type for the Mensago client library.
#[derive(Error, Debug)]
pub enum MensagoError {
    // ========================================================================
    // Input errors
    // ========================================================================
    /// A parameter value is malformed (bad prefix, bad regex shape, etc).
    #[error("bad parameter value: {0}")]
    BadParameterValue(String),

    /// A data blob (e.g. base85 payload) failed to parse or decode.
    #[error("bad data: {0}")]
    BadData(String),

    /// An index or size fell outside the range a caller is permitted to use —
    /// covers both negative list indices and indices more than one past the
    /// current length.
    #[error("out of range: {0}")]
    OutOfRange(String),

    /// A field held the wrong shape (expected dict/list/string, got other).
    #[error("bad type: {0}")]
    BadType(String),

    // ========================================================================
    // State errors
    // ========================================================================
    /// The target of a create operation already exists.
    #[error("resource exists: {0}")]
    ResourceExists(String),

    /// The target of a lookup does not exist.
    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    /// A one-time operation (e.g. binding a profile's identity) was attempted
    /// a second time.
    #[error("busy: {0}")]
    Busy(String),

    /// A keycard entry fails its compliance check.
    #[error("not compliant: {0}")]
    NotCompliant(String),

    /// A required keycard field is absent.
    #[error("required field missing: {0}")]
    RequiredFieldMissing(String),

    /// A required signature has not been produced yet.
    #[error("signature missing: {0}")]
    SignatureMissing(String),

    /// A keycard or keycard entry is structurally invalid.
    #[error("invalid keycard: {0}")]
    InvalidKeycard(String),

    /// A recomputed hash does not match the stored one.
    #[error("hash mismatch: {0}")]
    HashMismatch(String),

    // ========================================================================
    // Security errors
    // ========================================================================
    /// A decryption operation (sealed-box, secretbox) failed.
    #[error("decryption failure: {0}")]
    DecryptionFailure(String),

    /// A signature failed to verify.
    #[error("verification error: {0}")]
    VerificationError(String),

    /// An operation required a key of one prefix but got another.
    #[error("unsupported encryption type: {0}")]
    UnsupportedEncryptionType(String),

    /// `hash()` was asked for an algorithm this crate doesn't implement.
    #[error("unsupported hash type: {0}")]
    UnsupportedHashType(String),

    // ========================================================================
    // Transport errors
    // ========================================================================
    /// A socket-level failure (connect, read, write, timeout).
    #[error("network error: {0}")]
    NetworkError(String),

    /// A message did not parse as JSON.
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    /// A parsed JSON message did not match the expected command/response shape.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// A minified command message exceeded the 16 KiB limit.
    #[error("message too large: {0} bytes")]
    MessageTooLarge(usize),

    /// The server returned a response the client didn't expect, wrapping its
    /// numeric code, status string, and info string.
    #[error("server error {code} {status}: {info}")]
    ServerError {
        code: u16,
        status: String,
        info: String,
    },

    /// A streaming upload (`UPLOAD`/`SEND`/`REPLACE`) was interrupted after
    /// the server accepted the transfer but before the body finished
    /// sending. Carries exactly what a caller needs to resume — the
    /// server-assigned temporary name and how many bytes already landed —
    /// as named fields a retry can read back directly.
    #[error("upload interrupted after {bytes_sent} bytes (resume as {temp_name})")]
    UploadInterrupted { temp_name: String, bytes_sent: u64 },

    // ========================================================================
    // Protocol errors — the complete MsgXxx enumeration
    // ========================================================================
    /// A server response mapped to one of the named protocol codes.
    #[error("protocol error: {0}")]
    Protocol(ProtocolCode),

    // ========================================================================
    // Internal / infrastructure errors
    // ========================================================================
    /// A condition that should be impossible under correct use of this crate.
    #[error("internal error: {0}")]
    Internal(String),

    /// A third-party call raised something this crate only knows how to wrap.
    #[error("exception thrown: {0}")]
    ExceptionThrown(String),

    /// A filesystem operation (mkdir, open, rename) failed.
    #[error("filesystem error: {0}")]
    Filesystem(String),

    /// A named operation is not implemented.
    #[error("unimplemented: {0}")]
    Unimplemented(String),
}

impl MensagoError {
    /// Coarse category this error belongs to, for dispatch that doesn't want
    /// to match every variant.
    pub fn category(&self) -> ErrorCategory {
        use MensagoError::*;
        match self {
            BadParameterValue(_) | BadData(_) | OutOfRange(_) | BadType(_) => {
                ErrorCategory::Input
            }
            ResourceExists(_)
            | ResourceNotFound(_)
            | Busy(_)
            | NotCompliant(_)
            | RequiredFieldMissing(_)
            | SignatureMissing(_)
            | InvalidKeycard(_)
            | HashMismatch(_) => ErrorCategory::State,
            DecryptionFailure(_)
            | VerificationError(_)
            | UnsupportedEncryptionType(_)
            | UnsupportedHashType(_) => ErrorCategory::Security,
            NetworkError(_)
            | InvalidJson(_)
            | InvalidMessage(_)
            | MessageTooLarge(_)
            | ServerError { .. }
            | UploadInterrupted { .. } => ErrorCategory::Transport,
            Protocol(_) => ErrorCategory::Protocol,
            Internal(_) | ExceptionThrown(_) | Filesystem(_) | Unimplemented(_) => {
                ErrorCategory::Internal
            }
        }
    }

    /// Whether a caller might reasonably retry this operation as-is.
    ///
    /// The protocol engine never retries authentication failures even though
    /// they're transport-shaped; that policy lives in `protocol::connection`,
    /// not here — this is only a hint for generic retry loops.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            MensagoError::NetworkError(_) | MensagoError::ServerError { .. }
        )
    }
}

// ============================================================================
// ERROR CONVERSIONS
// ============================================================================

impl From<rusqlite::Error> for MensagoError {
    fn from(err: rusqlite::Error) -> Self {
        MensagoError::Internal(format!("database error: {err}"))
    }
}

impl From<serde_json::Error> for MensagoError {
    fn from(err: serde_json::Error) -> Self {
        MensagoError::InvalidJson(err.to_string())
    }
}

impl From<std::io::Error> for MensagoError {
    fn from(err: std::io::Error) -> Self {
        MensagoError::Filesystem(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_match_taxonomy() {
        assert_eq!(
            MensagoError::BadData("x".into()).category(),
            ErrorCategory::Input
        );
        assert_eq!(
            MensagoError::Busy("profile".into()).category(),
            ErrorCategory::State
        );
        assert_eq!(
            MensagoError::DecryptionFailure("x".into()).category(),
            ErrorCategory::Security
        );
        assert_eq!(
            MensagoError::MessageTooLarge(20_000).category(),
            ErrorCategory::Transport
        );
        assert_eq!(
            MensagoError::Protocol(ProtocolCode::ResourceExists).category(),
            ErrorCategory::Protocol
        );
        assert_eq!(
            MensagoError::Unimplemented("x".into()).category(),
            ErrorCategory::Internal
        );
    }

    #[test]
    fn network_errors_are_recoverable() {
        assert!(MensagoError::NetworkError("timeout".into()).is_recoverable());
        assert!(!MensagoError::Busy("profile".into()).is_recoverable());
    }
}

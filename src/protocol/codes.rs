//! The server's response code vocabulary.
//!
//! Every server response carries a `Code` (numeric), `Status` (the short
//! name), and an `Info` string. This crate gives each code its own variant
//! so the protocol engine can match on it exhaustively, while still
//! round-tripping to the exact numeric/status pair the server sends.

use std::fmt;

/// One named entry from the server's response code table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolCode {
    // Info codes (1xx)
    Continue,
    Pending,
    Item,
    Update,
    Transfer,

    // Success codes (2xx)
    Ok,
    Registered,
    Unregistered,

    // Server error codes (3xx)
    Internal,
    NotImplemented,
    ServerMaintenance,
    ServerUnavailable,
    RegistrationClosed,
    Interrupted,
    KeyFailure,
    DeliveryFailLimit,
    DeliveryDelay,
    AlgorithmNotSupported,

    // Client error codes (4xx)
    BadRequest,
    Unauthorized,
    AuthFailure,
    Forbidden,
    NotFound,
    Terminated,
    PaymentRequired,
    Unavailable,
    ResourceExists,
    QuotaInsufficient,
    HashMismatch,
    BadKeycard,
    NoncompliantKeycard,
    InvalidSignature,
    LimitReached,
    Expired,
}

impl ProtocolCode {
    /// The numeric code, e.g. `408` for [`ProtocolCode::ResourceExists`].
    pub fn code(self) -> u16 {
        use ProtocolCode::*;
        match self {
            Continue => 100,
            Pending => 101,
            Item => 102,
            Update => 103,
            Transfer => 104,
            Ok => 200,
            Registered => 201,
            Unregistered => 202,
            Internal => 300,
            NotImplemented => 301,
            ServerMaintenance => 302,
            ServerUnavailable => 303,
            RegistrationClosed => 304,
            Interrupted => 305,
            KeyFailure => 306,
            DeliveryFailLimit => 307,
            DeliveryDelay => 308,
            AlgorithmNotSupported => 309,
            BadRequest => 400,
            Unauthorized => 401,
            AuthFailure => 402,
            Forbidden => 403,
            NotFound => 404,
            Terminated => 405,
            PaymentRequired => 406,
            Unavailable => 407,
            ResourceExists => 408,
            QuotaInsufficient => 409,
            HashMismatch => 410,
            BadKeycard => 411,
            NoncompliantKeycard => 412,
            InvalidSignature => 413,
            LimitReached => 414,
            Expired => 415,
        }
    }

    /// The short status name, e.g. `"Resource Exists"`.
    pub fn status(self) -> &'static str {
        use ProtocolCode::*;
        match self {
            Continue => "Continue",
            Pending => "Pending",
            Item => "Item",
            Update => "Update",
            Transfer => "Transfer",
            Ok => "OK",
            Registered => "Registered",
            Unregistered => "Unregistered",
            Internal => "Internal Server Error",
            NotImplemented => "Not Implemented",
            ServerMaintenance => "Server Maintenance",
            ServerUnavailable => "Server Unavailable",
            RegistrationClosed => "Registration Closed",
            Interrupted => "Interrupted",
            KeyFailure => "Key Failure",
            DeliveryFailLimit => "Delivery Failure Limit Exceeded",
            DeliveryDelay => "Delivery Delay Not Reached",
            AlgorithmNotSupported => "Algorithm Not Supported",
            BadRequest => "Bad Request",
            Unauthorized => "Unauthorized",
            AuthFailure => "Authentication Failure",
            Forbidden => "Forbidden",
            NotFound => "Not Found",
            Terminated => "Terminated",
            PaymentRequired => "Payment Required",
            Unavailable => "Unavailable",
            ResourceExists => "Resource Exists",
            QuotaInsufficient => "Quota Insufficient",
            HashMismatch => "Hash Mismatch",
            BadKeycard => "Bad Keycard Data",
            NoncompliantKeycard => "Noncompliant Keycard",
            InvalidSignature => "Invalid Signature",
            LimitReached => "Limit Reached",
            Expired => "Expired",
        }
    }

    /// Maps a numeric code back to its variant, if recognized.
    pub fn from_code(code: u16) -> Option<Self> {
        use ProtocolCode::*;
        Some(match code {
            100 => Continue,
            101 => Pending,
            102 => Item,
            103 => Update,
            104 => Transfer,
            200 => Ok,
            201 => Registered,
            202 => Unregistered,
            300 => Internal,
            301 => NotImplemented,
            302 => ServerMaintenance,
            303 => ServerUnavailable,
            304 => RegistrationClosed,
            305 => Interrupted,
            306 => KeyFailure,
            307 => DeliveryFailLimit,
            308 => DeliveryDelay,
            309 => AlgorithmNotSupported,
            400 => BadRequest,
            401 => Unauthorized,
            402 => AuthFailure,
            403 => Forbidden,
            404 => NotFound,
            405 => Terminated,
            406 => PaymentRequired,
            407 => Unavailable,
            408 => ResourceExists,
            409 => QuotaInsufficient,
            410 => HashMismatch,
            411 => BadKeycard,
            412 => NoncompliantKeycard,
            413 => InvalidSignature,
            414 => LimitReached,
            415 => Expired,
            _ => return None,
        })
    }

    /// True for the 1xx/2xx range — a response that doesn't represent a
    /// failure the caller needs to handle as an error.
    pub fn is_success(self) -> bool {
        self.code() < 300
    }
}

impl fmt::Display for ProtocolCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.code(), self.status())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_round_trips() {
        for code in [
            ProtocolCode::ResourceExists,
            ProtocolCode::HashMismatch,
            ProtocolCode::Ok,
            ProtocolCode::NoncompliantKeycard,
        ] {
            assert_eq!(ProtocolCode::from_code(code.code()), Some(code));
        }
    }

    #[test]
    fn display_matches_source_literal() {
        assert_eq!(ProtocolCode::ResourceExists.to_string(), "408-Resource Exists");
        assert_eq!(ProtocolCode::HashMismatch.to_string(), "410-Hash Mismatch");
    }

    #[test]
    fn success_range_is_below_300() {
        assert!(ProtocolCode::Ok.is_success());
        assert!(ProtocolCode::Registered.is_success());
        assert!(!ProtocolCode::Internal.is_success());
        assert!(!ProtocolCode::BadRequest.is_success());
    }

    #[test]
    fn unknown_code_is_none() {
        assert_eq!(ProtocolCode::from_code(999), None);
    }
}

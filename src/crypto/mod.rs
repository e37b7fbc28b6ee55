//! # Cryptographic Primitives
//!
//! Typed crypto strings, keypairs and secret keys, content hashing,
//! password policy, and the two NaCl-style encryption constructions this
//! crate needs — sealed-box (anonymous) and secretbox (symmetric,
//! nonce-prepended).
//!
//! ```text
//! ┌───────────────┐   ┌──────────────┐   ┌────────────┐
//! │ CryptoString  │◄──│ keys::*Pair  │──►│ sealed.rs  │
//! │ <PREFIX>:data │   │ ::SecretKey  │   │ secretbox  │
//! └───────────────┘   └──────────────┘   └────────────┘
//!         ▲                                     ▲
//!         └──────────────── hashing.rs ─────────┘
//! ```
//!
//! Every key type round-trips through a `CryptoString`; every fingerprint
//! is `hash(raw_bytes, DEFAULT_ALGORITHM)`, never a hash of the encoded
//! text.

pub mod cryptostring;
pub mod hashing;
pub mod keys;
pub mod password;
pub mod sealed;
pub mod secretbox;

pub use cryptostring::CryptoString;
pub use hashing::{hash, hash_default, DEFAULT_ALGORITHM};
pub use keys::{verify_detached, EncryptionPair, SecretKey, SigningPair};
pub use password::{check_password_complexity, Password, Strength};

//! # Keycards
//!
//! Signed, hash-chained identity ledgers. An [`Entry`] holds one
//! generation's fields and signatures; [`Keycard`] strings generations
//! together and verifies the chain.
//!
//! ```text
//! Keycard
//! ┌─────────┐  Previous-Hash  ┌─────────┐  Previous-Hash  ┌─────────┐
//! │ Entry 0 │◄────────────────│ Entry 1 │◄────────────────│ Entry 2 │
//! │ Custody?│                 │ Custody │                 │ Custody │
//! │  Hash   │                 │  Hash   │                 │  Hash   │
//! │ Org/User│                 │ Org/User│                 │ Org/User│
//! └─────────┘                 └─────────┘                 └─────────┘
//! ```
//!
//! `org` and `user` hold the two subject-specific schemas (field order,
//! required fields, signature roles, default values, chain semantics);
//! `entry` holds everything schema-driven; `card` strings entries
//! together and owns the on-disk framing.

pub mod card;
pub mod entry;
pub mod org;
pub mod user;

pub use card::{ChainedKeys, Keycard};
pub use entry::{Entry, EntryType, SigSlot};

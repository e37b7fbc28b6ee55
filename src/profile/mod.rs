//! # Profile Store
//!
//! The on-disk, per-identity directory structure a client keeps locally —
//! device identity, workspace keys and folder mappings, a cached keycard,
//! contacts, and the update-sync log.
//!
//! ```text
//! ~/.config/mensago/<profile-name>/
//!   profile.json     -- name, default flag, device UUID
//!   storage.db       -- workspaces, folders, sessions, keys, keycards,
//!                        messages, contactinfo, updates, ... (see db::schema)
//! ```
//!
//! [`ProfileManager`] owns the set of profiles rooted at one directory;
//! [`Profile`] owns a single profile's database connection and identity
//! binding. [`contact`] and [`path`] are stateless helpers the rest of the
//! module leans on; [`sync`] drives the update-log pull loop over a live
//! [`crate::protocol::ServerConnection`].

pub mod contact;
pub mod db;
pub mod manager;
pub mod path;
pub mod sync;
pub mod workspace;

pub use manager::{Profile, ProfileManager};
pub use workspace::{DeviceSession, FolderMapping, GeneratedKeys, KeyCategory, Workspace, WorkspaceType};

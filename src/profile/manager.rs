//! Profiles and the manager that creates, loads, and switches between them.
//!
//! Each profile is an independent on-disk identity: its own directory, its
//! own `storage.db`, its own device keys. The manager owns the platform
//! profile root and the bookkeeping (which profile is default, which is
//! active) that a single profile can't track about itself.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::address::{MAddress, UUID};
use crate::crypto::password::Password;
use crate::error::{MensagoError, Result};

use super::db;
use super::workspace::{DeviceSession, Workspace};

const RESERVED_NAME: &str = "default";
const CONFIG_FILE: &str = "profile.json";
const DB_FILE: &str = "storage.db";

#[derive(Serialize, Deserialize)]
struct ProfileConfig {
    name: String,
    isdefault: bool,
    deviceid: String,
}

/// One profile: a named directory holding a device identity, an
/// identity/workspace binding, and a `storage.db`.
pub struct Profile {
    name: String,
    path: PathBuf,
    default: bool,
    device_id: UUID,
    conn: Option<Connection>,
}

impl Profile {
    /// Creates a fresh profile directory at `path` under `name`.
    fn create(path: PathBuf, name: &str) -> Result<Self> {
        std::fs::create_dir_all(&path)?;
        let profile = Self {
            name: name.to_string(),
            path,
            default: false,
            device_id: UUID::generate(),
            conn: None,
        };
        profile.save_config()?;
        Ok(profile)
    }

    /// Loads an existing profile directory.
    fn load(path: PathBuf) -> Result<Self> {
        let text = std::fs::read_to_string(path.join(CONFIG_FILE))?;
        let config: ProfileConfig = serde_json::from_str(&text)?;
        let mut device_id = UUID::new();
        device_id.set(&config.deviceid)?;
        Ok(Self {
            name: config.name,
            path,
            default: config.isdefault,
            device_id,
            conn: None,
        })
    }

    fn save_config(&self) -> Result<()> {
        let config = ProfileConfig {
            name: self.name.clone(),
            isdefault: self.default,
            deviceid: self.device_id.as_string().to_string(),
        };
        std::fs::write(self.path.join(CONFIG_FILE), serde_json::to_string_pretty(&config)?)?;
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn device_id(&self) -> &UUID {
        &self.device_id
    }

    pub fn is_default(&self) -> bool {
        self.default
    }

    pub fn set_default(&mut self, flag: bool) -> Result<()> {
        self.default = flag;
        self.save_config()
    }

    /// Opens (creating if necessary) this profile's `storage.db`.
    pub fn activate(&mut self) -> Result<()> {
        if self.conn.is_some() {
            return Ok(());
        }
        self.conn = Some(db::open(&self.path.join(DB_FILE))?);
        Ok(())
    }

    pub fn deactivate(&mut self) {
        self.conn = None;
    }

    pub fn is_active(&self) -> bool {
        self.conn.is_some()
    }

    pub fn connection(&self) -> Result<&Connection> {
        self.conn
            .as_ref()
            .ok_or_else(|| MensagoError::Internal("profile is not active".into()))
    }

    /// Wipes and recreates `storage.db` with an empty schema.
    pub fn reset_db(&mut self) -> Result<()> {
        self.conn = Some(db::reset(&self.path.join(DB_FILE))?);
        Ok(())
    }

    /// Returns the identity workspace bound to this profile, if
    /// [`Profile::set_identity`] has been called.
    pub fn get_identity(&self) -> Result<Option<MAddress>> {
        let Some(ws) = Workspace::load_identity(self.connection()?)? else {
            return Ok(None);
        };
        let mut addr = MAddress::new();
        if let Some(uid) = ws.uid.as_deref() {
            let mut userid = crate::address::UserID::new();
            userid.set(uid)?;
            addr.set_from_userid(userid, ws.domain.clone())?;
        } else {
            addr.set_from_wid(&ws.wid, ws.domain.clone())?;
        }
        Ok(Some(addr))
    }

    /// Binds `workspace` as this profile's identity. One-time: fails with
    /// `Busy` if an identity workspace is already registered — a profile
    /// never silently rebinds to a different account.
    pub fn set_identity(&mut self, workspace: &Workspace, password: &Password) -> Result<()> {
        let conn = self.connection()?;
        if Workspace::load_identity(conn)?.is_some() {
            return Err(MensagoError::Busy(
                "profile already has an identity workspace".into(),
            ));
        }
        workspace.add_to_db(conn, password)?;
        Ok(())
    }

    /// Registers this profile's device as a session under `address`.
    pub fn add_device_session(&self, address: &str, device_pair: crate::crypto::keys::EncryptionPair, os: &str) -> Result<()> {
        super::workspace::add_device_session(
            self.connection()?,
            &DeviceSession {
                address: address.to_string(),
                device_id: self.device_id.clone(),
                device_name: self.name.clone(),
                device_pair,
                os: os.to_string(),
            },
        )
    }

    /// Resolves a user-facing [`MAddress`] to the workspace UUID the
    /// server actually keys everything on, by consulting the cached
    /// `workspaces` table. Returns `ResourceNotFound` for an address this
    /// profile has no local record of.
    pub fn resolve_address(&self, address: &MAddress) -> Result<UUID> {
        if let Some(wid) = address.id().as_wid() {
            return Ok(wid);
        }
        let conn = self.connection()?;
        let wid_str: String = conn
            .query_row(
                "SELECT wid FROM workspaces WHERE userid = ?1 AND domain = ?2",
                params![address.id().as_string(), address.domain().as_string()],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| MensagoError::ResourceNotFound(address.as_string()))?;
        let mut wid = UUID::new();
        wid.set(&wid_str)?;
        Ok(wid)
    }
}

/// Loads, creates, and switches between the set of profiles rooted at a
/// single directory.
pub struct ProfileManager {
    root: PathBuf,
    profiles: Vec<Profile>,
    active: Option<usize>,
}

impl ProfileManager {
    /// Loads every profile subdirectory under `root` (the platform default
    /// from [`crate::config::default_profile_root`] if `None`), creating a
    /// `primary` profile if the root is empty.
    pub fn load_profiles(root: Option<PathBuf>) -> Result<Self> {
        let root = root.unwrap_or_else(crate::config::default_profile_root);
        std::fs::create_dir_all(&root)?;

        let mut profiles = Vec::new();
        for entry in std::fs::read_dir(&root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let config_path = entry.path().join(CONFIG_FILE);
            if !config_path.exists() {
                continue;
            }
            profiles.push(Profile::load(entry.path())?);
        }

        let mut manager = Self {
            root,
            profiles,
            active: None,
        };

        if manager.profiles.is_empty() {
            manager.create_profile("primary")?;
            manager.set_default_profile("primary")?;
        } else {
            manager.resolve_default_conflicts()?;
        }

        Ok(manager)
    }

    /// If more than one profile claims to be default (e.g. from manual
    /// directory manipulation), the first one discovered wins and the rest
    /// are demoted.
    fn resolve_default_conflicts(&mut self) -> Result<()> {
        let mut seen_default = false;
        for profile in &mut self.profiles {
            if profile.is_default() {
                if seen_default {
                    profile.set_default(false)?;
                } else {
                    seen_default = true;
                }
            }
        }
        if !seen_default {
            if let Some(first) = self.profiles.first_mut() {
                first.set_default(true)?;
            }
        }
        Ok(())
    }

    fn index_for(&self, name: &str) -> Option<usize> {
        let name = name.to_lowercase();
        self.profiles.iter().position(|p| p.name() == name)
    }

    pub fn profiles(&self) -> &[Profile] {
        &self.profiles
    }

    pub fn create_profile(&mut self, name: &str) -> Result<&Profile> {
        let name = name.to_lowercase();
        if name == RESERVED_NAME {
            return Err(MensagoError::BadParameterValue(
                "'default' is a reserved profile name".into(),
            ));
        }
        if self.index_for(&name).is_some() {
            return Err(MensagoError::ResourceExists(name));
        }

        let path = self.root.join(&name);
        let profile = Profile::create(path, &name)?;
        self.profiles.push(profile);
        Ok(self.profiles.last().unwrap())
    }

    pub fn delete_profile(&mut self, name: &str) -> Result<()> {
        let idx = self
            .index_for(name)
            .ok_or_else(|| MensagoError::ResourceNotFound(name.to_string()))?;
        let was_default = self.profiles[idx].is_default();
        let path = self.profiles[idx].path().to_path_buf();

        self.profiles.remove(idx);
        if self.active == Some(idx) {
            self.active = None;
        } else if let Some(active) = self.active {
            if active > idx {
                self.active = Some(active - 1);
            }
        }

        std::fs::remove_dir_all(&path)?;

        if was_default {
            if let Some(first) = self.profiles.first_mut() {
                first.set_default(true)?;
            }
        }
        Ok(())
    }

    pub fn rename_profile(&mut self, old: &str, new: &str) -> Result<()> {
        let new_lower = new.to_lowercase();
        if new_lower == RESERVED_NAME {
            return Err(MensagoError::BadParameterValue(
                "'default' is a reserved profile name".into(),
            ));
        }
        let idx = self
            .index_for(old)
            .ok_or_else(|| MensagoError::ResourceNotFound(old.to_string()))?;
        if self.index_for(&new_lower).is_some() {
            return Err(MensagoError::ResourceExists(new_lower));
        }

        let old_path = self.profiles[idx].path().to_path_buf();
        let new_path = self.root.join(&new_lower);
        std::fs::rename(&old_path, &new_path)?;

        self.profiles[idx].path = new_path;
        self.profiles[idx].name = new_lower;
        self.profiles[idx].save_config()?;
        Ok(())
    }

    pub fn default_profile_name(&self) -> Option<&str> {
        self.profiles.iter().find(|p| p.is_default()).map(Profile::name)
    }

    pub fn set_default_profile(&mut self, name: &str) -> Result<()> {
        let idx = self
            .index_for(name)
            .ok_or_else(|| MensagoError::ResourceNotFound(name.to_string()))?;
        for (i, profile) in self.profiles.iter_mut().enumerate() {
            profile.set_default(i == idx)?;
        }
        Ok(())
    }

    pub fn activate_profile(&mut self, name: &str) -> Result<()> {
        let idx = self
            .index_for(name)
            .ok_or_else(|| MensagoError::ResourceNotFound(name.to_string()))?;
        if let Some(prev) = self.active {
            if prev != idx {
                self.profiles[prev].deactivate();
            }
        }
        self.profiles[idx].activate()?;
        self.active = Some(idx);
        Ok(())
    }

    pub fn get_active_profile(&self) -> Result<&Profile> {
        let idx = self
            .active
            .ok_or_else(|| MensagoError::Internal("no profile is active".into()))?;
        Ok(&self.profiles[idx])
    }

    pub fn get_active_profile_mut(&mut self) -> Result<&mut Profile> {
        let idx = self
            .active
            .ok_or_else(|| MensagoError::Internal("no profile is active".into()))?;
        Ok(&mut self.profiles[idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn load_profiles_creates_primary_when_empty() {
        let dir = tempdir().unwrap();
        let manager = ProfileManager::load_profiles(Some(dir.path().to_path_buf())).unwrap();
        assert_eq!(manager.profiles().len(), 1);
        assert_eq!(manager.default_profile_name(), Some("primary"));
    }

    #[test]
    fn create_profile_rejects_reserved_name() {
        let dir = tempdir().unwrap();
        let mut manager = ProfileManager::load_profiles(Some(dir.path().to_path_buf())).unwrap();
        assert!(manager.create_profile("default").is_err());
    }

    #[test]
    fn create_profile_rejects_duplicate() {
        let dir = tempdir().unwrap();
        let mut manager = ProfileManager::load_profiles(Some(dir.path().to_path_buf())).unwrap();
        manager.create_profile("alice").unwrap();
        assert!(matches!(
            manager.create_profile("alice").unwrap_err(),
            MensagoError::ResourceExists(_)
        ));
    }

    #[test]
    fn activate_and_reload_round_trips_device_id() {
        let dir = tempdir().unwrap();
        let mut manager = ProfileManager::load_profiles(Some(dir.path().to_path_buf())).unwrap();
        manager.activate_profile("primary").unwrap();
        let device_id = manager.get_active_profile().unwrap().device_id().clone();

        let reloaded = ProfileManager::load_profiles(Some(dir.path().to_path_buf())).unwrap();
        assert_eq!(reloaded.profiles()[0].device_id(), &device_id);
    }

    #[test]
    fn set_default_profile_demotes_previous_default() {
        let dir = tempdir().unwrap();
        let mut manager = ProfileManager::load_profiles(Some(dir.path().to_path_buf())).unwrap();
        manager.create_profile("alice").unwrap();
        manager.set_default_profile("alice").unwrap();
        assert_eq!(manager.default_profile_name(), Some("alice"));
        assert!(!manager.profiles()[0].is_default());
    }

    #[test]
    fn delete_profile_removes_directory() {
        let dir = tempdir().unwrap();
        let mut manager = ProfileManager::load_profiles(Some(dir.path().to_path_buf())).unwrap();
        manager.create_profile("alice").unwrap();
        let path = manager.profiles()[1].path().to_path_buf();
        manager.delete_profile("alice").unwrap();
        assert!(!path.exists());
        assert_eq!(manager.profiles().len(), 1);
    }

    #[test]
    fn set_identity_is_one_time() {
        let dir = tempdir().unwrap();
        let mut manager = ProfileManager::load_profiles(Some(dir.path().to_path_buf())).unwrap();
        manager.activate_profile("primary").unwrap();

        let mut domain = crate::address::Domain::new();
        domain.set("example.com").unwrap();
        let ws = Workspace::new(UUID::generate(), domain, super::super::workspace::WorkspaceType::Identity);
        let mut pw = Password::new();
        pw.set("Tr0ub4dor&3xtra").unwrap();

        let profile = manager.get_active_profile_mut().unwrap();
        profile.set_identity(&ws, &pw).unwrap();
        assert!(matches!(
            profile.set_identity(&ws, &pw).unwrap_err(),
            MensagoError::Busy(_)
        ));
    }
}

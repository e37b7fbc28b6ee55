//! Workspace accounts: keys, folder mappings, and device sessions held in a
//! profile's `storage.db`.

use rusqlite::{params, Connection, OptionalExtension};

use crate::address::{Domain, UUID};
use crate::crypto::keys::{EncryptionPair, SecretKey, SigningPair};
use crate::crypto::password::Password;
use crate::crypto::CryptoString;
use crate::error::{MensagoError, Result};

/// Kind of workspace membership a profile can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkspaceType {
    Identity,
    Single,
    Alias,
}

impl WorkspaceType {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkspaceType::Identity => "identity",
            WorkspaceType::Single => "single",
            WorkspaceType::Alias => "alias",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "identity" => Ok(WorkspaceType::Identity),
            "single" => Ok(WorkspaceType::Single),
            "alias" => Ok(WorkspaceType::Alias),
            other => Err(MensagoError::BadParameterValue(format!(
                "unknown workspace type: {other}"
            ))),
        }
    }
}

/// The standard folder set every new workspace is seeded with.
pub const STANDARD_FOLDERS: &[&str] = &[
    "messages",
    "contacts",
    "events",
    "tasks",
    "notes",
    "files",
    "files/attachments",
];

/// The six key categories generated for a new identity workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCategory {
    ConnReqEncryption,
    ConnReqSigning,
    Encryption,
    Signing,
    Storage,
    Folder,
}

impl KeyCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            KeyCategory::ConnReqEncryption => "crencryption",
            KeyCategory::ConnReqSigning => "crsigning",
            KeyCategory::Encryption => "encryption",
            KeyCategory::Signing => "signing",
            KeyCategory::Storage => "storage",
            KeyCategory::Folder => "folder",
        }
    }
}

/// A single folder's server-path ↔ local-role mapping.
#[derive(Debug, Clone)]
pub struct FolderMapping {
    pub fid: UUID,
    pub address: String,
    pub keyid: String,
    pub path: String,
    pub permissions: String,
}

impl FolderMapping {
    pub fn generate(address: &str, keyid: &str, path: &str) -> Self {
        Self {
            fid: UUID::generate(),
            address: address.to_string(),
            keyid: keyid.to_string(),
            path: path.to_string(),
            permissions: "admin".to_string(),
        }
    }
}

/// A device session bound to a workspace: the device's own keypair and a
/// human-readable name.
pub struct DeviceSession {
    pub address: String,
    pub device_id: UUID,
    pub device_name: String,
    pub device_pair: EncryptionPair,
    pub os: String,
}

/// The six keys [`Workspace::generate`] creates for a new identity
/// workspace, handed back so the caller can do whatever first-run setup
/// (e.g. uploading the public halves in a keycard) needs them before they
/// go out of scope.
pub struct GeneratedKeys {
    pub crencryption: EncryptionPair,
    pub crsigning: SigningPair,
    pub encryption: EncryptionPair,
    pub signing: SigningPair,
    pub storage: SecretKey,
    pub folder: SecretKey,
}

/// An identity or shared workspace bound to a profile.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub uid: Option<String>,
    pub wid: UUID,
    pub domain: Domain,
    pub workspace_type: WorkspaceType,
}

impl Workspace {
    pub fn new(wid: UUID, domain: Domain, workspace_type: WorkspaceType) -> Self {
        Self {
            uid: None,
            wid,
            domain,
            workspace_type,
        }
    }

    pub fn address(&self) -> String {
        format!("{}/{}", self.wid.as_string(), self.domain.as_string())
    }

    /// Registers this workspace in `workspaces`. Fails with
    /// `ResourceExists` if its `wid` is already on file.
    pub fn add_to_db(&self, conn: &Connection, password: &Password) -> Result<()> {
        let exists: Option<String> = conn
            .query_row(
                "SELECT wid FROM workspaces WHERE wid = ?1",
                params![self.wid.as_string()],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_some() {
            return Err(MensagoError::ResourceExists(self.wid.as_string().into()));
        }

        conn.execute(
            "INSERT INTO workspaces (wid, userid, domain, password, pwhashtype, type)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                self.wid.as_string(),
                self.uid,
                self.domain.as_string(),
                password.hashstring(),
                "argon2id",
                self.workspace_type.as_str(),
            ],
        )?;
        Ok(())
    }

    pub fn remove_from_db(&self, conn: &Connection) -> Result<()> {
        conn.execute(
            "DELETE FROM workspaces WHERE wid = ?1",
            params![self.wid.as_string()],
        )?;
        Ok(())
    }

    /// Creates a brand-new identity workspace end to end: registers the
    /// `workspaces` row, generates the six account keys, and seeds the
    /// seven standard folders. Uses manual rollback rather than a database
    /// transaction — any failure after the `workspaces` row lands triggers
    /// an explicit [`Workspace::remove_from_db`], since the folder
    /// filesystem directories this also creates can't be rolled back by
    /// SQLite alone.
    pub fn generate(conn: &Connection, domain: Domain, password: &Password, root: &std::path::Path) -> Result<(Workspace, GeneratedKeys)> {
        let ws = Workspace::new(UUID::generate(), domain, WorkspaceType::Identity);
        ws.add_to_db(conn, password)?;

        match Self::generate_keys_and_folders(conn, &ws, root) {
            Ok(keys) => Ok((ws, keys)),
            Err(e) => {
                let _ = ws.remove_from_db(conn);
                Err(e)
            }
        }
    }

    fn generate_keys_and_folders(conn: &Connection, ws: &Workspace, root: &std::path::Path) -> Result<GeneratedKeys> {
        let address = ws.address();

        let crencryption = EncryptionPair::generate();
        let crsigning = SigningPair::generate();
        let encryption = EncryptionPair::generate();
        let signing = SigningPair::generate();
        let storage = SecretKey::generate();
        let folder = SecretKey::generate();

        store_encryption_pair(conn, &address, KeyCategory::ConnReqEncryption, &crencryption)?;
        store_signing_pair(conn, &address, KeyCategory::ConnReqSigning, &crsigning)?;
        store_encryption_pair(conn, &address, KeyCategory::Encryption, &encryption)?;
        store_signing_pair(conn, &address, KeyCategory::Signing, &signing)?;
        let storage_keyid = store_secret_key(conn, &address, KeyCategory::Storage, &storage)?;
        store_secret_key(conn, &address, KeyCategory::Folder, &folder)?;

        for name in STANDARD_FOLDERS {
            std::fs::create_dir_all(root.join(name))?;
            let mapping = FolderMapping::generate(&address, &storage_keyid, name);
            add_folder(conn, &mapping)?;
        }

        Ok(GeneratedKeys {
            crencryption,
            crsigning,
            encryption,
            signing,
            storage,
            folder,
        })
    }

    pub fn set_userid(&mut self, conn: &Connection, uid: &str) -> Result<()> {
        conn.execute(
            "UPDATE workspaces SET userid = ?1 WHERE wid = ?2",
            params![uid, self.wid.as_string()],
        )?;
        self.uid = Some(uid.to_string());
        Ok(())
    }

    /// Loads the single identity-type workspace registered for this
    /// profile, if any.
    pub fn load_identity(conn: &Connection) -> Result<Option<Workspace>> {
        let row: Option<(String, Option<String>, String, String)> = conn
            .query_row(
                "SELECT wid, userid, domain, type FROM workspaces WHERE type = 'identity'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;

        let Some((wid_str, uid, domain_str, type_str)) = row else {
            return Ok(None);
        };
        let mut wid = UUID::new();
        wid.set(&wid_str)?;
        let mut domain = Domain::new();
        domain.set(&domain_str)?;
        Ok(Some(Workspace {
            uid,
            wid,
            domain,
            workspace_type: WorkspaceType::parse(&type_str)?,
        }))
    }
}

/// Persists a key pair/secret under `keyid`, storing its `CryptoString`
/// forms directly (private always present; public only for asymmetric
/// keys).
pub fn store_key(
    conn: &Connection,
    address: &str,
    category: KeyCategory,
    algorithm: &str,
    private: &CryptoString,
    public: Option<&CryptoString>,
) -> Result<String> {
    let keyid = UUID::generate().as_string().to_string();
    conn.execute(
        "INSERT INTO keys (keyid, address, type, category, private, public, algorithm, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            keyid,
            address,
            if public.is_some() { "asymmetric" } else { "symmetric" },
            category.as_str(),
            private.as_string(),
            public.map(CryptoString::as_string),
            algorithm,
            crate::time::now_timestamp(),
        ],
    )?;
    Ok(keyid)
}

pub fn store_encryption_pair(
    conn: &Connection,
    address: &str,
    category: KeyCategory,
    pair: &EncryptionPair,
) -> Result<String> {
    store_key(
        conn,
        address,
        category,
        "CURVE25519",
        &pair.private_string()?,
        Some(&pair.public_string()?),
    )
}

pub fn store_signing_pair(
    conn: &Connection,
    address: &str,
    category: KeyCategory,
    pair: &SigningPair,
) -> Result<String> {
    store_key(
        conn,
        address,
        category,
        "ED25519",
        &pair.private_string()?,
        Some(&pair.public_string()?),
    )
}

pub fn store_secret_key(
    conn: &Connection,
    address: &str,
    category: KeyCategory,
    key: &SecretKey,
) -> Result<String> {
    store_key(conn, address, category, "XSALSA20", &key.key_string()?, None)
}

pub fn get_key_private(conn: &Connection, keyid: &str) -> Result<CryptoString> {
    let text: String = conn.query_row(
        "SELECT private FROM keys WHERE keyid = ?1",
        params![keyid],
        |row| row.get(0),
    )?;
    CryptoString::parse(&text)
}

/// Finds the most recently stored key of `category` for `address`.
pub fn find_key_by_category(
    conn: &Connection,
    address: &str,
    category: KeyCategory,
) -> Result<Option<String>> {
    Ok(conn
        .query_row(
            "SELECT keyid FROM keys WHERE address = ?1 AND category = ?2
             ORDER BY timestamp DESC LIMIT 1",
            params![address, category.as_str()],
            |row| row.get(0),
        )
        .optional()?)
}

pub fn add_folder(conn: &Connection, folder: &FolderMapping) -> Result<()> {
    conn.execute(
        "INSERT INTO folders (fid, address, keyid, path, permissions)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            folder.fid.as_string(),
            folder.address,
            folder.keyid,
            folder.path,
            folder.permissions,
        ],
    )?;
    Ok(())
}

pub fn get_folder(conn: &Connection, fid: &UUID) -> Result<FolderMapping> {
    conn.query_row(
        "SELECT fid, address, keyid, path, permissions FROM folders WHERE fid = ?1",
        params![fid.as_string()],
        |row| {
            let fid_str: String = row.get(0)?;
            Ok(FolderMapping {
                fid: {
                    let mut u = UUID::new();
                    let _ = u.set(&fid_str);
                    u
                },
                address: row.get(1)?,
                keyid: row.get(2)?,
                path: row.get(3)?,
                permissions: row.get(4)?,
            })
        },
    )
    .map_err(|_| MensagoError::ResourceNotFound(fid.as_string().into()))
}

/// Loads every folder mapping as `fid -> semantic path`, the form the path
/// translator in [`super::path`] needs.
pub fn load_folder_maps(conn: &Connection) -> Result<std::collections::HashMap<String, String>> {
    let mut stmt = conn.prepare("SELECT fid, path FROM folders")?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;
    let mut out = std::collections::HashMap::new();
    for row in rows {
        let (fid, path) = row?;
        out.insert(fid, path);
    }
    Ok(out)
}

pub fn add_device_session(conn: &Connection, session: &DeviceSession) -> Result<()> {
    conn.execute(
        "INSERT INTO sessions (address, devid, devname, public_key, private_key, os)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            session.address,
            session.device_id.as_string(),
            session.device_name,
            session.device_pair.public_string()?.as_string(),
            session.device_pair.private_string()?.as_string(),
            session.os,
        ],
    )?;
    Ok(())
}

pub fn remove_device_session(conn: &Connection, address: &str, device_id: &UUID) -> Result<()> {
    conn.execute(
        "DELETE FROM sessions WHERE address = ?1 AND devid = ?2",
        params![address, device_id.as_string()],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::db;
    use tempfile::tempdir;

    fn fresh_conn() -> Connection {
        let dir = tempdir().unwrap();
        let conn = db::open(&dir.path().join("storage.db")).unwrap();
        std::mem::forget(dir);
        conn
    }

    fn sample_workspace() -> Workspace {
        let mut domain = Domain::new();
        domain.set("example.com").unwrap();
        Workspace::new(UUID::generate(), domain, WorkspaceType::Identity)
    }

    #[test]
    fn generate_creates_keys_and_folders() {
        let conn = fresh_conn();
        let dir = tempdir().unwrap();
        let mut domain = Domain::new();
        domain.set("example.com").unwrap();
        let mut pw = Password::new();
        pw.set("Tr0ub4dor&3xtra").unwrap();

        let (ws, keys) = Workspace::generate(&conn, domain, &pw, dir.path()).unwrap();
        assert!(Workspace::load_identity(&conn).unwrap().is_some());
        assert_eq!(keys.encryption.public_bytes().len(), 32);
        for name in STANDARD_FOLDERS {
            assert!(dir.path().join(name).is_dir());
        }
        assert_eq!(
            find_key_by_category(&conn, &ws.address(), KeyCategory::Storage)
                .unwrap()
                .is_some(),
            true
        );
    }

    #[test]
    fn generate_rolls_back_workspace_row_on_folder_failure() {
        let conn = fresh_conn();
        let mut domain = Domain::new();
        domain.set("example.com").unwrap();
        let mut pw = Password::new();
        pw.set("Tr0ub4dor&3xtra").unwrap();

        // A file in place of a directory makes `create_dir_all` fail for
        // the first standard folder, exercising the rollback path.
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(STANDARD_FOLDERS[0]), b"not a directory").unwrap();

        assert!(Workspace::generate(&conn, domain, &pw, dir.path()).is_err());
        assert!(Workspace::load_identity(&conn).unwrap().is_none());
    }

    #[test]
    fn add_to_db_then_load_identity_round_trips() {
        let conn = fresh_conn();
        let ws = sample_workspace();
        let mut pw = Password::new();
        pw.set("Tr0ub4dor&3xtra").unwrap();
        ws.add_to_db(&conn, &pw).unwrap();

        let loaded = Workspace::load_identity(&conn).unwrap().unwrap();
        assert_eq!(loaded.wid, ws.wid);
    }

    #[test]
    fn add_to_db_rejects_duplicate_wid() {
        let conn = fresh_conn();
        let ws = sample_workspace();
        let mut pw = Password::new();
        pw.set("Tr0ub4dor&3xtra").unwrap();
        ws.add_to_db(&conn, &pw).unwrap();
        assert!(matches!(
            ws.add_to_db(&conn, &pw).unwrap_err(),
            MensagoError::ResourceExists(_)
        ));
    }

    #[test]
    fn store_and_fetch_encryption_key_round_trips() {
        let conn = fresh_conn();
        let pair = EncryptionPair::generate();
        let keyid = store_encryption_pair(&conn, "wid/example.com", KeyCategory::Encryption, &pair).unwrap();
        let fetched = get_key_private(&conn, &keyid).unwrap();
        assert_eq!(fetched, pair.private_string().unwrap());
    }

    #[test]
    fn folder_mappings_round_trip() {
        let conn = fresh_conn();
        let folder = FolderMapping::generate("wid/example.com", "keyid-1", "messages");
        add_folder(&conn, &folder).unwrap();
        let fetched = get_folder(&conn, &folder.fid).unwrap();
        assert_eq!(fetched.path, "messages");

        let maps = load_folder_maps(&conn).unwrap();
        assert_eq!(maps.get(folder.fid.as_string()), Some(&"messages".to_string()));
    }

    #[test]
    fn device_sessions_can_be_added_and_removed() {
        let conn = fresh_conn();
        let session = DeviceSession {
            address: "wid/example.com".into(),
            device_id: UUID::generate(),
            device_name: "laptop".into(),
            device_pair: EncryptionPair::generate(),
            os: "linux".into(),
        };
        add_device_session(&conn, &session).unwrap();
        remove_device_session(&conn, &session.address, &session.device_id).unwrap();
    }
}

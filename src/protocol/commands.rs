//! # Server Commands
//!
//! One function per non-streaming server command. Streaming uploads/
//! downloads (`UPLOAD`/`SEND`/`REPLACE`/`DOWNLOAD`) live in
//! [`crate::protocol::streaming`] instead, since their resumability needs a
//! richer return type than a plain `Result`.

use std::thread;
use std::time::Duration;

use rand::rngs::OsRng;
use rand::RngCore;

use crate::address::{Domain, MAddress, UUID};
use crate::crypto::{sealed, CryptoString, EncryptionPair, SigningPair};
use crate::error::{MensagoError, Result};
use crate::keycard::Entry;

use super::connection::{wrap_server_error, ServerConnection};

const MAX_REGISTER_TRIES_BEFORE_PAUSE: u32 = 10;
const REGISTER_RETRY_PAUSE: Duration = Duration::from_secs(3);

fn uuid_field(value: &str) -> Result<UUID> {
    let mut uuid = UUID::new();
    uuid.set(value)?;
    Ok(uuid)
}

fn domain_field(value: &str) -> Result<Domain> {
    let mut domain = Domain::new();
    domain.set(value)?;
    Ok(domain)
}

/// Outcome of [`register`]: either the server accepted registration
/// outright (`201`) or queued it for administrator approval (`101`).
#[derive(Debug, Clone)]
pub struct RegisterOutcome {
    pub device_id: String,
    pub workspace_id: UUID,
    pub domain: Domain,
    pub pending: bool,
}

/// `REGISTER`. Retries on workspace-ID collision up to
/// [`MAX_REGISTER_TRIES_BEFORE_PAUSE`] attempts, pausing
/// [`REGISTER_RETRY_PAUSE`] every tenth attempt. A `User-ID` collision is
/// not retried — it can never succeed by generating a new random ID.
pub fn register(
    conn: &mut ServerConnection,
    uid: Option<&str>,
    password_hash: &str,
    device_key: &CryptoString,
) -> Result<RegisterOutcome> {
    let device_id = UUID::generate().as_string().to_string();
    let mut tries: u32 = 1;

    loop {
        if tries % MAX_REGISTER_TRIES_BEFORE_PAUSE == 0 {
            thread::sleep(REGISTER_RETRY_PAUSE);
        }

        let workspace_id = UUID::generate();
        let mut data = serde_json::json!({
            "Workspace-ID": workspace_id.as_string(),
            "Password-Hash": password_hash,
            "Device-ID": device_id,
            "Device-Key": device_key.as_string(),
        });
        if let Some(uid) = uid {
            data["User-ID"] = serde_json::Value::String(uid.to_string());
        }
        conn.send_message(&serde_json::json!({"Action": "REGISTER", "Data": data}))?;

        let response = conn.read_response()?;
        match response.code {
            101 | 201 => {
                let domain = domain_field(response.str_field("Domain")?)?;
                return Ok(RegisterOutcome {
                    device_id,
                    workspace_id,
                    domain,
                    pending: response.code == 101,
                });
            }
            408 => {
                let field = response.str_field("Field")?;
                match field {
                    "User-ID" => return Err(MensagoError::ResourceExists("user id".into())),
                    "Workspace-ID" => {
                        tries += 1;
                        continue;
                    }
                    other => {
                        return Err(MensagoError::ServerError {
                            code: response.code,
                            status: response.status,
                            info: format!("unexpected collision field {other}"),
                        })
                    }
                }
            }
            _ => return Err(wrap_server_error(&response)),
        }
    }
}

/// Outcome of [`regcode`]: the new device ID and workspace ID for a
/// preregistered account now being claimed with its registration code.
#[derive(Debug, Clone)]
pub struct RegcodeOutcome {
    pub device_id: String,
    pub workspace_id: UUID,
}

/// `REGCODE` — claims a preregistered account.
pub fn regcode(
    conn: &mut ServerConnection,
    address: &MAddress,
    code: &str,
    password_hash: &str,
    device_key: &EncryptionPair,
) -> Result<RegcodeOutcome> {
    if !address.is_valid() {
        return Err(MensagoError::BadParameterValue("address".into()));
    }
    let device_id = UUID::generate().as_string().to_string();

    let mut data = serde_json::json!({
        "Reg-Code": code,
        "Password-Hash": password_hash,
        "Device-ID": device_id,
        "Device-Key": device_key.public_string()?.as_string(),
        "Domain": address.domain().as_string(),
    });
    if address.id().is_wid() {
        data["Workspace-ID"] = serde_json::Value::String(address.id().as_string().to_string());
    } else {
        data["User-ID"] = serde_json::Value::String(address.id().as_string().to_string());
    }

    conn.send_message(&serde_json::json!({"Action": "REGCODE", "Data": data}))?;
    let response = conn.read_response()?;
    if response.code != 201 {
        return Err(wrap_server_error(&response));
    }
    Ok(RegcodeOutcome {
        device_id,
        workspace_id: uuid_field(response.str_field("Workspace-ID")?)?,
    })
}

/// Outcome of [`preregister`].
#[derive(Debug, Clone)]
pub struct PreregOutcome {
    pub domain: Domain,
    pub workspace_id: UUID,
    pub reg_code: String,
    pub user_id: Option<String>,
}

/// `PREREG` — an administrator preregistering an account on someone's
/// behalf.
pub fn preregister(
    conn: &mut ServerConnection,
    wid: Option<&UUID>,
    uid: Option<&str>,
    domain: Option<&str>,
) -> Result<PreregOutcome> {
    let mut data = serde_json::Map::new();
    if let Some(wid) = wid {
        data.insert("Workspace-ID".into(), serde_json::Value::String(wid.as_string().to_string()));
    }
    if let Some(uid) = uid {
        data.insert("User-ID".into(), serde_json::Value::String(uid.to_string()));
    }
    if let Some(domain) = domain {
        data.insert("Domain".into(), serde_json::Value::String(domain.to_string()));
    }

    conn.send_message(&serde_json::json!({"Action": "PREREG", "Data": data}))?;
    let response = conn.read_response()?;
    if response.code != 200 {
        return Err(wrap_server_error(&response));
    }

    Ok(PreregOutcome {
        domain: domain_field(response.str_field("Domain")?)?,
        workspace_id: uuid_field(response.str_field("Workspace-ID")?)?,
        reg_code: response.str_field("Reg-Code")?.to_string(),
        user_id: response.opt_str_field("User-ID").map(str::to_string),
    })
}

/// `LOGIN` — the first step of the three-message login flow (the others
/// are [`password`] and [`device`]). Verifies the server's identity: it
/// must decrypt the sealed challenge and echo it back unchanged.
pub fn login(conn: &mut ServerConnection, wid: &UUID, server_key: &CryptoString) -> Result<()> {
    if !wid.is_valid() {
        return Err(MensagoError::BadParameterValue("workspace id".into()));
    }

    let mut raw_challenge = [0u8; 32];
    OsRng.fill_bytes(&mut raw_challenge);
    let challenge_text = base85::encode(&raw_challenge);
    let sealed_challenge = sealed::seal(challenge_text.as_bytes(), server_key)?;

    conn.send_message(&serde_json::json!({
        "Action": "LOGIN",
        "Data": {
            "Workspace-ID": wid.as_string(),
            "Login-Type": "PLAIN",
            "Challenge": sealed_challenge.as_string(),
        }
    }))?;

    let response = conn.read_response()?;
    if response.code != 100 {
        return Err(wrap_server_error(&response));
    }
    if response.str_field("Response")? != challenge_text {
        return Err(MensagoError::ServerError {
            code: response.code,
            status: response.status,
            info: "server failed to decrypt the login challenge".into(),
        });
    }
    Ok(())
}

/// `PASSWORD` — the second login step.
pub fn password(conn: &mut ServerConnection, password_hash: &str) -> Result<()> {
    conn.send_message(&serde_json::json!({
        "Action": "PASSWORD",
        "Data": {"Password-Hash": password_hash}
    }))?;
    let response = conn.read_response()?;
    if response.code != 100 {
        return Err(wrap_server_error(&response));
    }
    Ok(())
}

/// `DEVICE` — the third login step, proving possession of the device's
/// private key. Sends `CANCEL` and returns [`MensagoError::DecryptionFailure`]
/// if the challenge fails to decrypt.
pub fn device(conn: &mut ServerConnection, device_id: &UUID, device_pair: &EncryptionPair) -> Result<()> {
    if !device_id.is_valid() {
        return Err(MensagoError::BadParameterValue("device id".into()));
    }

    conn.send_message(&serde_json::json!({
        "Action": "DEVICE",
        "Data": {
            "Device-ID": device_id.as_string(),
            "Device-Key": device_pair.public_string()?.as_string(),
        }
    }))?;

    let response = conn.read_response()?;
    if response.code != 100 {
        return Err(wrap_server_error(&response));
    }

    let challenge = CryptoString::parse(response.str_field("Challenge")?)?;
    let decrypted = match sealed::open(&challenge, device_pair) {
        Ok(bytes) => bytes,
        Err(e) => {
            let _ = cancel(conn);
            return Err(MensagoError::DecryptionFailure(e.to_string()));
        }
    };
    let response_text = String::from_utf8(decrypted)
        .map_err(|e| MensagoError::DecryptionFailure(e.to_string()))?;

    conn.send_message(&serde_json::json!({
        "Action": "DEVICE",
        "Data": {
            "Device-ID": device_id.as_string(),
            "Device-Key": device_pair.public_string()?.as_string(),
            "Response": response_text,
        }
    }))?;
    let response = conn.read_response()?;
    if response.code != 200 {
        return Err(wrap_server_error(&response));
    }
    Ok(())
}

/// `DEVKEY` — rotates a device's keypair. Both the old and new challenges
/// must decrypt; either failure sends `CANCEL` first.
pub fn devkey(
    conn: &mut ServerConnection,
    device_id: &UUID,
    old_pair: &EncryptionPair,
    new_pair: &EncryptionPair,
) -> Result<()> {
    if !device_id.is_valid() {
        return Err(MensagoError::BadParameterValue("device id".into()));
    }

    conn.send_message(&serde_json::json!({
        "Action": "DEVKEY",
        "Data": {
            "Device-ID": device_id.as_string(),
            "Old-Key": old_pair.public_string()?.as_string(),
            "New-Key": new_pair.public_string()?.as_string(),
        }
    }))?;

    let response = conn.read_response()?;
    if response.code != 100 {
        return Err(wrap_server_error(&response));
    }

    let old_challenge = CryptoString::parse(response.str_field("Challenge")?)?;
    let old_decrypted = match sealed::open(&old_challenge, old_pair) {
        Ok(bytes) => bytes,
        Err(e) => {
            let _ = cancel(conn);
            return Err(MensagoError::DecryptionFailure(e.to_string()));
        }
    };

    let new_challenge = CryptoString::parse(response.str_field("New-Challenge")?)?;
    let new_decrypted = match sealed::open(&new_challenge, new_pair) {
        Ok(bytes) => bytes,
        Err(e) => {
            let _ = cancel(conn);
            return Err(MensagoError::DecryptionFailure(e.to_string()));
        }
    };

    let old_response_text = String::from_utf8(old_decrypted)
        .map_err(|e| MensagoError::DecryptionFailure(e.to_string()))?;
    let new_response_text = String::from_utf8(new_decrypted)
        .map_err(|e| MensagoError::DecryptionFailure(e.to_string()))?;

    conn.send_message(&serde_json::json!({
        "Action": "DEVKEY",
        "Data": {
            "Device-ID": device_id.as_string(),
            "Response": old_response_text,
            "New-Response": new_response_text,
        }
    }))?;
    let response = conn.read_response()?;
    if response.code != 200 {
        return Err(wrap_server_error(&response));
    }
    Ok(())
}

/// `ADDENTRY` — uploads the next keycard entry in two messages: the
/// unsigned base entry first, then the client's own role signature once
/// the server has countersigned and hashed it.
pub fn addentry(
    conn: &mut ServerConnection,
    entry: &mut Entry,
    org_verify_key: &CryptoString,
    user_signing: &SigningPair,
) -> Result<()> {
    conn.send_message(&serde_json::json!({
        "Action": "ADDENTRY",
        "Data": {"Base-Entry": String::from_utf8_lossy(&entry.make_bytestring(0)).to_string()}
    }))?;

    let response = conn.read_response()?;
    if response.code != 100 {
        return Err(wrap_server_error(&response));
    }

    let org_signature = response.str_field("Organization-Signature")?.to_string();
    let hash = response.str_field("Hash")?.to_string();
    let previous_hash = response.str_field("Previous-Hash")?.to_string();

    entry.set_signature("Organization", &org_signature);
    entry.verify_signature(org_verify_key, "Organization")?;

    entry.set_previous_hash(&previous_hash);
    entry.set_hash(&hash);
    entry.verify_hash()?;

    entry.sign(&user_signing.private_string()?, "User")?;
    entry.verify_signature(&user_signing.public_string()?, "User")?;
    entry.is_compliant()?;

    conn.send_message(&serde_json::json!({
        "Action": "ADDENTRY",
        "Data": {"User-Signature": entry.signature("User").unwrap_or_default()}
    }))?;
    let response = conn.read_response()?;
    if response.code != 200 {
        return Err(wrap_server_error(&response));
    }
    Ok(())
}

/// `ISCURRENT` — whether `index` is the most recent keycard entry index
/// known to the server.
pub fn iscurrent(conn: &mut ServerConnection, index: u64, wid: Option<&UUID>) -> Result<bool> {
    let mut data = serde_json::json!({"Index": index.to_string()});
    if let Some(wid) = wid {
        data["Workspace-ID"] = serde_json::Value::String(wid.as_string().to_string());
    }
    conn.send_message(&serde_json::json!({"Action": "ISCURRENT", "Data": data}))?;
    let response = conn.read_response()?;
    if response.code != 200 {
        return Err(wrap_server_error(&response));
    }
    Ok(response.str_field("Is-Current")? == "YES")
}

/// `GETWID` — resolves a user ID (optionally scoped to a domain) to its
/// workspace ID.
pub fn getwid(conn: &mut ServerConnection, uid: &str, domain: Option<&str>) -> Result<UUID> {
    let mut data = serde_json::json!({"User-ID": uid});
    if let Some(domain) = domain {
        data["Domain"] = serde_json::Value::String(domain.to_string());
    }
    conn.send_message(&serde_json::json!({"Action": "GETWID", "Data": data}))?;
    let response = conn.read_response()?;
    if response.code != 200 {
        return Err(wrap_server_error(&response));
    }
    uuid_field(response.str_field("Workspace-ID")?)
}

/// `LOGOUT`.
pub fn logout(conn: &mut ServerConnection) -> Result<()> {
    conn.send_message(&serde_json::json!({"Action": "LOGOUT", "Data": {}}))?;
    let response = conn.read_response()?;
    if response.code != 200 {
        return Err(wrap_server_error(&response));
    }
    Ok(())
}

/// `CANCEL` — aborts whatever multi-message command is in flight.
pub fn cancel(conn: &mut ServerConnection) -> Result<()> {
    conn.send_message(&serde_json::json!({"Action": "CANCEL", "Data": {}}))?;
    let response = conn.read_response()?;
    if response.code != 200 {
        return Err(wrap_server_error(&response));
    }
    Ok(())
}

/// `PASSCODE` — resets a workspace's password using a reset code.
pub fn passcode(conn: &mut ServerConnection, wid: &UUID, reset_code: &str, password_hash: &str) -> Result<()> {
    conn.send_message(&serde_json::json!({
        "Action": "PASSCODE",
        "Data": {
            "Workspace-ID": wid.as_string(),
            "Reset-Code": reset_code,
            "Password-Hash": password_hash,
        }
    }))?;
    let response = conn.read_response()?;
    if response.code != 200 {
        return Err(wrap_server_error(&response));
    }
    Ok(())
}

/// Outcome of [`reset_password`]: the reset code and its expiration, for
/// relaying to the account holder out of band.
#[derive(Debug, Clone)]
pub struct ResetPasswordOutcome {
    pub reset_code: String,
    pub expires: String,
}

/// `RESETPASSWORD` — an administrator generating a reset code for another
/// workspace.
pub fn reset_password(
    conn: &mut ServerConnection,
    wid: &UUID,
    reset_code: &str,
    expires: &str,
) -> Result<ResetPasswordOutcome> {
    conn.send_message(&serde_json::json!({
        "Action": "RESETPASSWORD",
        "Data": {
            "Workspace-ID": wid.as_string(),
            "Reset-Code": reset_code,
            "Expires": expires,
        }
    }))?;
    let response = conn.read_response()?;
    if response.code != 200 {
        return Err(wrap_server_error(&response));
    }
    Ok(ResetPasswordOutcome {
        reset_code: response.str_field("Reset-Code")?.to_string(),
        expires: response.str_field("Expires")?.to_string(),
    })
}

/// `SETPASSWORD` — changes the current session's own password.
pub fn setpassword(conn: &mut ServerConnection, password_hash: &str, new_password_hash: &str) -> Result<()> {
    conn.send_message(&serde_json::json!({
        "Action": "SETPASSWORD",
        "Data": {
            "Password-Hash": password_hash,
            "NewPassword-Hash": new_password_hash,
        }
    }))?;
    let response = conn.read_response()?;
    if response.code != 200 {
        return Err(wrap_server_error(&response));
    }
    Ok(())
}

/// Workspace status values accepted by [`setstatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkspaceStatus {
    Active,
    Disabled,
    Approved,
}

impl WorkspaceStatus {
    fn as_str(self) -> &'static str {
        match self {
            WorkspaceStatus::Active => "active",
            WorkspaceStatus::Disabled => "disabled",
            WorkspaceStatus::Approved => "approved",
        }
    }
}

/// `SETSTATUS` — an administrator action.
pub fn setstatus(conn: &mut ServerConnection, wid: &UUID, status: WorkspaceStatus) -> Result<()> {
    if !wid.is_valid() {
        return Err(MensagoError::BadParameterValue("workspace id".into()));
    }
    conn.send_message(&serde_json::json!({
        "Action": "SETSTATUS",
        "Data": {
            "Workspace-ID": wid.as_string(),
            "Status": status.as_str(),
        }
    }))?;
    let response = conn.read_response()?;
    if response.code != 200 {
        return Err(wrap_server_error(&response));
    }
    Ok(())
}

/// `UNREGISTER` — deletes a workspace. `202` is the only success code;
/// anything else (including a server that queues the deletion) is an
/// error the caller must inspect.
pub fn unregister(conn: &mut ServerConnection, password_hash: &str, wid: Option<&UUID>) -> Result<()> {
    let mut data = serde_json::json!({"Password-Hash": password_hash});
    if let Some(wid) = wid {
        data["Workspace-ID"] = serde_json::Value::String(wid.as_string().to_string());
    }
    conn.send_message(&serde_json::json!({"Action": "UNREGISTER", "Data": data}))?;
    let response = conn.read_response()?;
    if response.code != 202 {
        return Err(wrap_server_error(&response));
    }
    Ok(())
}

/// Disk usage and quota, in bytes, as returned by `GETQUOTAINFO`. Parsed
/// as `u64` here rather than carried as opaque strings.
#[derive(Debug, Clone, Copy)]
pub struct QuotaInfo {
    pub usage: u64,
    pub quota: u64,
}

/// `GETQUOTAINFO`.
pub fn getquotainfo(conn: &mut ServerConnection, wid: Option<&UUID>) -> Result<QuotaInfo> {
    let mut data = serde_json::Map::new();
    if let Some(wid) = wid {
        data.insert("Workspace-ID".into(), serde_json::Value::String(wid.as_string().to_string()));
    }
    conn.send_message(&serde_json::json!({"Action": "GETQUOTAINFO", "Data": data}))?;
    let response = conn.read_response()?;
    if response.code != 200 {
        return Err(wrap_server_error(&response));
    }
    Ok(QuotaInfo {
        usage: response.u64_field("DiskUsage")?,
        quota: response.u64_field("QuotaSize")?,
    })
}

/// `SETQUOTA` — admin-only.
pub fn setquota(conn: &mut ServerConnection, wid: &str, size: u64) -> Result<()> {
    conn.send_message(&serde_json::json!({
        "Action": "SETQUOTA",
        "Data": {"Workspaces": wid, "Size": size.to_string()}
    }))?;
    let response = conn.read_response()?;
    if response.code != 200 {
        return Err(wrap_server_error(&response));
    }
    Ok(())
}

/// `LIST` — files in `path` (or the current working directory), optionally
/// filtered to those modified after `since` (Unix epoch seconds).
pub fn listfiles(conn: &mut ServerConnection, path: Option<&str>, since: Option<u64>) -> Result<Vec<String>> {
    let mut data = serde_json::Map::new();
    if let Some(path) = path {
        data.insert("Path".into(), serde_json::Value::String(path.to_string()));
    }
    if let Some(since) = since {
        data.insert("Time".into(), serde_json::Value::String(since.to_string()));
    }
    conn.send_message(&serde_json::json!({"Action": "LIST", "Data": data}))?;
    let response = conn.read_response()?;
    if response.code != 200 {
        return Err(wrap_server_error(&response));
    }
    string_list(&response, "Files")
}

/// `LISTDIRS` — subdirectories of `path` (or the current working
/// directory).
pub fn listdirs(conn: &mut ServerConnection, path: Option<&str>) -> Result<Vec<String>> {
    let mut data = serde_json::Map::new();
    if let Some(path) = path {
        data.insert("Path".into(), serde_json::Value::String(path.to_string()));
    }
    conn.send_message(&serde_json::json!({"Action": "LISTDIRS", "Data": data}))?;
    let response = conn.read_response()?;
    if response.code != 200 {
        return Err(wrap_server_error(&response));
    }
    string_list(&response, "Directories")
}

fn string_list(response: &super::connection::ServerResponse, key: &str) -> Result<Vec<String>> {
    match response.data.get(key) {
        None => Ok(Vec::new()),
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .map(|v| {
                v.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| MensagoError::InvalidMessage(format!("{key} entry is not a string")))
            })
            .collect(),
        Some(_) => Err(MensagoError::InvalidMessage(format!("{key} is not an array"))),
    }
}

/// `MKDIR` — `encpath` is the encrypted path name the server stores
/// alongside the opaque UUID directory it actually creates.
pub fn mkdir(conn: &mut ServerConnection, path: &str, encpath: &CryptoString) -> Result<()> {
    if !encpath.is_valid() {
        return Err(MensagoError::BadParameterValue("encrypted path".into()));
    }
    conn.send_message(&serde_json::json!({
        "Action": "MKDIR",
        "Data": {"Path": path, "ClientPath": encpath.as_string()}
    }))?;
    let response = conn.read_response()?;
    if response.code != 200 {
        return Err(wrap_server_error(&response));
    }
    Ok(())
}

/// `RMDIR`.
pub fn rmdir(conn: &mut ServerConnection, path: &str) -> Result<()> {
    conn.send_message(&serde_json::json!({"Action": "RMDIR", "Data": {"Path": path}}))?;
    let response = conn.read_response()?;
    if response.code != 200 {
        return Err(wrap_server_error(&response));
    }
    Ok(())
}

/// `SELECT` — sets the working directory for subsequent path-relative
/// commands on this connection.
pub fn select(conn: &mut ServerConnection, path: &str) -> Result<()> {
    conn.send_message(&serde_json::json!({"Action": "SELECT", "Data": {"Path": path}}))?;
    let response = conn.read_response()?;
    if response.code != 200 {
        return Err(wrap_server_error(&response));
    }
    Ok(())
}

/// `COPY` — returns the new file's name under `dest_dir`.
pub fn copy(conn: &mut ServerConnection, source_file: &str, dest_dir: &str) -> Result<String> {
    conn.send_message(&serde_json::json!({
        "Action": "COPY",
        "Data": {"SourceFile": source_file, "DestDir": dest_dir}
    }))?;
    let response = conn.read_response()?;
    if response.code != 200 {
        return Err(wrap_server_error(&response));
    }
    Ok(response.str_field("NewName")?.to_string())
}

/// `MOVE`.
pub fn move_file(conn: &mut ServerConnection, source_file: &str, dest_dir: &str) -> Result<()> {
    conn.send_message(&serde_json::json!({
        "Action": "MOVE",
        "Data": {"SourceFile": source_file, "DestDir": dest_dir}
    }))?;
    let response = conn.read_response()?;
    if response.code != 200 {
        return Err(wrap_server_error(&response));
    }
    Ok(())
}

/// `DELETE` — batches `paths` into as few `DELETE` messages as fit the 16
/// KiB command limit, accounting for a fixed per-message overhead plus,
/// per path, its index digits and string length.
pub fn delete(conn: &mut ServerConnection, paths: &[String]) -> Result<()> {
    const BASE_OVERHEAD: usize = 47;

    let mut index = 0usize;
    while index < paths.len() {
        let mut batch: Vec<&str> = Vec::new();
        let mut size = BASE_OVERHEAD;

        while index < paths.len() {
            let entry_size = 10 + index.to_string().len() + paths[index].len();
            if size + entry_size >= super::connection::MAX_COMMAND_SIZE && !batch.is_empty() {
                break;
            }
            size += entry_size;
            batch.push(&paths[index]);
            index += 1;
        }

        let mut data = serde_json::Map::new();
        data.insert("PathCount".into(), serde_json::Value::String(batch.len().to_string()));
        for (i, path) in batch.iter().enumerate() {
            data.insert(format!("Path{i}"), serde_json::Value::String((*path).to_string()));
        }

        conn.send_message(&serde_json::json!({"Action": "DELETE", "Data": data}))?;
        let response = conn.read_response()?;
        if response.code != 200 {
            return Err(wrap_server_error(&response));
        }
    }
    Ok(())
}

/// `EXISTS`. Reflects `Code == 200` exactly, rather than assuming success.
pub fn exists(conn: &mut ServerConnection, path: &str) -> Result<bool> {
    conn.send_message(&serde_json::json!({"Action": "EXISTS", "Data": {"Path": path}}))?;
    let response = conn.read_response()?;
    Ok(response.code == 200)
}

/// `SENDFAST` — a small, single-round message send bypassing the
/// streaming upload flow, for payloads that fit in one command frame.
pub fn sendfast(conn: &mut ServerConnection, message: &str, domain: &Domain) -> Result<()> {
    const OVERHEAD: usize = 49;
    if OVERHEAD + domain.as_string().len() + message.len() >= super::connection::MAX_COMMAND_SIZE {
        return Err(MensagoError::MessageTooLarge(message.len()));
    }
    conn.send_message(&serde_json::json!({
        "Action": "SENDFAST",
        "Data": {"Domain": domain.as_string(), "Message": message}
    }))?;
    let response = conn.read_response()?;
    if response.code != 200 {
        return Err(wrap_server_error(&response));
    }
    Ok(())
}

/// One server-originated change record, as returned by [`getupdates`].
/// `update_type` is kept as the server's own string (`Create`, `Move`,
/// `Delete`, `Rotate`) rather than re-parsed into an enum here —
/// [`crate::profile`] owns that decision since it's the one persisting
/// these rows.
#[derive(Debug, Clone)]
pub struct UpdateRecord {
    pub id: String,
    pub update_type: String,
    pub data: String,
    pub time: u64,
}

/// `IDLE` — tells the server how many updates have accrued since
/// `last_check` (a Unix timestamp) without downloading them yet.
pub fn idle(conn: &mut ServerConnection, last_check: u64) -> Result<u64> {
    conn.send_message(&serde_json::json!({
        "Action": "IDLE",
        "Data": {"CountUpdates": last_check.to_string()}
    }))?;
    let response = conn.read_response()?;
    if response.code != 200 {
        return Err(wrap_server_error(&response));
    }
    response.u64_field("UpdateCount")
}

/// `GETUPDATES` — fetches one page of update records at or after
/// `last_check`. Returns the page of records together with the server's
/// total outstanding count so the caller can keep paging until it's
/// caught up.
pub fn getupdates(conn: &mut ServerConnection, last_check: u64) -> Result<(Vec<UpdateRecord>, u64)> {
    conn.send_message(&serde_json::json!({
        "Action": "GETUPDATES",
        "Data": {"Time": last_check.to_string()}
    }))?;
    let response = conn.read_response()?;
    if response.code != 200 {
        return Err(wrap_server_error(&response));
    }

    let total = response.u64_field("UpdateCount")?;
    let items = response
        .data
        .get("Updates")
        .and_then(serde_json::Value::as_array)
        .ok_or_else(|| MensagoError::ServerError {
            code: response.code,
            status: response.status.clone(),
            info: "server did not return an Updates array".into(),
        })?;

    let mut records = Vec::with_capacity(items.len());
    for item in items {
        let id = item
            .get("ID")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| MensagoError::ServerError {
                code: response.code,
                status: response.status.clone(),
                info: "update record missing ID".into(),
            })?;
        let update_type = item
            .get("Type")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| MensagoError::ServerError {
                code: response.code,
                status: response.status.clone(),
                info: "update record missing Type".into(),
            })?;
        if !["Create", "Move", "Delete", "Rotate"].contains(&update_type) {
            return Err(MensagoError::ServerError {
                code: response.code,
                status: response.status.clone(),
                info: format!("unknown update type {update_type}"),
            });
        }
        let data = item
            .get("Data")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default();
        let time = item
            .get("Time")
            .and_then(serde_json::Value::as_str)
            .and_then(|s| s.parse::<u64>().ok())
            .ok_or_else(|| MensagoError::ServerError {
                code: response.code,
                status: response.status.clone(),
                info: "update record has a non-numeric Time".into(),
            })?;

        records.push(UpdateRecord {
            id: id.to_string(),
            update_type: update_type.to_string(),
            data: data.to_string(),
            time,
        });
    }

    if records.len() as u64 > total {
        return Err(MensagoError::ServerError {
            code: response.code,
            status: response.status,
            info: "server returned more updates than it reported".into(),
        });
    }

    Ok((records, total))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workspace_status_renders_lowercase() {
        assert_eq!(WorkspaceStatus::Active.as_str(), "active");
        assert_eq!(WorkspaceStatus::Disabled.as_str(), "disabled");
        assert_eq!(WorkspaceStatus::Approved.as_str(), "approved");
    }

    #[test]
    fn delete_batches_respect_command_size() {
        let paths: Vec<String> = (0..2000).map(|i| format!("/ wsp abc def-{i}.txt")).collect();
        let mut index = 0usize;
        let mut batches = 0usize;
        while index < paths.len() {
            let mut size = 47usize;
            let start = index;
            while index < paths.len() {
                let entry_size = 10 + index.to_string().len() + paths[index].len();
                if size + entry_size >= super::super::connection::MAX_COMMAND_SIZE && index > start {
                    break;
                }
                size += entry_size;
                index += 1;
            }
            batches += 1;
        }
        assert!(batches > 1, "fixture should require more than one DELETE batch");
    }
}

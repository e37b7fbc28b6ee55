//! # Streaming File Transfer
//!
//! `UPLOAD`/`SEND`/`REPLACE` (resumable outbound streaming) and `DOWNLOAD`
//! (resumable, two-phase inbound streaming).
//!
//! A failed send returns [`MensagoError::UploadInterrupted`], a typed
//! error carrying exactly the progress a caller needs to resume: the
//! server's temp name and how many bytes already landed. Reading those
//! fields back into a [`ResumePoint`] and passing it to a retry is the
//! only supported recovery path.

use std::fs;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::crypto::hashing::hash_default;
use crate::error::{MensagoError, Result};

use super::connection::{wrap_server_error, ServerConnection, READ_BUFFER_SIZE};

/// Where to resume a previously interrupted upload from, built from the
/// `temp_name`/`bytes_sent` on a caught [`MensagoError::UploadInterrupted`].
#[derive(Debug, Clone)]
pub struct ResumePoint {
    pub temp_name: String,
    pub bytes_sent: u64,
}

fn hash_file(path: &Path) -> Result<String> {
    let data = fs::read(path)?;
    Ok(hash_default(&data)?.as_string())
}

/// Streams `local_path`'s bytes (from `resume.bytes_sent` onward, if
/// given) to the connection after `data` has already been accepted with a
/// `100` response, then reads the closing `200`. Shared by
/// [`upload`]/[`send`]/[`replace`].
fn stream_body(
    conn: &mut ServerConnection,
    action: &str,
    data: serde_json::Value,
    local_path: &Path,
    resume: Option<&ResumePoint>,
) -> Result<String> {
    conn.send_message(&serde_json::json!({"Action": action, "Data": data}))?;
    let response = conn.read_response()?;
    if response.code != 100 {
        return Err(wrap_server_error(&response));
    }

    let temp_name = response
        .opt_str_field("TempName")
        .map(str::to_string)
        .or_else(|| resume.map(|r| r.temp_name.clone()))
        .unwrap_or_default();
    let start_offset = resume.map(|r| r.bytes_sent).unwrap_or(0);

    let mut file = fs::File::open(local_path)?;
    if start_offset > 0 {
        file.seek(SeekFrom::Start(start_offset))?;
    }

    let mut sent = start_offset;
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    loop {
        let n = file.read(&mut buf).map_err(|e| MensagoError::Filesystem(e.to_string()))?;
        if n == 0 {
            break;
        }
        if let Err(e) = conn.write_bytes(&buf[..n]) {
            tracing::warn!(error = %e, bytes_sent = sent, "upload interrupted");
            return Err(MensagoError::UploadInterrupted {
                temp_name,
                bytes_sent: sent,
            });
        }
        sent += n as u64;
    }

    let response = conn.read_response()?;
    if response.code != 200 {
        return Err(wrap_server_error(&response));
    }
    Ok(response.str_field("FileName")?.to_string())
}

/// `UPLOAD` — uploads `local_path` to `dest_path` in the current working
/// directory. Returns the file name the server assigned it.
pub fn upload(
    conn: &mut ServerConnection,
    local_path: &Path,
    dest_path: &str,
    resume: Option<&ResumePoint>,
) -> Result<String> {
    let size = fs::metadata(local_path)?.len();
    let mut data = serde_json::json!({
        "Size": size.to_string(),
        "Hash": hash_file(local_path)?,
        "Path": dest_path,
    });
    if let Some(resume) = resume {
        data["Offset"] = serde_json::Value::String(resume.bytes_sent.to_string());
        data["TempName"] = serde_json::Value::String(resume.temp_name.clone());
    }
    stream_body(conn, "UPLOAD", data, local_path, resume)
}

/// `SEND` — uploads a message file addressed to `domain` rather than a
/// path in the workspace's own file store.
pub fn send(
    conn: &mut ServerConnection,
    local_path: &Path,
    domain: &crate::address::Domain,
    resume: Option<&ResumePoint>,
) -> Result<String> {
    let size = fs::metadata(local_path)?.len();
    let mut data = serde_json::json!({
        "Size": size.to_string(),
        "Hash": hash_file(local_path)?,
        "Domain": domain.as_string(),
    });
    if let Some(resume) = resume {
        data["Offset"] = serde_json::Value::String(resume.bytes_sent.to_string());
        data["TempName"] = serde_json::Value::String(resume.temp_name.clone());
    }
    stream_body(conn, "SEND", data, local_path, resume)
}

/// `REPLACE` — uploads `local_path` as a replacement for `old_path`,
/// landing at `new_path` once the transfer completes.
pub fn replace(
    conn: &mut ServerConnection,
    local_path: &Path,
    old_path: &str,
    new_path: &str,
    resume: Option<&ResumePoint>,
) -> Result<String> {
    let size = fs::metadata(local_path)?.len();
    let mut data = serde_json::json!({
        "OldPath": old_path,
        "NewPath": new_path,
        "Size": size.to_string(),
        "Hash": hash_file(local_path)?,
    });
    if let Some(resume) = resume {
        data["Offset"] = serde_json::Value::String(resume.bytes_sent.to_string());
        data["TempName"] = serde_json::Value::String(resume.temp_name.clone());
    }
    stream_body(conn, "REPLACE", data, local_path, resume)
}

/// `DOWNLOAD` — a two-phase resumable download: the first round trip
/// confirms the server has `server_path` and learns its size, the second
/// confirms readiness, after which the raw bytes follow directly on the
/// socket. Writes (or appends to, if `offset` is nonzero) `local_path`.
pub fn download(
    conn: &mut ServerConnection,
    server_path: &str,
    local_path: &Path,
    offset: u64,
) -> Result<()> {
    let mut data = serde_json::json!({"Path": server_path});
    if offset > 0 {
        data["Offset"] = serde_json::Value::String(offset.to_string());
    }

    conn.send_message(&serde_json::json!({"Action": "DOWNLOAD", "Data": data.clone()}))?;
    let response = conn.read_response()?;
    if response.code != 100 {
        return Err(wrap_server_error(&response));
    }
    let remaining_size = response.u64_field("Size")?;

    data["Size"] = serde_json::Value::String(remaining_size.to_string());
    conn.send_message(&serde_json::json!({"Action": "DOWNLOAD", "Data": data}))?;

    let mut file = if offset > 0 {
        fs::OpenOptions::new().write(true).open(local_path)?
    } else {
        fs::File::create(local_path)?
    };
    if offset > 0 {
        file.seek(SeekFrom::Start(offset))?;
    }

    let mut remaining = remaining_size;
    while remaining > 0 {
        let chunk = conn.read_bytes()?;
        let take = (chunk.len() as u64).min(remaining) as usize;
        file.write_all(&chunk[..take])?;
        remaining -= take as u64;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader};
    use std::net::TcpListener;
    use std::thread;
    use tempfile::tempdir;

    #[test]
    fn upload_streams_full_file_and_returns_name() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("payload.bin");
        fs::write(&file_path, b"hello mensago").unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            stream
                .write_all(b"{\"Code\":200,\"Status\":\"OK\"}\r\n")
                .unwrap();

            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            assert!(line.contains("\"Action\":\"UPLOAD\""));

            stream
                .write_all(b"{\"Code\":100,\"Status\":\"Continue\",\"Info\":\"\",\"Data\":{\"TempName\":\"abc\"}}\r\n")
                .unwrap();

            let mut body = vec![0u8; b"hello mensago".len()];
            reader.read_exact(&mut body).unwrap();
            assert_eq!(&body, b"hello mensago");

            stream
                .write_all(b"{\"Code\":200,\"Status\":\"OK\",\"Info\":\"\",\"Data\":{\"FileName\":\"final.bin\"}}\r\n")
                .unwrap();
        });

        let mut conn = ServerConnection::new();
        conn.connect("127.0.0.1", port).unwrap();

        let name = upload(&mut conn, &file_path, "/ wsp abc", None).unwrap();
        assert_eq!(name, "final.bin");

        handle.join().unwrap();
    }
}

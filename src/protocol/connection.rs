//! # Server Connection
//!
//! [`ServerConnection`] owns one blocking TCP socket and the request/response
//! line-delimited JSON framing.
//!
//! One socket, one thread, at most one in-flight command. `ServerConnection`
//! is `Send` (move it to the thread that owns the session) but deliberately
//! not `Sync` — the marker field below has no other purpose.

use std::cell::Cell;
use std::io::{Read, Write};
use std::marker::PhantomData;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use serde_json::Value;

use crate::error::{MensagoError, Result};
use crate::protocol::codes::ProtocolCode;

/// Time allowed for the initial TCP connect and greeting read.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Idle read timeout applied once the connection is established.
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);
/// Maximum size, in bytes, of a minified command message.
pub const MAX_COMMAND_SIZE: usize = 16384;
/// Read buffer size used for both the greeting and every subsequent
/// `recv`-equivalent call.
pub const READ_BUFFER_SIZE: usize = 16384;

/// A parsed server response: `{Code, Status, Info, Data}`.
#[derive(Debug, Clone)]
pub struct ServerResponse {
    pub code: u16,
    pub status: String,
    pub info: String,
    pub data: Value,
}

impl ServerResponse {
    pub fn is_success(&self) -> bool {
        self.code < 300
    }

    /// Looks up a required string field under `Data`.
    pub fn str_field(&self, key: &str) -> Result<&str> {
        self.data
            .get(key)
            .and_then(Value::as_str)
            .ok_or_else(|| MensagoError::ServerError {
                code: self.code,
                status: self.status.clone(),
                info: format!("server did not return required field {key}"),
            })
    }

    /// Looks up an optional string field under `Data`.
    pub fn opt_str_field(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }

    /// Looks up a required field under `Data` parsed as `u64`, tolerating
    /// either a JSON number or a numeric string (the server sends integers
    /// as decimal strings in several commands).
    pub fn u64_field(&self, key: &str) -> Result<u64> {
        let value = self.data.get(key).ok_or_else(|| MensagoError::ServerError {
            code: self.code,
            status: self.status.clone(),
            info: format!("server did not return required field {key}"),
        })?;
        if let Some(n) = value.as_u64() {
            return Ok(n);
        }
        value
            .as_str()
            .and_then(|s| s.parse::<u64>().ok())
            .ok_or_else(|| MensagoError::ServerError {
                code: self.code,
                status: self.status.clone(),
                info: format!("server returned a non-numeric value for {key}"),
            })
    }
}

/// Maps a non-success response into the error it represents: a named
/// [`ProtocolCode`] if the numeric code is recognized, else a generic
/// [`MensagoError::ServerError`] carrying the raw code/status/info.
pub fn wrap_server_error(response: &ServerResponse) -> MensagoError {
    match ProtocolCode::from_code(response.code) {
        Some(code) if !code.is_success() => MensagoError::Protocol(code),
        _ => MensagoError::ServerError {
            code: response.code,
            status: response.status.clone(),
            info: response.info.clone(),
        },
    }
}

/// A blocking connection to a Mensago server.
pub struct ServerConnection {
    socket: Option<TcpStream>,
    _not_sync: PhantomData<Cell<()>>,
}

impl Default for ServerConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerConnection {
    pub fn new() -> Self {
        Self {
            socket: None,
            _not_sync: PhantomData,
        }
    }

    /// Connects to `address:port`, absorbs the server's greeting line, and
    /// switches to the idle timeout for all subsequent I/O.
    pub fn connect(&mut self, address: &str, port: u16) -> Result<()> {
        let addr = (address, port)
            .to_socket_addrs()
            .map_err(|e| MensagoError::NetworkError(e.to_string()))?
            .next()
            .ok_or_else(|| MensagoError::NetworkError(format!("could not resolve {address}")))?;

        let stream = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT)
            .map_err(|e| MensagoError::NetworkError(e.to_string()))?;
        stream
            .set_read_timeout(Some(CONNECT_TIMEOUT))
            .map_err(|e| MensagoError::NetworkError(e.to_string()))?;
        stream
            .set_write_timeout(Some(CONNECT_TIMEOUT))
            .map_err(|e| MensagoError::NetworkError(e.to_string()))?;

        let mut stream = stream;
        let mut greeting = vec![0u8; READ_BUFFER_SIZE];
        stream
            .read(&mut greeting)
            .map_err(|e| MensagoError::NetworkError(e.to_string()))?;

        stream
            .set_read_timeout(Some(IDLE_TIMEOUT))
            .map_err(|e| MensagoError::NetworkError(e.to_string()))?;

        tracing::debug!(%address, port, "connected to server");
        self.socket = Some(stream);
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.socket.is_some()
    }

    /// Sends `QUIT` and, on success, drops the socket.
    pub fn disconnect(&mut self) -> Result<()> {
        self.send_message(&serde_json::json!({"Action": "QUIT", "Data": {}}))?;
        self.socket = None;
        Ok(())
    }

    /// Serializes `command` to JSON, appends the `\r\n` frame terminator,
    /// and writes it to the socket. Fails with `MessageTooLarge` before
    /// attempting to send anything over the 16 KiB limit.
    pub fn send_message(&mut self, command: &Value) -> Result<()> {
        let text = serde_json::to_string(command)?;
        if text.len() > MAX_COMMAND_SIZE {
            return Err(MensagoError::MessageTooLarge(text.len()));
        }
        tracing::trace!(bytes = text.len(), "sending command");

        let stream = self
            .socket
            .as_mut()
            .ok_or_else(|| MensagoError::NetworkError("not connected".into()))?;
        let mut framed = text;
        framed.push_str("\r\n");
        if let Err(e) = stream.write_all(framed.as_bytes()) {
            self.socket = None;
            return Err(MensagoError::NetworkError(e.to_string()));
        }
        Ok(())
    }

    /// Reads one raw response frame and validates it against the server
    /// response shape (`Code`/`Status`/`Data` required, `Info` optional).
    pub fn read_response(&mut self) -> Result<ServerResponse> {
        let raw = self.read()?;
        let value: Value =
            serde_json::from_str(&raw).map_err(|e| MensagoError::InvalidJson(e.to_string()))?;

        let code = value
            .get("Code")
            .and_then(Value::as_u64)
            .ok_or_else(|| MensagoError::InvalidMessage("missing Code field".into()))?
            as u16;
        let status = value
            .get("Status")
            .and_then(Value::as_str)
            .ok_or_else(|| MensagoError::InvalidMessage("missing Status field".into()))?
            .to_string();
        let data = value
            .get("Data")
            .cloned()
            .ok_or_else(|| MensagoError::InvalidMessage("missing Data field".into()))?;
        if !data.is_object() {
            return Err(MensagoError::InvalidMessage("Data is not an object".into()));
        }
        let info = value
            .get("Info")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        tracing::trace!(code, %status, "received response");
        Ok(ServerResponse {
            code,
            status,
            info,
            data,
        })
    }

    /// Raw read of up to [`READ_BUFFER_SIZE`] bytes, decoded as UTF-8. Used
    /// by [`Self::read_response`] and directly by the streaming commands for
    /// the payload body that follows a `100`/`200` response.
    pub fn read(&mut self) -> Result<String> {
        let stream = self
            .socket
            .as_mut()
            .ok_or_else(|| MensagoError::NetworkError("not connected".into()))?;
        let mut buf = vec![0u8; READ_BUFFER_SIZE];
        let n = match stream.read(&mut buf) {
            Ok(n) => n,
            Err(e) => {
                self.socket = None;
                return Err(MensagoError::NetworkError(e.to_string()));
            }
        };
        if n == 0 {
            self.socket = None;
            return Err(MensagoError::NetworkError("connection closed".into()));
        }
        buf.truncate(n);
        String::from_utf8(buf).map_err(|e| MensagoError::InvalidMessage(e.to_string()))
    }

    /// Raw read returning bytes rather than text, for streamed file bodies.
    pub fn read_bytes(&mut self) -> Result<Vec<u8>> {
        let stream = self
            .socket
            .as_mut()
            .ok_or_else(|| MensagoError::NetworkError("not connected".into()))?;
        let mut buf = vec![0u8; READ_BUFFER_SIZE];
        let n = match stream.read(&mut buf) {
            Ok(n) => n,
            Err(e) => {
                self.socket = None;
                return Err(MensagoError::NetworkError(e.to_string()));
            }
        };
        if n == 0 {
            self.socket = None;
            return Err(MensagoError::NetworkError("connection closed".into()));
        }
        buf.truncate(n);
        Ok(buf)
    }

    /// Raw write of `text`, for the rare caller that needs to send something
    /// other than one framed JSON command (streaming command bodies do
    /// this directly against the socket instead).
    pub fn write(&mut self, text: &str) -> Result<()> {
        self.write_bytes(text.as_bytes())
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let stream = self
            .socket
            .as_mut()
            .ok_or_else(|| MensagoError::NetworkError("not connected".into()))?;
        if let Err(e) = stream.write_all(bytes) {
            self.socket = None;
            return Err(MensagoError::NetworkError(e.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader};
    use std::net::TcpListener;
    use std::thread;

    fn stub_server() -> (TcpListener, u16) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, port)
    }

    #[test]
    fn connect_absorbs_greeting_then_round_trips_a_command() {
        let (listener, port) = stub_server();

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            stream
                .write_all(b"{\"Name\":\"Mensago\",\"Version\":\"1.0\",\"Code\":200,\"Status\":\"OK\"}\r\n")
                .unwrap();

            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            assert!(line.contains("\"Action\":\"DUMMY\""));

            stream
                .write_all(b"{\"Code\":200,\"Status\":\"OK\",\"Info\":\"\",\"Data\":{}}\r\n")
                .unwrap();
        });

        let mut conn = ServerConnection::new();
        conn.connect("127.0.0.1", port).unwrap();
        assert!(conn.is_connected());

        conn.send_message(&serde_json::json!({"Action": "DUMMY", "Data": {}}))
            .unwrap();
        let response = conn.read_response().unwrap();
        assert_eq!(response.code, 200);
        assert!(response.is_success());

        handle.join().unwrap();
    }

    #[test]
    fn send_message_rejects_oversized_command() {
        let mut conn = ServerConnection::new();
        conn.socket = None;
        let huge = "x".repeat(MAX_COMMAND_SIZE);
        let err = conn
            .send_message(&serde_json::json!({"Action": "X", "Data": {"v": huge}}))
            .unwrap_err();
        assert!(matches!(err, MensagoError::MessageTooLarge(_)));
    }

    #[test]
    fn wrap_server_error_maps_known_code() {
        let response = ServerResponse {
            code: 408,
            status: "Resource Exists".into(),
            info: String::new(),
            data: serde_json::json!({}),
        };
        assert!(matches!(
            wrap_server_error(&response),
            MensagoError::Protocol(ProtocolCode::ResourceExists)
        ));
    }
}

//! # Client/Server Protocol Engine
//!
//! A line-delimited JSON protocol over a blocking TCP socket (port 2001 by
//! default).
//!
//! ```text
//! ┌────────────┐   {"Action":"LOGIN", ...}\n    ┌────────────┐
//! │   client   │ ──────────────────────────────▶│   server   │
//! │            │◀──────────────────────────────  │            │
//! └────────────┘   {"Code":200,"Status":"OK"}\n  └────────────┘
//! ```
//!
//! [`ServerConnection`] owns the socket and the request/response framing;
//! [`commands`] builds the individual command payloads; [`streaming`] layers
//! chunked upload/download/send on top with resume support.

pub mod codes;
pub mod commands;
pub mod connection;
pub mod streaming;

pub use codes::ProtocolCode;
pub use connection::ServerConnection;

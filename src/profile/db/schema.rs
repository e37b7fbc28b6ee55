//! # Profile Database Schema
//!
//! The table set a freshly created `storage.db` is initialized with:
//! workspaces, folders, device sessions, keys, keycard entries, messages,
//! contact info, user info, update-log records, and the simpler
//! `notes`/`files`/`photos`/`annotations` tables a note-taking and
//! file-index feature set needs.
//!
//! Notes on a couple of the less obvious columns:
//! - `keys` carries an explicit `algorithm` column rather than leaving it
//!   implicit in the key's CryptoString prefix, since it's also the
//!   table's lookup key and deserves to be queryable directly.
//! - an additional `config` key-value table persists small scalars (e.g.
//!   the update-sync cursor) without a second on-disk file for it.

use rusqlite::Connection;

use crate::error::Result;

const SETUP_STATEMENTS: &[&str] = &[
    r#"CREATE TABLE workspaces (
        wid TEXT NOT NULL UNIQUE,
        userid TEXT,
        domain TEXT,
        password TEXT,
        pwhashtype TEXT,
        type TEXT NOT NULL
    )"#,
    r#"CREATE TABLE folders (
        fid TEXT NOT NULL UNIQUE,
        address TEXT NOT NULL,
        keyid TEXT NOT NULL,
        path TEXT NOT NULL,
        permissions TEXT NOT NULL
    )"#,
    r#"CREATE TABLE sessions (
        address TEXT NOT NULL,
        devid TEXT NOT NULL,
        devname TEXT NOT NULL,
        public_key TEXT NOT NULL,
        private_key TEXT NOT NULL,
        os TEXT NOT NULL
    )"#,
    r#"CREATE TABLE keys (
        keyid TEXT NOT NULL UNIQUE,
        address TEXT NOT NULL,
        type TEXT NOT NULL,
        category TEXT NOT NULL,
        private TEXT NOT NULL,
        public TEXT,
        algorithm TEXT NOT NULL,
        timestamp TEXT NOT NULL
    )"#,
    r#"CREATE TABLE keycards (
        rowid INTEGER PRIMARY KEY AUTOINCREMENT,
        owner TEXT NOT NULL,
        "index" INTEGER,
        type TEXT NOT NULL,
        entry BLOB NOT NULL,
        textentry TEXT NOT NULL,
        hash TEXT NOT NULL,
        expires TEXT NOT NULL,
        timestamp TEXT NOT NULL
    )"#,
    r#"CREATE TABLE messages (
        id TEXT NOT NULL UNIQUE,
        "from" TEXT NOT NULL,
        address TEXT NOT NULL,
        cc TEXT,
        bcc TEXT,
        date TEXT NOT NULL,
        thread_id TEXT NOT NULL,
        subject TEXT,
        body TEXT,
        attachments TEXT
    )"#,
    r#"CREATE TABLE contactinfo (
        id TEXT NOT NULL,
        fieldname TEXT NOT NULL,
        fieldvalue TEXT,
        contactgroup TEXT
    )"#,
    r#"CREATE TABLE userinfo (
        fieldname TEXT NOT NULL,
        fieldvalue TEXT
    )"#,
    r#"CREATE TABLE annotations (
        id TEXT NOT NULL,
        target_id TEXT NOT NULL,
        text TEXT,
        created TEXT NOT NULL
    )"#,
    r#"CREATE TABLE updates (
        id TEXT NOT NULL UNIQUE,
        type TEXT NOT NULL,
        data TEXT NOT NULL,
        time TEXT NOT NULL
    )"#,
    r#"CREATE TABLE photos (
        id TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL,
        path TEXT NOT NULL,
        width INTEGER,
        height INTEGER,
        created TEXT NOT NULL
    )"#,
    r#"CREATE TABLE notes (
        id TEXT NOT NULL UNIQUE,
        title TEXT,
        body TEXT,
        created TEXT NOT NULL,
        updated TEXT
    )"#,
    r#"CREATE TABLE files (
        id TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL,
        path TEXT NOT NULL,
        size INTEGER NOT NULL,
        hash TEXT,
        created TEXT NOT NULL
    )"#,
    r#"CREATE TABLE config (
        key TEXT NOT NULL UNIQUE,
        value TEXT
    )"#,
];

/// Runs the full set of `CREATE TABLE` statements against a fresh
/// connection. Callers are expected to have already confirmed `db` points
/// at an empty database (see [`super::reset`]).
pub fn initialize(conn: &Connection) -> Result<()> {
    for statement in SETUP_STATEMENTS {
        conn.execute(statement, [])?;
    }
    Ok(())
}

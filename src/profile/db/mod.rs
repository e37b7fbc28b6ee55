//! Profile database connection management: schema initialization and a
//! small typed key-value config table (used for bookkeeping like the
//! update-sync cursor).

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;

pub mod schema;

/// Opens `path`, creating and initializing a fresh schema if the file
/// doesn't exist yet.
pub fn open(path: &Path) -> Result<Connection> {
    let is_new = !path.exists();
    let conn = Connection::open(path)?;
    if is_new {
        schema::initialize(&conn)?;
    }
    Ok(conn)
}

/// Deletes and recreates `path` with a fresh, empty schema.
pub fn reset(path: &Path) -> Result<Connection> {
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    let conn = Connection::open(path)?;
    schema::initialize(&conn)?;
    Ok(conn)
}

pub fn config_get(conn: &Connection, key: &str) -> Result<Option<String>> {
    Ok(conn
        .query_row(
            "SELECT value FROM config WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?)
}

pub fn config_set(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO config (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_initializes_schema_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("storage.db");
        let conn = open(&path).unwrap();
        conn.execute("INSERT INTO config (key, value) VALUES ('x', 'y')", [])
            .unwrap();
        drop(conn);

        let conn = open(&path).unwrap();
        assert_eq!(config_get(&conn, "x").unwrap(), Some("y".to_string()));
    }

    #[test]
    fn config_set_overwrites_existing_key() {
        let dir = tempdir().unwrap();
        let conn = open(&dir.path().join("storage.db")).unwrap();
        config_set(&conn, "last_update", "100").unwrap();
        config_set(&conn, "last_update", "200").unwrap();
        assert_eq!(
            config_get(&conn, "last_update").unwrap(),
            Some("200".to_string())
        );
    }

    #[test]
    fn reset_wipes_existing_data() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("storage.db");
        let conn = open(&path).unwrap();
        config_set(&conn, "k", "v").unwrap();
        drop(conn);

        let conn = reset(&path).unwrap();
        assert_eq!(config_get(&conn, "k").unwrap(), None);
    }
}

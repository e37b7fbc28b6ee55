//! Update-log synchronization: pages through `IDLE`/`GETUPDATES` and
//! persists each record into the profile's `updates` table.

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;
use crate::protocol::commands::{getupdates, idle};
use crate::protocol::connection::ServerConnection;

use super::db;

/// The kind of server-side change an update record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateType {
    Create,
    Move,
    Delete,
    Rotate,
}

impl UpdateType {
    pub fn as_str(self) -> &'static str {
        match self {
            UpdateType::Create => "Create",
            UpdateType::Move => "Move",
            UpdateType::Delete => "Delete",
            UpdateType::Rotate => "Rotate",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "Create" => Ok(UpdateType::Create),
            "Move" => Ok(UpdateType::Move),
            "Delete" => Ok(UpdateType::Delete),
            "Rotate" => Ok(UpdateType::Rotate),
            other => Err(crate::error::MensagoError::BadData(format!(
                "unknown update type: {other}"
            ))),
        }
    }
}

/// Pages through every outstanding update the server reports and persists
/// each one, advancing the `last_update` config key only after the full
/// count has been drained. Returns how many new records were persisted
/// (records already seen, by `id`, are skipped rather than re-inserted).
pub fn sync_updates(conn: &mut ServerConnection, db: &Connection) -> Result<u64> {
    let last_check: u64 = db::config_get(db, "last_update")?
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);

    let outstanding = idle(conn, last_check)?;
    if outstanding == 0 {
        db::config_set(db, "last_update", &now_epoch().to_string())?;
        return Ok(0);
    }

    let mut cursor = last_check;
    let mut persisted = 0u64;
    let mut received_total = 0u64;

    loop {
        let (records, total) = getupdates(conn, cursor)?;
        if records.is_empty() {
            break;
        }

        for record in &records {
            received_total += 1;

            let exists: Option<String> = db
                .query_row(
                    "SELECT id FROM updates WHERE id = ?1",
                    params![record.id],
                    |row| row.get(0),
                )
                .optional()?;
            if exists.is_some() {
                cursor = record.time;
                continue;
            }

            UpdateType::parse(&record.update_type)?;
            db.execute(
                "INSERT INTO updates (id, type, data, time) VALUES (?1, ?2, ?3, ?4)",
                params![record.id, record.update_type, record.data, record.time.to_string()],
            )?;
            persisted += 1;
            cursor = record.time;
        }

        if received_total >= total {
            break;
        }
    }

    db::config_set(db, "last_update", &now_epoch().to_string())?;
    Ok(persisted)
}

fn now_epoch() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_type_round_trips() {
        for kind in [
            UpdateType::Create,
            UpdateType::Move,
            UpdateType::Delete,
            UpdateType::Rotate,
        ] {
            assert_eq!(UpdateType::parse(kind.as_str()).unwrap(), kind);
        }
    }

    #[test]
    fn update_type_rejects_unknown_string() {
        assert!(UpdateType::parse("Explode").is_err());
    }
}

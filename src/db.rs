use std::time::Duration;

use rusqlite::{params, Connection, DatabaseName, OptionalExtension, Result};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::domain::{EncodedImage, Position, Spot};

pub const CURRENT_SCHEMA_VERSION: i64 = 2;

struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

// Additive only: never drop or rekey a table that already holds spots.
const MIGRATIONS: [Migration; 2] = [
    Migration {
        version: 1,
        name: "baseline_spot_store_v1",
        sql: r#"
CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS spots (
    id TEXT PRIMARY KEY,
    lat REAL NOT NULL,
    lng REAL NOT NULL,
    title TEXT NOT NULL DEFAULT '',
    description TEXT NOT NULL DEFAULT '',
    images_json TEXT NOT NULL DEFAULT '[]',
    cover_index INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL
);
"#,
    },
    Migration {
        version: 2,
        name: "spot_created_at_index_v1",
        sql: r#"
CREATE INDEX IF NOT EXISTS idx_spots_created_at ON spots(created_at);
"#,
    },
];

pub fn open_connection(path: &str) -> Result<Connection> {
    let mut conn = Connection::open(path)?;
    configure_for_speed(&conn)?;
    apply_migrations(&mut conn)?;
    Ok(conn)
}

fn configure_for_speed(conn: &Connection) -> Result<()> {
    conn.pragma_update(None::<DatabaseName>, "journal_mode", "WAL")?;
    conn.pragma_update(None::<DatabaseName>, "synchronous", "NORMAL")?;
    conn.pragma_update(None::<DatabaseName>, "temp_store", "MEMORY")?;
    conn.pragma_update(None::<DatabaseName>, "busy_timeout", 5000i64)?;
    conn.busy_timeout(Duration::from_millis(5000))?;
    Ok(())
}

fn apply_migrations(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at TEXT NOT NULL
);
"#,
    )?;

    for migration in MIGRATIONS {
        let already_applied: Option<i64> = tx
            .query_row(
                "SELECT version FROM schema_migrations WHERE version = ?1",
                params![migration.version],
                |row| row.get(0),
            )
            .optional()?;

        if already_applied.is_some() {
            continue;
        }

        tx.execute_batch(migration.sql)?;
        tx.execute(
            "INSERT INTO schema_migrations (version, name, applied_at) VALUES (?1, ?2, ?3)",
            params![migration.version, migration.name, now_utc_rfc3339()],
        )?;
    }

    tx.execute(
        r#"
INSERT INTO meta (key, value)
VALUES ('schema_version', ?1)
ON CONFLICT(key) DO UPDATE SET value = excluded.value
"#,
        params![CURRENT_SCHEMA_VERSION.to_string()],
    )?;

    tx.commit()
}

pub fn now_utc_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| OffsetDateTime::now_utc().unix_timestamp().to_string())
}

/// A `spots` row before the images column is decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct SpotRow {
    pub id: String,
    pub lat: f64,
    pub lng: f64,
    pub title: String,
    pub description: String,
    pub images_json: String,
    pub cover_index: i64,
    pub created_at: i64,
}

impl SpotRow {
    pub fn into_spot(self) -> std::result::Result<Spot, serde_json::Error> {
        let images: Vec<EncodedImage> = serde_json::from_str(&self.images_json)?;
        let mut spot = Spot {
            id: self.id,
            position: Position::new(self.lat, self.lng),
            title: self.title,
            description: self.description,
            images,
            cover_index: usize::try_from(self.cover_index).unwrap_or(0),
            created_at: self.created_at,
        };
        spot.normalize_cover();
        Ok(spot)
    }
}

fn spot_row(row: &rusqlite::Row<'_>) -> Result<SpotRow> {
    Ok(SpotRow {
        id: row.get(0)?,
        lat: row.get(1)?,
        lng: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        images_json: row.get(5)?,
        cover_index: row.get(6)?,
        created_at: row.get(7)?,
    })
}

pub fn upsert_spot(conn: &Connection, spot: &Spot) -> Result<()> {
    let images_json = serde_json::to_string(&spot.images)
        .map_err(|err| rusqlite::Error::ToSqlConversionFailure(Box::new(err)))?;
    let cover_index = i64::try_from(spot.cover_index).unwrap_or(0);
    conn.execute(
        r#"
INSERT INTO spots (
    id, lat, lng, title, description, images_json, cover_index, created_at
)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
ON CONFLICT(id) DO UPDATE SET
    lat = excluded.lat,
    lng = excluded.lng,
    title = excluded.title,
    description = excluded.description,
    images_json = excluded.images_json,
    cover_index = excluded.cover_index,
    created_at = excluded.created_at
"#,
        params![
            spot.id,
            spot.position.lat,
            spot.position.lng,
            spot.title,
            spot.description,
            images_json,
            cover_index,
            spot.created_at
        ],
    )?;
    Ok(())
}

#[cfg(test)]
pub fn get_spot(conn: &Connection, id: &str) -> Result<Option<SpotRow>> {
    conn.query_row(
        r#"
SELECT id, lat, lng, title, description, images_json, cover_index, created_at
FROM spots
WHERE id = ?1
"#,
        params![id],
        spot_row,
    )
    .optional()
}

pub fn list_spots(conn: &Connection) -> Result<Vec<SpotRow>> {
    let mut stmt = conn.prepare(
        r#"
SELECT id, lat, lng, title, description, images_json, cover_index, created_at
FROM spots
ORDER BY created_at ASC, rowid ASC
"#,
    )?;

    let mut rows = stmt.query([])?;
    let mut result = Vec::new();
    while let Some(row) = rows.next()? {
        result.push(spot_row(row)?);
    }

    Ok(result)
}

pub fn count_spots(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM spots", [], |row| row.get(0))
}

pub fn delete_spot(conn: &Connection, id: &str) -> Result<bool> {
    let removed = conn.execute("DELETE FROM spots WHERE id = ?1", params![id])?;
    Ok(removed > 0)
}

pub fn get_meta(conn: &Connection, key: &str) -> Result<Option<String>> {
    conn.query_row(
        "SELECT value FROM meta WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
}

pub fn set_meta(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        r#"
INSERT INTO meta (key, value)
VALUES (?1, ?2)
ON CONFLICT(key) DO UPDATE SET value = excluded.value
"#,
        params![key, value],
    )?;
    Ok(())
}

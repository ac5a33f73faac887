use std::error::Error;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use tracing::{debug, warn};

use crate::db;
use crate::domain::Spot;

/// Durable, id-keyed spot storage backed by SQLite. Every call hops onto the
/// blocking pool so the caller's control flow never waits on disk I/O.
#[derive(Clone)]
pub struct SpotStore {
    conn: Arc<Mutex<Connection>>,
}

#[derive(Debug)]
pub enum StoreFault {
    Db(rusqlite::Error),
    Io(std::io::Error),
    Worker(String),
}

impl fmt::Display for StoreFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreFault::Db(err) => write!(f, "database error: {}", err),
            StoreFault::Io(err) => write!(f, "I/O error: {}", err),
            StoreFault::Worker(message) => write!(f, "store worker error: {}", message),
        }
    }
}

impl Error for StoreFault {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            StoreFault::Db(err) => Some(err),
            StoreFault::Io(err) => Some(err),
            StoreFault::Worker(_) => None,
        }
    }
}

impl From<rusqlite::Error> for StoreFault {
    fn from(value: rusqlite::Error) -> Self {
        StoreFault::Db(value)
    }
}

impl From<std::io::Error> for StoreFault {
    fn from(value: std::io::Error) -> Self {
        StoreFault::Io(value)
    }
}

#[derive(Debug)]
pub enum StoreError {
    Unavailable(StoreFault),
    ReadFailed(StoreFault),
    WriteFailed { id: String, source: StoreFault },
    DeleteFailed { id: String, source: StoreFault },
    Corrupt { id: String, reason: String },
    Closed,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Unavailable(err) => write!(f, "spot store unavailable: {}", err),
            StoreError::ReadFailed(err) => write!(f, "spot store read failed: {}", err),
            StoreError::WriteFailed { id, source } => {
                write!(f, "failed to write spot '{}': {}", id, source)
            }
            StoreError::DeleteFailed { id, source } => {
                write!(f, "failed to delete spot '{}': {}", id, source)
            }
            StoreError::Corrupt { id, reason } => {
                write!(f, "stored spot '{}' is corrupt: {}", id, reason)
            }
            StoreError::Closed => write!(f, "spot write queue is closed"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            StoreError::Unavailable(err) => Some(err),
            StoreError::ReadFailed(err) => Some(err),
            StoreError::WriteFailed { source, .. } => Some(source),
            StoreError::DeleteFailed { source, .. } => Some(source),
            StoreError::Corrupt { .. } => None,
            StoreError::Closed => None,
        }
    }
}

impl SpotStore {
    /// Opens the database at `path`, creating the file, its parent directory
    /// and the schema when missing. Safe to call repeatedly.
    pub async fn open_or_create(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let target = path.clone();
        let conn = tokio::task::spawn_blocking(move || -> Result<Connection, StoreFault> {
            ensure_parent_dir(&target)?;
            let raw = target
                .to_str()
                .ok_or_else(|| StoreFault::Worker("database path is not UTF-8".to_string()))?;
            Ok(db::open_connection(raw)?)
        })
        .await
        .map_err(|err| StoreError::Unavailable(StoreFault::Worker(err.to_string())))?
        .map_err(StoreError::Unavailable)?;

        debug!(path = %path.display(), "spot store opened");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Every stored spot in creation order. Never fails: read errors are
    /// logged and yield an empty list, corrupt rows are skipped one by one.
    pub async fn get_all(&self) -> Vec<Spot> {
        match self.try_get_all().await {
            Ok(spots) => spots,
            Err(err) => {
                warn!(error = %err, "reading spots failed; continuing with none");
                Vec::new()
            }
        }
    }

    pub async fn try_get_all(&self) -> Result<Vec<Spot>, StoreError> {
        let rows = self
            .call(db::list_spots)
            .await
            .map_err(StoreError::ReadFailed)?;
        let mut spots = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row.id.clone();
            match row.into_spot() {
                Ok(spot) => spots.push(spot),
                Err(err) => {
                    let err = StoreError::Corrupt {
                        id,
                        reason: err.to_string(),
                    };
                    warn!(error = %err, "skipping unreadable spot");
                }
            }
        }
        Ok(spots)
    }

    #[cfg(test)]
    pub async fn get(&self, id: &str) -> Result<Option<Spot>, StoreError> {
        let key = id.to_string();
        let row = self
            .call(move |conn| db::get_spot(conn, &key))
            .await
            .map_err(StoreError::ReadFailed)?;
        match row {
            Some(row) => row.into_spot().map(Some).map_err(|err| StoreError::Corrupt {
                id: id.to_string(),
                reason: err.to_string(),
            }),
            None => Ok(None),
        }
    }

    pub async fn count(&self) -> Result<i64, StoreError> {
        self.call(db::count_spots)
            .await
            .map_err(StoreError::ReadFailed)
    }

    /// Inserts or fully replaces the record for `spot.id`. Last write wins.
    pub async fn put(&self, spot: Spot) -> Result<(), StoreError> {
        let id = spot.id.clone();
        self.call(move |conn| db::upsert_spot(conn, &spot))
            .await
            .map_err(|source| {
                let err = StoreError::WriteFailed { id, source };
                warn!(error = %err, "spot write failed");
                err
            })
    }

    /// Deletes the record if present. Returns whether a row existed.
    pub async fn remove(&self, id: &str) -> Result<bool, StoreError> {
        let key = id.to_string();
        self.call(move |conn| db::delete_spot(conn, &key))
            .await
            .map_err(|source| {
                let err = StoreError::DeleteFailed {
                    id: id.to_string(),
                    source,
                };
                warn!(error = %err, "spot delete failed");
                err
            })
    }

    pub async fn meta(&self, key: &str) -> Result<Option<String>, StoreError> {
        let key = key.to_string();
        self.call(move |conn| db::get_meta(conn, &key))
            .await
            .map_err(StoreError::ReadFailed)
    }

    pub async fn set_meta(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let owned_key = key.to_string();
        let value = value.to_string();
        self.call(move |conn| db::set_meta(conn, &owned_key, &value))
            .await
            .map_err(|source| StoreError::WriteFailed {
                id: format!("meta:{}", key),
                source,
            })
    }

    async fn call<T, F>(&self, op: F) -> Result<T, StoreFault>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| StoreFault::Worker("connection lock poisoned".to_string()))?;
            op(&guard).map_err(StoreFault::Db)
        })
        .await
        .map_err(|err| StoreFault::Worker(err.to_string()))?
    }
}

fn ensure_parent_dir(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests;

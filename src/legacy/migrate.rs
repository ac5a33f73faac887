use std::collections::HashSet;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::db::now_utc_rfc3339;
use crate::store::SpotStore;

use super::errors::LegacyError;
use super::slot::LegacySlot;

pub const META_IMPORT_SHA256: &str = "legacy_import_sha256";
pub const META_IMPORT_COUNT: &str = "legacy_import_count";
pub const META_IMPORTED_AT: &str = "legacy_imported_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationStatus {
    StoreNotEmpty,
    NoSnapshot,
    AlreadyImported,
    Completed,
    Partial,
    Failed,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MigrationSummary {
    pub status: MigrationStatus,
    pub processed_count: u64,
    pub imported_count: u64,
    pub duplicate_count: u64,
    pub error_count: u64,
    pub snapshot_deleted: bool,
    pub last_error: Option<String>,
}

impl MigrationSummary {
    fn with_status(status: MigrationStatus) -> Self {
        Self {
            status,
            processed_count: 0,
            imported_count: 0,
            duplicate_count: 0,
            error_count: 0,
            snapshot_deleted: false,
            last_error: None,
        }
    }
}

/// One-shot importer from the legacy flat snapshot into the spot store.
/// Only runs against an empty store; the snapshot is deleted once every
/// record has been written.
pub struct LegacyMigrator<'a> {
    store: &'a SpotStore,
    slot: &'a LegacySlot,
}

impl<'a> LegacyMigrator<'a> {
    pub fn new(store: &'a SpotStore, slot: &'a LegacySlot) -> Self {
        Self { store, slot }
    }

    /// Never fails; anything that goes wrong is logged and reported in the
    /// summary so startup can carry on.
    pub async fn run(&self) -> MigrationSummary {
        match self.try_run().await {
            Ok(summary) => summary,
            Err(err) => {
                error!(
                    error = %err,
                    slot = %self.slot.path().display(),
                    "legacy migration aborted; snapshot left in place"
                );
                let mut summary = MigrationSummary::with_status(MigrationStatus::Failed);
                summary.last_error = Some(err.to_string());
                summary
            }
        }
    }

    async fn try_run(&self) -> Result<MigrationSummary, LegacyError> {
        if self.store.count().await? > 0 {
            return Ok(MigrationSummary::with_status(MigrationStatus::StoreNotEmpty));
        }

        let snapshot = match self.slot.read()? {
            Some(snapshot) if !snapshot.is_blank() => snapshot,
            _ => return Ok(MigrationSummary::with_status(MigrationStatus::NoSnapshot)),
        };

        let fingerprint = snapshot.fingerprint();
        if self.store.meta(META_IMPORT_SHA256).await?.as_deref() == Some(fingerprint.as_str()) {
            // Imported before and since emptied by the user; do not resurrect.
            self.slot.delete()?;
            let mut summary = MigrationSummary::with_status(MigrationStatus::AlreadyImported);
            summary.snapshot_deleted = true;
            return Ok(summary);
        }

        let spots = snapshot.parse()?;
        let mut summary = MigrationSummary::with_status(MigrationStatus::Completed);
        let mut written = HashSet::new();
        for spot in spots {
            summary.processed_count += 1;
            let id = spot.id.clone();
            if id.trim().is_empty() {
                summary.error_count += 1;
                summary.last_error = Some(format!(
                    "record {}: spot id cannot be empty",
                    summary.processed_count
                ));
                continue;
            }
            match self.store.put(spot).await {
                Ok(()) => {
                    if written.insert(id.clone()) {
                        summary.imported_count += 1;
                    } else {
                        // Later records replace earlier ones with the same id.
                        summary.duplicate_count += 1;
                        warn!(spot_id = %id, "duplicate id in legacy snapshot");
                    }
                }
                Err(err) => {
                    summary.error_count += 1;
                    summary.last_error = Some(format!("spot {}: {}", id, err));
                }
            }
        }

        if summary.error_count > 0 {
            summary.status = MigrationStatus::Partial;
            warn!(
                imported = summary.imported_count,
                errors = summary.error_count,
                "legacy migration incomplete; snapshot kept"
            );
            return Ok(summary);
        }

        self.record_import(&fingerprint, summary.imported_count).await;
        match self.slot.delete() {
            Ok(()) => summary.snapshot_deleted = true,
            Err(err) => {
                warn!(error = %err, "legacy snapshot imported but could not be deleted");
                summary.last_error = Some(err.to_string());
            }
        }
        info!(
            imported = summary.imported_count,
            duplicates = summary.duplicate_count,
            "legacy snapshot migrated"
        );
        Ok(summary)
    }

    /// Bookkeeping only; the spots are already stored, so a failure here
    /// does not undo the import.
    async fn record_import(&self, fingerprint: &str, count: u64) {
        let entries = [
            (META_IMPORT_SHA256, fingerprint.to_string()),
            (META_IMPORT_COUNT, count.to_string()),
            (META_IMPORTED_AT, now_utc_rfc3339()),
        ];
        for (key, value) in entries {
            if let Err(err) = self.store.set_meta(key, &value).await {
                warn!(key, error = %err, "legacy import bookkeeping not recorded");
            }
        }
    }
}

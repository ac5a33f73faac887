mod errors;
mod migrate;
mod slot;
#[cfg(test)]
mod tests;

pub use migrate::{
    LegacyMigrator, MigrationStatus, MigrationSummary, META_IMPORTED_AT, META_IMPORT_COUNT,
    META_IMPORT_SHA256,
};
pub use slot::LegacySlot;

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::domain::Spot;

use super::errors::LegacyError;

/// The old flat storage slot: one file holding a JSON array of spot-shaped
/// objects.
#[derive(Debug, Clone)]
pub struct LegacySlot {
    path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct LegacySnapshot {
    pub raw: String,
}

impl LegacySlot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> Result<Option<LegacySnapshot>, LegacyError> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => Ok(Some(LegacySnapshot { raw })),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(LegacyError::Io(err)),
        }
    }

    pub fn delete(&self) -> Result<(), LegacyError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(LegacyError::Io(err)),
        }
    }
}

impl LegacySnapshot {
    pub fn is_blank(&self) -> bool {
        self.raw.trim().is_empty()
    }

    pub fn parse(&self) -> Result<Vec<Spot>, LegacyError> {
        let mut spots: Vec<Spot> = serde_json::from_str(&self.raw)?;
        for spot in &mut spots {
            spot.normalize_cover();
        }
        Ok(spots)
    }

    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.raw.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

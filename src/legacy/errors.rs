use std::error::Error;
use std::fmt;

use crate::store::StoreError;

#[derive(Debug)]
pub enum LegacyError {
    Io(std::io::Error),
    ParseFailed(serde_json::Error),
    Store(StoreError),
}

impl fmt::Display for LegacyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LegacyError::Io(err) => write!(f, "legacy snapshot I/O error: {}", err),
            LegacyError::ParseFailed(err) => write!(f, "legacy snapshot is malformed: {}", err),
            LegacyError::Store(err) => write!(f, "{}", err),
        }
    }
}

impl Error for LegacyError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            LegacyError::Io(err) => Some(err),
            LegacyError::ParseFailed(err) => Some(err),
            LegacyError::Store(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for LegacyError {
    fn from(value: std::io::Error) -> Self {
        LegacyError::Io(value)
    }
}

impl From<serde_json::Error> for LegacyError {
    fn from(value: serde_json::Error) -> Self {
        LegacyError::ParseFailed(value)
    }
}

impl From<StoreError> for LegacyError {
    fn from(value: StoreError) -> Self {
        LegacyError::Store(value)
    }
}

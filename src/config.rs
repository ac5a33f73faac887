use std::error::Error;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::describe::{DEFAULT_INSTRUCTION, DEFAULT_TIMEOUT};
use crate::media::DEFAULT_MAX_IMAGE_BYTES;

pub const CONFIG_FILE_NAME: &str = "config.toml";
const DEFAULT_DB_FILE: &str = "spots.sqlite";
const DEFAULT_LEGACY_SNAPSHOT: &str = "legacy/spots.json";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    db_file: Option<PathBuf>,
    legacy_snapshot: Option<PathBuf>,
    max_image_bytes: Option<usize>,
    describe_command: Option<Vec<String>>,
    describe_instruction: Option<String>,
    describe_timeout_secs: Option<u64>,
    log_filter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub legacy_snapshot: PathBuf,
    pub max_image_bytes: usize,
    pub describe_command: Option<Vec<String>>,
    pub describe_instruction: String,
    pub describe_timeout: Duration,
    pub log_filter: Option<String>,
}

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Toml(toml::de::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "could not read config {}: {}", path.display(), source)
            }
            ConfigError::Toml(err) => write!(f, "invalid config TOML: {}", err),
            ConfigError::Invalid(message) => write!(f, "invalid config: {}", message),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Toml(err) => Some(err),
            ConfigError::Invalid(_) => None,
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        ConfigError::Toml(value)
    }
}

impl Config {
    /// Defaults for `data_dir`, as if an empty config file were present.
    pub fn defaults(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            db_path: data_dir.join(DEFAULT_DB_FILE),
            legacy_snapshot: data_dir.join(DEFAULT_LEGACY_SNAPSHOT),
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            describe_command: None,
            describe_instruction: DEFAULT_INSTRUCTION.to_string(),
            describe_timeout: DEFAULT_TIMEOUT,
            log_filter: None,
            data_dir,
        }
    }

    /// Loads `explicit`, or `<data_dir>/config.toml` when it exists. An
    /// explicitly named file must exist; the implicit one is optional.
    pub fn load(data_dir: &Path, explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = match explicit {
            Some(path) => (path.to_path_buf(), true),
            None => (data_dir.join(CONFIG_FILE_NAME), false),
        };

        let raw = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound && !required => {
                return Ok(Self::defaults(data_dir));
            }
            Err(source) => return Err(ConfigError::Io { path, source }),
        };
        Self::from_toml(data_dir, &raw)
    }

    pub(crate) fn from_toml(data_dir: &Path, raw: &str) -> Result<Self, ConfigError> {
        let parsed: RawConfig = toml::from_str(raw)?;
        normalize(data_dir, parsed)
    }
}

fn normalize(data_dir: &Path, raw: RawConfig) -> Result<Config, ConfigError> {
    let max_image_bytes = raw.max_image_bytes.unwrap_or(DEFAULT_MAX_IMAGE_BYTES);
    if max_image_bytes == 0 {
        return Err(ConfigError::Invalid(
            "max_image_bytes must be greater than zero".to_string(),
        ));
    }

    let describe_timeout_secs = raw
        .describe_timeout_secs
        .unwrap_or(DEFAULT_TIMEOUT.as_secs());
    if describe_timeout_secs == 0 {
        return Err(ConfigError::Invalid(
            "describe_timeout_secs must be greater than zero".to_string(),
        ));
    }

    let describe_command = match raw.describe_command {
        None => None,
        Some(argv) if argv.is_empty() => None,
        Some(argv) => {
            if argv[0].trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "describe_command must start with a program name".to_string(),
                ));
            }
            Some(argv)
        }
    };

    Ok(Config {
        data_dir: data_dir.to_path_buf(),
        db_path: resolve(data_dir, raw.db_file, DEFAULT_DB_FILE),
        legacy_snapshot: resolve(data_dir, raw.legacy_snapshot, DEFAULT_LEGACY_SNAPSHOT),
        max_image_bytes,
        describe_command,
        describe_instruction: raw
            .describe_instruction
            .and_then(|value| non_empty(&value))
            .unwrap_or_else(|| DEFAULT_INSTRUCTION.to_string()),
        describe_timeout: Duration::from_secs(describe_timeout_secs),
        log_filter: raw.log_filter.and_then(|value| non_empty(&value)),
    })
}

fn resolve(data_dir: &Path, configured: Option<PathBuf>, default: &str) -> PathBuf {
    let path = configured.unwrap_or_else(|| PathBuf::from(default));
    if path.is_absolute() {
        path
    } else {
        data_dir.join(path)
    }
}

fn non_empty(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

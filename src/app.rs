use std::error::Error;
use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use tracing::warn;

use crate::config::{Config, ConfigError};
use crate::db::CURRENT_SCHEMA_VERSION;
use crate::describe::{CommandDescriber, DescriptionError};
use crate::domain::{Position, Spot, SpotPatch};
use crate::input::{InputEvent, DEFAULT_HIT_RADIUS};
use crate::legacy::{
    LegacySlot, MigrationSummary, META_IMPORTED_AT, META_IMPORT_COUNT, META_IMPORT_SHA256,
};
use crate::markers::{RenderedMarker, TextMap};
use crate::media::{DataUrlPipeline, ImageError, RawImage};
use crate::persist::WriteStats;
use crate::repository::SpotRepository;
use crate::session::{DescriptionOutcome, MapSession, Notice, UploadReport};
use crate::spot_id::{resolve_spot_ref, SpotRefError};
use crate::store::{SpotStore, StoreError};

/// One opened data directory: the store (when it could be opened) and a map
/// session over the loaded spots.
pub struct App {
    config: Config,
    store: Option<SpotStore>,
    session: MapSession<TextMap>,
    migration: Option<MigrationSummary>,
    durable: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LegacyImportStatus {
    pub sha256: Option<String>,
    pub count: Option<String>,
    pub imported_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub durable: bool,
    pub spot_count: usize,
    pub stored_spot_count: Option<i64>,
    pub schema_version: Option<String>,
    pub expected_schema_version: i64,
    pub legacy_snapshot_present: bool,
    pub legacy_import: Option<LegacyImportStatus>,
    pub migration: Option<MigrationSummary>,
    pub describe_configured: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClickOutcome {
    Selected(String),
    Created(Spot),
    Prompted(Position),
}

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Store(StoreError),
    Description(DescriptionError),
    SpotRef(SpotRefError),
    InvalidArgument(String),
}

impl App {
    /// Opens the store and loads spots. A store that cannot be opened is not
    /// fatal: the session runs memory-only and changes are not kept.
    pub async fn open(config: Config) -> Result<Self, AppError> {
        let store = match SpotStore::open_or_create(&config.db_path).await {
            Ok(store) => Some(store),
            Err(err) => {
                warn!(path = %config.db_path.display(), error = %err, "spot store unavailable");
                None
            }
        };
        let slot = LegacySlot::new(&config.legacy_snapshot);
        let (repo, report) = SpotRepository::load(store.clone(), &slot).await;
        Ok(Self {
            config,
            store,
            session: MapSession::new(repo, TextMap::new()),
            migration: report.migration,
            durable: report.durable,
        })
    }

    pub fn is_durable(&self) -> bool {
        self.durable
    }

    pub fn migration(&self) -> Option<&MigrationSummary> {
        self.migration.as_ref()
    }

    pub fn spots(&self) -> &[Spot] {
        self.session.spots()
    }

    pub fn resolve(&self, reference: &str) -> Result<String, AppError> {
        let ids = self.session.spots().iter().map(|spot| spot.id.as_str());
        Ok(resolve_spot_ref(ids, reference)?)
    }

    pub fn show(&self, reference: &str) -> Result<Spot, AppError> {
        let id = self.resolve(reference)?;
        self.spot(&id)
    }

    pub fn create(&mut self, position: Position, title: Option<&str>) -> Result<Spot, AppError> {
        require_valid(position)?;
        let spot = self.session.create_at(position);
        match title.map(str::trim).filter(|title| !title.is_empty()) {
            Some(title) => self.update_fields(&spot.id, SpotPatch::title(title)),
            None => Ok(spot),
        }
    }

    pub fn update(
        &mut self,
        reference: &str,
        title: Option<String>,
        description: Option<String>,
    ) -> Result<Spot, AppError> {
        let id = self.resolve(reference)?;
        let patch = SpotPatch {
            title,
            description,
            ..SpotPatch::default()
        };
        if !patch.has_changes() {
            return Err(AppError::InvalidArgument(
                "nothing to update; pass --title or --description".to_string(),
            ));
        }
        self.update_fields(&id, patch)
    }

    /// Deletes the spot and returns its id plus any notice about the store.
    pub async fn delete(&mut self, reference: &str) -> Result<(String, Vec<Notice>), AppError> {
        let id = self.resolve(reference)?;
        self.session.delete(&id).await;
        Ok((id, self.session.take_notices()))
    }

    /// Reads each file and runs it through the image pipeline. Unreadable
    /// files are reported alongside encoding failures.
    pub async fn add_images(
        &mut self,
        reference: &str,
        paths: &[PathBuf],
    ) -> Result<UploadReport, AppError> {
        let id = self.resolve(reference)?;
        let mut raw = Vec::with_capacity(paths.len());
        let mut unreadable = Vec::new();
        for path in paths {
            let label = path.display().to_string();
            match std::fs::read(path) {
                Ok(bytes) => raw.push(RawImage::new(label, bytes)),
                Err(err) => {
                    warn!(image = %label, error = %err, "image file unreadable");
                    unreadable.push((label, ImageError::Io(err)));
                }
            }
        }

        let pipeline = DataUrlPipeline::new(self.config.max_image_bytes);
        let mut report = self
            .session
            .upload_images(&id, raw, &pipeline)
            .await
            .ok_or_else(|| SpotRefError::NotFound(id.clone()))?;
        self.session.take_notices();
        report.failed.extend(unreadable);
        Ok(report)
    }

    pub fn remove_image(&mut self, reference: &str, index: usize) -> Result<Spot, AppError> {
        let id = self.resolve(reference)?;
        if !self.session.remove_image(&id, index) {
            return Err(index_error(&self.spot(&id)?, index));
        }
        self.spot(&id)
    }

    pub fn set_cover(&mut self, reference: &str, index: usize) -> Result<Spot, AppError> {
        let id = self.resolve(reference)?;
        let spot = self.spot(&id)?;
        if index >= spot.images.len() {
            return Err(index_error(&spot, index));
        }
        self.session.set_cover(&id, index);
        self.spot(&id)
    }

    /// Asks the configured description service about the spot's cover and
    /// stores the answer on that spot.
    pub async fn describe(&mut self, reference: &str) -> Result<Spot, AppError> {
        let id = self.resolve(reference)?;
        let argv = self
            .config
            .describe_command
            .as_deref()
            .ok_or(DescriptionError::NotConfigured)?;
        let service = CommandDescriber::from_argv(argv, self.config.describe_timeout)
            .ok_or(DescriptionError::NotConfigured)?;

        self.session.select(&id);
        let outcome = self
            .session
            .describe_selected(&service, &self.config.describe_instruction)
            .await;
        match outcome {
            DescriptionOutcome::Applied(_) => self.spot(&id),
            DescriptionOutcome::Discarded => Err(SpotRefError::NotFound(id).into()),
            DescriptionOutcome::Failed(err) => {
                // The returned error carries the same message as the notice.
                self.session.take_notices();
                Err(err.into())
            }
        }
    }

    /// Reconciles the headless map, optionally with one spot selected.
    pub fn markers(&mut self, select: Option<&str>) -> Result<Vec<RenderedMarker>, AppError> {
        if let Some(reference) = select {
            let id = self.resolve(reference)?;
            self.session.select(&id);
        }
        Ok(self.render_markers())
    }

    pub fn marker_lines(&self) -> Vec<String> {
        self.session.markers().backend().render_lines()
    }

    pub fn map_center(&self) -> Option<Position> {
        self.session.markers().backend().center()
    }

    /// Classifies a click against the drawn markers. A hit selects; a miss
    /// opens the create prompt, which `confirm` accepts.
    pub fn click(&mut self, position: Position, confirm: bool) -> Result<ClickOutcome, AppError> {
        require_valid(position)?;
        let event = self.session.classify_click(position, DEFAULT_HIT_RADIUS);
        if let InputEvent::MarkerClick(id) = &event {
            let id = id.clone();
            self.session.handle_input(event);
            return Ok(ClickOutcome::Selected(id));
        }

        self.session.handle_input(event);
        if !confirm {
            self.session.cancel_prompt();
            return Ok(ClickOutcome::Prompted(position));
        }
        match self.session.confirm_prompt() {
            Some(spot) => Ok(ClickOutcome::Created(spot)),
            None => Ok(ClickOutcome::Prompted(position)),
        }
    }

    /// Flushes queued writes first so the stored count reflects this run.
    pub async fn status(&self) -> StatusReport {
        self.session.flush().await;
        let mut schema_version = None;
        let mut legacy_import = None;
        let mut stored_spot_count = None;
        if let Some(store) = &self.store {
            stored_spot_count = store.count().await.ok();
            schema_version = store.meta("schema_version").await.ok().flatten();
            let sha256 = store.meta(META_IMPORT_SHA256).await.ok().flatten();
            if sha256.is_some() {
                legacy_import = Some(LegacyImportStatus {
                    sha256,
                    count: store.meta(META_IMPORT_COUNT).await.ok().flatten(),
                    imported_at: store.meta(META_IMPORTED_AT).await.ok().flatten(),
                });
            }
        }

        StatusReport {
            data_dir: self.config.data_dir.clone(),
            db_path: self.config.db_path.clone(),
            durable: self.is_durable(),
            spot_count: self.session.spots().len(),
            stored_spot_count,
            schema_version,
            expected_schema_version: CURRENT_SCHEMA_VERSION,
            legacy_snapshot_present: self.config.legacy_snapshot.exists(),
            legacy_import,
            migration: self.migration.clone(),
            describe_configured: self.config.describe_command.is_some(),
        }
    }

    /// Waits for every queued write and tears the map down.
    pub async fn close(self) -> WriteStats {
        self.session.close().await
    }

    fn spot(&self, id: &str) -> Result<Spot, AppError> {
        self.session
            .spot(id)
            .cloned()
            .ok_or_else(|| SpotRefError::NotFound(id.to_string()).into())
    }

    fn update_fields(&mut self, id: &str, patch: SpotPatch) -> Result<Spot, AppError> {
        self.session
            .update(id, patch)
            .ok_or_else(|| SpotRefError::NotFound(id.to_string()).into())
    }

    fn render_markers(&self) -> Vec<RenderedMarker> {
        self.session
            .markers()
            .backend()
            .markers()
            .into_iter()
            .cloned()
            .collect()
    }
}

fn require_valid(position: Position) -> Result<(), AppError> {
    if position.is_valid() {
        Ok(())
    } else {
        Err(AppError::InvalidArgument(format!(
            "coordinates out of range: lat {} lng {}",
            position.lat, position.lng
        )))
    }
}

fn index_error(spot: &Spot, index: usize) -> AppError {
    AppError::InvalidArgument(format!(
        "image index {} out of range; spot has {} image(s)",
        index,
        spot.images.len()
    ))
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "{}", err),
            AppError::Store(err) => write!(f, "store error: {}", err),
            AppError::Description(err) => write!(f, "{}", err),
            AppError::SpotRef(err) => write!(f, "{}", err),
            AppError::InvalidArgument(message) => write!(f, "{}", message),
        }
    }
}

impl Error for AppError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Store(err) => Some(err),
            AppError::Description(err) => Some(err),
            AppError::SpotRef(err) => Some(err),
            AppError::InvalidArgument(_) => None,
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        AppError::Config(value)
    }
}

impl From<StoreError> for AppError {
    fn from(value: StoreError) -> Self {
        AppError::Store(value)
    }
}

impl From<DescriptionError> for AppError {
    fn from(value: DescriptionError) -> Self {
        AppError::Description(value)
    }
}

impl From<SpotRefError> for AppError {
    fn from(value: SpotRefError) -> Self {
        AppError::SpotRef(value)
    }
}

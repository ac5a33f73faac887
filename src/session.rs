//! The map session: one context object that owns the spot repository, the
//! marker reconciler and the selection pointer for as long as a map view is
//! mounted.
//!
//! Every mutation goes through here so markers are reconciled right after the
//! collection or the selection changes. Slow external work (image encoding,
//! description requests) is split into a begin/finish pair tagged with the
//! target spot id, so a late result lands on the spot it was requested for
//! or is dropped if that spot is gone.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::describe::{DescriptionError, DescriptionService};
use crate::domain::{EncodedImage, Position, Spot, SpotPatch};
use crate::input::{classify_click, InputEvent};
use crate::markers::{MarkerBackend, ReconcileReport, Reconciler};
use crate::media::{ImageError, ImagePipeline, RawImage};
use crate::persist::WriteStats;
use crate::repository::SpotRepository;

#[derive(Debug, Clone, PartialEq)]
pub enum Prompt {
    ConfirmCreate(Position),
}

/// User-facing messages produced by absorbed failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    DeleteFailed { spot_id: String, message: String },
    DescriptionFailed { spot_id: String, message: String },
    ImagesSkipped { spot_id: String, failed: usize },
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Notice::DeleteFailed { spot_id, message } => write!(
                f,
                "spot {} was removed from the map but may still be on disk: {}",
                spot_id, message
            ),
            Notice::DescriptionFailed { message, .. } => {
                write!(f, "could not generate a description: {}", message)
            }
            Notice::ImagesSkipped { failed, .. } => {
                write!(f, "{} image(s) could not be added", failed)
            }
        }
    }
}

#[derive(Debug)]
pub struct UploadReport {
    pub spot_id: String,
    pub appended: usize,
    pub failed: Vec<(String, ImageError)>,
}

/// A description request bound to the spot that was active when it was made.
#[derive(Debug, Clone)]
pub struct DescriptionRequest {
    pub spot_id: String,
    pub image: EncodedImage,
}

#[derive(Debug)]
pub enum DescriptionOutcome {
    Applied(String),
    Discarded,
    Failed(DescriptionError),
}

pub struct MapSession<B: MarkerBackend> {
    repo: SpotRepository,
    markers: Reconciler<B>,
    selected: Option<String>,
    prompt: Option<Prompt>,
    notices: Vec<Notice>,
}

impl<B: MarkerBackend> MapSession<B> {
    pub fn new(repo: SpotRepository, backend: B) -> Self {
        let mut session = Self {
            repo,
            markers: Reconciler::new(backend),
            selected: None,
            prompt: None,
            notices: Vec::new(),
        };
        session.reconcile();
        session
    }

    pub fn spots(&self) -> &[Spot] {
        self.repo.spots()
    }

    pub fn spot(&self, id: &str) -> Option<&Spot> {
        self.repo.get(id)
    }

    #[cfg(test)]
    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn selected_spot(&self) -> Option<&Spot> {
        self.selected.as_deref().and_then(|id| self.repo.get(id))
    }

    #[cfg(test)]
    pub fn pending_prompt(&self) -> Option<&Prompt> {
        self.prompt.as_ref()
    }

    pub fn markers(&self) -> &Reconciler<B> {
        &self.markers
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn classify_click(&self, position: Position, radius: f64) -> InputEvent {
        classify_click(
            position,
            self.repo
                .spots()
                .iter()
                .map(|spot| (spot.id.as_str(), spot.position)),
            radius,
        )
    }

    /// Map clicks open a create prompt; marker clicks select their spot.
    pub fn handle_input(&mut self, event: InputEvent) -> Option<&Prompt> {
        match event {
            InputEvent::MapClick(position) => {
                self.prompt = Some(Prompt::ConfirmCreate(position));
                self.prompt.as_ref()
            }
            InputEvent::MarkerClick(spot_id) => {
                self.prompt = None;
                self.select(&spot_id);
                None
            }
        }
    }

    pub fn confirm_prompt(&mut self) -> Option<Spot> {
        match self.prompt.take()? {
            Prompt::ConfirmCreate(position) => Some(self.create_at(position)),
        }
    }

    pub fn cancel_prompt(&mut self) {
        self.prompt = None;
    }

    /// Creates a spot and selects it so it can be edited straight away.
    pub fn create_at(&mut self, position: Position) -> Spot {
        let spot = self.repo.create(position);
        self.selected = Some(spot.id.clone());
        self.markers.backend_mut().center_on(spot.position);
        self.reconcile();
        spot
    }

    pub fn select(&mut self, id: &str) -> bool {
        let Some(position) = self.repo.get(id).map(|spot| spot.position) else {
            return false;
        };
        self.selected = Some(id.to_string());
        self.markers.backend_mut().center_on(position);
        self.reconcile();
        true
    }

    #[cfg(test)]
    pub fn clear_selection(&mut self) {
        if self.selected.take().is_some() {
            self.reconcile();
        }
    }

    pub fn update(&mut self, id: &str, patch: SpotPatch) -> Option<Spot> {
        let updated = self.repo.update(id, patch);
        self.reconcile();
        updated
    }

    pub fn remove_image(&mut self, id: &str, index: usize) -> bool {
        let removed = self.repo.remove_image(id, index);
        if removed {
            self.reconcile();
        }
        removed
    }

    pub fn set_cover(&mut self, id: &str, index: usize) -> bool {
        let changed = self.repo.set_cover(id, index);
        if changed {
            self.reconcile();
        }
        changed
    }

    /// Removes the spot, its marker and its stored record. A store failure
    /// does not bring the spot back; it is reported as a notice.
    pub async fn delete(&mut self, id: &str) -> bool {
        if !self.repo.contains(id) {
            return false;
        }
        if self.selected.as_deref() == Some(id) {
            self.selected = None;
        }
        if let Err(err) = self.repo.remove(id).await {
            warn!(spot_id = %id, error = %err, "spot delete not persisted");
            self.notices.push(Notice::DeleteFailed {
                spot_id: id.to_string(),
                message: err.to_string(),
            });
        }
        self.reconcile();
        true
    }

    /// Encodes each image in order, skipping failures individually, and
    /// appends whatever succeeded to the spot in one update.
    pub async fn upload_images(
        &mut self,
        id: &str,
        images: Vec<RawImage>,
        pipeline: &dyn ImagePipeline,
    ) -> Option<UploadReport> {
        if !self.repo.contains(id) {
            return None;
        }

        let mut encoded = Vec::with_capacity(images.len());
        let mut failed = Vec::new();
        for raw in images {
            match pipeline.encode(&raw).await {
                Ok(image) => encoded.push(image),
                Err(err) => {
                    warn!(spot_id = %id, image = %raw.label, error = %err, "image skipped");
                    failed.push((raw.label, err));
                }
            }
        }

        let appended = self.repo.append_images(id, encoded)?;
        if !failed.is_empty() {
            self.notices.push(Notice::ImagesSkipped {
                spot_id: id.to_string(),
                failed: failed.len(),
            });
        }
        self.reconcile();
        Some(UploadReport {
            spot_id: id.to_string(),
            appended,
            failed,
        })
    }

    /// Captures the selected spot and its cover image for a description
    /// request.
    pub fn begin_description(&self) -> Result<DescriptionRequest, DescriptionError> {
        let spot = self.selected_spot().ok_or(DescriptionError::NoImage)?;
        let image = spot.cover_image().ok_or(DescriptionError::NoImage)?;
        Ok(DescriptionRequest {
            spot_id: spot.id.clone(),
            image: image.clone(),
        })
    }

    /// Applies a finished request to the spot it was issued for, whatever is
    /// selected now. Results for deleted spots are dropped.
    pub fn finish_description(
        &mut self,
        request: DescriptionRequest,
        result: Result<String, DescriptionError>,
    ) -> DescriptionOutcome {
        match result {
            Ok(text) => {
                if self
                    .update(&request.spot_id, SpotPatch::description(text.clone()))
                    .is_none()
                {
                    debug!(spot_id = %request.spot_id, "description arrived for a deleted spot");
                    return DescriptionOutcome::Discarded;
                }
                info!(spot_id = %request.spot_id, "description applied");
                DescriptionOutcome::Applied(text)
            }
            Err(err) => {
                warn!(spot_id = %request.spot_id, error = %err, "description request failed");
                self.notices.push(Notice::DescriptionFailed {
                    spot_id: request.spot_id,
                    message: err.to_string(),
                });
                DescriptionOutcome::Failed(err)
            }
        }
    }

    /// Runs one description request for the selected spot. Failures end up
    /// both in the outcome and as a notice.
    pub async fn describe_selected(
        &mut self,
        service: &dyn DescriptionService,
        instruction: &str,
    ) -> DescriptionOutcome {
        let request = match self.begin_description() {
            Ok(request) => request,
            Err(err) => {
                if let Some(spot_id) = self.selected.clone() {
                    self.notices.push(Notice::DescriptionFailed {
                        spot_id,
                        message: err.to_string(),
                    });
                }
                return DescriptionOutcome::Failed(err);
            }
        };
        let result = service.describe(&request.image, instruction).await;
        self.finish_description(request, result)
    }

    pub async fn flush(&self) {
        self.repo.flush().await;
    }

    /// Tears down every marker and drains pending writes.
    pub async fn close(mut self) -> WriteStats {
        self.markers.teardown();
        self.repo.close().await
    }

    fn reconcile(&mut self) -> ReconcileReport {
        if let Some(id) = self.selected.as_deref() {
            if !self.repo.contains(id) {
                self.selected = None;
            }
        }
        self.markers
            .reconcile(self.repo.spots(), self.selected.as_deref())
    }
}

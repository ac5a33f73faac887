use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

pub const DEFAULT_SPOT_TITLE: &str = "Новый спот";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub lat: f64,
    pub lng: f64,
}

impl Position {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

/// An encoded image payload as produced by the image pipeline, usually a
/// `data:image/...;base64,` URL. Opaque to everything but the renderer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodedImage(String);

impl EncodedImage {
    pub fn new(payload: impl Into<String>) -> Self {
        Self(payload.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn media_type(&self) -> Option<&str> {
        let rest = self.0.strip_prefix("data:")?;
        let end = rest.find([';', ','])?;
        Some(&rest[..end])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Spot {
    pub id: String,
    #[serde(flatten)]
    pub position: Position,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub images: Vec<EncodedImage>,
    #[serde(default)]
    pub cover_index: usize,
    pub created_at: i64,
}

impl Spot {
    pub fn new(id: impl Into<String>, position: Position, created_at: i64) -> Self {
        Self {
            id: id.into(),
            position,
            title: DEFAULT_SPOT_TITLE.to_string(),
            description: String::new(),
            images: Vec::new(),
            cover_index: 0,
            created_at,
        }
    }

    /// `images[cover_index]`, falling back to the first image when the index
    /// went stale.
    pub fn cover_image(&self) -> Option<&EncodedImage> {
        self.images
            .get(self.cover_index)
            .or_else(|| self.images.first())
    }

    pub fn normalize_cover(&mut self) {
        if !self.has_valid_cover() {
            self.cover_index = 0;
        }
    }

    pub fn has_valid_cover(&self) -> bool {
        if self.images.is_empty() {
            self.cover_index == 0
        } else {
            self.cover_index < self.images.len()
        }
    }

    pub fn append_images(&mut self, images: impl IntoIterator<Item = EncodedImage>) -> usize {
        let before = self.images.len();
        self.images.extend(images);
        self.normalize_cover();
        self.images.len() - before
    }

    /// Removes the image at `index`. Later images shift down; a cover that
    /// pointed past the removed slot follows its image, a cover that pointed
    /// at it resets to 0.
    pub fn remove_image(&mut self, index: usize) -> bool {
        if index >= self.images.len() {
            return false;
        }
        self.images.remove(index);
        if self.cover_index == index {
            self.cover_index = 0;
        } else if self.cover_index > index {
            self.cover_index -= 1;
        }
        self.normalize_cover();
        true
    }

    pub fn set_cover(&mut self, index: usize) -> bool {
        if index >= self.images.len() {
            return false;
        }
        self.cover_index = index;
        true
    }
}

/// Partial update. Present fields replace the stored value wholesale,
/// `images` included.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpotPatch {
    pub position: Option<Position>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub images: Option<Vec<EncodedImage>>,
    pub cover_index: Option<usize>,
}

impl SpotPatch {
    pub fn title(value: impl Into<String>) -> Self {
        Self {
            title: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn description(value: impl Into<String>) -> Self {
        Self {
            description: Some(value.into()),
            ..Self::default()
        }
    }

    #[cfg(test)]
    pub fn images(images: Vec<EncodedImage>, cover_index: usize) -> Self {
        Self {
            images: Some(images),
            cover_index: Some(cover_index),
            ..Self::default()
        }
    }

    pub fn has_changes(&self) -> bool {
        self.position.is_some()
            || self.title.is_some()
            || self.description.is_some()
            || self.images.is_some()
            || self.cover_index.is_some()
    }

    pub fn apply_to(self, spot: &mut Spot) {
        if let Some(position) = self.position {
            spot.position = position;
        }
        if let Some(title) = self.title {
            spot.title = title;
        }
        if let Some(description) = self.description {
            spot.description = description;
        }
        if let Some(images) = self.images {
            spot.images = images;
        }
        if let Some(cover_index) = self.cover_index {
            spot.cover_index = cover_index;
        }
        spot.normalize_cover();
    }
}

pub fn now_unix_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

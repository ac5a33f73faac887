use std::collections::BTreeMap;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::domain::Position;
use crate::spot_id::display_id;

use super::backend::{MarkerBackend, MarkerPriority, MarkerSpec, MarkerVisual};

/// Headless map surface: keeps the rendered state of each marker in memory
/// so it can be printed or inspected.
#[derive(Debug, Default)]
pub struct TextMap {
    next_key: u64,
    markers: BTreeMap<u64, RenderedMarker>,
    center: Option<Position>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedMarker {
    pub spot_id: String,
    pub lat: f64,
    pub lng: f64,
    pub icon: String,
    pub priority: MarkerPriority,
}

#[derive(Debug, PartialEq, Eq)]
pub struct TextMarkerHandle(u64);

impl TextMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Where the view was last centered, if anywhere.
    pub fn center(&self) -> Option<Position> {
        self.center
    }

    /// Markers with the elevated one last, as it would be drawn on top.
    pub fn markers(&self) -> Vec<&RenderedMarker> {
        let mut markers = self.markers.values().collect::<Vec<_>>();
        markers.sort_by(|left, right| {
            let rank = |marker: &RenderedMarker| marker.priority == MarkerPriority::Elevated;
            rank(left)
                .cmp(&rank(right))
                .then_with(|| left.spot_id.cmp(&right.spot_id))
        });
        markers
    }

    pub fn render_lines(&self) -> Vec<String> {
        self.markers()
            .into_iter()
            .map(|marker| {
                let flag = match marker.priority {
                    MarkerPriority::Elevated => "*",
                    MarkerPriority::Normal => " ",
                };
                format!(
                    "{} {} {:>10.5} {:>11.5} {}",
                    flag,
                    display_id(&marker.spot_id),
                    marker.lat,
                    marker.lng,
                    marker.icon
                )
            })
            .collect()
    }

    fn marker_mut(&mut self, handle: &TextMarkerHandle) -> Option<&mut RenderedMarker> {
        self.markers.get_mut(&handle.0)
    }
}

fn icon_label(visual: &MarkerVisual) -> String {
    match visual {
        MarkerVisual::Placeholder => "placeholder".to_string(),
        MarkerVisual::Photo(image) => {
            let mut hasher = Sha256::new();
            hasher.update(image.as_str().as_bytes());
            let digest = format!("{:x}", hasher.finalize());
            format!("photo:{}", &digest[..12])
        }
    }
}

impl MarkerBackend for TextMap {
    type Handle = TextMarkerHandle;

    fn create(&mut self, spec: MarkerSpec<'_>) -> Self::Handle {
        self.next_key += 1;
        self.markers.insert(
            self.next_key,
            RenderedMarker {
                spot_id: spec.spot_id.to_string(),
                lat: spec.position.lat,
                lng: spec.position.lng,
                icon: icon_label(&spec.visual),
                priority: spec.priority,
            },
        );
        TextMarkerHandle(self.next_key)
    }

    fn set_position(&mut self, handle: &mut Self::Handle, position: Position) {
        if let Some(marker) = self.marker_mut(handle) {
            marker.lat = position.lat;
            marker.lng = position.lng;
        }
    }

    fn set_visual(&mut self, handle: &mut Self::Handle, visual: MarkerVisual) {
        let icon = icon_label(&visual);
        if let Some(marker) = self.marker_mut(handle) {
            marker.icon = icon;
        }
    }

    fn set_priority(&mut self, handle: &mut Self::Handle, priority: MarkerPriority) {
        if let Some(marker) = self.marker_mut(handle) {
            marker.priority = priority;
        }
    }

    fn destroy(&mut self, handle: Self::Handle) {
        self.markers.remove(&handle.0);
    }

    fn center_on(&mut self, position: Position) {
        self.center = Some(position);
    }
}

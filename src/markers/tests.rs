use std::collections::{BTreeSet, HashMap};

use super::backend::{MarkerBackend, MarkerPriority, MarkerSpec, MarkerVisual};
use super::{Reconciler, TextMap};
use crate::domain::{EncodedImage, Position, Spot};

#[derive(Debug, Clone, PartialEq)]
struct LiveMarker {
    spot_id: String,
    position: Position,
    visual: MarkerVisual,
    priority: MarkerPriority,
}

#[derive(Default)]
struct RecordingBackend {
    next: u32,
    live: HashMap<u32, LiveMarker>,
    creates: usize,
    destroys: usize,
}

impl RecordingBackend {
    fn by_spot(&self, spot_id: &str) -> Option<&LiveMarker> {
        self.live.values().find(|marker| marker.spot_id == spot_id)
    }

    fn elevated(&self) -> Vec<String> {
        self.live
            .values()
            .filter(|marker| marker.priority == MarkerPriority::Elevated)
            .map(|marker| marker.spot_id.clone())
            .collect()
    }
}

impl MarkerBackend for RecordingBackend {
    type Handle = u32;

    fn create(&mut self, spec: MarkerSpec<'_>) -> u32 {
        self.next += 1;
        self.creates += 1;
        self.live.insert(
            self.next,
            LiveMarker {
                spot_id: spec.spot_id.to_string(),
                position: spec.position,
                visual: spec.visual,
                priority: spec.priority,
            },
        );
        self.next
    }

    fn set_position(&mut self, handle: &mut u32, position: Position) {
        if let Some(marker) = self.live.get_mut(handle) {
            marker.position = position;
        }
    }

    fn set_visual(&mut self, handle: &mut u32, visual: MarkerVisual) {
        if let Some(marker) = self.live.get_mut(handle) {
            marker.visual = visual;
        }
    }

    fn set_priority(&mut self, handle: &mut u32, priority: MarkerPriority) {
        if let Some(marker) = self.live.get_mut(handle) {
            marker.priority = priority;
        }
    }

    fn destroy(&mut self, handle: u32) {
        self.destroys += 1;
        self.live.remove(&handle);
    }

    fn center_on(&mut self, _position: Position) {}
}

fn image(tag: &str) -> EncodedImage {
    EncodedImage::new(format!("data:image/jpeg;base64,{tag}"))
}

fn spot(id: &str, lat: f64) -> Spot {
    Spot::new(id, Position::new(lat, lat), 1)
}

fn ids(spots: &[Spot]) -> BTreeSet<String> {
    spots.iter().map(|spot| spot.id.clone()).collect()
}

fn marker_ids<B: MarkerBackend>(reconciler: &Reconciler<B>) -> BTreeSet<String> {
    reconciler.marker_ids().map(str::to_string).collect()
}

#[test]
fn creates_one_marker_per_spot_with_cover_or_placeholder() {
    let mut with_photo = spot("a", 1.0);
    with_photo.images = vec![image("x"), image("y")];
    with_photo.cover_index = 1;
    let spots = vec![with_photo, spot("b", 2.0)];

    let mut reconciler = Reconciler::new(RecordingBackend::default());
    let report = reconciler.reconcile(&spots, None);
    assert_eq!(report.created, 2);
    assert_eq!(marker_ids(&reconciler), ids(&spots));

    let backend = reconciler.backend();
    assert_eq!(
        backend.by_spot("a").expect("marker a").visual,
        MarkerVisual::Photo(image("y"))
    );
    assert_eq!(
        backend.by_spot("b").expect("marker b").visual,
        MarkerVisual::Placeholder
    );
}

#[test]
fn second_pass_without_changes_creates_and_destroys_nothing() {
    let spots = vec![spot("a", 1.0), spot("b", 2.0)];
    let mut reconciler = Reconciler::new(RecordingBackend::default());
    reconciler.reconcile(&spots, Some("a"));
    let creates = reconciler.backend().creates;

    let report = reconciler.reconcile(&spots, Some("a"));
    assert_eq!(report.created, 0);
    assert_eq!(report.destroyed, 0);
    assert_eq!(reconciler.backend().creates, creates);
    assert_eq!(reconciler.backend().destroys, 0);
}

#[test]
fn marker_set_tracks_collection_through_changes() {
    let mut spots = vec![spot("a", 1.0), spot("b", 2.0), spot("c", 3.0)];
    let mut reconciler = Reconciler::new(RecordingBackend::default());
    reconciler.reconcile(&spots, None);

    spots.retain(|spot| spot.id != "b");
    spots.push(spot("d", 4.0));
    let report = reconciler.reconcile(&spots, None);
    assert_eq!(report.created, 1);
    assert_eq!(report.destroyed, 1);
    assert_eq!(marker_ids(&reconciler), ids(&spots));
    assert_eq!(reconciler.backend().live.len(), spots.len());

    spots.clear();
    reconciler.reconcile(&spots, None);
    assert_eq!(reconciler.marker_count(), 0);
    assert!(reconciler.backend().live.is_empty());
}

#[test]
fn only_the_selected_marker_is_elevated() {
    let spots = vec![spot("first", 1.0), spot("second", 2.0)];
    let mut reconciler = Reconciler::new(RecordingBackend::default());

    reconciler.reconcile(&spots, Some("second"));
    assert_eq!(reconciler.backend().elevated(), vec!["second".to_string()]);
    assert_eq!(
        reconciler.backend().by_spot("first").expect("first").priority,
        MarkerPriority::Normal
    );

    reconciler.reconcile(&spots, Some("first"));
    assert_eq!(reconciler.backend().elevated(), vec!["first".to_string()]);

    reconciler.reconcile(&spots, None);
    assert!(reconciler.backend().elevated().is_empty());
}

#[test]
fn existing_markers_pick_up_moves_and_new_covers() {
    let mut spots = vec![spot("a", 1.0)];
    let mut reconciler = Reconciler::new(RecordingBackend::default());
    reconciler.reconcile(&spots, None);

    spots[0].position = Position::new(9.0, 9.0);
    spots[0].images = vec![image("new")];
    let report = reconciler.reconcile(&spots, None);
    assert_eq!(report.updated, 1);

    let marker = reconciler.backend().by_spot("a").expect("marker");
    assert_eq!(marker.position, Position::new(9.0, 9.0));
    assert_eq!(marker.visual, MarkerVisual::Photo(image("new")));
}

#[test]
fn stale_cover_index_falls_back_to_first_image() {
    let mut raced = spot("a", 1.0);
    raced.images = vec![image("only")];
    raced.cover_index = 3;

    let mut reconciler = Reconciler::new(RecordingBackend::default());
    reconciler.reconcile(&[raced], None);
    assert_eq!(
        reconciler.backend().by_spot("a").expect("marker").visual,
        MarkerVisual::Photo(image("only"))
    );
}

#[test]
fn teardown_destroys_every_marker() {
    let spots = vec![spot("a", 1.0), spot("b", 2.0)];
    let mut reconciler = Reconciler::new(RecordingBackend::default());
    reconciler.reconcile(&spots, None);

    assert_eq!(reconciler.teardown(), 2);
    assert_eq!(reconciler.backend().destroys, 2);
    assert_eq!(reconciler.marker_count(), 0);
}

#[test]
fn text_map_draws_elevated_marker_last() {
    let mut covered = spot("S-bbbbbbbb", 2.0);
    covered.images = vec![image("p")];
    let spots = vec![spot("S-aaaaaaaa", 1.0), covered, spot("S-cccccccc", 3.0)];

    let mut reconciler = Reconciler::new(TextMap::new());
    reconciler.reconcile(&spots, Some("S-aaaaaaaa"));

    let rendered = reconciler.backend().markers();
    assert_eq!(rendered.len(), 3);
    assert_eq!(rendered[2].spot_id, "S-aaaaaaaa");
    assert_eq!(rendered[2].priority, MarkerPriority::Elevated);
    assert!(rendered[0].icon.starts_with("photo:"));
    assert_eq!(rendered[1].icon, "placeholder");

    let lines = reconciler.backend().render_lines();
    assert!(lines[2].starts_with("* aaaaaaaa"));
}

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::trace;

use crate::domain::Spot;

use super::backend::{MarkerBackend, MarkerPriority, MarkerSpec, MarkerVisual};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub created: usize,
    pub updated: usize,
    pub destroyed: usize,
}

/// Keeps one live marker per spot. The handle map is only touched by
/// [`Reconciler::reconcile`] and [`Reconciler::teardown`].
pub struct Reconciler<B: MarkerBackend> {
    backend: B,
    handles: HashMap<String, B::Handle>,
}

impl<B: MarkerBackend> Reconciler<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            handles: HashMap::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    #[cfg(test)]
    pub fn has_marker(&self, id: &str) -> bool {
        self.handles.contains_key(id)
    }

    #[cfg(test)]
    pub fn marker_ids(&self) -> impl Iterator<Item = &str> {
        self.handles.keys().map(String::as_str)
    }

    #[cfg(test)]
    pub fn marker_count(&self) -> usize {
        self.handles.len()
    }

    /// Creates or refreshes a marker for every spot, then destroys markers
    /// whose spot is gone. Afterwards the handle keys equal the spot ids.
    pub fn reconcile(&mut self, spots: &[Spot], selected: Option<&str>) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        for spot in spots {
            let priority = if selected == Some(spot.id.as_str()) {
                MarkerPriority::Elevated
            } else {
                MarkerPriority::Normal
            };
            let visual = MarkerVisual::for_spot(spot);

            match self.handles.get_mut(&spot.id) {
                Some(handle) => {
                    self.backend.set_position(handle, spot.position);
                    self.backend.set_visual(handle, visual);
                    self.backend.set_priority(handle, priority);
                    report.updated += 1;
                }
                None => {
                    let handle = self.backend.create(MarkerSpec {
                        spot_id: &spot.id,
                        position: spot.position,
                        visual,
                        priority,
                    });
                    self.handles.insert(spot.id.clone(), handle);
                    report.created += 1;
                }
            }
        }

        let live = spots
            .iter()
            .map(|spot| spot.id.as_str())
            .collect::<HashSet<_>>();
        let orphans = self
            .handles
            .keys()
            .filter(|id| !live.contains(id.as_str()))
            .cloned()
            .collect::<Vec<_>>();
        for id in orphans {
            if let Some(handle) = self.handles.remove(&id) {
                self.backend.destroy(handle);
                report.destroyed += 1;
            }
        }

        trace!(
            created = report.created,
            updated = report.updated,
            destroyed = report.destroyed,
            "markers reconciled"
        );
        report
    }

    /// Destroys every marker, as when the map view goes away.
    pub fn teardown(&mut self) -> usize {
        let count = self.handles.len();
        for (_, handle) in self.handles.drain() {
            self.backend.destroy(handle);
        }
        count
    }
}

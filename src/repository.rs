use tracing::{debug, info, warn};

use crate::domain::{now_unix_millis, EncodedImage, Position, Spot, SpotPatch};
use crate::legacy::{LegacyMigrator, LegacySlot, MigrationSummary};
use crate::persist::{WriteQueue, WriteStats};
use crate::spot_id::generate_spot_id;
use crate::store::{SpotStore, StoreError};

/// The authoritative, creation-ordered spot collection.
///
/// Memory is updated synchronously. `create` and the update family hand the
/// new value to the write queue and return immediately; `remove` waits for
/// the store so a confirmed delete is durable.
pub struct SpotRepository {
    spots: Vec<Spot>,
    queue: WriteQueue,
}

pub struct LoadReport {
    pub durable: bool,
    pub migration: Option<MigrationSummary>,
}

impl SpotRepository {
    pub fn new(spots: Vec<Spot>, queue: WriteQueue) -> Self {
        Self { spots, queue }
    }

    /// Builds the startup state: everything in the store, or the legacy
    /// snapshot when the store is empty. Without a store the repository runs
    /// memory-only.
    pub async fn load(store: Option<SpotStore>, legacy: &LegacySlot) -> (Self, LoadReport) {
        let Some(store) = store else {
            warn!("spot store unavailable; starting with an empty, memory-only collection");
            let report = LoadReport {
                durable: false,
                migration: None,
            };
            return (Self::new(Vec::new(), WriteQueue::detached()), report);
        };

        let mut spots = store.get_all().await;
        let mut migration = None;
        if spots.is_empty() {
            let summary = LegacyMigrator::new(&store, legacy).run().await;
            if summary.imported_count > 0 {
                spots = store.get_all().await;
            }
            migration = Some(summary);
        }
        info!(count = spots.len(), "spots loaded");

        let report = LoadReport {
            durable: true,
            migration,
        };
        (Self::new(spots, WriteQueue::spawn(store)), report)
    }

    pub fn spots(&self) -> &[Spot] {
        &self.spots
    }

    pub fn get(&self, id: &str) -> Option<&Spot> {
        self.spots.iter().find(|spot| spot.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn create(&mut self, position: Position) -> Spot {
        let id = generate_spot_id(|candidate| self.contains(candidate));
        let spot = Spot::new(id, position, now_unix_millis());
        self.spots.push(spot.clone());
        debug!(spot_id = %spot.id, "spot created");
        self.queue.enqueue_put(spot.clone());
        spot
    }

    /// Shallow merge of `patch` into the spot. Unknown ids are ignored.
    pub fn update(&mut self, id: &str, patch: SpotPatch) -> Option<Spot> {
        if !patch.has_changes() {
            return self.get(id).cloned();
        }
        self.mutate(id, |spot| {
            patch.apply_to(spot);
            true
        })
    }

    pub fn append_images(&mut self, id: &str, images: Vec<EncodedImage>) -> Option<usize> {
        if images.is_empty() {
            return self.get(id).map(|_| 0);
        }
        let mut appended = 0;
        self.mutate(id, |spot| {
            appended = spot.append_images(images);
            appended > 0
        })
        .map(|_| appended)
    }

    pub fn remove_image(&mut self, id: &str, index: usize) -> bool {
        let mut removed = false;
        self.mutate(id, |spot| {
            removed = spot.remove_image(index);
            removed
        });
        removed
    }

    pub fn set_cover(&mut self, id: &str, index: usize) -> bool {
        let mut changed = false;
        self.mutate(id, |spot| {
            if spot.cover_index == index {
                return false;
            }
            changed = spot.set_cover(index);
            changed
        });
        changed
    }

    /// Drops the spot from memory, then waits for the store delete. The
    /// in-memory removal stands even when the store call fails; the error is
    /// returned so the caller can tell the user.
    pub async fn remove(&mut self, id: &str) -> Result<bool, StoreError> {
        let Some(index) = self.spots.iter().position(|spot| spot.id == id) else {
            return Ok(false);
        };
        self.spots.remove(index);
        debug!(spot_id = %id, "spot removed from memory");
        self.queue.remove(id).await.map(|_| true)
    }

    /// Resolves once every write queued so far has reached the store.
    pub async fn flush(&self) {
        self.queue.flush().await;
    }

    pub async fn close(self) -> WriteStats {
        self.queue.shutdown().await
    }

    fn mutate<F>(&mut self, id: &str, apply: F) -> Option<Spot>
    where
        F: FnOnce(&mut Spot) -> bool,
    {
        let spot = self.spots.iter_mut().find(|spot| spot.id == id)?;
        if !apply(spot) {
            return Some(spot.clone());
        }
        let updated = spot.clone();
        self.queue.enqueue_put(updated.clone());
        Some(updated)
    }
}

//! Background write queue between the in-memory repository and the durable
//! store.
//!
//! One worker task owns all writes, so at most one store call is in flight
//! and writes for a given id land in the order they were enqueued. Whatever
//! piles up while a write is running is coalesced per id before the next
//! round: a newer `Put` replaces an older one, and a `Remove` replaces any
//! pending `Put` for the same id.

use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::domain::Spot;
use crate::store::{SpotStore, StoreError, StoreFault};

#[derive(Debug)]
enum WriteCommand {
    Put(Spot),
    Remove {
        id: String,
        ack: oneshot::Sender<Result<bool, StoreError>>,
    },
    Flush(oneshot::Sender<()>),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteStats {
    pub puts: u64,
    pub removes: u64,
    pub coalesced: u64,
    pub failed: u64,
}

pub struct WriteQueue {
    sender: mpsc::UnboundedSender<WriteCommand>,
    worker: JoinHandle<WriteStats>,
}

impl WriteQueue {
    pub fn spawn(store: SpotStore) -> Self {
        Self::start(Some(store))
    }

    /// A queue with no durable store behind it. Writes are acknowledged and
    /// dropped, which keeps the app usable when storage could not be opened.
    pub fn detached() -> Self {
        Self::start(None)
    }

    fn start(store: Option<SpotStore>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run_worker(store, receiver));
        Self { sender, worker }
    }

    pub fn enqueue_put(&self, spot: Spot) {
        let id = spot.id.clone();
        if self.sender.send(WriteCommand::Put(spot)).is_err() {
            warn!(spot_id = %id, "write queue closed; dropping spot write");
        }
    }

    /// Enqueues a delete and waits until the store has applied it.
    pub async fn remove(&self, id: &str) -> Result<bool, StoreError> {
        let (ack, done) = oneshot::channel();
        self.sender
            .send(WriteCommand::Remove {
                id: id.to_string(),
                ack,
            })
            .map_err(|_| StoreError::Closed)?;
        done.await.map_err(|_| StoreError::Closed)?
    }

    /// Resolves once every write enqueued before the call has been applied.
    pub async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        if self.sender.send(WriteCommand::Flush(ack)).is_err() {
            return;
        }
        let _ = done.await;
    }

    pub async fn shutdown(self) -> WriteStats {
        let Self { sender, worker } = self;
        drop(sender);
        match worker.await {
            Ok(stats) => stats,
            Err(err) => {
                warn!(error = %err, "write queue worker ended abnormally");
                WriteStats::default()
            }
        }
    }
}

enum PendingOp {
    Put(Spot),
    Remove {
        id: String,
        acks: Vec<oneshot::Sender<Result<bool, StoreError>>>,
    },
}

#[derive(Default)]
struct PendingBatch {
    ops: Vec<PendingOp>,
    slots: HashMap<String, usize>,
    flushes: Vec<oneshot::Sender<()>>,
    coalesced: u64,
}

impl PendingBatch {
    fn push(&mut self, command: WriteCommand) {
        match command {
            WriteCommand::Put(spot) => self.push_put(spot),
            WriteCommand::Remove { id, ack } => self.push_remove(id, ack),
            WriteCommand::Flush(ack) => self.flushes.push(ack),
        }
    }

    fn push_put(&mut self, spot: Spot) {
        if let Some(&slot) = self.slots.get(&spot.id) {
            if let PendingOp::Put(pending) = &mut self.ops[slot] {
                *pending = spot;
                self.coalesced += 1;
                return;
            }
        }
        self.slots.insert(spot.id.clone(), self.ops.len());
        self.ops.push(PendingOp::Put(spot));
    }

    fn push_remove(&mut self, id: String, ack: oneshot::Sender<Result<bool, StoreError>>) {
        if let Some(&slot) = self.slots.get(&id) {
            if let PendingOp::Remove { acks, .. } = &mut self.ops[slot] {
                acks.push(ack);
                return;
            }
            self.ops[slot] = PendingOp::Remove {
                id,
                acks: vec![ack],
            };
            self.coalesced += 1;
            return;
        }
        self.slots.insert(id.clone(), self.ops.len());
        self.ops.push(PendingOp::Remove {
            id,
            acks: vec![ack],
        });
    }

    async fn apply(self, store: Option<&SpotStore>, stats: &mut WriteStats) {
        stats.coalesced += self.coalesced;
        for op in self.ops {
            match op {
                PendingOp::Put(spot) => {
                    stats.puts += 1;
                    let Some(store) = store else {
                        debug!(spot_id = %spot.id, "no durable store; write kept in memory only");
                        continue;
                    };
                    if store.put(spot).await.is_err() {
                        stats.failed += 1;
                    }
                }
                PendingOp::Remove { id, acks } => {
                    stats.removes += 1;
                    let result = match store {
                        Some(store) => store.remove(&id).await,
                        None => Ok(false),
                    };
                    if result.is_err() {
                        stats.failed += 1;
                    }
                    answer_removes(&id, acks, result);
                }
            }
        }
        for flush in self.flushes {
            let _ = flush.send(());
        }
    }
}

fn answer_removes(
    id: &str,
    acks: Vec<oneshot::Sender<Result<bool, StoreError>>>,
    result: Result<bool, StoreError>,
) {
    let mut acks = acks.into_iter();
    let Some(first) = acks.next() else {
        return;
    };
    let echo = match &result {
        Ok(existed) => Ok(*existed),
        Err(err) => Err(err.to_string()),
    };
    let _ = first.send(result);
    for ack in acks {
        let _ = ack.send(match &echo {
            Ok(existed) => Ok(*existed),
            Err(message) => Err(StoreError::DeleteFailed {
                id: id.to_string(),
                source: StoreFault::Worker(message.clone()),
            }),
        });
    }
}

async fn run_worker(
    store: Option<SpotStore>,
    mut receiver: mpsc::UnboundedReceiver<WriteCommand>,
) -> WriteStats {
    let mut stats = WriteStats::default();
    while let Some(first) = receiver.recv().await {
        let mut batch = PendingBatch::default();
        batch.push(first);
        while let Ok(next) = receiver.try_recv() {
            batch.push(next);
        }
        batch.apply(store.as_ref(), &mut stats).await;
    }
    debug!(
        puts = stats.puts,
        removes = stats.removes,
        coalesced = stats.coalesced,
        failed = stats.failed,
        "write queue drained"
    );
    stats
}

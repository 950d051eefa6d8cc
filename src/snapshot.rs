//! Immutable, versioned snapshots and their single-slot handoff to a renderer

use crate::state::AggregationState;
use serde::Serialize;
use tokio::sync::watch;

/// One category's view inside a snapshot. `mean` is `None` when the category
/// carries no current data; renderers must treat that as "no data", not zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySnapshot {
    pub name: String,
    pub mean: Option<f64>,
    pub count: u64,
}

/// Immutable copy of the aggregation state at a point in time.
///
/// Sequence numbers are strictly increasing across publishes so a renderer
/// can detect and discard out-of-order or duplicate deliveries; `taken_at`
/// feeds staleness indicators.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub sequence: u64,
    pub taken_at: i64,
    pub categories: Vec<CategorySnapshot>,
}

impl Snapshot {
    /// Pre-ingestion placeholder seeding the watch cell (sequence 0).
    pub fn empty() -> Self {
        Self {
            sequence: 0,
            taken_at: 0,
            categories: Vec::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&CategorySnapshot> {
        self.categories.iter().find(|c| c.name == name)
    }

    pub fn is_placeholder(&self) -> bool {
        self.sequence == 0
    }
}

/// When the aggregator hands a fresh snapshot to the renderer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PublishCadence {
    /// After every accepted message: lowest latency, highest overhead
    OnMessage,
    /// On a fixed timer tick: bounded overhead, slightly stale
    Interval { secs: f64 },
}

/// Produces snapshots and writes them into a single-slot latest-value cell.
///
/// The watch channel gives the exact handoff the renderer needs: a newer
/// snapshot overwrites an older unread one, and a slow reader never blocks
/// the ingestion loop.
pub struct SnapshotPublisher {
    sequence: u64,
    tx: watch::Sender<Snapshot>,
}

impl SnapshotPublisher {
    pub fn new() -> (Self, watch::Receiver<Snapshot>) {
        let (tx, rx) = watch::channel(Snapshot::empty());
        (Self { sequence: 0, tx }, rx)
    }

    /// Copy the current state into an immutable snapshot and publish it.
    /// Returns the assigned sequence number.
    pub fn publish(&mut self, state: &AggregationState, now: i64) -> u64 {
        self.sequence += 1;

        let mut categories: Vec<CategorySnapshot> = state
            .categories()
            .iter()
            .map(|(name, stats)| CategorySnapshot {
                name: name.clone(),
                mean: if stats.count > 0 {
                    Some(stats.mean)
                } else {
                    None
                },
                count: stats.count,
            })
            .collect();
        // Stable ordering for renderers and serialized output
        categories.sort_by(|a, b| a.name.cmp(&b.name));

        let snapshot = Snapshot {
            sequence: self.sequence,
            taken_at: now,
            categories,
        };

        // send_replace never fails: the publisher holds its own receiver slot
        self.tx.send_replace(snapshot);
        self.sequence
    }

    pub fn last_sequence(&self) -> u64 {
        self.sequence
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.tx.subscribe()
    }
}

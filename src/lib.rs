//! sentiflow: real-time per-category sentiment aggregation
//!
//! Consumes a stream of categorized sentiment records, maintains running
//! averages per category under a configurable windowing policy, and hands
//! immutable versioned snapshots to a concurrently running renderer.

pub mod aggregator;
pub mod config;
pub mod record;
pub mod snapshot;
pub mod state;
pub mod transport;
pub mod ui;
pub mod window;

pub use aggregator::{Aggregator, AggregatorPhase, AggregatorReport};
pub use config::{Config, ConfigError, WindowMode};
pub use record::{decode, DecodeError, RecordFormat, SentimentRange, SentimentRecord};
pub use snapshot::{CategorySnapshot, PublishCadence, Snapshot, SnapshotPublisher};
pub use state::{AggregationState, CategoryStats};
pub use transport::{ChannelTransport, FileTailTransport, Transport, TransportError};
pub use window::{Contribution, CumulativeWindow, SlidingWindow, WindowPolicy};

//! The ingestion/aggregation control loop
//!
//! Single-writer discipline: this task is the only mutator of
//! [`AggregationState`]. Everything the renderer sees goes through the
//! snapshot watch cell.

use crate::config::Config;
use crate::record::{self, RecordFormat, SentimentRange};
use crate::snapshot::{PublishCadence, Snapshot, SnapshotPublisher};
use crate::state::AggregationState;
use crate::transport::Transport;
use crate::window::WindowPolicy;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::interval;

/// Lifecycle of the aggregation loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregatorPhase {
    /// State initialized, no messages processed
    Idle,
    /// Main loop active
    Running,
    /// Shutdown or end-of-stream observed; finishing up, no new reads
    Draining,
    /// Terminal; resources released
    Stopped,
}

/// Counters reported when the loop stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregatorReport {
    pub records_accepted: u64,
    pub decode_errors: u64,
    pub last_sequence: u64,
}

/// Consumes raw messages, maintains per-category running averages under the
/// configured window policy, and publishes immutable snapshots.
pub struct Aggregator {
    format: RecordFormat,
    range: SentimentRange,
    window: Box<dyn WindowPolicy>,
    cadence: PublishCadence,
    state: AggregationState,
    publisher: SnapshotPublisher,
    phase: AggregatorPhase,
    records_accepted: u64,
    decode_errors: u64,
    /// Timestamp source, swappable for deterministic tests
    now_fn: Box<dyn Fn() -> i64 + Send>,
}

impl Aggregator {
    pub fn new(
        format: RecordFormat,
        range: SentimentRange,
        window: Box<dyn WindowPolicy>,
        cadence: PublishCadence,
    ) -> (Self, watch::Receiver<Snapshot>) {
        Self::new_with_timestamp_fn(
            format,
            range,
            window,
            cadence,
            Box::new(|| chrono::Utc::now().timestamp()),
        )
    }

    pub fn from_config(config: &Config) -> (Self, watch::Receiver<Snapshot>) {
        Self::new(
            config.stream_format,
            config.sentiment_range,
            config.window_policy(),
            config.publish_cadence,
        )
    }

    pub fn new_with_timestamp_fn(
        format: RecordFormat,
        range: SentimentRange,
        window: Box<dyn WindowPolicy>,
        cadence: PublishCadence,
        now_fn: Box<dyn Fn() -> i64 + Send>,
    ) -> (Self, watch::Receiver<Snapshot>) {
        let (publisher, rx) = SnapshotPublisher::new();
        (
            Self {
                format,
                range,
                window,
                cadence,
                state: AggregationState::new(),
                publisher,
                phase: AggregatorPhase::Idle,
                records_accepted: 0,
                decode_errors: 0,
                now_fn,
            },
            rx,
        )
    }

    pub fn phase(&self) -> AggregatorPhase {
        self.phase
    }

    pub fn decode_errors(&self) -> u64 {
        self.decode_errors
    }

    /// Run the ingestion loop until the transport ends or `shutdown` fires.
    ///
    /// The shutdown signal is observed inside the select, so it takes effect
    /// promptly even while the loop is parked on the transport read. A read
    /// cancelled mid-await has not consumed its message, so draining never
    /// abandons a half-processed record.
    pub async fn run<T: Transport>(
        mut self,
        mut transport: T,
        mut shutdown: watch::Receiver<bool>,
    ) -> AggregatorReport {
        self.phase = AggregatorPhase::Running;
        log::info!("Aggregator running");

        // Periodic eviction so idle streams still age out of the window
        let mut evict_tick = interval(Duration::from_secs(1));
        evict_tick.tick().await; // skip the immediate first tick

        let mut publish_tick = match self.cadence {
            PublishCadence::Interval { secs } => {
                let mut tick = interval(Duration::from_secs_f64(secs));
                tick.tick().await;
                Some(tick)
            }
            PublishCadence::OnMessage => None,
        };

        while self.phase == AggregatorPhase::Running {
            tokio::select! {
                read = transport.next_message() => match read {
                    Ok(Some(line)) => self.handle_message(&line),
                    Ok(None) => {
                        log::info!("Transport reached end of stream, draining");
                        self.phase = AggregatorPhase::Draining;
                    }
                    Err(e) => {
                        // Any non-success read is treated as end of stream;
                        // retry/backoff belongs to the transport collaborator
                        log::error!("Transport error, draining: {}", e);
                        self.phase = AggregatorPhase::Draining;
                    }
                },
                _ = evict_tick.tick() => {
                    self.run_evictions();
                }
                _ = maybe_tick(&mut publish_tick) => {
                    self.publish();
                }
                _ = shutdown.changed() => {
                    log::info!("Shutdown signal received, draining");
                    self.phase = AggregatorPhase::Draining;
                }
            }
        }

        // Drain: one last eviction pass and a final snapshot so observers
        // see the terminal state
        self.run_evictions();
        self.publish();
        self.phase = AggregatorPhase::Stopped;

        let report = AggregatorReport {
            records_accepted: self.records_accepted,
            decode_errors: self.decode_errors,
            last_sequence: self.publisher.last_sequence(),
        };
        log::info!(
            "Aggregator stopped: {} records accepted, {} decode errors, {} snapshots",
            report.records_accepted,
            report.decode_errors,
            report.last_sequence
        );
        report
    }

    /// Decode, admit, evict, publish. Decode failures are tallied and
    /// skipped; bad data never halts the loop.
    fn handle_message(&mut self, line: &str) {
        let record = match record::decode(line, self.format, self.range) {
            Ok(record) => record,
            Err(e) => {
                self.decode_errors += 1;
                log::warn!("Dropping undecodable message ({}): {}", e, line);
                return;
            }
        };

        let now = (self.now_fn)();
        let contribution = self.window.admit(&record);
        debug_assert_eq!(contribution.sentiment, record.sentiment);
        self.state.apply_admit(&record, now);
        self.records_accepted += 1;

        let evicted = self.window.evict(now);
        if !evicted.is_empty() {
            self.state.apply_evictions(&evicted, now);
        }

        if self.cadence == PublishCadence::OnMessage {
            self.publish();
        }
    }

    fn run_evictions(&mut self) {
        let now = (self.now_fn)();
        let evicted = self.window.evict(now);
        if evicted.is_empty() {
            return;
        }
        log::debug!("Evicting {} stale contributions", evicted.len());
        self.state.apply_evictions(&evicted, now);

        // Under on_message cadence a tick-driven eviction still has to reach
        // the renderer; interval cadence picks it up on its own tick
        if self.cadence == PublishCadence::OnMessage {
            self.publish();
        }
    }

    fn publish(&mut self) {
        let now = (self.now_fn)();
        let seq = self.publisher.publish(&self.state, now);
        log::debug!(
            "Published snapshot #{} ({} categories)",
            seq,
            self.state.category_count()
        );
    }
}

/// Ticks the interval when one is configured; otherwise never resolves, so
/// the select branch is inert under on-message cadence.
async fn maybe_tick(tick: &mut Option<tokio::time::Interval>) {
    match tick {
        Some(tick) => {
            tick.tick().await;
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::{CumulativeWindow, SlidingWindow};
    use tokio::sync::mpsc;

    fn json_line(category: &str, sentiment: f64, observed_at: i64) -> String {
        format!(
            r#"{{"category": "{}", "sentiment": {}, "observed_at": {}}}"#,
            category, sentiment, observed_at
        )
    }

    fn cumulative_aggregator(
        base_time: i64,
    ) -> (Aggregator, watch::Receiver<Snapshot>) {
        Aggregator::new_with_timestamp_fn(
            RecordFormat::Jsonl,
            SentimentRange::default(),
            Box::new(CumulativeWindow::new()),
            PublishCadence::OnMessage,
            Box::new(move || base_time),
        )
    }

    #[test]
    fn test_starts_idle() {
        let (aggregator, _rx) = cumulative_aggregator(1000);
        assert_eq!(aggregator.phase(), AggregatorPhase::Idle);
    }

    #[test]
    fn test_handle_message_updates_state_and_publishes() {
        let (mut aggregator, rx) = cumulative_aggregator(1000);

        aggregator.handle_message(&json_line("tech", 0.8, 1000));
        aggregator.handle_message(&json_line("tech", -0.2, 1001));

        let snapshot = rx.borrow().clone();
        assert_eq!(snapshot.sequence, 2);
        let tech = snapshot.get("tech").unwrap();
        assert_eq!(tech.count, 2);
        assert!((tech.mean.unwrap() - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_decode_failure_leaves_state_unchanged() {
        let (mut aggregator, rx) = cumulative_aggregator(1000);

        aggregator.handle_message(&json_line("tech", 0.8, 1000));
        let before = rx.borrow().clone();

        aggregator.handle_message("definitely not json");
        aggregator.handle_message(&json_line("tech", 2.5, 1001)); // out of range
        aggregator.handle_message(&json_line("", 0.5, 1002)); // empty category

        assert_eq!(aggregator.decode_errors(), 3);
        // No publishes happened for rejected messages
        let after = rx.borrow().clone();
        assert_eq!(after, before);
    }

    #[test]
    fn test_sliding_window_scenario() {
        // Records [("tech",0.8,t), ("tech",-0.2,t+1), ("sports",0.5,t+2)]
        // with W=1 evaluated at now=t+2: both tech records evicted
        let t = 1000;
        let (mut aggregator, rx) = Aggregator::new_with_timestamp_fn(
            RecordFormat::Jsonl,
            SentimentRange::default(),
            Box::new(SlidingWindow::new(1)),
            PublishCadence::OnMessage,
            Box::new(move || t + 2),
        );

        aggregator.handle_message(&json_line("tech", 0.8, t));
        aggregator.handle_message(&json_line("tech", -0.2, t + 1));
        aggregator.handle_message(&json_line("sports", 0.5, t + 2));

        let snapshot = rx.borrow().clone();
        assert!(snapshot.get("tech").is_none());
        let sports = snapshot.get("sports").unwrap();
        assert_eq!(sports.count, 1);
        assert_eq!(sports.mean, Some(0.5));
    }

    #[test]
    fn test_tick_eviction_publishes_removal() {
        let t = 1000;
        let (mut aggregator, rx) = Aggregator::new_with_timestamp_fn(
            RecordFormat::Jsonl,
            SentimentRange::default(),
            Box::new(SlidingWindow::new(60)),
            PublishCadence::OnMessage,
            Box::new(move || t),
        );

        aggregator.handle_message(&json_line("tech", 0.8, t));
        assert_eq!(rx.borrow().sequence, 1);

        // Simulate the stream going idle past the window
        aggregator.now_fn = Box::new(move || t + 61);
        aggregator.run_evictions();

        let snapshot = rx.borrow().clone();
        assert_eq!(snapshot.sequence, 2);
        assert!(snapshot.get("tech").is_none());
    }

    #[tokio::test]
    async fn test_run_drains_on_channel_close() {
        let (tx, rx_msgs) = mpsc::channel::<String>(16);
        let transport = crate::transport::ChannelTransport::new(rx_msgs);
        let (aggregator, snapshots) = cumulative_aggregator(1000);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        tx.send(json_line("tech", 0.4, 1000)).await.unwrap();
        tx.send(json_line("tech", 0.6, 1001)).await.unwrap();
        drop(tx);

        let report = aggregator.run(transport, shutdown_rx).await;
        assert_eq!(report.records_accepted, 2);
        assert_eq!(report.decode_errors, 0);
        // Two on-message publishes plus the final drain snapshot
        assert_eq!(report.last_sequence, 3);

        let snapshot = snapshots.borrow().clone();
        assert_eq!(snapshot.sequence, 3);
        assert!((snapshot.get("tech").unwrap().mean.unwrap() - 0.5).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown_signal() {
        let (_tx, rx_msgs) = mpsc::channel::<String>(4);
        let transport = crate::transport::ChannelTransport::new(rx_msgs);
        let (aggregator, _snapshots) = cumulative_aggregator(1000);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(aggregator.run(transport, shutdown_rx));

        // The loop is blocked on the (empty, open) channel; shutdown must
        // still be observed promptly
        shutdown_tx.send(true).unwrap();
        let report = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("aggregator did not shut down in time")
            .unwrap();
        assert_eq!(report.records_accepted, 0);
        assert_eq!(report.last_sequence, 1); // final drain snapshot only
    }
}

//! Windowing policies deciding which records still contribute to the average

use crate::record::SentimentRecord;
use std::collections::VecDeque;

/// A single record's contribution to its category's running stats.
#[derive(Debug, Clone, PartialEq)]
pub struct Contribution {
    pub category: String,
    pub sentiment: f64,
    pub observed_at: i64,
}

impl Contribution {
    fn from_record(record: &SentimentRecord) -> Self {
        Self {
            category: record.category.clone(),
            sentiment: record.sentiment,
            observed_at: record.observed_at,
        }
    }
}

/// Policy deciding how long an admitted record keeps contributing.
///
/// Implementations must make eviction a pure function of `now` and the
/// ordered window contents, so lazy (per-record) and periodic (ticker)
/// eviction converge to the same state for the same input history.
pub trait WindowPolicy: Send {
    /// Admit a record; returns the contribution to add to category stats
    fn admit(&mut self, record: &SentimentRecord) -> Contribution;

    /// Remove and return every contribution that has aged out as of `now`
    fn evict(&mut self, now: i64) -> Vec<Contribution>;

    /// Number of contributions currently tracked by the policy
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Every record contributes forever. Stores nothing, so memory stays bounded
/// regardless of stream length.
#[derive(Debug, Default)]
pub struct CumulativeWindow;

impl CumulativeWindow {
    pub fn new() -> Self {
        Self
    }
}

impl WindowPolicy for CumulativeWindow {
    fn admit(&mut self, record: &SentimentRecord) -> Contribution {
        Contribution::from_record(record)
    }

    fn evict(&mut self, _now: i64) -> Vec<Contribution> {
        Vec::new()
    }

    fn len(&self) -> usize {
        0
    }
}

/// Sliding time window: a contribution is active while it falls inside the
/// half-open interval `(now - W, now]`. A record at exactly
/// `now - observed_at == W` is evicted.
#[derive(Debug)]
pub struct SlidingWindow {
    duration_secs: i64,
    /// Active contributions ordered by `observed_at` ascending
    entries: VecDeque<Contribution>,
}

impl SlidingWindow {
    pub fn new(duration_secs: u64) -> Self {
        Self {
            duration_secs: duration_secs as i64,
            entries: VecDeque::new(),
        }
    }

    pub fn duration_secs(&self) -> i64 {
        self.duration_secs
    }
}

impl WindowPolicy for SlidingWindow {
    fn admit(&mut self, record: &SentimentRecord) -> Contribution {
        let contribution = Contribution::from_record(record);

        // Keep entries ordered by observed_at even when the transport
        // delivers slightly out of order; eviction pops from the front.
        let insert_at = self
            .entries
            .iter()
            .rposition(|c| c.observed_at <= contribution.observed_at)
            .map(|i| i + 1)
            .unwrap_or(0);
        self.entries.insert(insert_at, contribution.clone());

        contribution
    }

    fn evict(&mut self, now: i64) -> Vec<Contribution> {
        let cutoff = now - self.duration_secs;
        let mut removed = Vec::new();
        while let Some(front) = self.entries.front() {
            if front.observed_at > cutoff {
                break;
            }
            removed.push(self.entries.pop_front().expect("front checked above"));
        }
        removed
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(category: &str, sentiment: f64, observed_at: i64) -> SentimentRecord {
        SentimentRecord {
            category: category.to_string(),
            sentiment,
            observed_at,
        }
    }

    #[test]
    fn test_cumulative_never_evicts() {
        let mut window = CumulativeWindow::new();
        window.admit(&record("tech", 0.8, 1000));
        window.admit(&record("tech", -0.2, 1001));

        assert!(window.evict(i64::MAX).is_empty());
    }

    #[test]
    fn test_sliding_window_boundary_is_exclusive() {
        let mut window = SlidingWindow::new(60);
        window.admit(&record("tech", 0.5, 1000));

        // Strictly inside the window: nothing evicted
        assert!(window.evict(1059).is_empty());

        // now - observed_at == W: exact tie is evicted
        let removed = window.evict(1060);
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].observed_at, 1000);
        assert!(window.is_empty());
    }

    #[test]
    fn test_sliding_window_partial_eviction() {
        let mut window = SlidingWindow::new(60);
        window.admit(&record("tech", 0.1, 1000));
        window.admit(&record("sports", 0.2, 1030));
        window.admit(&record("tech", 0.3, 1059));

        let removed = window.evict(1061);
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].category, "tech");
        assert_eq!(removed[0].observed_at, 1000);
        assert_eq!(window.len(), 2);
    }

    #[test]
    fn test_out_of_order_admit_keeps_eviction_order() {
        let mut window = SlidingWindow::new(60);
        window.admit(&record("a", 0.1, 1050));
        window.admit(&record("b", 0.2, 1000)); // late arrival
        window.admit(&record("c", 0.3, 1020));

        let removed = window.evict(1070);
        let timestamps: Vec<i64> = removed.iter().map(|c| c.observed_at).collect();
        assert_eq!(timestamps, vec![1000]);

        let removed = window.evict(1090);
        let timestamps: Vec<i64> = removed.iter().map(|c| c.observed_at).collect();
        assert_eq!(timestamps, vec![1020, 1050]);
    }

    #[test]
    fn test_eviction_is_pure_in_now() {
        // Lazy and periodic eviction converge: one big evict at `now`
        // removes the same set as repeated smaller evicts ending at `now`.
        let build = || {
            let mut w = SlidingWindow::new(10);
            for i in 0..5 {
                w.admit(&record("x", 0.1, 1000 + i * 3));
            }
            w
        };

        let mut all_at_once = build();
        let removed_once: Vec<i64> = all_at_once
            .evict(1012)
            .into_iter()
            .map(|c| c.observed_at)
            .collect();

        let mut stepped = build();
        let mut removed_stepped: Vec<i64> = Vec::new();
        for now in [1004, 1008, 1012] {
            removed_stepped.extend(stepped.evict(now).into_iter().map(|c| c.observed_at));
        }

        assert_eq!(removed_once, removed_stepped);
        assert_eq!(all_at_once.len(), stepped.len());
    }
}

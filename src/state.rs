//! In-memory aggregation state: per-category running statistics
//!
//! Mutated exclusively by the aggregator task; snapshots are the only view
//! that crosses a task boundary.

use crate::record::SentimentRecord;
use crate::window::Contribution;
use std::collections::HashMap;

/// Running statistics for one category.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct CategoryStats {
    pub count: u64,
    pub sum: f64,
    pub mean: f64,
    pub last_updated: i64,
}

/// Mapping from category to running stats, created empty at startup and
/// torn down at shutdown. No persistence: a restart resets to empty.
#[derive(Debug, Default)]
pub struct AggregationState {
    categories: HashMap<String, CategoryStats>,
}

impl AggregationState {
    pub fn new() -> Self {
        Self {
            categories: HashMap::new(),
        }
    }

    /// Fold an admitted record into its category's stats.
    ///
    /// The mean is recomputed from `sum / count` on every update rather than
    /// maintained with a running-mean formula, so drift cannot accumulate
    /// over long streams.
    pub fn apply_admit(&mut self, record: &SentimentRecord, now: i64) {
        let stats = self
            .categories
            .entry(record.category.clone())
            .or_insert(CategoryStats {
                count: 0,
                sum: 0.0,
                mean: 0.0,
                last_updated: now,
            });
        stats.count += 1;
        stats.sum += record.sentiment;
        stats.mean = stats.sum / stats.count as f64;
        stats.last_updated = now;
    }

    /// Subtract evicted contributions. A category whose count reaches 0 is
    /// removed from the map entirely, so idle categories neither hold memory
    /// nor show a stale zero; it reappears fresh on its next record.
    pub fn apply_evictions(&mut self, evicted: &[Contribution], now: i64) {
        for contribution in evicted {
            if let Some(stats) = self.categories.get_mut(&contribution.category) {
                stats.count = stats.count.saturating_sub(1);
                if stats.count == 0 {
                    self.categories.remove(&contribution.category);
                } else {
                    stats.sum -= contribution.sentiment;
                    stats.mean = stats.sum / stats.count as f64;
                    stats.last_updated = now;
                }
            } else {
                log::warn!(
                    "Eviction for unknown category '{}' ignored",
                    contribution.category
                );
            }
        }
    }

    pub fn get(&self, category: &str) -> Option<&CategoryStats> {
        self.categories.get(category)
    }

    pub fn categories(&self) -> &HashMap<String, CategoryStats> {
        &self.categories
    }

    pub fn category_count(&self) -> usize {
        self.categories.len()
    }
}

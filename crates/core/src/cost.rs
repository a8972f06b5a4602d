//! Diagnostic cost tracking.
//!
//! Observed evaluation times keyed by a node's textual representation, plus a
//! static estimate from declared resources. Used for strand dumps and
//! debugging only; nothing here influences scheduling correctness.

use crate::ResourceDef;
use dashmap::DashMap;
use std::time::Duration;

/// Static cost of touching a resource, in nanosecond-ish units.
pub fn resource_cost(name: &str) -> u64 {
    match name {
        "http" => 1_000_000,
        "io.stdin" | "io.stdout" | "io.stderr" => 200_000,
        "fs.local" => 100_000,
        _ => 0,
    }
}

/// Aggregated observations for one node text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CostEntry {
    /// Number of samples
    pub samples: u64,
    /// Sum of samples
    pub total: Duration,
    /// Fastest sample
    pub min: Duration,
    /// Slowest sample
    pub max: Duration,
}

impl CostEntry {
    fn first(elapsed: Duration) -> Self {
        Self { samples: 1, total: elapsed, min: elapsed, max: elapsed }
    }

    /// Mean of the samples.
    pub fn mean(&self) -> Duration {
        let samples = u32::try_from(self.samples).unwrap_or(u32::MAX).max(1);
        self.total / samples
    }
}

/// Cost cache owned by a single top-level run.
#[derive(Debug, Default)]
pub struct CostCache {
    entries: DashMap<String, CostEntry>,
}

impl CostCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one observed evaluation.
    pub fn record(&self, key: &str, elapsed: Duration) {
        self.entries
            .entry(key.to_string())
            .and_modify(|e| {
                e.samples += 1;
                e.total += elapsed;
                e.min = e.min.min(elapsed);
                e.max = e.max.max(elapsed);
            })
            .or_insert_with(|| CostEntry::first(elapsed));
    }

    /// Observations for a node text.
    pub fn get(&self, key: &str) -> Option<CostEntry> {
        self.entries.get(key).map(|e| *e)
    }

    /// Estimated cost: the observed mean when known, else the static resource cost.
    pub fn estimate(&self, key: &str, resources: &[ResourceDef]) -> u64 {
        if let Some(entry) = self.get(key) {
            return u64::try_from(entry.mean().as_nanos()).unwrap_or(u64::MAX);
        }
        resources.iter().map(|r| resource_cost(&r.name)).sum()
    }

    /// Number of distinct node texts observed.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was observed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_tracks_min_max_mean() {
        let cache = CostCache::new();
        cache.record("(@add 1 2)", Duration::from_micros(10));
        cache.record("(@add 1 2)", Duration::from_micros(30));

        let entry = cache.get("(@add 1 2)").unwrap();
        assert_eq!(entry.samples, 2);
        assert_eq!(entry.min, Duration::from_micros(10));
        assert_eq!(entry.max, Duration::from_micros(30));
        assert_eq!(entry.mean(), Duration::from_micros(20));
    }

    #[test]
    fn test_estimate_falls_back_to_resources() {
        let cache = CostCache::new();
        let resources = vec![ResourceDef::global("io.stdout"), ResourceDef::keyed("fs.local", 0)];
        assert_eq!(cache.estimate("(@print 1)", &resources), 300_000);
        assert_eq!(cache.estimate("1", &[]), 0);
    }
}

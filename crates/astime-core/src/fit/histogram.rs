use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Residual histogram with 1 ns wide bins centred on the fitted line.
///
/// Edges run from `low = -(ceil(max) + 1)` to `high = ceil(max) + 1`. Every
/// bin is half-open except the last, which also holds its upper edge. Only
/// non-empty bins are stored, keyed by their lower edge, so a few dropped
/// packets far off the line cost one entry rather than millions of zeros.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Histogram {
    pub low: i64,
    pub high: i64,
    pub counts: BTreeMap<i64, u64>,
}

impl Histogram {
    pub fn of_residuals(residuals: &[f64], max_abs: f64) -> Self {
        // Saturating casts; NaN collapses to an empty range around zero.
        let high = (max_abs.ceil() + 1.0).max(1.0) as i64;
        let low = -high;
        let mut counts = BTreeMap::new();
        for residual in residuals {
            let lower = (residual.floor() as i64).clamp(low, high - 1);
            *counts.entry(lower).or_insert(0) += 1;
        }
        Self { low, high, counts }
    }

    /// Number of 1 ns bins between `low` and `high`.
    pub fn bin_count(&self) -> u64 {
        self.high.abs_diff(self.low)
    }

    /// Count of the bin starting at `lower`.
    pub fn count(&self, lower: i64) -> u64 {
        self.counts.get(&lower).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// `(lower edge, upper edge, count)` of every non-empty bin.
    pub fn bins(&self) -> impl Iterator<Item = (i64, i64, u64)> + '_ {
        self.counts.iter().map(|(lower, count)| (*lower, lower + 1, *count))
    }

    /// All edges and counts, empty bins included, when there are at most
    /// `max_bins` of them.
    pub fn dense(&self, max_bins: u64) -> Option<(Vec<i64>, Vec<u64>)> {
        if self.bin_count() > max_bins {
            return None;
        }
        let edges: Vec<i64> = (self.low..=self.high).collect();
        let counts = (self.low..self.high).map(|lower| self.count(lower)).collect();
        Some((edges, counts))
    }
}

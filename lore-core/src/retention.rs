//! Retention policy — importance scoring and cleanup candidate selection.
//!
//! Importance blends how many characters still hold a live belief about a
//! lineage with how recently the fact was referenced. The recency factor
//! decays exponentially and is effectively zero past the configured
//! window, the same shape as a forgetting curve. Cleanup only *flags*:
//! history ledger entries are permanent and are never removed.

use serde::{Deserialize, Serialize};

use crate::config::RetentionConfig;
use crate::types::{FactId, ImportanceScore, LineageId};

// e^(-3) ≈ 0.05 — a fact unreferenced for a full window is near-worthless.
const DECAY_SHARPNESS: f32 = 3.0;

/// Recency decay factor: 1.0 at zero gap, approaching 0 past `window_ticks`.
#[must_use]
pub fn time_decay(gap_ticks: u64, window_ticks: u64) -> f32 {
    if window_ticks == 0 {
        return 0.0;
    }
    let normalized = gap_ticks as f32 / window_ticks as f32;
    (-DECAY_SHARPNESS * normalized).exp()
}

/// Importance of a fact given its live knowledge references and recency.
///
/// `min(1.0, live_refs × reference_weight × time_decay(gap))`
#[must_use]
pub fn importance(live_refs: usize, gap_ticks: u64, window_ticks: u64, weight: f32) -> f32 {
    (live_refs as f32 * weight * time_decay(gap_ticks, window_ticks)).min(1.0)
}

/// Whether a fact should be flagged for cleanup: its recomputed score is
/// below the threshold *and* nobody holds a live belief about it.
#[must_use]
pub fn is_cleanup_candidate(score: f32, live_refs: usize, threshold: f32) -> bool {
    score < threshold && live_refs == 0
}

/// One scored lineage head from a retention scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredFact {
    /// The lineage scanned.
    pub lineage: LineageId,
    /// Its current head fact.
    pub head: FactId,
    /// The recomputed importance.
    pub score: ImportanceScore,
    /// Live knowledge references at scan time.
    pub live_refs: usize,
    /// Whether the head was flagged for cleanup.
    pub flagged: bool,
}

/// Outcome of a full retention scan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetentionReport {
    /// Every lineage head scored, in descending importance.
    pub scored: Vec<ScoredFact>,
    /// Number of heads flagged as cleanup candidates.
    pub flagged: usize,
}

impl RetentionReport {
    /// The flagged heads only.
    #[must_use]
    pub fn candidates(&self) -> Vec<FactId> {
        self.scored
            .iter()
            .filter(|s| s.flagged)
            .map(|s| s.head)
            .collect()
    }
}

/// Convert the configured decay window from days to ticks.
#[must_use]
pub fn window_ticks(config: &RetentionConfig, ticks_per_day: u64) -> u64 {
    (config.decay_window_days * ticks_per_day as f32) as u64
}

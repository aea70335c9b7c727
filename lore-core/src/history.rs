//! History ledger — append-only temporal snapshots per fact lineage.
//!
//! Every fact mutation produces exactly one immutable snapshot with a
//! validity window `[valid_from, valid_to)` in game time. Windows within a
//! lineage are non-overlapping and contiguous, and exactly one window per
//! lineage is open (`valid_to = None`) at any instant. The ledger is a
//! permanent audit record: nothing in it is ever deleted.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::error::{LoreError, Result};
use crate::graph::FactRelationship;
use crate::types::{
    EventId, FactId, FactTruth, LineageId, LocationSnapshotRef, SnapshotId, WorldTimestamp,
};

/// Immutable copy of a fact's mutable fields at a point in its lineage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactSnapshot {
    /// Unique identifier.
    pub id: SnapshotId,
    /// The fact version this snapshot captures.
    pub fact: FactId,
    /// Fact content at snapshot time.
    pub content: String,
    /// Truth standing (category + creator) at snapshot time.
    pub truth: FactTruth,
    /// Importance score at snapshot time.
    pub importance_score: f32,
    /// When the described state occurred in-world, if known.
    pub when_occurred: Option<u64>,
    /// Free-text context for why the fact holds.
    pub why_context: Option<String>,
    /// Opaque location reference at snapshot time.
    pub location_snapshot: Option<LocationSnapshotRef>,
    /// Live relationships at the moment the window closed. Empty while
    /// the window is still open; filled in by the closing mutation.
    pub links: Vec<FactRelationship>,
    /// Start of the validity window (inclusive).
    pub valid_from: WorldTimestamp,
    /// End of the validity window (exclusive); `None` while current.
    pub valid_to: Option<WorldTimestamp>,
    /// Why this version came to be ("created", supersession reason, ...).
    pub change_reason: Option<String>,
    /// The world event that triggered the change, if any.
    pub changed_by_event: Option<EventId>,
}

impl FactSnapshot {
    /// Whether `tick` falls inside this snapshot's validity window.
    #[must_use]
    pub fn covers(&self, tick: u64) -> bool {
        tick >= self.valid_from.tick && self.valid_to.is_none_or(|to| tick < to.tick)
    }

    /// Whether this is the lineage's current (open) window.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.valid_to.is_none()
    }
}

/// The append-only ledger, keyed by lineage. Windows per lineage are kept
/// sorted by `valid_from` so point-in-time lookups are a binary search.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryLedger {
    windows: HashMap<LineageId, Vec<FactSnapshot>>,
}

impl HistoryLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new open snapshot for `lineage`, closing the previous open
    /// window at the new snapshot's `valid_from` and stamping it with the
    /// relationships that were live at close time.
    ///
    /// # Errors
    ///
    /// [`LoreError::Validation`] if the snapshot arrives already closed, and
    /// [`LoreError::Consistency`] if the new window would start before the
    /// previous one — that can only happen if the world clock ran backwards.
    pub fn append(
        &mut self,
        lineage: LineageId,
        snapshot: FactSnapshot,
        links_at_close: Vec<FactRelationship>,
    ) -> Result<()> {
        if snapshot.valid_to.is_some() {
            return Err(LoreError::validation(
                "appended snapshots must have an open window",
            ));
        }

        let windows = self.windows.entry(lineage).or_default();

        if let Some(open) = windows.last_mut() {
            if open.valid_to.is_some() {
                return Err(LoreError::consistency(format!(
                    "lineage {lineage} has no open window to close"
                )));
            }
            if snapshot.valid_from.tick < open.valid_from.tick {
                return Err(LoreError::consistency(format!(
                    "lineage {lineage}: new window starts at tick {} before the open \
                     window's tick {}",
                    snapshot.valid_from.tick, open.valid_from.tick
                )));
            }
            open.valid_to = Some(snapshot.valid_from);
            open.links = links_at_close;
        }

        debug!(
            %lineage,
            fact = %snapshot.fact,
            valid_from = snapshot.valid_from.tick,
            "History window opened"
        );
        windows.push(snapshot);
        Ok(())
    }

    /// The snapshot whose window covers `tick`, or `None` when `tick`
    /// precedes the lineage's first `valid_from`.
    ///
    /// # Errors
    ///
    /// [`LoreError::LineageNotFound`] for an unknown lineage, and
    /// [`LoreError::Consistency`] if two windows cover the same tick.
    pub fn at(&self, lineage: LineageId, tick: u64) -> Result<Option<&FactSnapshot>> {
        let windows = self
            .windows
            .get(&lineage)
            .ok_or(LoreError::LineageNotFound(lineage))?;

        // Index of the last window starting at or before `tick`.
        let idx = windows.partition_point(|w| w.valid_from.tick <= tick);
        if idx == 0 {
            return Ok(None);
        }
        let candidate = &windows[idx - 1];
        if !candidate.covers(tick) {
            // A gap between windows; contiguity says this cannot happen.
            return Err(LoreError::consistency(format!(
                "lineage {lineage}: no window covers tick {tick}"
            )));
        }
        if idx < windows.len() && windows[idx].covers(tick) {
            return Err(LoreError::consistency(format!(
                "lineage {lineage}: overlapping windows at tick {tick}"
            )));
        }
        Ok(Some(candidate))
    }

    /// All windows for a lineage in `valid_from` order — the full audit walk.
    ///
    /// # Errors
    ///
    /// [`LoreError::LineageNotFound`] for an unknown lineage.
    pub fn windows(&self, lineage: LineageId) -> Result<&[FactSnapshot]> {
        self.windows
            .get(&lineage)
            .map(Vec::as_slice)
            .ok_or(LoreError::LineageNotFound(lineage))
    }

    /// The lineage's current (open) snapshot, if the lineage exists.
    #[must_use]
    pub fn open_window(&self, lineage: LineageId) -> Option<&FactSnapshot> {
        self.windows
            .get(&lineage)
            .and_then(|ws| ws.last())
            .filter(|w| w.is_open())
    }

    /// Number of lineages tracked.
    #[must_use]
    pub fn lineage_count(&self) -> usize {
        self.windows.len()
    }
}

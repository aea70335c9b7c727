//! Knowledge store — what each character believes, version by version.
//!
//! A character's belief about one fact lineage is its own supersession
//! chain: `learn` opens it, `update_belief` appends to it (optimistic
//! version check), `forget` soft-deletes the current record without a
//! successor. At most one record per `(character, lineage)` is current and
//! live at a time — enforced structurally by the `current` index.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::error::{LoreError, Result};
use crate::types::{
    CharacterId, DistortionKind, FactId, KnowledgeId, LineageId, SnapshotId, SourceKind,
    WorldTimestamp, unit,
};

/// One version of a character's belief about a fact lineage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterKnowledge {
    /// Unique identifier.
    pub id: KnowledgeId,
    /// The believing character.
    pub character: CharacterId,
    /// The fact version the character learned.
    pub fact: FactId,
    /// The lineage the belief tracks.
    pub lineage: LineageId,
    /// Which history snapshot the character learned, when known.
    pub learned_snapshot: Option<SnapshotId>,
    /// Belief version, strictly increasing per `(character, lineage)`.
    pub version: u32,
    /// Whether this is the character's current belief.
    pub is_current: bool,
    /// The belief version that replaced this one, if any.
    pub superseded_by: Option<KnowledgeId>,
    /// Confidence in the belief (0.0–1.0).
    pub belief_strength: f32,
    /// How the character came to hold this belief.
    pub source_kind: SourceKind,
    /// Who passed the information along, if anyone.
    pub source_character: Option<CharacterId>,
    /// Whether the character will pass this belief on.
    pub will_share: bool,
    /// How the belief deviates from the fact, if it does.
    pub distortion: Option<DistortionKind>,
    /// When the belief was formed.
    pub learned_at: WorldTimestamp,
    /// Soft-delete flag — set when the character forgets.
    pub deleted: bool,
}

/// Input for `learn` and `update_belief`.
#[derive(Debug, Clone)]
pub struct BeliefDraft {
    /// The fact version being learned.
    pub fact: FactId,
    /// Which history snapshot the character learned, when known.
    pub learned_snapshot: Option<SnapshotId>,
    /// Confidence (clamped to 0.0–1.0).
    pub belief_strength: f32,
    /// Provenance of the belief.
    pub source_kind: SourceKind,
    /// Who passed it along.
    pub source_character: Option<CharacterId>,
    /// Whether the character will pass it on.
    pub will_share: bool,
    /// Deviation from the fact, if any.
    pub distortion: Option<DistortionKind>,
}

impl BeliefDraft {
    /// A draft with the common fields; the rest default to none/share.
    #[must_use]
    pub fn new(fact: FactId, source_kind: SourceKind, belief_strength: f32) -> Self {
        Self {
            fact,
            learned_snapshot: None,
            belief_strength,
            source_kind,
            source_character: None,
            will_share: true,
            distortion: None,
        }
    }

    /// Record which snapshot was learned.
    #[must_use]
    pub fn snapshot(mut self, snapshot: SnapshotId) -> Self {
        self.learned_snapshot = Some(snapshot);
        self
    }

    /// Record who passed the information along.
    #[must_use]
    pub fn from_character(mut self, source: CharacterId) -> Self {
        self.source_character = Some(source);
        self
    }

    /// Record a distortion.
    #[must_use]
    pub fn distorted(mut self, kind: DistortionKind) -> Self {
        self.distortion = Some(kind);
        self
    }
}

/// What the character believes versus what the lineage head now says.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DivergenceReport {
    /// The character whose belief diverged.
    pub character: CharacterId,
    /// The lineage in question.
    pub lineage: LineageId,
    /// Content the character learned.
    pub believed_content: String,
    /// Content the lineage head holds now.
    pub current_content: String,
    /// Ticks between learning and the head's window opening.
    pub ticks_behind: u64,
}

/// Per-character belief store with an explicit current-belief index.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnowledgeStore {
    records: HashMap<KnowledgeId, CharacterKnowledge>,
    // character → lineage → the one current live record.
    current: HashMap<CharacterId, HashMap<LineageId, KnowledgeId>>,
}

impl KnowledgeStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Form a first belief for `(character, lineage)`.
    ///
    /// # Errors
    ///
    /// [`LoreError::Validation`] if a current live record already exists —
    /// use [`KnowledgeStore::update_belief`] for that.
    pub fn learn(
        &mut self,
        character: CharacterId,
        lineage: LineageId,
        draft: BeliefDraft,
        now: WorldTimestamp,
    ) -> Result<KnowledgeId> {
        if self.current_id(character, lineage).is_some() {
            return Err(LoreError::validation(format!(
                "character {character} already holds current knowledge of lineage {lineage}; \
                 use update_belief"
            )));
        }

        let id = KnowledgeId::new();
        let record = CharacterKnowledge {
            id,
            character,
            fact: draft.fact,
            lineage,
            learned_snapshot: draft.learned_snapshot,
            version: 1,
            is_current: true,
            superseded_by: None,
            belief_strength: unit(draft.belief_strength),
            source_kind: draft.source_kind,
            source_character: draft.source_character,
            will_share: draft.will_share,
            distortion: draft.distortion,
            learned_at: now,
            deleted: false,
        };
        self.records.insert(id, record);
        self.current
            .entry(character)
            .or_default()
            .insert(lineage, id);

        debug!(%character, %lineage, knowledge = %id, "Belief formed");
        Ok(id)
    }

    /// Replace the current belief with a new version.
    ///
    /// The caller supplies the version it read (`expected_version`); if the
    /// stored version moved on since, the update lost the race.
    ///
    /// # Errors
    ///
    /// [`LoreError::KnowledgeNotFound`] when there is no current record;
    /// [`LoreError::Conflict`] when `expected_version` is stale;
    /// [`LoreError::Consistency`] when the current index points at a record
    /// that does not exist.
    pub fn update_belief(
        &mut self,
        character: CharacterId,
        lineage: LineageId,
        expected_version: u32,
        draft: BeliefDraft,
        now: WorldTimestamp,
    ) -> Result<KnowledgeId> {
        let prev_id = self
            .current_id(character, lineage)
            .ok_or(LoreError::KnowledgeNotFound { character, lineage })?;

        let prev_version = self
            .records
            .get(&prev_id)
            .ok_or_else(|| {
                LoreError::consistency(format!(
                    "current index for character {character}, lineage {lineage} points at \
                     missing record {prev_id}"
                ))
            })?
            .version;
        if prev_version != expected_version {
            return Err(LoreError::conflict(format!(
                "belief version moved from {expected_version} to {prev_version} for \
                 character {character}, lineage {lineage}"
            )));
        }

        let id = KnowledgeId::new();
        let record = CharacterKnowledge {
            id,
            character,
            fact: draft.fact,
            lineage,
            learned_snapshot: draft.learned_snapshot,
            version: prev_version + 1,
            is_current: true,
            superseded_by: None,
            belief_strength: unit(draft.belief_strength),
            source_kind: draft.source_kind,
            source_character: draft.source_character,
            will_share: draft.will_share,
            distortion: draft.distortion,
            learned_at: now,
            deleted: false,
        };
        self.records.insert(id, record);

        let prev = self.records.get_mut(&prev_id).ok_or_else(|| {
            LoreError::consistency(format!(
                "current index for character {character}, lineage {lineage} points at \
                 missing record {prev_id}"
            ))
        })?;
        prev.is_current = false;
        prev.superseded_by = Some(id);

        self.current
            .entry(character)
            .or_default()
            .insert(lineage, id);

        debug!(
            %character,
            %lineage,
            version = prev_version + 1,
            "Belief updated"
        );
        Ok(id)
    }

    /// The character's current live belief about a lineage.
    #[must_use]
    pub fn current(&self, character: CharacterId, lineage: LineageId) -> Option<&CharacterKnowledge> {
        self.current_id(character, lineage)
            .and_then(|id| self.records.get(&id))
    }

    /// Soft-delete the current belief without a successor — the character
    /// simply no longer holds it.
    ///
    /// # Errors
    /// [`LoreError::KnowledgeNotFound`] when there is no current record.
    pub fn forget(
        &mut self,
        character: CharacterId,
        lineage: LineageId,
    ) -> Result<KnowledgeId> {
        let id = self
            .current_id(character, lineage)
            .ok_or(LoreError::KnowledgeNotFound { character, lineage })?;

        if let Some(record) = self.records.get_mut(&id) {
            record.deleted = true;
            record.is_current = false;
        }
        if let Some(by_lineage) = self.current.get_mut(&character) {
            by_lineage.remove(&lineage);
        }

        debug!(%character, %lineage, knowledge = %id, "Belief forgotten");
        Ok(id)
    }

    /// Number of live beliefs a character currently holds.
    #[must_use]
    pub fn live_count(&self, character: CharacterId) -> usize {
        self.current.get(&character).map_or(0, HashMap::len)
    }

    /// Number of live beliefs referencing a lineage, across all characters.
    #[must_use]
    pub fn live_refs(&self, lineage: LineageId) -> usize {
        self.current
            .values()
            .filter(|by_lineage| by_lineage.contains_key(&lineage))
            .count()
    }

    /// Forget the character's weakest beliefs until at most `ceiling` live
    /// records remain. Candidates are chosen by ascending
    /// `(belief_strength, learned_at)`, weak and old first, with the
    /// lineage id as the final tie-break so a full tie prunes the same
    /// belief on every run.
    ///
    /// Returns the forgotten lineages.
    pub fn prune_to(&mut self, character: CharacterId, ceiling: usize) -> Vec<LineageId> {
        let excess = self.live_count(character).saturating_sub(ceiling);
        if excess == 0 {
            return Vec::new();
        }

        let mut candidates: Vec<(OrderedFloat<f32>, u64, LineageId)> = self
            .current
            .get(&character)
            .map(|by_lineage| {
                by_lineage
                    .iter()
                    .filter_map(|(lineage, id)| self.records.get(id).map(|r| (lineage, r)))
                    .map(|(lineage, r)| {
                        (OrderedFloat(r.belief_strength), r.learned_at.tick, *lineage)
                    })
                    .collect()
            })
            .unwrap_or_default();
        candidates.sort_by_key(|&(strength, tick, lineage)| (strength, tick, lineage.0));

        let mut forgotten = Vec::with_capacity(excess);
        for (_, _, lineage) in candidates.into_iter().take(excess) {
            if self.forget(character, lineage).is_ok() {
                forgotten.push(lineage);
            }
        }
        if !forgotten.is_empty() {
            debug!(%character, pruned = forgotten.len(), "Capacity pruning ran");
        }
        forgotten
    }

    /// Look up any belief record, current or historical.
    #[must_use]
    pub fn record(&self, id: KnowledgeId) -> Option<&CharacterKnowledge> {
        self.records.get(&id)
    }

    /// Total number of belief records, historical and deleted included.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Iterate all belief records, historical and deleted included.
    pub fn records(&self) -> impl Iterator<Item = &CharacterKnowledge> {
        self.records.values()
    }

    fn current_id(&self, character: CharacterId, lineage: LineageId) -> Option<KnowledgeId> {
        self.current
            .get(&character)
            .and_then(|by_lineage| by_lineage.get(&lineage))
            .copied()
    }

    #[cfg(test)]
    pub(crate) fn corrupt_current_index(&mut self, character: CharacterId, lineage: LineageId) {
        self.current
            .entry(character)
            .or_default()
            .insert(lineage, KnowledgeId::new());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(tick: u64) -> WorldTimestamp {
        WorldTimestamp::now(tick)
    }

    #[test]
    fn learn_then_current() {
        let mut store = KnowledgeStore::new();
        let character = CharacterId::new();
        let lineage = LineageId::new();
        let fact = FactId::new();

        store
            .learn(
                character,
                lineage,
                BeliefDraft::new(fact, SourceKind::Rumor, 0.6),
                ts(1),
            )
            .expect("learn");

        let belief = store.current(character, lineage).expect("current");
        assert_eq!(belief.version, 1);
        assert!(belief.is_current);
        assert!((belief.belief_strength - 0.6).abs() < f32::EPSILON);
        assert_eq!(store.live_count(character), 1);
        assert_eq!(store.live_refs(lineage), 1);
    }

    #[test]
    fn double_learn_is_a_validation_error() {
        let mut store = KnowledgeStore::new();
        let character = CharacterId::new();
        let lineage = LineageId::new();
        let fact = FactId::new();

        store
            .learn(
                character,
                lineage,
                BeliefDraft::new(fact, SourceKind::Witness, 1.0),
                ts(1),
            )
            .expect("first learn");
        let err = store
            .learn(
                character,
                lineage,
                BeliefDraft::new(fact, SourceKind::Rumor, 0.5),
                ts(2),
            )
            .expect_err("second learn");
        assert!(matches!(err, LoreError::Validation { .. }));
    }

    #[test]
    fn update_bumps_version_and_flips_predecessor() {
        let mut store = KnowledgeStore::new();
        let character = CharacterId::new();
        let lineage = LineageId::new();

        let first = store
            .learn(
                character,
                lineage,
                BeliefDraft::new(FactId::new(), SourceKind::Rumor, 0.6),
                ts(1),
            )
            .expect("learn");
        let second = store
            .update_belief(
                character,
                lineage,
                1,
                BeliefDraft::new(FactId::new(), SourceKind::ToldBy, 0.9),
                ts(10),
            )
            .expect("update");

        let old = store.record(first).expect("old record");
        assert!(!old.is_current);
        assert_eq!(old.superseded_by, Some(second));

        let new = store.current(character, lineage).expect("current");
        assert_eq!(new.id, second);
        assert_eq!(new.version, 2);
    }

    #[test]
    fn stale_version_loses_the_race() {
        let mut store = KnowledgeStore::new();
        let character = CharacterId::new();
        let lineage = LineageId::new();

        store
            .learn(
                character,
                lineage,
                BeliefDraft::new(FactId::new(), SourceKind::Rumor, 0.6),
                ts(1),
            )
            .expect("learn");
        store
            .update_belief(
                character,
                lineage,
                1,
                BeliefDraft::new(FactId::new(), SourceKind::ToldBy, 0.8),
                ts(5),
            )
            .expect("winner");

        // A second caller still holding version 1 must fail.
        let err = store
            .update_belief(
                character,
                lineage,
                1,
                BeliefDraft::new(FactId::new(), SourceKind::Rumor, 0.4),
                ts(6),
            )
            .expect_err("stale");
        assert!(matches!(err, LoreError::Conflict { .. }));
    }

    #[test]
    fn update_without_record_is_not_found() {
        let mut store = KnowledgeStore::new();
        let err = store
            .update_belief(
                CharacterId::new(),
                LineageId::new(),
                1,
                BeliefDraft::new(FactId::new(), SourceKind::Rumor, 0.5),
                ts(1),
            )
            .expect_err("nothing to update");
        assert!(matches!(err, LoreError::KnowledgeNotFound { .. }));
    }

    #[test]
    fn forget_leaves_no_current_record() {
        let mut store = KnowledgeStore::new();
        let character = CharacterId::new();
        let lineage = LineageId::new();

        let id = store
            .learn(
                character,
                lineage,
                BeliefDraft::new(FactId::new(), SourceKind::Memory, 0.3),
                ts(1),
            )
            .expect("learn");
        store.forget(character, lineage).expect("forget");

        assert!(store.current(character, lineage).is_none());
        assert_eq!(store.live_refs(lineage), 0);

        // Forgetting is not supersession: the record is deleted, not replaced.
        let record = store.record(id).expect("record kept");
        assert!(record.deleted);
        assert!(record.superseded_by.is_none());

        // A character can learn the lineage afresh afterwards.
        store
            .learn(
                character,
                lineage,
                BeliefDraft::new(FactId::new(), SourceKind::Research, 0.8),
                ts(20),
            )
            .expect("relearn");
    }

    #[test]
    fn prune_forgets_weakest_oldest_first() {
        let mut store = KnowledgeStore::new();
        let character = CharacterId::new();

        let weak_old = LineageId::new();
        let weak_new = LineageId::new();
        let strong = LineageId::new();

        store
            .learn(
                character,
                weak_old,
                BeliefDraft::new(FactId::new(), SourceKind::Rumor, 0.2),
                ts(1),
            )
            .expect("learn");
        store
            .learn(
                character,
                weak_new,
                BeliefDraft::new(FactId::new(), SourceKind::Rumor, 0.2),
                ts(100),
            )
            .expect("learn");
        store
            .learn(
                character,
                strong,
                BeliefDraft::new(FactId::new(), SourceKind::Witness, 0.9),
                ts(1),
            )
            .expect("learn");

        let forgotten = store.prune_to(character, 2);
        assert_eq!(forgotten, vec![weak_old], "weakest and oldest goes first");
        assert_eq!(store.live_count(character), 2);
        assert!(store.current(character, strong).is_some());
    }

    #[test]
    fn prune_breaks_full_ties_by_lineage_id() {
        let character = CharacterId::new();
        let lineages = [LineageId::new(), LineageId::new(), LineageId::new()];
        let expected = *lineages.iter().min_by_key(|l| l.0).expect("non-empty");

        // Identical strength and tick across all three, run twice: the
        // pruned lineage must not depend on map iteration order.
        for _ in 0..2 {
            let mut store = KnowledgeStore::new();
            for lineage in lineages {
                store
                    .learn(
                        character,
                        lineage,
                        BeliefDraft::new(FactId::new(), SourceKind::Rumor, 0.3),
                        ts(5),
                    )
                    .expect("learn");
            }
            assert_eq!(store.prune_to(character, 2), vec![expected]);
        }
    }

    #[test]
    fn dangling_current_index_is_a_consistency_error() {
        let mut store = KnowledgeStore::new();
        let character = CharacterId::new();
        let lineage = LineageId::new();

        store
            .learn(
                character,
                lineage,
                BeliefDraft::new(FactId::new(), SourceKind::Witness, 0.8),
                ts(1),
            )
            .expect("learn");
        store.corrupt_current_index(character, lineage);

        let err = store
            .update_belief(
                character,
                lineage,
                1,
                BeliefDraft::new(FactId::new(), SourceKind::Witness, 0.9),
                ts(2),
            )
            .expect_err("dangling index must not panic");
        assert!(matches!(err, LoreError::Consistency { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn at_most_one_current_live_record_per_pair() {
        let mut store = KnowledgeStore::new();
        let character = CharacterId::new();
        let lineage = LineageId::new();

        store
            .learn(
                character,
                lineage,
                BeliefDraft::new(FactId::new(), SourceKind::Rumor, 0.5),
                ts(1),
            )
            .expect("learn");
        for version in 1..=4u32 {
            store
                .update_belief(
                    character,
                    lineage,
                    version,
                    BeliefDraft::new(FactId::new(), SourceKind::Rumor, 0.5),
                    ts(u64::from(version) * 10),
                )
                .expect("update");
        }

        assert_eq!(store.record_count(), 5);
        let current_live = store
            .records()
            .filter(|r| r.is_current && !r.deleted)
            .count();
        assert_eq!(current_live, 1);

        let versions: Vec<u32> = {
            let mut v: Vec<u32> = store.records().map(|r| r.version).collect();
            v.sort_unstable();
            v
        };
        assert_eq!(versions, vec![1, 2, 3, 4, 5], "versions strictly increase");
    }
}

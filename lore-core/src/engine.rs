//! Engine facade — one API over facts, history, relationships, knowledge,
//! propagation and retention.
//!
//! The engine owns every sub-store and sequences each operation's writes so
//! the cross-store invariants hold: a fact mutation always lands in the
//! ledger, supersession stamps the closing window with the relationships
//! live at close time, and belief records always point at real facts. The
//! whole engine serializes as one value, which is what the persistence
//! layer saves per world.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::LoreConfig;
use crate::error::{LoreError, Result};
use crate::fact::{Fact, FactDraft, FactStore};
use crate::graph::{FactRelationship, RelationshipGraph};
use crate::history::{FactSnapshot, HistoryLedger};
use crate::ingest::{FactCandidate, IngestReport};
use crate::knowledge::{BeliefDraft, CharacterKnowledge, DivergenceReport, KnowledgeStore};
use crate::retention::{self, RetentionReport, ScoredFact};
use crate::rumor::{self, Delivery, DistortionBias, TrustGraph};
use crate::types::{
    CharacterId, EntityRef, EventId, FactId, ImportanceScore, KnowledgeId, SnapshotId,
    WorldTimestamp,
};

/// Outcome of one propagation run.
#[derive(Debug, Clone)]
pub struct PropagationReport {
    /// The planned transmissions, in hop order.
    pub deliveries: Vec<Delivery>,
    /// Beliefs formed for characters who knew nothing of the lineage.
    pub learned: Vec<KnowledgeId>,
    /// Beliefs updated for characters who already held one.
    pub updated: Vec<KnowledgeId>,
    /// Deliveries that failed to apply.
    pub failed: usize,
}

impl PropagationReport {
    /// Characters reached by the walk.
    #[must_use]
    pub fn reached(&self) -> usize {
        self.deliveries.len()
    }
}

/// The LORE engine: the full knowledge state of one game world.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoreEngine {
    config: LoreConfig,
    facts: FactStore,
    ledger: HistoryLedger,
    graph: RelationshipGraph,
    knowledge: KnowledgeStore,
}

impl Default for LoreEngine {
    fn default() -> Self {
        Self::new(LoreConfig::default())
    }
}

impl LoreEngine {
    /// Create an empty engine under the given configuration.
    #[must_use]
    pub fn new(config: LoreConfig) -> Self {
        let facts = FactStore::new(config.facts.max_content_chars);
        Self {
            config,
            facts,
            ledger: HistoryLedger::new(),
            graph: RelationshipGraph::new(),
            knowledge: KnowledgeStore::new(),
        }
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &LoreConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Facts and history
    // -----------------------------------------------------------------------

    /// Create a fact in a fresh lineage and open its first history window.
    ///
    /// # Errors
    ///
    /// [`LoreError::Validation`] on empty/oversized content or a narrative
    /// category without a creator.
    pub fn create_fact(&mut self, draft: FactDraft, now: WorldTimestamp) -> Result<FactId> {
        let truth = self.facts.validate(&draft)?;
        let origin_event = draft.origin_event;
        let fact = self.facts.insert_new(draft, truth, now);
        let (id, lineage) = (fact.id, fact.lineage);
        let snapshot = open_snapshot(fact, now, Some("created".to_string()), origin_event);

        self.ledger.append(lineage, snapshot, Vec::new())?;
        info!(fact = %id, %lineage, category = fact_category_name(&self.facts, id), "Fact created");
        Ok(id)
    }

    /// Replace the lineage head with a new version.
    ///
    /// Closes the old head's history window at `now`, stamping it with the
    /// relationships live at that moment, and opens a window for the new
    /// version. The old fact is kept with its forward pointer set.
    ///
    /// # Errors
    ///
    /// [`LoreError::Conflict`] if `fact_id` is already superseded — a
    /// non-head version cannot fork the chain. [`LoreError::Validation`]
    /// for a bad draft, [`LoreError::Consistency`] if the world clock ran
    /// backwards or lineage state is corrupted.
    pub fn supersede(
        &mut self,
        fact_id: FactId,
        draft: FactDraft,
        now: WorldTimestamp,
        change_reason: Option<String>,
        changed_by_event: Option<EventId>,
    ) -> Result<FactId> {
        let old = self.facts.get(fact_id)?;
        if let Some(newer) = old.superseded_by {
            return Err(LoreError::conflict(format!(
                "fact {fact_id} was already superseded by {newer}"
            )));
        }
        let lineage = old.lineage;
        let head = self.facts.head_of(lineage)?;
        if head.id != fact_id {
            return Err(LoreError::consistency(format!(
                "fact {fact_id} has no forward pointer but lineage {lineage} records head {}",
                head.id
            )));
        }
        if let Some(open) = self.ledger.open_window(lineage) {
            if now.tick < open.valid_from.tick {
                return Err(LoreError::consistency(format!(
                    "supersede at tick {} precedes the open window of lineage {lineage}",
                    now.tick
                )));
            }
        }
        let truth = self.facts.validate(&draft)?;

        let closing_links = self.graph.snapshot_links(fact_id);
        let new_id = self.facts.insert_successor(fact_id, draft, truth, now)?;
        let reason = change_reason.or_else(|| Some("superseded".to_string()));
        let snapshot = open_snapshot(self.facts.get(new_id)?, now, reason, changed_by_event);
        self.ledger.append(lineage, snapshot, closing_links)?;

        info!(old = %fact_id, new = %new_id, %lineage, tick = now.tick, "Fact superseded");
        Ok(new_id)
    }

    /// Look up a fact version.
    ///
    /// # Errors
    /// [`LoreError::FactNotFound`] for an unknown id.
    pub fn fact(&self, id: FactId) -> Result<&Fact> {
        self.facts.get(id)
    }

    /// Follow supersession pointers from any version to the current head.
    ///
    /// # Errors
    ///
    /// [`LoreError::FactNotFound`] for an unknown id,
    /// [`LoreError::Consistency`] on corrupted chain state.
    pub fn resolve_head(&self, id: FactId) -> Result<&Fact> {
        self.facts.resolve_head(id)
    }

    /// The full history walk of the fact's lineage, oldest window first.
    ///
    /// # Errors
    /// [`LoreError::FactNotFound`] for an unknown id.
    pub fn audit(&self, fact_id: FactId) -> Result<&[FactSnapshot]> {
        let lineage = self.facts.lineage_of(fact_id)?;
        self.ledger.windows(lineage)
    }

    /// What the fact's lineage said at `tick`, or `None` if the lineage did
    /// not exist yet.
    ///
    /// # Errors
    ///
    /// [`LoreError::FactNotFound`] for an unknown id,
    /// [`LoreError::Consistency`] if ledger windows gap or overlap.
    pub fn fact_at(&self, fact_id: FactId, tick: u64) -> Result<Option<&FactSnapshot>> {
        let lineage = self.facts.lineage_of(fact_id)?;
        self.ledger.at(lineage, tick)
    }

    // -----------------------------------------------------------------------
    // Relationships
    // -----------------------------------------------------------------------

    /// Link a fact to an entity under a role. Relinking the same triple
    /// updates it instead of duplicating. Bumps the fact's reference time.
    ///
    /// # Errors
    /// [`LoreError::FactNotFound`] for an unknown fact.
    pub fn link(
        &mut self,
        fact_id: FactId,
        entity: EntityRef,
        role: impl Into<String>,
        is_primary: bool,
        strength: f32,
        now: WorldTimestamp,
    ) -> Result<()> {
        self.facts.get(fact_id)?;
        self.graph.link(fact_id, entity, role, is_primary, strength, now);
        self.facts.touch(fact_id, now)
    }

    /// Soft-delete every live edge between a fact and an entity. Returns
    /// how many edges were removed.
    ///
    /// # Errors
    /// [`LoreError::FactNotFound`] for an unknown fact.
    pub fn unlink(&mut self, fact_id: FactId, entity: EntityRef) -> Result<usize> {
        self.facts.get(fact_id)?;
        Ok(self.graph.unlink(fact_id, entity))
    }

    /// Live relationships attached to a fact.
    ///
    /// # Errors
    /// [`LoreError::FactNotFound`] for an unknown fact.
    pub fn links_for(&self, fact_id: FactId) -> Result<Vec<&FactRelationship>> {
        self.facts.get(fact_id)?;
        Ok(self.graph.links_for(fact_id))
    }

    /// Facts linked to an entity, optionally filtered by role.
    #[must_use]
    pub fn facts_for(&self, entity: EntityRef, role: Option<&str>) -> Vec<FactId> {
        self.graph.facts_for(entity, role)
    }

    // -----------------------------------------------------------------------
    // Knowledge
    // -----------------------------------------------------------------------

    /// A character forms a first belief about the fact's lineage.
    ///
    /// If the draft carries no snapshot reference, the lineage's current
    /// open window is recorded as what was learned. Learning may push the
    /// character over the live-belief ceiling, in which case the weakest
    /// beliefs are forgotten.
    ///
    /// # Errors
    ///
    /// [`LoreError::FactNotFound`] for an unknown fact, and
    /// [`LoreError::Validation`] if the character already holds a current
    /// belief about the lineage.
    pub fn learn(
        &mut self,
        character: CharacterId,
        mut draft: BeliefDraft,
        now: WorldTimestamp,
    ) -> Result<KnowledgeId> {
        let lineage = self.facts.lineage_of(draft.fact)?;
        if draft.learned_snapshot.is_none() {
            draft.learned_snapshot = self.open_snapshot_id(lineage);
        }
        let fact = draft.fact;
        let id = self.knowledge.learn(character, lineage, draft, now)?;
        self.facts.touch(fact, now)?;

        let pruned = self
            .knowledge
            .prune_to(character, self.config.knowledge.max_live_per_character);
        if !pruned.is_empty() {
            debug!(%character, pruned = pruned.len(), "Learning evicted weakest beliefs");
        }
        Ok(id)
    }

    /// Replace a character's current belief about the fact's lineage.
    ///
    /// `expected_version` is the version the caller last read; the update
    /// is rejected if the stored belief moved on since.
    ///
    /// # Errors
    ///
    /// [`LoreError::FactNotFound`] for an unknown fact,
    /// [`LoreError::KnowledgeNotFound`] when no current belief exists, and
    /// [`LoreError::Conflict`] on a stale `expected_version`.
    pub fn update_belief(
        &mut self,
        character: CharacterId,
        expected_version: u32,
        mut draft: BeliefDraft,
        now: WorldTimestamp,
    ) -> Result<KnowledgeId> {
        let lineage = self.facts.lineage_of(draft.fact)?;
        if draft.learned_snapshot.is_none() {
            draft.learned_snapshot = self.open_snapshot_id(lineage);
        }
        let fact = draft.fact;
        let id = self
            .knowledge
            .update_belief(character, lineage, expected_version, draft, now)?;
        self.facts.touch(fact, now)?;
        Ok(id)
    }

    /// The character's current belief about the fact's lineage, if any.
    ///
    /// # Errors
    /// [`LoreError::FactNotFound`] for an unknown fact.
    pub fn current_belief(
        &self,
        character: CharacterId,
        fact_id: FactId,
    ) -> Result<Option<&CharacterKnowledge>> {
        let lineage = self.facts.lineage_of(fact_id)?;
        Ok(self.knowledge.current(character, lineage))
    }

    /// The character drops their current belief about the fact's lineage.
    ///
    /// # Errors
    ///
    /// [`LoreError::FactNotFound`] for an unknown fact,
    /// [`LoreError::KnowledgeNotFound`] when no current belief exists.
    pub fn forget(&mut self, character: CharacterId, fact_id: FactId) -> Result<KnowledgeId> {
        let lineage = self.facts.lineage_of(fact_id)?;
        self.knowledge.forget(character, lineage)
    }

    /// Compare what a character believes against the lineage head.
    ///
    /// Returns `None` when the character holds no belief, or when the
    /// believed content matches the head's content. `ticks_behind` measures
    /// from when the belief was formed to when the head's window opened.
    ///
    /// # Errors
    /// [`LoreError::FactNotFound`] for an unknown fact or a dangling
    /// belief record.
    pub fn divergence(
        &self,
        character: CharacterId,
        fact_id: FactId,
    ) -> Result<Option<DivergenceReport>> {
        let lineage = self.facts.lineage_of(fact_id)?;
        let Some(belief) = self.knowledge.current(character, lineage) else {
            return Ok(None);
        };
        let head = self.facts.head_of(lineage)?;
        let believed = self.facts.get(belief.fact)?;
        if believed.content == head.content {
            return Ok(None);
        }
        let ticks_behind = self
            .ledger
            .open_window(lineage)
            .map_or(0, |w| w.valid_from.ticks_since(&belief.learned_at));

        Ok(Some(DivergenceReport {
            character,
            lineage,
            believed_content: believed.content.clone(),
            current_content: head.content.clone(),
            ticks_behind,
        }))
    }

    // -----------------------------------------------------------------------
    // Propagation
    // -----------------------------------------------------------------------

    /// Spread what `source` believes about the fact's lineage across the
    /// trust graph.
    ///
    /// The walk is planned first ([`rumor::plan_walk`]) and then applied:
    /// characters with no belief `learn`, characters with one get
    /// `update_belief`. A delivery that fails to apply is logged and
    /// counted; it never aborts the rest of the run.
    ///
    /// # Errors
    ///
    /// [`LoreError::FactNotFound`] for an unknown fact,
    /// [`LoreError::KnowledgeNotFound`] when the source holds no belief,
    /// and [`LoreError::Validation`] when the source will not share it.
    pub fn propagate(
        &mut self,
        source: CharacterId,
        fact_id: FactId,
        trust: &dyn TrustGraph,
        bias_for: &dyn Fn(CharacterId) -> DistortionBias,
        seed: u64,
        now: WorldTimestamp,
    ) -> Result<PropagationReport> {
        let lineage = self.facts.lineage_of(fact_id)?;
        let origin = self
            .knowledge
            .current(source, lineage)
            .ok_or(LoreError::KnowledgeNotFound {
                character: source,
                lineage,
            })?;
        if !origin.will_share {
            return Err(LoreError::validation(format!(
                "character {source} holds the belief but will not share it"
            )));
        }
        let shared_fact = origin.fact;
        let source_strength = origin.belief_strength;

        let deliveries = rumor::plan_walk(
            source,
            source_strength,
            trust,
            bias_for,
            &self.config.propagation,
            seed,
        );

        let mut learned = Vec::new();
        let mut updated = Vec::new();
        let mut failed = 0;
        for delivery in &deliveries {
            let mut draft =
                BeliefDraft::new(shared_fact, delivery.source_kind, delivery.strength)
                    .from_character(delivery.from);
            if let Some(kind) = delivery.distortion {
                draft = draft.distorted(kind);
            }

            let existing = self
                .knowledge
                .current(delivery.to, lineage)
                .map(|k| k.version);
            let outcome = match existing {
                Some(version) => self
                    .update_belief(delivery.to, version, draft, now)
                    .map(|id| updated.push(id)),
                None => self.learn(delivery.to, draft, now).map(|id| learned.push(id)),
            };
            if let Err(err) = outcome {
                warn!(
                    to = %delivery.to,
                    hop = delivery.hop,
                    %err,
                    "Rumor delivery failed to apply"
                );
                failed += 1;
            }
        }

        info!(
            %source,
            fact = %fact_id,
            reached = deliveries.len(),
            learned = learned.len(),
            updated = updated.len(),
            failed,
            "Rumor propagation ran"
        );
        Ok(PropagationReport {
            deliveries,
            learned,
            updated,
            failed,
        })
    }

    // -----------------------------------------------------------------------
    // Retention
    // -----------------------------------------------------------------------

    /// Rescore every lineage head and flag cleanup candidates.
    ///
    /// A head's importance is its live knowledge references weighted and
    /// decayed by time since last reference. Heads scoring under the
    /// configured threshold with zero live references are flagged; when
    /// `mark_inactive` is set they are also deactivated. History is never
    /// touched.
    pub fn retention_scan(&mut self, now: WorldTimestamp, mark_inactive: bool) -> RetentionReport {
        let window = retention::window_ticks(&self.config.retention, self.config.world.ticks_per_day);
        let weight = self.config.retention.reference_weight;
        let threshold = self.config.retention.cleanup_threshold;

        let mut scored: Vec<ScoredFact> = Vec::with_capacity(self.facts.lineage_count());
        let mut to_apply: Vec<(FactId, f32, bool)> = Vec::new();

        for (lineage, state) in self.facts.lineages() {
            let Ok(head) = self.facts.get(state.head) else {
                continue;
            };
            let live_refs = self.knowledge.live_refs(*lineage);
            let gap = now.ticks_since(&head.last_referenced);
            let score = retention::importance(live_refs, gap, window, weight);
            let flagged = retention::is_cleanup_candidate(score, live_refs, threshold);

            scored.push(ScoredFact {
                lineage: *lineage,
                head: head.id,
                score: ImportanceScore::new(score),
                live_refs,
                flagged,
            });
            to_apply.push((head.id, score, flagged));
        }

        for (id, score, flagged) in to_apply {
            // Heads were just fetched from the store; the writes cannot miss.
            let _ = self.facts.set_importance(id, score);
            if flagged && mark_inactive {
                let _ = self.facts.deactivate(id);
            }
        }

        scored.sort_by(|a, b| b.score.cmp(&a.score));
        let flagged = scored.iter().filter(|s| s.flagged).count();
        info!(
            scanned = scored.len(),
            flagged,
            mark_inactive,
            tick = now.tick,
            "Retention scan finished"
        );
        RetentionReport { scored, flagged }
    }

    // -----------------------------------------------------------------------
    // Ingestion
    // -----------------------------------------------------------------------

    /// Apply a batch of candidate facts from the extraction pipeline.
    ///
    /// Each candidate is validated, created, and linked independently; a
    /// rejected candidate is recorded in the report and the batch moves on.
    pub fn ingest(&mut self, batch: Vec<FactCandidate>, now: WorldTimestamp) -> IngestReport {
        let mut outcomes = Vec::with_capacity(batch.len());
        for candidate in batch {
            let outcome = self.apply_candidate(candidate, now);
            if let Err(err) = &outcome {
                warn!(%err, "Ingestion candidate rejected");
            }
            outcomes.push(outcome);
        }
        let report = IngestReport { outcomes };
        info!(
            accepted = report.accepted().len(),
            rejected = report.rejected(),
            "Ingestion batch applied"
        );
        report
    }

    fn apply_candidate(
        &mut self,
        candidate: FactCandidate,
        now: WorldTimestamp,
    ) -> Result<FactId> {
        let id = self.create_fact(candidate.draft, now)?;
        for link in candidate.relationships {
            self.link(id, link.entity, link.role, link.is_primary, link.strength, now)?;
        }
        Ok(id)
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    /// Total fact versions stored.
    #[must_use]
    pub fn fact_count(&self) -> usize {
        self.facts.fact_count()
    }

    /// Lineages tracked.
    #[must_use]
    pub fn lineage_count(&self) -> usize {
        self.facts.lineage_count()
    }

    /// Belief records stored, historical and deleted included.
    #[must_use]
    pub fn knowledge_count(&self) -> usize {
        self.knowledge.record_count()
    }

    /// Live (current, non-deleted) beliefs a character holds right now.
    #[must_use]
    pub fn live_belief_count(&self, character: CharacterId) -> usize {
        self.knowledge.live_count(character)
    }

    /// Look up any belief record by id.
    #[must_use]
    pub fn knowledge_record(&self, id: KnowledgeId) -> Option<&CharacterKnowledge> {
        self.knowledge.record(id)
    }

    fn open_snapshot_id(&self, lineage: crate::types::LineageId) -> Option<SnapshotId> {
        self.ledger.open_window(lineage).map(|w| w.id)
    }
}

/// Thread-safe handle: clones share one engine behind a read-write lock.
#[derive(Debug, Clone, Default)]
pub struct SharedEngine {
    inner: Arc<RwLock<LoreEngine>>,
}

impl SharedEngine {
    /// Wrap an engine for shared use.
    #[must_use]
    pub fn new(engine: LoreEngine) -> Self {
        Self {
            inner: Arc::new(RwLock::new(engine)),
        }
    }

    /// Run a closure under the read lock.
    pub fn read<R>(&self, f: impl FnOnce(&LoreEngine) -> R) -> R {
        f(&self.inner.read())
    }

    /// Run a closure under the write lock.
    pub fn write<R>(&self, f: impl FnOnce(&mut LoreEngine) -> R) -> R {
        f(&mut self.inner.write())
    }
}

fn open_snapshot(
    fact: &Fact,
    valid_from: WorldTimestamp,
    change_reason: Option<String>,
    changed_by_event: Option<EventId>,
) -> FactSnapshot {
    FactSnapshot {
        id: SnapshotId::new(),
        fact: fact.id,
        content: fact.content.clone(),
        truth: fact.truth,
        importance_score: fact.importance_score,
        when_occurred: fact.when_occurred,
        why_context: fact.why_context.clone(),
        location_snapshot: fact.location_snapshot,
        links: Vec::new(),
        valid_from,
        valid_to: None,
        change_reason,
        changed_by_event,
    }
}

fn fact_category_name(facts: &FactStore, id: FactId) -> &'static str {
    facts.get(id).map_or("unknown", |f| f.category().name())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FactCategory, SourceKind};
    use std::collections::HashMap;

    fn ts(tick: u64) -> WorldTimestamp {
        WorldTimestamp::now(tick)
    }

    fn engine() -> LoreEngine {
        LoreEngine::new(LoreConfig::default())
    }

    #[test]
    fn create_opens_a_history_window() {
        let mut engine = engine();
        let id = engine
            .create_fact(
                FactDraft::new("The pass is safe", FactCategory::CurrentState),
                ts(0),
            )
            .expect("create");

        let windows = engine.audit(id).expect("audit");
        assert_eq!(windows.len(), 1);
        assert!(windows[0].is_open());
        assert_eq!(windows[0].change_reason.as_deref(), Some("created"));
    }

    #[test]
    fn supersede_rotates_windows_and_keeps_links() {
        let mut engine = engine();
        let witness = CharacterId::new();
        let old = engine
            .create_fact(
                FactDraft::new("The pass is safe", FactCategory::CurrentState),
                ts(0),
            )
            .expect("create");
        engine
            .link(old, EntityRef::Character(witness), "witness", true, 1.0, ts(5))
            .expect("link");

        let new = engine
            .supersede(
                old,
                FactDraft::new("The pass is blocked by an avalanche", FactCategory::CurrentState),
                ts(50),
                Some("avalanche".to_string()),
                None,
            )
            .expect("supersede");

        let windows = engine.audit(old).expect("audit");
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].valid_to.expect("closed").tick, 50);
        assert_eq!(windows[0].links.len(), 1, "closing window keeps its links");
        assert!(windows[1].is_open());

        assert_eq!(engine.resolve_head(old).expect("head").id, new);
        assert_eq!(
            engine.fact_at(old, 25).expect("ok").expect("covered").content,
            "The pass is safe"
        );
        assert_eq!(
            engine.fact_at(old, 60).expect("ok").expect("covered").content,
            "The pass is blocked by an avalanche"
        );
    }

    #[test]
    fn supersede_non_head_is_a_conflict_and_mutates_nothing() {
        let mut engine = engine();
        let v1 = engine
            .create_fact(FactDraft::new("v1", FactCategory::Observed), ts(0))
            .expect("create");
        let v2 = engine
            .supersede(v1, FactDraft::new("v2", FactCategory::Observed), ts(10), None, None)
            .expect("supersede");

        let before_facts = engine.fact_count();
        let before_windows = engine.audit(v1).expect("audit").len();

        let err = engine
            .supersede(v1, FactDraft::new("fork", FactCategory::Observed), ts(20), None, None)
            .expect_err("non-head");
        assert!(matches!(err, LoreError::Conflict { .. }));

        assert_eq!(engine.fact_count(), before_facts);
        assert_eq!(engine.audit(v1).expect("audit").len(), before_windows);
        assert_eq!(engine.resolve_head(v1).expect("head").id, v2);
    }

    #[test]
    fn learn_records_the_open_snapshot() {
        let mut engine = engine();
        let character = CharacterId::new();
        let fact = engine
            .create_fact(FactDraft::new("v1", FactCategory::Observed), ts(0))
            .expect("create");

        engine
            .learn(
                character,
                BeliefDraft::new(fact, SourceKind::Witness, 1.0),
                ts(5),
            )
            .expect("learn");

        let belief = engine
            .current_belief(character, fact)
            .expect("ok")
            .expect("current");
        let open = engine.audit(fact).expect("audit").last().expect("window").id;
        assert_eq!(belief.learned_snapshot, Some(open));
    }

    #[test]
    fn divergence_reports_stale_beliefs() {
        let mut engine = engine();
        let character = CharacterId::new();
        let v1 = engine
            .create_fact(
                FactDraft::new("The pass is safe", FactCategory::CurrentState),
                ts(0),
            )
            .expect("create");
        engine
            .learn(character, BeliefDraft::new(v1, SourceKind::Rumor, 0.6), ts(1))
            .expect("learn");

        assert!(
            engine.divergence(character, v1).expect("ok").is_none(),
            "belief in the head is not divergent"
        );

        engine
            .supersede(
                v1,
                FactDraft::new("The pass is blocked", FactCategory::CurrentState),
                ts(50),
                None,
                None,
            )
            .expect("supersede");

        let report = engine
            .divergence(character, v1)
            .expect("ok")
            .expect("diverged");
        assert_eq!(report.believed_content, "The pass is safe");
        assert_eq!(report.current_content, "The pass is blocked");
        assert_eq!(report.ticks_behind, 49);
    }

    #[test]
    fn propagation_applies_learn_and_update() {
        let mut engine = engine();
        let source = CharacterId::new();
        let listener = CharacterId::new();
        let fact = engine
            .create_fact(FactDraft::new("v1", FactCategory::Observed), ts(0))
            .expect("create");

        engine
            .learn(source, BeliefDraft::new(fact, SourceKind::Witness, 1.0), ts(1))
            .expect("learn");

        let mut trust: HashMap<CharacterId, Vec<(CharacterId, f32)>> = HashMap::new();
        trust.insert(source, vec![(listener, 1.0)]);

        let report = engine
            .propagate(source, fact, &trust, &|_| DistortionBias::default(), 7, ts(2))
            .expect("propagate");
        assert_eq!(report.reached(), 1);
        assert_eq!(report.learned.len(), 1);
        assert_eq!(report.failed, 0);

        let belief = engine
            .current_belief(listener, fact)
            .expect("ok")
            .expect("formed");
        assert_eq!(belief.version, 1);
        assert_eq!(belief.source_kind, SourceKind::ToldBy);
        assert_eq!(belief.source_character, Some(source));
        assert!(belief.belief_strength <= 0.9, "one hop of decay applied");

        // A second run reaches a listener who already believes: update path.
        let report = engine
            .propagate(source, fact, &trust, &|_| DistortionBias::default(), 8, ts(3))
            .expect("propagate again");
        assert_eq!(report.updated.len(), 1);
        let belief = engine
            .current_belief(listener, fact)
            .expect("ok")
            .expect("updated");
        assert_eq!(belief.version, 2);
    }

    #[test]
    fn propagation_requires_a_sharing_source() {
        let mut engine = engine();
        let source = CharacterId::new();
        let fact = engine
            .create_fact(FactDraft::new("v1", FactCategory::Observed), ts(0))
            .expect("create");

        let trust: HashMap<CharacterId, Vec<(CharacterId, f32)>> = HashMap::new();

        let err = engine
            .propagate(source, fact, &trust, &|_| DistortionBias::default(), 1, ts(1))
            .expect_err("no belief");
        assert!(matches!(err, LoreError::KnowledgeNotFound { .. }));

        let mut draft = BeliefDraft::new(fact, SourceKind::Witness, 1.0);
        draft.will_share = false;
        engine.learn(source, draft, ts(1)).expect("learn");
        let err = engine
            .propagate(source, fact, &trust, &|_| DistortionBias::default(), 1, ts(2))
            .expect_err("withheld");
        assert!(matches!(err, LoreError::Validation { .. }));
    }

    #[test]
    fn retention_flags_unreferenced_stale_heads() {
        let mut engine = engine();
        let character = CharacterId::new();

        let remembered = engine
            .create_fact(FactDraft::new("remembered", FactCategory::Observed), ts(0))
            .expect("create");
        engine
            .learn(
                character,
                BeliefDraft::new(remembered, SourceKind::Witness, 1.0),
                ts(0),
            )
            .expect("learn");

        let abandoned = engine
            .create_fact(FactDraft::new("abandoned", FactCategory::Observed), ts(0))
            .expect("create");

        // Scan far past the decay window.
        let later = ts(100 * WorldTimestamp::TICKS_PER_DAY);
        let report = engine.retention_scan(later, true);

        assert_eq!(report.scored.len(), 2);
        assert_eq!(report.flagged, 1);
        assert_eq!(report.candidates(), vec![abandoned]);
        assert!(!engine.fact(abandoned).expect("fact").active);
        assert!(engine.fact(remembered).expect("fact").active);
    }

    #[test]
    fn ingest_is_per_candidate() {
        use crate::ingest::{FactCandidate, RelationshipCandidate};

        let mut engine = engine();
        let place = EntityRef::Location(crate::types::LocationId::new());
        let batch = vec![
            FactCandidate::new(FactDraft::new("The bridge held", FactCategory::Observed))
                .with_link(RelationshipCandidate::new(place, "subject").primary()),
            // Narrative without a creator: rejected.
            FactCandidate::new(FactDraft::new("The bridge is cursed", FactCategory::Myth)),
            FactCandidate::new(FactDraft::new("The river froze", FactCategory::Historical)),
        ];

        let report = engine.ingest(batch, ts(0));
        assert_eq!(report.outcomes.len(), 3);
        assert_eq!(report.accepted().len(), 2);
        assert_eq!(report.rejected(), 1);
        assert!(matches!(
            report.outcomes[1],
            Err(LoreError::Validation { .. })
        ));

        let accepted = report.accepted();
        assert_eq!(engine.links_for(accepted[0]).expect("links").len(), 1);
        assert_eq!(engine.facts_for(place, Some("subject")), vec![accepted[0]]);
    }

    #[test]
    fn shared_engine_round_trips_through_the_lock() {
        let shared = SharedEngine::new(LoreEngine::default());
        let id = shared
            .write(|e| e.create_fact(FactDraft::new("v1", FactCategory::Observed), ts(0)))
            .expect("create");
        let content = shared.read(|e| e.fact(id).map(|f| f.content.clone())).expect("read");
        assert_eq!(content, "v1");
    }
}

//! Fact store — canonical propositions and their supersession chains.
//!
//! Facts are never mutated in place and never physically deleted. A fact
//! changes by being superseded: a new version is appended to the lineage
//! and the old one keeps pointing forward via `superseded_by`. Each
//! lineage's current head is tracked explicitly in [`LineageState`], so two
//! "current" facts per lineage are structurally impossible.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::error::{LoreError, Result};
use crate::types::{
    CharacterId, EventId, FactCategory, FactId, FactTruth, LineageId, LocationSnapshotRef,
    WorldTimestamp, unit,
};

/// Default importance assigned to newly created facts.
pub const DEFAULT_IMPORTANCE: f32 = 0.5;

/// A single immutable version of a proposition about the world.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fact {
    /// Unique identifier of this version.
    pub id: FactId,
    /// The supersession chain this version belongs to.
    pub lineage: LineageId,
    /// The proposition text.
    pub content: String,
    /// Truth standing — category plus, for narratives, the author.
    pub truth: FactTruth,
    /// The world event that produced this fact, if any.
    pub origin_event: Option<EventId>,
    /// Opaque location reference from the spatial collaborator.
    pub location_snapshot: Option<LocationSnapshotRef>,
    /// When the described state occurred in-world, if known.
    pub when_occurred: Option<u64>,
    /// Free-text context for why the fact holds.
    pub why_context: Option<String>,
    /// Decayed relevance, recomputed by the retention policy (0.0–1.0).
    pub importance_score: f32,
    /// Last game time a consumer referenced this fact.
    pub last_referenced: WorldTimestamp,
    /// Forward pointer to the version that replaced this one.
    pub superseded_by: Option<FactId>,
    /// When this version was replaced. Set exactly when `superseded_by` is.
    pub superseded_at: Option<WorldTimestamp>,
    /// Cleared by the retention policy; inactive facts are skipped when
    /// linking new ingestion output. History is untouched.
    pub active: bool,
    /// When this version was created.
    pub created_at: WorldTimestamp,
}

impl Fact {
    /// The flat category tag.
    #[must_use]
    pub fn category(&self) -> FactCategory {
        self.truth.category()
    }

    /// Whether this fact describes objective reality.
    #[must_use]
    pub fn canonical_truth(&self) -> bool {
        self.truth.canonical_truth()
    }

    /// The attributed author (narrative facts only).
    #[must_use]
    pub fn creator(&self) -> Option<CharacterId> {
        self.truth.creator()
    }

    /// Whether this version is its lineage's current head.
    #[must_use]
    pub fn is_head(&self) -> bool {
        self.superseded_by.is_none()
    }
}

/// Input for creating or superseding a fact. Validation happens in
/// [`FactStore::validate`]; the engine wires ledger and graph around it.
#[derive(Debug, Clone)]
pub struct FactDraft {
    /// The proposition text.
    pub content: String,
    /// Category tag.
    pub category: FactCategory,
    /// Author — mandatory for narrative categories.
    pub creator: Option<CharacterId>,
    /// Originating world event.
    pub origin_event: Option<EventId>,
    /// Opaque location reference.
    pub location_snapshot: Option<LocationSnapshotRef>,
    /// When the described state occurred in-world.
    pub when_occurred: Option<u64>,
    /// Free-text context.
    pub why_context: Option<String>,
}

impl FactDraft {
    /// A minimal draft with just content and category.
    #[must_use]
    pub fn new(content: impl Into<String>, category: FactCategory) -> Self {
        Self {
            content: content.into(),
            category,
            creator: None,
            origin_event: None,
            location_snapshot: None,
            when_occurred: None,
            why_context: None,
        }
    }

    /// Attach a creator (required for narrative categories).
    #[must_use]
    pub fn creator(mut self, creator: CharacterId) -> Self {
        self.creator = Some(creator);
        self
    }

    /// Attach an originating event.
    #[must_use]
    pub fn origin_event(mut self, event: EventId) -> Self {
        self.origin_event = Some(event);
        self
    }

    /// Attach an opaque location reference.
    #[must_use]
    pub fn location_snapshot(mut self, snapshot: LocationSnapshotRef) -> Self {
        self.location_snapshot = Some(snapshot);
        self
    }
}

/// Explicit per-lineage state: the current head and all member versions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineageState {
    /// The current, non-superseded version.
    pub head: FactId,
    /// Every version in creation order.
    pub members: Vec<FactId>,
}

/// The fact arena. Versions are indexed by [`FactId`]; supersession
/// pointers are ids into the same arena, never references, so chains can
/// be walked iteratively with a cycle guard.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FactStore {
    facts: HashMap<FactId, Fact>,
    lineages: HashMap<LineageId, LineageState>,
    max_content_chars: usize,
}

impl FactStore {
    /// Create an empty store with the given content bound.
    #[must_use]
    pub fn new(max_content_chars: usize) -> Self {
        Self {
            facts: HashMap::new(),
            lineages: HashMap::new(),
            max_content_chars,
        }
    }

    /// Validate a draft and build its truth standing.
    ///
    /// # Errors
    ///
    /// [`LoreError::Validation`] on empty/oversized content or a narrative
    /// category without a creator.
    pub fn validate(&self, draft: &FactDraft) -> Result<FactTruth> {
        let chars = draft.content.chars().count();
        if chars == 0 {
            return Err(LoreError::validation("fact content must not be empty"));
        }
        if chars > self.max_content_chars {
            return Err(LoreError::validation(format!(
                "fact content is {chars} chars, limit is {}",
                self.max_content_chars
            )));
        }
        FactTruth::from_parts(draft.category, draft.creator)
    }

    /// Insert a validated draft as a brand-new lineage. Returns the fact.
    pub(crate) fn insert_new(
        &mut self,
        draft: FactDraft,
        truth: FactTruth,
        now: WorldTimestamp,
    ) -> &Fact {
        let id = FactId::new();
        let lineage = LineageId::new();
        let fact = Fact {
            id,
            lineage,
            content: draft.content,
            truth,
            origin_event: draft.origin_event,
            location_snapshot: draft.location_snapshot,
            when_occurred: draft.when_occurred,
            why_context: draft.why_context,
            importance_score: DEFAULT_IMPORTANCE,
            last_referenced: now,
            superseded_by: None,
            superseded_at: None,
            active: true,
            created_at: now,
        };
        self.lineages.insert(
            lineage,
            LineageState {
                head: id,
                members: vec![id],
            },
        );
        self.facts.entry(id).or_insert(fact)
    }

    /// Insert a validated draft as the successor of `old_id`, updating the
    /// old version's forward pointer and the lineage head.
    ///
    /// The caller must already have verified `old_id` is the head.
    pub(crate) fn insert_successor(
        &mut self,
        old_id: FactId,
        draft: FactDraft,
        truth: FactTruth,
        now: WorldTimestamp,
    ) -> Result<FactId> {
        let lineage = self.get(old_id)?.lineage;
        let new_id = FactId::new();

        let fact = Fact {
            id: new_id,
            lineage,
            content: draft.content,
            truth,
            origin_event: draft.origin_event,
            location_snapshot: draft.location_snapshot,
            when_occurred: draft.when_occurred,
            why_context: draft.why_context,
            importance_score: DEFAULT_IMPORTANCE,
            last_referenced: now,
            superseded_by: None,
            superseded_at: None,
            active: true,
            created_at: now,
        };
        self.facts.insert(new_id, fact);

        let old = self
            .facts
            .get_mut(&old_id)
            .ok_or(LoreError::FactNotFound(old_id))?;
        old.superseded_by = Some(new_id);
        old.superseded_at = Some(now);

        let state = self
            .lineages
            .get_mut(&lineage)
            .ok_or(LoreError::LineageNotFound(lineage))?;
        state.head = new_id;
        state.members.push(new_id);

        Ok(new_id)
    }

    /// Look up a fact version.
    ///
    /// # Errors
    /// [`LoreError::FactNotFound`] for an unknown id.
    pub fn get(&self, id: FactId) -> Result<&Fact> {
        self.facts.get(&id).ok_or(LoreError::FactNotFound(id))
    }

    /// The lineage a fact version belongs to.
    ///
    /// # Errors
    /// [`LoreError::FactNotFound`] for an unknown id.
    pub fn lineage_of(&self, id: FactId) -> Result<LineageId> {
        self.get(id).map(|f| f.lineage)
    }

    /// The current head of a lineage.
    ///
    /// # Errors
    /// [`LoreError::LineageNotFound`] for an unknown lineage.
    pub fn head_of(&self, lineage: LineageId) -> Result<&Fact> {
        let state = self
            .lineages
            .get(&lineage)
            .ok_or(LoreError::LineageNotFound(lineage))?;
        self.get(state.head)
    }

    /// Walk `superseded_by` pointers from any version to the lineage head.
    ///
    /// # Errors
    ///
    /// [`LoreError::FactNotFound`] for an unknown starting id;
    /// [`LoreError::Consistency`] on a cycle or if the walk disagrees with
    /// the lineage's recorded head — either means corrupted state.
    pub fn resolve_head(&self, id: FactId) -> Result<&Fact> {
        let mut visited = HashSet::new();
        let mut current = self.get(id)?;

        while let Some(next) = current.superseded_by {
            if !visited.insert(current.id) {
                return Err(LoreError::consistency(format!(
                    "supersession cycle detected starting from fact {id}"
                )));
            }
            current = self.get(next)?;
        }

        let recorded = self.head_of(current.lineage)?;
        if recorded.id != current.id {
            return Err(LoreError::consistency(format!(
                "lineage {} records head {} but chain walk reached {}",
                current.lineage, recorded.id, current.id
            )));
        }
        Ok(current)
    }

    /// Bump a fact's `last_referenced` time.
    ///
    /// # Errors
    /// [`LoreError::FactNotFound`] for an unknown id.
    pub fn touch(&mut self, id: FactId, now: WorldTimestamp) -> Result<()> {
        let fact = self.facts.get_mut(&id).ok_or(LoreError::FactNotFound(id))?;
        fact.last_referenced = now;
        Ok(())
    }

    /// Set a fact's importance score (retention policy) — clamped to [0, 1].
    pub(crate) fn set_importance(&mut self, id: FactId, score: f32) -> Result<()> {
        let fact = self.facts.get_mut(&id).ok_or(LoreError::FactNotFound(id))?;
        fact.importance_score = unit(score);
        Ok(())
    }

    /// Mark a fact inactive (retention policy). The version and its history
    /// remain in place.
    pub(crate) fn deactivate(&mut self, id: FactId) -> Result<()> {
        let fact = self.facts.get_mut(&id).ok_or(LoreError::FactNotFound(id))?;
        fact.active = false;
        Ok(())
    }

    /// Iterate all lineage states.
    pub fn lineages(&self) -> impl Iterator<Item = (&LineageId, &LineageState)> {
        self.lineages.iter()
    }

    /// Total number of fact versions stored.
    #[must_use]
    pub fn fact_count(&self) -> usize {
        self.facts.len()
    }

    /// Number of lineages stored.
    #[must_use]
    pub fn lineage_count(&self) -> usize {
        self.lineages.len()
    }

    #[cfg(test)]
    pub(crate) fn corrupt_forward_pointer(&mut self, from: FactId, to: FactId) {
        if let Some(fact) = self.facts.get_mut(&from) {
            fact.superseded_by = Some(to);
        }
    }
}

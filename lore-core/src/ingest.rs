//! Batch ingestion — candidate facts from the external extraction pipeline.
//!
//! The ingestion pipeline (LLM/NLU, outside this engine) submits batches of
//! candidate facts with their relationships. Validation failures are
//! per-candidate: one bad candidate never sinks the batch.

use crate::error::LoreError;
use crate::fact::FactDraft;
use crate::types::{EntityRef, FactId};

/// A candidate fact as submitted by the ingestion pipeline.
#[derive(Debug, Clone)]
pub struct FactCandidate {
    /// The fact fields, validated on application.
    pub draft: FactDraft,
    /// Entity links to create once the fact is accepted.
    pub relationships: Vec<RelationshipCandidate>,
}

impl FactCandidate {
    /// Wrap a draft with no relationships.
    #[must_use]
    pub fn new(draft: FactDraft) -> Self {
        Self {
            draft,
            relationships: Vec::new(),
        }
    }

    /// Add a relationship to create alongside the fact.
    #[must_use]
    pub fn with_link(mut self, link: RelationshipCandidate) -> Self {
        self.relationships.push(link);
        self
    }
}

/// A relationship to attach to an accepted candidate.
#[derive(Debug, Clone)]
pub struct RelationshipCandidate {
    /// The linked entity.
    pub entity: EntityRef,
    /// Semantic role of the entity within the fact.
    pub role: String,
    /// Whether this is the primary entity for the role.
    pub is_primary: bool,
    /// Connection strength (0.0–1.0).
    pub strength: f32,
}

impl RelationshipCandidate {
    /// A secondary link with full strength.
    #[must_use]
    pub fn new(entity: EntityRef, role: impl Into<String>) -> Self {
        Self {
            entity,
            role: role.into(),
            is_primary: false,
            strength: 1.0,
        }
    }

    /// Mark as the primary entity for its role.
    #[must_use]
    pub fn primary(mut self) -> Self {
        self.is_primary = true;
        self
    }
}

/// Per-candidate outcomes of one ingestion batch, in submission order.
#[derive(Debug)]
pub struct IngestReport {
    /// One outcome per submitted candidate.
    pub outcomes: Vec<Result<FactId, LoreError>>,
}

impl IngestReport {
    /// IDs of the accepted facts, in submission order.
    #[must_use]
    pub fn accepted(&self) -> Vec<FactId> {
        self.outcomes
            .iter()
            .filter_map(|o| o.as_ref().ok().copied())
            .collect()
    }

    /// How many candidates were rejected.
    #[must_use]
    pub fn rejected(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_err()).count()
    }
}

//! Relationship graph — many-to-many fact ↔ entity links with semantic roles.
//!
//! Edges reference entities owned by external collaborators; beyond the
//! type tag in [`EntityRef`] nothing is verified here. Edges are soft-deleted
//! so "what was this fact connected to" stays answerable for audits.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

use crate::types::{EntityRef, FactId, WorldTimestamp, unit};

/// An edge between a fact and an entity, carrying the semantic role the
/// entity plays within the fact (e.g. "giver", "witness", "scene").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactRelationship {
    /// The fact this edge belongs to.
    pub fact: FactId,
    /// The referenced entity.
    pub entity: EntityRef,
    /// Semantic role of the entity within the fact.
    pub role: String,
    /// Whether this is the fact's primary entity for the role.
    pub is_primary: bool,
    /// Connection strength (0.0–1.0).
    pub strength: f32,
    /// Soft-delete flag; deleted edges are retained for audit.
    pub deleted: bool,
    /// When the edge was created.
    pub created_at: WorldTimestamp,
}

/// The relationship store. A flat edge list with linear scans — fact
/// fan-out in practice is a handful of entities, not thousands.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelationshipGraph {
    edges: Vec<FactRelationship>,
}

impl RelationshipGraph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Link a fact to an entity under a role.
    ///
    /// Idempotent on `(fact, entity, role)`: relinking an existing triple
    /// updates `strength` and `is_primary` (and revives a soft-deleted
    /// edge) instead of duplicating it.
    pub fn link(
        &mut self,
        fact: FactId,
        entity: EntityRef,
        role: impl Into<String>,
        is_primary: bool,
        strength: f32,
        now: WorldTimestamp,
    ) {
        let role = role.into();
        let strength = unit(strength);

        if let Some(edge) = self
            .edges
            .iter_mut()
            .find(|e| e.fact == fact && e.entity == entity && e.role == role)
        {
            edge.strength = strength;
            edge.is_primary = is_primary;
            edge.deleted = false;
            debug!(%fact, entity = %edge.entity, role = %edge.role, "Relationship updated");
            return;
        }

        debug!(%fact, %entity, %role, "Relationship created");
        self.edges.push(FactRelationship {
            fact,
            entity,
            role,
            is_primary,
            strength,
            deleted: false,
            created_at: now,
        });
    }

    /// Soft-delete every live edge between `fact` and `entity`, across all
    /// roles. Returns how many edges were removed.
    pub fn unlink(&mut self, fact: FactId, entity: EntityRef) -> usize {
        let mut removed = 0;
        for edge in self
            .edges
            .iter_mut()
            .filter(|e| e.fact == fact && e.entity == entity && !e.deleted)
        {
            edge.deleted = true;
            removed += 1;
        }
        if removed > 0 {
            debug!(%fact, %entity, removed, "Relationships unlinked");
        }
        removed
    }

    /// Live (non-deleted) edges attached to a fact.
    #[must_use]
    pub fn links_for(&self, fact: FactId) -> Vec<&FactRelationship> {
        self.edges
            .iter()
            .filter(|e| e.fact == fact && !e.deleted)
            .collect()
    }

    /// Clones of the live edges attached to a fact — captured into history
    /// snapshots when the fact is superseded.
    #[must_use]
    pub fn snapshot_links(&self, fact: FactId) -> Vec<FactRelationship> {
        self.edges
            .iter()
            .filter(|e| e.fact == fact && !e.deleted)
            .cloned()
            .collect()
    }

    /// Fact IDs linked to an entity, optionally filtered by role, in first
    /// link order with each fact listed once. Deleted edges never match.
    #[must_use]
    pub fn facts_for(&self, entity: EntityRef, role: Option<&str>) -> Vec<FactId> {
        let mut seen = HashSet::new();
        self.edges
            .iter()
            .filter(|e| !e.deleted && e.entity == entity)
            .filter(|e| role.is_none_or(|r| e.role == r))
            .map(|e| e.fact)
            .filter(|fact| seen.insert(*fact))
            .collect()
    }

    /// Total number of edges, deleted included.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CharacterId, LocationId};

    fn ts(tick: u64) -> WorldTimestamp {
        WorldTimestamp::now(tick)
    }

    #[test]
    fn link_is_idempotent_per_triple() {
        let mut graph = RelationshipGraph::new();
        let fact = FactId::new();
        let who = EntityRef::Character(CharacterId::new());

        graph.link(fact, who, "witness", false, 0.5, ts(10));
        graph.link(fact, who, "witness", true, 0.9, ts(20));

        assert_eq!(graph.edge_count(), 1, "Relink must not duplicate");
        let links = graph.links_for(fact);
        assert!(links[0].is_primary);
        assert!((links[0].strength - 0.9).abs() < f32::EPSILON);
    }

    #[test]
    fn same_entity_different_role_is_a_new_edge() {
        let mut graph = RelationshipGraph::new();
        let fact = FactId::new();
        let who = EntityRef::Character(CharacterId::new());

        graph.link(fact, who, "witness", false, 1.0, ts(10));
        graph.link(fact, who, "giver", false, 1.0, ts(10));
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn unlink_soft_deletes_all_roles() {
        let mut graph = RelationshipGraph::new();
        let fact = FactId::new();
        let who = EntityRef::Character(CharacterId::new());

        graph.link(fact, who, "witness", false, 1.0, ts(10));
        graph.link(fact, who, "giver", false, 1.0, ts(10));
        assert_eq!(graph.unlink(fact, who), 2);

        assert!(graph.links_for(fact).is_empty());
        assert!(graph.facts_for(who, None).is_empty());
        // Edges are retained for audit, not erased.
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn relink_revives_deleted_edge() {
        let mut graph = RelationshipGraph::new();
        let fact = FactId::new();
        let who = EntityRef::Character(CharacterId::new());

        graph.link(fact, who, "witness", false, 1.0, ts(10));
        graph.unlink(fact, who);
        graph.link(fact, who, "witness", false, 0.4, ts(30));

        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.links_for(fact).len(), 1);
    }

    #[test]
    fn facts_for_filters_by_role() {
        let mut graph = RelationshipGraph::new();
        let f1 = FactId::new();
        let f2 = FactId::new();
        let scene = EntityRef::Location(LocationId::new());

        graph.link(f1, scene, "scene", true, 1.0, ts(10));
        graph.link(f2, scene, "origin", false, 1.0, ts(10));

        assert_eq!(graph.facts_for(scene, None).len(), 2);
        assert_eq!(graph.facts_for(scene, Some("scene")), vec![f1]);
        assert!(graph.facts_for(scene, Some("witness")).is_empty());
    }

    #[test]
    fn facts_for_lists_each_fact_once() {
        let mut graph = RelationshipGraph::new();
        let f1 = FactId::new();
        let f2 = FactId::new();
        let who = EntityRef::Character(CharacterId::new());

        // Two roles for f1 with another fact's link in between.
        graph.link(f1, who, "witness", false, 1.0, ts(10));
        graph.link(f2, who, "subject", false, 1.0, ts(11));
        graph.link(f1, who, "giver", false, 1.0, ts(12));

        assert_eq!(graph.facts_for(who, None), vec![f1, f2]);
    }

    #[test]
    fn strength_is_clamped() {
        let mut graph = RelationshipGraph::new();
        let fact = FactId::new();
        let who = EntityRef::Character(CharacterId::new());
        graph.link(fact, who, "witness", false, 7.0, ts(10));
        assert!((graph.links_for(fact)[0].strength - 1.0).abs() < f32::EPSILON);
    }
}

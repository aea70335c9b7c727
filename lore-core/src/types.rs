//! Core type definitions for the LORE engine.
//!
//! All types are serializable; identity types are UUID newtypes so a fact
//! reference can never be confused with a character reference at compile time.

use chrono::{DateTime, Utc};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Identity Types
// ---------------------------------------------------------------------------

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new random ID.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Unique identifier for a single fact version.
    FactId
);
id_type!(
    /// Identifies a supersession chain — all versions of one evolving
    /// proposition share a lineage ID.
    LineageId
);
id_type!(
    /// Unique identifier for a character in the game world.
    CharacterId
);
id_type!(
    /// Unique identifier for a location. Opaque to this engine.
    LocationId
);
id_type!(
    /// Unique identifier for an item. Opaque to this engine.
    ItemId
);
id_type!(
    /// Unique identifier for a world event. Opaque to this engine.
    EventId
);
id_type!(
    /// Unique identifier for a character-knowledge record.
    KnowledgeId
);
id_type!(
    /// Unique identifier for a history snapshot.
    SnapshotId
);
id_type!(
    /// Identifies a stored game world in the persistence layer.
    WorldId
);

/// Opaque reference to a point-in-time location state, issued by the
/// spatial collaborator. The engine stores it but never interprets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocationSnapshotRef(pub Uuid);

impl fmt::Display for LocationSnapshotRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// In-game timestamp measured in ticks since world creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WorldTimestamp {
    /// Logical game tick (monotonically increasing).
    pub tick: u64,
    /// Corresponding real-world wall-clock time (save metadata only).
    pub real_time: DateTime<Utc>,
}

impl WorldTimestamp {
    /// Default conversion between ticks and in-game days.
    pub const TICKS_PER_DAY: u64 = 24_000;

    /// Create a new timestamp at the current wall-clock time.
    #[must_use]
    pub fn now(tick: u64) -> Self {
        Self {
            tick,
            real_time: Utc::now(),
        }
    }

    /// Game-days elapsed since `other`, using `ticks_per_day` for conversion.
    #[must_use]
    pub fn days_since(&self, other: &Self, ticks_per_day: u64) -> f32 {
        let per_day = if ticks_per_day == 0 {
            Self::TICKS_PER_DAY
        } else {
            ticks_per_day
        };
        (self.tick.saturating_sub(other.tick)) as f32 / per_day as f32
    }

    /// Ticks elapsed since `other`, saturating at zero.
    #[must_use]
    pub fn ticks_since(&self, other: &Self) -> u64 {
        self.tick.saturating_sub(other.tick)
    }
}

// ---------------------------------------------------------------------------
// Entity references
// ---------------------------------------------------------------------------

/// A typed reference to an entity owned by an external collaborator.
///
/// The closed union replaces the source-of-record's string type tag so
/// role-handling code gets compile-time exhaustiveness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityRef {
    /// A character (NPC or player).
    Character(CharacterId),
    /// A location.
    Location(LocationId),
    /// An item.
    Item(ItemId),
    /// A world event.
    Event(EventId),
}

impl EntityRef {
    /// Short tag for logging and storage keys.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Character(_) => "character",
            Self::Location(_) => "location",
            Self::Item(_) => "item",
            Self::Event(_) => "event",
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Character(id) => write!(f, "character:{id}"),
            Self::Location(id) => write!(f, "location:{id}"),
            Self::Item(id) => write!(f, "item:{id}"),
            Self::Event(id) => write!(f, "event:{id}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Fact categories and canonical truth
// ---------------------------------------------------------------------------

/// A category of objective reality. Facts in these categories carry
/// `canonical_truth = true`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalCategory {
    /// Directly witnessed state of the world.
    Observed,
    /// Settled historical record.
    Historical,
    /// Present-day state ("the pass is safe").
    CurrentState,
    /// Logically derived from other canonical facts.
    Deduction,
    /// A quantified observation.
    Measurement,
}

/// A category of cultural narrative. Facts in these categories carry
/// `canonical_truth = false` and must name the character who authored them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NarrativeCategory {
    /// A myth.
    Myth,
    /// A legend.
    Legend,
    /// A prophecy.
    Prophecy,
    /// A conspiracy theory.
    Conspiracy,
    /// A religious teaching.
    Religious,
    /// A cultural tradition.
    Cultural,
    /// An epic tale.
    EpicTale,
}

/// Flat category tag as submitted by the ingestion pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactCategory {
    /// See [`CanonicalCategory::Observed`].
    Observed,
    /// See [`CanonicalCategory::Historical`].
    Historical,
    /// See [`CanonicalCategory::CurrentState`].
    CurrentState,
    /// See [`CanonicalCategory::Deduction`].
    Deduction,
    /// See [`CanonicalCategory::Measurement`].
    Measurement,
    /// See [`NarrativeCategory::Myth`].
    Myth,
    /// See [`NarrativeCategory::Legend`].
    Legend,
    /// See [`NarrativeCategory::Prophecy`].
    Prophecy,
    /// See [`NarrativeCategory::Conspiracy`].
    Conspiracy,
    /// See [`NarrativeCategory::Religious`].
    Religious,
    /// See [`NarrativeCategory::Cultural`].
    Cultural,
    /// See [`NarrativeCategory::EpicTale`].
    EpicTale,
}

impl FactCategory {
    /// Whether facts in this category describe objective reality.
    #[must_use]
    pub fn is_canonical(&self) -> bool {
        matches!(
            self,
            Self::Observed
                | Self::Historical
                | Self::CurrentState
                | Self::Deduction
                | Self::Measurement
        )
    }

    /// Stable lowercase name matching the wire/storage form.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Observed => "observed",
            Self::Historical => "historical",
            Self::CurrentState => "current_state",
            Self::Deduction => "deduction",
            Self::Measurement => "measurement",
            Self::Myth => "myth",
            Self::Legend => "legend",
            Self::Prophecy => "prophecy",
            Self::Conspiracy => "conspiracy",
            Self::Religious => "religious",
            Self::Cultural => "cultural",
            Self::EpicTale => "epic_tale",
        }
    }
}

impl fmt::Display for FactCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The truth standing of a fact, with the category/creator coupling
/// enforced by the type itself rather than a runtime check:
/// a narrative fact cannot exist without its author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FactTruth {
    /// Objective reality — one of the canonical categories.
    Canonical(CanonicalCategory),
    /// Cultural narrative — carries the character who authored it.
    Narrative {
        /// Which kind of narrative.
        category: NarrativeCategory,
        /// The character the narrative is attributed to.
        creator: CharacterId,
    },
}

impl FactTruth {
    /// Build from a flat category tag and optional creator, rejecting the
    /// combinations the closed sets forbid.
    ///
    /// # Errors
    ///
    /// [`crate::LoreError::Validation`] when a narrative category arrives
    /// without a creator.
    pub fn from_parts(
        category: FactCategory,
        creator: Option<CharacterId>,
    ) -> crate::error::Result<Self> {
        let narrative = |cat: NarrativeCategory| {
            creator
                .map(|creator| Self::Narrative {
                    category: cat,
                    creator,
                })
                .ok_or_else(|| {
                    crate::LoreError::validation(format!(
                        "narrative category '{}' requires a creator",
                        category.name()
                    ))
                })
        };

        match category {
            FactCategory::Observed => Ok(Self::Canonical(CanonicalCategory::Observed)),
            FactCategory::Historical => Ok(Self::Canonical(CanonicalCategory::Historical)),
            FactCategory::CurrentState => Ok(Self::Canonical(CanonicalCategory::CurrentState)),
            FactCategory::Deduction => Ok(Self::Canonical(CanonicalCategory::Deduction)),
            FactCategory::Measurement => Ok(Self::Canonical(CanonicalCategory::Measurement)),
            FactCategory::Myth => narrative(NarrativeCategory::Myth),
            FactCategory::Legend => narrative(NarrativeCategory::Legend),
            FactCategory::Prophecy => narrative(NarrativeCategory::Prophecy),
            FactCategory::Conspiracy => narrative(NarrativeCategory::Conspiracy),
            FactCategory::Religious => narrative(NarrativeCategory::Religious),
            FactCategory::Cultural => narrative(NarrativeCategory::Cultural),
            FactCategory::EpicTale => narrative(NarrativeCategory::EpicTale),
        }
    }

    /// Whether this fact is objective reality.
    #[must_use]
    pub fn canonical_truth(&self) -> bool {
        matches!(self, Self::Canonical(_))
    }

    /// The flat category tag.
    #[must_use]
    pub fn category(&self) -> FactCategory {
        match self {
            Self::Canonical(CanonicalCategory::Observed) => FactCategory::Observed,
            Self::Canonical(CanonicalCategory::Historical) => FactCategory::Historical,
            Self::Canonical(CanonicalCategory::CurrentState) => FactCategory::CurrentState,
            Self::Canonical(CanonicalCategory::Deduction) => FactCategory::Deduction,
            Self::Canonical(CanonicalCategory::Measurement) => FactCategory::Measurement,
            Self::Narrative {
                category: NarrativeCategory::Myth,
                ..
            } => FactCategory::Myth,
            Self::Narrative {
                category: NarrativeCategory::Legend,
                ..
            } => FactCategory::Legend,
            Self::Narrative {
                category: NarrativeCategory::Prophecy,
                ..
            } => FactCategory::Prophecy,
            Self::Narrative {
                category: NarrativeCategory::Conspiracy,
                ..
            } => FactCategory::Conspiracy,
            Self::Narrative {
                category: NarrativeCategory::Religious,
                ..
            } => FactCategory::Religious,
            Self::Narrative {
                category: NarrativeCategory::Cultural,
                ..
            } => FactCategory::Cultural,
            Self::Narrative {
                category: NarrativeCategory::EpicTale,
                ..
            } => FactCategory::EpicTale,
        }
    }

    /// The attributed author, if any.
    #[must_use]
    pub fn creator(&self) -> Option<CharacterId> {
        match self {
            Self::Canonical(_) => None,
            Self::Narrative { creator, .. } => Some(*creator),
        }
    }
}

// ---------------------------------------------------------------------------
// Knowledge provenance
// ---------------------------------------------------------------------------

/// How a character came to hold a piece of knowledge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Witnessed the event personally.
    Witness,
    /// Heard directly from a named character.
    ToldBy,
    /// Heard as a rumor (two or more hops removed).
    Rumor,
    /// Reasoned it out from other knowledge.
    Deduction,
    /// Remembered from long ago.
    Memory,
    /// Felt it without evidence.
    Intuition,
    /// Learned through deliberate study.
    Research,
    /// Read it somewhere.
    Reading,
    /// Received through divine revelation.
    DivineRevelation,
}

/// A tagged deviation between a belief and the fact it derives from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistortionKind {
    /// Nothing resembling the original survived.
    Complete,
    /// Only part of the fact was retained.
    Partial,
    /// Details were added that were never there.
    Embellished,
    /// The meaning was flipped.
    Inverted,
    /// The scale was blown up.
    Exaggerated,
    /// The scale was played down.
    Minimized,
    /// The fact was recast to fit existing beliefs.
    Reinterpreted,
}

impl DistortionKind {
    /// All distortion kinds, in a stable order used for biased selection.
    pub const ALL: [Self; 7] = [
        Self::Complete,
        Self::Partial,
        Self::Embellished,
        Self::Inverted,
        Self::Exaggerated,
        Self::Minimized,
        Self::Reinterpreted,
    ];
}

// ---------------------------------------------------------------------------
// Scores
// ---------------------------------------------------------------------------

/// Sortable importance score used by the retention policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ImportanceScore(pub OrderedFloat<f32>);

impl ImportanceScore {
    /// Create a score clamped to [0, 1].
    #[must_use]
    pub fn new(score: f32) -> Self {
        Self(OrderedFloat(score.clamp(0.0, 1.0)))
    }

    /// Raw score value.
    #[must_use]
    pub fn value(self) -> f32 {
        self.0.into_inner()
    }
}

/// Clamp a strength-like value to the unit interval.
#[must_use]
pub fn unit(value: f32) -> f32 {
    value.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_categories_map_to_true() {
        for cat in [
            FactCategory::Observed,
            FactCategory::Historical,
            FactCategory::CurrentState,
            FactCategory::Deduction,
            FactCategory::Measurement,
        ] {
            let truth = FactTruth::from_parts(cat, None).expect("canonical needs no creator");
            assert!(truth.canonical_truth());
            assert_eq!(truth.category(), cat);
            assert!(truth.creator().is_none());
        }
    }

    #[test]
    fn narrative_categories_require_creator() {
        for cat in [
            FactCategory::Myth,
            FactCategory::Legend,
            FactCategory::Prophecy,
            FactCategory::Conspiracy,
            FactCategory::Religious,
            FactCategory::Cultural,
            FactCategory::EpicTale,
        ] {
            assert!(FactTruth::from_parts(cat, None).is_err());

            let author = CharacterId::new();
            let truth = FactTruth::from_parts(cat, Some(author)).expect("creator supplied");
            assert!(!truth.canonical_truth());
            assert_eq!(truth.category(), cat);
            assert_eq!(truth.creator(), Some(author));
        }
    }

    #[test]
    fn canonical_categories_ignore_creator() {
        let truth =
            FactTruth::from_parts(FactCategory::Observed, Some(CharacterId::new())).expect("ok");
        assert!(truth.creator().is_none(), "canonical facts have no author");
    }

    #[test]
    fn days_since_uses_tick_delta() {
        let t0 = WorldTimestamp::now(0);
        let t1 = WorldTimestamp::now(48_000);
        assert!((t1.days_since(&t0, 24_000) - 2.0).abs() < f32::EPSILON);
        // Zero divisor falls back to the default conversion.
        assert!((t1.days_since(&t0, 0) - 2.0).abs() < f32::EPSILON);
    }
}

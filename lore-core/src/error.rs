//! Error types for the LORE engine.
//!
//! The taxonomy mirrors how callers are expected to react:
//!
//! - [`LoreError::Validation`] — bad input; fix it and resubmit, never retried as-is.
//! - [`LoreError::Conflict`] — optimistic-concurrency loss; re-read and retry.
//! - Not-found variants — unknown id; surfaced directly.
//! - [`LoreError::Consistency`] — an internal invariant broke. This signals a bug;
//!   the engine never attempts self-repair, callers should halt and alert.

use thiserror::Error;

/// Top-level error type for all LORE operations.
#[derive(Error, Debug)]
pub enum LoreError {
    /// Input failed validation (category/truth mismatch, missing creator,
    /// content bounds, duplicate `learn` on an already-current lineage).
    #[error("Validation failed: {reason}")]
    Validation {
        /// What was wrong with the input.
        reason: String,
    },

    /// An optimistic-concurrency check lost the race (supersede on a
    /// non-head fact, stale version on `update_belief`).
    #[error("Conflict: {reason}")]
    Conflict {
        /// What changed underneath the caller.
        reason: String,
    },

    /// No fact with the given ID.
    #[error("Fact not found: {0}")]
    FactNotFound(crate::FactId),

    /// No lineage with the given ID.
    #[error("Lineage not found: {0}")]
    LineageNotFound(crate::LineageId),

    /// No current knowledge record for the given character and lineage.
    #[error("Knowledge not found: character {character}, lineage {lineage}")]
    KnowledgeNotFound {
        /// The character queried.
        character: crate::CharacterId,
        /// The lineage queried.
        lineage: crate::LineageId,
    },

    /// An internal invariant was violated (supersession cycle, overlapping
    /// history windows, duplicate current records). Fatal — signals a bug.
    #[error("Consistency violation: {detail}")]
    Consistency {
        /// Which invariant broke and where.
        detail: String,
    },

    /// SQLite persistence error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Serialization or deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LoreError {
    /// Build a [`LoreError::Validation`].
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    /// Build a [`LoreError::Conflict`].
    pub fn conflict(reason: impl Into<String>) -> Self {
        Self::Conflict {
            reason: reason.into(),
        }
    }

    /// Build a [`LoreError::Consistency`].
    pub fn consistency(detail: impl Into<String>) -> Self {
        Self::Consistency {
            detail: detail.into(),
        }
    }

    /// Whether this error signals a bug rather than a recoverable condition.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Consistency { .. })
    }
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, LoreError>;

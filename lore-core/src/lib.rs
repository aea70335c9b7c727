//! # LORE Core Library
//!
//! Temporal fact and belief engine for game worlds: the world changes,
//! characters keep believing what they learned.
//!
//! The engine tracks two layers of truth and the drift between them:
//!
//! - **Facts** — canonical propositions about the world, versioned by
//!   supersession ([`fact`], [`history`], [`graph`])
//! - **Beliefs** — what each character thinks is true, with provenance,
//!   confidence, and distortion ([`knowledge`], [`rumor`])
//!
//! A fact is never edited or deleted; it is superseded, closing its history
//! window and opening a new one. Characters keep pointing at the version
//! they learned until something (a retelling, a rumor, a fresh observation)
//! updates their belief, so "what the tavern keeper still thinks" and "what
//! is actually true" are always separately answerable. The [`retention`]
//! policy keeps the fact set bounded by importance, and [`persistence`]
//! saves whole worlds to SQLite.
//!
//! [`engine::LoreEngine`] ties the layers together behind one API.

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod engine;
pub mod error;
pub mod fact;
pub mod graph;
pub mod history;
pub mod ingest;
pub mod knowledge;
pub mod persistence;
pub mod retention;
pub mod rumor;
pub mod types;

pub use config::LoreConfig;
pub use engine::{LoreEngine, SharedEngine};
pub use error::LoreError;
pub use types::*;

//! Configuration for the LORE engine.
//!
//! Maps directly to `lore.toml`. Every field has a serde default so a
//! partial file (or no file at all) yields a working configuration.

use serde::{Deserialize, Serialize};

/// Top-level LORE configuration, loadable from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoreConfig {
    /// World-clock settings.
    #[serde(default)]
    pub world: WorldConfig,
    /// Fact store limits.
    #[serde(default)]
    pub facts: FactConfig,
    /// Per-character knowledge limits.
    #[serde(default)]
    pub knowledge: KnowledgeConfig,
    /// Rumor propagation tuning.
    #[serde(default)]
    pub propagation: PropagationConfig,
    /// Retention / importance-scoring policy.
    #[serde(default)]
    pub retention: RetentionConfig,
    /// Persistence / save settings.
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

impl LoreConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns [`crate::LoreError::Config`] if the TOML is invalid.
    pub fn from_toml(toml_str: &str) -> crate::error::Result<Self> {
        toml::from_str(toml_str).map_err(|e| crate::LoreError::Config(e.to_string()))
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// World-clock settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldConfig {
    /// Logical ticks per in-game day.
    #[serde(default = "default_ticks_per_day")]
    pub ticks_per_day: u64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            ticks_per_day: 24_000,
        }
    }
}

/// Fact store limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactConfig {
    /// Maximum character length of fact content.
    #[serde(default = "default_2000")]
    pub max_content_chars: usize,
}

impl Default for FactConfig {
    fn default() -> Self {
        Self {
            max_content_chars: 2000,
        }
    }
}

/// Per-character knowledge limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// Ceiling on live (current, non-deleted) beliefs per character.
    /// Exceeding it triggers capacity pruning via `forget`.
    #[serde(default = "default_100")]
    pub max_live_per_character: usize,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            max_live_per_character: 100,
        }
    }
}

/// Rumor propagation tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropagationConfig {
    /// Belief strength lost per hop along the trust graph.
    #[serde(default = "default_0_1")]
    pub decay_per_hop: f32,
    /// Base probability of a distortion roll, multiplied by hop count.
    #[serde(default = "default_0_15")]
    pub base_distortion_rate: f32,
    /// Upper bound on the distortion probability regardless of hop count.
    #[serde(default = "default_0_9")]
    pub distortion_cap: f32,
    /// Hard limit on walk depth (telephone-game degradation limit).
    #[serde(default = "default_4")]
    pub max_hops: u32,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            decay_per_hop: 0.1,
            base_distortion_rate: 0.15,
            distortion_cap: 0.9,
            max_hops: 4,
        }
    }
}

/// Retention / importance-scoring policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Weight applied per live knowledge reference.
    #[serde(default = "default_0_2")]
    pub reference_weight: f32,
    /// Decay window in in-game days; recency decay approaches zero past it.
    #[serde(default = "default_30")]
    pub decay_window_days: f32,
    /// Facts scoring below this (with zero live references) become
    /// cleanup candidates.
    #[serde(default = "default_0_2")]
    pub cleanup_threshold: f32,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            reference_weight: 0.2,
            decay_window_days: 30.0,
            cleanup_threshold: 0.2,
        }
    }
}

/// Persistence / save configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Use WAL mode for concurrent reads.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
    /// Detect save corruption via checksums.
    #[serde(default = "default_true")]
    pub checksum_enabled: bool,
    /// Number of save backups to keep.
    #[serde(default = "default_3")]
    pub backup_count: u32,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            wal_mode: true,
            checksum_enabled: true,
            backup_count: 3,
        }
    }
}

// ---------------------------------------------------------------------------
// Serde default helpers
// ---------------------------------------------------------------------------

fn default_true() -> bool {
    true
}
fn default_0_1() -> f32 {
    0.1
}
fn default_0_15() -> f32 {
    0.15
}
fn default_0_2() -> f32 {
    0.2
}
fn default_0_9() -> f32 {
    0.9
}
fn default_30() -> f32 {
    30.0
}
fn default_3() -> u32 {
    3
}
fn default_4() -> u32 {
    4
}
fn default_100() -> usize {
    100
}
fn default_2000() -> usize {
    2000
}
fn default_ticks_per_day() -> u64 {
    24_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config = LoreConfig::from_toml("").expect("empty TOML is valid");
        assert_eq!(config.world.ticks_per_day, 24_000);
        assert_eq!(config.facts.max_content_chars, 2000);
        assert!((config.propagation.decay_per_hop - 0.1).abs() < f32::EPSILON);
        assert_eq!(config.propagation.max_hops, 4);
        assert!((config.retention.decay_window_days - 30.0).abs() < f32::EPSILON);
        assert!(config.persistence.wal_mode);
    }

    #[test]
    fn partial_toml_overrides_one_section() {
        let toml = r#"
            [propagation]
            decay_per_hop = 0.25
            max_hops = 2
        "#;
        let config = LoreConfig::from_toml(toml).expect("valid TOML");
        assert!((config.propagation.decay_per_hop - 0.25).abs() < f32::EPSILON);
        assert_eq!(config.propagation.max_hops, 2);
        // Untouched sections keep defaults.
        assert_eq!(config.knowledge.max_live_per_character, 100);
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        let err = LoreConfig::from_toml("not [valid").expect_err("garbage TOML");
        assert!(matches!(err, crate::LoreError::Config(_)));
    }
}

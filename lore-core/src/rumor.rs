//! Rumor propagation — belief decay and distortion across a trust graph.
//!
//! The trust graph itself belongs to an external collaborator; this module
//! consumes it through [`TrustGraph`] and plans a breadth-first walk from a
//! sharing character outward. Belief strength falls linearly with hop
//! count, distortion probability rises with it, and the whole walk is
//! reproducible from a seed — the same seed and graph always yield the
//! same deliveries.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;

use crate::config::PropagationConfig;
use crate::types::{CharacterId, DistortionKind, SourceKind, unit};

/// Read-only view of who can tell whom, with per-edge reliability (0.0–1.0).
pub trait TrustGraph {
    /// Outgoing edges from `of`: each `(listener, reliability)` pair means
    /// `of` can tell `listener`, degraded by `reliability`.
    fn neighbors(&self, of: CharacterId) -> Vec<(CharacterId, f32)>;
}

impl TrustGraph for std::collections::HashMap<CharacterId, Vec<(CharacterId, f32)>> {
    fn neighbors(&self, of: CharacterId) -> Vec<(CharacterId, f32)> {
        self.get(&of).cloned().unwrap_or_default()
    }
}

/// How a character tends to distort information, as relative weights over
/// [`DistortionKind::ALL`]. Declared by an external trait system; the
/// engine only consumes it.
#[derive(Debug, Clone)]
pub struct DistortionBias {
    /// Relative weight per distortion kind, aligned with [`DistortionKind::ALL`].
    pub weights: [f32; 7],
}

impl Default for DistortionBias {
    fn default() -> Self {
        Self { weights: [1.0; 7] }
    }
}

impl DistortionBias {
    /// Bias entirely toward one kind.
    #[must_use]
    pub fn only(kind: DistortionKind) -> Self {
        let mut weights = [0.0; 7];
        let idx = DistortionKind::ALL
            .iter()
            .position(|k| *k == kind)
            .unwrap_or(0);
        weights[idx] = 1.0;
        Self { weights }
    }

    /// Weighted pick of a distortion kind. Falls back to a uniform pick
    /// when every weight is zero or negative.
    fn pick(&self, rng: &mut StdRng) -> DistortionKind {
        let total: f32 = self.weights.iter().map(|w| w.max(0.0)).sum();
        if total <= 0.0 {
            return DistortionKind::ALL[rng.gen_range(0..DistortionKind::ALL.len())];
        }
        let mut roll = rng.gen_range(0.0..total);
        for (kind, weight) in DistortionKind::ALL.iter().zip(self.weights.iter()) {
            let w = weight.max(0.0);
            if roll < w {
                return *kind;
            }
            roll -= w;
        }
        DistortionKind::Reinterpreted
    }
}

/// One planned transmission: `from` tells `to` at hop `hop`.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    /// The receiving character.
    pub to: CharacterId,
    /// The immediate predecessor in the walk.
    pub from: CharacterId,
    /// Propagation distance from the sharing character.
    pub hop: u32,
    /// Belief strength delivered — never exceeds `source − decay × hop`.
    pub strength: f32,
    /// `ToldBy` at hop 1, `Rumor` beyond.
    pub source_kind: SourceKind,
    /// Distortion applied in transit, if the roll hit.
    pub distortion: Option<DistortionKind>,
}

/// Plan the full walk from `source` with belief `source_strength`.
///
/// Breadth-first, hop by hop. At hop `h` the candidate strength is
/// `source_strength − decay_per_hop × h`, floored at zero; a zero
/// candidate terminates that path. The delivered strength additionally
/// scales by edge reliability. A distortion roll fires with probability
/// `min(cap, base_rate × h)` and picks a kind under the receiver's bias.
///
/// Deterministic for a fixed `seed`, graph, and bias function.
pub fn plan_walk(
    source: CharacterId,
    source_strength: f32,
    graph: &dyn TrustGraph,
    bias_for: &dyn Fn(CharacterId) -> DistortionBias,
    config: &PropagationConfig,
    seed: u64,
) -> Vec<Delivery> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut visited: HashSet<CharacterId> = HashSet::new();
    visited.insert(source);

    let mut deliveries = Vec::new();
    let mut frontier = vec![source];

    for hop in 1..=config.max_hops {
        let candidate = source_strength - config.decay_per_hop * hop as f32;
        if candidate <= 0.0 {
            break; // nothing worth saying survives this far
        }

        let mut next_frontier = Vec::new();
        for teller in frontier {
            for (listener, reliability) in graph.neighbors(teller) {
                if visited.contains(&listener) {
                    continue;
                }
                let strength = unit(candidate * unit(reliability));
                if strength <= 0.0 {
                    continue;
                }
                visited.insert(listener);

                let distortion_p =
                    (config.base_distortion_rate * hop as f32).min(config.distortion_cap);
                let distortion = if rng.gen_range(0.0..1.0_f32) < distortion_p {
                    Some(bias_for(listener).pick(&mut rng))
                } else {
                    None
                };

                deliveries.push(Delivery {
                    to: listener,
                    from: teller,
                    hop,
                    strength,
                    source_kind: if hop == 1 {
                        SourceKind::ToldBy
                    } else {
                        SourceKind::Rumor
                    },
                    distortion,
                });
                next_frontier.push(listener);
            }
        }
        frontier = next_frontier;
        if frontier.is_empty() {
            break;
        }
    }

    deliveries
}

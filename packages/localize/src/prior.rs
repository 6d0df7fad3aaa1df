//! Per-segment prior leak probabilities derived from asset attributes.
//!
//! A deliberate domain heuristic, not a learned model: older pipes, brittle
//! materials, and segments with failure history get systematically higher
//! priors, all within (0, 0.1] so that sensor evidence still dominates the
//! posterior.

use std::collections::BTreeMap;

use leak_map_network::PipeNetworkGraph;
use leak_map_network_models::{PipeMaterial, PipeSegment};

/// Prior assigned to segments the table has never seen.
pub const DEFAULT_PRIOR: f64 = 0.01;

/// Annual base leak rate before any attribute adjustment.
const BASE_RATE: f64 = 0.01;

/// Upper bound on any prior; keeps a single bad pipe from swamping the
/// posterior before sensors weigh in.
const PRIOR_CAP: f64 = 0.1;

/// Pipe age at which the age factor saturates, in years.
const AGE_SATURATION_YEARS: f64 = 50.0;

/// Relative leak propensity by material, normalized to roughly [0, 1].
const fn material_factor(material: PipeMaterial) -> f64 {
    match material {
        PipeMaterial::CastIron => 0.8,
        PipeMaterial::AsbestosCement => 0.9,
        PipeMaterial::DuctileIron => 0.5,
        PipeMaterial::Steel => 0.6,
        PipeMaterial::Concrete => 0.7,
        PipeMaterial::Pvc => 0.3,
        PipeMaterial::Hdpe => 0.25,
        PipeMaterial::Unknown => 0.5,
    }
}

fn age_factor(age_years: f64) -> f64 {
    // Age 0 means "not recorded" in most asset inventories; score it as
    // average rather than brand new.
    if age_years <= 0.0 {
        0.5
    } else {
        (age_years / AGE_SATURATION_YEARS).min(1.0)
    }
}

fn failure_factor(failure_count: u32) -> f64 {
    0.2f64.mul_add(f64::from(failure_count), 1.0).min(2.0)
}

/// Computes the prior leak probability for one segment.
///
/// `base × (1 + material + age) / 3 × failure`, capped at 0.1. Monotone in
/// material risk and failure count.
#[must_use]
pub fn segment_prior(segment: &PipeSegment) -> f64 {
    let condition = (1.0 + material_factor(segment.material) + age_factor(segment.age_years)) / 3.0;
    (BASE_RATE * condition * failure_factor(segment.failure_count)).min(PRIOR_CAP)
}

/// Priors for every segment of an attached network.
///
/// Recomputed whenever a network snapshot is attached; never persisted
/// independently of it.
#[derive(Debug, Clone, Default)]
pub struct PriorTable {
    priors: BTreeMap<String, f64>,
}

impl PriorTable {
    /// Computes priors for every segment in the network.
    #[must_use]
    pub fn from_network(network: &PipeNetworkGraph) -> Self {
        let priors = network
            .segments()
            .map(|segment| (segment.segment_id.clone(), segment_prior(segment)))
            .collect();
        Self { priors }
    }

    /// Prior for a segment, or [`DEFAULT_PRIOR`] if unseen.
    #[must_use]
    pub fn prior(&self, segment_id: &str) -> f64 {
        self.priors.get(segment_id).copied().unwrap_or(DEFAULT_PRIOR)
    }

    /// Number of segments with computed priors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.priors.len()
    }

    /// Whether the table holds no priors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.priors.is_empty()
    }
}

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Leak localization engines.
//!
//! Two strategies share one contract (per-sensor leak probabilities in,
//! ranked [`leak_map_localize_models::LocalizationResult`] out):
//!
//! - [`BayesianLocalizer`] combines pipe-attribute priors with
//!   distance-decayed sensor evidence over loaded network topology.
//! - [`FallbackLocalizer`] estimates a probability-weighted centroid from
//!   sensor coordinates alone, for deployments that have no GIS import yet.
//!
//! Both always produce a structurally valid result: missing topology,
//! unknown ids, and disconnected graphs degrade to low/zero confidence
//! with an explanatory reasoning entry, never an error. The engines feed
//! operational alerting, where "no answer" is worse than "low-confidence
//! answer". Probabilities are expected in [0, 1]; callers clamp or
//! validate before calling.

pub mod bayesian;
pub mod fallback;
pub mod prior;

use thiserror::Error;

pub use bayesian::{BayesianLocalizer, LocalizerConfig};
pub use fallback::{FallbackConfig, FallbackLocalizer};
pub use prior::{PriorTable, segment_prior};

/// Errors that can occur when configuring a localizer.
///
/// Inference itself never errors; see the crate docs.
#[derive(Debug, Error)]
pub enum LocalizeError {
    /// A configuration value is out of its valid range.
    #[error("invalid localizer configuration: {message}")]
    InvalidConfig {
        /// Description of what went wrong.
        message: String,
    },
}

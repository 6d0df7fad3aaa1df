#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Pipe network asset and sensor domain types.
//!
//! These types are the load-time contract with the external GIS/asset
//! inventory: segments and sensors are ingested in bulk when a DMA's
//! topology is (re)loaded and are treated as immutable for the lifetime
//! of that network snapshot.

use chrono::{DateTime, Utc};
use leak_map_geometry::Point;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Pipe wall material, the dominant attribute for failure-rate priors.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PipeMaterial {
    /// Polyvinyl chloride
    Pvc,
    /// High-density polyethylene
    Hdpe,
    /// Ductile iron
    DuctileIron,
    /// Cast (grey) iron, typically pre-1970s stock
    CastIron,
    /// Welded or galvanized steel
    Steel,
    /// Asbestos cement, brittle with age
    AsbestosCement,
    /// Reinforced or prestressed concrete
    Concrete,
    /// Material not recorded in the asset inventory
    #[default]
    Unknown,
}

impl PipeMaterial {
    /// Parses a material string, mapping unrecognized values to
    /// [`Self::Unknown`].
    ///
    /// GIS exports are messy; an unrecognized material must not fail a
    /// bulk network load.
    #[must_use]
    pub fn parse_lossy(value: &str) -> Self {
        value.trim().to_lowercase().parse().unwrap_or(Self::Unknown)
    }

    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Pvc,
            Self::Hdpe,
            Self::DuctileIron,
            Self::CastIron,
            Self::Steel,
            Self::AsbestosCement,
            Self::Concrete,
            Self::Unknown,
        ]
    }

    /// Whether the material is ferrous (iron or steel).
    ///
    /// Ferrous pipe walls carry acoustic leak noise well, which drives
    /// the inspection method recommendation.
    #[must_use]
    pub const fn is_ferrous(self) -> bool {
        matches!(self, Self::DuctileIron | Self::CastIron | Self::Steel)
    }
}

/// The measurement class of a field sensor.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SensorKind {
    /// Pressure transducer
    #[default]
    Pressure,
    /// Flow meter
    Flow,
    /// Acoustic noise logger
    Acoustic,
    /// Combined pressure/flow unit
    Combined,
}

/// One edge of the distribution network: a physical pipe between two
/// junction nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipeSegment {
    /// Unique segment identifier from the asset inventory.
    pub segment_id: String,
    /// Junction node id at the upstream end.
    pub upstream_node: String,
    /// Junction node id at the downstream end.
    pub downstream_node: String,
    /// Pipe length in meters (must be positive).
    pub length_m: f64,
    /// Internal diameter in millimeters (must be positive).
    pub diameter_mm: f64,
    /// Pipe wall material.
    pub material: PipeMaterial,
    /// Age in years since installation (0 when unknown).
    pub age_years: f64,
    /// Recorded failures over the segment's life (non-decreasing).
    pub failure_count: u32,
    /// Timestamp of the most recent inspection, if any.
    pub last_inspection: Option<DateTime<Utc>>,
    /// Street or easement the pipe runs under.
    pub street_name: String,
    /// Segment midpoint, when the GIS export carries geometry.
    pub coordinates: Option<Point>,
}

/// A sensor's position in the network.
///
/// The per-call leak probability is deliberately *not* stored here: it is
/// transient inference input, passed alongside the sensor id on every
/// localization call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorNode {
    /// Unique sensor identifier.
    pub sensor_id: String,
    /// Graph node the sensor is mounted at.
    pub node_id: String,
    /// Measurement class.
    pub kind: SensorKind,
    /// Installed location, when surveyed.
    pub coordinates: Option<Point>,
}

/// A named area used by the fallback localizer before any pipe topology
/// has been imported (e.g. a suburb or pressure zone).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Zone {
    /// Unique zone identifier.
    pub zone_id: String,
    /// Human-readable zone name.
    pub name: String,
    /// Zone center point.
    pub center: Point,
}

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Leak localization result types.
//!
//! These are the output contract of both localizers, consumed downstream
//! by alerting, dashboards, and work-order generation. Field presence is
//! deterministic: optional fields serialize as explicit nulls, and the
//! ranked-segments sequence is always sorted descending by probability.

use chrono::{DateTime, Utc};
use leak_map_geometry::Point;
use leak_map_network_models::PipeMaterial;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Field method recommended for pinpointing a leak at a candidate site.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum InspectionMethod {
    /// Listening stick or correlator on fittings; small-diameter mains.
    AcousticStick,
    /// Leak-noise correlator or ground microphone; metallic pipes.
    AcousticCorrelator,
    /// Ground microphone or tracer gas; plastic and large mains.
    GroundMicrophone,
    /// Tracer gas injection; quiet plastic pipe.
    TracerGas,
    /// Walkover survey of an area around an estimated point (no topology).
    AreaSurvey,
}

/// One candidate pipe segment in the ranked output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedSegment {
    /// Segment identifier.
    pub segment_id: String,
    /// Normalized posterior probability that the leak is on this segment.
    pub probability: f64,
    /// Running sum of probability down the ranking.
    pub cumulative_probability: f64,
    /// Street or easement the pipe runs under.
    pub street_name: String,
    /// Pipe wall material.
    pub material: PipeMaterial,
    /// Age in years.
    pub age_years: f64,
    /// Internal diameter in millimeters.
    pub diameter_mm: f64,
    /// Recorded failures over the segment's life.
    pub failure_count: u32,
    /// Segment midpoint, when known.
    pub coordinates: Option<Point>,
}

/// A prioritized field inspection recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectionPoint {
    /// 1-based priority (1 = inspect first).
    pub priority: u32,
    /// Target segment, when topology is available.
    pub segment_id: Option<String>,
    /// Where to send the crew, when coordinates are known.
    pub coordinates: Option<Point>,
    /// Recommended pinpointing method.
    pub method: InspectionMethod,
    /// Human-readable instruction for the crew.
    pub description: String,
}

/// A zone ranked by proximity to the fallback localizer's estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneScore {
    /// Zone identifier.
    pub zone_id: String,
    /// Human-readable zone name.
    pub name: String,
    /// Proximity score in (0, 1], higher is closer.
    pub score: f64,
    /// Great-circle distance from the estimate to the zone center, in km.
    pub distance_km: f64,
}

/// The output of one localization call.
///
/// Always structurally valid: a degraded run (no topology, no usable
/// sensors) yields empty rankings, zero confidence, and a reasoning entry
/// explaining why, never an error. Created fresh per call and not mutated
/// afterwards; persistence is the caller's concern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalizationResult {
    /// District metered area this inference ran against.
    pub dma_id: String,
    /// When the inference ran.
    pub timestamp: DateTime<Utc>,
    /// Candidate segments, descending by probability.
    pub ranked_segments: Vec<RankedSegment>,
    /// Overall confidence in [0, 1].
    pub confidence: f64,
    /// Estimated search area; always `None` (no GIS polygon computation).
    pub coverage_area_km2: Option<f64>,
    /// Prioritized inspection recommendations.
    pub recommended_inspection_points: Vec<InspectionPoint>,
    /// Zones ranked by proximity (fallback localizer only; empty otherwise).
    pub ranked_zones: Vec<ZoneScore>,
    /// Ordered human-readable explanation of the result.
    pub reasoning: Vec<String>,
    /// Identifier of the model that produced this result.
    pub model_version: String,
    /// Wall-clock inference time in milliseconds.
    pub inference_time_ms: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_serializes_camel_case_with_explicit_nulls() {
        let result = LocalizationResult {
            dma_id: "DMA-07".to_string(),
            timestamp: Utc::now(),
            ranked_segments: vec![RankedSegment {
                segment_id: "P-001".to_string(),
                probability: 0.6,
                cumulative_probability: 0.6,
                street_name: "Main St".to_string(),
                material: PipeMaterial::CastIron,
                age_years: 40.0,
                diameter_mm: 100.0,
                failure_count: 2,
                coordinates: None,
            }],
            confidence: 0.8,
            coverage_area_km2: None,
            recommended_inspection_points: vec![InspectionPoint {
                priority: 1,
                segment_id: Some("P-001".to_string()),
                coordinates: None,
                method: InspectionMethod::AcousticCorrelator,
                description: "Correlate along Main St".to_string(),
            }],
            ranked_zones: Vec::new(),
            reasoning: vec!["1 sensor in agreement".to_string()],
            model_version: "bayesian-v1".to_string(),
            inference_time_ms: 1.25,
        };

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["dmaId"], "DMA-07");
        assert!(json["coverageAreaKm2"].is_null());
        assert_eq!(json["rankedSegments"][0]["segmentId"], "P-001");
        assert_eq!(
            json["recommendedInspectionPoints"][0]["method"],
            "acoustic_correlator"
        );
    }

    #[test]
    fn result_round_trips_through_json() {
        let result = LocalizationResult {
            dma_id: "DMA-07".to_string(),
            timestamp: Utc::now(),
            ranked_segments: Vec::new(),
            confidence: 0.0,
            coverage_area_km2: None,
            recommended_inspection_points: Vec::new(),
            ranked_zones: vec![ZoneScore {
                zone_id: "Z1".to_string(),
                name: "Northmead".to_string(),
                score: 0.9,
                distance_km: 1.2,
            }],
            reasoning: vec!["no topology".to_string()],
            model_version: "centroid-v1".to_string(),
            inference_time_ms: 0.0,
        };

        let json = serde_json::to_string(&result).unwrap();
        let back: LocalizationResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result);
    }

    #[test]
    fn inspection_method_display_is_snake_case() {
        assert_eq!(InspectionMethod::TracerGas.to_string(), "tracer_gas");
        assert_eq!(InspectionMethod::AreaSurvey.to_string(), "area_survey");
    }
}

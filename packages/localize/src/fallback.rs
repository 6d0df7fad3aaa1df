//! Degraded-mode localizer for deployments without pipe topology.
//!
//! Before a GIS import exists there is no graph to reason over, but sensor
//! coordinates and a handful of named zones are usually known on day one.
//! This localizer estimates a leak position as the probability-weighted
//! centroid of sensor locations and ranks the registered zones by
//! great-circle proximity to that estimate.

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::Utc;
use leak_map_geometry::{Point, centroid, weighted_centroid};
use leak_map_localize_models::{
    InspectionMethod, InspectionPoint, LocalizationResult, ZoneScore,
};
use leak_map_network_models::Zone;
use serde::{Deserialize, Serialize};

/// Tuning parameters for [`FallbackLocalizer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FallbackConfig {
    /// Distance scale for zone proximity scoring, in kilometers; a zone
    /// this far from the estimate scores 0.5.
    pub zone_distance_scale_km: f64,
    /// Version tag stamped into results.
    pub model_version: String,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            zone_distance_scale_km: 100.0,
            model_version: "centroid-v1".to_string(),
        }
    }
}

/// Zone-level leak localizer using sensor coordinates only.
#[derive(Debug, Default)]
pub struct FallbackLocalizer {
    sensor_positions: BTreeMap<String, Point>,
    zones: Vec<Zone>,
    config: FallbackConfig,
}

impl FallbackLocalizer {
    /// Creates a localizer with default tuning.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a localizer with custom tuning.
    #[must_use]
    pub fn with_config(config: FallbackConfig) -> Self {
        Self {
            sensor_positions: BTreeMap::new(),
            zones: Vec::new(),
            config,
        }
    }

    /// Registers (or moves) a sensor's surveyed position.
    pub fn register_sensor(&mut self, sensor_id: impl Into<String>, position: Point) {
        self.sensor_positions.insert(sensor_id.into(), position);
    }

    /// Registers a named zone for proximity ranking.
    pub fn register_zone(&mut self, zone: Zone) {
        self.zones.push(zone);
    }

    /// Number of sensors with known positions.
    #[must_use]
    pub fn sensor_count(&self) -> usize {
        self.sensor_positions.len()
    }

    /// Number of registered zones.
    #[must_use]
    pub fn zone_count(&self) -> usize {
        self.zones.len()
    }

    /// Estimates a leak position and ranks zones by proximity.
    ///
    /// Sensor weights are the squared probabilities, deliberately
    /// suppressing low-confidence sensors' pull on the estimate. Falls
    /// back to the unweighted mean when all weights are zero, and to a
    /// zero-confidence empty result when no supplied sensor has a known
    /// position. Never errors.
    #[must_use]
    pub fn localize(
        &self,
        sensor_probabilities: &BTreeMap<String, f64>,
        dma_id: &str,
    ) -> LocalizationResult {
        if sensor_probabilities.is_empty() {
            return self.degenerate_result(
                dma_id,
                "No sensor observations were supplied; cannot estimate a leak position",
            );
        }

        let started = Instant::now();

        let located: Vec<(Point, f64)> = sensor_probabilities
            .iter()
            .filter_map(|(sensor_id, &probability)| {
                self.sensor_positions
                    .get(sensor_id)
                    .map(|&point| (point, probability * probability))
            })
            .collect();

        if located.is_empty() {
            return self.degenerate_result(
                dma_id,
                "None of the reporting sensors have known coordinates; cannot estimate a leak position",
            );
        }

        let points: Vec<Point> = located.iter().map(|(point, _)| *point).collect();
        let Some(estimate) = weighted_centroid(&located).or_else(|| centroid(&points)) else {
            // Unreachable with a non-empty `located`, but degrade anyway.
            return self.degenerate_result(dma_id, "Could not compute a centroid estimate");
        };

        let ranked_zones = self.rank_zones(&estimate);
        let confidence = Self::confidence(sensor_probabilities);
        let reasoning = Self::reasoning(&estimate, located.len(), &ranked_zones);

        LocalizationResult {
            dma_id: dma_id.to_string(),
            timestamp: Utc::now(),
            ranked_segments: Vec::new(),
            confidence,
            coverage_area_km2: None,
            recommended_inspection_points: vec![InspectionPoint {
                priority: 1,
                segment_id: None,
                coordinates: Some(estimate),
                method: InspectionMethod::AreaSurvey,
                description: format!(
                    "Walk the area around ({:.5}, {:.5}) with acoustic equipment",
                    estimate.lat, estimate.lon
                ),
            }],
            ranked_zones,
            reasoning,
            model_version: self.config.model_version.clone(),
            inference_time_ms: started.elapsed().as_secs_f64() * 1000.0,
        }
    }

    /// Score `1 / (1 + d/scale)`, descending; zone id breaks ties so the
    /// ranking is deterministic.
    fn rank_zones(&self, estimate: &Point) -> Vec<ZoneScore> {
        let mut ranked: Vec<ZoneScore> = self
            .zones
            .iter()
            .map(|zone| {
                let distance_km = estimate.distance_km(&zone.center);
                ZoneScore {
                    zone_id: zone.zone_id.clone(),
                    name: zone.name.clone(),
                    score: 1.0 / (1.0 + distance_km / self.config.zone_distance_scale_km),
                    distance_km,
                }
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.zone_id.cmp(&b.zone_id))
        });
        ranked
    }

    /// `min(max_p × (1 + 0.2 × agreeing), 1)`: one loud sensor sets the
    /// base, corroborating sensors raise it.
    #[allow(clippy::cast_precision_loss)]
    fn confidence(sensor_probabilities: &BTreeMap<String, f64>) -> f64 {
        let max_p = sensor_probabilities
            .values()
            .copied()
            .fold(0.0_f64, f64::max);
        let agreeing = sensor_probabilities.values().filter(|&&p| p > 0.5).count();

        (max_p * 0.2f64.mul_add(agreeing as f64, 1.0)).min(1.0)
    }

    fn reasoning(
        estimate: &Point,
        located_count: usize,
        ranked_zones: &[ZoneScore],
    ) -> Vec<String> {
        let mut reasoning = vec![
            "No pipe topology available; using probability-weighted sensor centroid".to_string(),
            format!(
                "Estimated leak position ({:.5}, {:.5}) from {located_count} located sensors",
                estimate.lat, estimate.lon
            ),
        ];

        if let Some(nearest) = ranked_zones.first() {
            reasoning.push(format!(
                "Nearest zone: {} ({:.2} km from estimate)",
                nearest.name, nearest.distance_km
            ));
        } else {
            reasoning.push("No zones registered for proximity ranking".to_string());
        }

        reasoning
    }

    fn degenerate_result(&self, dma_id: &str, reason: &str) -> LocalizationResult {
        log::warn!("Fallback localization for DMA {dma_id} degraded: {reason}");
        LocalizationResult {
            dma_id: dma_id.to_string(),
            timestamp: Utc::now(),
            ranked_segments: Vec::new(),
            confidence: 0.0,
            coverage_area_km2: None,
            recommended_inspection_points: Vec::new(),
            ranked_zones: Vec::new(),
            reasoning: vec![reason.to_string()],
            model_version: self.config.model_version.clone(),
            inference_time_ms: 0.0,
        }
    }
}

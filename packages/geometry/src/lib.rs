#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geographic primitives shared across the localization packages.
//!
//! Everything here is a pure function over lat/lon pairs: great-circle
//! distance and (weighted) centroids. Pipe networks span a few kilometers
//! at most, so the spherical-earth haversine approximation is more than
//! accurate enough for ranking work.

use serde::{Deserialize, Serialize};

/// Mean Earth radius in meters, used by the haversine formula.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A WGS84 latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Point {
    /// Latitude in decimal degrees (positive north).
    pub lat: f64,
    /// Longitude in decimal degrees (positive east).
    pub lon: f64,
}

impl Point {
    /// Creates a point from latitude and longitude in decimal degrees.
    #[must_use]
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Great-circle distance to another point in meters (haversine).
    #[must_use]
    pub fn distance_m(&self, other: &Self) -> f64 {
        let d_lat = (other.lat - self.lat).to_radians();
        let d_lon = (other.lon - self.lon).to_radians();
        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();

        let a = (d_lat / 2.0).sin().powi(2)
            + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().asin();

        EARTH_RADIUS_M * c
    }

    /// Great-circle distance to another point in kilometers.
    #[must_use]
    pub fn distance_km(&self, other: &Self) -> f64 {
        self.distance_m(other) / 1000.0
    }
}

/// Unweighted mean of a set of points.
///
/// Returns `None` for an empty slice. Plain lat/lon averaging is fine at
/// DMA scale; no antimeridian handling is attempted.
#[must_use]
pub fn centroid(points: &[Point]) -> Option<Point> {
    if points.is_empty() {
        return None;
    }

    #[allow(clippy::cast_precision_loss)]
    let n = points.len() as f64;
    let lat = points.iter().map(|p| p.lat).sum::<f64>() / n;
    let lon = points.iter().map(|p| p.lon).sum::<f64>() / n;
    Some(Point::new(lat, lon))
}

/// Weight-proportional mean of a set of points.
///
/// Returns `None` if the slice is empty or the total weight is not
/// positive (callers fall back to [`centroid`] in that case).
#[must_use]
pub fn weighted_centroid(points: &[(Point, f64)]) -> Option<Point> {
    let total: f64 = points.iter().map(|(_, w)| w).sum();
    if points.is_empty() || total <= 0.0 || !total.is_finite() {
        return None;
    }

    let lat = points.iter().map(|(p, w)| p.lat * w).sum::<f64>() / total;
    let lon = points.iter().map(|(p, w)| p.lon * w).sum::<f64>() / total;
    Some(Point::new(lat, lon))
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Distance estimates between event locations.
//!
//! Points follow the `geo` convention: x = longitude, y = latitude, degrees.

use geo::{Centroid, Line, Point};

/// Mean Earth radius used for the Haversine distance.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Kilometers per degree of latitude for the rough estimate.
pub const KM_PER_DEGREE: f64 = 111.32;

/// Cheap equirectangular estimate in kilometers.
///
/// Only good enough to discard far-away candidates. Never persist it.
pub fn rough_distance_km(a: Point<f64>, b: Point<f64>) -> f64 {
    let mean_lat = ((a.y() + b.y()) / 2.0).to_radians();
    let dx = normalize_longitude_delta(b.x() - a.x()) * KM_PER_DEGREE * mean_lat.cos();
    let dy = (b.y() - a.y()) * KM_PER_DEGREE;
    (dx * dx + dy * dy).sqrt()
}

/// Great-circle (Haversine) distance in kilometers.
pub fn precise_distance_km(a: Point<f64>, b: Point<f64>) -> f64 {
    let lat1 = a.y().to_radians();
    let lat2 = b.y().to_radians();
    let dlat = lat2 - lat1;
    let dlon = (b.x() - a.x()).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    // Clamp rounding error above 1; `f64::min` would swallow NaN.
    let c = h.sqrt();
    let c = if c > 1.0 { 1.0 } else { c };
    2.0 * EARTH_RADIUS_KM * c.asin()
}

/// Arithmetic midpoint of the two coordinates.
pub fn midpoint(a: Point<f64>, b: Point<f64>) -> Point<f64> {
    Line::new(a.0, b.0).centroid()
}

/// Wrap a longitude difference into [-180, 180].
fn normalize_longitude_delta(delta: f64) -> f64 {
    if delta > 180.0 {
        delta - 360.0
    } else if delta < -180.0 {
        delta + 360.0
    } else {
        delta
    }
}

/// Round to 2 decimal places (the persisted precision).
pub fn round_km(km: f64) -> f64 {
    (km * 100.0).round() / 100.0
}

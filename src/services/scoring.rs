// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Match compatibility score (0-100).
//!
//! score = distance part (max 50, linear falloff to the radius)
//!       + time part (max 50, 20 points per overlapping hour)

const MAX_DISTANCE_POINTS: f64 = 50.0;
const MAX_TIME_POINTS: f64 = 50.0;
const TIME_POINTS_PER_HOUR: f64 = 20.0;

/// Score a candidate pair. Total over non-negative inputs; NaN or negative
/// values contribute zero points.
pub fn score(distance_km: f64, overlap_minutes: i64, max_radius_km: f64) -> u8 {
    let total = distance_points(distance_km, max_radius_km) + time_points(overlap_minutes);
    total.round().clamp(0.0, 100.0) as u8
}

fn distance_points(distance_km: f64, max_radius_km: f64) -> f64 {
    if distance_km.is_nan() || distance_km < 0.0 {
        return 0.0;
    }
    if max_radius_km <= 0.0 || max_radius_km.is_nan() {
        // Zero radius: only an exact co-location earns the points.
        return if distance_km == 0.0 {
            MAX_DISTANCE_POINTS
        } else {
            0.0
        };
    }
    MAX_DISTANCE_POINTS * (1.0 - distance_km / max_radius_km).max(0.0)
}

fn time_points(overlap_minutes: i64) -> f64 {
    if overlap_minutes <= 0 {
        return 0.0;
    }
    (overlap_minutes as f64 / 60.0 * TIME_POINTS_PER_HOUR).min(MAX_TIME_POINTS)
}

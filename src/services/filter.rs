// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Candidate pre-filter.
//!
//! Cuts the all-pairs comparison down to plausible pairs before the exact
//! distance/overlap math runs. The filter may keep pairs the exact stage
//! later rejects, but it must never drop a pair the exact stage would
//! accept.

use crate::models::Event;
use crate::services::geo::rough_distance_km;
use crate::services::overlap::{has_overlap, Interval};

/// Why a pair was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Both events belong to the same user
    SameOwner,
    /// Time windows do not intersect, or intersect for too short a time
    Time,
    /// One event is online and the other physical
    LocationKind,
    /// Locations are too far apart for either radius
    Distance,
}

/// Cheap plausibility check for one pair.
pub fn prefilter(source: &Event, candidate: &Event, padding_km: f64) -> Result<(), Rejection> {
    if !has_overlap(
        Interval::new(source.start, source.end),
        Interval::new(candidate.start, candidate.end),
    ) {
        return Err(Rejection::Time);
    }

    match (source.location.point(), candidate.location.point()) {
        // Online pairs satisfy any radius.
        (None, None) => Ok(()),
        (Some(a), Some(b)) => {
            let reach =
                source.location.radius_km() + candidate.location.radius_km() + padding_km;
            if rough_distance_km(a, b) <= reach {
                Ok(())
            } else {
                Err(Rejection::Distance)
            }
        }
        _ => Err(Rejection::LocationKind),
    }
}

/// Keep the candidates that pass [`prefilter`] against `source`.
pub fn filter_candidates<'a>(
    source: &Event,
    candidates: &'a [Event],
    padding_km: f64,
) -> Vec<&'a Event> {
    candidates
        .iter()
        .filter(|c| prefilter(source, c, padding_km).is_ok())
        .collect()
}

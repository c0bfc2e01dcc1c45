// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Time window intersection.
//!
//! Windows are half-open: `[start, end)`. Windows that only touch
//! (`end1 == start2`) do not overlap.

use crate::models::OverlapWindow;
use chrono::{DateTime, Utc};

/// A `[start, end)` time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Interval {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }
}

/// Cheap overlap test used by the candidate filter.
pub fn has_overlap(a: Interval, b: Interval) -> bool {
    a.start < b.end && b.start < a.end
}

/// Exact intersection of two windows.
///
/// Returns `None` when the windows do not intersect. Minutes are rounded
/// to the nearest whole minute, so a sub-30-second overlap is `Some` with
/// zero minutes.
pub fn compute_overlap(a: Interval, b: Interval) -> Option<OverlapWindow> {
    let start = a.start.max(b.start);
    let end = a.end.min(b.end);
    if start >= end {
        return None;
    }

    let millis = (end - start).num_milliseconds();
    let minutes = (millis as f64 / 60_000.0).round() as i64;

    Some(OverlapWindow {
        start,
        end,
        minutes,
    })
}

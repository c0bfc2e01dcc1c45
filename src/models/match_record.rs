// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Persisted match between two friends' events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Intersection of two event windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct OverlapWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub minutes: i64,
}

/// Suggested meeting spot: midpoint of the two event locations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct MeetingPoint {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    #[default]
    Active,
}

/// Stored match record.
///
/// `event_id_1` always sorts before `event_id_2` (see [`canonical_order`]),
/// so a pair has exactly one document whichever side computed it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct MatchRecord {
    /// Derived from the canonical pair (also used as document ID)
    pub id: String,
    pub event_id_1: String,
    pub event_id_2: String,
    /// Owner of `event_id_1`
    pub user_id_1: String,
    /// Owner of `event_id_2`
    pub user_id_2: String,
    /// Haversine distance, rounded to 2 decimals (0 for online events)
    pub distance_km: f64,
    pub overlap: OverlapWindow,
    pub score: u8,
    pub meeting_point: Option<MeetingPoint>,
    #[serde(default)]
    pub status: MatchStatus,
}

impl MatchRecord {
    pub fn involves_user(&self, user_id: &str) -> bool {
        self.user_id_1 == user_id || self.user_id_2 == user_id
    }
}

/// Order two event IDs for storage.
///
/// Plain byte-wise string comparison over the opaque IDs; returns `None`
/// for a pair of identical IDs.
pub fn canonical_order<'a>(a: &'a str, b: &'a str) -> Option<(&'a str, &'a str)> {
    match a.cmp(b) {
        Ordering::Less => Some((a, b)),
        Ordering::Greater => Some((b, a)),
        Ordering::Equal => None,
    }
}

/// Document ID for a canonical pair. Each ID is url-encoded so the `:`
/// separator cannot be forged by an ID containing it.
pub fn match_id(event_id_1: &str, event_id_2: &str) -> String {
    format!(
        "{}:{}",
        urlencoding::encode(event_id_1),
        urlencoding::encode(event_id_2)
    )
}

/// Sort matches for display: highest score first, ties by ID.
pub fn sort_by_score(matches: &mut [MatchRecord]) {
    matches.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
}

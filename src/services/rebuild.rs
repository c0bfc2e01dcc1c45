// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Bulk rebuild of the whole match table.
//!
//! Recomputes every cross-user pair from scratch with the same pure pair
//! evaluation the per-user path uses. No notifications are sent: a rebuild
//! restores state, it does not discover anything new.

use crate::config::MatchPolicy;
use crate::db::MatchStore;
use crate::error::AppError;
use crate::models::{Event, Friendship, MatchRecord};
use crate::services::dispatcher::NotificationDispatcher;
use crate::services::filter::Rejection;
use crate::services::resolver::{evaluate_pair, MatchResolver};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

/// Counters from a bulk rebuild.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RebuildReport {
    pub pairs_considered: usize,
    pub skipped_same_owner: usize,
    pub skipped_by_friendship: usize,
    pub skipped_by_time: usize,
    pub skipped_by_distance: usize,
    pub skipped_by_location_kind: usize,
    /// Events dropped by validation (counted once per event, not per pair)
    pub skipped_invalid: usize,
    pub matches_created: usize,
}

impl RebuildReport {
    fn reject(&mut self, reason: Rejection) {
        match reason {
            Rejection::SameOwner => self.skipped_same_owner += 1,
            Rejection::Time => self.skipped_by_time += 1,
            Rejection::Distance => self.skipped_by_distance += 1,
            Rejection::LocationKind => self.skipped_by_location_kind += 1,
        }
    }
}

/// Unordered key for a friendship edge.
fn edge(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

/// Compute all matches among `events` gated by `friendships`.
///
/// Expired events are ignored without counting; invalid ones count toward
/// `skipped_invalid`.
pub fn rebuild_pairs(
    events: &[Event],
    friendships: &[Friendship],
    policy: &MatchPolicy,
    now: DateTime<Utc>,
) -> (Vec<MatchRecord>, RebuildReport) {
    let mut report = RebuildReport::default();

    let friends: HashSet<(String, String)> = friendships
        .iter()
        .filter(|f| f.is_accepted())
        .map(|f| edge(&f.requester_id, &f.addressee_id))
        .collect();

    let mut usable: Vec<&Event> = Vec::with_capacity(events.len());
    for event in events.iter().filter(|e| e.is_active_at(now)) {
        match event.check(policy.max_radius_km) {
            Ok(()) => usable.push(event),
            Err(issue) => {
                tracing::warn!(event_id = %event.id, %issue, "Skipping invalid event in rebuild");
                report.skipped_invalid += 1;
            }
        }
    }

    let mut found: BTreeMap<String, MatchRecord> = BTreeMap::new();
    for (i, a) in usable.iter().enumerate() {
        for b in &usable[i + 1..] {
            report.pairs_considered += 1;

            if a.owner_id == b.owner_id {
                report.skipped_same_owner += 1;
                continue;
            }
            if !friends.contains(&edge(&a.owner_id, &b.owner_id)) {
                report.skipped_by_friendship += 1;
                continue;
            }

            match evaluate_pair(a, b, policy) {
                Ok(record) => {
                    found.insert(record.id.clone(), record);
                }
                Err(reason) => report.reject(reason),
            }
        }
    }

    report.matches_created = found.len();
    (found.into_values().collect(), report)
}

impl<S: MatchStore, D: NotificationDispatcher> MatchResolver<S, D> {
    /// Clear the match table and recompute every pair.
    pub async fn rebuild_all_matches(&self) -> Result<RebuildReport, AppError> {
        let now = Utc::now();
        let events = self.store.get_all_events().await?;
        let friendships = self.store.get_accepted_friendships().await?;

        let (matches, report) = rebuild_pairs(&events, &friendships, &self.policy, now);
        self.store.replace_all_matches(&matches).await?;

        tracing::info!(
            events = events.len(),
            friendships = friendships.len(),
            pairs_considered = report.pairs_considered,
            skipped_same_owner = report.skipped_same_owner,
            skipped_by_friendship = report.skipped_by_friendship,
            skipped_by_time = report.skipped_by_time,
            skipped_by_distance = report.skipped_by_distance,
            skipped_by_location_kind = report.skipped_by_location_kind,
            skipped_invalid = report.skipped_invalid,
            matches_created = report.matches_created,
            "Rebuilt all matches"
        );
        Ok(report)
    }
}

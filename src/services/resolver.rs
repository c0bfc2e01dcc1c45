// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Per-user match computation.
//!
//! Pipeline for one user: load events and friends, pre-filter candidate
//! pairs, run the exact distance/overlap checks, then replace the user's
//! match rows in one store transaction and notify. Runs for the same user
//! are serialized; the store is the only shared state.

use crate::config::MatchPolicy;
use crate::db::MatchStore;
use crate::error::AppError;
use crate::models::match_record::{canonical_order, match_id, sort_by_score};
use crate::models::event::check_event_id;
use crate::models::{Event, EventInput, MatchRecord, MatchStatus, MeetingPoint};
use crate::services::dispatcher::NotificationDispatcher;
use crate::services::filter::{filter_candidates, prefilter, Rejection};
use crate::services::geo::{midpoint, precise_distance_km, round_km};
use crate::services::notifier::notify_new_matches;
use crate::services::overlap::{compute_overlap, Interval};
use crate::services::scoring::score;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::Instant;
use validator::Validate;

/// Shared per-user locks serializing runs for the same user.
pub type UserLocks = Arc<DashMap<String, Arc<Mutex<()>>>>;

/// Upper bound on the notification step of a run.
const NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Held lock for one user. Dropping it removes the map entry when no other
/// run is waiting on it.
struct UserGuard<'a> {
    locks: &'a UserLocks,
    user_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for UserGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        self.locks
            .remove_if(self.user_id.as_str(), |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// Per-invocation options.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Abort with `DeadlineExceeded` once this instant passes. Checked
    /// around every store call and before the persist step.
    pub deadline: Option<Instant>,
}

impl RunOptions {
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
        }
    }
}

/// Result of a per-user computation.
#[derive(Debug, Clone, Serialize)]
pub struct ComputeOutcome {
    /// Matches now stored for the user's events, best first
    pub matches: Vec<MatchRecord>,
    /// Explanation when there is nothing to show
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ComputeOutcome {
    fn empty(message: &str) -> Self {
        Self {
            matches: Vec::new(),
            message: Some(message.to_string()),
        }
    }
}

/// Result of an expired-event sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub events_deleted: usize,
    pub matches_deleted: usize,
}

pub const NO_EVENTS: &str = "You have no upcoming events";
pub const NO_FRIENDS: &str = "You have no friends to match with yet";
pub const NO_FRIEND_EVENTS: &str = "None of your friends have upcoming events";
pub const NO_MATCHES: &str = "No overlapping plans with friends right now";

/// Run the exact checks on one pair and build its canonical record.
///
/// Pure: the same two events always give the same result, in either
/// argument order.
pub fn evaluate_pair(a: &Event, b: &Event, policy: &MatchPolicy) -> Result<MatchRecord, Rejection> {
    if a.owner_id == b.owner_id {
        return Err(Rejection::SameOwner);
    }
    let (first_id, _) = canonical_order(&a.id, &b.id).ok_or(Rejection::SameOwner)?;
    let (first, second) = if first_id == a.id { (a, b) } else { (b, a) };

    prefilter(first, second, policy.search_padding_km)?;

    let reach = first.location.radius_km().max(second.location.radius_km());
    let (distance_km, meeting_point) =
        match (first.location.point(), second.location.point()) {
            (Some(p1), Some(p2)) => {
                let exact = precise_distance_km(p1, p2);
                if exact.is_nan() || exact > reach {
                    return Err(Rejection::Distance);
                }
                let mid = midpoint(p1, p2);
                (
                    round_km(exact),
                    Some(MeetingPoint {
                        latitude: mid.y(),
                        longitude: mid.x(),
                    }),
                )
            }
            (None, None) => (0.0, None),
            _ => return Err(Rejection::LocationKind),
        };

    let overlap = compute_overlap(
        Interval::new(first.start, first.end),
        Interval::new(second.start, second.end),
    )
    .ok_or(Rejection::Time)?;
    if overlap.minutes < policy.min_overlap_minutes {
        return Err(Rejection::Time);
    }

    Ok(MatchRecord {
        id: match_id(&first.id, &second.id),
        event_id_1: first.id.clone(),
        event_id_2: second.id.clone(),
        user_id_1: first.owner_id.clone(),
        user_id_2: second.owner_id.clone(),
        distance_km,
        overlap,
        score: score(distance_km, overlap.minutes, reach),
        meeting_point,
        status: MatchStatus::Active,
    })
}

/// Keep events that are still running at `now` and pass validation.
/// Invalid events are logged and dropped.
pub(crate) fn usable_events(events: Vec<Event>, now: DateTime<Utc>, policy: &MatchPolicy) -> Vec<Event> {
    events
        .into_iter()
        .filter(|e| e.is_active_at(now))
        .filter(|e| match e.check(policy.max_radius_km) {
            Ok(()) => true,
            Err(issue) => {
                tracing::warn!(event_id = %e.id, owner_id = %e.owner_id, %issue, "Skipping invalid event");
                false
            }
        })
        .collect()
}

/// Await `fut`, failing with `DeadlineExceeded(step)` past `deadline`.
pub(crate) async fn within<T>(
    deadline: Option<Instant>,
    step: &'static str,
    fut: impl Future<Output = Result<T, AppError>>,
) -> Result<T, AppError> {
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, fut)
            .await
            .map_err(|_| AppError::DeadlineExceeded(step))?,
        None => fut.await,
    }
}

fn check_deadline(deadline: Option<Instant>, step: &'static str) -> Result<(), AppError> {
    match deadline {
        Some(deadline) if Instant::now() >= deadline => Err(AppError::DeadlineExceeded(step)),
        _ => Ok(()),
    }
}

/// Match engine over a store and a notification dispatcher.
pub struct MatchResolver<S, D> {
    pub(crate) store: Arc<S>,
    dispatcher: Arc<D>,
    pub(crate) policy: MatchPolicy,
    locks: UserLocks,
}

impl<S, D> Clone for MatchResolver<S, D> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            dispatcher: self.dispatcher.clone(),
            policy: self.policy,
            locks: self.locks.clone(),
        }
    }
}

impl<S: MatchStore, D: NotificationDispatcher> MatchResolver<S, D> {
    pub fn new(store: Arc<S>, dispatcher: Arc<D>, policy: MatchPolicy) -> Self {
        Self {
            store,
            dispatcher,
            policy,
            locks: Arc::new(DashMap::new()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn policy(&self) -> &MatchPolicy {
        &self.policy
    }

    async fn lock_user(&self, user_id: &str) -> UserGuard<'_> {
        let lock = self
            .locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        UserGuard {
            locks: &self.locks,
            user_id: user_id.to_string(),
            guard: Some(lock.lock_owned().await),
        }
    }

    #[cfg(test)]
    fn locked_users(&self) -> usize {
        self.locks.len()
    }

    /// Recompute and store every match for `user_id`'s events.
    ///
    /// Idempotent: repeated calls over unchanged data write the same rows.
    /// Store failures abort before anything is written.
    pub async fn compute_matches(
        &self,
        user_id: &str,
        options: RunOptions,
    ) -> Result<ComputeOutcome, AppError> {
        let _guard = self.lock_user(user_id).await;
        self.compute_locked(user_id, options).await
    }

    /// `compute_matches` body; the caller holds `user_id`'s lock.
    async fn compute_locked(
        &self,
        user_id: &str,
        options: RunOptions,
    ) -> Result<ComputeOutcome, AppError> {
        let now = Utc::now();
        let deadline = options.deadline;

        let owned = within(
            deadline,
            "load_events",
            self.store.get_events_for_owners(&[user_id.to_string()]),
        )
        .await?;
        // Matches on any owned event get replaced, including expired or
        // invalid ones, so stale rows do not outlive their inputs.
        let owned_ids: Vec<String> = owned.iter().map(|e| e.id.clone()).collect();
        let own_events = usable_events(owned, now, &self.policy);

        if own_events.is_empty() {
            tracing::debug!(user_id, "No upcoming events");
            self.persist(user_id, &owned_ids, &[], deadline).await?;
            return Ok(ComputeOutcome::empty(NO_EVENTS));
        }

        let friendships = within(
            deadline,
            "load_friendships",
            self.store.get_friendships_for_user(user_id),
        )
        .await?;
        let friend_ids: Vec<String> = friendships
            .iter()
            .filter(|f| f.is_accepted())
            .filter_map(|f| f.other(user_id))
            .filter(|other| *other != user_id)
            .map(str::to_string)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        if friend_ids.is_empty() {
            tracing::debug!(user_id, "No accepted friendships");
            self.persist(user_id, &owned_ids, &[], deadline).await?;
            return Ok(ComputeOutcome::empty(NO_FRIENDS));
        }

        let friend_events = within(
            deadline,
            "load_friend_events",
            self.store.get_events_for_owners(&friend_ids),
        )
        .await?;
        let friend_events = usable_events(friend_events, now, &self.policy);

        if friend_events.is_empty() {
            tracing::debug!(user_id, friends = friend_ids.len(), "Friends have no upcoming events");
            self.persist(user_id, &owned_ids, &[], deadline).await?;
            return Ok(ComputeOutcome::empty(NO_FRIEND_EVENTS));
        }

        let mut found: BTreeMap<String, MatchRecord> = BTreeMap::new();
        let mut candidates = 0usize;
        for event in &own_events {
            for candidate in filter_candidates(event, &friend_events, self.policy.search_padding_km)
            {
                candidates += 1;
                if let Ok(record) = evaluate_pair(event, candidate, &self.policy) {
                    found.insert(record.id.clone(), record);
                }
            }
        }
        let mut matches: Vec<MatchRecord> = found.into_values().collect();

        tracing::debug!(
            user_id,
            events = own_events.len(),
            friend_events = friend_events.len(),
            candidates,
            matches = matches.len(),
            "Evaluated candidate pairs"
        );

        self.persist(user_id, &owned_ids, &matches, deadline).await?;

        let created_at: HashMap<String, DateTime<Utc>> = own_events
            .iter()
            .chain(friend_events.iter())
            .map(|e| (e.id.clone(), e.created_at))
            .collect();
        // Bounded so a stalled gateway cannot hold the user's lock.
        let notify_by = Instant::now() + NOTIFY_TIMEOUT;
        let notify_by = deadline.map_or(notify_by, |d| d.min(notify_by));
        let notify = notify_new_matches(
            &*self.store,
            &*self.dispatcher,
            &matches,
            &created_at,
            now,
        );
        if tokio::time::timeout_at(notify_by, notify).await.is_err() {
            tracing::warn!(user_id, matches = matches.len(), "Match notifications timed out");
        }

        sort_by_score(&mut matches);
        let message = matches.is_empty().then(|| NO_MATCHES.to_string());

        tracing::info!(user_id, matches = matches.len(), "Computed matches");
        Ok(ComputeOutcome { matches, message })
    }

    async fn persist(
        &self,
        user_id: &str,
        event_ids: &[String],
        matches: &[MatchRecord],
        deadline: Option<Instant>,
    ) -> Result<(), AppError> {
        if event_ids.is_empty() {
            return Ok(());
        }
        check_deadline(deadline, "persist")?;
        within(
            deadline,
            "persist",
            self.store.replace_matches_for_events(event_ids, matches),
        )
        .await
        .inspect_err(|e| tracing::error!(user_id, error = %e, "Failed to store matches"))
    }

    /// Stored matches involving `user_id` that have not ended, best first.
    pub async fn get_active_matches(&self, user_id: &str) -> Result<Vec<MatchRecord>, AppError> {
        let now = Utc::now();
        let owned = self
            .store
            .get_events_for_owners(&[user_id.to_string()])
            .await?;
        if owned.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = owned.into_iter().map(|e| e.id).collect();
        let mut matches: Vec<MatchRecord> = self
            .store
            .get_matches_for_events(&ids)
            .await?
            .into_iter()
            .filter(|m| m.involves_user(user_id))
            .filter(|m| m.status == MatchStatus::Active && m.overlap.end >= now)
            .collect();

        sort_by_score(&mut matches);
        Ok(matches)
    }

    /// Create or replace `event_id` for `owner_id`, then recompute.
    pub async fn save_event(
        &self,
        owner_id: &str,
        event_id: &str,
        input: EventInput,
        options: RunOptions,
    ) -> Result<ComputeOutcome, AppError> {
        input
            .validate()
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        let location = input
            .location()
            .map_err(|e| AppError::BadRequest(e.to_string()))?;

        let now = Utc::now();
        let event = Event {
            id: event_id.to_string(),
            owner_id: owner_id.to_string(),
            start: input.start,
            end: input.end,
            location,
            created_at: now,
            updated_at: now,
        };
        event
            .check(self.policy.max_radius_km)
            .map_err(|e| AppError::BadRequest(e.to_string()))?;

        let _guard = self.lock_user(owner_id).await;
        self.store.save_owned_event(&event).await?;
        tracing::info!(owner_id, event_id, "Saved event");

        self.compute_locked(owner_id, options).await
    }

    /// Delete an owned event with its matches, then recompute the owner's
    /// matches. Returns the number of match rows removed.
    pub async fn delete_event(&self, owner_id: &str, event_id: &str) -> Result<usize, AppError> {
        check_event_id(event_id).map_err(|e| AppError::BadRequest(e.to_string()))?;

        let _guard = self.lock_user(owner_id).await;
        let event = self
            .store
            .get_event(event_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("event {}", event_id)))?;
        if event.owner_id != owner_id {
            return Err(AppError::Forbidden("event belongs to another user".to_string()));
        }

        let removed = self
            .store
            .delete_events_with_matches(&[event_id.to_string()])
            .await?;
        tracing::info!(owner_id, event_id, matches_removed = removed, "Deleted event");

        if let Err(e) = self.compute_locked(owner_id, RunOptions::default()).await {
            tracing::warn!(owner_id, error = %e, "Recompute after event deletion failed");
        }
        Ok(removed)
    }

    /// Delete events whose end is before `now`, with every match on them.
    ///
    /// Each owner's events are re-read and deleted under that owner's lock,
    /// so an event edited since the scan is kept.
    pub async fn sweep_expired_events(&self, now: DateTime<Utc>) -> Result<SweepReport, AppError> {
        let owners: BTreeSet<String> = self
            .store
            .get_all_events()
            .await?
            .into_iter()
            .filter(|e| !e.is_active_at(now))
            .map(|e| e.owner_id)
            .collect();

        let mut report = SweepReport::default();
        for owner_id in owners {
            let _guard = self.lock_user(&owner_id).await;
            let expired: Vec<String> = self
                .store
                .get_events_for_owners(std::slice::from_ref(&owner_id))
                .await?
                .into_iter()
                .filter(|e| !e.is_active_at(now))
                .map(|e| e.id)
                .collect();
            if expired.is_empty() {
                continue;
            }
            report.matches_deleted += self.store.delete_events_with_matches(&expired).await?;
            report.events_deleted += expired.len();
        }

        if report.events_deleted > 0 {
            tracing::info!(
                events_deleted = report.events_deleted,
                matches_deleted = report.matches_deleted,
                "Swept expired events"
            );
        }
        Ok(report)
    }
}

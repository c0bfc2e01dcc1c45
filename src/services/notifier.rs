// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! New-match notifications with ledger-based deduplication.
//!
//! For each written match one participant is told about it: the one whose
//! event was already there when the other side's event arrived. The
//! `notifications_sent` ledger suppresses repeats across runs. Nothing in
//! here fails the caller; problems are logged and the run moves on.

use crate::db::MatchStore;
use crate::models::{MatchRecord, NotificationSent};
use crate::services::dispatcher::{NotificationDispatcher, NEW_MATCH};
use crate::time_utils::format_utc_rfc3339;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Pick the participant to notify about `record`.
///
/// The owner of the more recently created event is excluded since they
/// just caused the match. On equal timestamps event 1 counts as the newer
/// one, so event 2's owner is notified.
pub fn notification_recipient(
    record: &MatchRecord,
    created_at_1: DateTime<Utc>,
    created_at_2: DateTime<Utc>,
) -> &str {
    if created_at_1 >= created_at_2 {
        &record.user_id_2
    } else {
        &record.user_id_1
    }
}

/// What a notification pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotifyReport {
    /// Distinct users included in the dispatch
    pub recipients: usize,
    /// (match, user) pairs already present in the ledger
    pub suppressed: usize,
    /// Ledger rows written after a successful dispatch
    pub recorded: usize,
}

/// Notify recipients of `matches` that have not been told yet.
///
/// `created_at` maps event IDs to their creation time; matches whose
/// events are missing from it are skipped.
pub async fn notify_new_matches<S, D>(
    store: &S,
    dispatcher: &D,
    matches: &[MatchRecord],
    created_at: &HashMap<String, DateTime<Utc>>,
    now: DateTime<Utc>,
) -> NotifyReport
where
    S: MatchStore,
    D: NotificationDispatcher,
{
    let mut report = NotifyReport::default();
    if matches.is_empty() {
        return report;
    }

    let mut candidates: Vec<(&str, &str)> = Vec::with_capacity(matches.len());
    for record in matches {
        match (
            created_at.get(&record.event_id_1),
            created_at.get(&record.event_id_2),
        ) {
            (Some(&c1), Some(&c2)) => {
                candidates.push((record.id.as_str(), notification_recipient(record, c1, c2)));
            }
            _ => {
                tracing::debug!(match_id = %record.id, "Skipping notification, event timestamps unknown");
            }
        }
    }

    let match_ids: Vec<String> = candidates.iter().map(|(m, _)| m.to_string()).collect();
    let ledger = match store.get_notifications_for_matches(&match_ids).await {
        Ok(rows) => rows,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read notification ledger, skipping notifications");
            return report;
        }
    };
    let already_sent: HashSet<(String, String)> = ledger.iter().map(|n| n.key()).collect();

    let mut pending: Vec<(&str, &str)> = Vec::new();
    let mut per_user: BTreeMap<&str, usize> = BTreeMap::new();
    let mut seen: HashSet<(&str, &str)> = HashSet::new();
    for (match_id, user_id) in candidates {
        if already_sent.contains(&(match_id.to_string(), user_id.to_string())) {
            report.suppressed += 1;
            continue;
        }
        if seen.insert((match_id, user_id)) {
            pending.push((match_id, user_id));
            *per_user.entry(user_id).or_insert(0) += 1;
        }
    }

    if pending.is_empty() {
        tracing::debug!(suppressed = report.suppressed, "No new match notifications");
        return report;
    }

    let user_ids: Vec<String> = per_user.keys().map(|u| u.to_string()).collect();
    let payload = serde_json::json!({
        "total_matches": pending.len(),
        "per_user": per_user,
        "generated_at": format_utc_rfc3339(now),
    });
    report.recipients = user_ids.len();

    let outcome = match dispatcher.dispatch(&user_ids, NEW_MATCH, payload).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::warn!(error = %e, recipients = user_ids.len(), "Match notification dispatch failed");
            return report;
        }
    };

    if outcome.failed > 0 {
        tracing::warn!(
            sent = outcome.sent,
            failed = outcome.failed,
            "Some match notifications were not delivered"
        );
    }

    let rows: Vec<NotificationSent> = pending
        .iter()
        .map(|(match_id, user_id)| NotificationSent {
            match_id: match_id.to_string(),
            user_id: user_id.to_string(),
            sent_at: now,
        })
        .collect();

    match store.record_notifications(&rows).await {
        Ok(()) => report.recorded = rows.len(),
        Err(e) => {
            tracing::warn!(error = %e, rows = rows.len(), "Failed to record notification ledger");
        }
    }

    tracing::info!(
        recipients = report.recipients,
        recorded = report.recorded,
        suppressed = report.suppressed,
        "Match notifications dispatched"
    );
    report
}

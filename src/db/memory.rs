// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory store for offline mode and tests.
//!
//! Every operation holds one lock over all tables, so each call is atomic.
//! Reads and writes can be made to fail on demand to exercise error paths,
//! and match replacements can be held at a gate to force interleavings.

use crate::db::MatchStore;
use crate::error::AppError;
use crate::models::{Event, Friendship, MatchRecord, NotificationSent};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::{RwLock, RwLockWriteGuard};

#[derive(Default)]
struct Tables {
    events: BTreeMap<String, Event>,
    friendships: BTreeMap<String, Friendship>,
    matches: BTreeMap<String, MatchRecord>,
    notifications: BTreeMap<String, NotificationSent>,
}

/// In-memory `MatchStore`.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    match_writes: AtomicUsize,
    match_gate: RwLock<()>,
    gated_match_writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent read fail with `AppError::Database`.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent write fail with `AppError::Database`.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful match replacement calls.
    pub fn match_write_count(&self) -> usize {
        self.match_writes.load(Ordering::SeqCst)
    }

    /// Hold every match replacement until the returned guard is dropped.
    pub async fn hold_match_writes(&self) -> RwLockWriteGuard<'_, ()> {
        self.match_gate.write().await
    }

    /// Match replacements currently waiting at the gate.
    pub fn waiting_match_writes(&self) -> usize {
        self.gated_match_writes.load(Ordering::SeqCst)
    }

    fn check_read(&self) -> Result<(), AppError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(AppError::Database("injected read failure".to_string()));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<(), AppError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Database("injected write failure".to_string()));
        }
        Ok(())
    }
}

fn touches_any(record: &MatchRecord, ids: &HashSet<&str>) -> bool {
    ids.contains(record.event_id_1.as_str()) || ids.contains(record.event_id_2.as_str())
}

impl MatchStore for MemoryStore {
    async fn get_event(&self, event_id: &str) -> Result<Option<Event>, AppError> {
        self.check_read()?;
        Ok(self.tables.read().await.events.get(event_id).cloned())
    }

    async fn save_owned_event(&self, event: &Event) -> Result<Event, AppError> {
        self.check_write()?;
        let mut tables = self.tables.write().await;
        let mut stored = event.clone();
        if let Some(existing) = tables.events.get(&event.id) {
            if existing.owner_id != event.owner_id {
                return Err(AppError::Forbidden("event belongs to another user".to_string()));
            }
            stored.created_at = existing.created_at;
        }
        tables.events.insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    async fn get_events_for_owners(&self, owner_ids: &[String]) -> Result<Vec<Event>, AppError> {
        self.check_read()?;
        let owners: HashSet<&str> = owner_ids.iter().map(String::as_str).collect();
        Ok(self
            .tables
            .read()
            .await
            .events
            .values()
            .filter(|e| owners.contains(e.owner_id.as_str()))
            .cloned()
            .collect())
    }

    async fn get_all_events(&self) -> Result<Vec<Event>, AppError> {
        self.check_read()?;
        Ok(self.tables.read().await.events.values().cloned().collect())
    }

    async fn delete_events_with_matches(&self, event_ids: &[String]) -> Result<usize, AppError> {
        self.check_write()?;
        let ids: HashSet<&str> = event_ids.iter().map(String::as_str).collect();
        let mut tables = self.tables.write().await;

        let before = tables.matches.len();
        tables.matches.retain(|_, m| !touches_any(m, &ids));
        let removed = before - tables.matches.len();

        for id in event_ids {
            tables.events.remove(id);
        }
        Ok(removed)
    }

    async fn upsert_friendship(&self, friendship: &Friendship) -> Result<(), AppError> {
        self.check_write()?;
        self.tables
            .write()
            .await
            .friendships
            .insert(friendship.doc_id(), friendship.clone());
        Ok(())
    }

    async fn get_friendships_for_user(&self, user_id: &str) -> Result<Vec<Friendship>, AppError> {
        self.check_read()?;
        Ok(self
            .tables
            .read()
            .await
            .friendships
            .values()
            .filter(|f| f.other(user_id).is_some())
            .cloned()
            .collect())
    }

    async fn get_accepted_friendships(&self) -> Result<Vec<Friendship>, AppError> {
        self.check_read()?;
        Ok(self
            .tables
            .read()
            .await
            .friendships
            .values()
            .filter(|f| f.is_accepted())
            .cloned()
            .collect())
    }

    async fn get_matches_for_events(
        &self,
        event_ids: &[String],
    ) -> Result<Vec<MatchRecord>, AppError> {
        self.check_read()?;
        let ids: HashSet<&str> = event_ids.iter().map(String::as_str).collect();
        Ok(self
            .tables
            .read()
            .await
            .matches
            .values()
            .filter(|m| touches_any(m, &ids))
            .cloned()
            .collect())
    }

    async fn get_all_matches(&self) -> Result<Vec<MatchRecord>, AppError> {
        self.check_read()?;
        Ok(self.tables.read().await.matches.values().cloned().collect())
    }

    async fn replace_matches_for_events(
        &self,
        event_ids: &[String],
        matches: &[MatchRecord],
    ) -> Result<(), AppError> {
        self.gated_match_writes.fetch_add(1, Ordering::SeqCst);
        let _gate = self.match_gate.read().await;
        self.gated_match_writes.fetch_sub(1, Ordering::SeqCst);

        self.check_write()?;
        let ids: HashSet<&str> = event_ids.iter().map(String::as_str).collect();
        let mut tables = self.tables.write().await;

        tables.matches.retain(|_, m| !touches_any(m, &ids));
        for record in matches {
            tables.matches.insert(record.id.clone(), record.clone());
        }

        self.match_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn replace_all_matches(&self, matches: &[MatchRecord]) -> Result<(), AppError> {
        self.check_write()?;
        let mut tables = self.tables.write().await;

        tables.matches = matches
            .iter()
            .map(|m| (m.id.clone(), m.clone()))
            .collect();

        self.match_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get_notifications_for_matches(
        &self,
        match_ids: &[String],
    ) -> Result<Vec<NotificationSent>, AppError> {
        self.check_read()?;
        let ids: HashSet<&str> = match_ids.iter().map(String::as_str).collect();
        Ok(self
            .tables
            .read()
            .await
            .notifications
            .values()
            .filter(|n| ids.contains(n.match_id.as_str()))
            .cloned()
            .collect())
    }

    async fn record_notifications(&self, records: &[NotificationSent]) -> Result<(), AppError> {
        self.check_write()?;
        let mut tables = self.tables.write().await;
        for record in records {
            tables
                .notifications
                .entry(record.doc_id())
                .or_insert_with(|| record.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FriendshipStatus, MatchStatus, OverlapWindow};
    use chrono::Utc;

    fn record(e1: &str, e2: &str) -> MatchRecord {
        let now = Utc::now();
        MatchRecord {
            id: crate::models::match_record::match_id(e1, e2),
            event_id_1: e1.to_string(),
            event_id_2: e2.to_string(),
            user_id_1: "u1".to_string(),
            user_id_2: "u2".to_string(),
            distance_km: 0.0,
            overlap: OverlapWindow {
                start: now,
                end: now,
                minutes: 60,
            },
            score: 50,
            meeting_point: None,
            status: MatchStatus::Active,
        }
    }

    #[tokio::test]
    async fn test_replace_matches_only_touches_given_events() {
        let store = MemoryStore::new();
        store
            .replace_all_matches(&[record("a", "b"), record("c", "d")])
            .await
            .unwrap();

        store
            .replace_matches_for_events(&["a".to_string()], &[record("a", "e")])
            .await
            .unwrap();

        let mut ids: Vec<String> = store
            .get_all_matches()
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["a:e".to_string(), "c:d".to_string()]);
    }

    #[tokio::test]
    async fn test_injected_write_failure_leaves_data_untouched() {
        let store = MemoryStore::new();
        store.replace_all_matches(&[record("a", "b")]).await.unwrap();

        store.set_fail_writes(true);
        let result = store
            .replace_matches_for_events(&["a".to_string()], &[])
            .await;
        assert!(matches!(result, Err(AppError::Database(_))));

        store.set_fail_writes(false);
        assert_eq!(store.get_all_matches().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_save_owned_event_keeps_owner_and_created_at() {
        let now = Utc::now();
        let event = Event {
            id: "e1".to_string(),
            owner_id: "alice".to_string(),
            start: now,
            end: now + chrono::Duration::hours(1),
            location: crate::models::EventLocation::Online,
            created_at: now - chrono::Duration::hours(3),
            updated_at: now,
        };
        let store = MemoryStore::new();
        store.save_owned_event(&event).await.unwrap();

        let mut edit = event.clone();
        edit.created_at = now;
        let stored = store.save_owned_event(&edit).await.unwrap();
        assert_eq!(stored.created_at, event.created_at);

        let mut stolen = event.clone();
        stolen.owner_id = "mallory".to_string();
        let result = store.save_owned_event(&stolen).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
        assert_eq!(
            store.get_event("e1").await.unwrap().unwrap().owner_id,
            "alice"
        );
    }

    #[tokio::test]
    async fn test_friendships_match_either_direction() {
        let store = MemoryStore::new();
        store
            .upsert_friendship(&Friendship {
                requester_id: "alice".to_string(),
                addressee_id: "bob".to_string(),
                status: FriendshipStatus::Accepted,
            })
            .await
            .unwrap();

        assert_eq!(store.get_friendships_for_user("bob").await.unwrap().len(), 1);
        assert_eq!(store.get_friendships_for_user("alice").await.unwrap().len(), 1);
        assert!(store.get_friendships_for_user("carol").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_record_notifications_is_idempotent() {
        let store = MemoryStore::new();
        let sent = NotificationSent {
            match_id: "a:b".to_string(),
            user_id: "bob".to_string(),
            sent_at: Utc::now(),
        };
        store.record_notifications(&[sent.clone()]).await.unwrap();
        store.record_notifications(&[sent]).await.unwrap();

        let rows = store
            .get_notifications_for_matches(&["a:b".to_string()])
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use chrono::{DateTime, Duration, Utc};
use meetup_matcher::config::Config;
use meetup_matcher::db::{FirestoreDb, MatchStore, MemoryStore};
use meetup_matcher::error::AppError;
use meetup_matcher::middleware::auth::create_jwt;
use meetup_matcher::models::{Event, EventLocation, Friendship, FriendshipStatus};
use meetup_matcher::routes::create_router;
use meetup_matcher::services::{DispatchOutcome, MatchResolver, NotificationDispatcher};
use meetup_matcher::AppState;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// One recorded `dispatch` call.
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct Dispatched {
    pub user_ids: Vec<String>,
    pub kind: String,
    pub payload: serde_json::Value,
}

/// Dispatcher that records calls and can be told to fail or hang.
#[derive(Default)]
pub struct RecordingDispatcher {
    calls: Mutex<Vec<Dispatched>>,
    fail: AtomicBool,
    hang: AtomicBool,
}

#[allow(dead_code)]
impl RecordingDispatcher {
    pub fn calls(&self) -> Vec<Dispatched> {
        self.calls.lock().unwrap().clone()
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// While set, `dispatch` never completes.
    pub fn set_hang(&self, hang: bool) {
        self.hang.store(hang, Ordering::SeqCst);
    }
}

impl NotificationDispatcher for RecordingDispatcher {
    async fn dispatch(
        &self,
        user_ids: &[String],
        kind: &str,
        payload: serde_json::Value,
    ) -> Result<DispatchOutcome, AppError> {
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Notification("push gateway unavailable".to_string()));
        }
        self.calls.lock().unwrap().push(Dispatched {
            user_ids: user_ids.to_vec(),
            kind: kind.to_string(),
            payload,
        });
        Ok(DispatchOutcome {
            sent: user_ids.len(),
            failed: 0,
        })
    }
}

#[allow(dead_code)]
pub type TestResolver = MatchResolver<MemoryStore, RecordingDispatcher>;

#[allow(dead_code)]
pub type TestState = AppState<MemoryStore, RecordingDispatcher>;

/// Resolver over a fresh in-memory store, with handles to its collaborators.
#[allow(dead_code)]
pub fn test_resolver() -> (TestResolver, Arc<MemoryStore>, Arc<RecordingDispatcher>) {
    let store = Arc::new(MemoryStore::new());
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let resolver = MatchResolver::new(
        store.clone(),
        dispatcher.clone(),
        Config::test_default().policy,
    );
    (resolver, store, dispatcher)
}

/// Create a test app over an in-memory store.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<TestState>) {
    let state = Arc::new(AppState::new(
        Config::test_default(),
        Arc::new(MemoryStore::new()),
        Arc::new(RecordingDispatcher::default()),
    ));
    (create_router(state.clone()), state)
}

/// Session token for `user_id` signed with the test key.
#[allow(dead_code)]
pub fn create_test_jwt(user_id: &str, config: &Config) -> String {
    create_jwt(user_id, &config.jwt_signing_key).unwrap()
}

// ─── Fixtures ────────────────────────────────────────────────

/// Midnight UTC tomorrow, so fixture events are never expired.
pub fn tomorrow() -> DateTime<Utc> {
    let today = Utc::now().date_naive();
    (today + Duration::days(1))
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc()
}

/// `hour:minute` tomorrow.
#[allow(dead_code)]
pub fn at(hour: i64, minute: i64) -> DateTime<Utc> {
    tomorrow() + Duration::hours(hour) + Duration::minutes(minute)
}

#[allow(dead_code)]
pub fn physical(latitude: f64, longitude: f64, radius_km: f64) -> EventLocation {
    EventLocation::Physical {
        latitude,
        longitude,
        radius_km,
    }
}

/// Event from `start_hour` to `end_hour` tomorrow.
#[allow(dead_code)]
pub fn event(id: &str, owner: &str, start_hour: i64, end_hour: i64, location: EventLocation) -> Event {
    let created = Utc::now() - Duration::hours(1);
    Event {
        id: id.to_string(),
        owner_id: owner.to_string(),
        start: at(start_hour, 0),
        end: at(end_hour, 0),
        location,
        created_at: created,
        updated_at: created,
    }
}

#[allow(dead_code)]
pub fn friendship(a: &str, b: &str, status: FriendshipStatus) -> Friendship {
    Friendship {
        requester_id: a.to_string(),
        addressee_id: b.to_string(),
        status,
    }
}

/// The Berlin pair: A (r 2 km) 18:00-20:00, B (r 3 km) 19:00-21:00.
#[allow(dead_code)]
pub fn berlin_pair() -> (Event, Event) {
    (
        event("event-a", "alice", 18, 20, physical(52.5200, 13.4050, 2.0)),
        event("event-b", "bob", 19, 21, physical(52.5250, 13.4100, 3.0)),
    )
}

/// Store events and accepted friendships between the given pairs.
#[allow(dead_code)]
pub async fn seed<S: MatchStore>(store: &S, events: &[Event], friends: &[(&str, &str)]) {
    for event in events {
        store.save_owned_event(event).await.unwrap();
    }
    for (a, b) in friends {
        store
            .upsert_friendship(&friendship(a, b, FriendshipStatus::Accepted))
            .await
            .unwrap();
    }
}

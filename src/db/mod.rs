//! Database layer.
//!
//! `MatchStore` is the persistence seam used by the match services.
//! `FirestoreDb` backs production; `MemoryStore` backs offline mode and tests.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryStore;

use crate::error::AppError;
use crate::models::{Event, Friendship, MatchRecord, NotificationSent};
use std::future::Future;

/// Collection names as constants.
pub mod collections {
    pub const EVENTS: &str = "events";
    pub const FRIENDSHIPS: &str = "friendships";
    pub const MATCHES: &str = "matches";
    /// Notification dedup ledger (keyed by match_id + user_id)
    pub const NOTIFICATIONS_SENT: &str = "notifications_sent";
}

/// Persistent store operations needed by the matcher.
///
/// Event queries return every stored row; callers drop expired events.
pub trait MatchStore: Send + Sync {
    // ─── Events ──────────────────────────────────────────────────

    fn get_event(
        &self,
        event_id: &str,
    ) -> impl Future<Output = Result<Option<Event>, AppError>> + Send;

    /// Store `event` unless its ID already belongs to another owner, in
    /// which case nothing is written and `Forbidden` is returned. An
    /// existing row keeps its `created_at`. Returns the stored event.
    fn save_owned_event(
        &self,
        event: &Event,
    ) -> impl Future<Output = Result<Event, AppError>> + Send;

    /// Events owned by any of `owner_ids`.
    fn get_events_for_owners(
        &self,
        owner_ids: &[String],
    ) -> impl Future<Output = Result<Vec<Event>, AppError>> + Send;

    fn get_all_events(&self) -> impl Future<Output = Result<Vec<Event>, AppError>> + Send;

    /// Delete events and every match row referencing them. Match rows go
    /// first, so a failure never leaves a match pointing at a missing event.
    /// Returns the number of match rows removed.
    fn delete_events_with_matches(
        &self,
        event_ids: &[String],
    ) -> impl Future<Output = Result<usize, AppError>> + Send;

    // ─── Friendships ─────────────────────────────────────────────

    fn upsert_friendship(
        &self,
        friendship: &Friendship,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Edges where `user_id` is requester OR addressee, any status.
    fn get_friendships_for_user(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<Vec<Friendship>, AppError>> + Send;

    fn get_accepted_friendships(
        &self,
    ) -> impl Future<Output = Result<Vec<Friendship>, AppError>> + Send;

    // ─── Matches ─────────────────────────────────────────────────

    /// Matches where `event_id_1 IN ids OR event_id_2 IN ids`.
    fn get_matches_for_events(
        &self,
        event_ids: &[String],
    ) -> impl Future<Output = Result<Vec<MatchRecord>, AppError>> + Send;

    fn get_all_matches(&self) -> impl Future<Output = Result<Vec<MatchRecord>, AppError>> + Send;

    /// Atomically delete every match touching `event_ids` and upsert
    /// `matches` keyed by match ID. Either all writes land or none do.
    fn replace_matches_for_events(
        &self,
        event_ids: &[String],
        matches: &[MatchRecord],
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Clear every match row and store `matches` instead.
    fn replace_all_matches(
        &self,
        matches: &[MatchRecord],
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    // ─── Notification Ledger ─────────────────────────────────────

    fn get_notifications_for_matches(
        &self,
        match_ids: &[String],
    ) -> impl Future<Output = Result<Vec<NotificationSent>, AppError>> + Send;

    /// Append ledger rows. Re-recording an existing key is a no-op overwrite.
    fn record_notifications(
        &self,
        records: &[NotificationSent],
    ) -> impl Future<Output = Result<(), AppError>> + Send;
}

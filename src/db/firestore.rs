// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Events (free-time windows)
//! - Friendships (request/accept edges)
//! - Matches (canonical event pairs)
//! - Notifications sent (dedup ledger)

use crate::db::{collections, MatchStore};
use crate::error::AppError;
use crate::models::{Event, Friendship, MatchRecord, NotificationSent};
use futures_util::{stream, StreamExt};
use std::collections::HashSet;

const MAX_CONCURRENT_DB_OPS: usize = 50;
// Firestore limits batch/transaction writes to 500 operations.
// We use a safe limit of 400 to allow headroom.
const BATCH_SIZE: usize = 400;
// Firestore allows at most 30 values in an `IN` filter.
const IN_FILTER_LIMIT: usize = 30;
// An OR of two `IN` filters expands to 2n disjunctions, also capped at 30.
const OR_IN_FILTER_LIMIT: usize = 15;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: firestore::FirestoreDb,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self { client })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self { client })
    }

    // ─── Helper Methods ────────────────────────────────────────────

    /// Query `collection` where `field IN ids`, chunked to the filter limit.
    async fn query_in<T>(
        &self,
        collection: &str,
        field: &str,
        ids: &[String],
    ) -> Result<Vec<T>, AppError>
    where
        T: for<'de> serde::Deserialize<'de> + Send,
    {
        let client = &self.client;
        let mut results = Vec::new();

        for chunk in ids.chunks(IN_FILTER_LIMIT) {
            let values = chunk.to_vec();
            let mut rows: Vec<T> = client
                .fluent()
                .select()
                .from(collection)
                .filter(move |q| q.for_all([q.field(field).is_in(values.clone())]))
                .obj()
                .query()
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            results.append(&mut rows);
        }

        Ok(results)
    }

    /// Helper to batch delete documents using transactions.
    async fn batch_delete<T, F>(
        &self,
        items: &[T],
        collection: &str,
        id_extractor: F,
    ) -> Result<(), AppError>
    where
        F: Fn(&T) -> String,
    {
        let client = &self.client;

        for chunk in items.chunks(BATCH_SIZE) {
            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

            for item in chunk {
                let doc_id = id_extractor(item);
                client
                    .fluent()
                    .delete()
                    .from(collection)
                    .document_id(&doc_id)
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::Database(format!(
                            "Failed to add deletion to transaction for {}: {}",
                            collection, e
                        ))
                    })?;
            }

            transaction.commit().await.map_err(|e| {
                AppError::Database(format!("Failed to commit batch deletion: {}", e))
            })?;
        }

        Ok(())
    }

    /// Helper to batch upsert matches using transactions.
    async fn batch_set_matches(&self, matches: &[MatchRecord]) -> Result<(), AppError> {
        let client = &self.client;

        for chunk in matches.chunks(BATCH_SIZE) {
            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

            for record in chunk {
                client
                    .fluent()
                    .update()
                    .in_col(collections::MATCHES)
                    .document_id(&record.id)
                    .object(record)
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::Database(format!("Failed to add match to transaction: {}", e))
                    })?;
            }

            transaction
                .commit()
                .await
                .map_err(|e| AppError::Database(format!("Failed to commit match batch: {}", e)))?;
        }

        Ok(())
    }
}

impl MatchStore for FirestoreDb {
    // ─── Event Operations ────────────────────────────────────────

    async fn get_event(&self, event_id: &str) -> Result<Option<Event>, AppError> {
        self.client
            .fluent()
            .select()
            .by_id_in(collections::EVENTS)
            .obj()
            .one(event_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Creates use `insert`, which fails if the document appeared in the
    /// meantime; that case is re-read and checked again.
    async fn save_owned_event(&self, event: &Event) -> Result<Event, AppError> {
        for _ in 0..2 {
            let mut stored = event.clone();
            match self.get_event(&event.id).await? {
                Some(existing) if existing.owner_id != event.owner_id => {
                    return Err(AppError::Forbidden(
                        "event belongs to another user".to_string(),
                    ));
                }
                Some(existing) => {
                    // Writes by one owner are serialized by the resolver.
                    stored.created_at = existing.created_at;
                    let _: () = self
                        .client
                        .fluent()
                        .update()
                        .in_col(collections::EVENTS)
                        .document_id(&stored.id)
                        .object(&stored)
                        .execute()
                        .await
                        .map_err(|e| AppError::Database(e.to_string()))?;
                    return Ok(stored);
                }
                None => {
                    let created: Result<Event, _> = self
                        .client
                        .fluent()
                        .insert()
                        .into(collections::EVENTS)
                        .document_id(&stored.id)
                        .object(&stored)
                        .execute()
                        .await;
                    match created {
                        Ok(_) => return Ok(stored),
                        Err(firestore::errors::FirestoreError::DataConflictError(_)) => {
                            tracing::debug!(
                                event_id = %event.id,
                                "Event created concurrently, re-checking owner"
                            );
                        }
                        Err(e) => return Err(AppError::Database(e.to_string())),
                    }
                }
            }
        }
        Err(AppError::Database(format!(
            "event {} kept changing while saving",
            event.id
        )))
    }

    async fn get_events_for_owners(&self, owner_ids: &[String]) -> Result<Vec<Event>, AppError> {
        self.query_in(collections::EVENTS, "owner_id", owner_ids)
            .await
    }

    async fn get_all_events(&self) -> Result<Vec<Event>, AppError> {
        self.client
            .fluent()
            .select()
            .from(collections::EVENTS)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Deletes run in one transaction per `BATCH_SIZE` writes; the common
    /// case (one event, a handful of matches) is a single commit.
    async fn delete_events_with_matches(&self, event_ids: &[String]) -> Result<usize, AppError> {
        let matches = self.get_matches_for_events(event_ids).await?;
        let count = matches.len();

        self.batch_delete(&matches, collections::MATCHES, |m: &MatchRecord| {
            m.id.clone()
        })
        .await?;
        self.batch_delete(event_ids, collections::EVENTS, |id: &String| id.clone())
            .await?;

        tracing::debug!(
            events = event_ids.len(),
            matches = count,
            "Deleted events and their matches"
        );
        Ok(count)
    }

    // ─── Friendship Operations ───────────────────────────────────

    async fn upsert_friendship(&self, friendship: &Friendship) -> Result<(), AppError> {
        let _: () = self
            .client
            .fluent()
            .update()
            .in_col(collections::FRIENDSHIPS)
            .document_id(friendship.doc_id())
            .object(friendship)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    async fn get_friendships_for_user(&self, user_id: &str) -> Result<Vec<Friendship>, AppError> {
        self.client
            .fluent()
            .select()
            .from(collections::FRIENDSHIPS)
            .filter(|q| {
                q.for_any([
                    q.field("requester_id").eq(user_id),
                    q.field("addressee_id").eq(user_id),
                ])
            })
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn get_accepted_friendships(&self) -> Result<Vec<Friendship>, AppError> {
        self.client
            .fluent()
            .select()
            .from(collections::FRIENDSHIPS)
            .filter(|q| q.for_all([q.field("status").eq("accepted")]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── Match Operations ────────────────────────────────────────

    async fn get_matches_for_events(
        &self,
        event_ids: &[String],
    ) -> Result<Vec<MatchRecord>, AppError> {
        let client = &self.client;
        let mut seen = HashSet::new();
        let mut results = Vec::new();

        for chunk in event_ids.chunks(OR_IN_FILTER_LIMIT) {
            let values = chunk.to_vec();
            let rows: Vec<MatchRecord> = client
                .fluent()
                .select()
                .from(collections::MATCHES)
                .filter(move |q| {
                    q.for_any([
                        q.field("event_id_1").is_in(values.clone()),
                        q.field("event_id_2").is_in(values.clone()),
                    ])
                })
                .obj()
                .query()
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;

            // A match can straddle two chunks.
            for row in rows {
                if seen.insert(row.id.clone()) {
                    results.push(row);
                }
            }
        }

        Ok(results)
    }

    async fn get_all_matches(&self) -> Result<Vec<MatchRecord>, AppError> {
        self.client
            .fluent()
            .select()
            .from(collections::MATCHES)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Runs in a single Firestore transaction. Rows that are about to be
    /// overwritten are not deleted first (one write per document).
    async fn replace_matches_for_events(
        &self,
        event_ids: &[String],
        matches: &[MatchRecord],
    ) -> Result<(), AppError> {
        let existing = self.get_matches_for_events(event_ids).await?;
        let keep: HashSet<&str> = matches.iter().map(|m| m.id.as_str()).collect();
        let stale: Vec<&MatchRecord> = existing
            .iter()
            .filter(|m| !keep.contains(m.id.as_str()))
            .collect();

        let writes = stale.len() + matches.len();
        if writes > BATCH_SIZE {
            return Err(AppError::Database(format!(
                "Match replacement needs {} writes, over the transaction limit of {}",
                writes, BATCH_SIZE
            )));
        }

        let client = &self.client;
        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        for record in &stale {
            client
                .fluent()
                .delete()
                .from(collections::MATCHES)
                .document_id(&record.id)
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    AppError::Database(format!("Failed to add deletion to transaction: {}", e))
                })?;
        }

        for record in matches {
            client
                .fluent()
                .update()
                .in_col(collections::MATCHES)
                .document_id(&record.id)
                .object(record)
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    AppError::Database(format!("Failed to add match to transaction: {}", e))
                })?;
        }

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        tracing::debug!(
            removed = stale.len(),
            written = matches.len(),
            "Matches replaced atomically"
        );
        Ok(())
    }

    async fn replace_all_matches(&self, matches: &[MatchRecord]) -> Result<(), AppError> {
        let existing = self.get_all_matches().await?;
        let keep: HashSet<&str> = matches.iter().map(|m| m.id.as_str()).collect();
        let stale: Vec<MatchRecord> = existing
            .into_iter()
            .filter(|m| !keep.contains(m.id.as_str()))
            .collect();

        self.batch_delete(&stale, collections::MATCHES, |m: &MatchRecord| {
            m.id.clone()
        })
        .await?;
        self.batch_set_matches(matches).await?;

        tracing::info!(
            removed = stale.len(),
            written = matches.len(),
            "All matches replaced"
        );
        Ok(())
    }

    // ─── Notification Ledger Operations ──────────────────────────

    async fn get_notifications_for_matches(
        &self,
        match_ids: &[String],
    ) -> Result<Vec<NotificationSent>, AppError> {
        self.query_in(collections::NOTIFICATIONS_SENT, "match_id", match_ids)
            .await
    }

    /// Uses concurrent writes with a limit to avoid overloading Firestore.
    async fn record_notifications(&self, records: &[NotificationSent]) -> Result<(), AppError> {
        let client = &self.client;

        stream::iter(records.to_vec())
            .map(|record| async move {
                let _: () = client
                    .fluent()
                    .update()
                    .in_col(collections::NOTIFICATIONS_SENT)
                    .document_id(record.doc_id())
                    .object(&record)
                    .execute()
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;

                Ok::<_, AppError>(())
            })
            .buffer_unordered(MAX_CONCURRENT_DB_OPS)
            .collect::<Vec<Result<(), AppError>>>()
            .await
            .into_iter()
            .collect::<Result<Vec<()>, AppError>>()?;

        Ok(())
    }
}

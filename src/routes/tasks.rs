// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Task handler routes for Cloud Tasks / Cloud Scheduler callbacks.
//!
//! These endpoints are called by the task queue, not directly by users.
//! `require_tasks_auth` guards them (see routes/mod.rs).

use crate::db::MatchStore;
use crate::error::{AppError, Result};
use crate::services::{
    ComputeOutcome, NotificationDispatcher, RebuildReport, RunOptions, SweepReport,
};
use crate::AppState;
use axum::{
    extract::{Json, State},
    routing::post,
    Router,
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Cloud Tasks gives a handler 10 minutes by default; stop well before.
const TASK_DEADLINE: Duration = Duration::from_secs(300);

/// Task handler routes.
pub fn routes<S, D>() -> Router<Arc<AppState<S, D>>>
where
    S: MatchStore + 'static,
    D: NotificationDispatcher + 'static,
{
    Router::new()
        .route("/tasks/compute-matches", post(compute_matches::<S, D>))
        .route("/tasks/rebuild-matches", post(rebuild_matches::<S, D>))
        .route("/tasks/sweep-expired", post(sweep_expired::<S, D>))
}

/// Payload for a periodic per-user re-check.
#[derive(Debug, Deserialize)]
pub struct ComputeMatchesPayload {
    pub user_id: String,
}

/// Recompute one user's matches. Errors map to retryable statuses so the
/// queue retries store outages.
async fn compute_matches<S, D>(
    State(state): State<Arc<AppState<S, D>>>,
    Json(payload): Json<ComputeMatchesPayload>,
) -> Result<Json<ComputeOutcome>>
where
    S: MatchStore,
    D: NotificationDispatcher,
{
    if payload.user_id.is_empty() {
        return Err(AppError::BadRequest("user_id must not be empty".to_string()));
    }

    tracing::info!(user_id = %payload.user_id, "Processing match re-check task");
    let outcome = state
        .resolver
        .compute_matches(
            &payload.user_id,
            RunOptions::with_deadline(Instant::now() + TASK_DEADLINE),
        )
        .await?;
    Ok(Json(outcome))
}

/// Rebuild the whole match table.
async fn rebuild_matches<S, D>(
    State(state): State<Arc<AppState<S, D>>>,
) -> Result<Json<RebuildReport>>
where
    S: MatchStore,
    D: NotificationDispatcher,
{
    tracing::info!("Processing match rebuild task");
    let report = state.resolver.rebuild_all_matches().await?;
    Ok(Json(report))
}

/// Delete expired events and their matches.
async fn sweep_expired<S, D>(
    State(state): State<Arc<AppState<S, D>>>,
) -> Result<Json<SweepReport>>
where
    S: MatchStore,
    D: NotificationDispatcher,
{
    let report = state.resolver.sweep_expired_events(Utc::now()).await?;
    Ok(Json(report))
}

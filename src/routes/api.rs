// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated users.

use crate::db::MatchStore;
use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{EventInput, MatchRecord};
use crate::services::{ComputeOutcome, NotificationDispatcher, RunOptions};
use crate::AppState;
use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Upper bound for a user-triggered match computation.
const REQUEST_DEADLINE: Duration = Duration::from_secs(20);

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes<S, D>() -> Router<Arc<AppState<S, D>>>
where
    S: MatchStore + 'static,
    D: NotificationDispatcher + 'static,
{
    Router::new()
        .route("/api/matches", get(get_matches::<S, D>))
        .route("/api/matches/compute", post(compute_matches::<S, D>))
        .route(
            "/api/events/{id}",
            put(save_event::<S, D>).delete(delete_event::<S, D>),
        )
}

fn request_options() -> RunOptions {
    RunOptions::with_deadline(Instant::now() + REQUEST_DEADLINE)
}

// ─── Matches ─────────────────────────────────────────────────

/// Active matches response.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct MatchesResponse {
    pub matches: Vec<MatchRecord>,
}

/// Get the caller's stored matches, best first.
async fn get_matches<S, D>(
    State(state): State<Arc<AppState<S, D>>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<MatchesResponse>>
where
    S: MatchStore,
    D: NotificationDispatcher,
{
    let matches = state.resolver.get_active_matches(&user.user_id).await?;
    Ok(Json(MatchesResponse { matches }))
}

/// Recompute the caller's matches now.
async fn compute_matches<S, D>(
    State(state): State<Arc<AppState<S, D>>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ComputeOutcome>>
where
    S: MatchStore,
    D: NotificationDispatcher,
{
    let outcome = state
        .resolver
        .compute_matches(&user.user_id, request_options())
        .await?;
    Ok(Json(outcome))
}

// ─── Events ──────────────────────────────────────────────────

/// Create or edit an event, then recompute the caller's matches.
async fn save_event<S, D>(
    State(state): State<Arc<AppState<S, D>>>,
    Extension(user): Extension<AuthUser>,
    Path(event_id): Path<String>,
    Json(input): Json<EventInput>,
) -> Result<Json<ComputeOutcome>>
where
    S: MatchStore,
    D: NotificationDispatcher,
{
    if event_id.trim().is_empty() {
        return Err(AppError::BadRequest("event id must not be empty".to_string()));
    }

    let outcome = state
        .resolver
        .save_event(&user.user_id, &event_id, input, request_options())
        .await?;
    Ok(Json(outcome))
}

/// Response for event deletion.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DeleteEventResponse {
    pub deleted: bool,
    pub matches_removed: usize,
}

/// Delete one of the caller's events and its matches.
async fn delete_event<S, D>(
    State(state): State<Arc<AppState<S, D>>>,
    Extension(user): Extension<AuthUser>,
    Path(event_id): Path<String>,
) -> Result<Json<DeleteEventResponse>>
where
    S: MatchStore,
    D: NotificationDispatcher,
{
    let matches_removed = state.resolver.delete_event(&user.user_id, &event_id).await?;
    Ok(Json(DeleteEventResponse {
        deleted: true,
        matches_removed,
    }))
}

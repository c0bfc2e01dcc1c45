// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Meetup Matcher API Server
//!
//! Matches friends whose free-time events overlap in time and place and
//! notifies them about new meetups.

use meetup_matcher::{config::Config, db::FirestoreDb, services::PushDispatcher, AppState};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(
        port = config.port,
        min_overlap_minutes = config.policy.min_overlap_minutes,
        search_padding_km = config.policy.search_padding_km,
        max_radius_km = config.policy.max_radius_km,
        "Starting Meetup Matcher API"
    );

    // Initialize Firestore database
    let db = FirestoreDb::new(&config.gcp_project_id).await?;

    let dispatcher = PushDispatcher::new(
        config.push_gateway_url.clone(),
        config.push_gateway_token.clone(),
    )?;
    match &config.push_gateway_url {
        Some(url) => tracing::info!(url = %url, "Push gateway configured"),
        None => tracing::warn!("PUSH_GATEWAY_URL not set, notifications will only be logged"),
    }

    // Build shared state
    let port = config.port;
    let state = Arc::new(AppState::new(config, Arc::new(db), Arc::new(dispatcher)));

    // Build router
    let app = meetup_matcher::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("meetup_matcher=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}

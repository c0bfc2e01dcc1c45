// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Meetup matcher: finds friends whose free time overlaps in time and place.
//!
//! This crate provides the match computation engine and the backend API
//! that triggers it when events change.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::{FirestoreDb, MatchStore};
use services::{MatchResolver, NotificationDispatcher, PushDispatcher};
use std::sync::Arc;

/// Shared application state.
pub struct AppState<S = FirestoreDb, D = PushDispatcher> {
    pub config: Config,
    pub resolver: MatchResolver<S, D>,
}

impl<S: MatchStore, D: NotificationDispatcher> AppState<S, D> {
    pub fn new(config: Config, store: Arc<S>, dispatcher: Arc<D>) -> Self {
        let resolver = MatchResolver::new(store, dispatcher, config.policy);
        Self { config, resolver }
    }
}

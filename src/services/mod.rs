// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.
//!
//! `geo`, `overlap`, `scoring` and `filter` are pure. `resolver` and
//! `rebuild` drive them against a `MatchStore`; `notifier` and
//! `dispatcher` handle the fan-out.

pub mod dispatcher;
pub mod filter;
pub mod geo;
pub mod notifier;
pub mod overlap;
pub mod rebuild;
pub mod resolver;
pub mod scoring;

pub use dispatcher::{DispatchOutcome, NotificationDispatcher, PushDispatcher};
pub use notifier::{notification_recipient, notify_new_matches, NotifyReport};
pub use rebuild::RebuildReport;
pub use resolver::{ComputeOutcome, MatchResolver, RunOptions, SweepReport};

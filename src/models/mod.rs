// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod event;
pub mod friendship;
pub mod match_record;
pub mod notification;

pub use event::{Event, EventInput, EventIssue, EventLocation};
pub use friendship::{Friendship, FriendshipStatus};
pub use match_record::{MatchRecord, MatchStatus, MeetingPoint, OverlapWindow};
pub use notification::NotificationSent;

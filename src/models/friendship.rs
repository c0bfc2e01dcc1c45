// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Friendship edge between two users.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FriendshipStatus {
    Pending,
    Accepted,
    Declined,
}

/// Stored friendship record.
///
/// Direction only matters for the request workflow; matching treats the
/// edge as unordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Friendship {
    pub requester_id: String,
    pub addressee_id: String,
    pub status: FriendshipStatus,
}

impl Friendship {
    pub fn is_accepted(&self) -> bool {
        self.status == FriendshipStatus::Accepted
    }

    /// The other side of the edge, if `user_id` is part of it.
    pub fn other(&self, user_id: &str) -> Option<&str> {
        if self.requester_id == user_id {
            Some(&self.addressee_id)
        } else if self.addressee_id == user_id {
            Some(&self.requester_id)
        } else {
            None
        }
    }

    /// Document ID, independent of direction.
    pub fn doc_id(&self) -> String {
        let (a, b) = if self.requester_id <= self.addressee_id {
            (&self.requester_id, &self.addressee_id)
        } else {
            (&self.addressee_id, &self.requester_id)
        };
        format!("{}:{}", urlencoding::encode(a), urlencoding::encode(b))
    }
}

//! Notification ledger model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Record that `user_id` was told about `match_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationSent {
    pub match_id: String,
    pub user_id: String,
    pub sent_at: DateTime<Utc>,
}

impl NotificationSent {
    /// Ledger key; document ID is derived from it.
    pub fn key(&self) -> (String, String) {
        (self.match_id.clone(), self.user_id.clone())
    }

    pub fn doc_id(&self) -> String {
        ledger_doc_id(&self.match_id, &self.user_id)
    }
}

pub fn ledger_doc_id(match_id: &str, user_id: &str) -> String {
    format!(
        "{}__{}",
        urlencoding::encode(match_id),
        urlencoding::encode(user_id)
    )
}

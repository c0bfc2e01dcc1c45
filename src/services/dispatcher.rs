// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Push notification delivery.

use crate::error::AppError;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Notification type for newly found matches.
pub const NEW_MATCH: &str = "new_match";

/// Per-call delivery counts reported by the dispatcher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchOutcome {
    pub sent: usize,
    pub failed: usize,
}

/// Delivers platform pushes to a set of users.
pub trait NotificationDispatcher: Send + Sync {
    fn dispatch(
        &self,
        user_ids: &[String],
        kind: &str,
        payload: serde_json::Value,
    ) -> impl Future<Output = Result<DispatchOutcome, AppError>> + Send;
}

#[derive(Serialize)]
struct PushRequest<'a> {
    user_ids: &'a [String],
    kind: &'a str,
    payload: serde_json::Value,
}

/// Timeout for one gateway request, connect included.
pub const DEFAULT_PUSH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
struct Gateway {
    http: reqwest::Client,
    url: String,
    token: Option<String>,
}

/// Posts notifications to an HTTP push gateway.
///
/// Without a gateway URL every dispatch is logged and counted as sent,
/// which is what local development wants.
#[derive(Clone)]
pub struct PushDispatcher {
    gateway: Option<Gateway>,
}

impl PushDispatcher {
    pub fn new(gateway_url: Option<String>, token: Option<String>) -> Result<Self, AppError> {
        Self::with_timeout(gateway_url, token, DEFAULT_PUSH_TIMEOUT)
    }

    pub fn with_timeout(
        gateway_url: Option<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let Some(url) = gateway_url else {
            return Ok(Self::log_only());
        };
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed building push gateway HTTP client")?;
        Ok(Self {
            gateway: Some(Gateway { http, url, token }),
        })
    }

    /// Dispatcher that only logs.
    pub fn log_only() -> Self {
        Self { gateway: None }
    }
}

impl NotificationDispatcher for PushDispatcher {
    async fn dispatch(
        &self,
        user_ids: &[String],
        kind: &str,
        payload: serde_json::Value,
    ) -> Result<DispatchOutcome, AppError> {
        let Some(gateway) = &self.gateway else {
            tracing::info!(
                kind,
                recipients = user_ids.len(),
                payload = %payload,
                "Push gateway not configured, logging notification"
            );
            return Ok(DispatchOutcome {
                sent: user_ids.len(),
                failed: 0,
            });
        };

        let mut request = gateway.http.post(&gateway.url).json(&PushRequest {
            user_ids,
            kind,
            payload,
        });
        if let Some(token) = &gateway.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::Notification(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Notification(format!("HTTP {}: {}", status, body)));
        }

        // Gateways that do not report per-user results accepted everything.
        let outcome = response.json::<DispatchOutcome>().await.unwrap_or(DispatchOutcome {
            sent: user_ids.len(),
            failed: 0,
        });

        tracing::debug!(kind, sent = outcome.sent, failed = outcome.failed, "Dispatched push");
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_only_counts_every_recipient_as_sent() {
        let dispatcher = PushDispatcher::log_only();
        let outcome = dispatcher
            .dispatch(
                &["alice".to_string(), "bob".to_string()],
                NEW_MATCH,
                serde_json::json!({ "total": 2 }),
            )
            .await
            .unwrap();
        assert_eq!(outcome, DispatchOutcome { sent: 2, failed: 0 });
    }

    #[tokio::test]
    async fn test_unreachable_gateway_is_notification_error() {
        let dispatcher =
            PushDispatcher::new(Some("http://127.0.0.1:1/push".to_string()), None).unwrap();
        let result = dispatcher
            .dispatch(&["alice".to_string()], NEW_MATCH, serde_json::json!({}))
            .await;
        assert!(matches!(result, Err(AppError::Notification(_))));
    }

    #[tokio::test]
    async fn test_silent_gateway_times_out() {
        // Accepts connections but never answers.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/push", listener.local_addr().unwrap());
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let dispatcher =
            PushDispatcher::with_timeout(Some(url), None, Duration::from_millis(200)).unwrap();
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            dispatcher.dispatch(&["alice".to_string()], NEW_MATCH, serde_json::json!({})),
        )
        .await
        .expect("dispatch should give up on its own");
        assert!(matches!(result, Err(AppError::Notification(_))));

        server.abort();
    }
}

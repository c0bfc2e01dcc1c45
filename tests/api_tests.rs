// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API authentication, validation and happy-path tests.
//!
//! These tests verify that:
//! 1. Protected routes reject requests without valid tokens
//! 2. Event input is validated before anything is stored
//! 3. Saving events triggers match computation visible through the API

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use meetup_matcher::db::MatchStore;
use serde_json::{json, Value};
use tower::ServiceExt;

mod common;
use common::{at, create_test_app, create_test_jwt, seed};

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn event_body(start_hour: i64, end_hour: i64, latitude: f64, longitude: f64, radius_km: f64) -> String {
    json!({
        "start": at(start_hour, 0),
        "end": at(end_hour, 0),
        "latitude": latitude,
        "longitude": longitude,
        "radius_km": radius_km,
    })
    .to_string()
}

fn put_event(token: &str, id: &str, body: String) -> Request<Body> {
    Request::builder()
        .method("PUT")
        .uri(format!("/api/events/{}", id))
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_health_is_public() {
    let (app, _) = create_test_app();

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("X-Frame-Options").unwrap(), "DENY");
}

#[tokio::test]
async fn test_protected_route_without_token() {
    let (app, _) = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/matches")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_protected_route_with_invalid_token() {
    let (app, _) = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/matches")
                .header(header::AUTHORIZATION, "Bearer invalid.token.here")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_session_cookie_accepted() {
    let (app, state) = create_test_app();
    let token = create_test_jwt("alice", &state.config);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/matches")
                .header(header::COOKIE, format!("meetup_token={}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["matches"], json!([]));
}

#[tokio::test]
async fn test_save_event_rejects_out_of_range_input() {
    let (app, state) = create_test_app();
    let token = create_test_jwt("alice", &state.config);

    // Latitude beyond the supported band
    let response = app
        .clone()
        .oneshot(put_event(&token, "e1", event_body(18, 20, 89.0, 13.4, 2.0)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Radius above the configured maximum
    let response = app
        .clone()
        .oneshot(put_event(&token, "e1", event_body(18, 20, 52.5, 13.4, 500.0)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Empty window
    let response = app
        .oneshot(put_event(&token, "e1", event_body(20, 18, 52.5, 13.4, 2.0)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "bad_request");
    assert_eq!(body["retryable"], false);

    assert!(state.resolver.store().get_event("e1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_save_event_computes_matches() {
    let (app, state) = create_test_app();
    let (_, bob_event) = common::berlin_pair();
    seed(state.resolver.store(), &[bob_event], &[("alice", "bob")]).await;
    let token = create_test_jwt("alice", &state.config);

    let response = app
        .clone()
        .oneshot(put_event(&token, "event-a", event_body(18, 20, 52.52, 13.405, 2.0)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["matches"][0]["id"], "event-a:event-b");
    assert_eq!(body["matches"][0]["score"], 59);

    let bob_token = create_test_jwt("bob", &state.config);
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/matches")
                .header(header::AUTHORIZATION, format!("Bearer {}", bob_token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["matches"].as_array().unwrap().len(), 1);
    assert_eq!(body["matches"][0]["user_id_1"], "alice");
}

#[tokio::test]
async fn test_cannot_edit_or_delete_other_users_event() {
    let (app, state) = create_test_app();
    let (_, bob_event) = common::berlin_pair();
    seed(state.resolver.store(), &[bob_event], &[]).await;
    let token = create_test_jwt("alice", &state.config);

    let response = app
        .clone()
        .oneshot(put_event(&token, "event-b", event_body(18, 20, 52.52, 13.405, 2.0)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/events/event-b")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/events/missing")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_event_ids_that_are_not_document_names_are_rejected() {
    let (app, state) = create_test_app();
    let token = create_test_jwt("alice", &state.config);

    for id in ["a%2Fb", "__reserved__"] {
        let response = app
            .clone()
            .oneshot(put_event(&token, id, event_body(18, 20, 52.52, 13.405, 2.0)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "PUT {}", id);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/api/events/{}", id))
                    .header(header::AUTHORIZATION, format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "DELETE {}", id);
    }

    assert!(state.resolver.store().get_all_events().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_compute_reports_degenerate_input_as_success() {
    let (app, state) = create_test_app();
    let token = create_test_jwt("alice", &state.config);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/matches/compute")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["matches"], json!([]));
    assert_eq!(body["message"], "You have no upcoming events");
}

#[tokio::test]
async fn test_store_outage_is_retryable_503() {
    let (app, state) = create_test_app();
    let token = create_test_jwt("alice", &state.config);
    state.resolver.store().set_fail_reads(true);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/matches/compute")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert_eq!(body["retryable"], true);
}

#[tokio::test]
async fn test_cors_preflight() {
    let (app, _) = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/api/matches")
                .header(header::ORIGIN, "http://localhost:5173")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "http://localhost:5173"
    );
}

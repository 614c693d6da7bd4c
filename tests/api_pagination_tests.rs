// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API pagination security tests.
//!
//! These tests verify that:
//! 1. Pagination parameters are validated correctly
//! 2. Integer underflows/overflows are prevented

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use tower::ServiceExt;

mod common;

#[tokio::test]
async fn test_items_pagination_underflow() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_jwt("user-1", false, &state.config.jwt_access_key);

    // Request with page=0, which would cause underflow (0-1) in vulnerable code
    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/items?page=0&limit=10")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_items_rejects_unknown_type_filter() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_jwt("user-1", false, &state.config.jwt_access_key);

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/items?type=widget")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_history_pagination_underflow() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_jwt("user-1", false, &state.config.jwt_access_key);

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/notifications/history?page=0")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_expiring_rejects_out_of_range_days() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_jwt("user-1", false, &state.config.jwt_access_key);

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/items/expiring?days=100000")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

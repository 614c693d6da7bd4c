// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Error-to-response mapping tests.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use expiry_tracker::error::AppError;

fn status_of(err: AppError) -> StatusCode {
    err.into_response().status()
}

#[test]
fn test_auth_errors_map_to_401() {
    assert_eq!(status_of(AppError::Unauthorized), StatusCode::UNAUTHORIZED);
    assert_eq!(status_of(AppError::InvalidToken), StatusCode::UNAUTHORIZED);
}

#[test]
fn test_client_errors_keep_their_status() {
    assert_eq!(
        status_of(AppError::Forbidden("nope".into())),
        StatusCode::FORBIDDEN
    );
    assert_eq!(
        status_of(AppError::NotFound("gone".into())),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        status_of(AppError::BadRequest("bad".into())),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        status_of(AppError::Conflict("dupe".into())),
        StatusCode::CONFLICT
    );
}

#[test]
fn test_external_dependency_errors_map_to_gateway() {
    assert_eq!(
        status_of(AppError::PushProvider("fcm down".into())),
        StatusCode::BAD_GATEWAY
    );
    assert_eq!(
        status_of(AppError::ImageHost("cloudinary down".into())),
        StatusCode::BAD_GATEWAY
    );
}

#[test]
fn test_internal_errors_map_to_500() {
    assert_eq!(
        status_of(AppError::Database("connection refused".into())),
        StatusCode::INTERNAL_SERVER_ERROR
    );
    assert_eq!(
        status_of(AppError::Queue("queue unavailable".into())),
        StatusCode::INTERNAL_SERVER_ERROR
    );
    assert_eq!(
        status_of(AppError::Internal(anyhow::anyhow!("boom"))),
        StatusCode::INTERNAL_SERVER_ERROR
    );
}

#[test]
fn test_validation_error_names_the_field() {
    use validator::Validate;

    #[derive(Validate)]
    struct Probe {
        #[validate(email)]
        email: String,
    }

    let probe = Probe {
        email: "nope".into(),
    };
    let err: AppError = probe.validate().unwrap_err().into();

    assert!(matches!(&err, AppError::BadRequest(msg) if msg.contains("email")));
    assert_eq!(status_of(err), StatusCode::BAD_REQUEST);
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Cloud Tasks authentication middleware.
//!
//! The hosting platform strips the `x-cloudtasks-queuename` header from
//! external requests, so its presence guarantees the request originated
//! from Cloud Tasks. We additionally match the queue name against the one
//! we submit to.

use axum::{extract::Request, http::StatusCode, middleware::Next, response::Response};

/// Require the queue header for `/tasks/*` routes.
pub async fn require_tasks_auth(request: Request, next: Next) -> Result<Response, StatusCode> {
    let queue_name_header = request.headers().get("x-cloudtasks-queuename");
    let is_valid_queue = queue_name_header
        .and_then(|h| h.to_str().ok())
        .map(|name| name == crate::config::REMINDER_QUEUE_NAME)
        .unwrap_or(false);

    if !is_valid_queue {
        tracing::warn!(
            header = ?queue_name_header,
            "Blocked tasks request with invalid queue header"
        );
        return Err(StatusCode::FORBIDDEN);
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::{routing::post, Router};
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new()
            .route("/tasks/test", post(|| async { "ok" }))
            .layer(axum::middleware::from_fn(require_tasks_auth))
    }

    #[tokio::test]
    async fn test_missing_queue_header_is_forbidden() {
        let response = app()
            .oneshot(
                axum::http::Request::builder()
                    .method("POST")
                    .uri("/tasks/test")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_wrong_queue_name_is_forbidden() {
        let response = app()
            .oneshot(
                axum::http::Request::builder()
                    .method("POST")
                    .uri("/tasks/test")
                    .header("x-cloudtasks-queuename", "some-other-queue")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_expected_queue_name_passes() {
        let response = app()
            .oneshot(
                axum::http::Request::builder()
                    .method("POST")
                    .uri("/tasks/test")
                    .header(
                        "x-cloudtasks-queuename",
                        crate::config::REMINDER_QUEUE_NAME,
                    )
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Notification routes: preferences, history, device tokens, test push.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use validator::Validate;

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{DeviceToken, NotificationPreference, Reminder, ReminderStatus};
use crate::services::push::PushNotification;
use crate::time_utils::now_rfc3339;
use crate::AppState;

const MAX_HISTORY_PER_PAGE: u32 = 100;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/notifications/preferences",
            get(get_preferences).patch(update_preferences),
        )
        .route("/notifications/history", get(get_history))
        .route("/notifications/device-token", post(register_device_token))
        .route(
            "/notifications/device-token/{token}",
            axum::routing::delete(remove_device_token),
        )
        .route("/notifications/test", post(send_test_notification))
}

// ─── Preferences ─────────────────────────────────────────────────

#[derive(Deserialize, Validate)]
pub struct UpdatePreferencesRequest {
    enabled: Option<bool>,
    food_notifications_enabled: Option<bool>,
    document_notifications_enabled: Option<bool>,
    /// Days before expiry; normalized (deduped, capped, descending)
    #[validate(length(max = 10))]
    intervals: Option<Vec<u32>>,
    #[validate(range(min = 0, max = 23))]
    quiet_hours_start: Option<u32>,
    #[validate(range(min = 0, max = 23))]
    quiet_hours_end: Option<u32>,
    #[validate(range(min = 0, max = 23))]
    preferred_send_hour: Option<u32>,
}

/// Get the caller's notification preference, creating defaults on first
/// access.
async fn get_preferences(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<NotificationPreference>> {
    let pref = state
        .scheduler
        .load_or_default_preference(&user.user_id)
        .await?;
    Ok(Json(pref))
}

/// Update the caller's notification preference.
async fn update_preferences(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<UpdatePreferencesRequest>,
) -> Result<Json<NotificationPreference>> {
    request.validate()?;

    let mut pref = state
        .scheduler
        .load_or_default_preference(&user.user_id)
        .await?;

    if let Some(enabled) = request.enabled {
        pref.enabled = enabled;
    }
    if let Some(enabled) = request.food_notifications_enabled {
        pref.food_notifications_enabled = enabled;
    }
    if let Some(enabled) = request.document_notifications_enabled {
        pref.document_notifications_enabled = enabled;
    }
    if let Some(intervals) = &request.intervals {
        pref.intervals = NotificationPreference::normalize_intervals(intervals);
    }
    if request.quiet_hours_start.is_some() {
        pref.quiet_hours_start = request.quiet_hours_start;
    }
    if request.quiet_hours_end.is_some() {
        pref.quiet_hours_end = request.quiet_hours_end;
    }
    if request.preferred_send_hour.is_some() {
        pref.preferred_send_hour = request.preferred_send_hour;
    }
    pref.updated_at = now_rfc3339();

    state.db.set_preference(&pref).await?;

    tracing::info!(user_id = %user.user_id, "Notification preferences updated");
    Ok(Json(pref))
}

// ─── History ─────────────────────────────────────────────────────

#[derive(Deserialize)]
struct HistoryQuery {
    status: Option<ReminderStatus>,
    #[serde(default = "default_page")]
    page: u32,
    #[serde(default = "default_limit")]
    limit: u32,
}

fn default_page() -> u32 {
    1
}
fn default_limit() -> u32 {
    20
}

#[derive(Serialize)]
pub struct HistoryResponse {
    pub notifications: Vec<Reminder>,
    pub total: u32,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
}

/// Reminder history for the caller, newest scheduled first.
async fn get_history(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>> {
    if params.page < 1 {
        return Err(AppError::BadRequest(
            "Page must be greater than 0".to_string(),
        ));
    }
    let limit = params.limit.clamp(1, MAX_HISTORY_PER_PAGE);

    let mut reminders = state.db.list_reminders_for_user(&user.user_id).await?;
    if let Some(status) = params.status {
        reminders.retain(|r| r.status == status);
    }

    let total = reminders.len() as u32;
    let total_pages = total.div_ceil(limit);

    let start = (params.page as usize - 1)
        .checked_mul(limit as usize)
        .ok_or_else(|| AppError::BadRequest("Page number causes overflow".to_string()))?;

    let paged = if start < reminders.len() {
        let end = start.saturating_add(limit as usize).min(reminders.len());
        reminders[start..end].to_vec()
    } else {
        vec![]
    };

    Ok(Json(HistoryResponse {
        notifications: paged,
        total,
        page: params.page,
        limit,
        total_pages,
    }))
}

// ─── Device Tokens ───────────────────────────────────────────────

#[derive(Deserialize, Validate)]
pub struct RegisterDeviceTokenRequest {
    #[validate(length(min = 1, max = 4096))]
    token: String,
    #[validate(custom(function = validate_platform))]
    platform: String,
    #[validate(length(max = 200))]
    device_id: Option<String>,
}

fn validate_platform(platform: &str) -> std::result::Result<(), validator::ValidationError> {
    match platform {
        "ios" | "android" => Ok(()),
        _ => Err(validator::ValidationError::new("platform")),
    }
}

/// Device tokens are keyed by digest: raw FCM tokens contain characters
/// that are awkward in document IDs and URLs.
fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Register a device token for the caller.
///
/// A token previously registered by another user is reassigned: tokens
/// identify devices, and devices change hands between accounts.
async fn register_device_token(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<RegisterDeviceTokenRequest>,
) -> Result<(StatusCode, Json<DeviceToken>)> {
    request.validate()?;

    let digest = token_digest(&request.token);
    let now = now_rfc3339();

    let record = match state.db.get_device_token(&digest).await? {
        Some(mut existing) => {
            existing.user_id = user.user_id.clone();
            existing.platform = request.platform;
            existing.device_id = request.device_id;
            existing.updated_at = now;
            existing
        }
        None => DeviceToken {
            token: request.token,
            user_id: user.user_id.clone(),
            platform: request.platform,
            device_id: request.device_id,
            created_at: now.clone(),
            updated_at: now,
        },
    };

    state.db.set_device_token(&digest, &record).await?;

    tracing::info!(user_id = %user.user_id, platform = %record.platform, "Device token registered");
    Ok((StatusCode::CREATED, Json(record)))
}

/// Remove one of the caller's device tokens.
async fn remove_device_token(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(token): Path<String>,
) -> Result<StatusCode> {
    let digest = token_digest(&token);

    let record = state
        .db
        .get_device_token(&digest)
        .await?
        .ok_or_else(|| AppError::NotFound("Device token not found".to_string()))?;

    if record.user_id != user.user_id {
        return Err(AppError::NotFound("Device token not found".to_string()));
    }

    state.db.delete_device_token(&digest).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ─── Test Push ───────────────────────────────────────────────────

#[derive(Serialize)]
pub struct TestNotificationResponse {
    pub success: bool,
    pub message: String,
}

/// Send an immediate test push to all of the caller's devices.
async fn send_test_notification(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<TestNotificationResponse>> {
    let tokens = state.db.list_device_tokens_for_user(&user.user_id).await?;

    if tokens.is_empty() {
        return Ok(Json(TestNotificationResponse {
            success: false,
            message: "No device tokens registered".to_string(),
        }));
    }

    let notification = PushNotification {
        title: "Test Notification".to_string(),
        body: "This is a test notification from Expiry Tracker".to_string(),
    };
    let data = HashMap::from([("type".to_string(), "test".to_string())]);

    let token_values: Vec<String> = tokens.into_iter().map(|t| t.token).collect();

    if token_values.len() == 1 {
        state
            .push_service
            .send_to_one(&token_values[0], &notification, &data)
            .await?;
    } else {
        state
            .push_service
            .send_to_many(&token_values, &notification, &data)
            .await?;
    }

    Ok(Json(TestNotificationResponse {
        success: true,
        message: "Test notification sent".to_string(),
    }))
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Task handler routes for Cloud Tasks callbacks.
//!
//! These endpoints are called by Cloud Tasks when a reminder falls due,
//! not directly by users; `require_tasks_auth` guards them. The handler
//! returns 200 to acknowledge a job (including non-retryable outcomes)
//! and 500 to make the queue retry.

use crate::models::ReminderStatus;
use crate::services::push::{expiry_body, expiry_title, PushNotification};
use crate::services::queue::ReminderJobPayload;
use crate::time_utils::now_rfc3339;
use crate::AppState;
use axum::{
    extract::{Json, State},
    http::StatusCode,
    routing::post,
    Router,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Task handler routes (called by Cloud Tasks).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/tasks/send-reminder", post(send_reminder))
}

/// Deliver one due reminder.
///
/// The reminder record is the source of truth: SENT and CANCELLED records
/// are acknowledged without delivery (idempotent redelivery, cancellation
/// after dequeue), FAILED records are retried, PENDING records are sent.
async fn send_reminder(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ReminderJobPayload>,
) -> StatusCode {
    tracing::info!(
        reminder_id = %payload.reminder_id,
        user_id = %payload.user_id,
        "Processing reminder delivery from Cloud Task"
    );

    let mut reminder = match state.db.get_reminder(&payload.reminder_id).await {
        Ok(Some(r)) => r,
        Ok(None) => {
            tracing::warn!(
                reminder_id = %payload.reminder_id,
                "No reminder record for queued job, dropping"
            );
            return StatusCode::OK;
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to load reminder record");
            // Return 500 to trigger Cloud Tasks retry
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    };

    match reminder.status {
        ReminderStatus::Sent | ReminderStatus::Cancelled => {
            tracing::info!(
                reminder_id = %reminder.id,
                status = reminder.status.as_str(),
                "Reminder already settled, skipping delivery"
            );
            return StatusCode::OK;
        }
        ReminderStatus::Pending | ReminderStatus::Failed => {}
    }

    let tokens = match state.db.list_device_tokens_for_user(&payload.user_id).await {
        Ok(tokens) => tokens,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load device tokens");
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    };

    if tokens.is_empty() {
        // Not an error and not retryable: the user has no registered
        // devices, so the reminder can never be delivered.
        tracing::warn!(
            reminder_id = %reminder.id,
            user_id = %payload.user_id,
            "No device tokens registered, marking failed"
        );

        reminder.status = ReminderStatus::Failed;
        reminder.error_message = Some("No registered devices".to_string());
        if let Err(e) = state.db.set_reminder(&reminder).await {
            tracing::error!(error = %e, "Failed to record no-destination outcome");
        }
        return StatusCode::OK;
    }

    // Item reminders render from the job payload; broadcast reminders
    // carry their content on the record.
    let notification = match (payload.item_type, payload.offset_days) {
        (Some(item_type), Some(offset_days)) => PushNotification {
            title: expiry_title(&payload.item_name, offset_days),
            body: expiry_body(item_type).to_string(),
        },
        _ => PushNotification {
            title: reminder.title.clone(),
            body: reminder.body.clone(),
        },
    };

    let mut data = HashMap::new();
    if let Some(item_id) = &payload.item_id {
        data.insert("type".to_string(), "expiry".to_string());
        data.insert("itemId".to_string(), item_id.clone());
        if let Some(item_type) = payload.item_type {
            data.insert("itemType".to_string(), item_type.to_string());
        }
        if let Some(offset_days) = payload.offset_days {
            data.insert("daysUntilExpiry".to_string(), offset_days.to_string());
        }
    } else {
        data.insert("type".to_string(), "broadcast".to_string());
        if let Some(broadcast_id) = &reminder.broadcast_id {
            data.insert("broadcastId".to_string(), broadcast_id.clone());
        }
    }

    let token_values: Vec<String> = tokens.into_iter().map(|t| t.token).collect();

    let delivery = if token_values.len() == 1 {
        state
            .push_service
            .send_to_one(&token_values[0], &notification, &data)
            .await
            .map(|_| ())
    } else {
        state
            .push_service
            .send_to_many(&token_values, &notification, &data)
            .await
            .and_then(|report| {
                if report.success_count == 0 {
                    Err(crate::error::AppError::PushProvider(format!(
                        "All {} sends failed",
                        report.failure_count
                    )))
                } else {
                    Ok(())
                }
            })
    };

    match delivery {
        Ok(()) => {
            reminder.status = ReminderStatus::Sent;
            reminder.sent_at = Some(now_rfc3339());
            reminder.error_message = None;

            if let Err(e) = state.db.set_reminder(&reminder).await {
                // The push went out but the record still says PENDING; a
                // retry will re-read the record and may send again.
                // At-least-once delivery is the accepted trade-off.
                tracing::error!(error = %e, "Failed to mark reminder sent");
                return StatusCode::INTERNAL_SERVER_ERROR;
            }

            tracing::info!(
                reminder_id = %reminder.id,
                devices = token_values.len(),
                "Reminder delivered"
            );
            StatusCode::OK
        }
        Err(e) => {
            tracing::error!(
                reminder_id = %reminder.id,
                error = %e,
                "Failed to deliver reminder"
            );

            reminder.status = ReminderStatus::Failed;
            reminder.error_message = Some(e.to_string());
            if let Err(db_err) = state.db.set_reminder(&reminder).await {
                tracing::error!(error = %db_err, "Failed to record delivery failure");
            }

            // Return 500 to trigger Cloud Tasks retry; the queue's retry
            // policy (bounded attempts, exponential backoff) is queue
            // configuration, not worker logic.
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! FCM push delivery client.
//!
//! Handles:
//! - Single-device sends (one registered token)
//! - Multicast sends (a user with several devices)
//! - Rendering of the expiry reminder title/body

use crate::error::AppError;
use crate::models::ItemType;
use serde::Deserialize;
use std::collections::HashMap;

/// Notification content for a push message.
#[derive(Debug, Clone)]
pub struct PushNotification {
    pub title: String,
    pub body: String,
}

/// Outcome of a multicast send.
#[derive(Debug, Clone, Copy)]
pub struct MulticastReport {
    pub success_count: u32,
    pub failure_count: u32,
}

/// FCM API client.
#[derive(Clone)]
pub struct PushService {
    http: reqwest::Client,
    base_url: String,
    server_key: String,
    /// Offline mode for tests: report success without network calls.
    offline: bool,
}

#[derive(Deserialize)]
struct FcmResponse {
    #[serde(default)]
    success: u32,
    #[serde(default)]
    failure: u32,
    #[serde(default)]
    results: Vec<FcmResult>,
}

#[derive(Deserialize)]
struct FcmResult {
    message_id: Option<String>,
    error: Option<String>,
}

impl PushService {
    /// Create a new FCM client with a server key.
    pub fn new(server_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: "https://fcm.googleapis.com".to_string(),
            server_key,
            offline: false,
        }
    }

    /// Create an offline client for testing. Sends succeed without I/O.
    pub fn new_mock() -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: "http://localhost:0".to_string(),
            server_key: "mock".to_string(),
            offline: true,
        }
    }

    /// Send a push message to a single device token.
    ///
    /// Returns the provider message ID.
    pub async fn send_to_one(
        &self,
        token: &str,
        notification: &PushNotification,
        data: &HashMap<String, String>,
    ) -> Result<String, AppError> {
        if self.offline {
            return Ok("offline-mock".to_string());
        }

        let body = serde_json::json!({
            "to": token,
            "priority": "high",
            "notification": {
                "title": notification.title,
                "body": notification.body,
                "sound": "default",
            },
            "data": data,
        });

        let response: FcmResponse = self.post_send(&body).await?;

        if response.failure > 0 {
            let reason = response
                .results
                .first()
                .and_then(|r| r.error.clone())
                .unwrap_or_else(|| "unknown".to_string());
            return Err(AppError::PushProvider(format!(
                "FCM rejected message: {}",
                reason
            )));
        }

        Ok(response
            .results
            .into_iter()
            .next()
            .and_then(|r| r.message_id)
            .unwrap_or_default())
    }

    /// Send a push message to several device tokens in one call.
    ///
    /// Partial failure is not an error: the report carries both counts and
    /// the caller decides what to do with it.
    pub async fn send_to_many(
        &self,
        tokens: &[String],
        notification: &PushNotification,
        data: &HashMap<String, String>,
    ) -> Result<MulticastReport, AppError> {
        if self.offline {
            return Ok(MulticastReport {
                success_count: tokens.len() as u32,
                failure_count: 0,
            });
        }

        let body = serde_json::json!({
            "registration_ids": tokens,
            "priority": "high",
            "notification": {
                "title": notification.title,
                "body": notification.body,
                "sound": "default",
            },
            "data": data,
        });

        let response: FcmResponse = self.post_send(&body).await?;

        Ok(MulticastReport {
            success_count: response.success,
            failure_count: response.failure,
        })
    }

    async fn post_send(&self, body: &serde_json::Value) -> Result<FcmResponse, AppError> {
        let url = format!("{}/fcm/send", self.base_url);

        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("key={}", self.server_key))
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::PushProvider(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::PushProvider(format!(
                "FCM returned {}: {}",
                status, text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::PushProvider(format!("Invalid FCM response: {}", e)))
    }
}

// ─── Message Rendering ───────────────────────────────────────────

/// Render the reminder title for an item expiring in `days_until_expiry` days.
pub fn expiry_title(item_name: &str, days_until_expiry: u32) -> String {
    match days_until_expiry {
        0 => format!("{} expires today!", item_name),
        1 => format!("{} expires tomorrow", item_name),
        n => format!("{} expires in {} days", item_name, n),
    }
}

/// Render the reminder body for an item type.
pub fn expiry_body(item_type: ItemType) -> &'static str {
    match item_type {
        ItemType::Food => "Check your food items to avoid waste",
        ItemType::Document => "Renew your document before it expires",
    }
}

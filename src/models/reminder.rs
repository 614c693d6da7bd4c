// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Reminder model: one scheduled-or-sent push for a (user, item, offset)
//! triple, or one broadcast message for a user.
//!
//! The reminder collection is the single source of truth for delivery
//! state. The scheduler creates PENDING records and cancels them; the
//! delivery worker alone moves PENDING to SENT or FAILED.

use serde::{Deserialize, Serialize};

use crate::models::ItemType;

/// Delivery state of a reminder.
///
/// PENDING is the only non-terminal state: PENDING → SENT | FAILED |
/// CANCELLED, with no transitions out of the terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReminderStatus {
    Pending,
    Sent,
    Failed,
    Cancelled,
}

impl ReminderStatus {
    /// Whether a record in this state covers its (item, offset) slot for
    /// duplicate suppression. FAILED and CANCELLED slots may be re-filled.
    pub fn covers_slot(&self) -> bool {
        matches!(self, ReminderStatus::Pending | ReminderStatus::Sent)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderStatus::Pending => "PENDING",
            ReminderStatus::Sent => "SENT",
            ReminderStatus::Failed => "FAILED",
            ReminderStatus::Cancelled => "CANCELLED",
        }
    }
}

/// Deterministic reminder key for an (item, offset) pair.
///
/// Used both as the reminder document ID and as the queue task ID, so a
/// second submission of the same reminder is a no-op at both layers.
pub fn reminder_key(item_id: &str, offset_days: u32) -> String {
    format!("expiry-{}-{}", item_id, offset_days)
}

/// Key for one user's copy of a broadcast message.
pub fn broadcast_key(broadcast_id: &str, user_id: &str) -> String {
    format!("{}-{}", broadcast_id, user_id)
}

/// Stored reminder record in Firestore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reminder {
    /// Deterministic key (also used as document ID)
    pub id: String,
    /// Target user
    pub user_id: String,
    /// Target item; None for broadcast reminders
    pub item_id: Option<String>,
    /// Target item type; None for broadcast reminders
    pub item_type: Option<ItemType>,
    /// Rendered notification title
    pub title: String,
    /// Rendered notification body
    pub body: String,
    /// Days-before-expiry offset that produced this reminder
    pub offset_days: Option<u32>,
    /// When delivery is due (ISO 8601)
    pub scheduled_for: String,
    /// Delivery state
    pub status: ReminderStatus,
    /// Provider error, for FAILED records
    pub error_message: Option<String>,
    /// When delivery succeeded (ISO 8601)
    pub sent_at: Option<String>,
    /// Shared ID tagging all copies of an admin broadcast
    pub broadcast_id: Option<String>,
    /// When the record was created (ISO 8601)
    pub created_at: String,
}

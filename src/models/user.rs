//! User, notification preference and device token models.

use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_REMINDER_INTERVALS;
use crate::models::ItemType;

/// User account stored in Firestore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// UUID (also used as document ID)
    pub id: String,
    /// Email address (unique)
    pub email: String,
    /// PBKDF2 password hash (hex)
    pub password_hash: String,
    /// Per-user random salt (hex)
    pub password_salt: String,
    /// First name
    pub first_name: Option<String>,
    /// Last name
    pub last_name: Option<String>,
    /// Inactive accounts cannot log in and receive no reminders
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Admin accounts may access /admin routes
    #[serde(default)]
    pub is_admin: bool,
    /// Premium plan flag (used for broadcast audience segmentation)
    #[serde(default)]
    pub is_premium: bool,
    /// Last successful login (ISO 8601)
    pub last_login_at: Option<String>,
    /// SHA-256 digest of the outstanding password reset token (hex)
    pub password_reset_digest: Option<String>,
    /// Expiry of the outstanding reset token (ISO 8601)
    pub password_reset_expiry: Option<String>,
    /// When the account was created (ISO 8601)
    pub created_at: String,
}

fn default_true() -> bool {
    true
}

impl User {
    /// Full display name, falling back to the email address.
    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => format!("{} {}", first, last),
            (Some(first), None) => first.clone(),
            (None, Some(last)) => last.clone(),
            (None, None) => self.email.clone(),
        }
    }
}

/// Per-user notification preference (1:1 with User, created lazily).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationPreference {
    /// Owning user ID (also the document ID)
    pub user_id: String,
    /// Master switch
    pub enabled: bool,
    /// Per-type switch for food reminders
    pub food_notifications_enabled: bool,
    /// Per-type switch for document reminders
    pub document_notifications_enabled: bool,
    /// Days before expiry at which to remind (deduped, descending)
    pub intervals: Vec<u32>,
    /// Quiet hours start (0-23), if quiet hours are configured
    pub quiet_hours_start: Option<u32>,
    /// Quiet hours end (0-23)
    pub quiet_hours_end: Option<u32>,
    /// Preferred send hour override (0-23)
    pub preferred_send_hour: Option<u32>,
    /// Last update (ISO 8601)
    #[serde(default)]
    pub updated_at: String,
}

impl NotificationPreference {
    /// Fully-enabled defaults for a user with no stored preference.
    pub fn default_for(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            enabled: true,
            food_notifications_enabled: true,
            document_notifications_enabled: true,
            intervals: DEFAULT_REMINDER_INTERVALS.to_vec(),
            quiet_hours_start: None,
            quiet_hours_end: None,
            preferred_send_hour: None,
            updated_at: String::new(),
        }
    }

    /// Whether reminders for the given item type are enabled.
    ///
    /// The master switch gates both per-type switches.
    pub fn allows(&self, item_type: ItemType) -> bool {
        if !self.enabled {
            return false;
        }
        match item_type {
            ItemType::Food => self.food_notifications_enabled,
            ItemType::Document => self.document_notifications_enabled,
        }
    }

    /// Normalize an interval list: drop zero/oversized entries, dedupe,
    /// sort descending (furthest reminder first).
    pub fn normalize_intervals(intervals: &[u32]) -> Vec<u32> {
        let mut normalized: Vec<u32> = intervals
            .iter()
            .copied()
            .filter(|&d| d > 0 && d <= 365)
            .collect();
        normalized.sort_unstable_by(|a, b| b.cmp(a));
        normalized.dedup();
        normalized
    }
}

/// FCM registration token for one of a user's devices.
///
/// A user may have several devices registered; each gets its own record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceToken {
    /// The raw FCM registration token
    pub token: String,
    /// Owning user ID
    pub user_id: String,
    /// Device platform ("ios" or "android")
    pub platform: String,
    /// Client-supplied device identifier
    pub device_id: Option<String>,
    /// When the token was first registered (ISO 8601)
    pub created_at: String,
    /// Last registration refresh (ISO 8601)
    pub updated_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allows_respects_master_switch() {
        let mut pref = NotificationPreference::default_for("u1");
        assert!(pref.allows(ItemType::Food));
        assert!(pref.allows(ItemType::Document));

        pref.enabled = false;
        assert!(!pref.allows(ItemType::Food));
        assert!(!pref.allows(ItemType::Document));
    }

    #[test]
    fn test_allows_respects_type_switch() {
        let mut pref = NotificationPreference::default_for("u1");
        pref.food_notifications_enabled = false;

        assert!(!pref.allows(ItemType::Food));
        assert!(pref.allows(ItemType::Document));
    }

    #[test]
    fn test_normalize_intervals() {
        let normalized = NotificationPreference::normalize_intervals(&[1, 7, 7, 0, 400, 30]);
        assert_eq!(normalized, vec![30, 7, 1]);
    }

    #[test]
    fn test_display_name_falls_back_to_email() {
        let user = User {
            id: "u1".to_string(),
            email: "a@example.com".to_string(),
            password_hash: String::new(),
            password_salt: String::new(),
            first_name: None,
            last_name: None,
            is_active: true,
            is_admin: false,
            is_premium: false,
            last_login_at: None,
            password_reset_digest: None,
            password_reset_expiry: None,
            created_at: String::new(),
        };
        assert_eq!(user.display_name(), "a@example.com");
    }
}

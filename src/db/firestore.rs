// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (accounts, lookup by email / reset token)
//! - Notification preferences (1:1 with users, lazily created)
//! - Items (food and documents in one collection)
//! - Reminders (delivery state, keyed by the deterministic reminder key)
//! - Device tokens (FCM registrations)

use crate::db::collections;
use crate::error::AppError;
use crate::models::{DeviceToken, Item, NotificationPreference, Reminder, ReminderStatus, User};
use futures_util::{stream, StreamExt};

const MAX_CONCURRENT_DB_OPS: usize = 50;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        // Use ExternalJwtFunctionSource to provide a dummy token without needing async-trait
        // or a custom TokenSource implementation struct.
        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── User Operations ─────────────────────────────────────────

    /// Get a user by ID.
    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a user by email address.
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let email = email.to_string();
        let mut users: Vec<User> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .filter(move |q| q.field("email").eq(email.clone()))
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(users.pop())
    }

    /// Get a user by the digest of an unexpired password reset token.
    pub async fn get_user_by_reset_digest(
        &self,
        digest: &str,
        now: &str,
    ) -> Result<Option<User>, AppError> {
        let digest = digest.to_string();
        let now = now.to_string();
        let mut users: Vec<User> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .filter(move |q| {
                q.for_all([
                    q.field("password_reset_digest").eq(digest.clone()),
                    q.field("password_reset_expiry").greater_than(now.clone()),
                ])
            })
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(users.pop())
    }

    /// Create or update a user.
    pub async fn upsert_user(&self, user: &User) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&user.id)
            .object(user)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// List all users (admin dashboards and broadcast segmentation).
    pub async fn list_users(&self) -> Result<Vec<User>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// List active users, for the reconciliation pass.
    pub async fn list_active_users(&self) -> Result<Vec<User>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .filter(|q| q.field("is_active").eq(true))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── Preference Operations ───────────────────────────────────

    /// Get a user's notification preference, if one has been stored.
    pub async fn get_preference(
        &self,
        user_id: &str,
    ) -> Result<Option<NotificationPreference>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::PREFERENCES)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Store a user's notification preference.
    pub async fn set_preference(&self, pref: &NotificationPreference) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::PREFERENCES)
            .document_id(&pref.user_id)
            .object(pref)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Item Operations ─────────────────────────────────────────

    /// Get an item by ID.
    pub async fn get_item(&self, item_id: &str) -> Result<Option<Item>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::ITEMS)
            .obj()
            .one(item_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get all items belonging to a user.
    ///
    /// Filtering, sorting and pagination happen in memory: per-user item
    /// lists are small and the merged food+document listing needs a single
    /// ordering anyway.
    pub async fn list_items_for_user(&self, user_id: &str) -> Result<Vec<Item>, AppError> {
        let user_id = user_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::ITEMS)
            .filter(move |q| q.field("user_id").eq(user_id.clone()))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get every item (admin dashboard tallies).
    pub async fn list_all_items(&self) -> Result<Vec<Item>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::ITEMS)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Store an item (create or update).
    pub async fn set_item(&self, item: &Item) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::ITEMS)
            .document_id(&item.id)
            .object(item)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Delete an item document.
    pub async fn delete_item(&self, item_id: &str) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collections::ITEMS)
            .document_id(item_id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Reminder Operations ─────────────────────────────────────

    /// Get a reminder by its deterministic key.
    ///
    /// This is the duplicate-suppression lookup: an existing PENDING or
    /// SENT record at this key means the (item, offset) slot is covered.
    pub async fn get_reminder(&self, reminder_id: &str) -> Result<Option<Reminder>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::REMINDERS)
            .obj()
            .one(reminder_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Store a reminder record (create or update).
    pub async fn set_reminder(&self, reminder: &Reminder) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::REMINDERS)
            .document_id(&reminder.id)
            .object(reminder)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// List a user's reminders, newest scheduled first.
    pub async fn list_reminders_for_user(&self, user_id: &str) -> Result<Vec<Reminder>, AppError> {
        let user_id = user_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::REMINDERS)
            .filter(move |q| q.field("user_id").eq(user_id.clone()))
            .order_by([(
                "scheduled_for",
                firestore::FirestoreQueryDirection::Descending,
            )])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// List PENDING reminders referencing an item (for cancellation).
    pub async fn list_pending_reminders_for_item(
        &self,
        item_id: &str,
    ) -> Result<Vec<Reminder>, AppError> {
        let item_id = item_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::REMINDERS)
            .filter(move |q| {
                q.for_all([
                    q.field("item_id").eq(item_id.clone()),
                    q.field("status").eq(ReminderStatus::Pending.as_str()),
                ])
            })
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// List reminders whose `scheduled_for` is at or after `since`
    /// (RFC3339 strings compare lexicographically). Used for dashboard
    /// delivery statistics.
    pub async fn list_reminders_scheduled_since(
        &self,
        since: &str,
    ) -> Result<Vec<Reminder>, AppError> {
        let since = since.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::REMINDERS)
            .filter(move |q| q.field("scheduled_for").greater_than_or_equal(since.clone()))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Store many reminder records with bounded concurrency (broadcasts).
    pub async fn batch_set_reminders(&self, reminders: &[Reminder]) -> Result<(), AppError> {
        let client = self.get_client()?;

        stream::iter(reminders.to_vec())
            .map(|reminder| async move {
                let _: () = client
                    .fluent()
                    .update()
                    .in_col(collections::REMINDERS)
                    .document_id(&reminder.id)
                    .object(&reminder)
                    .execute()
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;

                Ok::<_, AppError>(())
            })
            .buffer_unordered(MAX_CONCURRENT_DB_OPS)
            .collect::<Vec<Result<(), AppError>>>()
            .await
            .into_iter()
            .collect::<Result<Vec<()>, AppError>>()?;

        Ok(())
    }

    // ─── Device Token Operations ─────────────────────────────────

    /// Get a device token record by its digest.
    pub async fn get_device_token(&self, digest: &str) -> Result<Option<DeviceToken>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::DEVICE_TOKENS)
            .obj()
            .one(digest)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Store a device token record under its digest.
    pub async fn set_device_token(
        &self,
        digest: &str,
        token: &DeviceToken,
    ) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::DEVICE_TOKENS)
            .document_id(digest)
            .object(token)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Delete a device token record.
    pub async fn delete_device_token(&self, digest: &str) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collections::DEVICE_TOKENS)
            .document_id(digest)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// List all registered device tokens for a user.
    pub async fn list_device_tokens_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<DeviceToken>, AppError> {
        let user_id = user_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::DEVICE_TOKENS)
            .filter(move |q| q.field("user_id").eq(user_id.clone()))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

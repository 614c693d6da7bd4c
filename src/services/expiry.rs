// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Expiry reminder scheduling.
//!
//! The scheduler turns an item's expiry date and the owner's configured
//! reminder intervals into delayed delivery jobs. Every reminder is keyed
//! by `expiry-{item_id}-{offset_days}`, used as both the reminder document
//! ID and the queue task ID, so re-scheduling the same reminder is a no-op
//! at both layers. The hourly reconciliation pass re-derives the full
//! reminder set for every active user and relies on that key to converge
//! without duplicating work.
//!
//! Scheduling is a best-effort side channel of item CRUD: a failure here
//! is logged and surfaced, but never rolls back the item write.

use crate::config::REMINDER_SEND_HOUR;
use crate::db::FirestoreDb;
use crate::error::Result;
use crate::models::{
    reminder_key, Item, ItemType, NotificationPreference, Reminder, ReminderStatus, User,
};
use crate::services::push::{expiry_body, expiry_title};
use crate::services::queue::{ReminderJobPayload, ReminderQueue};
use crate::time_utils::{format_utc_rfc3339, now_rfc3339};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::sync::Arc;

/// How often the reconciliation pass runs.
const RECONCILE_INTERVAL_SECS: u64 = 60 * 60;

/// One computed reminder moment for an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderTime {
    pub offset_days: u32,
    pub fire_at: DateTime<Utc>,
}

/// Compute the future reminder moments for an expiry date.
///
/// Each interval produces `expiry_date - offset days` at the fixed send
/// hour (UTC); moments at or before `now` are dropped. No deduplication
/// here; intervals are normalized at preference-write time.
pub fn reminder_times(
    expiry_date: NaiveDate,
    intervals: &[u32],
    now: DateTime<Utc>,
) -> Vec<ReminderTime> {
    intervals
        .iter()
        .filter_map(|&offset_days| {
            let day = expiry_date - Duration::days(offset_days as i64);
            let fire_at = day.and_hms_opt(REMINDER_SEND_HOUR, 0, 0)?.and_utc();
            (fire_at > now).then_some(ReminderTime {
                offset_days,
                fire_at,
            })
        })
        .collect()
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReconcileReport {
    pub users_processed: u32,
    pub users_failed: u32,
    pub reminders_scheduled: u32,
}

/// Orchestrates rule evaluation, duplicate suppression and queue
/// submission for expiry reminders.
#[derive(Clone)]
pub struct ExpiryScheduler {
    db: FirestoreDb,
    queue: Arc<ReminderQueue>,
    /// Public URL of this API; queue callbacks are addressed here.
    api_url: String,
}

impl ExpiryScheduler {
    pub fn new(db: FirestoreDb, queue: Arc<ReminderQueue>, api_url: String) -> Self {
        Self { db, queue, api_url }
    }

    /// Load a user's notification preference, creating fully-enabled
    /// defaults on first access.
    pub async fn load_or_default_preference(
        &self,
        user_id: &str,
    ) -> Result<NotificationPreference> {
        if let Some(pref) = self.db.get_preference(user_id).await? {
            return Ok(pref);
        }

        let mut pref = NotificationPreference::default_for(user_id);
        pref.updated_at = now_rfc3339();
        self.db.set_preference(&pref).await?;
        Ok(pref)
    }

    /// Schedule all future reminders for a newly created item.
    ///
    /// No-op if the master switch or the per-type switch is off. Returns
    /// the number of reminders actually scheduled (already-covered slots
    /// are skipped).
    pub async fn schedule_for_new_item(
        &self,
        user_id: &str,
        item_id: &str,
        item_type: ItemType,
        item_name: &str,
        expiry_date: NaiveDate,
    ) -> Result<u32> {
        let pref = self.load_or_default_preference(user_id).await?;
        if !pref.allows(item_type) {
            tracing::debug!(user_id, item_id, %item_type, "Notifications disabled, skipping");
            return Ok(0);
        }

        let times = reminder_times(expiry_date, &pref.intervals, Utc::now());
        let mut scheduled = 0u32;

        for time in &times {
            if self
                .schedule_one(user_id, item_id, item_type, item_name, expiry_date, time)
                .await?
            {
                scheduled += 1;
            }
        }

        tracing::info!(
            user_id,
            item_id,
            %item_type,
            scheduled,
            "Scheduled expiry reminders"
        );

        Ok(scheduled)
    }

    /// Schedule one reminder unless its slot is already covered.
    ///
    /// Returns `true` if a new reminder was created.
    async fn schedule_one(
        &self,
        user_id: &str,
        item_id: &str,
        item_type: ItemType,
        item_name: &str,
        expiry_date: NaiveDate,
        time: &ReminderTime,
    ) -> Result<bool> {
        let key = reminder_key(item_id, time.offset_days);

        // Duplicate suppression: an existing PENDING or SENT record at
        // this key covers the slot.
        if let Some(existing) = self.db.get_reminder(&key).await? {
            if existing.status.covers_slot() {
                return Ok(false);
            }
        }

        let reminder = Reminder {
            id: key.clone(),
            user_id: user_id.to_string(),
            item_id: Some(item_id.to_string()),
            item_type: Some(item_type),
            title: expiry_title(item_name, time.offset_days),
            body: expiry_body(item_type).to_string(),
            offset_days: Some(time.offset_days),
            scheduled_for: format_utc_rfc3339(time.fire_at),
            status: ReminderStatus::Pending,
            error_message: None,
            sent_at: None,
            broadcast_id: None,
            created_at: now_rfc3339(),
        };

        self.db.set_reminder(&reminder).await?;

        let payload = ReminderJobPayload {
            reminder_id: key,
            user_id: user_id.to_string(),
            item_id: Some(item_id.to_string()),
            item_type: Some(item_type),
            item_name: item_name.to_string(),
            expiry_date: Some(expiry_date),
            offset_days: Some(time.offset_days),
        };

        self.queue
            .submit_reminder(&self.api_url, &payload, time.fire_at)
            .await?;

        Ok(true)
    }

    /// Re-derive reminders after an item's expiry date changed: cancel
    /// everything pending for the item, then schedule against the new date.
    pub async fn reschedule_for_edited_item(
        &self,
        user_id: &str,
        item_id: &str,
        item_type: ItemType,
        item_name: &str,
        new_expiry_date: NaiveDate,
    ) -> Result<u32> {
        self.cancel_all_for_item(item_id).await?;
        self.schedule_for_new_item(user_id, item_id, item_type, item_name, new_expiry_date)
            .await
    }

    /// Cancel every PENDING reminder referencing an item.
    ///
    /// Marks the records CANCELLED and best-effort deletes the queued
    /// tasks; a task already dequeued for delivery may still fire. SENT
    /// records are never touched.
    pub async fn cancel_all_for_item(&self, item_id: &str) -> Result<u32> {
        let pending = self.db.list_pending_reminders_for_item(item_id).await?;
        let mut cancelled = 0u32;

        for mut reminder in pending {
            reminder.status = ReminderStatus::Cancelled;
            self.db.set_reminder(&reminder).await?;

            if let Err(e) = self.queue.cancel_reminder(&reminder.id).await {
                tracing::warn!(
                    reminder_id = %reminder.id,
                    error = %e,
                    "Failed to remove queued task (delivery may still fire)"
                );
            }

            cancelled += 1;
        }

        tracing::info!(item_id, cancelled, "Cancelled pending reminders");
        Ok(cancelled)
    }

    /// One reconciliation pass over every active user.
    ///
    /// Self-healing: reminders missed because notifications were off at
    /// item creation, or lost to a queue restart, are re-created here; the
    /// deterministic key suppresses everything already covered. A single
    /// user's failure is logged and skipped, never aborting the run.
    pub async fn reconcile_all_users(&self) -> Result<ReconcileReport> {
        let users = self.db.list_active_users().await?;
        let mut report = ReconcileReport::default();

        for user in users {
            match self.reconcile_user(&user).await {
                Ok(scheduled) => {
                    report.users_processed += 1;
                    report.reminders_scheduled += scheduled;
                }
                Err(e) => {
                    report.users_failed += 1;
                    tracing::warn!(
                        user_id = %user.id,
                        error = %e,
                        "Reconciliation failed for user, continuing"
                    );
                }
            }
        }

        tracing::info!(
            users = report.users_processed,
            failed = report.users_failed,
            scheduled = report.reminders_scheduled,
            "Reconciliation pass completed"
        );

        Ok(report)
    }

    async fn reconcile_user(&self, user: &User) -> Result<u32> {
        let pref = self.load_or_default_preference(&user.id).await?;
        if !pref.enabled {
            return Ok(0);
        }

        let items = self.db.list_items_for_user(&user.id).await?;
        let today = Utc::now().date_naive();
        let mut scheduled = 0u32;

        for item in items {
            if item.is_expired(today) || !pref.allows(item.item_type()) {
                continue;
            }

            match self.reconcile_item(user, &item, &pref.intervals).await {
                Ok(count) => scheduled += count,
                Err(e) => {
                    tracing::warn!(
                        user_id = %user.id,
                        item_id = %item.id,
                        error = %e,
                        "Reconciliation failed for item, continuing"
                    );
                }
            }
        }

        Ok(scheduled)
    }

    async fn reconcile_item(&self, user: &User, item: &Item, intervals: &[u32]) -> Result<u32> {
        let times = reminder_times(item.expiry_date, intervals, Utc::now());
        let mut scheduled = 0u32;

        for time in &times {
            if self
                .schedule_one(
                    &user.id,
                    &item.id,
                    item.item_type(),
                    &item.name,
                    item.expiry_date,
                    time,
                )
                .await?
            {
                scheduled += 1;
            }
        }

        Ok(scheduled)
    }

    /// Fan one broadcast message out to a set of users through the same
    /// reminder/delivery pipeline. Item-less reminders are tagged with the
    /// shared broadcast ID.
    ///
    /// Returns the number of users a delivery job was queued for. An empty
    /// segment is not an error.
    pub async fn broadcast(
        &self,
        broadcast_id: &str,
        title: &str,
        body: &str,
        user_ids: &[String],
        fire_at: DateTime<Utc>,
    ) -> Result<u32> {
        if user_ids.is_empty() {
            return Ok(0);
        }

        let created_at = now_rfc3339();
        let scheduled_for = format_utc_rfc3339(fire_at);

        let reminders: Vec<Reminder> = user_ids
            .iter()
            .map(|user_id| Reminder {
                id: crate::models::broadcast_key(broadcast_id, user_id),
                user_id: user_id.clone(),
                item_id: None,
                item_type: None,
                title: title.to_string(),
                body: body.to_string(),
                offset_days: None,
                scheduled_for: scheduled_for.clone(),
                status: ReminderStatus::Pending,
                error_message: None,
                sent_at: None,
                broadcast_id: Some(broadcast_id.to_string()),
                created_at: created_at.clone(),
            })
            .collect();

        self.db.batch_set_reminders(&reminders).await?;

        let mut queued = 0u32;
        for reminder in &reminders {
            let payload = ReminderJobPayload {
                reminder_id: reminder.id.clone(),
                user_id: reminder.user_id.clone(),
                item_id: None,
                item_type: None,
                item_name: String::new(),
                expiry_date: None,
                offset_days: None,
            };

            match self
                .queue
                .submit_reminder(&self.api_url, &payload, fire_at)
                .await
            {
                Ok(()) => queued += 1,
                Err(e) => {
                    tracing::warn!(
                        reminder_id = %reminder.id,
                        error = %e,
                        "Failed to queue broadcast delivery, continuing"
                    );
                }
            }
        }

        tracing::info!(broadcast_id, queued, total = user_ids.len(), "Broadcast queued");
        Ok(queued)
    }
}

/// Spawn the hourly reconciliation loop.
///
/// Runs until process shutdown; each pass is independently logged and a
/// failed pass never terminates the loop.
pub fn spawn_reconciliation_job(scheduler: Arc<ExpiryScheduler>) {
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(RECONCILE_INTERVAL_SECS));
        // The first tick fires immediately, which doubles as a catch-up
        // pass after restarts.
        loop {
            interval.tick().await;
            if let Err(e) = scheduler.reconcile_all_users().await {
                tracing::error!(error = %e, "Reconciliation pass failed");
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_reminder_times_basic() {
        // Expiry in 30 days; all four default intervals are in the future.
        let now = utc(2026, 8, 1, 12, 0);
        let times = reminder_times(date(2026, 8, 31), &[30, 15, 7, 1], now);

        assert_eq!(times.len(), 3); // the 30-day offset lands today at 09:00, already past
        assert_eq!(
            times[0],
            ReminderTime {
                offset_days: 15,
                fire_at: utc(2026, 8, 16, 9, 0)
            }
        );
        assert_eq!(times[1].fire_at, utc(2026, 8, 24, 9, 0));
        assert_eq!(times[2].fire_at, utc(2026, 8, 30, 9, 0));
    }

    #[test]
    fn test_reminder_times_all_future() {
        let now = utc(2026, 8, 1, 8, 0);
        let times = reminder_times(date(2026, 8, 31), &[30, 1], now);

        // 08:00 is before the 09:00 send hour, so today's offset survives.
        assert_eq!(times.len(), 2);
        assert_eq!(times[0].fire_at, utc(2026, 8, 1, 9, 0));
    }

    #[test]
    fn test_reminder_times_empty_intervals() {
        let now = utc(2026, 8, 1, 12, 0);
        assert!(reminder_times(date(2026, 12, 1), &[], now).is_empty());
    }

    #[test]
    fn test_reminder_times_all_past() {
        let now = utc(2026, 8, 1, 12, 0);
        let times = reminder_times(date(2026, 8, 2), &[30, 15, 7], now);
        assert!(times.is_empty());
    }

    #[test]
    fn test_reminder_times_fire_at_send_hour() {
        let now = utc(2026, 8, 1, 12, 0);
        let times = reminder_times(date(2026, 9, 15), &[7], now);

        assert_eq!(times.len(), 1);
        assert_eq!(times[0].offset_days, 7);
        assert_eq!(times[0].fire_at, utc(2026, 9, 8, 9, 0));
    }

    // Expiry = today+7 with intervals [7, 1]: before 09:00 the offset-7
    // reminder (due today) is still schedulable; after 09:00 only the
    // offset-1 reminder remains.
    #[test]
    fn test_today_plus_seven_before_send_hour() {
        let now = utc(2026, 8, 6, 8, 30);
        let times = reminder_times(date(2026, 8, 13), &[7, 1], now);

        assert_eq!(times.len(), 2);
        assert_eq!(times[0].offset_days, 7);
        assert_eq!(times[0].fire_at, utc(2026, 8, 6, 9, 0));
        assert_eq!(times[1].offset_days, 1);
        assert_eq!(times[1].fire_at, utc(2026, 8, 12, 9, 0));
    }

    #[test]
    fn test_today_plus_seven_after_send_hour() {
        let now = utc(2026, 8, 6, 10, 0);
        let times = reminder_times(date(2026, 8, 13), &[7, 1], now);

        assert_eq!(times.len(), 1);
        assert_eq!(times[0].offset_days, 1);
    }
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore integration tests for the reminder scheduling pipeline.
//!
//! These tests require the Firestore emulator to be running; they are
//! skipped otherwise. The queue side is the offline mock, so every
//! assertion here is about the reminder store - which is the source of
//! truth for duplicate suppression and delivery state.

use chrono::{Duration, Utc};
use expiry_tracker::models::{
    reminder_key, FoodCategory, Item, ItemKind, ItemType, NotificationPreference, ReminderStatus,
    StorageType, User,
};
use expiry_tracker::time_utils::now_rfc3339;

mod common;
use common::{test_db, test_scheduler};

fn unique_id(prefix: &str) -> String {
    format!("{}-{}", prefix, uuid::Uuid::new_v4())
}

fn test_user(id: &str) -> User {
    User {
        id: id.to_string(),
        email: format!("{}@example.com", id),
        password_hash: "x".to_string(),
        password_salt: "y".to_string(),
        first_name: Some("Test".to_string()),
        last_name: Some("User".to_string()),
        is_active: true,
        is_admin: false,
        is_premium: false,
        last_login_at: None,
        password_reset_digest: None,
        password_reset_expiry: None,
        created_at: now_rfc3339(),
    }
}

fn test_item(id: &str, user_id: &str, days_ahead: i64) -> Item {
    Item {
        id: id.to_string(),
        user_id: user_id.to_string(),
        name: "Milk".to_string(),
        expiry_date: Utc::now().date_naive() + Duration::days(days_ahead),
        notes: None,
        photo: None,
        created_at: now_rfc3339(),
        updated_at: now_rfc3339(),
        kind: ItemKind::Food {
            category: FoodCategory::Dairy,
            storage: StorageType::Refrigerator,
            quantity: None,
        },
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// PREFERENCES
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_preference_created_lazily_with_defaults() {
    require_emulator!();

    let db = test_db().await;
    let scheduler = test_scheduler(db.clone());
    let user_id = unique_id("user");

    assert!(db.get_preference(&user_id).await.unwrap().is_none());

    let pref = scheduler.load_or_default_preference(&user_id).await.unwrap();

    assert!(pref.enabled);
    assert!(pref.food_notifications_enabled);
    assert!(pref.document_notifications_enabled);
    assert_eq!(pref.intervals, vec![30, 15, 7, 1]);

    // A second load returns the stored document, not a fresh default
    let stored = db.get_preference(&user_id).await.unwrap();
    assert!(stored.is_some());
}

// ═══════════════════════════════════════════════════════════════════════════
// SCHEDULING
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_schedule_for_new_item_is_idempotent() {
    require_emulator!();

    let db = test_db().await;
    let scheduler = test_scheduler(db.clone());
    let user_id = unique_id("user");
    let item_id = unique_id("item");
    let expiry = Utc::now().date_naive() + Duration::days(40);

    // All four default offsets are in the future for a +40-day expiry
    let first = scheduler
        .schedule_for_new_item(&user_id, &item_id, ItemType::Food, "Milk", expiry)
        .await
        .unwrap();
    assert_eq!(first, 4);

    // Identical second call: every slot is already covered
    let second = scheduler
        .schedule_for_new_item(&user_id, &item_id, ItemType::Food, "Milk", expiry)
        .await
        .unwrap();
    assert_eq!(second, 0);

    let pending = db.list_pending_reminders_for_item(&item_id).await.unwrap();
    assert_eq!(pending.len(), 4);
}

#[tokio::test]
async fn test_schedule_respects_master_switch() {
    require_emulator!();

    let db = test_db().await;
    let scheduler = test_scheduler(db.clone());
    let user_id = unique_id("user");
    let item_id = unique_id("item");

    let mut pref = NotificationPreference::default_for(&user_id);
    pref.enabled = false;
    db.set_preference(&pref).await.unwrap();

    let scheduled = scheduler
        .schedule_for_new_item(
            &user_id,
            &item_id,
            ItemType::Food,
            "Milk",
            Utc::now().date_naive() + Duration::days(40),
        )
        .await
        .unwrap();

    assert_eq!(scheduled, 0);
    assert!(db
        .list_pending_reminders_for_item(&item_id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_schedule_respects_type_switch() {
    require_emulator!();

    let db = test_db().await;
    let scheduler = test_scheduler(db.clone());
    let user_id = unique_id("user");
    let item_id = unique_id("item");

    let mut pref = NotificationPreference::default_for(&user_id);
    pref.document_notifications_enabled = false;
    db.set_preference(&pref).await.unwrap();

    let scheduled = scheduler
        .schedule_for_new_item(
            &user_id,
            &item_id,
            ItemType::Document,
            "Passport",
            Utc::now().date_naive() + Duration::days(40),
        )
        .await
        .unwrap();

    assert_eq!(scheduled, 0);
}

#[tokio::test]
async fn test_reschedule_moves_pending_to_new_date() {
    require_emulator!();

    let db = test_db().await;
    let scheduler = test_scheduler(db.clone());
    let user_id = unique_id("user");
    let item_id = unique_id("item");

    let old_expiry = Utc::now().date_naive() + Duration::days(40);
    scheduler
        .schedule_for_new_item(&user_id, &item_id, ItemType::Food, "Milk", old_expiry)
        .await
        .unwrap();

    let key = reminder_key(&item_id, 7);
    let before = db.get_reminder(&key).await.unwrap().unwrap();

    let new_expiry = Utc::now().date_naive() + Duration::days(60);
    scheduler
        .reschedule_for_edited_item(&user_id, &item_id, ItemType::Food, "Milk", new_expiry)
        .await
        .unwrap();

    // The slot is re-filled against the new date; nothing references the
    // old one
    let after = db.get_reminder(&key).await.unwrap().unwrap();
    assert_eq!(after.status, ReminderStatus::Pending);
    assert_ne!(after.scheduled_for, before.scheduled_for);

    let pending = db.list_pending_reminders_for_item(&item_id).await.unwrap();
    assert_eq!(pending.len(), 4);
    for reminder in pending {
        assert_ne!(reminder.scheduled_for, before.scheduled_for);
    }
}

#[tokio::test]
async fn test_cancel_all_for_item_spares_sent_records() {
    require_emulator!();

    let db = test_db().await;
    let scheduler = test_scheduler(db.clone());
    let user_id = unique_id("user");
    let item_id = unique_id("item");

    scheduler
        .schedule_for_new_item(
            &user_id,
            &item_id,
            ItemType::Food,
            "Milk",
            Utc::now().date_naive() + Duration::days(40),
        )
        .await
        .unwrap();

    // Simulate one already-delivered reminder
    let sent_key = reminder_key(&item_id, 30);
    let mut sent = db.get_reminder(&sent_key).await.unwrap().unwrap();
    sent.status = ReminderStatus::Sent;
    sent.sent_at = Some(now_rfc3339());
    db.set_reminder(&sent).await.unwrap();

    let cancelled = scheduler.cancel_all_for_item(&item_id).await.unwrap();
    assert_eq!(cancelled, 3);

    assert!(db
        .list_pending_reminders_for_item(&item_id)
        .await
        .unwrap()
        .is_empty());

    // The SENT record keeps its terminal state
    let sent_after = db.get_reminder(&sent_key).await.unwrap().unwrap();
    assert_eq!(sent_after.status, ReminderStatus::Sent);
}

// ═══════════════════════════════════════════════════════════════════════════
// RECONCILIATION
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_reconciliation_fills_gaps_and_converges() {
    require_emulator!();

    let db = test_db().await;
    let scheduler = test_scheduler(db.clone());
    let user_id = unique_id("user");
    let item_id = unique_id("item");

    // Item created without any scheduling (e.g. notifications were off)
    db.upsert_user(&test_user(&user_id)).await.unwrap();
    db.set_preference(&NotificationPreference::default_for(&user_id))
        .await
        .unwrap();
    db.set_item(&test_item(&item_id, &user_id, 40)).await.unwrap();

    scheduler.reconcile_all_users().await.unwrap();

    let pending = db.list_pending_reminders_for_item(&item_id).await.unwrap();
    assert_eq!(pending.len(), 4);
    let created_before: Vec<String> = pending.iter().map(|r| r.created_at.clone()).collect();

    // A second pass with no intervening changes creates nothing new for
    // this item: the same records are still there, untouched
    scheduler.reconcile_all_users().await.unwrap();

    let mut pending_after = db.list_pending_reminders_for_item(&item_id).await.unwrap();
    assert_eq!(pending_after.len(), 4);
    pending_after.sort_by(|a, b| a.id.cmp(&b.id));
    let mut created_after: Vec<String> =
        pending_after.iter().map(|r| r.created_at.clone()).collect();
    created_after.sort();
    let mut created_before_sorted = created_before;
    created_before_sorted.sort();
    assert_eq!(created_after, created_before_sorted);
}

#[tokio::test]
async fn test_reconciliation_skips_expired_items() {
    require_emulator!();

    let db = test_db().await;
    let scheduler = test_scheduler(db.clone());
    let user_id = unique_id("user");
    let item_id = unique_id("item");

    db.upsert_user(&test_user(&user_id)).await.unwrap();
    db.set_preference(&NotificationPreference::default_for(&user_id))
        .await
        .unwrap();
    db.set_item(&test_item(&item_id, &user_id, -3)).await.unwrap();

    scheduler.reconcile_all_users().await.unwrap();

    assert!(db
        .list_pending_reminders_for_item(&item_id)
        .await
        .unwrap()
        .is_empty());
}

// ═══════════════════════════════════════════════════════════════════════════
// BROADCAST
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_broadcast_empty_segment_is_noop() {
    require_emulator!();

    let db = test_db().await;
    let scheduler = test_scheduler(db.clone());

    let queued = scheduler
        .broadcast("broadcast-empty-test", "Hi", "Hello", &[], Utc::now())
        .await
        .unwrap();

    assert_eq!(queued, 0);
}

#[tokio::test]
async fn test_broadcast_creates_tagged_pending_reminders() {
    require_emulator!();

    let db = test_db().await;
    let scheduler = test_scheduler(db.clone());

    let broadcast_id = unique_id("broadcast");
    let user_a = unique_id("user");
    let user_b = unique_id("user");

    let queued = scheduler
        .broadcast(
            &broadcast_id,
            "Maintenance tonight",
            "The app will be briefly unavailable",
            &[user_a.clone(), user_b.clone()],
            Utc::now() + Duration::hours(1),
        )
        .await
        .unwrap();
    assert_eq!(queued, 2);

    for user_id in [&user_a, &user_b] {
        let reminders = db.list_reminders_for_user(user_id).await.unwrap();
        assert_eq!(reminders.len(), 1);

        let reminder = &reminders[0];
        assert_eq!(reminder.status, ReminderStatus::Pending);
        assert_eq!(reminder.broadcast_id.as_deref(), Some(broadcast_id.as_str()));
        assert_eq!(reminder.title, "Maintenance tonight");
        assert!(reminder.item_id.is_none());
    }
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod item;
pub mod reminder;
pub mod stats;
pub mod user;

pub use item::{DocumentType, FoodCategory, Item, ItemKind, ItemType, Photo, StorageType};
pub use reminder::{broadcast_key, reminder_key, Reminder, ReminderStatus};
pub use stats::ItemStats;
pub use user::{DeviceToken, NotificationPreference, User};

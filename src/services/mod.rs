// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod expiry;
pub mod images;
pub mod push;
pub mod queue;

pub use expiry::{spawn_reconciliation_job, ExpiryScheduler};
pub use images::ImageService;
pub use push::PushService;
pub use queue::ReminderQueue;

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Expiry-Tracker: track food and document expiry dates, get reminded
//! before they lapse.
//!
//! This crate provides the backend API: item CRUD, notification
//! preferences, and the reminder scheduling/delivery pipeline.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::FirestoreDb;
use services::{ExpiryScheduler, ImageService, PushService, ReminderQueue};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: FirestoreDb,
    pub queue: Arc<ReminderQueue>,
    pub scheduler: ExpiryScheduler,
    pub push_service: PushService,
    pub image_service: ImageService,
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Expiry-Tracker API Server
//!
//! Tracks food items and documents with expiry dates and schedules push
//! reminders before they lapse.

use expiry_tracker::{
    config::Config,
    db::FirestoreDb,
    services::{spawn_reconciliation_job, ExpiryScheduler, ImageService, PushService, ReminderQueue},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting Expiry-Tracker API");

    // Initialize Firestore database
    let db = FirestoreDb::new(&config.gcp_project_id)
        .await
        .expect("Failed to connect to Firestore");

    // Initialize Cloud Tasks queue
    let queue = Arc::new(ReminderQueue::new(&config.gcp_project_id, &config.gcp_region));
    tracing::info!(
        project = %config.gcp_project_id,
        "Cloud Tasks queue initialized"
    );

    // Initialize the reminder scheduler and its hourly reconciliation pass
    let scheduler = ExpiryScheduler::new(db.clone(), queue.clone(), config.api_url.clone());
    spawn_reconciliation_job(Arc::new(scheduler.clone()));
    tracing::info!("Reconciliation job scheduled");

    // External collaborators: push delivery and image hosting
    let push_service = PushService::new(config.fcm_server_key.clone());
    let image_service = ImageService::new(
        config.cloudinary_cloud_name.clone(),
        config.cloudinary_api_key.clone(),
        config.cloudinary_api_secret.clone(),
    );

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        queue,
        scheduler,
        push_service,
        image_service,
    });

    // Build router
    let app = expiry_tracker::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("expiry_tracker=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}

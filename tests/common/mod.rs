// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use expiry_tracker::config::Config;
use expiry_tracker::db::FirestoreDb;
use expiry_tracker::routes::create_router;
use expiry_tracker::services::{ExpiryScheduler, ImageService, PushService, ReminderQueue};
use expiry_tracker::AppState;
use std::sync::Arc;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Create a mock database connection (offline).
#[allow(dead_code)]
pub fn test_db_offline() -> FirestoreDb {
    FirestoreDb::new_mock()
}

/// Create a scheduler backed by the given database and an offline queue.
#[allow(dead_code)]
pub fn test_scheduler(db: FirestoreDb) -> ExpiryScheduler {
    ExpiryScheduler::new(
        db,
        Arc::new(ReminderQueue::new_mock()),
        "http://localhost:8080".to_string(),
    )
}

/// Create a test app with offline mock dependencies.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    let config = Config::default();
    let db = test_db_offline();
    let queue = Arc::new(ReminderQueue::new_mock());
    let scheduler = ExpiryScheduler::new(db.clone(), queue.clone(), config.api_url.clone());

    let state = Arc::new(AppState {
        config,
        db,
        queue,
        scheduler,
        push_service: PushService::new_mock(),
        image_service: ImageService::new_mock(),
    });

    (create_router(state.clone()), state)
}

/// Test helper to create a JWT token (mirrors middleware/auth.rs logic).
#[allow(dead_code)]
pub fn create_test_jwt(user_id: &str, is_admin: bool, signing_key: &[u8]) -> String {
    use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
    use serde::Serialize;
    use std::time::{SystemTime, UNIX_EPOCH};

    #[derive(Serialize)]
    struct Claims {
        sub: String,
        admin: bool,
        exp: usize,
        iat: usize,
    }

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as usize;

    let claims = Claims {
        sub: user_id.to_string(),
        admin: is_admin,
        exp: now + 15 * 60,
        iat: now,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )
    .expect("Failed to create JWT")
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Authentication routes: signup, login, token refresh, password reset.

use axum::{
    extract::{Json, State},
    http::StatusCode,
    routing::post,
    Router,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use validator::Validate;

use crate::error::{AppError, Result};
use crate::middleware::auth::{
    create_access_token, create_refresh_token, hash_password, verify_password,
    verify_refresh_token,
};
use crate::models::User;
use crate::time_utils::{format_utc_rfc3339, now_rfc3339};
use crate::AppState;

/// Reset tokens are valid for one hour.
const RESET_TOKEN_TTL_HOURS: i64 = 1;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password", post(reset_password))
}

// ─── Request / Response Types ────────────────────────────────────

#[derive(Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(email)]
    email: String,
    #[validate(length(min = 8, max = 128))]
    password: String,
    #[validate(length(max = 100))]
    first_name: Option<String>,
    #[validate(length(max = 100))]
    last_name: Option<String>,
    /// Combined name, split into first/last when the parts are absent
    #[validate(length(max = 200))]
    name: Option<String>,
}

#[derive(Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    email: String,
    #[validate(length(min = 1))]
    password: String,
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    refresh_token: String,
}

#[derive(Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    #[validate(email)]
    email: String,
}

#[derive(Deserialize, Validate)]
pub struct ResetPasswordRequest {
    #[validate(length(min = 1))]
    token: String,
    #[validate(length(min = 8, max = 128))]
    new_password: String,
}

/// Public view of a user account.
#[derive(Serialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_admin: bool,
    pub is_premium: bool,
    pub created_at: String,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            is_admin: user.is_admin,
            is_premium: user.is_premium,
            created_at: user.created_at.clone(),
        }
    }
}

#[derive(Serialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Serialize)]
pub struct TokenPairResponse {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

// ─── Handlers ────────────────────────────────────────────────────

/// Create an account and return a session.
async fn signup(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SignupRequest>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    request.validate()?;

    let email = request.email.trim().to_lowercase();

    if state.db.get_user_by_email(&email).await?.is_some() {
        return Err(AppError::Conflict("Email already exists".to_string()));
    }

    let (salt, hash) = hash_password(&request.password)?;

    // Split a combined name when explicit parts are absent
    let (first_name, last_name) = match (&request.first_name, &request.last_name, &request.name) {
        (None, None, Some(name)) => {
            let mut parts = name.trim().splitn(2, ' ');
            let first = parts.next().map(str::to_string);
            let last = parts.next().map(str::to_string);
            (first, last)
        }
        _ => (request.first_name.clone(), request.last_name.clone()),
    };

    let user = User {
        id: uuid::Uuid::new_v4().to_string(),
        email,
        password_hash: hash,
        password_salt: salt,
        first_name,
        last_name,
        is_active: true,
        is_admin: false,
        is_premium: false,
        last_login_at: None,
        password_reset_digest: None,
        password_reset_expiry: None,
        created_at: now_rfc3339(),
    };

    state.db.upsert_user(&user).await?;

    tracing::info!(user_id = %user.id, "User signed up");

    let tokens = issue_tokens(&state, &user)?;
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user: UserResponse::from(&user),
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
        }),
    ))
}

/// Log in with email and password.
async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthResponse>> {
    request.validate()?;

    let email = request.email.trim().to_lowercase();

    // Same error for unknown email and wrong password
    let mut user = state
        .db
        .get_user_by_email(&email)
        .await?
        .ok_or(AppError::Unauthorized)?;

    if !verify_password(&request.password, &user.password_salt, &user.password_hash) {
        return Err(AppError::Unauthorized);
    }

    if !user.is_active {
        tracing::warn!(user_id = %user.id, "Login attempt on inactive account");
        return Err(AppError::Unauthorized);
    }

    user.last_login_at = Some(now_rfc3339());
    state.db.upsert_user(&user).await?;

    let tokens = issue_tokens(&state, &user)?;
    Ok(Json(AuthResponse {
        user: UserResponse::from(&user),
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
    }))
}

/// Exchange a refresh token for a new token pair.
async fn refresh(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<TokenPairResponse>> {
    let claims = verify_refresh_token(&request.refresh_token, &state.config.jwt_refresh_key)
        .ok_or(AppError::InvalidToken)?;

    let user = state
        .db
        .get_user(&claims.sub)
        .await?
        .ok_or(AppError::InvalidToken)?;

    if !user.is_active {
        return Err(AppError::InvalidToken);
    }

    Ok(Json(issue_tokens(&state, &user)?))
}

/// Start a password reset.
///
/// Always responds 200 so the endpoint cannot be used to probe for
/// registered addresses.
async fn forgot_password(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>> {
    request.validate()?;

    let email = request.email.trim().to_lowercase();

    if let Some(mut user) = state.db.get_user_by_email(&email).await? {
        let token = generate_reset_token()?;
        let expiry = chrono::Utc::now() + chrono::Duration::hours(RESET_TOKEN_TTL_HOURS);

        user.password_reset_digest = Some(digest_reset_token(&token));
        user.password_reset_expiry = Some(format_utc_rfc3339(expiry));
        state.db.upsert_user(&user).await?;

        // Mail delivery is handled out of band; the reset link is logged
        // for the operator in the meantime.
        tracing::info!(
            user_id = %user.id,
            reset_link = %format!("{}/reset-password?token={}", state.config.frontend_url, token),
            "Password reset requested"
        );
    }

    Ok(Json(MessageResponse {
        message: "If the address is registered, a reset link has been sent".to_string(),
    }))
}

/// Complete a password reset with a token from the reset link.
async fn reset_password(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>> {
    request.validate()?;

    let digest = digest_reset_token(&request.token);
    let now = now_rfc3339();

    let mut user = state
        .db
        .get_user_by_reset_digest(&digest, &now)
        .await?
        .ok_or_else(|| AppError::BadRequest("Invalid or expired reset token".to_string()))?;

    let (salt, hash) = hash_password(&request.new_password)?;
    user.password_salt = salt;
    user.password_hash = hash;
    user.password_reset_digest = None;
    user.password_reset_expiry = None;
    state.db.upsert_user(&user).await?;

    tracing::info!(user_id = %user.id, "Password reset completed");

    Ok(Json(MessageResponse {
        message: "Password updated".to_string(),
    }))
}

// ─── Helpers ─────────────────────────────────────────────────────

fn issue_tokens(state: &AppState, user: &User) -> Result<TokenPairResponse> {
    let access_token = create_access_token(&user.id, user.is_admin, &state.config.jwt_access_key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("JWT creation failed: {}", e)))?;
    let refresh_token =
        create_refresh_token(&user.id, user.is_admin, &state.config.jwt_refresh_key)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("JWT creation failed: {}", e)))?;

    Ok(TokenPairResponse {
        access_token,
        refresh_token,
    })
}

/// Generate a random reset token (hex).
fn generate_reset_token() -> Result<String> {
    use ring::rand::SecureRandom;

    let rng = ring::rand::SystemRandom::new();
    let mut bytes = [0u8; 32];
    rng.fill(&mut bytes)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Failed to generate reset token")))?;
    Ok(hex::encode(bytes))
}

/// Only the SHA-256 digest of a reset token is stored.
fn digest_reset_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! JWT authentication middleware and credential helpers.
//!
//! Access and refresh tokens are HS256 JWTs signed with separate keys, so
//! a refresh token can never pass the access-token check. Passwords are
//! hashed with PBKDF2-HMAC-SHA256 and a per-user random salt.

use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use ring::{digest, pbkdf2, rand::SecureRandom};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Access token lifetime: 15 minutes.
const ACCESS_TOKEN_TTL_SECS: usize = 15 * 60;
/// Refresh token lifetime: 7 days.
const REFRESH_TOKEN_TTL_SECS: usize = 7 * 24 * 60 * 60;

/// PBKDF2 iteration count.
const PBKDF2_ITERATIONS: u32 = 100_000;
const SALT_LEN: usize = 16;
const CREDENTIAL_LEN: usize = digest::SHA256_OUTPUT_LEN;

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Admin flag, carried in the token to spare a DB read per request
    #[serde(default)]
    pub admin: bool,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
}

/// Authenticated user extracted from JWT.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub is_admin: bool,
}

/// Middleware that requires valid JWT authentication.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // Try cookie first, then header
    let token = if let Some(cookie) = jar.get("expiry_token") {
        cookie.value().to_string()
    } else {
        let auth_header = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok());

        match auth_header {
            Some(h) if h.starts_with("Bearer ") => h[7..].to_string(),
            _ => return Err(StatusCode::UNAUTHORIZED),
        }
    };

    let claims = decode_token(&token, &state.config.jwt_access_key)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    let auth_user = AuthUser {
        user_id: claims.sub,
        is_admin: claims.admin,
    };
    request.extensions_mut().insert(auth_user);

    Ok(next.run(request).await)
}

/// Middleware that additionally requires the admin flag.
///
/// Must be layered inside `require_auth` so the `AuthUser` extension is
/// already present.
pub async fn require_admin(request: Request, next: Next) -> Result<Response, StatusCode> {
    let is_admin = request
        .extensions()
        .get::<AuthUser>()
        .map(|u| u.is_admin)
        .unwrap_or(false);

    if !is_admin {
        return Err(StatusCode::FORBIDDEN);
    }

    Ok(next.run(request).await)
}

fn decode_token(token: &str, key: &[u8]) -> Result<Claims, jsonwebtoken::errors::Error> {
    let key = DecodingKey::from_secret(key);
    let validation = Validation::new(Algorithm::HS256);
    decode::<Claims>(token, &key, &validation).map(|data| data.claims)
}

fn create_token(
    user_id: &str,
    is_admin: bool,
    signing_key: &[u8],
    ttl_secs: usize,
) -> anyhow::Result<String> {
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as usize;

    let claims = Claims {
        sub: user_id.to_string(),
        admin: is_admin,
        iat: now,
        exp: now + ttl_secs,
    };

    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )?)
}

/// Create a short-lived access token for a user session.
pub fn create_access_token(
    user_id: &str,
    is_admin: bool,
    signing_key: &[u8],
) -> anyhow::Result<String> {
    create_token(user_id, is_admin, signing_key, ACCESS_TOKEN_TTL_SECS)
}

/// Create a long-lived refresh token.
pub fn create_refresh_token(
    user_id: &str,
    is_admin: bool,
    signing_key: &[u8],
) -> anyhow::Result<String> {
    create_token(user_id, is_admin, signing_key, REFRESH_TOKEN_TTL_SECS)
}

/// Verify a refresh token and return its claims.
pub fn verify_refresh_token(token: &str, signing_key: &[u8]) -> Option<Claims> {
    decode_token(token, signing_key).ok()
}

// ─── Password Hashing ────────────────────────────────────────────

/// Hash a password with a fresh random salt.
///
/// Returns `(salt_hex, hash_hex)` for storage on the user record.
pub fn hash_password(password: &str) -> anyhow::Result<(String, String)> {
    let rng = ring::rand::SystemRandom::new();
    let mut salt = [0u8; SALT_LEN];
    rng.fill(&mut salt)
        .map_err(|_| anyhow::anyhow!("Failed to generate salt"))?;

    let mut hash = [0u8; CREDENTIAL_LEN];
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        NonZeroU32::new(PBKDF2_ITERATIONS).expect("iteration count is non-zero"),
        &salt,
        password.as_bytes(),
        &mut hash,
    );

    Ok((hex::encode(salt), hex::encode(hash)))
}

/// Verify a password against a stored salt and hash (constant time).
pub fn verify_password(password: &str, salt_hex: &str, hash_hex: &str) -> bool {
    let (Ok(salt), Ok(hash)) = (hex::decode(salt_hex), hex::decode(hash_hex)) else {
        return false;
    };

    pbkdf2::verify(
        pbkdf2::PBKDF2_HMAC_SHA256,
        NonZeroU32::new(PBKDF2_ITERATIONS).expect("iteration count is non-zero"),
        &salt,
        password.as_bytes(),
        &hash,
    )
    .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_round_trip() {
        let (salt, hash) = hash_password("hunter2!").unwrap();

        assert!(verify_password("hunter2!", &salt, &hash));
        assert!(!verify_password("hunter3!", &salt, &hash));
    }

    #[test]
    fn test_password_salts_are_unique() {
        let (salt_a, hash_a) = hash_password("same-password").unwrap();
        let (salt_b, hash_b) = hash_password("same-password").unwrap();

        assert_ne!(salt_a, salt_b);
        assert_ne!(hash_a, hash_b);
    }

    #[test]
    fn test_verify_rejects_malformed_hex() {
        assert!(!verify_password("pw", "not-hex", "zz"));
    }

    #[test]
    fn test_access_token_round_trip() {
        let key = b"test_access_key_32_bytes_minimum";
        let token = create_access_token("user-1", false, key).unwrap();
        let claims = decode_token(&token, key).unwrap();

        assert_eq!(claims.sub, "user-1");
        assert!(!claims.admin);
    }

    #[test]
    fn test_refresh_token_rejected_by_access_key() {
        let access_key = b"test_access_key_32_bytes_minimum";
        let refresh_key = b"test_refresh_key_32_bytes_minimu";

        let refresh = create_refresh_token("user-1", false, refresh_key).unwrap();

        assert!(decode_token(&refresh, access_key).is_err());
        assert!(verify_refresh_token(&refresh, refresh_key).is_some());
    }

    #[test]
    fn test_admin_claim_survives_round_trip() {
        let key = b"test_access_key_32_bytes_minimum";
        let token = create_access_token("admin-1", true, key).unwrap();
        let claims = decode_token(&token, key).unwrap();

        assert!(claims.admin);
    }
}

//! Application configuration loaded from environment variables.
//!
//! Secrets are read once at startup and cached in memory. In production the
//! deployment platform injects them as environment variables.

use std::env;

/// Name of the Cloud Tasks queue that carries reminder delivery jobs.
pub const REMINDER_QUEUE_NAME: &str = "expiry-reminders";

/// Hour of day (UTC) at which expiry reminders fire.
pub const REMINDER_SEND_HOUR: u32 = 9;

/// Default reminder intervals (days before expiry) when a user has no
/// stored preference.
pub const DEFAULT_REMINDER_INTERVALS: [u32; 4] = [30, 15, 7, 1];

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Frontend URL for CORS
    pub frontend_url: String,
    /// Public URL of this API (queue callbacks are addressed here)
    pub api_url: String,
    /// GCP project ID
    pub gcp_project_id: String,
    /// GCP region (Cloud Tasks queue location)
    pub gcp_region: String,
    /// Server port
    pub port: u16,

    // --- Secrets ---
    /// JWT signing key for access tokens (raw bytes)
    pub jwt_access_key: Vec<u8>,
    /// JWT signing key for refresh tokens (raw bytes)
    pub jwt_refresh_key: Vec<u8>,
    /// FCM server key for push delivery
    pub fcm_server_key: String,
    /// Cloudinary cloud name (public)
    pub cloudinary_cloud_name: String,
    /// Cloudinary API key
    pub cloudinary_api_key: String,
    /// Cloudinary API secret
    pub cloudinary_api_secret: String,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            frontend_url: "http://localhost:3001".to_string(),
            api_url: "http://localhost:8080".to_string(),
            gcp_project_id: "test-project".to_string(),
            gcp_region: "us-central1".to_string(),
            port: 8080,
            jwt_access_key: b"test_access_key_32_bytes_minimum".to_vec(),
            jwt_refresh_key: b"test_refresh_key_32_bytes_minimu".to_vec(),
            fcm_server_key: "test_fcm_server_key".to_string(),
            cloudinary_cloud_name: "test-cloud".to_string(),
            cloudinary_api_key: "test_api_key".to_string(),
            cloudinary_api_secret: "test_api_secret".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// For local development, secrets can be set via a `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            // Non-sensitive config from env
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3001".to_string()),
            api_url: env::var("API_URL").unwrap_or_else(|_| "http://localhost:8080".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            gcp_region: env::var("GCP_REGION").unwrap_or_else(|_| "us-central1".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),

            // Secrets - from env for local dev, injected by the platform in prod
            jwt_access_key: env::var("JWT_ACCESS_KEY")
                .map_err(|_| ConfigError::Missing("JWT_ACCESS_KEY"))?
                .into_bytes(),
            jwt_refresh_key: env::var("JWT_REFRESH_KEY")
                .map_err(|_| ConfigError::Missing("JWT_REFRESH_KEY"))?
                .into_bytes(),
            fcm_server_key: env::var("FCM_SERVER_KEY")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("FCM_SERVER_KEY"))?,
            cloudinary_cloud_name: env::var("CLOUDINARY_CLOUD_NAME")
                .map_err(|_| ConfigError::Missing("CLOUDINARY_CLOUD_NAME"))?,
            cloudinary_api_key: env::var("CLOUDINARY_API_KEY")
                .map_err(|_| ConfigError::Missing("CLOUDINARY_API_KEY"))?,
            cloudinary_api_secret: env::var("CLOUDINARY_API_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("CLOUDINARY_API_SECRET"))?,
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        // Set required env vars for test
        env::set_var("JWT_ACCESS_KEY", "test_access_key_32_bytes_minimum");
        env::set_var("JWT_REFRESH_KEY", "test_refresh_key_32_bytes_minimu");
        env::set_var("FCM_SERVER_KEY", "test_fcm_key");
        env::set_var("CLOUDINARY_CLOUD_NAME", "test-cloud");
        env::set_var("CLOUDINARY_API_KEY", "key");
        env::set_var("CLOUDINARY_API_SECRET", "secret");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.fcm_server_key, "test_fcm_key");
        assert_eq!(config.cloudinary_cloud_name, "test-cloud");
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn test_default_intervals_are_descending() {
        let mut sorted = DEFAULT_REMINDER_INTERVALS.to_vec();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        assert_eq!(sorted, DEFAULT_REMINDER_INTERVALS.to_vec());
    }
}

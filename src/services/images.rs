// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Cloudinary image hosting client.
//!
//! Item photos are uploaded to a per-app folder; the stored record keeps
//! both the delivery URL and the host-side public ID so the photo can be
//! deleted when the item (or just its photo) is removed.

use crate::error::AppError;
use serde::Deserialize;

/// Folder on the image host under which item photos land.
pub const PHOTO_FOLDER: &str = "expiry-tracker";

/// A successfully uploaded image.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub url: String,
    pub public_id: String,
}

/// Cloudinary API client.
#[derive(Clone)]
pub struct ImageService {
    http: reqwest::Client,
    base_url: String,
    cloud_name: String,
    api_key: String,
    api_secret: String,
    /// Offline mode for tests: uploads succeed without network calls.
    offline: bool,
}

#[derive(Deserialize)]
struct UploadResponse {
    secure_url: String,
    public_id: String,
}

impl ImageService {
    pub fn new(cloud_name: String, api_key: String, api_secret: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: "https://api.cloudinary.com/v1_1".to_string(),
            cloud_name,
            api_key,
            api_secret,
            offline: false,
        }
    }

    /// Create an offline client for testing.
    pub fn new_mock() -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: "http://localhost:0".to_string(),
            cloud_name: "mock".to_string(),
            api_key: "mock".to_string(),
            api_secret: "mock".to_string(),
            offline: true,
        }
    }

    /// Upload an image into `folder`, returning its URL and public ID.
    pub async fn upload(&self, bytes: Vec<u8>, folder: &str) -> Result<UploadedImage, AppError> {
        if self.offline {
            let public_id = format!("{}/mock-{}", folder, bytes.len());
            return Ok(UploadedImage {
                url: format!("https://res.cloudinary.com/mock/image/upload/{}", public_id),
                public_id,
            });
        }

        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = self.sign(&[("folder", folder), ("timestamp", &timestamp)]);

        let form = reqwest::multipart::Form::new()
            .part("file", reqwest::multipart::Part::bytes(bytes))
            .text("folder", folder.to_string())
            .text("timestamp", timestamp)
            .text("api_key", self.api_key.clone())
            .text("signature", signature);

        let url = format!("{}/{}/image/upload", self.base_url, self.cloud_name);

        let response = self
            .http
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AppError::ImageHost(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::ImageHost(format!(
                "Upload returned {}: {}",
                status, text
            )));
        }

        let uploaded: UploadResponse = response
            .json()
            .await
            .map_err(|e| AppError::ImageHost(format!("Invalid upload response: {}", e)))?;

        Ok(UploadedImage {
            url: uploaded.secure_url,
            public_id: uploaded.public_id,
        })
    }

    /// Delete an uploaded image by public ID.
    pub async fn delete(&self, public_id: &str) -> Result<(), AppError> {
        if self.offline {
            return Ok(());
        }

        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = self.sign(&[("public_id", public_id), ("timestamp", &timestamp)]);

        let form = reqwest::multipart::Form::new()
            .text("public_id", public_id.to_string())
            .text("timestamp", timestamp)
            .text("api_key", self.api_key.clone())
            .text("signature", signature);

        let url = format!("{}/{}/image/destroy", self.base_url, self.cloud_name);

        let response = self
            .http
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AppError::ImageHost(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AppError::ImageHost(format!(
                "Destroy returned {}",
                response.status()
            )));
        }

        Ok(())
    }

    /// Cloudinary request signature: SHA-1 over the sorted parameter string
    /// with the API secret appended (the provider's required scheme).
    fn sign(&self, params: &[(&str, &str)]) -> String {
        let mut sorted: Vec<&(&str, &str)> = params.iter().collect();
        sorted.sort_by_key(|(k, _)| *k);

        let param_string = sorted
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");

        let payload = format!("{}{}", param_string, self.api_secret);
        let digest = ring::digest::digest(
            &ring::digest::SHA1_FOR_LEGACY_USE_ONLY,
            payload.as_bytes(),
        );
        hex::encode(digest.as_ref())
    }
}

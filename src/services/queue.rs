// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Cloud Tasks queue wrapper for delayed reminder delivery.
//!
//! Every delivery job is a named task: the task ID is the deterministic
//! reminder key, so re-submitting the same reminder is a no-op at the
//! queue layer (ALREADY_EXISTS is treated as success). Delivery fires as
//! an HTTP POST back to `/tasks/send-reminder` at the scheduled time.
//!
//! Uses the official google-cloud-tasks-v2 SDK.

use crate::error::AppError;
use crate::error::Result;
use crate::models::ItemType;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Payload delivered to the `/tasks/send-reminder` worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderJobPayload {
    /// Deterministic reminder key (also the queue task ID)
    pub reminder_id: String,
    pub user_id: String,
    /// None for broadcast reminders
    pub item_id: Option<String>,
    pub item_type: Option<ItemType>,
    pub item_name: String,
    pub expiry_date: Option<NaiveDate>,
    pub offset_days: Option<u32>,
}

/// Cloud Tasks client wrapper.
pub struct ReminderQueue {
    project_id: String,
    location: String,
    queue_name: String,
    /// Offline mode for testing: submissions succeed without network calls.
    offline: bool,
    /// Mock: reminder keys that should fail when queued (test builds only).
    #[cfg(test)]
    mock_fail_keys: std::sync::Mutex<std::collections::HashSet<String>>,
}

impl ReminderQueue {
    pub fn new(project_id: &str, region: &str) -> Self {
        Self {
            project_id: project_id.to_string(),
            location: region.to_string(),
            queue_name: crate::config::REMINDER_QUEUE_NAME.to_string(),
            offline: false,
            #[cfg(test)]
            mock_fail_keys: std::sync::Mutex::new(std::collections::HashSet::new()),
        }
    }

    /// Create an offline queue for testing. Submissions and cancellations
    /// succeed without touching Cloud Tasks.
    pub fn new_mock() -> Self {
        Self {
            project_id: "test-project".to_string(),
            location: "us-central1".to_string(),
            queue_name: crate::config::REMINDER_QUEUE_NAME.to_string(),
            offline: true,
            #[cfg(test)]
            mock_fail_keys: std::sync::Mutex::new(std::collections::HashSet::new()),
        }
    }

    /// Set reminder keys that should fail when queued (test builds only).
    #[cfg(test)]
    pub fn set_mock_fail_keys(&self, keys: impl IntoIterator<Item = String>) {
        let mut guard = self.mock_fail_keys.lock().unwrap();
        guard.clear();
        guard.extend(keys);
    }

    fn queue_path(&self) -> String {
        format!(
            "projects/{}/locations/{}/queues/{}",
            self.project_id, self.location, self.queue_name
        )
    }

    fn task_path(&self, reminder_id: &str) -> String {
        format!("{}/tasks/{}", self.queue_path(), reminder_id)
    }

    /// Submit a delivery task for a reminder, due at `fire_at`.
    ///
    /// Idempotent: if a task with this reminder key already exists, the
    /// submission reports success without creating a duplicate.
    pub async fn submit_reminder(
        &self,
        service_url: &str,
        payload: &ReminderJobPayload,
        fire_at: DateTime<Utc>,
    ) -> Result<()> {
        use google_cloud_tasks_v2::client::CloudTasks;
        use google_cloud_tasks_v2::model::{HttpRequest, OidcToken, Task};

        #[cfg(test)]
        {
            let should_fail = self
                .mock_fail_keys
                .lock()
                .unwrap()
                .contains(&payload.reminder_id);
            if should_fail {
                return Err(AppError::Queue(format!(
                    "Mock failure for reminder {}",
                    payload.reminder_id
                )));
            }
        }

        if self.offline {
            return Ok(());
        }

        let client = CloudTasks::builder()
            .build()
            .await
            .map_err(|e| AppError::Queue(format!("Cloud Tasks client error: {}", e)))?;

        let body = serde_json::to_vec(payload)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("JSON error: {}", e)))?;

        let http_request = HttpRequest::default()
            .set_url(format!("{}/tasks/send-reminder", service_url))
            .set_http_method("POST")
            .set_body(axum::body::Bytes::from(body))
            .set_headers(std::collections::HashMap::from([(
                "Content-Type".to_string(),
                "application/json".to_string(),
            )]))
            .set_oidc_token(
                OidcToken::default()
                    .set_service_account_email(format!(
                        "expiry-tracker-api@{}.iam.gserviceaccount.com",
                        self.project_id
                    ))
                    .set_audience(service_url.to_string()),
            );

        let schedule_time = google_cloud_wkt::Timestamp::try_from(fire_at)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Timestamp error: {}", e)))?;

        let task = Task::default()
            .set_name(self.task_path(&payload.reminder_id))
            .set_http_request(http_request)
            .set_schedule_time(schedule_time);

        match client
            .create_task()
            .set_parent(self.queue_path())
            .set_task(task)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if is_code(&e, google_cloud_gax::error::rpc::Code::AlreadyExists) => {
                tracing::debug!(
                    reminder_id = %payload.reminder_id,
                    "Task already queued (idempotent skip)"
                );
                Ok(())
            }
            Err(e) => Err(AppError::Queue(format!("Cloud Tasks create error: {}", e))),
        }
    }

    /// Cancel the queued task for a reminder key, if it is still queued.
    ///
    /// Best-effort: a task already dequeued for delivery may still fire.
    /// A missing task (already fired, or never created) is not an error.
    pub async fn cancel_reminder(&self, reminder_id: &str) -> Result<()> {
        use google_cloud_tasks_v2::client::CloudTasks;

        if self.offline {
            return Ok(());
        }

        let client = CloudTasks::builder()
            .build()
            .await
            .map_err(|e| AppError::Queue(format!("Cloud Tasks client error: {}", e)))?;

        match client
            .delete_task()
            .set_name(self.task_path(reminder_id))
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if is_code(&e, google_cloud_gax::error::rpc::Code::NotFound) => {
                tracing::debug!(reminder_id, "Task not found on cancel (already fired?)");
                Ok(())
            }
            Err(e) => Err(AppError::Queue(format!("Cloud Tasks delete error: {}", e))),
        }
    }

    /// Count tasks currently queued (waiting or delayed).
    ///
    /// Pages through the task list; used only by the admin dashboard.
    pub async fn count_pending_tasks(&self) -> Result<u32> {
        use google_cloud_tasks_v2::client::CloudTasks;

        if self.offline {
            return Ok(0);
        }

        let client = CloudTasks::builder()
            .build()
            .await
            .map_err(|e| AppError::Queue(format!("Cloud Tasks client error: {}", e)))?;

        let mut count = 0u32;
        let mut page_token = String::new();

        loop {
            let response = client
                .list_tasks()
                .set_parent(self.queue_path())
                .set_page_token(page_token.clone())
                .send()
                .await
                .map_err(|e| AppError::Queue(format!("Cloud Tasks list error: {}", e)))?;

            count += response.tasks.len() as u32;

            if response.next_page_token.is_empty() {
                break;
            }
            page_token = response.next_page_token;
        }

        Ok(count)
    }
}

/// Match a gax error against a specific RPC status code.
fn is_code(err: &google_cloud_gax::error::Error, code: google_cloud_gax::error::rpc::Code) -> bool {
    err.status().map(|s| s.code == code).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_path_uses_reminder_key() {
        let queue = ReminderQueue::new("test-project", "us-central1");

        assert_eq!(
            queue.task_path("expiry-item1-7"),
            "projects/test-project/locations/us-central1/queues/expiry-reminders/tasks/expiry-item1-7"
        );
    }

    #[test]
    fn test_queue_path() {
        let queue = ReminderQueue::new("test-project", "europe-west1");

        assert_eq!(
            queue.queue_path(),
            "projects/test-project/locations/europe-west1/queues/expiry-reminders"
        );
    }

    #[tokio::test]
    async fn test_mock_failure_short_circuits() {
        let queue = ReminderQueue::new("test-project", "us-central1");
        queue.set_mock_fail_keys(["expiry-item1-7".to_string()]);

        let payload = ReminderJobPayload {
            reminder_id: "expiry-item1-7".to_string(),
            user_id: "u1".to_string(),
            item_id: Some("item1".to_string()),
            item_type: Some(ItemType::Food),
            item_name: "Milk".to_string(),
            expiry_date: NaiveDate::from_ymd_opt(2026, 8, 13),
            offset_days: Some(7),
        };

        let result = queue
            .submit_reminder("http://localhost", &payload, Utc::now())
            .await;

        assert!(matches!(result, Err(AppError::Queue(_))));
    }

    #[test]
    fn test_set_mock_fail_keys_clears_previous() {
        let queue = ReminderQueue::new("test-project", "us-central1");

        queue.set_mock_fail_keys(["a".to_string(), "b".to_string()]);
        queue.set_mock_fail_keys(["c".to_string()]);

        let guard = queue.mock_fail_keys.lock().unwrap();
        assert!(!guard.contains("a"));
        assert!(!guard.contains("b"));
        assert!(guard.contains("c"));
    }
}

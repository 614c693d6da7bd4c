// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Admin routes: dashboard stats, user listing, broadcast notifications.
//!
//! All routes here sit behind `require_auth` + `require_admin`.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use validator::Validate;

use crate::error::{AppError, Result};
use crate::models::{ItemStats, ReminderStatus, User};
use crate::time_utils::{format_utc_rfc3339, parse_rfc3339};
use crate::AppState;

/// A user counts as recently active within this window.
const ACTIVE_WINDOW_DAYS: i64 = 7;
/// A user counts as inactive after this long without a login.
const INACTIVE_WINDOW_DAYS: i64 = 30;

const DEFAULT_USER_PAGE_SIZE: u32 = 50;
const MAX_USER_PAGE_SIZE: u32 = 200;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/stats", get(dashboard_stats))
        .route("/admin/users", get(list_users))
        .route("/admin/broadcast", post(broadcast))
}

// ─── Dashboard Stats ─────────────────────────────────────────────

#[derive(Serialize)]
pub struct UserStatsSection {
    pub total: u32,
    pub active: u32,
    pub inactive: u32,
    pub premium: u32,
    pub premium_percentage: f64,
}

#[derive(Serialize)]
pub struct NotificationStatsSection {
    pub sent_today: u32,
    pub sent_this_week: u32,
    pub failed_today: u32,
    /// Percentage of today's finished deliveries that succeeded
    pub delivery_rate: f64,
}

#[derive(Serialize)]
pub struct GrowthStatsSection {
    pub new_users_today: u32,
    pub new_users_this_week: u32,
    pub new_users_this_month: u32,
}

#[derive(Serialize)]
pub struct DashboardStatsResponse {
    pub users: UserStatsSection,
    pub items: ItemStats,
    pub notifications: NotificationStatsSection,
    pub growth: GrowthStatsSection,
    /// Tasks currently queued for delivery (0 if the queue is unreachable)
    pub queue_depth: u32,
}

fn last_login_within(user: &User, cutoff: DateTime<Utc>) -> bool {
    user.last_login_at
        .as_deref()
        .and_then(parse_rfc3339)
        .map(|ts| ts >= cutoff)
        .unwrap_or(false)
}

/// A user is inactive when they have never logged in, or not within the
/// inactive window.
fn is_inactive(user: &User, now: DateTime<Utc>) -> bool {
    !last_login_within(user, now - Duration::days(INACTIVE_WINDOW_DAYS))
}

fn created_since(user: &User, cutoff: DateTime<Utc>) -> bool {
    parse_rfc3339(&user.created_at)
        .map(|ts| ts >= cutoff)
        .unwrap_or(false)
}

/// Aggregate platform-wide dashboard statistics.
async fn dashboard_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DashboardStatsResponse>> {
    let now = Utc::now();
    let today_start = now.date_naive().and_hms_opt(0, 0, 0).unwrap().and_utc();
    let week_ago = today_start - Duration::days(7);
    let month_ago = today_start - Duration::days(30);

    let users = state.db.list_users().await?;
    let all_items = state.db.list_all_items().await?;

    let total_users = users.len() as u32;
    let active = users
        .iter()
        .filter(|u| last_login_within(u, now - Duration::days(ACTIVE_WINDOW_DAYS)))
        .count() as u32;
    let inactive = users.iter().filter(|u| is_inactive(u, now)).count() as u32;
    let premium = users.iter().filter(|u| u.is_premium).count() as u32;
    let premium_percentage = if total_users > 0 {
        (premium as f64 / total_users as f64) * 100.0
    } else {
        0.0
    };

    let items = ItemStats::tally(&all_items, now.date_naive());

    // Delivery stats over the last week of scheduled reminders
    let recent = state
        .db
        .list_reminders_scheduled_since(&format_utc_rfc3339(week_ago))
        .await?;

    let sent_since = |cutoff: DateTime<Utc>| {
        recent
            .iter()
            .filter(|r| r.status == ReminderStatus::Sent)
            .filter(|r| {
                r.sent_at
                    .as_deref()
                    .and_then(parse_rfc3339)
                    .map(|ts| ts >= cutoff)
                    .unwrap_or(false)
            })
            .count() as u32
    };
    let sent_today = sent_since(today_start);
    let sent_this_week = sent_since(week_ago);
    let failed_today = recent
        .iter()
        .filter(|r| r.status == ReminderStatus::Failed)
        .filter(|r| {
            parse_rfc3339(&r.scheduled_for)
                .map(|ts| ts >= today_start)
                .unwrap_or(false)
        })
        .count() as u32;

    let finished_today = sent_today + failed_today;
    let delivery_rate = if finished_today > 0 {
        ((sent_today as f64 / finished_today as f64) * 1000.0).round() / 10.0
    } else {
        100.0
    };

    // Queue depth is best-effort; the dashboard should render without it
    let queue_depth = match state.queue.count_pending_tasks().await {
        Ok(count) => count,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read queue depth");
            0
        }
    };

    Ok(Json(DashboardStatsResponse {
        users: UserStatsSection {
            total: total_users,
            active,
            inactive,
            premium,
            premium_percentage,
        },
        items,
        notifications: NotificationStatsSection {
            sent_today,
            sent_this_week,
            failed_today,
            delivery_rate,
        },
        growth: GrowthStatsSection {
            new_users_today: users.iter().filter(|u| created_since(u, today_start)).count() as u32,
            new_users_this_week: users.iter().filter(|u| created_since(u, week_ago)).count() as u32,
            new_users_this_month: users.iter().filter(|u| created_since(u, month_ago)).count()
                as u32,
        },
        queue_depth,
    }))
}

// ─── User Listing ────────────────────────────────────────────────

#[derive(Deserialize)]
struct UsersQuery {
    /// "active", "inactive" or "all" (default)
    status: Option<String>,
    /// "free", "premium" or "all" (default)
    plan: Option<String>,
    /// Case-insensitive substring over email and names
    search: Option<String>,
    /// Continue after this user ID (from a previous page)
    cursor: Option<String>,
    limit: Option<u32>,
}

#[derive(Serialize)]
pub struct AdminUserRow {
    pub id: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_premium: bool,
    pub is_active: bool,
    pub item_count: u32,
    pub last_login_at: Option<String>,
    pub created_at: String,
}

#[derive(Serialize)]
pub struct UsersPagination {
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

#[derive(Serialize)]
pub struct UsersResponse {
    pub users: Vec<AdminUserRow>,
    pub pagination: UsersPagination,
}

/// Cursor-paginated user listing with status/plan/search filters.
async fn list_users(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UsersQuery>,
) -> Result<Json<UsersResponse>> {
    let now = Utc::now();
    let limit = params
        .limit
        .unwrap_or(DEFAULT_USER_PAGE_SIZE)
        .clamp(1, MAX_USER_PAGE_SIZE);

    let mut users = state.db.list_users().await?;

    match params.status.as_deref().unwrap_or("all") {
        "active" => {
            users.retain(|u| last_login_within(u, now - Duration::days(ACTIVE_WINDOW_DAYS)))
        }
        "inactive" => users.retain(|u| is_inactive(u, now)),
        "all" => {}
        other => {
            return Err(AppError::BadRequest(format!(
                "Unknown status filter: {}",
                other
            )))
        }
    }

    match params.plan.as_deref().unwrap_or("all") {
        "premium" => users.retain(|u| u.is_premium),
        "free" => users.retain(|u| !u.is_premium),
        "all" => {}
        other => {
            return Err(AppError::BadRequest(format!(
                "Unknown plan filter: {}",
                other
            )))
        }
    }

    if let Some(search) = &params.search {
        let needle = search.to_lowercase();
        users.retain(|u| {
            u.email.to_lowercase().contains(&needle)
                || u.first_name
                    .as_deref()
                    .map(|n| n.to_lowercase().contains(&needle))
                    .unwrap_or(false)
                || u.last_name
                    .as_deref()
                    .map(|n| n.to_lowercase().contains(&needle))
                    .unwrap_or(false)
        });
    }

    // Newest accounts first; ties broken by ID for a stable cursor order
    users.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });

    if let Some(cursor) = &params.cursor {
        match users.iter().position(|u| &u.id == cursor) {
            Some(position) => {
                users.drain(..=position);
            }
            None => {
                return Err(AppError::BadRequest("Invalid 'cursor' parameter".to_string()));
            }
        }
    }

    let has_more = users.len() > limit as usize;
    users.truncate(limit as usize);
    let next_cursor = if has_more {
        users.last().map(|u| u.id.clone())
    } else {
        None
    };

    // Item counts per user in one pass over the items collection
    let all_items = state.db.list_all_items().await?;
    let mut counts: HashMap<&str, u32> = HashMap::new();
    for item in &all_items {
        *counts.entry(item.user_id.as_str()).or_insert(0) += 1;
    }

    let rows = users
        .iter()
        .map(|u| AdminUserRow {
            id: u.id.clone(),
            email: u.email.clone(),
            first_name: u.first_name.clone(),
            last_name: u.last_name.clone(),
            is_premium: u.is_premium,
            is_active: u.is_active,
            item_count: counts.get(u.id.as_str()).copied().unwrap_or(0),
            last_login_at: u.last_login_at.clone(),
            created_at: u.created_at.clone(),
        })
        .collect();

    Ok(Json(UsersResponse {
        users: rows,
        pagination: UsersPagination {
            next_cursor,
            has_more,
        },
    }))
}

// ─── Broadcast ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetAudience {
    All,
    Premium,
    Free,
    Inactive,
}

#[derive(Deserialize, Validate)]
pub struct BroadcastRequest {
    #[validate(length(min = 1, max = 100))]
    title: String,
    #[validate(length(min = 1, max = 500))]
    body: String,
    target_audience: TargetAudience,
    /// RFC3339 moment to deliver at; immediate when absent
    schedule_for: Option<String>,
}

#[derive(Serialize)]
pub struct BroadcastResponse {
    pub message: String,
    pub target_user_count: u32,
    pub broadcast_id: String,
}

/// Resolve the user IDs in a broadcast audience.
fn resolve_audience(users: &[User], audience: TargetAudience, now: DateTime<Utc>) -> Vec<String> {
    users
        .iter()
        .filter(|u| match audience {
            TargetAudience::All => u.is_active,
            TargetAudience::Premium => u.is_active && u.is_premium,
            TargetAudience::Free => u.is_active && !u.is_premium,
            // Inactivity is about logins, not the account flag
            TargetAudience::Inactive => is_inactive(u, now),
        })
        .map(|u| u.id.clone())
        .collect()
}

/// Fan a message out to a user segment via the reminder pipeline.
///
/// An empty segment is a successful no-op with `target_user_count` 0.
async fn broadcast(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BroadcastRequest>,
) -> Result<(StatusCode, Json<BroadcastResponse>)> {
    request.validate()?;

    let fire_at = match &request.schedule_for {
        Some(raw) => parse_rfc3339(raw).ok_or_else(|| {
            AppError::BadRequest("Invalid 'schedule_for': must be RFC3339 datetime".to_string())
        })?,
        None => Utc::now(),
    };

    let users = state.db.list_users().await?;
    let target_user_ids = resolve_audience(&users, request.target_audience, Utc::now());
    let broadcast_id = format!("broadcast-{}", uuid::Uuid::new_v4());

    let queued = state
        .scheduler
        .broadcast(
            &broadcast_id,
            &request.title,
            &request.body,
            &target_user_ids,
            fire_at,
        )
        .await?;

    tracing::info!(
        broadcast_id = %broadcast_id,
        audience = ?request.target_audience,
        targets = target_user_ids.len(),
        queued,
        "Broadcast dispatched"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(BroadcastResponse {
            message: "Broadcast notification queued successfully".to_string(),
            target_user_count: target_user_ids.len() as u32,
            broadcast_id,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time_utils::now_rfc3339;

    fn user(id: &str, active: bool, premium: bool, last_login: Option<String>) -> User {
        User {
            id: id.to_string(),
            email: format!("{}@example.com", id),
            password_hash: String::new(),
            password_salt: String::new(),
            first_name: None,
            last_name: None,
            is_active: active,
            is_admin: false,
            is_premium: premium,
            last_login_at: last_login,
            password_reset_digest: None,
            password_reset_expiry: None,
            created_at: now_rfc3339(),
        }
    }

    #[test]
    fn test_resolve_audience_segments() {
        let now = Utc::now();
        let recent = Some(format_utc_rfc3339(now - Duration::hours(1)));
        let stale = Some(format_utc_rfc3339(now - Duration::days(60)));

        let users = vec![
            user("premium-1", true, true, recent.clone()),
            user("free-1", true, false, recent.clone()),
            user("dormant-1", true, false, stale),
            user("never-logged-in", true, false, None),
            user("deactivated", false, true, recent),
        ];

        assert_eq!(resolve_audience(&users, TargetAudience::All, now).len(), 4);
        assert_eq!(
            resolve_audience(&users, TargetAudience::Premium, now),
            vec!["premium-1".to_string()]
        );
        assert_eq!(
            resolve_audience(&users, TargetAudience::Free, now).len(),
            3
        );
        assert_eq!(
            resolve_audience(&users, TargetAudience::Inactive, now),
            vec!["dormant-1".to_string(), "never-logged-in".to_string()]
        );
    }

    #[test]
    fn test_resolve_audience_empty_segment() {
        let now = Utc::now();
        let users = vec![user("free-1", true, false, None)];

        let premium = resolve_audience(&users, TargetAudience::Premium, now);
        assert!(premium.is_empty());
    }

    #[test]
    fn test_is_inactive_requires_recent_login() {
        let now = Utc::now();

        let fresh = user(
            "fresh",
            true,
            false,
            Some(format_utc_rfc3339(now - Duration::days(2))),
        );
        let stale = user(
            "stale",
            true,
            false,
            Some(format_utc_rfc3339(now - Duration::days(45))),
        );
        let never = user("never", true, false, None);

        assert!(!is_inactive(&fresh, now));
        assert!(is_inactive(&stale, now));
        assert!(is_inactive(&never, now));
    }
}

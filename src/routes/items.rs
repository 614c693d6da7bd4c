// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Item routes: CRUD, listing with filters, expiring view, stats, photos.
//!
//! All routes require authentication; every item access is checked against
//! the owning user. Reminder scheduling rides along item writes as a
//! best-effort side channel: a scheduling failure is logged, never
//! surfaced as a CRUD failure.

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{
    DocumentType, FoodCategory, Item, ItemKind, ItemStats, ItemType, Photo, StorageType,
};
use crate::services::images::PHOTO_FOLDER;
use crate::time_utils::now_rfc3339;
use crate::AppState;

const MAX_PHOTO_BYTES: usize = 5 * 1024 * 1024;
const ALLOWED_PHOTO_TYPES: [&str; 4] = ["image/jpeg", "image/jpg", "image/png", "image/webp"];

const MAX_PER_PAGE: u32 = 100;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/items/food", post(create_food))
        .route("/items/document", post(create_document))
        .route("/items", get(list_items))
        .route("/items/expiring", get(get_expiring))
        .route("/items/stats", get(get_stats))
        .route(
            "/items/{type}/{id}",
            get(get_item).patch(update_item).delete(delete_item),
        )
        .route(
            "/items/{type}/{id}/photo",
            post(upload_photo)
                .delete(delete_photo)
                .layer(DefaultBodyLimit::max(MAX_PHOTO_BYTES + 1024 * 1024)),
        )
}

// ─── Request / Response Types ────────────────────────────────────

#[derive(Deserialize, Validate)]
pub struct CreateFoodRequest {
    #[validate(length(min = 1, max = 200))]
    name: String,
    category: FoodCategory,
    storage: StorageType,
    expiry_date: NaiveDate,
    #[validate(length(max = 50))]
    quantity: Option<String>,
    #[validate(length(max = 2000))]
    notes: Option<String>,
}

#[derive(Deserialize, Validate)]
pub struct CreateDocumentRequest {
    #[validate(length(min = 1, max = 200))]
    name: String,
    document_type: DocumentType,
    #[validate(length(max = 100))]
    custom_type: Option<String>,
    #[validate(length(max = 100))]
    document_number: Option<String>,
    issued_date: Option<NaiveDate>,
    expiry_date: NaiveDate,
    #[validate(length(max = 2000))]
    notes: Option<String>,
}

#[derive(Deserialize, Validate)]
pub struct UpdateFoodRequest {
    #[validate(length(min = 1, max = 200))]
    name: Option<String>,
    category: Option<FoodCategory>,
    storage: Option<StorageType>,
    expiry_date: Option<NaiveDate>,
    #[validate(length(max = 50))]
    quantity: Option<String>,
    #[validate(length(max = 2000))]
    notes: Option<String>,
}

#[derive(Deserialize, Validate)]
pub struct UpdateDocumentRequest {
    #[validate(length(min = 1, max = 200))]
    name: Option<String>,
    document_type: Option<DocumentType>,
    #[validate(length(max = 100))]
    custom_type: Option<String>,
    #[validate(length(max = 100))]
    document_number: Option<String>,
    issued_date: Option<NaiveDate>,
    expiry_date: Option<NaiveDate>,
    #[validate(length(max = 2000))]
    notes: Option<String>,
}

#[derive(Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
enum SortBy {
    ExpiryDate,
    CreatedAt,
    Name,
}

#[derive(Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum SortOrder {
    Asc,
    Desc,
}

#[derive(Deserialize)]
struct ItemsQuery {
    /// Filter by item type ("food" / "document")
    #[serde(rename = "type")]
    item_type: Option<String>,
    /// Filter food items by category
    category: Option<FoodCategory>,
    /// Case-insensitive name substring
    search: Option<String>,
    expiring_before: Option<NaiveDate>,
    expiring_after: Option<NaiveDate>,
    #[serde(default = "default_page")]
    page: u32,
    #[serde(default = "default_limit")]
    limit: u32,
    sort_by: Option<SortBy>,
    sort_order: Option<SortOrder>,
}

fn default_page() -> u32 {
    1
}
fn default_limit() -> u32 {
    20
}

#[derive(Serialize)]
pub struct ItemsResponse {
    pub items: Vec<Item>,
    pub total: u32,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
}

#[derive(Deserialize)]
struct ExpiringQuery {
    /// Lookahead window in days
    days: Option<i64>,
}

#[derive(Serialize)]
pub struct ExpiringResponse {
    pub items: Vec<Item>,
}

// ─── Create ──────────────────────────────────────────────────────

/// Create a food item and schedule its expiry reminders.
async fn create_food(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<CreateFoodRequest>,
) -> Result<(StatusCode, Json<Item>)> {
    request.validate()?;

    let now = now_rfc3339();
    let item = Item {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: user.user_id.clone(),
        name: request.name,
        expiry_date: request.expiry_date,
        notes: request.notes,
        photo: None,
        created_at: now.clone(),
        updated_at: now,
        kind: ItemKind::Food {
            category: request.category,
            storage: request.storage,
            quantity: request.quantity,
        },
    };

    state.db.set_item(&item).await?;
    schedule_best_effort(&state, &item).await;

    Ok((StatusCode::CREATED, Json(item)))
}

/// Create a document and schedule its expiry reminders.
async fn create_document(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<CreateDocumentRequest>,
) -> Result<(StatusCode, Json<Item>)> {
    request.validate()?;

    let now = now_rfc3339();
    let item = Item {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: user.user_id.clone(),
        name: request.name,
        expiry_date: request.expiry_date,
        notes: request.notes,
        photo: None,
        created_at: now.clone(),
        updated_at: now,
        kind: ItemKind::Document {
            document_type: request.document_type,
            custom_type: request.custom_type,
            document_number: request.document_number,
            issued_date: request.issued_date,
        },
    };

    state.db.set_item(&item).await?;
    schedule_best_effort(&state, &item).await;

    Ok((StatusCode::CREATED, Json(item)))
}

/// Schedule reminders for a fresh item, logging failure instead of
/// surfacing it: the item write has already succeeded.
async fn schedule_best_effort(state: &AppState, item: &Item) {
    if let Err(e) = state
        .scheduler
        .schedule_for_new_item(
            &item.user_id,
            &item.id,
            item.item_type(),
            &item.name,
            item.expiry_date,
        )
        .await
    {
        tracing::warn!(
            item_id = %item.id,
            error = %e,
            "Failed to schedule reminders for new item"
        );
    }
}

// ─── List / Query ────────────────────────────────────────────────

/// List the user's items with filtering, sorting and pagination.
async fn list_items(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<ItemsQuery>,
) -> Result<Json<ItemsResponse>> {
    if params.page < 1 {
        return Err(AppError::BadRequest(
            "Page must be greater than 0".to_string(),
        ));
    }

    let type_filter = params
        .item_type
        .as_deref()
        .map(|raw| {
            ItemType::parse(raw)
                .ok_or_else(|| AppError::BadRequest(format!("Unknown item type: {}", raw)))
        })
        .transpose()?;

    let limit = params.limit.clamp(1, MAX_PER_PAGE);

    let mut items = state.db.list_items_for_user(&user.user_id).await?;

    items.retain(|item| {
        if let Some(wanted) = type_filter {
            if item.item_type() != wanted {
                return false;
            }
        }
        if let Some(category) = params.category {
            match &item.kind {
                ItemKind::Food { category: c, .. } if *c == category => {}
                _ => return false,
            }
        }
        if let Some(search) = &params.search {
            if !item.name.to_lowercase().contains(&search.to_lowercase()) {
                return false;
            }
        }
        if let Some(before) = params.expiring_before {
            if item.expiry_date > before {
                return false;
            }
        }
        if let Some(after) = params.expiring_after {
            if item.expiry_date < after {
                return false;
            }
        }
        true
    });

    let sort_by = params.sort_by.unwrap_or(SortBy::ExpiryDate);
    items.sort_by(|a, b| {
        let ordering = match sort_by {
            SortBy::ExpiryDate => a.expiry_date.cmp(&b.expiry_date),
            SortBy::CreatedAt => a.created_at.cmp(&b.created_at),
            SortBy::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
        };
        match params.sort_order.unwrap_or(SortOrder::Asc) {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });

    let total = items.len() as u32;
    let total_pages = total.div_ceil(limit);

    // Use checked multiplication to prevent overflow and cast to usize safely
    let start = (params.page as usize - 1)
        .checked_mul(limit as usize)
        .ok_or_else(|| AppError::BadRequest("Page number causes overflow".to_string()))?;

    let paged = if start < items.len() {
        let end = start.saturating_add(limit as usize).min(items.len());
        items[start..end].to_vec()
    } else {
        vec![]
    };

    Ok(Json(ItemsResponse {
        items: paged,
        total,
        page: params.page,
        limit,
        total_pages,
    }))
}

/// Items expiring within the next N days (default 7), soonest first.
async fn get_expiring(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<ExpiringQuery>,
) -> Result<Json<ExpiringResponse>> {
    let days = params.days.unwrap_or(7);
    if !(0..=365).contains(&days) {
        return Err(AppError::BadRequest(
            "Days must be between 0 and 365".to_string(),
        ));
    }

    let today = Utc::now().date_naive();
    let mut items = state.db.list_items_for_user(&user.user_id).await?;
    items.retain(|item| item.expires_within(today, days));
    items.sort_by(|a, b| a.expiry_date.cmp(&b.expiry_date));

    Ok(Json(ExpiringResponse { items }))
}

/// Per-user item statistics.
async fn get_stats(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ItemStats>> {
    let items = state.db.list_items_for_user(&user.user_id).await?;
    let stats = ItemStats::tally(&items, Utc::now().date_naive());
    Ok(Json(stats))
}

// ─── Single Item ─────────────────────────────────────────────────

/// Load an item, enforcing ownership and the expected type.
async fn load_owned_item(
    state: &AppState,
    user_id: &str,
    item_id: &str,
    expected_type: ItemType,
) -> Result<Item> {
    let item = state
        .db
        .get_item(item_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Item not found".to_string()))?;

    if item.user_id != user_id {
        return Err(AppError::Forbidden("Access denied".to_string()));
    }

    // An ID of the other type is indistinguishable from a missing item
    if item.item_type() != expected_type {
        return Err(AppError::NotFound("Item not found".to_string()));
    }

    Ok(item)
}

fn parse_type_segment(raw: &str) -> Result<ItemType> {
    ItemType::parse(raw).ok_or_else(|| AppError::BadRequest(format!("Unknown item type: {}", raw)))
}

/// Get a single item.
async fn get_item(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path((item_type, id)): Path<(String, String)>,
) -> Result<Json<Item>> {
    let item_type = parse_type_segment(&item_type)?;
    let item = load_owned_item(&state, &user.user_id, &id, item_type).await?;
    Ok(Json(item))
}

/// Update an item; an expiry-date change triggers rescheduling.
///
/// Dispatches on the path type segment so both variants share one route.
async fn update_item(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path((item_type, id)): Path<(String, String)>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<Item>> {
    match parse_type_segment(&item_type)? {
        ItemType::Food => {
            let request: UpdateFoodRequest = serde_json::from_value(body)
                .map_err(|e| AppError::BadRequest(format!("Invalid request body: {}", e)))?;
            update_food(state, user, id, request).await
        }
        ItemType::Document => {
            let request: UpdateDocumentRequest = serde_json::from_value(body)
                .map_err(|e| AppError::BadRequest(format!("Invalid request body: {}", e)))?;
            update_document(state, user, id, request).await
        }
    }
}

async fn update_food(
    state: Arc<AppState>,
    user: AuthUser,
    id: String,
    request: UpdateFoodRequest,
) -> Result<Json<Item>> {
    request.validate()?;

    let mut item = load_owned_item(&state, &user.user_id, &id, ItemType::Food).await?;
    let old_expiry = item.expiry_date;

    if let Some(name) = request.name {
        item.name = name;
    }
    if let Some(expiry_date) = request.expiry_date {
        item.expiry_date = expiry_date;
    }
    if request.notes.is_some() {
        item.notes = request.notes;
    }
    if let ItemKind::Food {
        category,
        storage,
        quantity,
    } = &mut item.kind
    {
        if let Some(new_category) = request.category {
            *category = new_category;
        }
        if let Some(new_storage) = request.storage {
            *storage = new_storage;
        }
        if request.quantity.is_some() {
            *quantity = request.quantity;
        }
    }
    item.updated_at = now_rfc3339();

    state.db.set_item(&item).await?;
    reschedule_if_expiry_changed(&state, &item, old_expiry).await;

    Ok(Json(item))
}

async fn update_document(
    state: Arc<AppState>,
    user: AuthUser,
    id: String,
    request: UpdateDocumentRequest,
) -> Result<Json<Item>> {
    request.validate()?;

    let mut item = load_owned_item(&state, &user.user_id, &id, ItemType::Document).await?;
    let old_expiry = item.expiry_date;

    if let Some(name) = request.name {
        item.name = name;
    }
    if let Some(expiry_date) = request.expiry_date {
        item.expiry_date = expiry_date;
    }
    if request.notes.is_some() {
        item.notes = request.notes;
    }
    if let ItemKind::Document {
        document_type,
        custom_type,
        document_number,
        issued_date,
    } = &mut item.kind
    {
        if let Some(new_type) = request.document_type {
            *document_type = new_type;
        }
        if request.custom_type.is_some() {
            *custom_type = request.custom_type;
        }
        if request.document_number.is_some() {
            *document_number = request.document_number;
        }
        if request.issued_date.is_some() {
            *issued_date = request.issued_date;
        }
    }
    item.updated_at = now_rfc3339();

    state.db.set_item(&item).await?;
    reschedule_if_expiry_changed(&state, &item, old_expiry).await;

    Ok(Json(item))
}

/// Reschedule reminders after an expiry-date edit, logging failure
/// instead of surfacing it.
async fn reschedule_if_expiry_changed(state: &AppState, item: &Item, old_expiry: NaiveDate) {
    if item.expiry_date == old_expiry {
        return;
    }

    if let Err(e) = state
        .scheduler
        .reschedule_for_edited_item(
            &item.user_id,
            &item.id,
            item.item_type(),
            &item.name,
            item.expiry_date,
        )
        .await
    {
        tracing::warn!(
            item_id = %item.id,
            error = %e,
            "Failed to reschedule reminders after expiry change"
        );
    }
}

/// Delete an item, cancelling its pending reminders and removing its
/// photo from the image host.
async fn delete_item(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path((item_type, id)): Path<(String, String)>,
) -> Result<StatusCode> {
    let item_type = parse_type_segment(&item_type)?;
    let item = load_owned_item(&state, &user.user_id, &id, item_type).await?;

    if let Err(e) = state.scheduler.cancel_all_for_item(&item.id).await {
        tracing::warn!(
            item_id = %item.id,
            error = %e,
            "Failed to cancel reminders during item deletion"
        );
    }

    if let Some(photo) = &item.photo {
        if let Err(e) = state.image_service.delete(&photo.public_id).await {
            tracing::warn!(
                item_id = %item.id,
                error = %e,
                "Failed to delete photo from image host"
            );
        }
    }

    state.db.delete_item(&item.id).await?;

    tracing::info!(item_id = %item.id, user_id = %user.user_id, "Item deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ─── Photos ──────────────────────────────────────────────────────

/// Upload an item photo (multipart field "photo").
async fn upload_photo(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path((item_type, id)): Path<(String, String)>,
    mut multipart: Multipart,
) -> Result<Json<Item>> {
    let item_type = parse_type_segment(&item_type)?;
    let mut item = load_owned_item(&state, &user.user_id, &id, item_type).await?;

    let mut upload: Option<(Vec<u8>, String)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() == Some("photo") {
            let content_type = field.content_type().unwrap_or("").to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(format!("Failed to read upload: {}", e)))?;
            upload = Some((data.to_vec(), content_type));
            break;
        }
    }

    let (bytes, content_type) =
        upload.ok_or_else(|| AppError::BadRequest("No file uploaded".to_string()))?;

    if !ALLOWED_PHOTO_TYPES.contains(&content_type.as_str()) {
        return Err(AppError::BadRequest(
            "Only JPEG, PNG, and WebP images are allowed".to_string(),
        ));
    }
    if bytes.len() > MAX_PHOTO_BYTES {
        return Err(AppError::BadRequest(
            "File size must be less than 5MB".to_string(),
        ));
    }

    // Replace any previous photo on the host
    if let Some(old) = &item.photo {
        if let Err(e) = state.image_service.delete(&old.public_id).await {
            tracing::warn!(
                item_id = %item.id,
                error = %e,
                "Failed to delete replaced photo"
            );
        }
    }

    let uploaded = state.image_service.upload(bytes, PHOTO_FOLDER).await?;
    item.photo = Some(Photo {
        url: uploaded.url,
        public_id: uploaded.public_id,
    });
    item.updated_at = now_rfc3339();
    state.db.set_item(&item).await?;

    Ok(Json(item))
}

/// Remove an item's photo from the host and the record.
async fn delete_photo(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path((item_type, id)): Path<(String, String)>,
) -> Result<StatusCode> {
    let item_type = parse_type_segment(&item_type)?;
    let mut item = load_owned_item(&state, &user.user_id, &id, item_type).await?;

    if let Some(photo) = item.photo.take() {
        state.image_service.delete(&photo.public_id).await?;
        item.updated_at = now_rfc3339();
        state.db.set_item(&item).await?;
    }

    Ok(StatusCode::NO_CONTENT)
}

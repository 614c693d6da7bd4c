// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Trackable item model: a shared envelope with a food/document variant.
//!
//! The reminder pipeline only ever touches the envelope fields (id, owner,
//! name, expiry date); the variant payload is for the item CRUD surface.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// The two kinds of trackable items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemType {
    Food,
    Document,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Food => "FOOD",
            ItemType::Document => "DOCUMENT",
        }
    }

    /// Parse a case-insensitive path segment ("food", "DOCUMENT", ...).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "FOOD" => Some(ItemType::Food),
            "DOCUMENT" => Some(ItemType::Document),
            _ => None,
        }
    }
}

impl std::fmt::Display for ItemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Food categories (from the mobile app's picker).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FoodCategory {
    Dairy,
    Meat,
    Seafood,
    Vegetables,
    Fruits,
    Grains,
    Beverages,
    Condiments,
    Frozen,
    Other,
}

/// Where a food item is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StorageType {
    Refrigerator,
    Freezer,
    Pantry,
    Counter,
}

/// Document categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentType {
    Passport,
    Visa,
    DriversLicense,
    IdCard,
    InsurancePolicy,
    Membership,
    Custom,
}

/// Photo reference on the external image host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Photo {
    /// Public delivery URL
    pub url: String,
    /// Host-side ID, needed for deletion
    pub public_id: String,
}

/// Type-specific payload, tagged so both variants share one collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemKind {
    Food {
        category: FoodCategory,
        storage: StorageType,
        quantity: Option<String>,
    },
    Document {
        document_type: DocumentType,
        custom_type: Option<String>,
        document_number: Option<String>,
        issued_date: Option<NaiveDate>,
    },
}

impl ItemKind {
    pub fn item_type(&self) -> ItemType {
        match self {
            ItemKind::Food { .. } => ItemType::Food,
            ItemKind::Document { .. } => ItemType::Document,
        }
    }
}

/// Stored item record in Firestore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    /// UUID (also used as document ID)
    pub id: String,
    /// Owning user ID
    pub user_id: String,
    /// Display name
    pub name: String,
    /// Expiry date (date only; reminders fire at a fixed hour)
    pub expiry_date: NaiveDate,
    /// Free-form notes
    pub notes: Option<String>,
    /// Photo on the image host, if uploaded
    pub photo: Option<Photo>,
    /// When the item was created (ISO 8601)
    pub created_at: String,
    /// Last update (ISO 8601)
    pub updated_at: String,
    /// Type-specific payload
    #[serde(flatten)]
    pub kind: ItemKind,
}

impl Item {
    pub fn item_type(&self) -> ItemType {
        self.kind.item_type()
    }

    /// Whether the item's expiry date is strictly before `today`.
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.expiry_date < today
    }

    /// Whether the item expires within `days` days of `today` (inclusive),
    /// not counting already-expired items.
    pub fn expires_within(&self, today: NaiveDate, days: i64) -> bool {
        !self.is_expired(today) && (self.expiry_date - today).num_days() <= days
    }
}

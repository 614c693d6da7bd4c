//! Per-user item statistics for the dashboard.
//!
//! Item counts per user are small, so stats are tallied from the user's
//! item list at request time rather than maintained as a stored aggregate.

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{Item, ItemType};

/// How far ahead an item counts as "expiring soon".
pub const EXPIRING_SOON_DAYS: i64 = 7;

/// Tallied statistics over a user's items.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ItemStats {
    pub total: u32,
    pub total_food: u32,
    pub total_documents: u32,
    pub expired: u32,
    pub expired_food: u32,
    pub expired_documents: u32,
    pub expiring_soon: u32,
    pub expiring_food: u32,
    pub expiring_documents: u32,
}

impl ItemStats {
    /// Tally stats over a list of items as of `today`.
    pub fn tally(items: &[Item], today: NaiveDate) -> Self {
        let mut stats = Self::default();
        for item in items {
            stats.record(item, today);
        }
        stats
    }

    fn record(&mut self, item: &Item, today: NaiveDate) {
        self.total += 1;
        let expired = item.is_expired(today);
        let expiring = item.expires_within(today, EXPIRING_SOON_DAYS);

        match item.item_type() {
            ItemType::Food => {
                self.total_food += 1;
                if expired {
                    self.expired_food += 1;
                }
                if expiring {
                    self.expiring_food += 1;
                }
            }
            ItemType::Document => {
                self.total_documents += 1;
                if expired {
                    self.expired_documents += 1;
                }
                if expiring {
                    self.expiring_documents += 1;
                }
            }
        }

        if expired {
            self.expired += 1;
        }
        if expiring {
            self.expiring_soon += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FoodCategory, ItemKind, StorageType};

    fn food(id: &str, expiry: NaiveDate) -> Item {
        Item {
            id: id.to_string(),
            user_id: "u1".to_string(),
            name: format!("Item {}", id),
            expiry_date: expiry,
            notes: None,
            photo: None,
            created_at: String::new(),
            updated_at: String::new(),
            kind: ItemKind::Food {
                category: FoodCategory::Other,
                storage: StorageType::Pantry,
                quantity: None,
            },
        }
    }

    #[test]
    fn test_tally_splits_expired_and_expiring() {
        let today = NaiveDate::from_ymd_opt(2026, 8, 6).unwrap();
        let items = vec![
            food("a", NaiveDate::from_ymd_opt(2026, 8, 1).unwrap()), // expired
            food("b", NaiveDate::from_ymd_opt(2026, 8, 9).unwrap()), // expiring soon
            food("c", NaiveDate::from_ymd_opt(2026, 12, 1).unwrap()), // fine
        ];

        let stats = ItemStats::tally(&items, today);

        assert_eq!(stats.total, 3);
        assert_eq!(stats.total_food, 3);
        assert_eq!(stats.total_documents, 0);
        assert_eq!(stats.expired, 1);
        assert_eq!(stats.expiring_soon, 1);
    }

    #[test]
    fn test_expiring_today_counts_as_expiring() {
        let today = NaiveDate::from_ymd_opt(2026, 8, 6).unwrap();
        let items = vec![food("a", today)];

        let stats = ItemStats::tally(&items, today);

        assert_eq!(stats.expired, 0);
        assert_eq!(stats.expiring_soon, 1);
    }

    #[test]
    fn test_empty_tally() {
        let today = NaiveDate::from_ymd_opt(2026, 8, 6).unwrap();
        let stats = ItemStats::tally(&[], today);
        assert_eq!(stats.total, 0);
        assert_eq!(stats.expired, 0);
    }
}

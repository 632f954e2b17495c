//! Cart aggregate.
//!
//! One cart per user. Line items are embedded value objects identified by the
//! `(product_id, sub_product_id, size_id)` tuple; tenant is implied by the
//! sub-product but stored for direct filtering. `price_at_addition` is a
//! snapshot taken on first add and never re-derived from the live catalog —
//! re-validation happens only on explicit sync or at checkout.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Hard ceiling on a single line's quantity, independent of catalog limits.
pub const MAX_LINE_QUANTITY: u32 = 100;

/// Identity tuple deciding merge-vs-new-line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemKey {
    pub product_id: Uuid,
    pub sub_product_id: Uuid,
    pub size_id: Uuid,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LineItem {
    /// Synthetic id so the HTTP layer can address the line directly.
    pub id: Uuid,
    pub product_id: Uuid,
    pub sub_product_id: Uuid,
    pub size_id: Uuid,
    pub tenant_id: Uuid,
    /// Unit price captured when the line was first added. Sticky across
    /// merges even if the catalog price changes.
    pub price_at_addition: Decimal,
    pub quantity: u32,
    /// Stock level at add time, kept only as a UX hint.
    pub max_available_at_addition: i32,
    /// Per-size discount value at add time.
    pub discount_applied: Decimal,
    /// Set on creation and refreshed on each quantity merge.
    pub added_at: DateTime<Utc>,
}

impl LineItem {
    pub fn key(&self) -> ItemKey {
        ItemKey {
            product_id: self.product_id,
            sub_product_id: self.sub_product_id,
            size_id: self.size_id,
        }
    }

    pub fn line_total(&self) -> Decimal {
        self.price_at_addition * Decimal::from(self.quantity)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CartStatus {
    #[default]
    Active,
    Abandoned,
    Converted,
    Expired,
}

impl CartStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Abandoned => "abandoned",
            Self::Converted => "converted",
            Self::Expired => "expired",
        }
    }
}

impl fmt::Display for CartStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CartStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "abandoned" => Ok(Self::Abandoned),
            "converted" => Ok(Self::Converted),
            "expired" => Ok(Self::Expired),
            other => Err(format!("unknown cart status: {other}")),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Cart {
    pub id: Uuid,
    /// Owning identity. At most one active cart per user; guests are keyed by
    /// their session id.
    pub user_id: String,
    /// Insertion-ordered. Order carries no meaning beyond display.
    pub items: Vec<LineItem>,
    pub subtotal: Decimal,
    pub discount_total: Decimal,
    pub estimated_shipping: Decimal,
    pub estimated_tax: Decimal,
    pub estimated_total: Decimal,
    pub coupon: Option<Uuid>,
    pub status: CartStatus,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    pub fn new(user_id: impl Into<String>, ttl_days: i64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            user_id: user_id.into(),
            items: vec![],
            subtotal: Decimal::ZERO,
            discount_total: Decimal::ZERO,
            estimated_shipping: Decimal::ZERO,
            estimated_tax: Decimal::ZERO,
            estimated_total: Decimal::ZERO,
            coupon: None,
            status: CartStatus::Active,
            expires_at: now + Duration::days(ttl_days),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn total_quantity(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    pub fn find_by_key(&self, key: &ItemKey) -> Option<&LineItem> {
        self.items.iter().find(|i| i.key() == *key)
    }

    pub fn find_by_id(&self, line_item_id: Uuid) -> Option<&LineItem> {
        self.items.iter().find(|i| i.id == line_item_id)
    }

    /// Merge a line into the cart by identity tuple. On a key match the
    /// quantities sum and `price_at_addition` stays from the first add; a
    /// miss appends the line as given. Returns the id of the affected line.
    pub fn merge_item(&mut self, item: LineItem) -> Uuid {
        let id = match self.items.iter_mut().find(|i| i.key() == item.key()) {
            Some(existing) => {
                existing.quantity += item.quantity;
                existing.added_at = Utc::now();
                existing.id
            }
            None => {
                let id = item.id;
                self.items.push(item);
                id
            }
        };
        self.recalculate_totals();
        id
    }

    pub fn set_quantity(&mut self, line_item_id: Uuid, quantity: u32) -> Option<Uuid> {
        let item = self.items.iter_mut().find(|i| i.id == line_item_id)?;
        item.quantity = quantity;
        let id = item.id;
        self.recalculate_totals();
        Some(id)
    }

    /// Removes a line by id. Returns false when no such line exists.
    pub fn remove_item(&mut self, line_item_id: Uuid) -> bool {
        let before = self.items.len();
        self.items.retain(|i| i.id != line_item_id);
        if self.items.len() == before {
            return false;
        }
        self.recalculate_totals();
        true
    }

    /// Empties items, zeroes totals and drops any cart-level coupon. An empty
    /// cart is a valid state, not a deleted cart.
    pub fn clear(&mut self) {
        self.items.clear();
        self.coupon = None;
        self.discount_total = Decimal::ZERO;
        self.recalculate_totals();
    }

    /// The only writer of `subtotal` and `estimated_total`. Rounding happens
    /// at the aggregate level, not per line, to avoid drift.
    pub fn recalculate_totals(&mut self) {
        let raw: Decimal = self.items.iter().map(LineItem::line_total).sum();
        self.subtotal = round_currency(raw);
        self.estimated_total = round_currency(
            self.subtotal - self.discount_total + self.estimated_shipping + self.estimated_tax,
        );
        self.updated_at = Utc::now();
    }

    /// TTL refresh, applied on every mutation.
    pub fn touch_expiry(&mut self, ttl_days: i64) {
        self.expires_at = Utc::now() + Duration::days(ttl_days);
    }
}

/// Currency-minor-unit safe rounding to two decimal places.
pub fn round_currency(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(price: &str, qty: u32) -> LineItem {
        LineItem {
            id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            sub_product_id: Uuid::new_v4(),
            size_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            price_at_addition: price.parse().unwrap(),
            quantity: qty,
            max_available_at_addition: 50,
            discount_applied: Decimal::ZERO,
            added_at: Utc::now(),
        }
    }

    #[test]
    fn merge_sums_quantity_and_keeps_first_price() {
        let mut cart = Cart::new("u1", 30);
        let first = line("4.50", 2);
        let key = first.key();
        cart.merge_item(first.clone());

        let mut second = line("9.99", 3);
        second.product_id = first.product_id;
        second.sub_product_id = first.sub_product_id;
        second.size_id = first.size_id;
        cart.merge_item(second);

        assert_eq!(cart.items.len(), 1);
        let merged = cart.find_by_key(&key).unwrap();
        assert_eq!(merged.quantity, 5);
        assert_eq!(merged.price_at_addition, "4.50".parse().unwrap());
        assert_eq!(cart.subtotal, "22.50".parse().unwrap());
    }

    #[test]
    fn totals_are_a_pure_function_of_items() {
        let mut cart = Cart::new("u1", 30);
        cart.merge_item(line("3.33", 3));
        cart.merge_item(line("1.01", 1));
        assert_eq!(cart.subtotal, "11.00".parse().unwrap());
        assert_eq!(cart.estimated_total, cart.subtotal);

        cart.discount_total = "1.00".parse().unwrap();
        cart.recalculate_totals();
        assert_eq!(cart.estimated_total, "10.00".parse().unwrap());
    }

    #[test]
    fn clear_resets_items_totals_and_coupon() {
        let mut cart = Cart::new("u1", 30);
        cart.merge_item(line("5.00", 2));
        cart.coupon = Some(Uuid::new_v4());
        cart.discount_total = "2.00".parse().unwrap();
        cart.clear();
        assert!(cart.is_empty());
        assert_eq!(cart.subtotal, Decimal::ZERO);
        assert_eq!(cart.discount_total, Decimal::ZERO);
        assert_eq!(cart.estimated_total, Decimal::ZERO);
        assert!(cart.coupon.is_none());
    }

    #[test]
    fn remove_unknown_line_is_reported() {
        let mut cart = Cart::new("u1", 30);
        cart.merge_item(line("5.00", 1));
        assert!(!cart.remove_item(Uuid::new_v4()));
        assert_eq!(cart.items.len(), 1);
    }

    #[test]
    fn rounding_is_midpoint_away_from_zero() {
        assert_eq!(round_currency("2.005".parse().unwrap()), "2.01".parse().unwrap());
        assert_eq!(round_currency("2.004".parse().unwrap()), "2.00".parse().unwrap());
    }
}

//! Client-side optimistic cart mirror.
//!
//! Used before or alongside login: mutations apply locally first and are
//! pushed to the server at session boundaries (checkout start, explicit
//! sync), not continuously. Items are keyed by a composite string built from
//! the same identity tuple the server merges on, so a later sync merges
//! instead of duplicating.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::cart::round_currency;
use crate::projection::CartView;
use crate::service::IncomingItem;

/// Composite local key mirroring the server identity tuple.
pub fn composite_key(product_id: Uuid, sub_product_id: Uuid, size_id: Uuid) -> String {
    format!("{product_id}:{sub_product_id}:{size_id}")
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LocalItem {
    pub key: String,
    pub product_id: Uuid,
    pub sub_product_id: Uuid,
    pub size_id: Uuid,
    pub tenant_id: Uuid,
    pub quantity: u32,
    /// Display price as last known to the client; the server snapshot taken
    /// at sync time is authoritative.
    pub unit_price: Decimal,
}

impl LocalItem {
    pub fn new(
        product_id: Uuid,
        sub_product_id: Uuid,
        size_id: Uuid,
        tenant_id: Uuid,
        quantity: u32,
        unit_price: Decimal,
    ) -> Self {
        Self {
            key: composite_key(product_id, sub_product_id, size_id),
            product_id,
            sub_product_id,
            size_id,
            tenant_id,
            quantity,
            unit_price,
        }
    }
}

/// Optimistic cart state with an explicit dirty flag and version counter.
/// Consistency with the server is session-boundary-eventual: the owner calls
/// [`LocalCart::reconcile`] after pulling the server cart and pushes the
/// returned proposals through the sync endpoint.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LocalCart {
    items: Vec<LocalItem>,
    version: u64,
    dirty: bool,
}

impl LocalCart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[LocalItem] {
        &self.items
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Display subtotal from locally-known prices.
    pub fn subtotal(&self) -> Decimal {
        round_currency(
            self.items
                .iter()
                .map(|i| i.unit_price * Decimal::from(i.quantity))
                .sum(),
        )
    }

    /// Adds an item, merging by composite key.
    pub fn add(&mut self, item: LocalItem) {
        match self.items.iter_mut().find(|i| i.key == item.key) {
            Some(existing) => existing.quantity += item.quantity,
            None => self.items.push(item),
        }
        self.touch();
    }

    /// Sets a line's quantity; zero removes the line. Returns false when the
    /// key is unknown.
    pub fn set_quantity(&mut self, key: &str, quantity: u32) -> bool {
        if quantity == 0 {
            return self.remove(key);
        }
        match self.items.iter_mut().find(|i| i.key == key) {
            Some(item) => {
                item.quantity = quantity;
                self.touch();
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, key: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|i| i.key != key);
        if self.items.len() == before {
            return false;
        }
        self.touch();
        true
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.touch();
    }

    /// The local items shaped for the server sync endpoint.
    pub fn to_incoming(&self) -> Vec<IncomingItem> {
        self.items
            .iter()
            .map(|i| IncomingItem {
                product_id: i.product_id,
                sub_product_id: i.sub_product_id,
                size_id: i.size_id,
                tenant_id: i.tenant_id,
                quantity: i.quantity,
            })
            .collect()
    }

    /// Pull-then-merge reconciliation against the server cart. The server
    /// wins on every identity match (quantity and price taken from the
    /// server line); items only the client knows about are removed from the
    /// local state and returned as proposed adds for a follow-up sync call.
    /// Clears the dirty flag.
    pub fn reconcile(&mut self, server: &CartView) -> Vec<IncomingItem> {
        let mut proposals = Vec::new();
        for local in &self.items {
            let matched = server.items.iter().any(|s| {
                composite_key(s.product_id, s.sub_product_id, s.size_id) == local.key
            });
            if !matched {
                proposals.push(IncomingItem {
                    product_id: local.product_id,
                    sub_product_id: local.sub_product_id,
                    size_id: local.size_id,
                    tenant_id: local.tenant_id,
                    quantity: local.quantity,
                });
            }
        }

        self.items = server
            .items
            .iter()
            .map(|s| LocalItem {
                key: composite_key(s.product_id, s.sub_product_id, s.size_id),
                product_id: s.product_id,
                sub_product_id: s.sub_product_id,
                size_id: s.size_id,
                tenant_id: s.tenant_id,
                quantity: s.quantity,
                unit_price: s.price_at_addition,
            })
            .collect();
        self.version += 1;
        self.dirty = false;
        proposals
    }

    fn touch(&mut self) {
        self.version += 1;
        self.dirty = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::empty_view;

    fn item(quantity: u32) -> LocalItem {
        LocalItem::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            quantity,
            "4.50".parse().unwrap(),
        )
    }

    #[test]
    fn add_merges_by_composite_key() {
        let mut cart = LocalCart::new();
        let first = item(2);
        let mut second = item(3);
        second.key = first.key.clone();
        cart.add(first);
        cart.add(second);
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.items()[0].quantity, 5);
        assert!(cart.is_dirty());
    }

    #[test]
    fn zero_quantity_removes_the_line() {
        let mut cart = LocalCart::new();
        let line = item(2);
        let key = line.key.clone();
        cart.add(line);
        assert!(cart.set_quantity(&key, 0));
        assert!(cart.is_empty());
    }

    #[test]
    fn reconcile_proposes_client_only_items_and_clears_dirty() {
        let mut cart = LocalCart::new();
        let line = item(2);
        cart.add(line.clone());

        let server = empty_view("u1");
        let proposals = cart.reconcile(&server);
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].product_id, line.product_id);
        assert_eq!(proposals[0].quantity, 2);
        // server had nothing, so the local mirror now reflects that
        assert!(cart.is_empty());
        assert!(!cart.is_dirty());
    }

    #[test]
    fn subtotal_rounds_at_aggregate_level() {
        let mut cart = LocalCart::new();
        let mut a = item(3);
        a.unit_price = "3.333".parse().unwrap();
        cart.add(a);
        assert_eq!(cart.subtotal(), "10.00".parse::<Decimal>().unwrap());
    }
}

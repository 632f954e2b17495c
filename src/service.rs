//! Cart mutation service.
//!
//! All cart writes go through here: identity-tuple merging, quantity and
//! stock enforcement, price snapshotting, totals recalculation and
//! persistence. Single-item operations fail whole; batch operations
//! (sync/replace/save) collect per-item failures and keep going, because the
//! incoming items come from stale client state and dropping one bad line
//! beats rejecting the batch.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::domain::cart::{Cart, CartStatus, ItemKey, LineItem, MAX_LINE_QUANTITY};
use crate::domain::catalog::{Size, SubProduct};
use crate::domain::events::CartEvent;
use crate::error::{CartError, Result};
use crate::projection::{self, CartView, PopulatedLineItem};
use crate::sink::EventSink;
use crate::store::{CartStore, CatalogReader};

/// Fallback clamp ceiling when a size defines no max order quantity.
const DEFAULT_CLAMP_CEILING: u32 = 99;

/// An item as supplied by a client: the identity tuple plus a quantity.
#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct IncomingItem {
    pub product_id: Uuid,
    pub sub_product_id: Uuid,
    pub size_id: Uuid,
    pub tenant_id: Uuid,
    #[validate(range(min = 1, max = 100))]
    pub quantity: u32,
}

/// Per-item failure inside a batch, keyed by the offending identity fields.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncError {
    pub product_id: Uuid,
    pub sub_product_id: Uuid,
    pub size_id: Uuid,
    pub reason: String,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct SyncOutcome {
    pub added: u32,
    pub skipped: u32,
    pub errors: Vec<SyncError>,
}

/// How batch paths treat an out-of-range quantity: strict paths reject,
/// reconciliation paths clamp to maximize successful merges from stale
/// client state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum QuantityPolicy {
    Strict,
    Clamp,
}

pub struct CartService<S, C, E> {
    store: S,
    catalog: C,
    sink: E,
    ttl_days: i64,
}

impl<S, C, E> CartService<S, C, E>
where
    S: CartStore,
    C: CatalogReader,
    E: EventSink,
{
    pub fn new(store: S, catalog: C, sink: E, ttl_days: i64) -> Self {
        Self {
            store,
            catalog,
            sink,
            ttl_days,
        }
    }

    /// Returns the populated cart, or the canonical empty shape when no cart
    /// row exists yet. Never a not-found error.
    pub async fn get_cart(&self, user_id: &str) -> Result<CartView> {
        match self.store.find_by_user(user_id).await? {
            Some(cart) => projection::project(&self.catalog, &cart).await,
            None => Ok(projection::empty_view(user_id)),
        }
    }

    /// Adds an item, merging by identity tuple. Price is snapshotted on the
    /// first add and left untouched on merges; the merged total is what gets
    /// re-validated against stock and order limits.
    pub async fn add_item(
        &self,
        user_id: &str,
        item: IncomingItem,
    ) -> Result<(CartView, PopulatedLineItem)> {
        check_hard_bounds(item.quantity)?;
        let mut cart = self.load_or_create(user_id).await?;
        let line_id = self
            .validate_and_merge(&mut cart, &item, QuantityPolicy::Strict)
            .await?;
        self.persist(&mut cart).await?;
        self.emit(CartEvent::ItemAdded {
            user_id: user_id.to_string(),
            product_id: item.product_id,
            size_id: item.size_id,
            quantity: item.quantity,
        })
        .await;
        self.emit_count(user_id, &cart).await;

        let view = projection::project(&self.catalog, &cart).await?;
        let line = view
            .items
            .iter()
            .find(|i| i.id == line_id)
            .cloned()
            .ok_or_else(|| CartError::Store("merged line missing from projection".into()))?;
        Ok((view, line))
    }

    /// Sets an existing line's quantity, re-validating against the size's
    /// current stock and order limits.
    pub async fn update_quantity(
        &self,
        user_id: &str,
        line_item_id: Uuid,
        quantity: u32,
    ) -> Result<CartView> {
        check_hard_bounds(quantity)?;
        let mut cart = self.require_cart(user_id).await?;
        let line = cart
            .find_by_id(line_item_id)
            .cloned()
            .ok_or_else(|| CartError::not_found("cart item not found"))?;
        let size = self
            .catalog
            .size(line.size_id)
            .await?
            .ok_or_else(|| CartError::not_found("this size is no longer available"))?;
        check_order_limits(&size, quantity)?;
        cart.set_quantity(line_item_id, quantity);
        self.persist(&mut cart).await?;
        self.emit_count(user_id, &cart).await;
        projection::project(&self.catalog, &cart).await
    }

    pub async fn remove_item(&self, user_id: &str, line_item_id: Uuid) -> Result<CartView> {
        let mut cart = self.require_cart(user_id).await?;
        if !cart.remove_item(line_item_id) {
            return Err(CartError::not_found("cart item not found"));
        }
        self.persist(&mut cart).await?;
        self.emit_count(user_id, &cart).await;
        projection::project(&self.catalog, &cart).await
    }

    /// Empties the cart, zeroing totals and dropping any coupon. Errors when
    /// the user never had a cart to clear.
    pub async fn clear_cart(&self, user_id: &str) -> Result<CartView> {
        let mut cart = self.require_cart(user_id).await?;
        cart.clear();
        self.persist(&mut cart).await?;
        self.emit(CartEvent::Cleared {
            user_id: user_id.to_string(),
        })
        .await;
        self.emit_count(user_id, &cart).await;
        projection::project(&self.catalog, &cart).await
    }

    /// Reconciles a client-side cart into the server cart: the cart is
    /// rebuilt from scratch and each incoming item attempted independently,
    /// in input order. The rebuilt cart lands in one write, so a partial
    /// batch can never leave a half-cleared cart behind.
    pub async fn sync_cart(
        &self,
        user_id: &str,
        items: Vec<IncomingItem>,
    ) -> Result<(CartView, SyncOutcome)> {
        self.rebuild_cart(user_id, items).await
    }

    /// Same mechanics as [`sync_cart`](Self::sync_cart); callers use it when
    /// the supplied items are the full, authoritative new state.
    pub async fn replace_cart(
        &self,
        user_id: &str,
        items: Vec<IncomingItem>,
    ) -> Result<(CartView, SyncOutcome)> {
        self.rebuild_cart(user_id, items).await
    }

    /// Login-time merge: folds the supplied items (and any guest cart's
    /// lines) into the user's existing cart without clearing it first.
    pub async fn save_cart(
        &self,
        user_id: &str,
        mut items: Vec<IncomingItem>,
        guest_id: Option<&str>,
    ) -> Result<(CartView, SyncOutcome)> {
        let mut guest_cart = None;
        if let Some(guest) = guest_id {
            if let Some(found) = self.store.find_by_user(guest).await? {
                items.extend(found.items.iter().map(|line| IncomingItem {
                    product_id: line.product_id,
                    sub_product_id: line.sub_product_id,
                    size_id: line.size_id,
                    tenant_id: line.tenant_id,
                    quantity: line.quantity,
                }));
                guest_cart = Some(found);
            }
        }
        let mut cart = self.load_or_create(user_id).await?;
        let outcome = self.merge_batch(&mut cart, &items).await?;
        self.persist(&mut cart).await?;
        // The guest cart's lines now live in the user cart; empty it so a
        // retried save does not merge them a second time.
        if let Some(mut merged) = guest_cart {
            merged.clear();
            self.persist(&mut merged).await?;
        }
        self.emit_count(user_id, &cart).await;
        let view = projection::project(&self.catalog, &cart).await?;
        Ok((view, outcome))
    }

    async fn rebuild_cart(
        &self,
        user_id: &str,
        items: Vec<IncomingItem>,
    ) -> Result<(CartView, SyncOutcome)> {
        let mut cart = self.load_or_create(user_id).await?;
        cart.clear();
        let outcome = self.merge_batch(&mut cart, &items).await?;
        self.persist(&mut cart).await?;
        self.emit_count(user_id, &cart).await;
        let view = projection::project(&self.catalog, &cart).await?;
        Ok((view, outcome))
    }

    /// Attempts each item in input order. Business failures are collected,
    /// storage failures abort the batch.
    async fn merge_batch(&self, cart: &mut Cart, items: &[IncomingItem]) -> Result<SyncOutcome> {
        let mut outcome = SyncOutcome::default();
        for incoming in items {
            match self
                .validate_and_merge(cart, incoming, QuantityPolicy::Clamp)
                .await
            {
                Ok(_) => outcome.added += 1,
                Err(CartError::Store(msg)) => return Err(CartError::Store(msg)),
                Err(err) => {
                    tracing::debug!(
                        product_id = %incoming.product_id,
                        size_id = %incoming.size_id,
                        error = %err,
                        "skipping cart item during batch merge"
                    );
                    outcome.skipped += 1;
                    outcome.errors.push(SyncError {
                        product_id: incoming.product_id,
                        sub_product_id: incoming.sub_product_id,
                        size_id: incoming.size_id,
                        reason: err.to_string(),
                    });
                }
            }
        }
        Ok(outcome)
    }

    /// Full eligibility + limit validation, then merge into the aggregate.
    /// Returns the id of the affected line.
    async fn validate_and_merge(
        &self,
        cart: &mut Cart,
        incoming: &IncomingItem,
        policy: QuantityPolicy,
    ) -> Result<Uuid> {
        let (sub_product, size) = self.load_eligible(incoming).await?;

        let quantity = match policy {
            QuantityPolicy::Strict => incoming.quantity,
            QuantityPolicy::Clamp => {
                let ceiling = if size.max_order_quantity > 0 {
                    size.max_order_quantity.min(MAX_LINE_QUANTITY)
                } else {
                    DEFAULT_CLAMP_CEILING
                };
                incoming.quantity.clamp(1, ceiling)
            }
        };

        let key = ItemKey {
            product_id: incoming.product_id,
            sub_product_id: incoming.sub_product_id,
            size_id: incoming.size_id,
        };
        let merged_total = cart
            .find_by_key(&key)
            .map(|line| line.quantity)
            .unwrap_or(0)
            + quantity;
        check_hard_bounds(merged_total)?;
        check_order_limits(&size, merged_total)?;

        let line = LineItem {
            id: Uuid::new_v4(),
            product_id: incoming.product_id,
            sub_product_id: incoming.sub_product_id,
            size_id: incoming.size_id,
            tenant_id: sub_product.tenant_id,
            price_at_addition: size.price,
            quantity,
            max_available_at_addition: size.stock,
            discount_applied: size.discount,
            added_at: Utc::now(),
        };
        Ok(cart.merge_item(line))
    }

    /// Resolves the identity tuple against the catalog. Any ineligibility
    /// (unapproved product, inactive listing, suspended tenant, mismatched
    /// references) is reported uniformly as not-available, without revealing
    /// which check failed.
    async fn load_eligible(&self, incoming: &IncomingItem) -> Result<(SubProduct, Size)> {
        let product = self
            .catalog
            .product(incoming.product_id)
            .await?
            .filter(|p| p.is_purchasable())
            .ok_or_else(|| CartError::not_found("product is not available"))?;

        let unavailable = || CartError::not_found("product is not available from this seller");
        let sub_product = self
            .catalog
            .sub_product(incoming.sub_product_id)
            .await?
            .filter(|s| s.active && s.product_id == product.id)
            .ok_or_else(unavailable)?;
        if sub_product.tenant_id != incoming.tenant_id {
            return Err(unavailable());
        }
        let tenant = self
            .catalog
            .tenant(sub_product.tenant_id)
            .await?
            .ok_or_else(unavailable)?;
        if !tenant.is_eligible() {
            return Err(unavailable());
        }

        let size = self
            .catalog
            .size(incoming.size_id)
            .await?
            .filter(|s| s.sub_product_id == sub_product.id)
            .ok_or_else(|| CartError::not_found("size not found for this product"))?;

        Ok((sub_product, size))
    }

    async fn load_or_create(&self, user_id: &str) -> Result<Cart> {
        match self.store.find_by_user(user_id).await? {
            Some(cart) if cart.status == CartStatus::Active => Ok(cart),
            // Terminal carts (converted, expired) are not mutable; start a
            // fresh aggregate, keeping the stored row's id so the view and
            // the upserted row agree.
            Some(stale) => {
                let mut fresh = Cart::new(user_id, self.ttl_days);
                fresh.id = stale.id;
                Ok(fresh)
            }
            None => Ok(Cart::new(user_id, self.ttl_days)),
        }
    }

    /// Loads the user's cart for in-place edits. Only `active` carts are
    /// mutable; a terminal cart reads the same as no cart at all.
    async fn require_cart(&self, user_id: &str) -> Result<Cart> {
        self.store
            .find_by_user(user_id)
            .await?
            .filter(|cart| cart.status == CartStatus::Active)
            .ok_or_else(|| CartError::not_found("cart not found"))
    }

    async fn persist(&self, cart: &mut Cart) -> Result<()> {
        cart.touch_expiry(self.ttl_days);
        self.store.upsert(cart).await
    }

    async fn emit_count(&self, user_id: &str, cart: &Cart) {
        self.emit(CartEvent::ItemCountChanged {
            user_id: user_id.to_string(),
            count: cart.total_quantity(),
        })
        .await;
    }

    /// Best-effort delivery: failure is logged and swallowed, never surfaced
    /// to the mutation's caller.
    async fn emit(&self, event: CartEvent) {
        if let Err(err) = self.sink.publish(&event).await {
            tracing::warn!(subject = event.subject(), error = %err, "cart event delivery failed");
        }
    }
}

fn check_hard_bounds(quantity: u32) -> Result<()> {
    if quantity == 0 {
        return Err(CartError::validation("quantity must be at least 1"));
    }
    if quantity > MAX_LINE_QUANTITY {
        return Err(CartError::validation(format!(
            "quantity cannot exceed {MAX_LINE_QUANTITY}"
        )));
    }
    Ok(())
}

/// Stock and catalog order limits, applied to the would-be line total (the
/// merged quantity, not the delta).
fn check_order_limits(size: &Size, total: u32) -> Result<()> {
    let available = size.available_stock();
    if available <= 0 {
        return Err(CartError::conflict("this size is out of stock"));
    }
    if total as i64 > available as i64 {
        return Err(CartError::conflict(format!(
            "only {available} available in stock"
        )));
    }
    if size.max_order_quantity > 0 && total > size.max_order_quantity {
        return Err(CartError::validation(format!(
            "maximum order quantity for this size is {}",
            size.max_order_quantity
        )));
    }
    if total < size.min_order_quantity {
        return Err(CartError::validation(format!(
            "minimum order quantity for this size is {}",
            size.min_order_quantity
        )));
    }
    Ok(())
}

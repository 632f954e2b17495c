//! Cart mutation service tests against the in-memory store.

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use sipstream_cart::domain::catalog::{
    Product, ProductStatus, Size, SubProduct, SubscriptionStatus, Tenant, TenantStatus,
};
use sipstream_cart::domain::cart::CartStatus;
use sipstream_cart::domain::events::CartEvent;
use sipstream_cart::error::CartError;
use sipstream_cart::service::{CartService, IncomingItem};
use sipstream_cart::sink::RecordingSink;
use sipstream_cart::store::{CartStore, MemoryCartStore, MemoryCatalog};

struct Fixture {
    service: CartService<MemoryCartStore, MemoryCatalog, RecordingSink>,
    store: MemoryCartStore,
    catalog: MemoryCatalog,
    sink: RecordingSink,
}

fn fixture() -> Fixture {
    let store = MemoryCartStore::new();
    let catalog = MemoryCatalog::new();
    let sink = RecordingSink::new();
    let service = CartService::new(store.clone(), catalog.clone(), sink.clone(), 30);
    Fixture {
        service,
        store,
        catalog,
        sink,
    }
}

struct Listing {
    item: IncomingItem,
    size: Size,
}

fn price(s: &str) -> Decimal {
    s.parse().unwrap()
}

/// Seeds an approved product listed by an eligible tenant and returns a
/// valid incoming item for it.
fn seed_listing(catalog: &MemoryCatalog, unit_price: &str, stock: i32, max_order: u32) -> Listing {
    let tenant = Tenant {
        id: Uuid::new_v4(),
        name: "Hop Harbor".into(),
        logo_url: None,
        status: TenantStatus::Approved,
        subscription: SubscriptionStatus::Active,
    };
    let product = Product {
        id: Uuid::new_v4(),
        name: "Cold Brew Coffee".into(),
        slug: format!("cold-brew-{}", Uuid::new_v4()),
        status: ProductStatus::Approved,
        created_at: Utc::now(),
    };
    let sub_product = SubProduct {
        id: Uuid::new_v4(),
        product_id: product.id,
        tenant_id: tenant.id,
        sku: "CB-001".into(),
        active: true,
    };
    let size = Size {
        id: Uuid::new_v4(),
        sub_product_id: sub_product.id,
        label: "330ml".into(),
        price: price(unit_price),
        discount: Decimal::ZERO,
        stock,
        in_stock: stock > 0,
        min_order_quantity: 1,
        max_order_quantity: max_order,
    };
    let item = IncomingItem {
        product_id: product.id,
        sub_product_id: sub_product.id,
        size_id: size.id,
        tenant_id: tenant.id,
        quantity: 1,
    };
    catalog.insert_tenant(tenant);
    catalog.insert_product(product);
    catalog.insert_sub_product(sub_product);
    catalog.insert_size(size.clone());
    Listing { item, size }
}

fn with_quantity(item: &IncomingItem, quantity: u32) -> IncomingItem {
    IncomingItem {
        quantity,
        ..item.clone()
    }
}

#[tokio::test]
async fn merge_keeps_first_price_even_after_catalog_change() {
    let fx = fixture();
    let listing = seed_listing(&fx.catalog, "4.50", 50, 24);

    fx.service
        .add_item("u1", with_quantity(&listing.item, 2))
        .await
        .unwrap();

    // catalog price changes between the two adds
    let mut repriced = listing.size.clone();
    repriced.price = price("9.99");
    fx.catalog.update_size(repriced);

    let (cart, line) = fx
        .service
        .add_item("u1", with_quantity(&listing.item, 3))
        .await
        .unwrap();

    assert_eq!(cart.items.len(), 1);
    assert_eq!(line.quantity, 5);
    assert_eq!(line.price_at_addition, price("4.50"));
    assert_eq!(line.current_price, Some(price("9.99")));
    assert_eq!(cart.subtotal, price("22.50"));
}

#[tokio::test]
async fn add_rejects_when_stock_insufficient_and_leaves_cart_unchanged() {
    let fx = fixture();
    let listing = seed_listing(&fx.catalog, "4.50", 5, 0);

    let err = fx
        .service
        .add_item("u1", with_quantity(&listing.item, 6))
        .await
        .unwrap_err();
    assert!(matches!(err, CartError::Conflict(_)));

    let cart = fx.service.get_cart("u1").await.unwrap();
    assert!(cart.is_empty);
}

#[tokio::test]
async fn merged_total_is_validated_against_stock_not_just_the_delta() {
    let fx = fixture();
    let listing = seed_listing(&fx.catalog, "4.50", 5, 0);

    fx.service
        .add_item("u1", with_quantity(&listing.item, 3))
        .await
        .unwrap();
    let err = fx
        .service
        .add_item("u1", with_quantity(&listing.item, 3))
        .await
        .unwrap_err();
    assert!(matches!(err, CartError::Conflict(_)));

    let cart = fx.service.get_cart("u1").await.unwrap();
    assert_eq!(cart.items[0].quantity, 3);
}

#[tokio::test]
async fn quantity_hard_bounds() {
    let fx = fixture();
    let listing = seed_listing(&fx.catalog, "2.00", 200, 0);

    let err = fx
        .service
        .add_item("u1", with_quantity(&listing.item, 0))
        .await
        .unwrap_err();
    assert!(matches!(err, CartError::Validation(_)));

    let err = fx
        .service
        .add_item("u1", with_quantity(&listing.item, 101))
        .await
        .unwrap_err();
    assert!(matches!(err, CartError::Validation(_)));

    let (cart, _) = fx
        .service
        .add_item("u1", with_quantity(&listing.item, 100))
        .await
        .unwrap();
    assert_eq!(cart.items[0].quantity, 100);
}

#[tokio::test]
async fn max_order_quantity_caps_the_merged_total() {
    let fx = fixture();
    let listing = seed_listing(&fx.catalog, "2.00", 200, 10);

    fx.service
        .add_item("u1", with_quantity(&listing.item, 8))
        .await
        .unwrap();
    let err = fx
        .service
        .add_item("u1", with_quantity(&listing.item, 3))
        .await
        .unwrap_err();
    assert!(matches!(err, CartError::Validation(_)));
}

#[tokio::test]
async fn totals_follow_items_through_add_update_remove() {
    let fx = fixture();
    let a = seed_listing(&fx.catalog, "3.33", 50, 0);
    let b = seed_listing(&fx.catalog, "1.01", 50, 0);

    fx.service
        .add_item("u1", with_quantity(&a.item, 3))
        .await
        .unwrap();
    let (cart, line_b) = fx
        .service
        .add_item("u1", with_quantity(&b.item, 1))
        .await
        .unwrap();
    assert_eq!(cart.subtotal, price("11.00"));
    assert_eq!(cart.estimated_total, cart.subtotal - cart.discount_total);

    let cart = fx
        .service
        .update_quantity("u1", line_b.id, 5)
        .await
        .unwrap();
    assert_eq!(cart.subtotal, price("15.04"));
    assert_eq!(cart.estimated_total, cart.subtotal - cart.discount_total);

    let cart = fx.service.remove_item("u1", line_b.id).await.unwrap();
    assert_eq!(cart.subtotal, price("9.99"));
    assert_eq!(cart.estimated_total, cart.subtotal - cart.discount_total);
}

#[tokio::test]
async fn missing_cart_reads_as_empty_shape() {
    let fx = fixture();
    let cart = fx.service.get_cart("nobody").await.unwrap();
    assert!(cart.is_empty);
    assert!(cart.items.is_empty());
    assert_eq!(cart.subtotal, Decimal::ZERO);
    assert_eq!(cart.estimated_total, Decimal::ZERO);
    assert!(cart.id.is_none());
}

#[tokio::test]
async fn sync_collects_per_item_failures_and_keeps_valid_items() {
    let fx = fixture();
    let valid = seed_listing(&fx.catalog, "4.50", 50, 24);
    let mut unknown_size = valid.item.clone();
    unknown_size.size_id = Uuid::new_v4();

    let (cart, results) = fx
        .service
        .sync_cart(
            "u1",
            vec![with_quantity(&valid.item, 2), unknown_size.clone()],
        )
        .await
        .unwrap();

    assert_eq!(results.added, 1);
    assert_eq!(results.skipped, 1);
    assert_eq!(results.errors.len(), 1);
    assert_eq!(results.errors[0].size_id, unknown_size.size_id);
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].size_id, valid.item.size_id);
}

#[tokio::test]
async fn sync_clamps_stale_quantities_instead_of_rejecting() {
    let fx = fixture();
    let listing = seed_listing(&fx.catalog, "4.50", 200, 24);

    let (cart, results) = fx
        .service
        .sync_cart("u1", vec![with_quantity(&listing.item, 150)])
        .await
        .unwrap();

    assert_eq!(results.added, 1);
    assert!(results.errors.is_empty());
    assert_eq!(cart.items[0].quantity, 24);
}

#[tokio::test]
async fn sync_replaces_the_previous_server_cart() {
    let fx = fixture();
    let old = seed_listing(&fx.catalog, "4.50", 50, 0);
    let new = seed_listing(&fx.catalog, "2.00", 50, 0);

    fx.service
        .add_item("u1", with_quantity(&old.item, 2))
        .await
        .unwrap();
    let (cart, _) = fx
        .service
        .sync_cart("u1", vec![with_quantity(&new.item, 1)])
        .await
        .unwrap();

    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].size_id, new.item.size_id);
}

#[tokio::test]
async fn ineligible_tenant_is_reported_as_not_available() {
    let fx = fixture();
    let listing = seed_listing(&fx.catalog, "4.50", 50, 0);

    let suspended = Tenant {
        id: listing.item.tenant_id,
        name: "Hop Harbor".into(),
        logo_url: None,
        status: TenantStatus::Suspended,
        subscription: SubscriptionStatus::Active,
    };
    fx.catalog.insert_tenant(suspended);

    let err = fx
        .service
        .add_item("u1", with_quantity(&listing.item, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, CartError::NotFound(_)));
}

#[tokio::test]
async fn lapsed_subscription_is_reported_as_not_available() {
    let fx = fixture();
    let listing = seed_listing(&fx.catalog, "4.50", 50, 0);

    let lapsed = Tenant {
        id: listing.item.tenant_id,
        name: "Hop Harbor".into(),
        logo_url: None,
        status: TenantStatus::Approved,
        subscription: SubscriptionStatus::PastDue,
    };
    fx.catalog.insert_tenant(lapsed);

    let err = fx
        .service
        .add_item("u1", with_quantity(&listing.item, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, CartError::NotFound(_)));
}

#[tokio::test]
async fn clear_resets_items_totals_and_coupon() {
    let fx = fixture();
    let listing = seed_listing(&fx.catalog, "4.50", 50, 0);

    fx.service
        .add_item("u1", with_quantity(&listing.item, 2))
        .await
        .unwrap();
    let cart = fx.service.clear_cart("u1").await.unwrap();
    assert!(cart.is_empty);
    assert_eq!(cart.subtotal, Decimal::ZERO);
    assert_eq!(cart.discount_total, Decimal::ZERO);
    assert_eq!(cart.estimated_total, Decimal::ZERO);
    assert!(cart.coupon.is_none());

    let cart = fx.service.get_cart("u1").await.unwrap();
    assert!(cart.is_empty);
}

#[tokio::test]
async fn clear_requires_an_existing_cart() {
    let fx = fixture();
    let err = fx.service.clear_cart("nobody").await.unwrap_err();
    assert!(matches!(err, CartError::NotFound(_)));
}

#[tokio::test]
async fn update_quantity_revalidates_against_live_stock() {
    let fx = fixture();
    let listing = seed_listing(&fx.catalog, "4.50", 10, 0);

    let (_, line) = fx
        .service
        .add_item("u1", with_quantity(&listing.item, 2))
        .await
        .unwrap();
    let err = fx
        .service
        .update_quantity("u1", line.id, 50)
        .await
        .unwrap_err();
    assert!(matches!(err, CartError::Conflict(_)));
}

#[tokio::test]
async fn update_and_remove_error_on_unknown_line() {
    let fx = fixture();
    let listing = seed_listing(&fx.catalog, "4.50", 10, 0);
    fx.service
        .add_item("u1", with_quantity(&listing.item, 1))
        .await
        .unwrap();

    let err = fx
        .service
        .update_quantity("u1", Uuid::new_v4(), 2)
        .await
        .unwrap_err();
    assert!(matches!(err, CartError::NotFound(_)));

    let err = fx
        .service
        .remove_item("u1", Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, CartError::NotFound(_)));
}

#[tokio::test]
async fn save_merges_guest_cart_without_clearing_user_cart() {
    let fx = fixture();
    let existing = seed_listing(&fx.catalog, "4.50", 50, 0);
    let from_guest = seed_listing(&fx.catalog, "2.00", 50, 0);

    fx.service
        .add_item("u1", with_quantity(&existing.item, 2))
        .await
        .unwrap();
    fx.service
        .add_item("guest:s1", with_quantity(&from_guest.item, 3))
        .await
        .unwrap();

    let (cart, results) = fx
        .service
        .save_cart("u1", vec![], Some("guest:s1"))
        .await
        .unwrap();

    assert_eq!(results.added, 1);
    assert_eq!(cart.items.len(), 2);
    let kept = cart
        .items
        .iter()
        .find(|i| i.size_id == existing.item.size_id)
        .unwrap();
    assert_eq!(kept.quantity, 2);
}

#[tokio::test]
async fn below_minimum_order_quantity_is_rejected() {
    let fx = fixture();
    let listing = seed_listing(&fx.catalog, "4.50", 50, 0);
    let mut size = listing.size.clone();
    size.min_order_quantity = 6;
    fx.catalog.update_size(size);

    let err = fx
        .service
        .add_item("u1", with_quantity(&listing.item, 2))
        .await
        .unwrap_err();
    assert!(matches!(err, CartError::Validation(_)));
    assert!(fx.service.get_cart("u1").await.unwrap().is_empty);

    let (_, line) = fx
        .service
        .add_item("u1", with_quantity(&listing.item, 6))
        .await
        .unwrap();
    let err = fx
        .service
        .update_quantity("u1", line.id, 2)
        .await
        .unwrap_err();
    assert!(matches!(err, CartError::Validation(_)));
}

#[tokio::test]
async fn terminal_carts_are_not_editable_in_place() {
    let fx = fixture();
    let listing = seed_listing(&fx.catalog, "4.50", 50, 0);

    let (_, line) = fx
        .service
        .add_item("u1", with_quantity(&listing.item, 2))
        .await
        .unwrap();

    let mut stored = fx.store.find_by_user("u1").await.unwrap().unwrap();
    stored.status = CartStatus::Converted;
    fx.store.upsert(&stored).await.unwrap();

    let err = fx
        .service
        .update_quantity("u1", line.id, 9)
        .await
        .unwrap_err();
    assert!(matches!(err, CartError::NotFound(_)));
    let err = fx.service.remove_item("u1", line.id).await.unwrap_err();
    assert!(matches!(err, CartError::NotFound(_)));
    let err = fx.service.clear_cart("u1").await.unwrap_err();
    assert!(matches!(err, CartError::NotFound(_)));

    let stored = fx.store.find_by_user("u1").await.unwrap().unwrap();
    assert_eq!(stored.items[0].quantity, 2);
    assert_eq!(stored.status, CartStatus::Converted);
}

#[tokio::test]
async fn add_after_conversion_starts_fresh_under_the_same_row_id() {
    let fx = fixture();
    let listing = seed_listing(&fx.catalog, "4.50", 50, 0);

    fx.service
        .add_item("u1", with_quantity(&listing.item, 2))
        .await
        .unwrap();
    let mut stored = fx.store.find_by_user("u1").await.unwrap().unwrap();
    let row_id = stored.id;
    stored.status = CartStatus::Converted;
    fx.store.upsert(&stored).await.unwrap();

    let (view, _) = fx
        .service
        .add_item("u1", with_quantity(&listing.item, 1))
        .await
        .unwrap();
    assert_eq!(view.id, Some(row_id));
    assert_eq!(view.items.len(), 1);
    assert_eq!(view.items[0].quantity, 1);

    let stored = fx.store.find_by_user("u1").await.unwrap().unwrap();
    assert_eq!(stored.id, row_id);
    assert_eq!(stored.status, CartStatus::Active);
}

#[tokio::test]
async fn repeated_save_does_not_double_the_guest_lines() {
    let fx = fixture();
    let from_guest = seed_listing(&fx.catalog, "2.00", 50, 0);

    fx.service
        .add_item("guest:s1", with_quantity(&from_guest.item, 3))
        .await
        .unwrap();

    fx.service
        .save_cart("u1", vec![], Some("guest:s1"))
        .await
        .unwrap();
    let (cart, results) = fx
        .service
        .save_cart("u1", vec![], Some("guest:s1"))
        .await
        .unwrap();

    assert_eq!(results.added, 0);
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].quantity, 3);
    assert!(fx.service.get_cart("guest:s1").await.unwrap().is_empty);
}

#[tokio::test]
async fn mutations_emit_item_count_events_best_effort() {
    let fx = fixture();
    let listing = seed_listing(&fx.catalog, "4.50", 50, 0);

    fx.service
        .add_item("u1", with_quantity(&listing.item, 2))
        .await
        .unwrap();
    fx.service.clear_cart("u1").await.unwrap();

    let counts: Vec<u32> = fx
        .sink
        .events()
        .into_iter()
        .filter_map(|e| match e {
            CartEvent::ItemCountChanged { count, .. } => Some(count),
            _ => None,
        })
        .collect();
    assert_eq!(counts, vec![2, 0]);
}

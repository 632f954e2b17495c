//! Client-ready cart views.
//!
//! Joins each line item with product, sub-product, tenant and size display
//! fields. Absence of a cart row is projected as the canonical empty shape —
//! cart reads always succeed with a shape, never branch on 404. Lines whose
//! catalog rows have since vanished keep their snapshot data and are flagged
//! `still_available: false` rather than dropped.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::cart::{Cart, CartStatus, LineItem};
use crate::error::Result;
use crate::store::CatalogReader;

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PopulatedLineItem {
    pub id: Uuid,
    pub product_id: Uuid,
    pub sub_product_id: Uuid,
    pub size_id: Uuid,
    pub tenant_id: Uuid,
    pub quantity: u32,
    pub price_at_addition: Decimal,
    pub discount_applied: Decimal,
    pub max_available_at_addition: i32,
    pub line_total: Decimal,
    pub added_at: DateTime<Utc>,
    pub product_name: Option<String>,
    pub product_slug: Option<String>,
    pub sku: Option<String>,
    pub tenant_name: Option<String>,
    pub tenant_logo_url: Option<String>,
    pub tenant_status: Option<String>,
    pub size_label: Option<String>,
    pub current_price: Option<Decimal>,
    pub current_stock: Option<i32>,
    pub in_stock: Option<bool>,
    /// False when any of the joined catalog rows no longer exists.
    pub still_available: bool,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub id: Option<Uuid>,
    pub user_id: String,
    pub items: Vec<PopulatedLineItem>,
    pub subtotal: Decimal,
    pub discount_total: Decimal,
    pub estimated_shipping: Decimal,
    pub estimated_tax: Decimal,
    pub estimated_total: Decimal,
    pub coupon: Option<Uuid>,
    pub status: CartStatus,
    pub is_empty: bool,
}

/// The shape returned when no cart row exists for the user yet.
pub fn empty_view(user_id: &str) -> CartView {
    CartView {
        id: None,
        user_id: user_id.to_string(),
        items: vec![],
        subtotal: Decimal::ZERO,
        discount_total: Decimal::ZERO,
        estimated_shipping: Decimal::ZERO,
        estimated_tax: Decimal::ZERO,
        estimated_total: Decimal::ZERO,
        coupon: None,
        status: CartStatus::Active,
        is_empty: true,
    }
}

pub async fn project_line<C: CatalogReader>(
    catalog: &C,
    item: &LineItem,
) -> Result<PopulatedLineItem> {
    let product = catalog.product(item.product_id).await?;
    let sub_product = catalog.sub_product(item.sub_product_id).await?;
    let size = catalog.size(item.size_id).await?;
    let tenant = catalog.tenant(item.tenant_id).await?;

    let still_available =
        product.is_some() && sub_product.is_some() && size.is_some() && tenant.is_some();

    Ok(PopulatedLineItem {
        id: item.id,
        product_id: item.product_id,
        sub_product_id: item.sub_product_id,
        size_id: item.size_id,
        tenant_id: item.tenant_id,
        quantity: item.quantity,
        price_at_addition: item.price_at_addition,
        discount_applied: item.discount_applied,
        max_available_at_addition: item.max_available_at_addition,
        line_total: item.line_total(),
        added_at: item.added_at,
        product_name: product.as_ref().map(|p| p.name.clone()),
        product_slug: product.as_ref().map(|p| p.slug.clone()),
        sku: sub_product.as_ref().map(|s| s.sku.clone()),
        tenant_name: tenant.as_ref().map(|t| t.name.clone()),
        tenant_logo_url: tenant.as_ref().and_then(|t| t.logo_url.clone()),
        tenant_status: tenant.as_ref().map(|t| t.status.to_string()),
        size_label: size.as_ref().map(|s| s.label.clone()),
        current_price: size.as_ref().map(|s| s.price),
        current_stock: size.as_ref().map(|s| s.stock),
        in_stock: size.as_ref().map(|s| s.in_stock),
        still_available,
    })
}

pub async fn project<C: CatalogReader>(catalog: &C, cart: &Cart) -> Result<CartView> {
    let mut items = Vec::with_capacity(cart.items.len());
    for item in &cart.items {
        items.push(project_line(catalog, item).await?);
    }
    Ok(CartView {
        id: Some(cart.id),
        user_id: cart.user_id.clone(),
        items,
        subtotal: cart.subtotal,
        discount_total: cart.discount_total,
        estimated_shipping: cart.estimated_shipping,
        estimated_tax: cart.estimated_tax,
        estimated_total: cart.estimated_total,
        coupon: cart.coupon,
        status: cart.status,
        is_empty: cart.is_empty(),
    })
}

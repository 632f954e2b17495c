//! Postgres store implementations (sqlx).
//!
//! Cart items are persisted as a JSONB column on the cart row, mirroring the
//! embedded-document shape the aggregate has in memory. Catalog tables are
//! owned by the catalog service; this module only reads them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::cart::{Cart, CartStatus, LineItem};
use crate::domain::catalog::{Product, Size, SubProduct, Tenant};
use crate::error::{CartError, Result};
use crate::store::{CartStore, CatalogReader};

fn bad_row(what: &str, err: impl std::fmt::Display) -> CartError {
    CartError::Store(format!("invalid {what} row: {err}"))
}

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    slug: String,
    status: String,
    created_at: DateTime<Utc>,
}

impl ProductRow {
    fn into_product(self) -> Result<Product> {
        Ok(Product {
            id: self.id,
            name: self.name,
            slug: self.slug,
            status: self.status.parse().map_err(|e| bad_row("product", e))?,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TenantRow {
    id: Uuid,
    name: String,
    logo_url: Option<String>,
    status: String,
    subscription: String,
}

impl TenantRow {
    fn into_tenant(self) -> Result<Tenant> {
        Ok(Tenant {
            id: self.id,
            name: self.name,
            logo_url: self.logo_url,
            status: self.status.parse().map_err(|e| bad_row("tenant", e))?,
            subscription: self.subscription.parse().map_err(|e| bad_row("tenant", e))?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SubProductRow {
    id: Uuid,
    product_id: Uuid,
    tenant_id: Uuid,
    sku: String,
    active: bool,
}

impl SubProductRow {
    fn into_sub_product(self) -> SubProduct {
        SubProduct {
            id: self.id,
            product_id: self.product_id,
            tenant_id: self.tenant_id,
            sku: self.sku,
            active: self.active,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SizeRow {
    id: Uuid,
    sub_product_id: Uuid,
    label: String,
    price: Decimal,
    discount: Decimal,
    stock: i32,
    in_stock: bool,
    min_order_quantity: i32,
    max_order_quantity: i32,
}

impl SizeRow {
    fn into_size(self) -> Size {
        Size {
            id: self.id,
            sub_product_id: self.sub_product_id,
            label: self.label,
            price: self.price,
            discount: self.discount,
            stock: self.stock,
            in_stock: self.in_stock,
            min_order_quantity: self.min_order_quantity.max(0) as u32,
            max_order_quantity: self.max_order_quantity.max(0) as u32,
        }
    }
}

#[derive(Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl CatalogReader for PgCatalog {
    async fn product(&self, id: Uuid) -> Result<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(
            "SELECT id, name, slug, status, created_at FROM products WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(ProductRow::into_product).transpose()
    }

    async fn sub_product(&self, id: Uuid) -> Result<Option<SubProduct>> {
        let row = sqlx::query_as::<_, SubProductRow>(
            "SELECT id, product_id, tenant_id, sku, active FROM sub_products WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(SubProductRow::into_sub_product))
    }

    async fn size(&self, id: Uuid) -> Result<Option<Size>> {
        let row = sqlx::query_as::<_, SizeRow>(
            "SELECT id, sub_product_id, label, price, discount, stock, in_stock, \
             min_order_quantity, max_order_quantity FROM sizes WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(SizeRow::into_size))
    }

    async fn tenant(&self, id: Uuid) -> Result<Option<Tenant>> {
        let row = sqlx::query_as::<_, TenantRow>(
            "SELECT id, name, logo_url, status, subscription FROM tenants WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(TenantRow::into_tenant).transpose()
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CartRow {
    id: Uuid,
    user_id: String,
    items: serde_json::Value,
    subtotal: Decimal,
    discount_total: Decimal,
    estimated_shipping: Decimal,
    estimated_tax: Decimal,
    estimated_total: Decimal,
    coupon: Option<Uuid>,
    status: String,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl CartRow {
    fn into_cart(self) -> Result<Cart> {
        let items: Vec<LineItem> = serde_json::from_value(self.items)?;
        let status: CartStatus = self.status.parse().map_err(|e| bad_row("cart", e))?;
        Ok(Cart {
            id: self.id,
            user_id: self.user_id,
            items,
            subtotal: self.subtotal,
            discount_total: self.discount_total,
            estimated_shipping: self.estimated_shipping,
            estimated_tax: self.estimated_tax,
            estimated_total: self.estimated_total,
            coupon: self.coupon,
            status,
            expires_at: self.expires_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Clone)]
pub struct PgCartStore {
    pool: PgPool,
}

impl PgCartStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl CartStore for PgCartStore {
    async fn find_by_user(&self, user_id: &str) -> Result<Option<Cart>> {
        let row = sqlx::query_as::<_, CartRow>(
            "SELECT id, user_id, items, subtotal, discount_total, estimated_shipping, \
             estimated_tax, estimated_total, coupon, status, expires_at, created_at, updated_at \
             FROM carts WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(CartRow::into_cart).transpose()
    }

    async fn upsert(&self, cart: &Cart) -> Result<()> {
        let items = serde_json::to_value(&cart.items)?;
        sqlx::query(
            "INSERT INTO carts (id, user_id, items, subtotal, discount_total, \
             estimated_shipping, estimated_tax, estimated_total, coupon, status, \
             expires_at, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             ON CONFLICT (user_id) DO UPDATE SET \
             items = EXCLUDED.items, subtotal = EXCLUDED.subtotal, \
             discount_total = EXCLUDED.discount_total, \
             estimated_shipping = EXCLUDED.estimated_shipping, \
             estimated_tax = EXCLUDED.estimated_tax, \
             estimated_total = EXCLUDED.estimated_total, \
             coupon = EXCLUDED.coupon, status = EXCLUDED.status, \
             expires_at = EXCLUDED.expires_at, updated_at = EXCLUDED.updated_at",
        )
        .bind(cart.id)
        .bind(&cart.user_id)
        .bind(items)
        .bind(cart.subtotal)
        .bind(cart.discount_total)
        .bind(cart.estimated_shipping)
        .bind(cart.estimated_tax)
        .bind(cart.estimated_total)
        .bind(cart.coupon)
        .bind(cart.status.as_str())
        .bind(cart.expires_at)
        .bind(cart.created_at)
        .bind(cart.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

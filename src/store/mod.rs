//! Storage seam.
//!
//! The mutation service is generic over these traits so the same business
//! logic runs against Postgres in production and the in-memory store in
//! tests. Catalog access is read-only by construction: the trait exposes no
//! writers.

use std::future::Future;
use uuid::Uuid;

use crate::domain::cart::Cart;
use crate::domain::catalog::{Product, Size, SubProduct, Tenant};
use crate::error::Result;

pub mod memory;
pub mod postgres;

pub use memory::{MemoryCartStore, MemoryCatalog};
pub use postgres::{PgCartStore, PgCatalog};

/// Read-only lookups against the catalog.
pub trait CatalogReader: Send + Sync {
    fn product(&self, id: Uuid) -> impl Future<Output = Result<Option<Product>>> + Send;
    fn sub_product(&self, id: Uuid) -> impl Future<Output = Result<Option<SubProduct>>> + Send;
    fn size(&self, id: Uuid) -> impl Future<Output = Result<Option<Size>>> + Send;
    fn tenant(&self, id: Uuid) -> impl Future<Output = Result<Option<Tenant>>> + Send;
}

/// Persistence for the cart aggregate. One row per user; the whole aggregate
/// is written back on every mutation (last writer wins).
pub trait CartStore: Send + Sync {
    fn find_by_user(&self, user_id: &str) -> impl Future<Output = Result<Option<Cart>>> + Send;
    fn upsert(&self, cart: &Cart) -> impl Future<Output = Result<()>> + Send;
}

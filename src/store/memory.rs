//! In-memory store implementations, used by tests and local demos.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

use crate::domain::cart::Cart;
use crate::domain::catalog::{Product, Size, SubProduct, Tenant};
use crate::error::{CartError, Result};
use crate::store::{CartStore, CatalogReader};

fn poisoned() -> CartError {
    CartError::Store("memory store lock poisoned".into())
}

#[derive(Default)]
struct CatalogData {
    products: HashMap<Uuid, Product>,
    sub_products: HashMap<Uuid, SubProduct>,
    sizes: HashMap<Uuid, Size>,
    tenants: HashMap<Uuid, Tenant>,
}

#[derive(Clone, Default)]
pub struct MemoryCatalog {
    inner: Arc<RwLock<CatalogData>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_product(&self, product: Product) {
        if let Ok(mut data) = self.inner.write() {
            data.products.insert(product.id, product);
        }
    }

    pub fn insert_sub_product(&self, sub_product: SubProduct) {
        if let Ok(mut data) = self.inner.write() {
            data.sub_products.insert(sub_product.id, sub_product);
        }
    }

    pub fn insert_size(&self, size: Size) {
        if let Ok(mut data) = self.inner.write() {
            data.sizes.insert(size.id, size);
        }
    }

    pub fn insert_tenant(&self, tenant: Tenant) {
        if let Ok(mut data) = self.inner.write() {
            data.tenants.insert(tenant.id, tenant);
        }
    }

    /// Overwrite an existing size, e.g. to simulate a catalog price or stock
    /// change between two cart mutations.
    pub fn update_size(&self, size: Size) {
        self.insert_size(size);
    }
}

impl CatalogReader for MemoryCatalog {
    async fn product(&self, id: Uuid) -> Result<Option<Product>> {
        let data = self.inner.read().map_err(|_| poisoned())?;
        Ok(data.products.get(&id).cloned())
    }

    async fn sub_product(&self, id: Uuid) -> Result<Option<SubProduct>> {
        let data = self.inner.read().map_err(|_| poisoned())?;
        Ok(data.sub_products.get(&id).cloned())
    }

    async fn size(&self, id: Uuid) -> Result<Option<Size>> {
        let data = self.inner.read().map_err(|_| poisoned())?;
        Ok(data.sizes.get(&id).cloned())
    }

    async fn tenant(&self, id: Uuid) -> Result<Option<Tenant>> {
        let data = self.inner.read().map_err(|_| poisoned())?;
        Ok(data.tenants.get(&id).cloned())
    }
}

#[derive(Clone, Default)]
pub struct MemoryCartStore {
    inner: Arc<RwLock<HashMap<String, Cart>>>,
}

impl MemoryCartStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CartStore for MemoryCartStore {
    async fn find_by_user(&self, user_id: &str) -> Result<Option<Cart>> {
        let carts = self.inner.read().map_err(|_| poisoned())?;
        Ok(carts.get(user_id).cloned())
    }

    async fn upsert(&self, cart: &Cart) -> Result<()> {
        let mut carts = self.inner.write().map_err(|_| poisoned())?;
        carts.insert(cart.user_id.clone(), cart.clone());
        Ok(())
    }
}

//! SipStream cart service
//!
//! Cart pricing and consistency engine for a multi-tenant beverage
//! marketplace: add/update/remove/sync of cart line items against a
//! multi-size, mutable-price catalog.
//!
//! ## Core guarantees
//! - A line item's `price_at_addition` never silently changes after it is
//!   added, even when the catalog price does.
//! - Two adds with the same `(product, sub-product, size)` identity merge by
//!   summing quantity; the merged total is re-validated against stock and
//!   order limits.
//! - `subtotal`/`estimated_total` are recomputed by a single code path on
//!   every mutation.
//! - Cart reads always return a shape; a missing cart is an empty cart.

pub mod config;
pub mod domain;
pub mod error;
pub mod http;
pub mod local;
pub mod projection;
pub mod service;
pub mod sink;
pub mod store;

pub use error::{CartError, Result};
pub use service::{CartService, IncomingItem, SyncOutcome};

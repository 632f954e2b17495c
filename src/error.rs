//! Error taxonomy for cart operations.
//!
//! Three caller-facing kinds map one-to-one onto HTTP statuses: validation
//! (400), not-found (404) and conflict (409). Catalog ineligibility (hidden
//! product, inactive listing, suspended tenant) is reported as not-found so
//! the client cannot distinguish "does not exist" from "exists but hidden".

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CartError {
    /// Malformed, client-correctable input: quantity out of bounds, missing
    /// identity fields.
    #[error("{0}")]
    Validation(String),

    /// Referenced product/subproduct/size/cart/item is missing or ineligible.
    #[error("{0}")]
    NotFound(String),

    /// Valid identity, but a stock or availability constraint blocks the
    /// operation.
    #[error("{0}")]
    Conflict(String),

    /// Persistence failure. Never constructed from business rules.
    #[error("storage error: {0}")]
    Store(String),
}

impl CartError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
}

impl From<sqlx::Error> for CartError {
    fn from(err: sqlx::Error) -> Self {
        Self::Store(err.to_string())
    }
}

impl From<serde_json::Error> for CartError {
    fn from(err: serde_json::Error) -> Self {
        Self::Store(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CartError>;

//! Read-only catalog entities.
//!
//! The cart core never mutates any of these; they supply the authoritative
//! price, stock and eligibility at the moment of a cart mutation. Stock
//! decrement happens at order fulfilment, outside this service.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    Draft,
    Pending,
    Approved,
    Archived,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TenantStatus {
    Pending,
    Approved,
    Suspended,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Trialing,
    PastDue,
    Canceled,
}

macro_rules! text_enum {
    ($ty:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self { $(Self::$variant => $text),+ }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = String;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(format!(concat!("unknown ", stringify!($ty), ": {}"), other)),
                }
            }
        }
    };
}

text_enum!(ProductStatus {
    Draft => "draft",
    Pending => "pending",
    Approved => "approved",
    Archived => "archived",
});

text_enum!(TenantStatus {
    Pending => "pending",
    Approved => "approved",
    Suspended => "suspended",
});

text_enum!(SubscriptionStatus {
    Active => "active",
    Trialing => "trialing",
    PastDue => "past_due",
    Canceled => "canceled",
});

/// Global catalog product. Only `Approved` products are purchasable.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub status: ProductStatus,
    pub created_at: DateTime<Utc>,
}

impl Product {
    pub fn is_purchasable(&self) -> bool {
        self.status == ProductStatus::Approved
    }
}

/// A seller on the marketplace.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
    pub logo_url: Option<String>,
    pub status: TenantStatus,
    pub subscription: SubscriptionStatus,
}

impl Tenant {
    /// A tenant may sell only while approved and on an active or trialing
    /// subscription.
    pub fn is_eligible(&self) -> bool {
        self.status == TenantStatus::Approved
            && matches!(
                self.subscription,
                SubscriptionStatus::Active | SubscriptionStatus::Trialing
            )
    }
}

/// A tenant's listing of a product, carrying the tenant-specific SKU.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubProduct {
    pub id: Uuid,
    pub product_id: Uuid,
    pub tenant_id: Uuid,
    pub sku: String,
    pub active: bool,
}

/// A sellable volume variant of a sub-product with its own price and stock.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Size {
    pub id: Uuid,
    pub sub_product_id: Uuid,
    pub label: String,
    pub price: Decimal,
    pub discount: Decimal,
    pub stock: i32,
    pub in_stock: bool,
    pub min_order_quantity: u32,
    pub max_order_quantity: u32,
}

impl Size {
    pub fn available_stock(&self) -> i32 {
        if self.in_stock {
            self.stock.max(0)
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_eligibility_requires_approval_and_live_subscription() {
        let mut tenant = Tenant {
            id: Uuid::new_v4(),
            name: "Brew Bros".into(),
            logo_url: None,
            status: TenantStatus::Approved,
            subscription: SubscriptionStatus::Trialing,
        };
        assert!(tenant.is_eligible());
        tenant.subscription = SubscriptionStatus::PastDue;
        assert!(!tenant.is_eligible());
        tenant.subscription = SubscriptionStatus::Active;
        tenant.status = TenantStatus::Suspended;
        assert!(!tenant.is_eligible());
    }

    #[test]
    fn status_round_trips_through_text() {
        assert_eq!(
            "past_due".parse::<SubscriptionStatus>().unwrap(),
            SubscriptionStatus::PastDue
        );
        assert_eq!(ProductStatus::Approved.as_str(), "approved");
        assert!("bogus".parse::<TenantStatus>().is_err());
    }

    #[test]
    fn out_of_stock_flag_zeroes_availability() {
        let size = Size {
            id: Uuid::new_v4(),
            sub_product_id: Uuid::new_v4(),
            label: "330ml".into(),
            price: Decimal::new(450, 2),
            discount: Decimal::ZERO,
            stock: 12,
            in_stock: false,
            min_order_quantity: 1,
            max_order_quantity: 24,
        };
        assert_eq!(size.available_stock(), 0);
    }
}

//! Domain events emitted by cart mutations.
//!
//! These feed the best-effort side channel (denormalized per-user item count,
//! analytics). Delivery failure is logged and swallowed; it never fails the
//! mutation that produced the event.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CartEvent {
    /// The user's active-item count changed; consumers refresh the
    /// denormalized counter on the user record.
    ItemCountChanged { user_id: String, count: u32 },
    ItemAdded {
        user_id: String,
        product_id: Uuid,
        size_id: Uuid,
        quantity: u32,
    },
    Cleared { user_id: String },
}

impl CartEvent {
    /// NATS subject the event is published on.
    pub fn subject(&self) -> &'static str {
        match self {
            Self::ItemCountChanged { .. } => "cart.item_count_changed",
            Self::ItemAdded { .. } => "cart.item_added",
            Self::Cleared { .. } => "cart.cleared",
        }
    }
}

//! Best-effort event delivery.
//!
//! Cart events (item-count denormalization, analytics) are a display
//! optimization, not a correctness requirement. The service publishes through
//! this seam and logs-and-swallows any failure; sink errors never reach the
//! mutation's caller.

use std::future::Future;
use std::sync::{Arc, RwLock};

use crate::domain::events::CartEvent;

pub trait EventSink: Send + Sync {
    fn publish(&self, event: &CartEvent) -> impl Future<Output = Result<(), String>> + Send;
}

/// Publishes events as JSON to NATS. With no configured endpoint the sink is
/// disabled and publishing is a no-op.
#[derive(Clone)]
pub struct NatsSink {
    client: Option<async_nats::Client>,
}

impl NatsSink {
    pub fn new(client: async_nats::Client) -> Self {
        Self {
            client: Some(client),
        }
    }

    pub fn disabled() -> Self {
        Self { client: None }
    }
}

impl EventSink for NatsSink {
    async fn publish(&self, event: &CartEvent) -> Result<(), String> {
        let Some(client) = &self.client else {
            return Ok(());
        };
        let payload = serde_json::to_vec(event).map_err(|e| e.to_string())?;
        client
            .publish(event.subject().to_string(), payload.into())
            .await
            .map_err(|e| e.to_string())
    }
}

#[derive(Clone, Copy, Default)]
pub struct NoopSink;

impl EventSink for NoopSink {
    async fn publish(&self, _event: &CartEvent) -> Result<(), String> {
        Ok(())
    }
}

/// Captures published events in memory; used by tests to assert on the
/// side-channel without a broker.
#[derive(Clone, Default)]
pub struct RecordingSink {
    events: Arc<RwLock<Vec<CartEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<CartEvent> {
        self.events.read().map(|e| e.clone()).unwrap_or_default()
    }
}

impl EventSink for RecordingSink {
    async fn publish(&self, event: &CartEvent) -> Result<(), String> {
        self.events
            .write()
            .map_err(|_| "recording sink lock poisoned".to_string())?
            .push(event.clone());
        Ok(())
    }
}

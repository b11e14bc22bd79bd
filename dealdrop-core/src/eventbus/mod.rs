//! src/eventbus/mod.rs
//!
//! In-process event bus with guaranteed delivery to multiple subscribers
//! via bounded MPSC queues. Notification/analytics collaborators subscribe
//! here; the engine never calls them directly.

use std::sync::Arc;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, mpsc, watch};
use uuid::Uuid;

/// Claim/slot lifecycle events published by the engine.
#[derive(Debug, Clone, Serialize)]
pub enum DealEvent {
    ClaimReserved {
        claim_id: Uuid,
        user_id: Uuid,
        offer_id: Uuid,
        slot_id: Uuid,
        expires_at: DateTime<Utc>,
    },
    ClaimRedeemed {
        claim_id: Uuid,
        user_id: Uuid,
        offer_id: Uuid,
        slot_id: Uuid,
        staff_id: Option<Uuid>,
        redeemed_at: DateTime<Utc>,
    },
    ClaimExpired {
        claim_id: Uuid,
        slot_id: Uuid,
        expired_at: DateTime<Utc>,
    },
    ClaimCancelled {
        claim_id: Uuid,
        slot_id: Uuid,
        cancelled_at: DateTime<Utc>,
    },
    /// A successful reservation left the slot at or below the configured
    /// low-stock threshold.
    SlotLowStock {
        slot_id: Uuid,
        offer_id: Uuid,
        remaining: i32,
    },
    /// System-wide message for debugging or administration.
    SystemMessage(String),
    /// Periodic heartbeat.
    Tick,
}

impl DealEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            DealEvent::ClaimReserved { .. } => "claim.reserved",
            DealEvent::ClaimRedeemed { .. } => "claim.redeemed",
            DealEvent::ClaimExpired { .. } => "claim.expired",
            DealEvent::ClaimCancelled { .. } => "claim.cancelled",
            DealEvent::SlotLowStock { .. } => "slot.low_stock",
            DealEvent::SystemMessage(_) => "system_message",
            DealEvent::Tick => "tick",
        }
    }

    /// JSON shape for sinks that persist or forward events (notification
    /// delivery, audit logging).
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "type": self.event_type(),
            "payload": self,
        })
    }
}

/// Each subscriber gets its own `mpsc::Sender<DealEvent>` for guaranteed
/// delivery.
///
/// - If the subscriber's channel buffer fills, `publish` will await
///   until there's space (backpressure).
/// - If the subscriber has dropped the `Receiver`, the channel is closed
///   and sending returns an error.
#[derive(Clone)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<mpsc::Sender<DealEvent>>>>,
    shutdown_tx: watch::Sender<bool>,
    pub shutdown_rx: watch::Receiver<bool>,
}

/// Default size for each subscriber's buffer.
const DEFAULT_BUFFER_SIZE: usize = 10000;

impl EventBus {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            subscribers: Arc::new(Mutex::new(vec![])),
            shutdown_tx: tx,
            shutdown_rx: rx,
        }
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.shutdown_rx.borrow()
    }

    /// Returns a receiver on which events will be delivered.
    pub async fn subscribe(&self, buffer_size: Option<usize>) -> mpsc::Receiver<DealEvent> {
        let size = buffer_size.unwrap_or(DEFAULT_BUFFER_SIZE);
        let (tx, rx) = mpsc::channel(size);
        let mut subs = self.subscribers.lock().await;
        subs.push(tx);
        rx
    }

    /// Publish an event to all subscribers.
    pub async fn publish(&self, event: DealEvent) {
        let senders = {
            let subs = self.subscribers.lock().await;
            subs.clone()
        };
        for s in senders {
            let _ = s.send(event.clone()).await;
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

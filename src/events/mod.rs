use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::DeliveryTier;

/// Events emitted by the checkout and order services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    CheckoutStarted {
        user_id: Uuid,
    },
    CheckoutCancelled {
        user_id: Uuid,
    },
    CouponApplied {
        user_id: Uuid,
        code: String,
    },
    CouponRemoved {
        user_id: Uuid,
    },
    ShippingSelected {
        user_id: Uuid,
        tier: DeliveryTier,
    },
    ShippingRemoved {
        user_id: Uuid,
    },
    CheckoutCompleted {
        user_id: Uuid,
        order_id: Uuid,
    },
    OrderCreated {
        order_id: Uuid,
        order_number: String,
    },
    OrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },
    OrderCancelled {
        order_id: Uuid,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging on failure. Event delivery is best-effort and
    /// never fails the originating operation.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(err) = self.send(event).await {
            warn!("{}", err);
        }
    }
}

/// Drains the event channel, recording each event in the log.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        info!(event = ?event, "processing event");
    }
    info!("event channel closed; processor exiting");
}

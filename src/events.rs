use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Domain events published after a committed operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    DocumentCreated {
        document_id: i64,
        number: String,
        document_type: String,
    },
    DocumentCancelled {
        document_id: i64,
        number: String,
    },
    StockAdjusted {
        item_id: i64,
        warehouse_id: i64,
        movement_type: String,
        quantity: Decimal,
        new_quantity: Decimal,
    },
}

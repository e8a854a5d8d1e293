use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Domain events emitted after a reconciliation transaction commits.
///
/// Consumers (notification senders, audit sinks) live outside this crate;
/// events never carry enough authority to mutate stock themselves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    ProductCreated(Uuid),
    ProductUpdated(Uuid),
    ProductDeleted(Uuid),

    ReservationCreated(Uuid),
    ReservationMerged {
        reservation_id: Uuid,
        added_quantity: i32,
        merged_quantity: i32,
    },
    ReservationUpdated(Uuid),
    ReservationDeleted {
        reservation_id: Uuid,
        restored_quantity: i32,
    },
    ReservationStatusChanged {
        reservation_id: Uuid,
        old_status: String,
        new_status: String,
    },

    DamageRecorded {
        target_id: Uuid,
        target: DamageTarget,
        amount: i32,
    },

    SaleRecorded {
        sale_id: Uuid,
        product_id: Uuid,
        reservation_id: Option<Uuid>,
        quantity: i32,
    },
    SaleDeleted {
        sale_id: Uuid,
        restored_quantity: i32,
    },

    InvoiceCreated {
        invoice_id: Uuid,
        invoice_number: String,
    },
    InvoiceStatusChanged {
        invoice_id: Uuid,
        old_status: String,
        new_status: String,
    },
    InvoiceDeleted(Uuid),

    ReturnCreated(Uuid),
    ReturnDeleted(Uuid),

    ClientCreated(Uuid),
}

/// Which entity absorbed a damage mark.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum DamageTarget {
    Product,
    Reservation,
}

/// Sends events to whichever consumer is wired to the channel.
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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_arrive_in_send_order() {
        let (tx, mut rx) = mpsc::channel(8);
        let sender = EventSender::new(tx);

        let id = Uuid::new_v4();
        sender.send(Event::ReservationCreated(id)).await.unwrap();
        sender
            .send(Event::ReservationDeleted {
                reservation_id: id,
                restored_quantity: 3,
            })
            .await
            .unwrap();

        assert!(matches!(rx.recv().await, Some(Event::ReservationCreated(got)) if got == id));
        assert!(matches!(
            rx.recv().await,
            Some(Event::ReservationDeleted { restored_quantity: 3, .. })
        ));
    }

    #[tokio::test]
    async fn send_fails_once_receiver_is_gone() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);
        assert!(sender.send(Event::ProductCreated(Uuid::new_v4())).await.is_err());
    }
}

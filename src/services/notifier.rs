use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Events published toward the marketplace's notification channel.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Notification {
    #[serde(rename = "FLASH_MARKET_CREATED")]
    FlashMarketCreated {
        #[serde(rename = "marketId")]
        market_id: Uuid,
        #[serde(rename = "itemId")]
        item_id: Uuid,
        velocity: f64,
        #[serde(rename = "endTime")]
        end_time: DateTime<Utc>,
    },
}

/// Broadcast bus for notifications. Passed by reference to producers;
/// consumers (the WebSocket fan-out, tests) subscribe for their own
/// receiver. Publishing with no subscribers is not an error.
#[derive(Debug, Clone)]
pub struct NotificationBus {
    tx: broadcast::Sender<Notification>,
}

impl NotificationBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, notification: Notification) {
        match self.tx.send(notification) {
            Ok(receivers) => {
                tracing::debug!(receivers, "Notification published");
            }
            Err(_) => {
                tracing::debug!("Notification dropped, no subscribers");
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_published_notifications() {
        let bus = NotificationBus::new(16);
        let mut rx = bus.subscribe();

        let market_id = Uuid::new_v4();
        bus.publish(Notification::FlashMarketCreated {
            market_id,
            item_id: Uuid::new_v4(),
            velocity: 7.5,
            end_time: Utc::now(),
        });

        let received = rx.recv().await.unwrap();
        let Notification::FlashMarketCreated { market_id: got, .. } = received;
        assert_eq!(got, market_id);
    }

    #[test]
    fn publish_without_subscribers_does_not_panic() {
        let bus = NotificationBus::new(16);
        bus.publish(Notification::FlashMarketCreated {
            market_id: Uuid::new_v4(),
            item_id: Uuid::new_v4(),
            velocity: 1.0,
            end_time: Utc::now(),
        });
    }

    #[test]
    fn serializes_with_wire_field_names() {
        let n = Notification::FlashMarketCreated {
            market_id: Uuid::nil(),
            item_id: Uuid::nil(),
            velocity: 2.0,
            end_time: Utc::now(),
        };
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["type"], "FLASH_MARKET_CREATED");
        assert!(json.get("marketId").is_some());
        assert!(json.get("endTime").is_some());
    }
}

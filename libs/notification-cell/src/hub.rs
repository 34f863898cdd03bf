use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

pub const NEW_APPOINTMENT: &str = "new-appointment";
pub const APPOINTMENT_UPDATED: &str = "appointment-updated";

pub type NotificationSender = broadcast::Sender<String>;
pub type NotificationReceiver = broadcast::Receiver<String>;

/// Named event pushed to a recipient's channel, serialized as JSON text.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationEvent {
    pub event: String,
    pub payload: Value,
    pub sent_at: DateTime<Utc>,
}

/// In-process pub/sub keyed by recipient user id. One broadcast channel per
/// recipient, created lazily on first subscribe. Delivery is best-effort:
/// emitting to an absent channel or one with no live receivers drops the
/// event without surfacing an error to the caller.
pub struct NotificationHub {
    channels: RwLock<HashMap<Uuid, NotificationSender>>,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
        }
    }

    pub async fn subscribe(&self, user_id: Uuid) -> NotificationReceiver {
        let mut channels = self.channels.write().await;
        let sender = channels
            .entry(user_id)
            .or_insert_with(|| broadcast::channel(64).0);

        debug!("Subscribed to notification channel for {}", user_id);
        sender.subscribe()
    }

    pub async fn emit(&self, user_id: Uuid, event: &str, payload: Value) {
        let message = NotificationEvent {
            event: event.to_string(),
            payload,
            sent_at: Utc::now(),
        };

        let encoded = match serde_json::to_string(&message) {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to encode {} notification for {}: {}", event, user_id, e);
                return;
            }
        };

        let channels = self.channels.read().await;
        match channels.get(&user_id) {
            Some(sender) => {
                if sender.send(encoded).is_err() {
                    debug!("No live subscribers for {} ({})", user_id, event);
                }
            }
            None => debug!("No notification channel for {} ({})", user_id, event),
        }
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn subscriber_receives_named_event() {
        let hub = NotificationHub::new();
        let recipient = Uuid::new_v4();

        let mut receiver = hub.subscribe(recipient).await;
        hub.emit(recipient, NEW_APPOINTMENT, json!({"id": "a-1"})).await;

        let raw = receiver.try_recv().expect("event should be queued");
        let event: Value = serde_json::from_str(&raw).expect("event is JSON");
        assert_eq!(event["event"], NEW_APPOINTMENT);
        assert_eq!(event["payload"]["id"], "a-1");
    }

    #[tokio::test]
    async fn emit_without_channel_is_a_no_op() {
        let hub = NotificationHub::new();

        // Nothing to assert beyond "does not panic or block".
        hub.emit(Uuid::new_v4(), APPOINTMENT_UPDATED, json!({})).await;
    }

    #[tokio::test]
    async fn channels_are_isolated_per_recipient() {
        let hub = NotificationHub::new();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        let mut first_rx = hub.subscribe(first).await;
        let mut second_rx = hub.subscribe(second).await;

        hub.emit(first, NEW_APPOINTMENT, json!({"id": "a-2"})).await;

        assert!(first_rx.try_recv().is_ok());
        assert!(second_rx.try_recv().is_err());
    }
}

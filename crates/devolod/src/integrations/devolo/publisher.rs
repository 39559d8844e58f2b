use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::PoisonError;

use tokio::sync::mpsc;
use tracing::debug;

use super::home_control::Message;

/// A message delivered to one subscribed entity
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    /// Unique id of the entity the message is for
    pub unique_id: String,
    pub message: Message,
}

/// Subscription of one entity to a device's messages
#[derive(Debug, Clone)]
pub struct Subscriber {
    unique_id: String,
    tx: mpsc::UnboundedSender<Notification>,
}

impl Subscriber {
    pub fn new(unique_id: impl Into<String>, tx: mpsc::UnboundedSender<Notification>) -> Self {
        Self {
            unique_id: unique_id.into(),
            tx,
        }
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    /// Returns false once the receiving side is gone
    fn update(&self, message: &Message) -> bool {
        self.tx
            .send(Notification {
                unique_id: self.unique_id.clone(),
                message: message.clone(),
            })
            .is_ok()
    }
}

/// Fan-out of gateway messages to subscribers, keyed by device UID
#[derive(Debug, Default)]
pub struct Publisher {
    events: Mutex<HashMap<String, Vec<Subscriber>>>,
}

impl Publisher {
    pub fn new(device_uids: impl IntoIterator<Item = String>) -> Self {
        Self {
            events: Mutex::new(
                device_uids
                    .into_iter()
                    .map(|uid| (uid, Vec::new()))
                    .collect(),
            ),
        }
    }

    /// Subscribe to a device. A previous subscription with the same unique id is replaced.
    pub fn register(&self, device_uid: &str, subscriber: Subscriber) {
        let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        let subscribers = events.entry(device_uid.to_string()).or_default();
        subscribers.retain(|s| s.unique_id != subscriber.unique_id);
        debug!(
            "{} subscribed to {}",
            subscriber.unique_id, device_uid
        );
        subscribers.push(subscriber);
    }

    /// Returns whether a subscription was removed
    pub fn unregister(&self, device_uid: &str, unique_id: &str) -> bool {
        let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(subscribers) = events.get_mut(device_uid) else {
            return false;
        };
        let before = subscribers.len();
        subscribers.retain(|s| s.unique_id != unique_id);
        before != subscribers.len()
    }

    /// Deliver a message to every subscriber of a device.
    ///
    /// Subscribers whose receiver has been dropped are pruned. Returns the number
    /// of subscribers the message reached.
    pub fn dispatch(&self, device_uid: &str, message: Message) -> usize {
        let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(subscribers) = events.get_mut(device_uid) else {
            debug!("No subscribers for {}, dropping {}", device_uid, message);
            return 0;
        };
        subscribers.retain(|subscriber| subscriber.update(&message));
        subscribers.len()
    }

    pub fn subscriber_count(&self, device_uid: &str) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(device_uid)
            .map_or(0, Vec::len)
    }
}

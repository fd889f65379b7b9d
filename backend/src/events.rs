//! Publish/subscribe side of the service.
//!
//! Outbound notifications go through [`EventBus`], a broadcast channel that
//! the `/events` stream fans out to subscribers. The subscription
//! announcement is retained and replayed to every new subscriber. Inbound
//! events arrive on `/events/<topic>` and are handed to [`handle_event`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use tokio::sync::{broadcast, watch};
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::store::VoteStore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub topic: String,
    pub payload: Value,
    #[serde(with = "time::serde::rfc3339")]
    pub published_at: OffsetDateTime,
}

#[derive(Debug)]
pub struct EventBus {
    tx: broadcast::Sender<Notification>,
    retained: watch::Sender<Option<Notification>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        let (retained, _) = watch::channel(None);
        Self { tx, retained }
    }

    /// Fire and forget. Having nobody listening is not an error.
    pub fn publish<T: Serialize + ?Sized>(&self, topic: &str, payload: &T) {
        if let Some(notification) = notify(topic, payload) {
            self.send(notification);
        }
    }

    /// Like [`publish`](Self::publish), but the event is also handed to every
    /// later subscriber before any live event.
    pub fn publish_retained<T: Serialize + ?Sized>(&self, topic: &str, payload: &T) {
        if let Some(notification) = notify(topic, payload) {
            self.retained.send_replace(Some(notification.clone()));
            self.send(notification);
        }
    }

    pub fn retained(&self) -> Option<Notification> {
        self.retained.borrow().clone()
    }

    pub fn subscribe(&self) -> Subscription {
        let rx = self.tx.subscribe();
        Subscription {
            pending: self.retained(),
            rx,
        }
    }

    fn send(&self, notification: Notification) {
        let topic = notification.topic.clone();
        match self.tx.send(notification) {
            Ok(receivers) => debug!(topic = %topic, receivers, "Published event"),
            Err(_) => debug!(topic = %topic, "Published event with no subscribers"),
        }
    }
}

fn notify<T: Serialize + ?Sized>(topic: &str, payload: &T) -> Option<Notification> {
    match serde_json::to_value(payload) {
        Ok(payload) => Some(Notification {
            topic: topic.to_string(),
            payload,
            published_at: OffsetDateTime::now_utc(),
        }),
        Err(e) => {
            error!(topic, "Failed to encode event payload: {}", e);
            None
        }
    }
}

/// One subscriber's view of the bus: the retained event first, then live ones.
#[derive(Debug)]
pub struct Subscription {
    pending: Option<Notification>,
    rx: broadcast::Receiver<Notification>,
}

impl Subscription {
    pub async fn recv(&mut self) -> Result<Notification, RecvError> {
        match self.pending.take() {
            Some(notification) => Ok(notification),
            None => self.rx.recv().await,
        }
    }

    pub fn try_recv(&mut self) -> Result<Notification, TryRecvError> {
        match self.pending.take() {
            Some(notification) => Ok(notification),
            None => self.rx.try_recv(),
        }
    }
}

/// Tells the gateway which of our topics it should forward. Retained, so a
/// gateway that connects after startup still receives it.
pub fn announce_subscriptions(bus: &EventBus, config: &Config) {
    let topics = config.subscriptions();
    info!("Announcing subscriptions {:?} on {}", topics, config.subscriptions_topic);
    bus.publish_retained(&config.subscriptions_topic, &topics);
}

/// Event bodies are JSON when they parse, raw text otherwise.
pub fn decode_payload(body: &str) -> Value {
    serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string()))
}

pub fn handle_event(votes: &VoteStore, config: &Config, topic: &str, payload: Value) {
    if topic != config.delete_topic {
        debug!(topic, "Ignoring event with no listener");
        return;
    }

    match payload {
        Value::String(entity_id) => delete_votes(votes, &entity_id),
        other => warn!(topic, "Delete event without an entity id: {}", other),
    }
}

fn delete_votes(votes: &VoteStore, entity_id: &str) {
    let mut ledger = match votes.lock() {
        Ok(guard) => guard,
        Err(e) => {
            error!("Failed to acquire vote ledger lock: {}", e);
            return;
        }
    };

    match ledger.delete_votes(entity_id) {
        Ok(true) => info!(entity_id, "Deleted votes for entity"),
        Ok(false) => debug!(entity_id, "No votes to delete"),
        Err(e) => error!(entity_id, "Failed to delete votes: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared::{Direction, Store, VoteLedger};
    use std::sync::Mutex;
    use crate::store::JsonFileStore;

    fn votes(dir: &tempfile::TempDir) -> VoteStore {
        let store = JsonFileStore::open(dir.path().join("votes.json")).unwrap();
        Mutex::new(VoteLedger::open(store).unwrap())
    }

    #[test]
    fn publish_reaches_subscribers() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        bus.publish("voting/voted", "post1");

        let event = rx.try_recv().unwrap();
        assert_eq!(event.topic, "voting/voted");
        assert_eq!(event.payload, json!("post1"));
    }

    #[test]
    fn publish_without_subscribers_is_fine() {
        let bus = EventBus::new(8);
        bus.publish("voting/voted", "post1");
        assert!(bus.subscribe().try_recv().is_err());
    }

    #[test]
    fn announce_publishes_topic_list() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        announce_subscriptions(&bus, &Config::default());

        let event = rx.try_recv().unwrap();
        assert_eq!(event.topic, "bff/makesubscriptions");
        assert_eq!(event.payload, json!(["voting/voted"]));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn late_subscriber_receives_announcement_first() {
        let bus = EventBus::new(8);
        announce_subscriptions(&bus, &Config::default());
        bus.publish("voting/voted", "post0");

        let mut rx = bus.subscribe();
        bus.publish("voting/voted", "post1");

        let first = rx.try_recv().unwrap();
        assert_eq!(first.topic, "bff/makesubscriptions");
        assert_eq!(first.payload, json!(["voting/voted"]));
        assert_eq!(rx.try_recv().unwrap().payload, json!("post1"));
        assert!(rx.try_recv().is_err());

        let mut again = bus.subscribe();
        assert_eq!(again.try_recv().unwrap().topic, "bff/makesubscriptions");
    }

    #[test]
    fn notification_wire_format() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        bus.publish("voting/voted", "post1");

        let value = serde_json::to_value(rx.try_recv().unwrap()).unwrap();
        assert_eq!(value["topic"], "voting/voted");
        assert!(value["publishedAt"].is_string());
    }

    #[test]
    fn payload_decoding() {
        assert_eq!(decode_payload("\"post1\""), json!("post1"));
        assert_eq!(decode_payload("post1"), json!("post1"));
        assert_eq!(decode_payload("[1,2]"), json!([1, 2]));
    }

    #[test]
    fn delete_event_clears_entity() {
        let dir = tempfile::tempdir().unwrap();
        let votes = votes(&dir);
        let config = Config::default();
        {
            let mut ledger = votes.lock().unwrap();
            ledger.set_vote("post1", Direction::Up, "alice").unwrap();
            ledger.set_vote("post2", Direction::Up, "alice").unwrap();
        }

        handle_event(&votes, &config, "voting/delete", json!("post1"));
        handle_event(&votes, &config, "voting/delete", json!("missing"));

        let ledger = votes.lock().unwrap();
        assert!(ledger.record("post1").is_none());
        assert!(ledger.record("post2").is_some());
        assert!(!ledger.store().load().unwrap().contains_key("post1"));
    }

    #[test]
    fn other_events_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let votes = votes(&dir);
        let config = Config::default();
        votes.lock().unwrap().set_vote("post1", Direction::Down, "bob").unwrap();

        handle_event(&votes, &config, "posts/delete", json!("post1"));
        handle_event(&votes, &config, "voting/delete", json!({ "id": "post1" }));

        assert!(votes.lock().unwrap().record("post1").is_some());
    }

    #[test]
    fn delete_event_with_failing_store_keeps_votes() {
        let dir = tempfile::tempdir().unwrap();
        let votes = votes(&dir);
        let config = Config::default();
        votes.lock().unwrap().set_vote("post1", Direction::Up, "alice").unwrap();
        std::fs::remove_dir_all(dir.path()).unwrap();

        handle_event(&votes, &config, "voting/delete", json!("post1"));

        let ledger = votes.lock().unwrap();
        assert!(ledger.record("post1").is_some());
        assert_eq!(ledger.votes_for_entity("post1", "alice").unwrap().total, 1);
    }
}

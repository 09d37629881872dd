// events/mod.rs
use dashmap::DashMap;

pub const SDK_INITIALIZED: &str = "sdk.initialized";
pub const DISCOVERY_STARTED: &str = "discovery.started";
pub const DISCOVERY_STOPPED: &str = "discovery.stopped";
pub const DEVICE_ADDED: &str = "device.added";
pub const DEVICE_COMMANDED: &str = "device.commanded";

pub const ALL: [&str; 5] = [
    SDK_INITIALIZED,
    DISCOVERY_STARTED,
    DISCOVERY_STOPPED,
    DEVICE_ADDED,
    DEVICE_COMMANDED,
];

type Subscriber = Box<dyn Fn(&str, serde_json::Value) + Send + Sync>;

#[derive(Default)]
pub struct EventBus {
    subscribers: DashMap<String, Vec<Subscriber>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscribers: DashMap::new(),
        }
    }

    pub fn publish(&self, event_type: &str, data: serde_json::Value) {
        if let Some(subscribers) = self.subscribers.get(event_type) {
            for callback in subscribers.iter() {
                (callback)(event_type, data.clone());
            }
        }
    }

    pub fn subscribe<F: Fn(&str, serde_json::Value) + Send + Sync + 'static>(
        &self,
        event_type: &str,
        callback: F,
    ) {
        self.subscribers
            .entry(event_type.to_string())
            .or_default()
            .push(Box::new(callback));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    #[test]
    fn delivers_only_to_matching_subscribers() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        bus.subscribe(DEVICE_ADDED, move |name, data| {
            sink.lock().unwrap().push((name.to_string(), data));
        });

        bus.publish(DEVICE_ADDED, json!({"deviceId": "d1"}));
        bus.publish(DISCOVERY_STARTED, json!({}));

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, DEVICE_ADDED);
        assert_eq!(seen[0].1["deviceId"], "d1");
    }
}

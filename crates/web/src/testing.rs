//! Shared fakes for relay and handler tests.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use anyhow::{Result, bail};
use async_trait::async_trait;
use pushgate_core::{
    EventStore, QueuePublisher, config::Config, models::PushEvent, semester::SemesterSchedule,
};
use pushgate_github::GitHubEvent;
use serde_json::{Map, Value, json};

use crate::AppState;

pub const SECRET: &str = "test-secret";

/// In-memory store with the same replace-by-id semantics as the MongoDB
/// adapter.
#[derive(Default)]
pub struct RecordingStore {
    pub events: Mutex<HashMap<String, PushEvent>>,
    pub upserts: AtomicUsize,
    pub fail: bool,
}

#[async_trait]
impl EventStore for RecordingStore {
    async fn upsert(&self, event: &PushEvent) -> Result<()> {
        if self.fail {
            bail!("store offline");
        }
        self.upserts.fetch_add(1, Ordering::SeqCst);
        self.events.lock().unwrap().insert(event.id.clone(), event.clone());
        Ok(())
    }
}

/// Queue fake that records messages and, when watching a store, the number
/// of committed upserts visible at each publish call.
#[derive(Default)]
pub struct RecordingQueue {
    pub messages: Mutex<Vec<(String, String)>>,
    pub upserts_seen: Mutex<Vec<usize>>,
    pub watch: Option<Arc<RecordingStore>>,
    pub fail: bool,
}

#[async_trait]
impl QueuePublisher for RecordingQueue {
    async fn publish(&self, queue: &str, message: &str) -> Result<()> {
        if let Some(store) = &self.watch {
            self.upserts_seen.lock().unwrap().push(store.upserts.load(Ordering::SeqCst));
        }
        if self.fail {
            bail!("queue offline");
        }
        self.messages.lock().unwrap().push((queue.to_string(), message.to_string()));
        Ok(())
    }
}

/// Store that never completes, for exercising the relay's call timeout.
pub struct StalledStore;

#[async_trait]
impl EventStore for StalledStore {
    async fn upsert(&self, _event: &PushEvent) -> Result<()> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(())
    }
}

pub fn test_config() -> Config {
    let mut config: Config = serde_yaml::from_str("{}").unwrap();
    config.github.secret = SECRET.to_string();
    config
}

pub fn test_state(store: Arc<dyn EventStore>, queue: Arc<dyn QueuePublisher>) -> AppState {
    test_state_with_schedule(store, queue, SemesterSchedule::default())
}

pub fn test_state_with_schedule(
    store: Arc<dyn EventStore>,
    queue: Arc<dyn QueuePublisher>,
    schedule: SemesterSchedule,
) -> AppState {
    AppState { config: Arc::new(test_config()), schedule: Arc::new(schedule), store, queue }
}

pub fn push_payload() -> Map<String, Value> {
    let mut payload = Map::new();
    payload.insert("ref".to_string(), json!("refs/heads/main"));
    payload.insert("repository".to_string(), json!({ "full_name": "octo/cat" }));
    payload
}

pub fn push_event(delivery: &str) -> GitHubEvent {
    GitHubEvent {
        kind: "push".to_string(),
        delivery: delivery.to_string(),
        payload: push_payload(),
    }
}

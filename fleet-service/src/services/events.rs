//! In-process event publisher for entity lifecycle events.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;

pub const ENTITY_CRUD_EVENT: &str = "entityCrudEvent";

const LISTENER_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityCrudEvent {
    pub id: String,
    pub tenant_id: String,
    pub entity_id: String,
    pub entity_type: String,
    pub message: String,
}

#[async_trait]
pub trait EventListener: Send + Sync {
    async fn on_event(&self, event: &EntityCrudEvent) -> Result<(), AppError>;
}

/// Dispatches events to listeners subscribed by event name. Each listener
/// runs in its own task, bounded by a timeout.
pub struct EventPublisher {
    listeners: DashMap<String, Vec<Arc<dyn EventListener>>>,
    timeout: Duration,
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl EventPublisher {
    pub fn new() -> Self {
        Self {
            listeners: DashMap::new(),
            timeout: LISTENER_TIMEOUT,
        }
    }

    pub fn subscribe(&self, name: &str, listener: Arc<dyn EventListener>) {
        self.listeners
            .entry(name.to_string())
            .or_default()
            .push(listener);
    }

    pub fn publish(&self, name: &str, event: EntityCrudEvent) {
        let listeners = match self.listeners.get(name) {
            Some(listeners) => listeners.clone(),
            None => return,
        };
        let event = Arc::new(event);
        for listener in listeners {
            let event = event.clone();
            let name = name.to_string();
            let timeout = self.timeout;
            tokio::spawn(async move {
                match tokio::time::timeout(timeout, listener.on_event(&event)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        tracing::warn!(event = %name, entity_id = %event.entity_id, error = %e, "Event listener failed")
                    }
                    Err(_) => {
                        tracing::warn!(event = %name, entity_id = %event.entity_id, "Event listener timed out")
                    }
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    struct Forward(mpsc::UnboundedSender<EntityCrudEvent>);

    #[async_trait]
    impl EventListener for Forward {
        async fn on_event(&self, event: &EntityCrudEvent) -> Result<(), AppError> {
            let _ = self.0.send(event.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let publisher = EventPublisher::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        publisher.subscribe(ENTITY_CRUD_EVENT, Arc::new(Forward(tx)));

        publisher.publish(
            ENTITY_CRUD_EVENT,
            EntityCrudEvent {
                id: "ev1".into(),
                tenant_id: "t1".into(),
                entity_id: "p1".into(),
                entity_type: "Project".into(),
                message: "onDeleteProject".into(),
            },
        );
        let received = rx.recv().await.unwrap();
        assert_eq!(received.entity_id, "p1");

        publisher.publish("otherEvent", received);
    }
}

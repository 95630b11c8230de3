//! Edge messaging: per-edge outbound channels, tenant broadcasts and
//! request/reply correlation for synchronous sends.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use service_core::error::AppError;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use uuid::Uuid;

use crate::config::MessagingConfig;

#[derive(Debug, Error)]
pub enum MessagingError {
    #[error("edge {edge_id} is not connected")]
    EdgeNotConnected { edge_id: String },

    #[error("outbound queue of edge {edge_id} is full")]
    QueueFull { edge_id: String },

    #[error("edge {edge_id} did not reply to {message} in time")]
    Timeout { edge_id: String, message: String },

    #[error("edge {edge_id} closed the channel before replying")]
    ChannelClosed { edge_id: String },
}

impl From<MessagingError> for AppError {
    fn from(e: MessagingError) -> Self {
        match e {
            MessagingError::EdgeNotConnected { .. } | MessagingError::QueueFull { .. } => {
                AppError::ServiceUnavailable(e.to_string())
            }
            MessagingError::Timeout { .. } => AppError::Timeout(e.to_string()),
            MessagingError::ChannelClosed { .. } => AppError::ServiceUnavailable(e.to_string()),
        }
    }
}

/// Outbound message to one edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeMessage {
    pub id: String,
    pub origin: String,
    pub tenant_id: String,
    pub message: String,
    pub payload: Value,
    /// The edge must answer through [`ChannelHub::complete_sync`].
    pub expects_reply: bool,
}

/// Message fanned out to every subscriber of a tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantMessage {
    pub tenant_id: String,
    pub message: String,
    pub payload: Value,
}

/// Transport used by the notification router.
#[async_trait]
pub trait MessagingService: Send + Sync {
    /// Queues a message for a connected edge. Returns the message id.
    async fn send_message(
        &self,
        origin: &str,
        tenant_id: &str,
        edge_id: &str,
        message: &str,
        payload: Value,
    ) -> Result<String, MessagingError>;

    /// Sends a message and waits for the edge's reply.
    async fn send_message_sync(
        &self,
        origin: &str,
        tenant_id: &str,
        edge_id: &str,
        message: &str,
        payload: Value,
    ) -> Result<Value, MessagingError>;

    /// Fire-and-forget send. Offline edges resynchronize on reconnect, so a
    /// missing channel is not an error.
    async fn emit_message(
        &self,
        origin: &str,
        tenant_id: &str,
        edge_id: &str,
        message: &str,
        payload: Value,
    ) -> Result<(), MessagingError>;

    async fn broadcast_message(&self, tenant_id: &str, message: &str, payload: Value);
}

type EdgeKey = (String, String);

/// In-process registry of edge connections.
pub struct ChannelHub {
    edges: DashMap<EdgeKey, mpsc::Sender<EdgeMessage>>,
    tenants: DashMap<String, broadcast::Sender<TenantMessage>>,
    pending: DashMap<String, oneshot::Sender<Value>>,
    channel_capacity: usize,
    sync_timeout: Duration,
}

impl ChannelHub {
    pub fn new(config: &MessagingConfig) -> Self {
        Self {
            edges: DashMap::new(),
            tenants: DashMap::new(),
            pending: DashMap::new(),
            channel_capacity: config.edge_channel_capacity.max(1),
            sync_timeout: Duration::from_secs(config.edge_sync_timeout_secs),
        }
    }

    /// Registers an edge connection, replacing any previous one.
    pub fn connect_edge(&self, tenant_id: &str, edge_id: &str) -> mpsc::Receiver<EdgeMessage> {
        let (tx, rx) = mpsc::channel(self.channel_capacity);
        self.edges
            .insert((tenant_id.to_string(), edge_id.to_string()), tx);
        tracing::info!(tenant_id = %tenant_id, edge_id = %edge_id, "Edge connected");
        rx
    }

    pub fn disconnect_edge(&self, tenant_id: &str, edge_id: &str) {
        if self
            .edges
            .remove(&(tenant_id.to_string(), edge_id.to_string()))
            .is_some()
        {
            tracing::info!(tenant_id = %tenant_id, edge_id = %edge_id, "Edge disconnected");
        }
    }

    pub fn is_connected(&self, tenant_id: &str, edge_id: &str) -> bool {
        self.edges
            .get(&(tenant_id.to_string(), edge_id.to_string()))
            .is_some_and(|tx| !tx.is_closed())
    }

    pub fn subscribe_tenant(&self, tenant_id: &str) -> broadcast::Receiver<TenantMessage> {
        self.tenants
            .entry(tenant_id.to_string())
            .or_insert_with(|| broadcast::channel(self.channel_capacity).0)
            .subscribe()
    }

    /// Delivers an edge's reply to a pending synchronous send.
    pub fn complete_sync(&self, message_id: &str, reply: Value) -> bool {
        match self.pending.remove(message_id) {
            Some((_, tx)) => tx.send(reply).is_ok(),
            None => false,
        }
    }

    fn enqueue(
        &self,
        tenant_id: &str,
        edge_id: &str,
        message: EdgeMessage,
    ) -> Result<(), MessagingError> {
        let key = (tenant_id.to_string(), edge_id.to_string());
        let tx = self
            .edges
            .get(&key)
            .map(|tx| tx.clone())
            .ok_or_else(|| MessagingError::EdgeNotConnected {
                edge_id: edge_id.to_string(),
            })?;
        match tx.try_send(message) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => Err(MessagingError::QueueFull {
                edge_id: edge_id.to_string(),
            }),
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.edges.remove(&key);
                Err(MessagingError::EdgeNotConnected {
                    edge_id: edge_id.to_string(),
                })
            }
        }
    }

    fn edge_message(
        origin: &str,
        tenant_id: &str,
        message: &str,
        payload: Value,
        expects_reply: bool,
    ) -> EdgeMessage {
        EdgeMessage {
            id: Uuid::new_v4().to_string(),
            origin: origin.to_string(),
            tenant_id: tenant_id.to_string(),
            message: message.to_string(),
            payload,
            expects_reply,
        }
    }
}

#[async_trait]
impl MessagingService for ChannelHub {
    async fn send_message(
        &self,
        origin: &str,
        tenant_id: &str,
        edge_id: &str,
        message: &str,
        payload: Value,
    ) -> Result<String, MessagingError> {
        let msg = Self::edge_message(origin, tenant_id, message, payload, false);
        let id = msg.id.clone();
        self.enqueue(tenant_id, edge_id, msg)?;
        Ok(id)
    }

    async fn send_message_sync(
        &self,
        origin: &str,
        tenant_id: &str,
        edge_id: &str,
        message: &str,
        payload: Value,
    ) -> Result<Value, MessagingError> {
        let msg = Self::edge_message(origin, tenant_id, message, payload, true);
        let id = msg.id.clone();
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id.clone(), tx);

        if let Err(e) = self.enqueue(tenant_id, edge_id, msg) {
            self.pending.remove(&id);
            return Err(e);
        }

        match tokio::time::timeout(self.sync_timeout, rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(MessagingError::ChannelClosed {
                edge_id: edge_id.to_string(),
            }),
            Err(_) => {
                self.pending.remove(&id);
                Err(MessagingError::Timeout {
                    edge_id: edge_id.to_string(),
                    message: message.to_string(),
                })
            }
        }
    }

    async fn emit_message(
        &self,
        origin: &str,
        tenant_id: &str,
        edge_id: &str,
        message: &str,
        payload: Value,
    ) -> Result<(), MessagingError> {
        let msg = Self::edge_message(origin, tenant_id, message, payload, false);
        match self.enqueue(tenant_id, edge_id, msg) {
            Err(MessagingError::EdgeNotConnected { .. }) => {
                tracing::debug!(edge_id = %edge_id, message = %message, "Edge offline, emit skipped");
                Ok(())
            }
            other => other,
        }
    }

    async fn broadcast_message(&self, tenant_id: &str, message: &str, payload: Value) {
        let Some(tx) = self.tenants.get(tenant_id).map(|tx| tx.clone()) else {
            tracing::debug!(tenant_id = %tenant_id, message = %message, "No tenant subscribers");
            return;
        };
        let event = TenantMessage {
            tenant_id: tenant_id.to_string(),
            message: message.to_string(),
            payload,
        };
        match tx.send(event) {
            Ok(receivers) => {
                tracing::debug!(tenant_id = %tenant_id, message = %message, receivers, "Broadcast message")
            }
            Err(_) => tracing::debug!(tenant_id = %tenant_id, message = %message, "No tenant subscribers"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn hub(timeout_secs: u64) -> Arc<ChannelHub> {
        Arc::new(ChannelHub::new(&MessagingConfig {
            edge_sync_timeout_secs: timeout_secs,
            edge_channel_capacity: 8,
        }))
    }

    #[tokio::test]
    async fn send_reaches_connected_edge() {
        let hub = hub(1);
        let mut rx = hub.connect_edge("t1", "e1");
        let id = hub
            .send_message("api-0", "t1", "e1", "onCreateDataSource", json!({"id": "d1"}))
            .await
            .unwrap();
        let msg = rx.recv().await.unwrap();
        assert_eq!(msg.id, id);
        assert_eq!(msg.message, "onCreateDataSource");
        assert!(!msg.expects_reply);
    }

    #[tokio::test]
    async fn send_to_offline_edge_fails_but_emit_does_not() {
        let hub = hub(1);
        let err = hub
            .send_message("api-0", "t1", "e1", "onCreateDataSource", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, MessagingError::EdgeNotConnected { .. }));
        hub.emit_message("api-0", "t1", "e1", "onUpdateEdge", json!({}))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn sync_send_returns_the_reply() {
        let hub = hub(5);
        let mut rx = hub.connect_edge("t1", "e1");
        let responder = hub.clone();
        tokio::spawn(async move {
            let msg = rx.recv().await.unwrap();
            assert!(msg.expects_reply);
            responder.complete_sync(&msg.id, json!({"containers": ["c1"]}));
        });
        let reply = hub
            .send_message_sync("api-0", "t1", "e1", "getApplicationContainers", json!({}))
            .await
            .unwrap();
        assert_eq!(reply, json!({"containers": ["c1"]}));
    }

    #[tokio::test]
    async fn sync_send_times_out() {
        let hub = hub(0);
        let _rx = hub.connect_edge("t1", "e1");
        let err = hub
            .send_message_sync("api-0", "t1", "e1", "getApplicationContainers", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, MessagingError::Timeout { .. }));
        assert!(hub.pending.is_empty());
    }

    #[tokio::test]
    async fn broadcast_reaches_tenant_subscribers_only() {
        let hub = hub(1);
        let mut t1 = hub.subscribe_tenant("t1");
        let mut t2 = hub.subscribe_tenant("t2");
        hub.broadcast_message("t1", "onDeleteCategory", json!({"id": "c1"}))
            .await;
        assert_eq!(t1.recv().await.unwrap().message, "onDeleteCategory");
        assert!(t2.try_recv().is_err());
    }
}

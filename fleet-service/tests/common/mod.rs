#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, Response, StatusCode},
    Router,
};
use fleet_service::config::{
    AuditConfig, FeatureConfig, FleetConfig, JwtConfig, LimitsConfig, MessagingConfig,
    MongoConfig, WebConfig,
};
use fleet_service::models::AuditLog;
use fleet_service::services::{
    DocumentStore, JwtService, MemoryDb, MessagingError, MessagingService,
};
use fleet_service::{build_router, AppState};
use http_body_util::BodyExt;
use serde_json::{json, Map, Value};
use tower::util::ServiceExt;

pub const SECRET: &str = "fleet-test-secret";
pub const TENANT: &str = "t1";
pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const ADMIN_PASSWORD: &str = "correct horse";

/// One call observed by [`MockMessenger`].
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub kind: &'static str,
    pub tenant_id: String,
    pub edge_id: Option<String>,
    pub message: String,
    pub payload: Value,
}

/// Messaging transport that records every call. Synchronous sends answer
/// with the configured reply or fail as not connected.
#[derive(Default)]
pub struct MockMessenger {
    calls: Mutex<Vec<Delivery>>,
    sync_reply: Mutex<Option<Value>>,
}

impl MockMessenger {
    pub fn set_sync_reply(&self, reply: Value) {
        *self.sync_reply.lock().unwrap() = Some(reply);
    }

    pub fn calls(&self) -> Vec<Delivery> {
        self.calls.lock().unwrap().clone()
    }

    pub fn edge_calls(&self) -> Vec<Delivery> {
        self.calls()
            .into_iter()
            .filter(|c| c.edge_id.is_some())
            .collect()
    }

    pub fn broadcasts(&self) -> Vec<Delivery> {
        self.calls()
            .into_iter()
            .filter(|c| c.kind == "broadcast")
            .collect()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, kind: &'static str, tenant_id: &str, edge_id: Option<&str>, message: &str, payload: Value) {
        self.calls.lock().unwrap().push(Delivery {
            kind,
            tenant_id: tenant_id.to_string(),
            edge_id: edge_id.map(str::to_string),
            message: message.to_string(),
            payload,
        });
    }
}

#[async_trait]
impl MessagingService for MockMessenger {
    async fn send_message(
        &self,
        _origin: &str,
        tenant_id: &str,
        edge_id: &str,
        message: &str,
        payload: Value,
    ) -> Result<String, MessagingError> {
        self.record("send", tenant_id, Some(edge_id), message, payload);
        Ok(format!("m-{}", self.calls.lock().unwrap().len()))
    }

    async fn send_message_sync(
        &self,
        _origin: &str,
        tenant_id: &str,
        edge_id: &str,
        message: &str,
        payload: Value,
    ) -> Result<Value, MessagingError> {
        self.record("send_sync", tenant_id, Some(edge_id), message, payload);
        self.sync_reply
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| MessagingError::EdgeNotConnected {
                edge_id: edge_id.to_string(),
            })
    }

    async fn emit_message(
        &self,
        _origin: &str,
        tenant_id: &str,
        edge_id: &str,
        message: &str,
        payload: Value,
    ) -> Result<(), MessagingError> {
        self.record("emit", tenant_id, Some(edge_id), message, payload);
        Ok(())
    }

    async fn broadcast_message(&self, tenant_id: &str, message: &str, payload: Value) {
        self.record("broadcast", tenant_id, None, message, payload);
    }
}

pub fn test_config() -> FleetConfig {
    FleetConfig {
        common: service_core::config::Config::default(),
        hostname: "fleet-test".to_string(),
        mongodb: MongoConfig {
            uri: "mongodb://localhost:27017".to_string(),
            database: "fleet_test".to_string(),
        },
        jwt: JwtConfig {
            secret: Some(SECRET.to_string()),
            public_key_path: None,
            private_key_path: None,
            token_expiry_minutes: 5,
        },
        audit: AuditConfig::default(),
        features: FeatureConfig::default(),
        limits: LimitsConfig::default(),
        messaging: MessagingConfig::default(),
        web: WebConfig::default(),
    }
}

pub struct TestApp {
    pub router: Router,
    pub db: Arc<MemoryDb>,
    pub messenger: Arc<MockMessenger>,
    pub jwt: JwtService,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(config: FleetConfig) -> Self {
        let db = Arc::new(MemoryDb::new());
        let messenger = Arc::new(MockMessenger::default());
        let jwt = JwtService::from_secret(SECRET, 5);
        let state = AppState::new(config, db.clone(), db.clone(), messenger.clone(), jwt.clone());
        let app = Self {
            router: build_router(state),
            db,
            messenger,
            jwt,
        };
        app.seed_admin().await;
        app
    }

    async fn seed_admin(&self) {
        let mut admin = fleet_service::models::User {
            id: "u-admin".to_string(),
            tenant_id: TENANT.to_string(),
            email: ADMIN_EMAIL.to_string(),
            name: "Admin".to_string(),
            role: "INFRA_ADMIN".to_string(),
            password: ADMIN_PASSWORD.to_string(),
        };
        fleet_service::models::Entity::before_store(&mut admin).unwrap();
        self.insert("users", serde_json::to_value(&admin).unwrap()).await;
    }

    pub async fn insert(&self, collection: &str, doc: Value) {
        self.db.insert(collection, doc).await.unwrap();
    }

    pub fn token(&self, claims: Value) -> String {
        let claims: Map<String, Value> = claims.as_object().cloned().unwrap();
        self.jwt.issue(claims).unwrap()
    }

    pub fn admin_token(&self) -> String {
        self.token(json!({
            "tenantId": TENANT,
            "id": "u-admin",
            "email": ADMIN_EMAIL,
            "specialRole": "admin"
        }))
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Response<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        self.send(builder.body(body).unwrap()).await
    }

    pub async fn admin(&self, method: Method, uri: &str, body: Option<Value>) -> Response<Body> {
        let token = self.admin_token();
        self.request(method, uri, Some(&token), body).await
    }

    /// Waits until at least `count` audit records were written.
    pub async fn audit_logs(&self, count: usize) -> Vec<AuditLog> {
        for _ in 0..100 {
            let logs = self.db.audit_logs();
            if logs.len() >= count {
                return logs.into_iter().map(|(_, log)| log).collect();
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {} audit records, found {}", count, self.db.audit_logs().len());
    }
}

pub async fn body_json(response: Response<Body>) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

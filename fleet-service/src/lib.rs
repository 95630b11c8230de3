pub mod config;
pub mod middleware;
pub mod models;
pub mod router;
pub mod services;
pub mod startup;
pub mod utils;

use std::sync::Arc;

use crate::config::FleetConfig;
use crate::middleware::{AuthGate, RouterConfig};
use crate::router::{route_config, route_table, NotificationRouter};
use crate::services::{
    AuditSink, AuditWriter, DocumentStore, EventPublisher, IdentityResolver, JwtService,
    MessagingService, ObjectDirectory, Repository,
};

pub use crate::router::build_router;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<FleetConfig>,
    pub repository: Repository,
    pub identity: Arc<dyn IdentityResolver>,
    pub notifier: Arc<NotificationRouter>,
    pub events: Arc<EventPublisher>,
    pub audit: AuditWriter,
    pub jwt: Arc<JwtService>,
    pub auth_gate: Arc<AuthGate>,
    pub route_config: Arc<RouterConfig>,
}

impl AppState {
    /// Wires the collaborators. Spawns the audit worker, so it must run
    /// inside a Tokio runtime.
    pub fn new(
        config: FleetConfig,
        documents: Arc<dyn DocumentStore>,
        audit_sink: Arc<dyn AuditSink>,
        messaging: Arc<dyn MessagingService>,
        jwt: JwtService,
    ) -> Self {
        let repository = Repository::new(documents);
        let directory: Arc<dyn ObjectDirectory> = Arc::new(repository.clone());
        let identity: Arc<dyn IdentityResolver> = Arc::new(repository.clone());

        let notifier = Arc::new(NotificationRouter::new(
            directory.clone(),
            messaging,
            config.hostname.clone(),
        ));
        let auth_gate = Arc::new(AuthGate::new(
            identity.clone(),
            directory,
            config.features.enable_trial,
        ));
        let route_config = Arc::new(route_config(
            &route_table(),
            config.web.default_route_roles.clone(),
        ));
        let audit = AuditWriter::spawn(audit_sink, config.audit.queue_capacity);

        Self {
            config: Arc::new(config),
            repository,
            identity,
            notifier,
            events: Arc::new(EventPublisher::new()),
            audit,
            jwt: Arc::new(jwt),
            auth_gate,
            route_config,
        }
    }
}

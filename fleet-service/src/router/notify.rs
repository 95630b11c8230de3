//! Change notification routing.
//!
//! After a store commits a mutation, [`NotificationRouter::notify`] decides
//! which message to send, resolves recipients from the entity's static
//! [`Scoping`] and delivers a per-edge rendered payload. Delivery is
//! best-effort: failures are logged and counted, never returned.

use std::sync::Arc;

use serde_json::Value;
use service_core::error::AppError;

use crate::models::{
    Application, DataSource, DeleteRequest, Entity, EntityState, EntityType, ObjectRequest,
    OpType, Operation, Scoping,
};
use crate::services::metrics::record_dispatch;
use crate::services::{MessagingService, NotifyCallback, ObjectDirectory};

const UPDATE_PROJECT_MESSAGE: &str = "onUpdateProject";

/// Request-scoped values carried into every envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchContext {
    pub request_id: String,
    pub tenant_id: String,
}

impl DispatchContext {
    pub fn new(request_id: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            tenant_id: tenant_id.into(),
        }
    }
}

/// The message selected for a committed mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Operation the handler performed.
    pub operation: Operation,
    pub op_type: OpType,
    pub message: String,
}

impl Notification {
    fn new(entity_type: EntityType, operation: Operation, announced_as: Operation) -> Self {
        Self {
            operation,
            op_type: announced_as.op_type(),
            message: entity_type.message(announced_as),
        }
    }
}

/// Picks the announced message. An update that leaves the document in the
/// undeploy state is announced as a delete; a create in that state is not
/// announced at all.
pub fn select_notification<T: Entity>(operation: Operation, doc: &T) -> Option<Notification> {
    let undeployed = doc.entity_state() == Some(EntityState::Undeploy);
    let announced_as = match (operation, undeployed) {
        (Operation::Create, true) => return None,
        (Operation::Update, true) => Operation::Delete,
        (op, _) => op,
    };
    Some(Notification::new(T::ENTITY_TYPE, operation, announced_as))
}

pub struct NotificationRouter {
    directory: Arc<dyn ObjectDirectory>,
    messaging: Arc<dyn MessagingService>,
    origin: String,
}

impl NotificationRouter {
    pub fn new(
        directory: Arc<dyn ObjectDirectory>,
        messaging: Arc<dyn MessagingService>,
        origin: impl Into<String>,
    ) -> Self {
        Self {
            directory,
            messaging,
            origin: origin.into(),
        }
    }

    /// Store callback that runs [`NotificationRouter::notify`] once the
    /// mutation commits.
    pub fn callback<T: Entity>(
        self: &Arc<Self>,
        ctx: DispatchContext,
        operation: Operation,
    ) -> NotifyCallback<T> {
        let router = self.clone();
        NotifyCallback::new(move |doc: T| async move {
            router.notify(&ctx, operation, doc).await;
        })
    }

    pub async fn notify<T: Entity>(&self, ctx: &DispatchContext, operation: Operation, mut doc: T) {
        if let Err(e) = doc.resolve_bindings(self.directory.as_ref()).await {
            tracing::warn!(
                request_id = %ctx.request_id,
                entity = T::ENTITY_TYPE.canonical_name(),
                id = %doc.id(),
                error = %e,
                "Failed to resolve notification bindings"
            );
        }

        let notification = select_notification(operation, &doc);
        if notification.is_none() {
            tracing::debug!(
                request_id = %ctx.request_id,
                entity = T::ENTITY_TYPE.canonical_name(),
                id = %doc.id(),
                "Entity created undeployed, no notification"
            );
        }

        // Interface updates go out before the entity itself on create/update
        // and after it on delete.
        if operation != Operation::Delete {
            self.cascade_data_ifc_endpoints(ctx, &doc).await;
        }
        if let Some(notification) = &notification {
            self.route(ctx, notification, &doc).await;
        }
        if operation == Operation::Delete {
            self.cascade_data_ifc_endpoints(ctx, &doc).await;
        }

        if T::ENTITY_TYPE == EntityType::DataSource && operation != Operation::Delete {
            self.refresh_applications_of_data_source(ctx, doc.id()).await;
        }
    }

    /// Sends a message to one edge and waits for its reply.
    pub async fn send_sync(
        &self,
        ctx: &DispatchContext,
        edge_id: &str,
        message: &str,
        payload: Value,
    ) -> Result<Value, AppError> {
        let result = self
            .messaging
            .send_message_sync(&self.origin, &ctx.tenant_id, edge_id, message, payload)
            .await;
        match &result {
            Ok(_) => record_dispatch("send_sync", "ok"),
            Err(e) => {
                tracing::warn!(
                    request_id = %ctx.request_id,
                    edge_id = %edge_id,
                    message = %message,
                    error = %e,
                    "Synchronous edge request failed"
                );
                record_dispatch("send_sync", "error");
            }
        }
        Ok(result?)
    }

    /// Recipient resolution by scoping, without cascades.
    async fn route<T: Entity>(&self, ctx: &DispatchContext, notification: &Notification, doc: &T) {
        match T::SCOPING {
            Scoping::DirectEdge(edge_of) => {
                self.send_to_owning_edge(ctx, notification, doc, edge_of(doc))
                    .await
            }
            Scoping::Project(project_of) => {
                let project_id = project_of(doc);
                if !project_id.is_empty() && project_id != doc.id() {
                    self.fan_out_to_project(ctx, notification, doc, project_id)
                        .await;
                } else {
                    self.broadcast(ctx, notification, doc).await;
                }
            }
            Scoping::CrossProject(edges_of) => {
                for edge_id in edges_of(doc) {
                    self.emit_to_edge(ctx, notification, doc, edge_id).await;
                }
            }
            Scoping::TenantGlobal => self.broadcast(ctx, notification, doc).await,
        }
    }

    /// Envelope for one edge: the rendered or public document for
    /// create/update, the bare reference for delete.
    async fn envelope_for_edge<T: Entity>(
        &self,
        ctx: &DispatchContext,
        op_type: OpType,
        doc: &T,
        edge_id: &str,
    ) -> Result<Value, AppError> {
        match op_type {
            OpType::Delete => Ok(serde_json::to_value(DeleteRequest {
                tenant_id: ctx.tenant_id.clone(),
                id: doc.id().to_string(),
            })?),
            OpType::CreateOrUpdate => {
                let rendered = doc
                    .render_for_edge(self.directory.as_ref(), edge_id)
                    .await?;
                let body = match rendered {
                    Some(view) => view,
                    None => doc.public_view()?,
                };
                Ok(serde_json::to_value(ObjectRequest {
                    request_id: ctx.request_id.clone(),
                    tenant_id: ctx.tenant_id.clone(),
                    doc: body,
                })?)
            }
        }
    }

    fn envelope<T: Entity>(
        &self,
        ctx: &DispatchContext,
        op_type: OpType,
        doc: &T,
    ) -> Result<Value, AppError> {
        match op_type {
            OpType::Delete => Ok(serde_json::to_value(DeleteRequest {
                tenant_id: ctx.tenant_id.clone(),
                id: doc.id().to_string(),
            })?),
            OpType::CreateOrUpdate => Ok(serde_json::to_value(ObjectRequest {
                request_id: ctx.request_id.clone(),
                tenant_id: ctx.tenant_id.clone(),
                doc: doc.public_view()?,
            })?),
        }
    }

    async fn send_to_owning_edge<T: Entity>(
        &self,
        ctx: &DispatchContext,
        notification: &Notification,
        doc: &T,
        edge_id: Option<&str>,
    ) {
        let Some(edge_id) = edge_id.filter(|id| !id.is_empty()) else {
            tracing::warn!(
                request_id = %ctx.request_id,
                entity = T::ENTITY_TYPE.canonical_name(),
                id = %doc.id(),
                message = %notification.message,
                "No owning edge, notification skipped"
            );
            record_dispatch("send", "skipped");
            return;
        };

        let edge_lifecycle = T::ENTITY_TYPE.is_service_domain()
            && notification.operation != Operation::Create;
        if edge_lifecycle {
            self.emit_to_edge(ctx, notification, doc, edge_id).await;
        } else {
            let payload = match self
                .envelope_for_edge(ctx, notification.op_type, doc, edge_id)
                .await
            {
                Ok(payload) => payload,
                Err(e) => return self.render_failed(ctx, notification, edge_id, e),
            };
            match self
                .messaging
                .send_message(&self.origin, &ctx.tenant_id, edge_id, &notification.message, payload)
                .await
            {
                Ok(message_id) => {
                    tracing::info!(
                        request_id = %ctx.request_id,
                        edge_id = %edge_id,
                        message = %notification.message,
                        message_id = %message_id,
                        "Edge send completed"
                    );
                    record_dispatch("send", "ok");
                }
                Err(e) => {
                    tracing::warn!(
                        request_id = %ctx.request_id,
                        edge_id = %edge_id,
                        message = %notification.message,
                        error = %e,
                        "Edge send failed"
                    );
                    record_dispatch("send", "error");
                }
            }
        }

        if T::ENTITY_TYPE.is_service_domain() && notification.operation == Operation::Update {
            self.refresh_edge_projects(ctx, doc, edge_id).await;
        }
    }

    async fn emit_to_edge<T: Entity>(
        &self,
        ctx: &DispatchContext,
        notification: &Notification,
        doc: &T,
        edge_id: &str,
    ) {
        let payload = match self
            .envelope_for_edge(ctx, notification.op_type, doc, edge_id)
            .await
        {
            Ok(payload) => payload,
            Err(e) => return self.render_failed(ctx, notification, edge_id, e),
        };
        self.emit(ctx, edge_id, &notification.message, payload).await;
    }

    async fn emit(&self, ctx: &DispatchContext, edge_id: &str, message: &str, payload: Value) {
        match self
            .messaging
            .emit_message(&self.origin, &ctx.tenant_id, edge_id, message, payload)
            .await
        {
            Ok(()) => {
                tracing::info!(
                    request_id = %ctx.request_id,
                    edge_id = %edge_id,
                    message = %message,
                    "Edge emit completed"
                );
                record_dispatch("emit", "ok");
            }
            Err(e) => {
                tracing::warn!(
                    request_id = %ctx.request_id,
                    edge_id = %edge_id,
                    message = %message,
                    error = %e,
                    "Edge emit failed"
                );
                record_dispatch("emit", "error");
            }
        }
    }

    fn render_failed(
        &self,
        ctx: &DispatchContext,
        notification: &Notification,
        edge_id: &str,
        e: AppError,
    ) {
        tracing::warn!(
            request_id = %ctx.request_id,
            edge_id = %edge_id,
            message = %notification.message,
            error = %e,
            "Failed to render document for edge"
        );
        record_dispatch("emit", "error");
    }

    async fn fan_out_to_project<T: Entity>(
        &self,
        ctx: &DispatchContext,
        notification: &Notification,
        doc: &T,
        project_id: &str,
    ) {
        let project = match self.directory.get_project(&ctx.tenant_id, project_id).await {
            Ok(project) => project,
            Err(e) => {
                tracing::warn!(
                    request_id = %ctx.request_id,
                    project_id = %project_id,
                    message = %notification.message,
                    error = %e,
                    "Project lookup failed, fan-out skipped"
                );
                record_dispatch("emit", "skipped");
                return;
            }
        };
        tracing::debug!(
            request_id = %ctx.request_id,
            project_id = %project_id,
            edges = project.edge_ids.len(),
            message = %notification.message,
            "Fanning out to project edges"
        );
        for edge_id in &project.edge_ids {
            self.emit_to_edge(ctx, notification, doc, edge_id).await;
        }
    }

    async fn broadcast<T: Entity>(&self, ctx: &DispatchContext, notification: &Notification, doc: &T) {
        let payload = match self.envelope(ctx, notification.op_type, doc) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(
                    request_id = %ctx.request_id,
                    message = %notification.message,
                    error = %e,
                    "Failed to build broadcast payload"
                );
                record_dispatch("broadcast", "error");
                return;
            }
        };
        self.messaging
            .broadcast_message(&ctx.tenant_id, &notification.message, payload)
            .await;
        tracing::info!(
            request_id = %ctx.request_id,
            message = %notification.message,
            "Broadcast completed"
        );
        record_dispatch("broadcast", "ok");
    }

    async fn refresh_edge_projects<T: Entity>(&self, ctx: &DispatchContext, doc: &T, edge_id: &str) {
        for project in doc.refresh_projects() {
            let payload = match project.public_view().and_then(|view| {
                Ok(serde_json::to_value(ObjectRequest {
                    request_id: ctx.request_id.clone(),
                    tenant_id: ctx.tenant_id.clone(),
                    doc: view,
                })?)
            }) {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::warn!(project_id = %project.id, error = %e, "Failed to build project refresh");
                    continue;
                }
            };
            self.emit(ctx, edge_id, UPDATE_PROJECT_MESSAGE, payload).await;
        }
    }

    /// Pushes an update for every outbound data source the entity reads from.
    async fn cascade_data_ifc_endpoints<T: Entity>(&self, ctx: &DispatchContext, doc: &T) {
        let endpoints = doc.data_ifc_endpoints();
        if endpoints.is_empty() {
            return;
        }
        let notification = Notification::new(
            EntityType::DataSource,
            Operation::Update,
            Operation::Update,
        );
        for endpoint in endpoints {
            let source = match self
                .directory
                .get_data_source(&ctx.tenant_id, &endpoint.id)
                .await
            {
                Ok(source) => source,
                Err(e) => {
                    tracing::warn!(
                        request_id = %ctx.request_id,
                        data_source_id = %endpoint.id,
                        error = %e,
                        "Failed to load data source for interface update"
                    );
                    continue;
                }
            };
            if !source.is_data_ifc_out() {
                continue;
            }
            tracing::info!(
                request_id = %ctx.request_id,
                data_source = %source.name,
                edge_id = %source.edge_id,
                entity = T::ENTITY_TYPE.canonical_name(),
                "Sending data interface update"
            );
            self.route::<DataSource>(ctx, &notification, &source).await;
        }
    }

    /// Re-announces deployed applications that read from the data source.
    async fn refresh_applications_of_data_source(&self, ctx: &DispatchContext, data_source_id: &str) {
        let apps = match self
            .directory
            .select_applications_for_data_ifc_endpoint(&ctx.tenant_id, data_source_id)
            .await
        {
            Ok(apps) => apps,
            Err(e) => {
                tracing::warn!(
                    request_id = %ctx.request_id,
                    data_source_id = %data_source_id,
                    error = %e,
                    "Failed to load applications for data source"
                );
                return;
            }
        };
        let notification = Notification::new(
            EntityType::Application,
            Operation::Update,
            Operation::Update,
        );
        for app in apps
            .iter()
            .filter(|app| app.entity_state() != Some(EntityState::Undeploy))
        {
            self.route::<Application>(ctx, &notification, app).await;
        }
    }
}

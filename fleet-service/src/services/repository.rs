//! Domain access layer over a [`DocumentStore`]: typed entity CRUD, object
//! directory and identity lookups.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use super::directory::{IdentityResolver, ObjectDirectory};
use super::store::{DocumentStore, EntityStore, NotifyCallback};
use crate::models::auth_context::EDGE_ROLE;
use crate::models::{
    Application, AuthContext, Category, DataSource, Entity, EntityType, Project, ProjectRole,
    ServiceDomain, TenantClaim, User,
};

pub const TENANT_CLAIMS_COLLECTION: &str = "tenant_claims";

#[derive(Clone)]
pub struct Repository {
    docs: Arc<dyn DocumentStore>,
}

impl Repository {
    pub fn new(docs: Arc<dyn DocumentStore>) -> Self {
        Self { docs }
    }

    pub fn documents(&self) -> &Arc<dyn DocumentStore> {
        &self.docs
    }

    async fn load<T: DeserializeOwned>(
        &self,
        entity_type: EntityType,
        tenant_id: &str,
        id: &str,
    ) -> Result<T, AppError> {
        let value = self
            .docs
            .get(entity_type.collection(), tenant_id, id)
            .await?
            .ok_or_else(|| not_found(entity_type.canonical_name(), id))?;
        decode(value)
    }

    async fn find_all<T: DeserializeOwned>(
        &self,
        entity_type: EntityType,
        tenant_id: &str,
        field: &str,
        value: &str,
    ) -> Result<Vec<T>, AppError> {
        self.docs
            .find(entity_type.collection(), Some(tenant_id), field, value)
            .await?
            .into_iter()
            .map(decode)
            .collect()
    }

    async fn find_user(&self, field: &str, value: &str) -> Result<User, AppError> {
        self.docs
            .find(EntityType::User.collection(), None, field, value)
            .await?
            .into_iter()
            .next()
            .map(decode)
            .transpose()?
            .ok_or_else(|| not_found("User", value))
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, AppError> {
    serde_json::from_value(value)
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Malformed stored document: {}", e)))
}

fn not_found(kind: &str, id: &str) -> AppError {
    AppError::NotFound(format!("{} {}", kind, id))
}

#[async_trait]
impl<T: Entity> EntityStore<T> for Repository {
    async fn select_all(&self, auth: &AuthContext) -> Result<Vec<T>, AppError> {
        self.docs
            .list(T::ENTITY_TYPE.collection(), &auth.tenant_id)
            .await?
            .into_iter()
            .map(decode)
            .collect()
    }

    async fn get(&self, auth: &AuthContext, id: &str) -> Result<T, AppError> {
        self.load(T::ENTITY_TYPE, &auth.tenant_id, id).await
    }

    async fn create(
        &self,
        auth: &AuthContext,
        mut doc: T,
        notify: NotifyCallback<T>,
    ) -> Result<Value, AppError> {
        doc.set_tenant_id(auth.tenant_id.clone());
        if doc.id().is_empty() {
            doc.set_id(Uuid::new_v4().to_string());
        }
        doc.validate()?;
        doc.before_store()?;

        let value = serde_json::to_value(&doc)?;
        self.docs.insert(T::ENTITY_TYPE.collection(), value).await?;
        tracing::debug!(
            entity = T::ENTITY_TYPE.canonical_name(),
            id = %doc.id(),
            tenant_id = %auth.tenant_id,
            "Created entity"
        );

        let id = doc.id().to_string();
        notify.call(doc).await;
        Ok(json!({ "id": id }))
    }

    async fn update(
        &self,
        auth: &AuthContext,
        mut doc: T,
        notify: NotifyCallback<T>,
    ) -> Result<Value, AppError> {
        doc.set_tenant_id(auth.tenant_id.clone());
        let previous: T = self.load(T::ENTITY_TYPE, &auth.tenant_id, doc.id()).await?;
        doc.carry_over(&previous);
        doc.validate()?;
        doc.check_update(&previous, self).await?;
        doc.before_store()?;

        let value = serde_json::to_value(&doc)?;
        let replaced = self
            .docs
            .replace(T::ENTITY_TYPE.collection(), &auth.tenant_id, doc.id(), value)
            .await?;
        if !replaced {
            return Err(not_found(T::ENTITY_TYPE.canonical_name(), doc.id()));
        }

        let id = doc.id().to_string();
        notify.call(doc).await;
        Ok(json!({ "id": id }))
    }

    async fn delete(
        &self,
        auth: &AuthContext,
        id: &str,
        notify: NotifyCallback<T>,
    ) -> Result<Value, AppError> {
        let removed = self
            .docs
            .remove(T::ENTITY_TYPE.collection(), &auth.tenant_id, id)
            .await?
            .ok_or_else(|| not_found(T::ENTITY_TYPE.canonical_name(), id))?;
        let doc: T = decode(removed)?;
        notify.call(doc).await;
        Ok(json!({ "id": id }))
    }
}

#[async_trait]
impl ObjectDirectory for Repository {
    async fn get_project(&self, tenant_id: &str, id: &str) -> Result<Project, AppError> {
        self.load(EntityType::Project, tenant_id, id).await
    }

    async fn get_service_domain(
        &self,
        tenant_id: &str,
        id: &str,
    ) -> Result<ServiceDomain, AppError> {
        self.load(EntityType::ServiceDomain, tenant_id, id).await
    }

    async fn get_data_source(&self, tenant_id: &str, id: &str) -> Result<DataSource, AppError> {
        self.load(EntityType::DataSource, tenant_id, id).await
    }

    async fn get_category(&self, tenant_id: &str, id: &str) -> Result<Category, AppError> {
        self.load(EntityType::Category, tenant_id, id).await
    }

    async fn select_applications_for_data_ifc_endpoint(
        &self,
        tenant_id: &str,
        data_source_id: &str,
    ) -> Result<Vec<Application>, AppError> {
        self.find_all(
            EntityType::Application,
            tenant_id,
            "dataIfcEndpoints.id",
            data_source_id,
        )
        .await
    }

    async fn projects_containing_edge(
        &self,
        tenant_id: &str,
        edge_id: &str,
    ) -> Result<Vec<Project>, AppError> {
        self.find_all(EntityType::Project, tenant_id, "edgeIds", edge_id)
            .await
    }

    async fn edges_bound_to_cloud_profile(
        &self,
        tenant_id: &str,
        profile_id: &str,
    ) -> Result<Vec<String>, AppError> {
        let projects: Vec<Project> = self
            .find_all(EntityType::Project, tenant_id, "cloudProfileIds", profile_id)
            .await?;
        let mut edges: Vec<String> = Vec::new();
        for edge in projects.into_iter().flat_map(|p| p.edge_ids) {
            if !edges.contains(&edge) {
                edges.push(edge);
            }
        }
        Ok(edges)
    }

    async fn script_in_use(&self, tenant_id: &str, script_id: &str) -> Result<bool, AppError> {
        let pipelines = self
            .docs
            .find(
                EntityType::DataPipeline.collection(),
                Some(tenant_id),
                "transformationScriptIds",
                script_id,
            )
            .await?;
        Ok(!pipelines.is_empty())
    }

    async fn ensure_project_member(
        &self,
        tenant_id: &str,
        project_id: &str,
        user_id: &str,
        role: &str,
    ) -> Result<(), AppError> {
        let added = self
            .docs
            .push_unique(
                EntityType::Project.collection(),
                tenant_id,
                project_id,
                "users",
                "userId",
                json!({ "userId": user_id, "role": role }),
            )
            .await?
            .ok_or_else(|| not_found("Project", project_id))?;
        if added {
            tracing::info!(
                tenant_id = %tenant_id,
                project_id = %project_id,
                user_id = %user_id,
                "Added user to provisioned project"
            );
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityResolver for Repository {
    async fn get_user(&self, id: &str) -> Result<User, AppError> {
        self.find_user("id", id).await
    }

    async fn get_user_by_email(&self, email: &str) -> Result<User, AppError> {
        self.find_user("email", email).await
    }

    async fn get_user_project_roles(
        &self,
        tenant_id: &str,
        user_id: &str,
    ) -> Result<Vec<ProjectRole>, AppError> {
        let projects: Vec<Project> = self
            .find_all(EntityType::Project, tenant_id, "users.userId", user_id)
            .await?;
        Ok(projects
            .into_iter()
            .filter_map(|p| {
                let role = p.users.iter().find(|u| u.user_id == user_id)?.role.clone();
                Some(ProjectRole {
                    project_id: p.id,
                    role,
                })
            })
            .collect())
    }

    async fn get_edge_project_roles(
        &self,
        tenant_id: &str,
        edge_id: &str,
    ) -> Result<Vec<ProjectRole>, AppError> {
        let projects = self.projects_containing_edge(tenant_id, edge_id).await?;
        Ok(projects
            .into_iter()
            .map(|p| ProjectRole {
                project_id: p.id,
                role: EDGE_ROLE.to_string(),
            })
            .collect())
    }

    async fn get_tenant_claim(&self, tenant_id: &str) -> Result<TenantClaim, AppError> {
        let value = self
            .docs
            .get(TENANT_CLAIMS_COLLECTION, tenant_id, tenant_id)
            .await?
            .ok_or_else(|| not_found("TenantClaim", tenant_id))?;
        decode(value)
    }
}

//! Read-side lookups used by notification routing and request enrichment.

use async_trait::async_trait;
use service_core::error::AppError;

use crate::models::{
    Application, Category, DataSource, Project, ProjectRole, ServiceDomain, TenantClaim, User,
};

/// Tenant-scoped object lookups.
#[async_trait]
pub trait ObjectDirectory: Send + Sync {
    async fn get_project(&self, tenant_id: &str, id: &str) -> Result<Project, AppError>;

    async fn get_service_domain(&self, tenant_id: &str, id: &str)
        -> Result<ServiceDomain, AppError>;

    async fn get_data_source(&self, tenant_id: &str, id: &str) -> Result<DataSource, AppError>;

    async fn get_category(&self, tenant_id: &str, id: &str) -> Result<Category, AppError>;

    /// Applications with a data interface endpoint bound to `data_source_id`.
    async fn select_applications_for_data_ifc_endpoint(
        &self,
        tenant_id: &str,
        data_source_id: &str,
    ) -> Result<Vec<Application>, AppError>;

    async fn projects_containing_edge(
        &self,
        tenant_id: &str,
        edge_id: &str,
    ) -> Result<Vec<Project>, AppError>;

    /// Edges of every project that lists the cloud profile.
    async fn edges_bound_to_cloud_profile(
        &self,
        tenant_id: &str,
        profile_id: &str,
    ) -> Result<Vec<String>, AppError>;

    /// Whether any data pipeline references the script.
    async fn script_in_use(&self, tenant_id: &str, script_id: &str) -> Result<bool, AppError>;

    /// Adds the user to the project with `role` unless already a member.
    async fn ensure_project_member(
        &self,
        tenant_id: &str,
        project_id: &str,
        user_id: &str,
        role: &str,
    ) -> Result<(), AppError>;
}

/// Caller identity lookups used by the auth gate.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn get_user(&self, id: &str) -> Result<User, AppError>;

    async fn get_user_by_email(&self, email: &str) -> Result<User, AppError>;

    async fn get_user_project_roles(
        &self,
        tenant_id: &str,
        user_id: &str,
    ) -> Result<Vec<ProjectRole>, AppError>;

    async fn get_edge_project_roles(
        &self,
        tenant_id: &str,
        edge_id: &str,
    ) -> Result<Vec<ProjectRole>, AppError>;

    async fn get_tenant_claim(&self, tenant_id: &str) -> Result<TenantClaim, AppError>;
}

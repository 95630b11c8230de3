//! Entity catalogue: message naming, lifecycle state and the static scoping
//! declaration that drives notification fan-out.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use service_core::error::AppError;
use validator::Validate;

use super::project::Project;
use crate::services::directory::ObjectDirectory;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityType {
    Project,
    Category,
    User,
    ServiceDomain,
    DataSource,
    DataPipeline,
    Application,
    CloudProfile,
    Script,
}

impl EntityType {
    /// Name used to build websocket message names.
    pub fn canonical_name(self) -> &'static str {
        match self {
            EntityType::Project => "Project",
            EntityType::Category => "Category",
            EntityType::User => "User",
            EntityType::ServiceDomain => "Edge",
            EntityType::DataSource => "DataSource",
            EntityType::DataPipeline => "DataStream",
            EntityType::Application => "Application",
            EntityType::CloudProfile => "CloudCreds",
            EntityType::Script => "Script",
        }
    }

    pub fn collection(self) -> &'static str {
        match self {
            EntityType::Project => "projects",
            EntityType::Category => "categories",
            EntityType::User => "users",
            EntityType::ServiceDomain => "service_domains",
            EntityType::DataSource => "data_sources",
            EntityType::DataPipeline => "data_pipelines",
            EntityType::Application => "applications",
            EntityType::CloudProfile => "cloud_profiles",
            EntityType::Script => "scripts",
        }
    }

    pub fn message(self, op: Operation) -> String {
        format!("{}{}", op.message_prefix(), self.canonical_name())
    }

    pub fn is_service_domain(self) -> bool {
        self == EntityType::ServiceDomain
    }
}

/// The mutation a handler performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl Operation {
    pub fn op_type(self) -> OpType {
        match self {
            Operation::Delete => OpType::Delete,
            Operation::Create | Operation::Update => OpType::CreateOrUpdate,
        }
    }

    fn message_prefix(self) -> &'static str {
        match self {
            Operation::Create => "onCreate",
            Operation::Update => "onUpdate",
            Operation::Delete => "onDelete",
        }
    }
}

/// Shape of the notification payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpType {
    CreateOrUpdate,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntityState {
    Deploy,
    Undeploy,
}

/// Static fan-out classification of an entity type with its accessors.
pub enum Scoping<T> {
    /// Owned by a single edge.
    DirectEdge(fn(&T) -> Option<&str>),
    /// Owned by a project; its member edges receive the change.
    Project(fn(&T) -> &str),
    /// Bound to edges gathered from several projects.
    CrossProject(fn(&T) -> &[String]),
    TenantGlobal,
}

/// Reference from a pipeline or application to a data interface field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataIfcEndpoint {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub value: String,
}

#[async_trait]
pub trait Entity:
    Serialize + DeserializeOwned + Validate + Clone + Send + Sync + 'static
{
    const ENTITY_TYPE: EntityType;
    const SCOPING: Scoping<Self>;

    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);
    fn tenant_id(&self) -> &str;
    fn set_tenant_id(&mut self, tenant_id: String);

    /// Lifecycle state for stateful entities.
    fn entity_state(&self) -> Option<EntityState> {
        None
    }

    fn data_ifc_endpoints(&self) -> &[DataIfcEndpoint] {
        &[]
    }

    /// Projects whose edges must be refreshed after this document changes.
    fn refresh_projects(&self) -> &[Project] {
        &[]
    }

    /// Client-visible JSON form, used for responses and notifications.
    fn public_view(&self) -> Result<Value, AppError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Normalizes a decoded document before it is written.
    fn before_store(&mut self) -> Result<(), AppError> {
        Ok(())
    }

    /// Copies stored fields an update request may omit.
    fn carry_over(&mut self, _previous: &Self) {}

    /// Validates an update against the currently stored document.
    async fn check_update(
        &self,
        _previous: &Self,
        _directory: &dyn ObjectDirectory,
    ) -> Result<(), AppError> {
        Ok(())
    }

    /// Loads runtime bindings that are not persisted with the document.
    async fn resolve_bindings(&mut self, _directory: &dyn ObjectDirectory) -> Result<(), AppError> {
        Ok(())
    }

    /// Per-edge view of the document. `None` sends the public view unchanged.
    async fn render_for_edge(
        &self,
        _directory: &dyn ObjectDirectory,
        _edge_id: &str,
    ) -> Result<Option<Value>, AppError> {
        Ok(None)
    }
}

/// Implements the identity accessors of [`Entity`] for a struct with `id`
/// and `tenant_id` fields.
macro_rules! entity_identity {
    () => {
        fn id(&self) -> &str {
            &self.id
        }

        fn set_id(&mut self, id: String) {
            self.id = id;
        }

        fn tenant_id(&self) -> &str {
            &self.tenant_id
        }

        fn set_tenant_id(&mut self, tenant_id: String) {
            self.tenant_id = tenant_id;
        }
    };
}

pub(crate) use entity_identity;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_names_use_canonical_type() {
        assert_eq!(EntityType::Project.message(Operation::Update), "onUpdateProject");
        assert_eq!(EntityType::ServiceDomain.message(Operation::Delete), "onDeleteEdge");
        assert_eq!(
            EntityType::DataPipeline.message(Operation::Create),
            "onCreateDataStream"
        );
    }

    #[test]
    fn entity_state_uses_uppercase_wire_names() {
        assert_eq!(
            serde_json::to_value(EntityState::Undeploy).unwrap(),
            serde_json::json!("UNDEPLOY")
        );
    }
}

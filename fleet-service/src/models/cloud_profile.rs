use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use service_core::error::AppError;
use validator::Validate;

use super::entity::{entity_identity, Entity, EntityType, Scoping};
use crate::services::directory::ObjectDirectory;

/// Cloud credentials shared by every project that lists the profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CloudProfile {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub tenant_id: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[serde(rename = "type")]
    pub cloud_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws_credential: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gcp_credential: Option<Value>,
    #[serde(skip)]
    pub edge_ids: Vec<String>,
}

fn bound_edges(profile: &CloudProfile) -> &[String] {
    &profile.edge_ids
}

#[async_trait]
impl Entity for CloudProfile {
    const ENTITY_TYPE: EntityType = EntityType::CloudProfile;
    const SCOPING: Scoping<Self> = Scoping::CrossProject(bound_edges);

    entity_identity!();

    async fn resolve_bindings(&mut self, directory: &dyn ObjectDirectory) -> Result<(), AppError> {
        self.edge_ids = directory
            .edges_bound_to_cloud_profile(&self.tenant_id, &self.id)
            .await?;
        Ok(())
    }
}

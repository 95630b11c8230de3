use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::entity::{entity_identity, DataIfcEndpoint, Entity, EntityType, Scoping};

/// A data stream running on the edges of its project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DataPipeline {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub tenant_id: String,
    #[validate(length(min = 1))]
    pub project_id: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub data_ifc_endpoints: Vec<DataIfcEndpoint>,
    #[serde(default)]
    pub transformation_script_ids: Vec<String>,
}

fn owning_project(pipeline: &DataPipeline) -> &str {
    &pipeline.project_id
}

#[async_trait]
impl Entity for DataPipeline {
    const ENTITY_TYPE: EntityType = EntityType::DataPipeline;
    const SCOPING: Scoping<Self> = Scoping::Project(owning_project);

    entity_identity!();

    fn data_ifc_endpoints(&self) -> &[DataIfcEndpoint] {
        &self.data_ifc_endpoints
    }
}

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::entity::{entity_identity, Entity, EntityType, Scoping};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub tenant_id: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[serde(default)]
    pub purpose: String,
    #[serde(default)]
    pub values: Vec<String>,
}

/// A category label attached to an edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryInfo {
    pub id: String,
    pub value: String,
}

#[async_trait]
impl Entity for Category {
    const ENTITY_TYPE: EntityType = EntityType::Category;
    const SCOPING: Scoping<Self> = Scoping::TenantGlobal;

    entity_identity!();
}

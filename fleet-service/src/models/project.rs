use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::entity::{entity_identity, Entity, EntityType, Scoping};

pub const PROJECT_ROLE_ADMIN: &str = "PROJECT_ADMIN";
pub const PROJECT_ROLE_USER: &str = "PROJECT_USER";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectUserInfo {
    pub user_id: String,
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub tenant_id: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub edge_ids: Vec<String>,
    #[serde(default)]
    pub users: Vec<ProjectUserInfo>,
    #[serde(default)]
    pub cloud_profile_ids: Vec<String>,
}

impl Project {
    pub fn has_member(&self, user_id: &str) -> bool {
        self.users.iter().any(|u| u.user_id == user_id)
    }

    /// Adds the user with `role` unless already a member. Returns whether the
    /// membership list changed.
    pub fn ensure_member(&mut self, user_id: &str, role: &str) -> bool {
        if self.has_member(user_id) {
            return false;
        }
        self.users.push(ProjectUserInfo {
            user_id: user_id.to_string(),
            role: role.to_string(),
        });
        true
    }
}

fn own_id(project: &Project) -> &str {
    &project.id
}

#[async_trait]
impl Entity for Project {
    const ENTITY_TYPE: EntityType = EntityType::Project;
    // A project owns itself, so fan-out falls through to the tenant broadcast.
    const SCOPING: Scoping<Self> = Scoping::Project(own_id);

    entity_identity!();
}

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use validator::Validate;

use super::category::CategoryInfo;
use super::entity::{entity_identity, Entity, EntityType, Scoping};
use super::project::Project;
use crate::services::directory::ObjectDirectory;

/// An edge device registered with the tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDomain {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub tenant_id: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[validate(length(min = 1))]
    pub serial_number: String,
    #[serde(default)]
    pub labels: Vec<CategoryInfo>,
    #[serde(skip)]
    pub labels_changed: bool,
    #[serde(skip)]
    pub refresh_projects: Vec<Project>,
}

fn own_id(edge: &ServiceDomain) -> Option<&str> {
    Some(edge.id.as_str())
}

#[async_trait]
impl Entity for ServiceDomain {
    const ENTITY_TYPE: EntityType = EntityType::ServiceDomain;
    const SCOPING: Scoping<Self> = Scoping::DirectEdge(own_id);

    entity_identity!();

    fn refresh_projects(&self) -> &[Project] {
        &self.refresh_projects
    }

    fn carry_over(&mut self, previous: &Self) {
        self.labels_changed = self.labels != previous.labels;
    }

    /// Project views only change when labels do, so the refresh wave is
    /// limited to label updates.
    async fn resolve_bindings(&mut self, directory: &dyn ObjectDirectory) -> Result<(), AppError> {
        if !self.labels_changed {
            return Ok(());
        }
        self.refresh_projects = directory
            .projects_containing_edge(&self.tenant_id, &self.id)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_projects_are_not_persisted() {
        let edge = ServiceDomain {
            id: "e1".into(),
            tenant_id: "t1".into(),
            name: "line-1".into(),
            description: String::new(),
            serial_number: "SN-1".into(),
            labels: vec![],
            labels_changed: false,
            refresh_projects: vec![Project {
                id: "p1".into(),
                tenant_id: "t1".into(),
                name: "p".into(),
                description: String::new(),
                edge_ids: vec!["e1".into()],
                users: vec![],
                cloud_profile_ids: vec![],
            }],
        };
        let value = serde_json::to_value(&edge).unwrap();
        assert!(value.get("refreshProjects").is_none());
        assert!(value.get("labelsChanged").is_none());
        assert_eq!(value["serialNumber"], "SN-1");
    }

    #[test]
    fn label_edits_are_detected_against_the_stored_edge() {
        let stored: ServiceDomain = serde_json::from_value(serde_json::json!({
            "id": "e1",
            "name": "line-1",
            "serialNumber": "SN-1",
            "labels": [{"id": "c1", "value": "berlin"}]
        }))
        .unwrap();

        let mut renamed = ServiceDomain {
            name: "line-1b".into(),
            ..stored.clone()
        };
        renamed.carry_over(&stored);
        assert!(!renamed.labels_changed);

        let mut relabeled = ServiceDomain {
            labels: vec![CategoryInfo {
                id: "c1".into(),
                value: "munich".into(),
            }],
            ..stored.clone()
        };
        relabeled.carry_over(&stored);
        assert!(relabeled.labels_changed);
    }
}

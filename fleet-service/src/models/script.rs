use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use validator::Validate;

use super::entity::{entity_identity, Entity, EntityType, Scoping};
use crate::services::directory::ObjectDirectory;

/// A transformation function referenced by data pipelines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Script {
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
    pub language: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub runtime_id: String,
    /// Set from the `forceUpdate` query parameter; never stored.
    #[serde(default, skip_serializing)]
    pub force_update: bool,
}

impl Script {
    /// True when only descriptive fields differ from `other`.
    fn only_metadata_changed(&self, other: &Script) -> bool {
        self.project_id == other.project_id
            && self.language == other.language
            && self.code == other.code
            && self.runtime_id == other.runtime_id
    }
}

fn owning_project(script: &Script) -> &str {
    &script.project_id
}

#[async_trait]
impl Entity for Script {
    const ENTITY_TYPE: EntityType = EntityType::Script;
    const SCOPING: Scoping<Self> = Scoping::Project(owning_project);

    entity_identity!();

    async fn check_update(
        &self,
        previous: &Self,
        directory: &dyn ObjectDirectory,
    ) -> Result<(), AppError> {
        if self.force_update || self.only_metadata_changed(previous) {
            return Ok(());
        }
        if directory.script_in_use(&self.tenant_id, &self.id).await? {
            return Err(AppError::RecordInUse(format!(
                "script {} is used by a data pipeline",
                self.id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn force_update_is_read_but_not_written() {
        let script: Script = serde_json::from_value(json!({
            "projectId": "p1",
            "name": "scale",
            "code": "def main(ctx, x): return x",
            "forceUpdate": true
        }))
        .unwrap();
        assert!(script.force_update);
        let stored = serde_json::to_value(&script).unwrap();
        assert!(stored.get("forceUpdate").is_none());
    }

    #[test]
    fn rename_counts_as_metadata_only() {
        let base: Script =
            serde_json::from_value(json!({"projectId": "p1", "name": "a", "code": "x"})).unwrap();
        let mut renamed = base.clone();
        renamed.name = "b".into();
        renamed.description = "new".into();
        assert!(renamed.only_metadata_changed(&base));
        renamed.code = "y".into();
        assert!(!renamed.only_metadata_changed(&base));
    }
}

use std::collections::HashMap;
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use service_core::error::AppError;
use validator::Validate;

use super::entity::{entity_identity, DataIfcEndpoint, Entity, EntityState, EntityType, Scoping};
use crate::services::directory::ObjectDirectory;

/// A containerized application deployed to the edges of its project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Application {
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
    pub yaml_data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<EntityState>,
    #[serde(default)]
    pub data_ifc_endpoints: Vec<DataIfcEndpoint>,
}

/// Values substituted into an application manifest for one edge.
#[derive(Debug, Clone, Default)]
pub struct RenderContext {
    pub edge_id: String,
    pub edge_name: String,
    pub project_id: String,
    pub project_name: String,
    pub app_id: String,
    pub app_name: String,
    pub categories: HashMap<String, String>,
}

fn placeholder() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\{\{\s*\.([A-Za-z]+)(?:\.([^\s{}]+))?\s*\}\}").expect("valid placeholder regex")
    })
}

/// Substitutes `{{.Field}}` placeholders. Unknown placeholders are left untouched.
pub fn render_template(template: &str, ctx: &RenderContext) -> String {
    placeholder()
        .replace_all(template, |caps: &Captures| {
            let key = caps.get(2).map(|m| m.as_str());
            let value = match (&caps[1], key) {
                ("EdgeID", None) => Some(ctx.edge_id.clone()),
                ("EdgeName", None) => Some(ctx.edge_name.clone()),
                ("ProjectID", None) => Some(ctx.project_id.clone()),
                ("ProjectName", None) => Some(ctx.project_name.clone()),
                ("AppID", None) => Some(ctx.app_id.clone()),
                ("AppName", None) => Some(ctx.app_name.clone()),
                ("Namespace", None) => Some(format!("project-{}", ctx.project_id)),
                ("Categories", Some(name)) => ctx.categories.get(name).cloned(),
                _ => None,
            };
            value.unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn owning_project(app: &Application) -> &str {
    &app.project_id
}

#[async_trait]
impl Entity for Application {
    const ENTITY_TYPE: EntityType = EntityType::Application;
    const SCOPING: Scoping<Self> = Scoping::Project(owning_project);

    entity_identity!();

    fn entity_state(&self) -> Option<EntityState> {
        self.state
    }

    fn data_ifc_endpoints(&self) -> &[DataIfcEndpoint] {
        &self.data_ifc_endpoints
    }

    async fn render_for_edge(
        &self,
        directory: &dyn ObjectDirectory,
        edge_id: &str,
    ) -> Result<Option<Value>, AppError> {
        if !placeholder().is_match(&self.yaml_data) {
            return Ok(None);
        }

        let edge = directory.get_service_domain(&self.tenant_id, edge_id).await?;
        let project = directory.get_project(&self.tenant_id, &self.project_id).await?;
        let mut categories = HashMap::new();
        for label in &edge.labels {
            let category = directory.get_category(&self.tenant_id, &label.id).await?;
            categories.insert(category.name, label.value.clone());
        }

        let ctx = RenderContext {
            edge_id: edge.id,
            edge_name: edge.name,
            project_id: project.id,
            project_name: project.name,
            app_id: self.id.clone(),
            app_name: self.name.clone(),
            categories,
        };
        let mut rendered = self.clone();
        rendered.yaml_data = render_template(&self.yaml_data, &ctx);
        Ok(Some(rendered.public_view()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> RenderContext {
        RenderContext {
            edge_id: "e1".into(),
            edge_name: "line-1".into(),
            project_id: "p1".into(),
            project_name: "Factory".into(),
            app_id: "a1".into(),
            app_name: "counter".into(),
            categories: HashMap::from([("Site".to_string(), "berlin".to_string())]),
        }
    }

    #[test]
    fn known_placeholders_are_substituted() {
        let out = render_template(
            "name: {{.AppName}}-{{ .EdgeID }}\nns: {{.Namespace}}\nsite: {{.Categories.Site}}",
            &ctx(),
        );
        assert_eq!(out, "name: counter-e1\nns: project-p1\nsite: berlin");
    }

    #[test]
    fn unknown_placeholders_are_left_alone() {
        let out = render_template("{{.Unknown}} {{.Categories.Missing}}", &ctx());
        assert_eq!(out, "{{.Unknown}} {{.Categories.Missing}}");
    }

    #[test]
    fn state_is_exposed_to_notifications() {
        let app: Application = serde_json::from_value(serde_json::json!({
            "projectId": "p1",
            "name": "counter",
            "state": "UNDEPLOY"
        }))
        .unwrap();
        assert_eq!(app.entity_state(), Some(EntityState::Undeploy));
    }
}

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const ADMIN_ROLE: &str = "admin";
pub const EDGE_ROLE: &str = "edge";
pub const OPERATOR_ROLE: &str = "operator";
pub const OPERATOR_TENANT_ROLE: &str = "operator_tenant";
pub const NO_SPECIAL_ROLE: &str = "none";

/// Claim names shared by tokens, audit records and enrichment.
pub mod claim_keys {
    pub const TENANT_ID: &str = "tenantId";
    pub const EMAIL: &str = "email";
    pub const ID: &str = "id";
    pub const EDGE_ID: &str = "edgeId";
    pub const SPECIAL_ROLE: &str = "specialRole";
    pub const PROJECTS: &str = "projects";
}

/// Membership of the caller in one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRole {
    pub project_id: String,
    pub role: String,
}

/// Caller identity for one request. Built by the auth gate, read-only afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthContext {
    pub tenant_id: String,
    pub claims: Map<String, Value>,
}

impl AuthContext {
    pub fn new(tenant_id: impl Into<String>, claims: Map<String, Value>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            claims,
        }
    }

    /// Administrative context used for work detached from any caller.
    pub fn admin(tenant_id: impl Into<String>) -> Self {
        let tenant_id = tenant_id.into();
        let mut claims = Map::new();
        claims.insert(claim_keys::TENANT_ID.into(), Value::String(tenant_id.clone()));
        claims.insert(claim_keys::SPECIAL_ROLE.into(), Value::String(ADMIN_ROLE.into()));
        Self { tenant_id, claims }
    }

    pub fn claim_str(&self, key: &str) -> Option<&str> {
        self.claims
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// The special role carried by the claims, empty when absent.
    pub fn special_role(&self) -> &str {
        self.claim_str(claim_keys::SPECIAL_ROLE).unwrap_or("")
    }

    pub fn user_id(&self) -> Option<&str> {
        self.claim_str(claim_keys::ID)
    }

    pub fn email(&self) -> Option<&str> {
        self.claim_str(claim_keys::EMAIL)
    }

    pub fn edge_id(&self) -> Option<&str> {
        self.claim_str(claim_keys::EDGE_ID)
    }

    pub fn is_admin(&self) -> bool {
        self.special_role() == ADMIN_ROLE
    }

    pub fn is_edge(&self) -> bool {
        self.special_role() == EDGE_ROLE
    }

    pub fn project_roles(&self) -> Vec<ProjectRole> {
        self.claims
            .get(claim_keys::PROJECTS)
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default()
    }

    pub fn set_project_roles(&mut self, roles: &[ProjectRole]) {
        let value = serde_json::to_value(roles).unwrap_or(Value::Array(Vec::new()));
        self.claims.insert(claim_keys::PROJECTS.into(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn admin_context_carries_admin_role() {
        let ctx = AuthContext::admin("t1");
        assert!(ctx.is_admin());
        assert_eq!(ctx.claim_str(claim_keys::TENANT_ID), Some("t1"));
    }

    #[test]
    fn project_roles_round_trip_through_claims() {
        let mut ctx = AuthContext::new("t1", Map::new());
        assert!(ctx.project_roles().is_empty());
        ctx.set_project_roles(&[ProjectRole {
            project_id: "p1".into(),
            role: "PROJECT_ADMIN".into(),
        }]);
        assert_eq!(
            ctx.claims["projects"],
            json!([{"projectId": "p1", "role": "PROJECT_ADMIN"}])
        );
        assert_eq!(ctx.project_roles()[0].project_id, "p1");
    }

    #[test]
    fn empty_claim_values_are_absent() {
        let claims = json!({"email": "", "edgeId": "e1"});
        let ctx = AuthContext::new("t1", claims.as_object().cloned().unwrap());
        assert_eq!(ctx.email(), None);
        assert_eq!(ctx.edge_id(), Some("e1"));
        assert_eq!(ctx.special_role(), "");
    }
}

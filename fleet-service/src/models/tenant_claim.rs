use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const PROJECT_RESOURCE_TYPE: &str = "PROJECT";
pub const TENANT_STATE_DELETING: &str = "DELETING";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimResource {
    #[serde(rename = "type")]
    pub resource_type: String,
}

/// Provisioning record of a tenant, keyed by resource id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantClaim {
    pub id: String,
    #[serde(default)]
    pub trial: bool,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub resources: BTreeMap<String, ClaimResource>,
}

impl TenantClaim {
    pub fn is_expired_trial(&self) -> bool {
        self.trial && self.state == TENANT_STATE_DELETING
    }

    /// Ids of the projects provisioned for the tenant.
    pub fn project_ids(&self) -> impl Iterator<Item = &str> {
        self.resources
            .iter()
            .filter(|(_, r)| r.resource_type == PROJECT_RESOURCE_TYPE)
            .map(|(id, _)| id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn project_resources_are_listed() {
        let claim: TenantClaim = serde_json::from_value(json!({
            "id": "t1",
            "trial": true,
            "state": "ACTIVE",
            "resources": {
                "p1": {"type": "PROJECT"},
                "e1": {"type": "EDGE"}
            }
        }))
        .unwrap();
        assert_eq!(claim.project_ids().collect::<Vec<_>>(), vec!["p1"]);
        assert!(!claim.is_expired_trial());
    }
}

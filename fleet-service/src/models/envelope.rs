use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Create/update notification carrying the full document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectRequest {
    pub request_id: String,
    pub tenant_id: String,
    pub doc: Value,
}

/// Delete notification carrying only the entity reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRequest {
    pub tenant_id: String,
    pub id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelopes_use_camel_case_wire_names() {
        let object = ObjectRequest {
            request_id: "r1".into(),
            tenant_id: "t1".into(),
            doc: json!({"id": "x"}),
        };
        assert_eq!(
            serde_json::to_value(&object).unwrap(),
            json!({"requestId": "r1", "tenantId": "t1", "doc": {"id": "x"}})
        );

        let delete = DeleteRequest {
            tenant_id: "t1".into(),
            id: "x".into(),
        };
        assert_eq!(
            serde_json::to_value(&delete).unwrap(),
            json!({"tenantId": "t1", "id": "x"})
        );
    }
}

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::entity::{entity_identity, Entity, EntityType, Scoping};

/// Interface kind of a data source that receives data from pipelines.
pub const DATA_IFC_KIND_OUT: &str = "OUT";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataIfcInfo {
    pub kind: String,
    #[serde(default)]
    pub class: String,
    #[serde(default)]
    pub img: String,
}

/// A sensor or data interface attached to one edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DataSource {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub tenant_id: String,
    #[validate(length(min = 1))]
    pub edge_id: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[serde(default)]
    pub protocol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ifc_info: Option<DataIfcInfo>,
}

impl DataSource {
    pub fn is_data_ifc_out(&self) -> bool {
        self.ifc_info
            .as_ref()
            .is_some_and(|info| info.kind == DATA_IFC_KIND_OUT)
    }
}

fn owning_edge(source: &DataSource) -> Option<&str> {
    Some(source.edge_id.as_str()).filter(|id| !id.is_empty())
}

#[async_trait]
impl Entity for DataSource {
    const ENTITY_TYPE: EntityType = EntityType::DataSource;
    const SCOPING: Scoping<Self> = Scoping::DirectEdge(owning_edge);

    entity_identity!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn out_kind_is_detected() {
        let source: DataSource = serde_json::from_value(json!({
            "edgeId": "e1",
            "name": "mqtt-out",
            "ifcInfo": {"kind": "OUT", "class": "DATAINTERFACE"}
        }))
        .unwrap();
        assert!(source.is_data_ifc_out());

        let plain: DataSource =
            serde_json::from_value(json!({"edgeId": "e1", "name": "camera"})).unwrap();
        assert!(!plain.is_data_ifc_out());
    }

    #[test]
    fn owning_edge_ignores_empty_id() {
        let mut source: DataSource =
            serde_json::from_value(json!({"edgeId": "", "name": "camera"})).unwrap();
        assert_eq!(owning_edge(&source), None);
        source.edge_id = "e9".into();
        assert_eq!(owning_edge(&source), Some("e9"));
    }
}

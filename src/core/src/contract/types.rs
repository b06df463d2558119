//! Serde model of the contract document as it arrives on the wire.
//!
//! Field names follow the JSON exactly (including the capitalised
//! `Permissions` and `Containers` keys). Lists default to empty so that a
//! sparse document still parses; whether it is acceptable is the
//! validator's call.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Contract {
    #[serde(default)]
    pub body: ContractBody,
    #[serde(default)]
    pub signature: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContractBody {
    #[serde(default)]
    pub contract: ContractHeader,
    #[serde(rename = "requiredTechnicalContainers", default)]
    pub technical_containers: Vec<TechnicalContainers>,
    #[serde(default)]
    pub machine: String,
    #[serde(rename = "kosmosLocalSystems", default)]
    pub local_systems: Vec<String>,
    #[serde(default)]
    pub sensors: Vec<SensorDeclaration>,
    #[serde(rename = "checkSignatures", default)]
    pub check_signature: bool,
    #[serde(default)]
    pub analysis: Analysis,
    #[serde(default)]
    pub metadata: Value,
    #[serde(rename = "machineConnection", default)]
    pub machine_connection: Value,
    #[serde(default)]
    pub blockchain: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContractHeader {
    #[serde(default)]
    pub valid: Validity,
    #[serde(rename = "creationTime", default)]
    pub creation_time: String,
    #[serde(default)]
    pub partners: Vec<String>,
    #[serde(rename = "Permissions", default)]
    pub permissions: Permissions,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub version: String,
}

/// RFC 3339 validity window, kept as text until validated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Validity {
    #[serde(default)]
    pub start: String,
    #[serde(default)]
    pub end: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Permissions {
    #[serde(default)]
    pub read: Vec<String>,
    #[serde(default)]
    pub write: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TechnicalContainers {
    #[serde(default)]
    pub system: String,
    #[serde(rename = "Containers", default)]
    pub containers: Vec<ContainerSpec>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SensorDeclaration {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "storageDuration", default)]
    pub storage_duration: Vec<StorageDuration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl SensorDeclaration {
    /// Canonical text of the sensor meta, `None` when absent or JSON `null`.
    pub fn meta_key(&self) -> Option<String> {
        match &self.meta {
            None | Some(Value::Null) => None,
            Some(value) => Some(value.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageDuration {
    #[serde(rename = "systemName", default)]
    pub system_name: String,
    #[serde(default)]
    pub duration: String,
}

/// An executable analysis image reference. The whole struct is the natural
/// key of a container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerSpec {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub arguments: Vec<String>,
    #[serde(default)]
    pub environment: Vec<String>,
}

impl ContainerSpec {
    pub fn model_ref(&self) -> ModelRef {
        ModelRef {
            url: self.url.clone(),
            tag: self.tag.clone(),
        }
    }
}

/// `from`/`to` reference of a pipeline stage: a model named by image url and tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelRef {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub tag: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Analysis {
    #[serde(default)]
    pub enable: bool,
    #[serde(default)]
    pub systems: Vec<AnalysisSystem>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisSystem {
    #[serde(default)]
    pub enable: bool,
    #[serde(rename = "system", default)]
    pub name: String,
    #[serde(default)]
    pub pipelines: Vec<PipelineDeclaration>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineDeclaration {
    #[serde(rename = "ml-trigger", default)]
    pub trigger: Trigger,
    #[serde(rename = "pipeline", default)]
    pub stages: Vec<StageDeclaration>,
    #[serde(default)]
    pub sensors: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Trigger {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub definition: Option<TriggerDefinition>,
}

impl Trigger {
    /// Delay-after specification, or `None` for a trigger without definition.
    pub fn delay(&self) -> Option<String> {
        self.definition.as_ref().map(|d| d.after.clone())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriggerDefinition {
    #[serde(default)]
    pub after: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageDeclaration {
    #[serde(default)]
    pub container: ContainerSpec,
    #[serde(rename = "persistOutput", default)]
    pub persist: bool,
    #[serde(default)]
    pub from: Option<ModelRef>,
    #[serde(default)]
    pub to: Option<ModelRef>,
}

impl Contract {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    pub fn id(&self) -> &str {
        &self.body.contract.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wire_field_names() {
        let raw = br#"{
            "body": {
                "contract": {
                    "valid": {"start": "2020-01-01T00:00:00Z", "end": "2021-01-01T00:00:00Z"},
                    "creationTime": "2020-01-01T00:00:00Z",
                    "partners": ["acme"],
                    "Permissions": {"read": ["r"], "write": ["w"]},
                    "id": "c1"
                },
                "requiredTechnicalContainers": [
                    {"system": "edge", "Containers": [{"url": "u", "tag": "t"}]}
                ],
                "machine": "m1",
                "kosmosLocalSystems": ["edge"],
                "sensors": [{"name": "s1", "storageDuration": [{"systemName": "edge", "duration": "1h"}]}],
                "checkSignatures": true,
                "analysis": {"enable": true, "systems": [{"enable": true, "system": "edge",
                    "pipelines": [{"ml-trigger": {"type": "time", "definition": {"after": "5m"}},
                                   "pipeline": [{"container": {"url": "u", "tag": "t"}, "persistOutput": true,
                                                 "to": {"url": "v", "tag": "w"}}],
                                   "sensors": ["s1"]}]}]}
            },
            "signature": null
        }"#;
        let contract = Contract::from_slice(raw).unwrap();
        assert_eq!(contract.id(), "c1");
        assert_eq!(contract.body.contract.permissions.write, vec!["w"]);
        assert_eq!(contract.body.technical_containers[0].containers.len(), 1);
        assert_eq!(contract.body.local_systems, vec!["edge"]);
        assert!(contract.body.check_signature);
        let pipeline = &contract.body.analysis.systems[0].pipelines[0];
        assert_eq!(pipeline.trigger.delay().as_deref(), Some("5m"));
        assert!(pipeline.stages[0].persist);
        assert!(pipeline.stages[0].from.is_none());
        assert_eq!(pipeline.stages[0].to.as_ref().unwrap().tag, "w");
    }

    #[test]
    fn missing_meta_and_null_meta_share_a_key() {
        let absent: SensorDeclaration = serde_json::from_str(r#"{"name": "s1"}"#).unwrap();
        let null: SensorDeclaration = serde_json::from_str(r#"{"name": "s1", "meta": null}"#).unwrap();
        let set: SensorDeclaration =
            serde_json::from_str(r#"{"name": "s1", "meta": {"unit": "C"}}"#).unwrap();
        assert_eq!(absent.meta_key(), None);
        assert_eq!(null.meta_key(), None);
        assert_eq!(set.meta_key().as_deref(), Some(r#"{"unit":"C"}"#));
    }

    #[test]
    fn trigger_without_definition_has_no_delay() {
        let trigger: Trigger = serde_json::from_str(r#"{"type": "stream"}"#).unwrap();
        assert_eq!(trigger.delay(), None);
    }
}

use crate::error::BuildError;
use serde::{Deserialize, Serialize};

/// The declarative description of a flow, ready to be built.
/// This is the target structure for templates and for JSON flow files.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlowSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub edges: Vec<EdgeSpec>,
}

impl FlowSpec {
    pub fn from_json(json: &str) -> Result<Self, BuildError> {
        serde_json::from_str(json).map_err(|e| BuildError::JsonParseError(e.to_string()))
    }
}

/// Defines a single node. `kind` is resolved through the builder's parser registry,
/// `properties` holds the kind-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
    pub id: String,
    pub kind: String,
    #[serde(default, alias = "name")]
    pub label: String,
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
}

impl NodeSpec {
    pub fn new(id: &str, kind: &str, label: &str) -> Self {
        Self {
            id: id.to_string(),
            kind: kind.to_string(),
            label: label.to_string(),
            properties: serde_json::Map::new(),
        }
    }

    pub fn with_property(mut self, key: &str, value: serde_json::Value) -> Self {
        self.properties.insert(key.to_string(), value);
        self
    }
}

/// Defines a connection between two nodes. `port` is one of `output`
/// (the default), `approve` or `reject`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeSpec {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(alias = "start_node_id")]
    pub source: String,
    #[serde(alias = "end_node_id")]
    pub target: String,
    #[serde(default, alias = "connection_type")]
    pub port: Option<String>,
}

impl EdgeSpec {
    pub fn new(source: &str, target: &str) -> Self {
        Self {
            id: None,
            source: source.to_string(),
            target: target.to_string(),
            port: None,
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn with_port(mut self, port: &str) -> Self {
        self.port = Some(port.to_string());
        self
    }
}

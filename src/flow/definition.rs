//! The persisted (JSON) shape of sigils and flows.
//!
//! These structs mirror the content files one to one and carry no behaviour
//! beyond parsing; `IntoFlow` turns them into runtime types.

use crate::error::PersistError;
use ahash::AHashMap;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;

/// One sigil as authored in a content file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SigilDefinition {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default = "default_max_tier")]
    pub max_tier: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<TierDefinition>,
    #[serde(default)]
    pub flows: Vec<FlowDefinition>,
}

/// `params` lists one value per tier, tier 1 first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TierDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default)]
    pub params: IndexMap<String, Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowDefinition {
    #[serde(rename = "type", default = "default_flow_type")]
    pub flow_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
    #[serde(default = "default_chance")]
    pub chance: f64,
    #[serde(default)]
    pub cooldown: f64,
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition_logic: Option<String>,
    #[serde(default = "default_flow_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_node_id: Option<String>,
    #[serde(default)]
    pub nodes: Vec<NodeDefinition>,
}

/// A node as persisted. `effect`, `condition` and `next` are shorthands
/// for the `effectType` / `condition` params and the `next` connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDefinition {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub x: i32,
    #[serde(default)]
    pub y: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub params: serde_json::Map<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    #[serde(default, skip_serializing_if = "no_connections")]
    pub connections: AHashMap<String, String>,
}

fn no_connections(connections: &AHashMap<String, String>) -> bool {
    connections.is_empty()
}

fn default_max_tier() -> u32 {
    1
}

fn default_flow_type() -> String {
    "SIGNAL".to_string()
}

fn default_chance() -> f64 {
    100.0
}

fn default_priority() -> i32 {
    1
}

fn default_flow_id() -> String {
    "flow".to_string()
}

impl SigilDefinition {
    pub fn from_json_str(json: &str) -> Result<Self, PersistError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: &str) -> Result<Self, PersistError> {
        let json = fs::read_to_string(path).map_err(|source| PersistError::Io {
            path: path.to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// A content file holds either one sigil or a list of them.
    pub fn list_from_json_str(json: &str) -> Result<Vec<Self>, PersistError> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum OneOrMany {
            Many(Vec<SigilDefinition>),
            One(Box<SigilDefinition>),
        }
        Ok(match serde_json::from_str(json)? {
            OneOrMany::Many(list) => list,
            OneOrMany::One(one) => vec![*one],
        })
    }

    pub fn to_json_pretty(&self) -> Result<String, PersistError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

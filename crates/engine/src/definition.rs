//! Declarative workflow documents.
//!
//! A definition describes a whole workflow tree by name. It is what the
//! combiner merges and what the lifecycle manager instantiates. Conditions
//! keep their `additional` payload as raw JSON until instantiation so that
//! an overlay can patch individual keys of it.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::condition::{build_condition_with_depth, Condition, ConditionError};

/// How an overlay node combines with the base node of the same name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MergeMode {
    /// Overlay fields that are set win; everything else is kept.
    #[default]
    Merge,
    /// The overlay's mergeable fields replace the base's wholesale.
    Replace,
}

impl MergeMode {
    fn is_merge(&self) -> bool {
        *self == Self::Merge
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub processing_rules: Vec<RuleDefinition>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "MergeMode::is_merge")]
    pub merge_mode: MergeMode,
    #[serde(default)]
    pub actions: Vec<ActionDefinition>,
    #[serde(default)]
    pub rule_conditions: Vec<ConditionDefinition>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
    /// Takes precedence over `type_name` when both are set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_id: Option<i64>,
    /// Action type internal name, resolved to an id at instantiation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub settings: Map<String, Value>,
    #[serde(default, skip_serializing_if = "MergeMode::is_merge")]
    pub merge_mode: MergeMode,
    #[serde(default)]
    pub action_conditions: Vec<ConditionDefinition>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConditionDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional: Option<Map<String, Value>>,
}

impl ConditionDefinition {
    /// Build the typed condition tree described by this definition.
    pub fn to_condition(&self, max_depth: usize) -> Result<Condition, ConditionError> {
        let additional = match &self.additional {
            Some(fields) => Value::Object(fields.clone()),
            None => Value::Null,
        };
        build_condition_with_depth(&self.name, &additional, max_depth)
    }
}

impl WorkflowDefinition {
    /// Read a definition document from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DefinitionError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| DefinitionError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| DefinitionError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DefinitionError {
    #[error("unable to read workflow definition {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid workflow definition {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

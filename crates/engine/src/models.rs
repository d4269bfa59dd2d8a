//! Stored entity payloads.
//!
//! Ids are not part of these types: a store hands them back wrapped in
//! [`db::Existing`], which carries the server-assigned id.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Top-level container of processing rules for a project. Names are not
/// unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Workflow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            notes: None,
        }
    }
}

/// A processing rule as stored: its priority is always assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingRule {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub priority: i32,
    pub enabled: bool,
}

/// A processing rule about to be created. Without a priority the rule goes
/// after every existing rule of the workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProcessingRule {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl NewProcessingRule {
    pub fn new(name: impl Into<String>, priority: Option<i32>) -> Self {
        Self {
            name: name.into(),
            description: None,
            priority,
            enabled: true,
        }
    }

    pub(crate) fn with_priority(self, priority: i32) -> ProcessingRule {
        ProcessingRule {
            name: self.name,
            description: self.description,
            priority,
            enabled: self.enabled,
        }
    }
}

/// A typed operation under a rule. `settings` is shaped by the action type's
/// `definition`; the engine does not validate it against that schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
    pub type_id: i64,
    #[serde(default)]
    pub settings: Map<String, Value>,
}

impl Action {
    pub fn new(name: impl Into<String>, type_id: i64) -> Self {
        Self {
            name: name.into(),
            description: None,
            order: None,
            type_id,
            settings: Map::new(),
        }
    }
}

/// Catalog entry describing a kind of action available to a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionType {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Stable name used by workflow definitions (`typeName`).
    pub internal_name: String,
    /// JSON-schema-like document the settings of actions of this type follow.
    #[serde(default)]
    pub definition: Value,
}

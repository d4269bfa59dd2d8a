//! Row types shared by every table.
//!
//! These are *persistence* models. The entity payloads themselves (`E` in
//! [`Existing<E>`]) are defined by the `engine` crate; this crate only knows
//! how to key, scope and order them.

use std::fmt;
use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

/// Server-assigned identity of a stored entity. Never reused within a table.
pub type EntityId = i64;

// ---------------------------------------------------------------------------
// Scope
// ---------------------------------------------------------------------------

/// The direct parent an entity is stored under.
///
/// Workflows and action types live under a project, rules under a workflow,
/// actions under a rule, and conditions under either a rule or an action.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Scope {
    Project(String),
    Workflow(EntityId),
    Rule(EntityId),
    Action(EntityId),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Project(id) => write!(f, "project '{id}'"),
            Self::Workflow(id) => write!(f, "workflow {id}"),
            Self::Rule(id) => write!(f, "rule {id}"),
            Self::Action(id) => write!(f, "action {id}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Existing
// ---------------------------------------------------------------------------

/// An entity as returned by a store: the payload plus its assigned id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Existing<E> {
    pub id: EntityId,
    #[serde(flatten)]
    pub entity: E,
}

impl<E> Existing<E> {
    pub fn new(id: EntityId, entity: E) -> Self {
        Self { id, entity }
    }

    pub fn into_inner(self) -> E {
        self.entity
    }
}

impl<E> Deref for Existing<E> {
    type Target = E;

    fn deref(&self) -> &E {
        &self.entity
    }
}

impl<E> DerefMut for Existing<E> {
    fn deref_mut(&mut self) -> &mut E {
        &mut self.entity
    }
}

// ---------------------------------------------------------------------------
// configuration settings
// ---------------------------------------------------------------------------

/// A global configuration entry; `default` applies to every tenant without an
/// override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalConfigRow {
    pub key: String,
    pub default: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A tenant-specific override of a global configuration entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantConfigRow {
    pub tenant_id: String,
    pub key: String,
    pub value: String,
}

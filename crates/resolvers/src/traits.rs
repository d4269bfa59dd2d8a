//! Backing-source contracts the resolvers refresh their caches from.
//!
//! A source is typically a client for another service (the action type
//! catalog, the classification API, the boilerplate API). Every call is
//! fallible and may be slow; resolvers only call them on a cache miss.

use serde::{Deserialize, Serialize};

use crate::ResolverError;

/// A name paired with the numeric id it resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedId {
    pub name: String,
    pub id: i64,
}

impl NamedId {
    pub fn new(name: impl Into<String>, id: i64) -> Self {
        Self {
            name: name.into(),
            id,
        }
    }
}

/// The part of an action type the resolver cares about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionTypeEntry {
    pub id: i64,
    pub internal_name: String,
}

/// Lists the action types available to a project.
pub trait ActionTypeCatalog: Send + Sync {
    fn action_types(&self, project_id: &str) -> Result<Vec<ActionTypeEntry>, ResolverError>;
}

/// Lists the classification workflows of a project.
pub trait ClassificationWorkflowSource: Send + Sync {
    fn classification_workflows(&self, project_id: &str) -> Result<Vec<NamedId>, ResolverError>;
}

/// Lists boilerplate expressions and tags.
pub trait BoilerplateSource: Send + Sync {
    fn expressions(&self, project_id: &str) -> Result<Vec<NamedId>, ResolverError>;
    fn tags(&self, project_id: &str) -> Result<Vec<NamedId>, ResolverError>;
}

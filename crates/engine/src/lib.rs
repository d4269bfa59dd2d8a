//! `engine` crate: the processing configuration core.
//!
//! Holds the workflow / rule / action / condition models, the scope-checked
//! [`ConfigService`], the definition combiner and the
//! [`WorkflowLifecycleManager`] that turns a definition into stored entities.

pub mod combiner;
pub mod condition;
pub mod config;
pub mod definition;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod pager;
pub mod priority;
pub mod references;
pub mod service;
pub mod store;

pub use combiner::combine_workflows;
pub use condition::{build_condition, Condition, ConditionError, ConditionKind};
pub use config::EngineConfig;
pub use definition::{DefinitionError, MergeMode, WorkflowDefinition};
pub use error::{EngineError, EngineResult};
pub use lifecycle::{InstantiationState, WorkflowLifecycleManager};
pub use models::{Action, ActionType, NewProcessingRule, ProcessingRule, Workflow};
pub use pager::{Page, PageRequest};
pub use references::NameResolvers;
pub use service::{ConditionOwner, ConfigService, StoreActionTypeCatalog};
pub use store::{ConfigEntityStore, MemoryConfigStore};

#[cfg(test)]
mod lifecycle_tests;

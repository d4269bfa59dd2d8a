//! Scope-checked CRUD over the configuration tree.
//!
//! Every call names the full parent chain of the entity it touches
//! (project, workflow, rule, action). Each link is verified against the store
//! before the entity itself is read or written, so an id that exists under a
//! different parent is reported as not found.

mod action_types;
mod actions;
mod conditions;
mod rules;
mod settings;
mod workflows;

use std::sync::Arc;

use db::{EntityId, Existing, Scope};

use crate::{
    config::EngineConfig,
    models::{Action, ProcessingRule, Workflow},
    priority::PriorityAllocator,
    store::ConfigEntityStore,
    EngineResult,
};

pub use action_types::StoreActionTypeCatalog;
pub use conditions::ConditionOwner;
pub use settings::{EffectiveConfig, GlobalConfig, ValueType};

pub struct ConfigService {
    store: Arc<dyn ConfigEntityStore>,
    priorities: PriorityAllocator,
    config: EngineConfig,
}

impl ConfigService {
    pub fn new(store: Arc<dyn ConfigEntityStore>, config: EngineConfig) -> Self {
        Self {
            store,
            priorities: PriorityAllocator::new(),
            config,
        }
    }

    pub fn store(&self) -> &Arc<dyn ConfigEntityStore> {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Parent chain checks
    // ------------------------------------------------------------------

    fn project_workflow(
        &self,
        project_id: &str,
        workflow_id: EntityId,
    ) -> EngineResult<Existing<Workflow>> {
        Ok(self.store.workflows().get(&project_scope(project_id), workflow_id)?)
    }

    fn workflow_rule(
        &self,
        project_id: &str,
        workflow_id: EntityId,
        rule_id: EntityId,
    ) -> EngineResult<Existing<ProcessingRule>> {
        self.project_workflow(project_id, workflow_id)?;
        Ok(self.store.rules().get(&Scope::Workflow(workflow_id), rule_id)?)
    }

    fn rule_action(
        &self,
        project_id: &str,
        workflow_id: EntityId,
        rule_id: EntityId,
        action_id: EntityId,
    ) -> EngineResult<Existing<Action>> {
        self.workflow_rule(project_id, workflow_id, rule_id)?;
        Ok(self.store.actions().get(&Scope::Rule(rule_id), action_id)?)
    }
}

pub(crate) fn project_scope(project_id: &str) -> Scope {
    Scope::Project(project_id.to_string())
}

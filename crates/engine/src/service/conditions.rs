use tracing::{debug, info};

use db::{EntityId, Existing, Scope};

use super::ConfigService;
use crate::{
    condition::Condition,
    pager::{self, Page, PageRequest},
    EngineResult,
};

/// The rule or action a condition hangs off, with its full parent chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionOwner {
    Rule {
        workflow_id: EntityId,
        rule_id: EntityId,
    },
    Action {
        workflow_id: EntityId,
        rule_id: EntityId,
        action_id: EntityId,
    },
}

impl ConditionOwner {
    fn scope(&self) -> Scope {
        match *self {
            Self::Rule { rule_id, .. } => Scope::Rule(rule_id),
            Self::Action { action_id, .. } => Scope::Action(action_id),
        }
    }
}

impl ConfigService {
    pub fn create_condition(
        &self,
        project_id: &str,
        owner: ConditionOwner,
        condition: Condition,
    ) -> EngineResult<Existing<Condition>> {
        let scope = self.condition_scope(project_id, owner)?;
        condition.check_depth(self.config.max_condition_depth)?;
        let created = self.store.conditions().create(&scope, condition)?;
        info!("Created {} condition {} under {}", created.kind().type_name(), created.id, scope);
        Ok(created)
    }

    pub fn get_condition(
        &self,
        project_id: &str,
        owner: ConditionOwner,
        condition_id: EntityId,
    ) -> EngineResult<Existing<Condition>> {
        let scope = self.condition_scope(project_id, owner)?;
        Ok(self.store.conditions().get(&scope, condition_id)?)
    }

    /// Full replacement; the kind may change.
    pub fn update_condition(
        &self,
        project_id: &str,
        owner: ConditionOwner,
        condition_id: EntityId,
        condition: Condition,
    ) -> EngineResult<Existing<Condition>> {
        let scope = self.condition_scope(project_id, owner)?;
        condition.check_depth(self.config.max_condition_depth)?;
        Ok(self.store.conditions().update(&scope, condition_id, condition)?)
    }

    pub fn delete_condition(
        &self,
        project_id: &str,
        owner: ConditionOwner,
        condition_id: EntityId,
    ) -> EngineResult<()> {
        let scope = self.condition_scope(project_id, owner)?;
        self.store.conditions().delete(&scope, condition_id)?;
        Ok(())
    }

    pub fn page_conditions(
        &self,
        project_id: &str,
        owner: ConditionOwner,
        request: PageRequest,
    ) -> EngineResult<Page<Existing<Condition>>> {
        let scope = self.condition_scope(project_id, owner)?;
        pager::page(self.store.conditions(), &scope, request)
    }

    pub(super) fn delete_conditions_under(&self, scope: &Scope) -> EngineResult<()> {
        let conditions = self.store.conditions();
        for condition in conditions.list(scope)? {
            conditions.delete(scope, condition.id)?;
        }
        debug!("Removed conditions under {}", scope);
        Ok(())
    }

    fn condition_scope(&self, project_id: &str, owner: ConditionOwner) -> EngineResult<Scope> {
        match owner {
            ConditionOwner::Rule {
                workflow_id,
                rule_id,
            } => {
                self.workflow_rule(project_id, workflow_id, rule_id)?;
            }
            ConditionOwner::Action {
                workflow_id,
                rule_id,
                action_id,
            } => {
                self.rule_action(project_id, workflow_id, rule_id, action_id)?;
            }
        }
        Ok(owner.scope())
    }
}

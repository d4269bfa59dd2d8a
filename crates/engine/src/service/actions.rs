use tracing::{info, instrument};

use db::{EntityId, Existing, Scope};

use super::{project_scope, workflows::validate_name, ConfigService};
use crate::{
    models::Action,
    pager::{self, Page, PageRequest},
    EngineError, EngineResult,
};

impl ConfigService {
    #[instrument(skip(self, action), fields(name = %action.name, type_id = action.type_id))]
    pub fn create_action(
        &self,
        project_id: &str,
        workflow_id: EntityId,
        rule_id: EntityId,
        action: Action,
    ) -> EngineResult<Existing<Action>> {
        validate_name("action", &action.name)?;
        self.workflow_rule(project_id, workflow_id, rule_id)?;
        self.check_action_type(project_id, action.type_id)?;

        let created = self.store.actions().create(&Scope::Rule(rule_id), action)?;
        info!("Created action {}", created.id);
        Ok(created)
    }

    pub fn get_action(
        &self,
        project_id: &str,
        workflow_id: EntityId,
        rule_id: EntityId,
        action_id: EntityId,
    ) -> EngineResult<Existing<Action>> {
        self.rule_action(project_id, workflow_id, rule_id, action_id)
    }

    pub fn update_action(
        &self,
        project_id: &str,
        workflow_id: EntityId,
        rule_id: EntityId,
        action_id: EntityId,
        action: Action,
    ) -> EngineResult<Existing<Action>> {
        validate_name("action", &action.name)?;
        self.rule_action(project_id, workflow_id, rule_id, action_id)?;
        self.check_action_type(project_id, action.type_id)?;
        Ok(self.store.actions().update(&Scope::Rule(rule_id), action_id, action)?)
    }

    /// Delete an action and its action conditions.
    pub fn delete_action(
        &self,
        project_id: &str,
        workflow_id: EntityId,
        rule_id: EntityId,
        action_id: EntityId,
    ) -> EngineResult<()> {
        self.rule_action(project_id, workflow_id, rule_id, action_id)?;
        self.delete_action_tree(rule_id, action_id)?;
        info!("Deleted action {}", action_id);
        Ok(())
    }

    pub fn page_actions(
        &self,
        project_id: &str,
        workflow_id: EntityId,
        rule_id: EntityId,
        request: PageRequest,
    ) -> EngineResult<Page<Existing<Action>>> {
        self.workflow_rule(project_id, workflow_id, rule_id)?;
        pager::page(self.store.actions(), &Scope::Rule(rule_id), request)
    }

    pub(super) fn delete_action_tree(&self, rule_id: EntityId, action_id: EntityId) -> EngineResult<()> {
        self.delete_conditions_under(&Scope::Action(action_id))?;
        self.store.actions().delete(&Scope::Rule(rule_id), action_id)?;
        Ok(())
    }

    fn check_action_type(&self, project_id: &str, type_id: i64) -> EngineResult<()> {
        match self.store.action_types().get(&project_scope(project_id), type_id) {
            Ok(_) => Ok(()),
            Err(db::DbError::NotFound { .. }) => Err(EngineError::Validation(format!(
                "action type {type_id} does not exist in project '{project_id}'"
            ))),
            Err(other) => Err(other.into()),
        }
    }
}

use tracing::{debug, info, instrument};

use db::{EntityId, Existing, Scope};

use super::{workflows::validate_name, ConfigService};
use crate::{
    models::{NewProcessingRule, ProcessingRule},
    pager::{self, Page, PageRequest},
    priority::assign_priority,
    EngineError, EngineResult,
};

impl ConfigService {
    /// Create a rule, shifting siblings when its requested priority is taken.
    /// The read-shift-create cycle runs under the workflow's lock, and the
    /// workflow is checked again once the lock is held so a concurrent
    /// `delete_workflow` cannot leave the rule without a parent.
    #[instrument(skip(self, rule), fields(name = %rule.name, requested = ?rule.priority))]
    pub fn create_rule(
        &self,
        project_id: &str,
        workflow_id: EntityId,
        rule: NewProcessingRule,
    ) -> EngineResult<Existing<ProcessingRule>> {
        validate_name("processing rule", &rule.name)?;
        self.project_workflow(project_id, workflow_id)?;

        let scope = Scope::Workflow(workflow_id);
        let created = self
            .priorities
            .with_workflow_lock(workflow_id, || -> EngineResult<_> {
                self.project_workflow(project_id, workflow_id)?;
                let rules = self.store.rules();
                let existing: Vec<(EntityId, i32)> = rules
                    .list(&scope)?
                    .into_iter()
                    .map(|rule| (rule.id, rule.priority))
                    .collect();
                let assignment = assign_priority(&existing, rule.priority)?;

                for (id, priority) in &assignment.shifted {
                    let mut sibling = rules.get(&scope, *id)?.into_inner();
                    debug!("Moving rule {} from priority {} to {}", id, sibling.priority, priority);
                    sibling.priority = *priority;
                    rules.update(&scope, *id, sibling)?;
                }
                Ok(rules.create(&scope, rule.with_priority(assignment.priority))?)
            })?;

        info!("Created processing rule {} with priority {}", created.id, created.priority);
        Ok(created)
    }

    pub fn get_rule(
        &self,
        project_id: &str,
        workflow_id: EntityId,
        rule_id: EntityId,
    ) -> EngineResult<Existing<ProcessingRule>> {
        self.workflow_rule(project_id, workflow_id, rule_id)
    }

    /// Full replacement. Siblings are never renumbered here: a priority held
    /// by another rule of the workflow is a `Conflict`.
    pub fn update_rule(
        &self,
        project_id: &str,
        workflow_id: EntityId,
        rule_id: EntityId,
        rule: ProcessingRule,
    ) -> EngineResult<Existing<ProcessingRule>> {
        validate_name("processing rule", &rule.name)?;
        self.workflow_rule(project_id, workflow_id, rule_id)?;

        let scope = Scope::Workflow(workflow_id);
        self.priorities
            .with_workflow_lock(workflow_id, || -> EngineResult<_> {
                let rules = self.store.rules();
                if let Some(holder) = rules
                    .list(&scope)?
                    .into_iter()
                    .find(|other| other.id != rule_id && other.priority == rule.priority)
                {
                    return Err(EngineError::Conflict(format!(
                        "priority {} is already used by processing rule {} in workflow {}",
                        rule.priority, holder.id, workflow_id
                    )));
                }
                Ok(rules.update(&scope, rule_id, rule)?)
            })
    }

    /// Delete a rule together with its actions and every condition under the
    /// rule or its actions.
    #[instrument(skip(self))]
    pub fn delete_rule(
        &self,
        project_id: &str,
        workflow_id: EntityId,
        rule_id: EntityId,
    ) -> EngineResult<()> {
        self.workflow_rule(project_id, workflow_id, rule_id)?;

        let actions = self.store.actions().list(&Scope::Rule(rule_id))?;
        for action in actions {
            self.delete_action_tree(rule_id, action.id)?;
        }
        self.delete_conditions_under(&Scope::Rule(rule_id))?;

        self.priorities
            .with_workflow_lock(workflow_id, || -> EngineResult<()> {
                self.workflow_rule(project_id, workflow_id, rule_id)?;
                Ok(self.store.rules().delete(&Scope::Workflow(workflow_id), rule_id)?)
            })?;
        info!("Deleted processing rule {}", rule_id);
        Ok(())
    }

    pub fn page_rules(
        &self,
        project_id: &str,
        workflow_id: EntityId,
        request: PageRequest,
    ) -> EngineResult<Page<Existing<ProcessingRule>>> {
        self.project_workflow(project_id, workflow_id)?;
        pager::page(self.store.rules(), &Scope::Workflow(workflow_id), request)
    }
}

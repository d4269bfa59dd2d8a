//! Whole-tree instantiation and removal of workflows.
//!
//! `create_workflow` runs in phases:
//! 1. Resolves every referenced name and builds every condition tree. Nothing
//!    is written yet, so an unknown name or a malformed condition leaves the
//!    store untouched.
//! 2. Optionally removes existing workflows with the same name.
//! 3. Creates the workflow, then all rules, then all actions, then all rule
//!    and action conditions.
//!
//! Phase 3 is not transactional. If it fails part way the entities created
//! so far stay in place and the error is returned; `remove_matching` cleans
//! up before a retry.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, info, instrument};

use db::{EntityId, Scope};
use resolvers::ResolverError;

use crate::{
    combiner::combine_workflows,
    condition::Condition,
    definition::{ActionDefinition, ConditionDefinition, WorkflowDefinition},
    models::{Action, NewProcessingRule, Workflow},
    pager::collect_all,
    references::{substitute_references, NameResolvers},
    service::{project_scope, ConditionOwner, ConfigService},
    EngineError, EngineResult,
};

/// Progress of one `create_workflow` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstantiationState {
    Pending,
    NamesResolved,
    WorkflowCreated,
    RulesCreated,
    ActionsCreated,
    ConditionsCreated,
    Done,
    Failed,
}

impl fmt::Display for InstantiationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::NamesResolved => "names_resolved",
            Self::WorkflowCreated => "workflow_created",
            Self::RulesCreated => "rules_created",
            Self::ActionsCreated => "actions_created",
            Self::ConditionsCreated => "conditions_created",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

struct Progress {
    state: InstantiationState,
}

impl Progress {
    fn advance(&mut self, next: InstantiationState) {
        debug!("Instantiation {} -> {}", self.state, next);
        self.state = next;
    }
}

// Fully resolved, ready-to-write form of a definition.
struct WorkflowPlan {
    workflow: Workflow,
    rules: Vec<RulePlan>,
}

struct RulePlan {
    rule: NewProcessingRule,
    conditions: Vec<Condition>,
    actions: Vec<ActionPlan>,
}

struct ActionPlan {
    action: Action,
    conditions: Vec<Condition>,
}

pub struct WorkflowLifecycleManager {
    service: Arc<ConfigService>,
    resolvers: NameResolvers,
}

impl WorkflowLifecycleManager {
    pub fn new(service: Arc<ConfigService>, resolvers: NameResolvers) -> Self {
        Self { service, resolvers }
    }

    pub fn service(&self) -> &Arc<ConfigService> {
        &self.service
    }

    /// Merge `overlay` (if any) into `base` and instantiate the result.
    pub fn create_from_definitions(
        &self,
        mut base: WorkflowDefinition,
        overlay: Option<&WorkflowDefinition>,
        project_id: &str,
        overwrite_existing: bool,
    ) -> EngineResult<EntityId> {
        if let Some(overlay) = overlay {
            info!("Combining overlay '{}' into workflow '{}'", overlay.name, base.name);
            combine_workflows(&mut base, overlay);
        }
        self.create_workflow(&base, project_id, overwrite_existing)
    }

    /// Instantiate `definition` under `project_id` and return the new
    /// workflow's id.
    #[instrument(skip(self, definition), fields(workflow = %definition.name))]
    pub fn create_workflow(
        &self,
        definition: &WorkflowDefinition,
        project_id: &str,
        overwrite_existing: bool,
    ) -> EngineResult<EntityId> {
        let mut progress = Progress {
            state: InstantiationState::Pending,
        };
        match self.instantiate(definition, project_id, overwrite_existing, &mut progress) {
            Ok(workflow_id) => {
                progress.advance(InstantiationState::Done);
                info!(
                    "Created workflow '{}' ({}) with {} processing rule(s)",
                    definition.name,
                    workflow_id,
                    definition.processing_rules.len()
                );
                Ok(workflow_id)
            }
            Err(e) => {
                error!("Workflow instantiation failed after {}: {}", progress.state, e);
                progress.advance(InstantiationState::Failed);
                Err(e)
            }
        }
    }

    fn instantiate(
        &self,
        definition: &WorkflowDefinition,
        project_id: &str,
        overwrite_existing: bool,
        progress: &mut Progress,
    ) -> EngineResult<EntityId> {
        let plan = self.plan(definition, project_id)?;
        progress.advance(InstantiationState::NamesResolved);

        if overwrite_existing {
            self.remove_matching(project_id, &definition.name)?;
        }

        let workflow_id = self.service.create_workflow(project_id, plan.workflow)?.id;
        progress.advance(InstantiationState::WorkflowCreated);

        let mut created_rules = Vec::with_capacity(plan.rules.len());
        for RulePlan {
            rule,
            conditions,
            actions,
        } in plan.rules
        {
            let rule_id = self.service.create_rule(project_id, workflow_id, rule)?.id;
            created_rules.push((rule_id, conditions, actions));
        }
        progress.advance(InstantiationState::RulesCreated);

        let mut rule_conditions = Vec::with_capacity(created_rules.len());
        let mut action_conditions = Vec::new();
        for (rule_id, conditions, actions) in created_rules {
            for ActionPlan { action, conditions } in actions {
                let action_id = self
                    .service
                    .create_action(project_id, workflow_id, rule_id, action)?
                    .id;
                let owner = ConditionOwner::Action {
                    workflow_id,
                    rule_id,
                    action_id,
                };
                action_conditions.push((owner, conditions));
            }
            let owner = ConditionOwner::Rule {
                workflow_id,
                rule_id,
            };
            rule_conditions.push((owner, conditions));
        }
        progress.advance(InstantiationState::ActionsCreated);

        for (owner, conditions) in rule_conditions.into_iter().chain(action_conditions) {
            for condition in conditions {
                self.service.create_condition(project_id, owner, condition)?;
            }
        }
        progress.advance(InstantiationState::ConditionsCreated);

        Ok(workflow_id)
    }

    /// Delete every workflow in `project_id` called `name`, rules first.
    /// Returns how many workflows were removed.
    #[instrument(skip(self))]
    pub fn remove_matching(&self, project_id: &str, name: &str) -> EngineResult<usize> {
        let store = self.service.store();
        let page_size = self.service.config().removal_page_size;

        let matching: Vec<EntityId> =
            collect_all(store.workflows(), &project_scope(project_id), page_size)?
                .into_iter()
                .filter(|workflow| workflow.name == name)
                .map(|workflow| workflow.id)
                .collect();

        for &workflow_id in &matching {
            let rules = collect_all(store.rules(), &Scope::Workflow(workflow_id), page_size)?;
            debug!("Removing {} processing rule(s) of workflow {}", rules.len(), workflow_id);
            for rule in rules {
                self.service.delete_rule(project_id, workflow_id, rule.id)?;
            }
            self.service.delete_workflow(project_id, workflow_id)?;
            info!("Removed existing workflow {} named '{}'", workflow_id, name);
        }
        Ok(matching.len())
    }

    // ------------------------------------------------------------------
    // Planning
    // ------------------------------------------------------------------

    fn plan(&self, definition: &WorkflowDefinition, project_id: &str) -> EngineResult<WorkflowPlan> {
        let max_depth = self.service.config().max_condition_depth;
        let mut rules = Vec::with_capacity(definition.processing_rules.len());

        for rule in &definition.processing_rules {
            let actions = rule
                .actions
                .iter()
                .map(|action| self.plan_action(action, project_id, max_depth))
                .collect::<EngineResult<Vec<_>>>()?;
            rules.push(RulePlan {
                rule: NewProcessingRule {
                    name: rule.name.clone(),
                    description: rule.description.clone(),
                    priority: rule.priority,
                    enabled: rule.enabled.unwrap_or(true),
                },
                conditions: build_conditions(&rule.rule_conditions, max_depth)?,
                actions,
            });
        }

        Ok(WorkflowPlan {
            workflow: Workflow {
                name: definition.name.clone(),
                description: definition.description.clone(),
                notes: definition.notes.clone(),
            },
            rules,
        })
    }

    fn plan_action(
        &self,
        action: &ActionDefinition,
        project_id: &str,
        max_depth: usize,
    ) -> EngineResult<ActionPlan> {
        let type_id = match (action.type_id, action.type_name.as_deref()) {
            (Some(type_id), _) => type_id,
            (None, Some(type_name)) => self.resolvers.action_types.lookup(type_name, project_id)?,
            (None, None) => {
                return Err(EngineError::Validation(format!(
                    "action '{}' needs a typeId or a typeName",
                    action.name
                )))
            }
        };

        let mut settings = action.settings.clone();
        match self.resolvers.action_types.lookup_name(type_id, project_id) {
            Ok(internal_name) => {
                substitute_references(&internal_name, &mut settings, &self.resolvers, project_id)?
            }
            // Creating the action reports the unknown type.
            Err(e @ ResolverError::Unresolved { .. }) => {
                debug!("No internal name for action type {}: {}", type_id, e)
            }
            Err(e) => return Err(EngineError::Resolver(e)),
        }

        Ok(ActionPlan {
            action: Action {
                name: action.name.clone(),
                description: action.description.clone(),
                order: action.order,
                type_id,
                settings,
            },
            conditions: build_conditions(&action.action_conditions, max_depth)?,
        })
    }
}

fn build_conditions(
    definitions: &[ConditionDefinition],
    max_depth: usize,
) -> EngineResult<Vec<Condition>> {
    definitions
        .iter()
        .map(|definition| definition.to_condition(max_depth).map_err(EngineError::from))
        .collect()
}

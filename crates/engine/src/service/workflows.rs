use tracing::{info, instrument};

use db::{EntityId, Existing, Scope};

use super::{project_scope, ConfigService};
use crate::{
    models::Workflow,
    pager::{self, Page, PageRequest},
    EngineError, EngineResult,
};

impl ConfigService {
    #[instrument(skip(self, workflow), fields(name = %workflow.name))]
    pub fn create_workflow(
        &self,
        project_id: &str,
        workflow: Workflow,
    ) -> EngineResult<Existing<Workflow>> {
        validate_name("workflow", &workflow.name)?;
        let created = self.store.workflows().create(&project_scope(project_id), workflow)?;
        info!("Created workflow {}", created.id);
        Ok(created)
    }

    pub fn get_workflow(
        &self,
        project_id: &str,
        workflow_id: EntityId,
    ) -> EngineResult<Existing<Workflow>> {
        self.project_workflow(project_id, workflow_id)
    }

    pub fn update_workflow(
        &self,
        project_id: &str,
        workflow_id: EntityId,
        workflow: Workflow,
    ) -> EngineResult<Existing<Workflow>> {
        validate_name("workflow", &workflow.name)?;
        Ok(self
            .store
            .workflows()
            .update(&project_scope(project_id), workflow_id, workflow)?)
    }

    /// Fails with `Conflict` while the workflow still owns rules. The workflow's
    /// priority lock is kept so rule creation racing this call observes the
    /// deletion.
    #[instrument(skip(self))]
    pub fn delete_workflow(&self, project_id: &str, workflow_id: EntityId) -> EngineResult<()> {
        self.project_workflow(project_id, workflow_id)?;
        self.priorities.with_workflow_lock(workflow_id, || -> EngineResult<()> {
            let rules = self.store.rules().count(&Scope::Workflow(workflow_id))?;
            if rules > 0 {
                return Err(EngineError::Conflict(format!(
                    "workflow {workflow_id} still has {rules} processing rule(s); delete them first"
                )));
            }
            self.store
                .workflows()
                .delete(&project_scope(project_id), workflow_id)?;
            Ok(())
        })?;
        info!("Deleted workflow {}", workflow_id);
        Ok(())
    }

    pub fn page_workflows(
        &self,
        project_id: &str,
        request: PageRequest,
    ) -> EngineResult<Page<Existing<Workflow>>> {
        pager::page(self.store.workflows(), &project_scope(project_id), request)
    }
}

/// Names are the merge key of definitions; an empty one can never match.
pub(super) fn validate_name(entity: &str, name: &str) -> EngineResult<()> {
    if name.trim().is_empty() {
        return Err(EngineError::Validation(format!("{entity} name must not be blank")));
    }
    Ok(())
}

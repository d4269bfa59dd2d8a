use std::sync::Arc;

use tracing::{info, instrument};

use db::{EntityId, Existing, Scope};
use resolvers::{ActionTypeCatalog, ActionTypeEntry, ResolverError};

use super::{project_scope, workflows::validate_name, ConfigService};
use crate::{
    models::ActionType,
    pager::{self, Page, PageRequest},
    store::ConfigEntityStore,
    EngineError, EngineResult,
};

impl ConfigService {
    pub fn create_action_type(
        &self,
        project_id: &str,
        action_type: ActionType,
    ) -> EngineResult<Existing<ActionType>> {
        validate_name("action type", &action_type.name)?;
        self.check_internal_name(project_id, None, &action_type.internal_name)?;
        let created = self
            .store
            .action_types()
            .create(&project_scope(project_id), action_type)?;
        info!("Created action type {} ({})", created.id, created.internal_name);
        Ok(created)
    }

    pub fn get_action_type(
        &self,
        project_id: &str,
        action_type_id: EntityId,
    ) -> EngineResult<Existing<ActionType>> {
        Ok(self
            .store
            .action_types()
            .get(&project_scope(project_id), action_type_id)?)
    }

    pub fn update_action_type(
        &self,
        project_id: &str,
        action_type_id: EntityId,
        action_type: ActionType,
    ) -> EngineResult<Existing<ActionType>> {
        validate_name("action type", &action_type.name)?;
        self.check_internal_name(project_id, Some(action_type_id), &action_type.internal_name)?;
        Ok(self
            .store
            .action_types()
            .update(&project_scope(project_id), action_type_id, action_type)?)
    }

    /// Fails with `Conflict` while any action of the project still uses the type.
    #[instrument(skip(self))]
    pub fn delete_action_type(&self, project_id: &str, action_type_id: EntityId) -> EngineResult<()> {
        let scope = project_scope(project_id);
        self.store.action_types().get(&scope, action_type_id)?;

        let users = self.actions_using_type(project_id, action_type_id)?;
        if users > 0 {
            return Err(EngineError::Conflict(format!(
                "action type {action_type_id} is still used by {users} action(s)"
            )));
        }
        self.store.action_types().delete(&scope, action_type_id)?;
        info!("Deleted action type {}", action_type_id);
        Ok(())
    }

    pub fn page_action_types(
        &self,
        project_id: &str,
        request: PageRequest,
    ) -> EngineResult<Page<Existing<ActionType>>> {
        pager::page(self.store.action_types(), &project_scope(project_id), request)
    }

    fn actions_using_type(&self, project_id: &str, action_type_id: EntityId) -> EngineResult<usize> {
        let mut users = 0;
        for workflow in self.store.workflows().list(&project_scope(project_id))? {
            for rule in self.store.rules().list(&Scope::Workflow(workflow.id))? {
                users += self
                    .store
                    .actions()
                    .list(&Scope::Rule(rule.id))?
                    .iter()
                    .filter(|action| action.type_id == action_type_id)
                    .count();
            }
        }
        Ok(users)
    }

    /// Internal names are what definitions refer to, so they must be unique
    /// within a project.
    fn check_internal_name(
        &self,
        project_id: &str,
        updating: Option<EntityId>,
        internal_name: &str,
    ) -> EngineResult<()> {
        if internal_name.trim().is_empty() {
            return Err(EngineError::Validation(
                "action type internal name must not be blank".into(),
            ));
        }
        let clash = self
            .store
            .action_types()
            .list(&project_scope(project_id))?
            .into_iter()
            .find(|existing| Some(existing.id) != updating && existing.internal_name == internal_name);
        match clash {
            Some(existing) => Err(EngineError::Conflict(format!(
                "action type {} already uses internal name '{internal_name}'",
                existing.id
            ))),
            None => Ok(()),
        }
    }
}

/// Serves a project's stored action types to an
/// [`ActionTypeNameResolver`](resolvers::ActionTypeNameResolver).
pub struct StoreActionTypeCatalog {
    store: Arc<dyn ConfigEntityStore>,
}

impl StoreActionTypeCatalog {
    pub fn new(store: Arc<dyn ConfigEntityStore>) -> Self {
        Self { store }
    }
}

impl ActionTypeCatalog for StoreActionTypeCatalog {
    fn action_types(&self, project_id: &str) -> Result<Vec<ActionTypeEntry>, ResolverError> {
        let stored = self
            .store
            .action_types()
            .list(&project_scope(project_id))
            .map_err(|e| ResolverError::Unavailable {
                source_name: "action type store",
                message: e.to_string(),
            })?;
        Ok(stored
            .into_iter()
            .map(|action_type| ActionTypeEntry {
                id: action_type.id,
                internal_name: action_type.entity.internal_name,
            })
            .collect())
    }
}

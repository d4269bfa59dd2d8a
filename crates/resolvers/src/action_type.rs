//! Action type internal name <-> id resolution.

use std::sync::Arc;

use tracing::debug;

use crate::{
    ReferenceKind, ResolverError,
    cache::{NameCache, ProjectCache},
    traits::ActionTypeCatalog,
};

/// Resolves action type internal names to ids and back, caching what the
/// catalog returned for each project.
pub struct ActionTypeNameResolver {
    catalog: Arc<dyn ActionTypeCatalog>,
    names_to_ids: NameCache,
    ids_to_names: ProjectCache<i64, String>,
}

impl ActionTypeNameResolver {
    pub fn new(catalog: Arc<dyn ActionTypeCatalog>) -> Self {
        Self {
            catalog,
            names_to_ids: NameCache::default(),
            ids_to_names: ProjectCache::default(),
        }
    }

    /// Cached id for an internal name.
    pub fn resolve(&self, project_id: &str, internal_name: &str) -> Option<i64> {
        self.names_to_ids.get(project_id, internal_name)
    }

    /// Cached internal name for an id.
    pub fn name_of(&self, project_id: &str, id: i64) -> Option<String> {
        self.ids_to_names.get(project_id, &id)
    }

    /// Replace the project's cached action types with what the catalog holds now.
    pub fn refresh_from_catalog(&self, project_id: &str) -> Result<(), ResolverError> {
        debug!("Retrieving action types for project '{}'", project_id);
        let entries = self.catalog.action_types(project_id)?;
        let cached = self.names_to_ids.replace(
            project_id,
            entries
                .iter()
                .map(|entry| (entry.internal_name.clone(), entry.id)),
        );
        self.ids_to_names.replace(
            project_id,
            entries.into_iter().map(|entry| (entry.id, entry.internal_name)),
        );
        debug!("{} action type names cached for project '{}'", cached, project_id);
        Ok(())
    }

    /// Resolve an internal name, refreshing the cache once on a miss. A failed
    /// refresh is returned as is.
    pub fn lookup(&self, internal_name: &str, project_id: &str) -> Result<i64, ResolverError> {
        if let Some(id) = self.resolve(project_id, internal_name) {
            return Ok(id);
        }
        self.refresh_from_catalog(project_id)?;
        self.resolve(project_id, internal_name)
            .ok_or_else(|| ResolverError::Unresolved {
                kind: ReferenceKind::ActionType,
                name: internal_name.to_string(),
            })
    }

    /// Internal name of an action type id, refreshing the cache once on a miss.
    pub fn lookup_name(&self, id: i64, project_id: &str) -> Result<String, ResolverError> {
        if let Some(name) = self.name_of(project_id, id) {
            return Ok(name);
        }
        self.refresh_from_catalog(project_id)?;
        self.name_of(project_id, id)
            .ok_or_else(|| ResolverError::Unresolved {
                kind: ReferenceKind::ActionType,
                name: id.to_string(),
            })
    }
}

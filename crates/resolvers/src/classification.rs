//! Classification workflow name -> id resolution.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::{
    ReferenceKind, ResolverError,
    cache::NameCache,
    traits::ClassificationWorkflowSource,
};

/// Resolves classification workflow names to ids, per project.
///
/// Without a source the resolver only knows what was [`record`]ed into it;
/// a refresh then logs a warning and leaves the cache untouched. With a
/// source, a refresh replaces the project's cache, recorded names included.
///
/// [`record`]: ClassificationWorkflowNameResolver::record
pub struct ClassificationWorkflowNameResolver {
    source: Option<Arc<dyn ClassificationWorkflowSource>>,
    cache: NameCache,
}

impl ClassificationWorkflowNameResolver {
    pub fn new(source: Arc<dyn ClassificationWorkflowSource>) -> Self {
        Self {
            source: Some(source),
            cache: NameCache::default(),
        }
    }

    pub fn without_source() -> Self {
        Self {
            source: None,
            cache: NameCache::default(),
        }
    }

    /// Seed the project's cache with a known mapping. An existing entry is kept.
    pub fn record(&self, project_id: &str, name: &str, id: i64) {
        self.cache.record(project_id, name.to_string(), id);
    }

    pub fn resolve(&self, project_id: &str, name: &str) -> Option<i64> {
        self.cache.get(project_id, name)
    }

    pub fn refresh_from_api(&self, project_id: &str) -> Result<(), ResolverError> {
        let Some(source) = &self.source else {
            warn!("No classification workflow source configured; cache not refreshed");
            return Ok(());
        };
        debug!("Retrieving classification workflows for project '{}'", project_id);
        let workflows = source.classification_workflows(project_id)?;
        let cached = self.cache.replace(
            project_id,
            workflows.into_iter().map(|workflow| (workflow.name, workflow.id)),
        );
        debug!("{} classification workflow names cached for project '{}'", cached, project_id);
        Ok(())
    }

    /// Resolve a name, refreshing the cache once on a miss. A failed refresh
    /// is returned as is.
    pub fn lookup(&self, name: &str, project_id: &str) -> Result<i64, ResolverError> {
        if let Some(id) = self.resolve(project_id, name) {
            return Ok(id);
        }
        self.refresh_from_api(project_id)?;
        self.resolve(project_id, name).ok_or_else(|| ResolverError::Unresolved {
            kind: ReferenceKind::ClassificationWorkflow,
            name: name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockSource;

    #[test]
    fn refresh_picks_up_workflows_published_later() {
        let source = Arc::new(MockSource::new());
        let resolver = ClassificationWorkflowNameResolver::new(source.clone());

        assert!(resolver.lookup("Invoices", "p1").is_err());

        source.publish_classification_workflow(42, "Invoices");
        assert_eq!(resolver.lookup("Invoices", "p1").unwrap(), 42);
        assert_eq!(source.call_count(), 2);
    }

    #[test]
    fn source_failure_is_not_reported_as_unknown_name() {
        let source = Arc::new(MockSource::new().fail_with("connection refused"));
        let resolver = ClassificationWorkflowNameResolver::new(source);

        let err = resolver.lookup("Invoices", "p1").unwrap_err();
        assert!(matches!(
            err,
            ResolverError::Unavailable { ref message, .. } if message == "connection refused"
        ));
    }

    #[test]
    fn recorded_names_resolve_without_a_source() {
        let resolver = ClassificationWorkflowNameResolver::without_source();
        resolver.record("p1", "Contracts", 3);
        resolver.record("p1", "Contracts", 4);

        assert_eq!(resolver.lookup("Contracts", "p1").unwrap(), 3);
        assert!(resolver.lookup("Other", "p1").is_err());
        assert!(matches!(
            resolver.lookup("Contracts", "p2"),
            Err(ResolverError::Unresolved { .. })
        ));
    }
}

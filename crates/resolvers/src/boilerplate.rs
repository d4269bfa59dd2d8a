//! Boilerplate expression and tag name -> id resolution.

use std::sync::Arc;

use tracing::debug;

use crate::{
    ReferenceKind, ResolverError,
    cache::NameCache,
    traits::BoilerplateSource,
};

/// Resolves boilerplate expression names and tag names. Expressions and tags
/// are cached separately per project and refreshed independently.
pub struct BoilerplateNameResolver {
    source: Arc<dyn BoilerplateSource>,
    expressions: NameCache,
    tags: NameCache,
}

impl BoilerplateNameResolver {
    pub fn new(source: Arc<dyn BoilerplateSource>) -> Self {
        Self {
            source,
            expressions: NameCache::default(),
            tags: NameCache::default(),
        }
    }

    pub fn refresh_expressions(&self, project_id: &str) -> Result<(), ResolverError> {
        debug!("Retrieving boilerplate expressions for project '{}'", project_id);
        let expressions = self.source.expressions(project_id)?;
        let cached = self.expressions.replace(
            project_id,
            expressions.into_iter().map(|expression| (expression.name, expression.id)),
        );
        debug!("{} expression names cached for project '{}'", cached, project_id);
        Ok(())
    }

    pub fn refresh_tags(&self, project_id: &str) -> Result<(), ResolverError> {
        debug!("Retrieving boilerplate tags for project '{}'", project_id);
        let tags = self.source.tags(project_id)?;
        let cached = self
            .tags
            .replace(project_id, tags.into_iter().map(|tag| (tag.name, tag.id)));
        debug!("{} tag names cached for project '{}'", cached, project_id);
        Ok(())
    }

    /// Resolve every expression name, in order. The expression cache is
    /// refreshed at most once per call; any name still unknown afterwards
    /// fails the whole call.
    pub fn resolve_expression_ids(
        &self,
        names: &[String],
        project_id: &str,
    ) -> Result<Vec<i64>, ResolverError> {
        if names
            .iter()
            .any(|name| self.expressions.get(project_id, name).is_none())
        {
            self.refresh_expressions(project_id)?;
        }
        names
            .iter()
            .map(|name| {
                self.expressions
                    .get(project_id, name)
                    .ok_or_else(|| ResolverError::Unresolved {
                        kind: ReferenceKind::Expression,
                        name: name.clone(),
                    })
            })
            .collect()
    }

    /// Cached tag id, without refreshing.
    pub fn tag_id(&self, project_id: &str, name: &str) -> Option<i64> {
        self.tags.get(project_id, name)
    }

    /// Resolve a tag name, refreshing the tag cache once on a miss.
    pub fn resolve_tag_id(&self, name: &str, project_id: &str) -> Result<i64, ResolverError> {
        if let Some(id) = self.tag_id(project_id, name) {
            return Ok(id);
        }
        self.refresh_tags(project_id)?;
        self.tag_id(project_id, name).ok_or_else(|| ResolverError::Unresolved {
            kind: ReferenceKind::Tag,
            name: name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockSource;

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn expression_ids_keep_input_order() {
        let source = Arc::new(
            MockSource::new()
                .with_expression(10, "IBAN")
                .with_expression(11, "Email"),
        );
        let resolver = BoilerplateNameResolver::new(source.clone());

        let ids = resolver
            .resolve_expression_ids(&names(&["Email", "IBAN", "Email"]), "p1")
            .unwrap();
        assert_eq!(ids, vec![11, 10, 11]);
        assert_eq!(source.call_count(), 1);

        // Fully cached: no further source calls.
        resolver.resolve_expression_ids(&names(&["IBAN"]), "p1").unwrap();
        assert_eq!(source.call_count(), 1);

        // Another project starts from an empty cache.
        resolver.resolve_expression_ids(&names(&["IBAN"]), "p2").unwrap();
        assert_eq!(source.call_count(), 2);
    }

    #[test]
    fn one_unknown_expression_fails_the_batch() {
        let source = Arc::new(MockSource::new().with_expression(10, "IBAN"));
        let resolver = BoilerplateNameResolver::new(source);

        let err = resolver
            .resolve_expression_ids(&names(&["IBAN", "Phone"]), "p1")
            .unwrap_err();
        assert!(matches!(
            err,
            ResolverError::Unresolved { kind: ReferenceKind::Expression, ref name } if name == "Phone"
        ));
    }

    #[test]
    fn tags_and_expressions_are_separate_namespaces() {
        let source = Arc::new(MockSource::new().with_expression(1, "Shared").with_tag(2, "Shared"));
        let resolver = BoilerplateNameResolver::new(source);

        assert_eq!(resolver.resolve_tag_id("Shared", "p1").unwrap(), 2);
        assert_eq!(
            resolver.resolve_expression_ids(&names(&["Shared"]), "p1").unwrap(),
            vec![1]
        );
        assert_eq!(resolver.tag_id("p1", "Shared"), Some(2));
        assert_eq!(resolver.tag_id("p2", "Shared"), None);
    }

    #[test]
    fn unreachable_source_fails_tag_resolution() {
        let source = Arc::new(MockSource::new().fail_with("timeout"));
        let resolver = BoilerplateNameResolver::new(source);

        assert!(matches!(
            resolver.resolve_tag_id("Confidential", "p1"),
            Err(ResolverError::Unavailable { .. })
        ));
    }
}

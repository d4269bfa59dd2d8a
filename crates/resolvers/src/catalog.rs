//! File-backed reference catalog.
//!
//! Lets the CLI resolve classification workflow, expression and tag names
//! offline from a JSON document:
//!
//! ```json
//! {
//!   "classificationWorkflows": [{ "name": "Invoices", "id": 42 }],
//!   "expressions": [{ "name": "IBAN", "id": 10 }],
//!   "tags": [{ "name": "Confidential", "id": 7 }]
//! }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    ResolverError,
    traits::{BoilerplateSource, ClassificationWorkflowSource, NamedId},
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReferenceCatalog {
    pub classification_workflows: Vec<NamedId>,
    pub expressions: Vec<NamedId>,
    pub tags: Vec<NamedId>,
}

impl ReferenceCatalog {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ResolverError> {
        let path = path.as_ref();
        let catalog: Self = serde_json::from_str(&fs::read_to_string(path)?)?;
        info!(
            "Loaded reference catalog {} ({} classification workflows, {} expressions, {} tags)",
            path.display(),
            catalog.classification_workflows.len(),
            catalog.expressions.len(),
            catalog.tags.len()
        );
        Ok(catalog)
    }
}

// A catalog file is not partitioned by project: every project sees all entries.
impl ClassificationWorkflowSource for ReferenceCatalog {
    fn classification_workflows(&self, _project_id: &str) -> Result<Vec<NamedId>, ResolverError> {
        Ok(self.classification_workflows.clone())
    }
}

impl BoilerplateSource for ReferenceCatalog {
    fn expressions(&self, _project_id: &str) -> Result<Vec<NamedId>, ResolverError> {
        Ok(self.expressions.clone())
    }

    fn tags(&self, _project_id: &str) -> Result<Vec<NamedId>, ResolverError> {
        Ok(self.tags.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Arc;

    use super::*;
    use crate::{BoilerplateNameResolver, ClassificationWorkflowNameResolver};

    #[test]
    fn loads_partial_catalog_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "classificationWorkflows": [{{ "name": "Invoices", "id": 9007199254740993 }}],
                 "tags": [{{ "name": "Confidential", "id": 7 }}] }}"#
        )
        .unwrap();

        let catalog = Arc::new(ReferenceCatalog::from_path(file.path()).unwrap());
        assert!(catalog.expressions.is_empty());

        let classification = ClassificationWorkflowNameResolver::new(catalog.clone());
        assert_eq!(
            classification.lookup("Invoices", "any").unwrap(),
            9_007_199_254_740_993
        );

        let boilerplate = BoilerplateNameResolver::new(catalog);
        assert_eq!(boilerplate.resolve_tag_id("Confidential", "any").unwrap(), 7);
    }

    #[test]
    fn malformed_catalog_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ \"tags\": 3 }}").unwrap();

        assert!(matches!(
            ReferenceCatalog::from_path(file.path()),
            Err(ResolverError::Parse(_))
        ));
    }
}

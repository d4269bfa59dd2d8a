//! `MockSource`: a test double for every backing-source trait.
//!
//! Entries can be added up front with the `with_*` builders or published
//! later with `publish_*` to simulate another service learning about a name
//! between two refreshes.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::{
    ResolverError,
    traits::{
        ActionTypeCatalog, ActionTypeEntry, BoilerplateSource, ClassificationWorkflowSource,
        NamedId,
    },
};

#[derive(Debug, Default)]
struct MockState {
    action_types: Vec<ActionTypeEntry>,
    classification_workflows: Vec<NamedId>,
    expressions: Vec<NamedId>,
    tags: Vec<NamedId>,
    failure: Option<String>,
    /// `"<operation>:<project>"` for every call received, in call order.
    calls: Vec<String>,
}

/// A source that serves fixed entries and records every call it receives.
#[derive(Debug, Default)]
pub struct MockSource {
    state: Mutex<MockState>,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_action_type(self, id: i64, internal_name: impl Into<String>) -> Self {
        self.publish_action_type(id, internal_name);
        self
    }

    pub fn with_classification_workflow(self, id: i64, name: impl Into<String>) -> Self {
        self.publish_classification_workflow(id, name);
        self
    }

    pub fn with_expression(self, id: i64, name: impl Into<String>) -> Self {
        self.state().expressions.push(NamedId::new(name, id));
        self
    }

    pub fn with_tag(self, id: i64, name: impl Into<String>) -> Self {
        self.state().tags.push(NamedId::new(name, id));
        self
    }

    /// Every call fails with `ResolverError::Unavailable`.
    pub fn fail_with(self, message: impl Into<String>) -> Self {
        self.state().failure = Some(message.into());
        self
    }

    pub fn publish_action_type(&self, id: i64, internal_name: impl Into<String>) {
        self.state().action_types.push(ActionTypeEntry {
            id,
            internal_name: internal_name.into(),
        });
    }

    /// Remove an action type, as if it had been deleted from the catalog.
    pub fn retract_action_type(&self, id: i64) {
        self.state().action_types.retain(|entry| entry.id != id);
    }

    pub fn publish_classification_workflow(&self, id: i64, name: impl Into<String>) {
        self.state()
            .classification_workflows
            .push(NamedId::new(name, id));
    }

    /// Number of source calls received so far.
    pub fn call_count(&self) -> usize {
        self.state().calls.len()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn serve<T: Clone>(
        &self,
        operation: &str,
        project_id: &str,
        select: impl FnOnce(&MockState) -> &Vec<T>,
    ) -> Result<Vec<T>, ResolverError> {
        let mut state = self.state();
        state.calls.push(format!("{operation}:{project_id}"));
        if let Some(message) = &state.failure {
            return Err(ResolverError::Unavailable {
                source_name: "mock source",
                message: message.clone(),
            });
        }
        Ok(select(&*state).clone())
    }
}

impl ActionTypeCatalog for MockSource {
    fn action_types(&self, project_id: &str) -> Result<Vec<ActionTypeEntry>, ResolverError> {
        self.serve("action_types", project_id, |s| &s.action_types)
    }
}

impl ClassificationWorkflowSource for MockSource {
    fn classification_workflows(&self, project_id: &str) -> Result<Vec<NamedId>, ResolverError> {
        self.serve("classification_workflows", project_id, |s| {
            &s.classification_workflows
        })
    }
}

impl BoilerplateSource for MockSource {
    fn expressions(&self, project_id: &str) -> Result<Vec<NamedId>, ResolverError> {
        self.serve("expressions", project_id, |s| &s.expressions)
    }

    fn tags(&self, project_id: &str) -> Result<Vec<NamedId>, ResolverError> {
        self.serve("tags", project_id, |s| &s.tags)
    }
}

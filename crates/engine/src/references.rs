//! Name references inside action settings.
//!
//! Some action types point at entities of other services by id. A definition
//! may give those by name instead; before the action is created the names
//! are swapped for ids through the matching resolver.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;

use resolvers::{
    ActionTypeNameResolver, BoilerplateNameResolver, ClassificationWorkflowNameResolver,
};

use crate::{EngineError, EngineResult};

pub const BOILERPLATE_ACTION_TYPE: &str = "BoilerplatePolicyType";
pub const CLASSIFICATION_ACTION_TYPES: [&str; 2] = [
    "ElasticSearchClassificationPolicyType",
    "ExternalClassificationPolicyType",
];

const EXPRESSION_IDS: &str = "expressionIds";
const TAG_ID: &str = "tagId";
const WORKFLOW_ID: &str = "workflowId";

/// The resolvers a workflow definition may need.
#[derive(Clone)]
pub struct NameResolvers {
    pub action_types: Arc<ActionTypeNameResolver>,
    pub classification: Arc<ClassificationWorkflowNameResolver>,
    pub boilerplate: Arc<BoilerplateNameResolver>,
}

impl NameResolvers {
    pub fn new(
        action_types: Arc<ActionTypeNameResolver>,
        classification: Arc<ClassificationWorkflowNameResolver>,
        boilerplate: Arc<BoilerplateNameResolver>,
    ) -> Self {
        Self {
            action_types,
            classification,
            boilerplate,
        }
    }
}

/// Replace names with ids in `settings` of an action whose type has the
/// given internal name. Settings of other action types are left alone.
pub fn substitute_references(
    internal_name: &str,
    settings: &mut Map<String, Value>,
    resolvers: &NameResolvers,
    project_id: &str,
) -> EngineResult<()> {
    if internal_name == BOILERPLATE_ACTION_TYPE {
        if let Some(expressions) = settings.get_mut(EXPRESSION_IDS) {
            *expressions = resolve_expression_ids(expressions, &resolvers.boilerplate, project_id)?;
        }
        if let Some(tag) = settings.get_mut(TAG_ID) {
            if let Some(name) = reference_name(tag) {
                let id = resolvers.boilerplate.resolve_tag_id(&name, project_id)?;
                debug!("Resolved boilerplate tag '{}' to {}", name, id);
                *tag = Value::from(id);
            }
        }
    } else if CLASSIFICATION_ACTION_TYPES.contains(&internal_name) {
        if let Some(workflow) = settings.get_mut(WORKFLOW_ID) {
            if let Some(name) = reference_name(workflow) {
                let id = resolvers.classification.lookup(&name, project_id)?;
                debug!("Resolved classification workflow '{}' to {}", name, id);
                *workflow = Value::from(id);
            }
        }
    }
    Ok(())
}

/// Numbers stay as they are; the remaining names are resolved in one batch.
fn resolve_expression_ids(
    value: &Value,
    resolver: &BoilerplateNameResolver,
    project_id: &str,
) -> EngineResult<Value> {
    let Value::Array(entries) = value else {
        return Err(EngineError::Validation(format!(
            "'{EXPRESSION_IDS}' must be an array of expression ids or names"
        )));
    };

    let names: Vec<String> = entries.iter().filter_map(reference_name).collect();
    let mut resolved = resolver.resolve_expression_ids(&names, project_id)?.into_iter();

    entries
        .iter()
        .map(|entry| match (entry, reference_name(entry)) {
            (_, Some(name)) => resolved.next().map(Value::from).ok_or_else(|| {
                EngineError::Validation(format!("expression '{name}' was not resolved"))
            }),
            (Value::Number(_), None) => Ok(entry.clone()),
            (Value::String(text), None) => text
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| EngineError::Validation(format!("invalid expression id '{text}'"))),
            (other, None) => Err(EngineError::Validation(format!(
                "'{EXPRESSION_IDS}' entries must be ids or names, found {other}"
            ))),
        })
        .collect::<EngineResult<Vec<_>>>()
        .map(Value::Array)
}

/// A string that is not a plain integer is a name to resolve. Ids written as
/// strings are kept as ids.
fn reference_name(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if text.trim().parse::<i64>().is_err() => Some(text.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resolvers::mock::MockSource;
    use serde_json::json;

    fn resolvers(source: Arc<MockSource>) -> NameResolvers {
        NameResolvers::new(
            Arc::new(ActionTypeNameResolver::new(source.clone())),
            Arc::new(ClassificationWorkflowNameResolver::new(source.clone())),
            Arc::new(BoilerplateNameResolver::new(source)),
        )
    }

    fn settings(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn boilerplate_names_become_ids() {
        let source = Arc::new(
            MockSource::new()
                .with_expression(10, "IBAN")
                .with_expression(11, "Email")
                .with_tag(7, "Confidential"),
        );
        let mut values = settings(json!({
            "expressionIds": [3, "Email", "12", "IBAN"],
            "tagId": "Confidential",
            "redactionType": "DO_NOTHING"
        }));

        substitute_references(BOILERPLATE_ACTION_TYPE, &mut values, &resolvers(source), "p1").unwrap();

        assert_eq!(
            Value::Object(values),
            json!({"expressionIds": [3, 11, 12, 10], "tagId": 7, "redactionType": "DO_NOTHING"})
        );
    }

    #[test]
    fn classification_workflow_name_becomes_id() {
        let source = Arc::new(MockSource::new().with_classification_workflow(42, "Invoices"));
        let resolvers = resolvers(source);

        let mut by_name = settings(json!({"workflowId": "Invoices"}));
        substitute_references("ExternalClassificationPolicyType", &mut by_name, &resolvers, "p1").unwrap();
        assert_eq!(by_name["workflowId"], json!(42));

        let mut by_id = settings(json!({"workflowId": 5}));
        substitute_references("ElasticSearchClassificationPolicyType", &mut by_id, &resolvers, "p1").unwrap();
        assert_eq!(by_id["workflowId"], json!(5));
    }

    #[test]
    fn unknown_names_are_unresolved_references() {
        let resolvers = resolvers(Arc::new(MockSource::new()));

        let mut values = settings(json!({"workflowId": "Nope"}));
        assert!(matches!(
            substitute_references("ExternalClassificationPolicyType", &mut values, &resolvers, "p1"),
            Err(EngineError::UnresolvedReference { .. })
        ));

        let mut values = settings(json!({"tagId": "Nope"}));
        assert!(matches!(
            substitute_references(BOILERPLATE_ACTION_TYPE, &mut values, &resolvers, "p1"),
            Err(EngineError::UnresolvedReference { .. })
        ));
    }

    #[test]
    fn other_action_types_are_untouched() {
        let resolvers = resolvers(Arc::new(MockSource::new()));
        let original = settings(json!({"workflowId": "Invoices", "tagId": "x"}));
        let mut values = original.clone();

        substitute_references("GenericQueueHandler", &mut values, &resolvers, "p1").unwrap();
        assert_eq!(values, original);
    }
}

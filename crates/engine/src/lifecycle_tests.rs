//! End-to-end tests for workflow instantiation.
//!
//! Everything runs against `MemoryConfigStore`. Action types come from the
//! store itself; classification workflows and boilerplate names are served
//! by `MockSource`.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use resolvers::mock::MockSource;
use resolvers::{ActionTypeNameResolver, BoilerplateNameResolver, ClassificationWorkflowNameResolver};

use crate::{
    config::EngineConfig,
    models::{ActionType, NewProcessingRule, Workflow},
    store::MemoryConfigStore,
    ConditionKind, ConditionOwner, ConfigService, EngineError, NameResolvers, PageRequest,
    StoreActionTypeCatalog, WorkflowDefinition, WorkflowLifecycleManager,
};

const PROJECT: &str = "tenant-a";

struct Fixture {
    manager: WorkflowLifecycleManager,
    service: Arc<ConfigService>,
    boilerplate_type: i64,
}

fn fixture_with(config: EngineConfig) -> Fixture {
    let service = Arc::new(ConfigService::new(Arc::new(MemoryConfigStore::new()), config));

    let mut type_ids = Vec::new();
    for internal_name in [
        "BoilerplatePolicyType",
        "ExternalClassificationPolicyType",
        "FieldMappingPolicyType",
    ] {
        let created = service
            .create_action_type(
                PROJECT,
                ActionType {
                    name: internal_name.trim_end_matches("PolicyType").into(),
                    description: None,
                    internal_name: internal_name.into(),
                    definition: json!({"type": "object"}),
                },
            )
            .unwrap();
        type_ids.push(created.id);
    }

    let source = Arc::new(
        MockSource::new()
            .with_classification_workflow(42, "Invoices")
            .with_expression(100, "IBAN")
            .with_expression(101, "Email")
            .with_tag(7, "Confidential"),
    );
    let resolvers = NameResolvers::new(
        Arc::new(ActionTypeNameResolver::new(Arc::new(StoreActionTypeCatalog::new(
            service.store().clone(),
        )))),
        Arc::new(ClassificationWorkflowNameResolver::new(source.clone())),
        Arc::new(BoilerplateNameResolver::new(source)),
    );

    Fixture {
        manager: WorkflowLifecycleManager::new(service.clone(), resolvers),
        service,
        boilerplate_type: type_ids[0],
    }
}

fn fixture() -> Fixture {
    fixture_with(EngineConfig::default())
}

fn definition(value: Value) -> WorkflowDefinition {
    serde_json::from_value(value).unwrap()
}

fn sample_definition() -> WorkflowDefinition {
    definition(json!({
        "name": "W1",
        "description": "Document handling",
        "processingRules": [
            {
                "name": "R1",
                "priority": 1,
                "actions": [{
                    "name": "Redact",
                    "order": 1,
                    "typeName": "BoilerplatePolicyType",
                    "settings": {"expressionIds": ["IBAN", 5, "Email"], "tagId": "Confidential"},
                    "actionConditions": [
                        {"name": "has title", "additional": {"type": "exists", "field": "TITLE"}}
                    ]
                }],
                "ruleConditions": [
                    {"name": "large", "additional": {"type": "number", "field": "SIZE", "operator": "gt", "value": 1000}}
                ]
            },
            {
                "name": "R2",
                "priority": 1,
                "actions": [{
                    "name": "Classify",
                    "typeName": "ExternalClassificationPolicyType",
                    "settings": {"workflowId": "Invoices"}
                }]
            }
        ]
    }))
}

fn workflow_names(service: &ConfigService) -> Vec<String> {
    service
        .page_workflows(PROJECT, PageRequest::default())
        .unwrap()
        .items
        .into_iter()
        .map(|workflow| workflow.entity.name)
        .collect()
}

// ============================================================
// Instantiation
// ============================================================

#[test]
fn instantiates_the_whole_tree() {
    let fx = fixture();
    let workflow_id = fx
        .manager
        .create_workflow(&sample_definition(), PROJECT, true)
        .unwrap();

    let rules = fx
        .service
        .page_rules(PROJECT, workflow_id, PageRequest::default())
        .unwrap();
    let priorities: Vec<(String, i32)> = rules
        .items
        .iter()
        .map(|rule| (rule.name.clone(), rule.priority))
        .collect();
    // R2 asked for the priority R1 already held, so R1 moved up.
    assert_eq!(priorities, vec![("R1".to_string(), 2), ("R2".to_string(), 1)]);

    let r1 = rules.items[0].id;
    let r2 = rules.items[1].id;

    let redact = fx
        .service
        .page_actions(PROJECT, workflow_id, r1, PageRequest::default())
        .unwrap()
        .items
        .remove(0);
    assert_eq!(redact.type_id, fx.boilerplate_type);
    assert_eq!(
        Value::Object(redact.settings.clone()),
        json!({"expressionIds": [100, 5, 101], "tagId": 7})
    );

    let classify = fx
        .service
        .page_actions(PROJECT, workflow_id, r2, PageRequest::default())
        .unwrap()
        .items
        .remove(0);
    assert_eq!(classify.settings["workflowId"], json!(42));

    let on_rule = ConditionOwner::Rule { workflow_id, rule_id: r1 };
    let rule_conditions = fx
        .service
        .page_conditions(PROJECT, on_rule, PageRequest::default())
        .unwrap();
    assert_eq!(rule_conditions.total_hits, 1);
    assert!(matches!(
        rule_conditions.items[0].kind(),
        ConditionKind::Number { value: 1000, .. }
    ));

    let on_action = ConditionOwner::Action { workflow_id, rule_id: r1, action_id: redact.id };
    assert_eq!(
        fx.service
            .page_conditions(PROJECT, on_action, PageRequest::default())
            .unwrap()
            .total_hits,
        1
    );
}

#[test]
fn rule_paging_follows_page_size() {
    let fx = fixture();
    let workflow_id = fx
        .manager
        .create_workflow(&sample_definition(), PROJECT, true)
        .unwrap();

    let first = fx
        .service
        .page_rules(PROJECT, workflow_id, PageRequest::new(1, 1).unwrap())
        .unwrap();
    assert_eq!(first.items.len(), 1);
    assert_eq!(first.total_hits, 2);

    let past_the_end = fx
        .service
        .page_rules(PROJECT, workflow_id, PageRequest::new(3, 1).unwrap())
        .unwrap();
    assert!(past_the_end.items.is_empty());
    assert_eq!(past_the_end.total_hits, 2);
}

#[test]
fn overwrite_replaces_same_named_workflows_only() {
    let fx = fixture();
    fx.service.create_workflow(PROJECT, Workflow::new("Other")).unwrap();
    let first = fx.manager.create_workflow(&sample_definition(), PROJECT, true).unwrap();
    let second = fx.manager.create_workflow(&sample_definition(), PROJECT, true).unwrap();

    assert_ne!(first, second);
    assert_eq!(workflow_names(&fx.service), vec!["Other".to_string(), "W1".to_string()]);
    assert!(matches!(
        fx.service.get_workflow(PROJECT, first),
        Err(EngineError::NotFound(_))
    ));

    fx.manager.create_workflow(&sample_definition(), PROJECT, false).unwrap();
    assert_eq!(workflow_names(&fx.service).len(), 3);
}

#[test]
fn unresolved_names_write_nothing() {
    let fx = fixture();
    let existing = fx.manager.create_workflow(&sample_definition(), PROJECT, true).unwrap();

    let mut broken = sample_definition();
    broken.processing_rules[1].actions[0].settings["workflowId"] = json!("Unknown workflow");

    let err = fx.manager.create_workflow(&broken, PROJECT, true).unwrap_err();
    assert!(matches!(err, EngineError::UnresolvedReference { .. }));
    // The same-named workflow was not removed either.
    assert!(fx.service.get_workflow(PROJECT, existing).is_ok());
    assert_eq!(workflow_names(&fx.service).len(), 1);
}

#[test]
fn unknown_action_type_name_is_unresolved() {
    let fx = fixture();
    let mut broken = sample_definition();
    broken.processing_rules[0].actions[0].type_name = Some("NoSuchPolicyType".into());

    assert!(matches!(
        fx.manager.create_workflow(&broken, PROJECT, true),
        Err(EngineError::UnresolvedReference { .. })
    ));
    assert!(workflow_names(&fx.service).is_empty());
}

#[test]
fn malformed_conditions_write_nothing() {
    let fx = fixture();
    let broken = definition(json!({
        "name": "W1",
        "processingRules": [{
            "name": "R1",
            "ruleConditions": [
                {"name": "bad", "additional": {"type": "number", "field": "SIZE", "operator": "gt", "value": 1.5}}
            ]
        }]
    }));

    assert!(matches!(
        fx.manager.create_workflow(&broken, PROJECT, true),
        Err(EngineError::MalformedCondition(_))
    ));
    assert!(workflow_names(&fx.service).is_empty());
}

#[test]
fn action_without_any_type_is_rejected() {
    let fx = fixture();
    let broken = definition(json!({
        "name": "W1",
        "processingRules": [{"name": "R1", "actions": [{"name": "untyped"}]}]
    }));

    assert!(matches!(
        fx.manager.create_workflow(&broken, PROJECT, true),
        Err(EngineError::Validation(_))
    ));
}

#[test]
fn partial_failure_leaves_created_entities_in_place() {
    let fx = fixture();
    let broken = definition(json!({
        "name": "W1",
        "processingRules": [
            {"name": "R1"},
            {"name": "R2", "actions": [{"name": "dangling", "typeId": 9999}]}
        ]
    }));

    assert!(matches!(
        fx.manager.create_workflow(&broken, PROJECT, true),
        Err(EngineError::Validation(_))
    ));

    // Workflow and both rules were written before the action failed.
    let workflows = fx.service.page_workflows(PROJECT, PageRequest::default()).unwrap();
    assert_eq!(workflows.total_hits, 1);
    let rules = fx
        .service
        .page_rules(PROJECT, workflows.items[0].id, PageRequest::default())
        .unwrap();
    assert_eq!(rules.total_hits, 2);

    assert_eq!(fx.manager.remove_matching(PROJECT, "W1").unwrap(), 1);
    assert!(workflow_names(&fx.service).is_empty());
}

#[test]
fn type_id_takes_precedence_over_type_name() {
    let fx = fixture();
    let def = definition(json!({
        "name": "W1",
        "processingRules": [{
            "name": "R1",
            "actions": [{
                "name": "A1",
                "typeId": fx.boilerplate_type,
                "typeName": "NoSuchPolicyType",
                "settings": {"tagId": "Confidential"}
            }]
        }]
    }));

    let workflow_id = fx.manager.create_workflow(&def, PROJECT, true).unwrap();
    let rule_id = fx
        .service
        .page_rules(PROJECT, workflow_id, PageRequest::default())
        .unwrap()
        .items[0]
        .id;
    let action = fx
        .service
        .page_actions(PROJECT, workflow_id, rule_id, PageRequest::default())
        .unwrap()
        .items
        .remove(0);
    assert_eq!(action.type_id, fx.boilerplate_type);
    assert_eq!(action.settings["tagId"], json!(7));
}

// ============================================================
// Overlay and removal
// ============================================================

#[test]
fn overlay_is_applied_before_instantiation() {
    let fx = fixture();
    let overlay = definition(json!({
        "name": "W1",
        "processingRules": [
            {"name": "R2", "priority": 5, "enabled": false},
            {"name": "R3", "actions": [{"name": "Map", "typeName": "FieldMappingPolicyType"}]}
        ]
    }));

    let workflow_id = fx
        .manager
        .create_from_definitions(sample_definition(), Some(&overlay), PROJECT, true)
        .unwrap();

    let rules: Vec<(String, i32, bool)> = fx
        .service
        .page_rules(PROJECT, workflow_id, PageRequest::default())
        .unwrap()
        .items
        .into_iter()
        .map(|rule| (rule.entity.name, rule.entity.priority, rule.entity.enabled))
        .collect();
    assert_eq!(
        rules,
        vec![
            ("R1".to_string(), 1, true),
            ("R2".to_string(), 5, false),
            ("R3".to_string(), 6, true),
        ]
    );
}

#[test]
fn remove_matching_walks_every_page() {
    let fx = fixture_with(EngineConfig {
        removal_page_size: 2,
        ..EngineConfig::default()
    });
    for _ in 0..5 {
        let workflow = fx.service.create_workflow(PROJECT, Workflow::new("Dup")).unwrap();
        for name in ["a", "b", "c"] {
            fx.service
                .create_rule(PROJECT, workflow.id, NewProcessingRule::new(name, None))
                .unwrap();
        }
    }
    fx.service.create_workflow(PROJECT, Workflow::new("Keep")).unwrap();
    fx.service.create_workflow("tenant-b", Workflow::new("Dup")).unwrap();

    assert_eq!(fx.manager.remove_matching(PROJECT, "Dup").unwrap(), 5);
    assert_eq!(workflow_names(&fx.service), vec!["Keep".to_string()]);
    assert_eq!(
        fx.service
            .page_workflows("tenant-b", PageRequest::default())
            .unwrap()
            .total_hits,
        1
    );
}

// ============================================================
// Projects and sources
// ============================================================

fn mapping_definition() -> WorkflowDefinition {
    definition(json!({
        "name": "Mapping",
        "processingRules": [{
            "name": "R1",
            "actions": [{"name": "map", "typeName": "FieldMappingPolicyType"}]
        }]
    }))
}

fn only_action_type(service: &ConfigService, project_id: &str, workflow_id: i64) -> i64 {
    let rule_id = service
        .page_rules(project_id, workflow_id, PageRequest::default())
        .unwrap()
        .items[0]
        .id;
    service
        .page_actions(project_id, workflow_id, rule_id, PageRequest::default())
        .unwrap()
        .items[0]
        .type_id
}

#[test]
fn each_project_resolves_its_own_action_types() {
    let fx = fixture();
    let other_project = "tenant-b";
    let other_type = fx
        .service
        .create_action_type(
            other_project,
            ActionType {
                name: "Mapping".into(),
                description: None,
                internal_name: "FieldMappingPolicyType".into(),
                definition: json!({"type": "object"}),
            },
        )
        .unwrap()
        .id;

    let first = fx.manager.create_workflow(&mapping_definition(), PROJECT, true).unwrap();
    let second = fx
        .manager
        .create_workflow(&mapping_definition(), other_project, true)
        .unwrap();

    let first_type = only_action_type(&fx.service, PROJECT, first);
    assert_ne!(first_type, other_type);
    assert_eq!(only_action_type(&fx.service, other_project, second), other_type);
}

#[test]
fn unreachable_action_type_catalog_fails_the_creation() {
    let fx = fixture();
    let source = Arc::new(MockSource::new());
    let manager = WorkflowLifecycleManager::new(
        fx.service.clone(),
        NameResolvers::new(
            Arc::new(ActionTypeNameResolver::new(Arc::new(
                MockSource::new().fail_with("catalog down"),
            ))),
            Arc::new(ClassificationWorkflowNameResolver::new(source.clone())),
            Arc::new(BoilerplateNameResolver::new(source)),
        ),
    );
    let def = definition(json!({
        "name": "W1",
        "processingRules": [{
            "name": "R1",
            "actions": [{"name": "A1", "typeId": fx.boilerplate_type}]
        }]
    }));

    assert!(matches!(
        manager.create_workflow(&def, PROJECT, true),
        Err(EngineError::Resolver(_))
    ));
    assert!(workflow_names(&fx.service).is_empty());
}

//! Overlay merging of workflow definitions.
//!
//! Nodes are matched by name at every level: rules within the workflow,
//! actions within a rule, conditions within a rule or an action. An overlay
//! node with no match in the base is appended as-is. Matching always takes
//! the first base node with the name.
//!
//! The overlay is only read; the merged tree is written into the base.

use serde_json::{Map, Value};
use tracing::debug;

use crate::definition::{
    ActionDefinition, ConditionDefinition, MergeMode, RuleDefinition, WorkflowDefinition,
};

/// Merge `overlay` into `base` in place.
pub fn combine_workflows(base: &mut WorkflowDefinition, overlay: &WorkflowDefinition) {
    for overlay_rule in &overlay.processing_rules {
        match base
            .processing_rules
            .iter_mut()
            .find(|rule| rule.name == overlay_rule.name)
        {
            Some(rule) => combine_rule(rule, overlay_rule),
            None => {
                debug!("Adding processing rule '{}' from overlay", overlay_rule.name);
                base.processing_rules.push(overlay_rule.clone());
            }
        }
    }
}

fn combine_rule(rule: &mut RuleDefinition, overlay: &RuleDefinition) {
    if overlay.merge_mode == MergeMode::Replace {
        debug!("Replacing processing rule '{}'", rule.name);
        rule.enabled = overlay.enabled;
        rule.priority = overlay.priority;
        rule.description = overlay.description.clone();
        rule.actions = overlay.actions.clone();
        rule.rule_conditions = overlay.rule_conditions.clone();
        return;
    }

    if overlay.enabled.is_some() {
        rule.enabled = overlay.enabled;
    }
    if overlay.priority.is_some() {
        rule.priority = overlay.priority;
    }
    if let Some(description) = non_blank(&overlay.description) {
        rule.description = Some(description.to_string());
    }

    for overlay_action in &overlay.actions {
        match rule
            .actions
            .iter_mut()
            .find(|action| action.name == overlay_action.name)
        {
            Some(action) => combine_action(action, overlay_action),
            None => rule.actions.push(overlay_action.clone()),
        }
    }

    combine_conditions(&mut rule.rule_conditions, &overlay.rule_conditions);
}

fn combine_action(action: &mut ActionDefinition, overlay: &ActionDefinition) {
    if overlay.merge_mode == MergeMode::Replace {
        debug!("Replacing action '{}'", action.name);
        action.order = overlay.order;
        action.type_id = overlay.type_id;
        action.type_name = overlay.type_name.clone();
        action.description = overlay.description.clone();
        action.settings = overlay.settings.clone();
        action.action_conditions = overlay.action_conditions.clone();
        return;
    }

    if !overlay.name.trim().is_empty() {
        action.name = overlay.name.clone();
    }
    if overlay.order.is_some() {
        action.order = overlay.order;
    }
    if overlay.type_id.is_some() {
        action.type_id = overlay.type_id;
    }
    if overlay.type_name.is_some() {
        action.type_name = overlay.type_name.clone();
    }
    if let Some(description) = non_blank(&overlay.description) {
        action.description = Some(description.to_string());
    }
    merge_settings(&mut action.settings, &overlay.settings);

    combine_conditions(&mut action.action_conditions, &overlay.action_conditions);
}

/// Key-by-key: overlay keys win, base-only keys stay.
fn merge_settings(settings: &mut Map<String, Value>, overlay: &Map<String, Value>) {
    for (key, value) in overlay {
        settings.insert(key.clone(), value.clone());
    }
}

fn combine_conditions(conditions: &mut Vec<ConditionDefinition>, overlay: &[ConditionDefinition]) {
    if conditions.is_empty() {
        conditions.extend_from_slice(overlay);
        return;
    }
    for overlay_condition in overlay {
        match conditions
            .iter_mut()
            .find(|condition| condition.name == overlay_condition.name)
        {
            Some(condition) => combine_condition(condition, overlay_condition),
            None => conditions.push(overlay_condition.clone()),
        }
    }
}

/// Shallow: only `notes`, `type` and `order` of the payload are taken from
/// the overlay. Nested `children` and `condition` are never merged, so a
/// composite keeps the base's subtree.
fn combine_condition(condition: &mut ConditionDefinition, overlay: &ConditionDefinition) {
    if condition.additional.is_none() {
        condition.additional = overlay.additional.clone();
        return;
    }
    let (Some(additional), Some(overlay_additional)) =
        (condition.additional.as_mut(), overlay.additional.as_ref())
    else {
        return;
    };
    for key in ["notes", "type"] {
        if let Some(Value::String(text)) = overlay_additional.get(key) {
            if !text.trim().is_empty() {
                additional.insert(key.to_string(), Value::String(text.clone()));
            }
        }
    }
    match overlay_additional.get("order") {
        None | Some(Value::Null) => {}
        Some(order) => {
            additional.insert("order".to_string(), order.clone());
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|text| !text.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn rule(name: &str) -> RuleDefinition {
        RuleDefinition {
            name: name.into(),
            ..Default::default()
        }
    }

    fn action(name: &str, settings: Value) -> ActionDefinition {
        ActionDefinition {
            name: name.into(),
            settings: settings.as_object().cloned().unwrap_or_default(),
            ..Default::default()
        }
    }

    fn condition(name: &str, additional: Value) -> ConditionDefinition {
        ConditionDefinition {
            name: name.into(),
            additional: additional.as_object().cloned(),
        }
    }

    fn workflow(rules: Vec<RuleDefinition>) -> WorkflowDefinition {
        WorkflowDefinition {
            name: "W".into(),
            processing_rules: rules,
            ..Default::default()
        }
    }

    #[test]
    fn merge_overwrites_set_fields_only() {
        let mut base_rule = rule("R1");
        base_rule.description = Some("base".into());
        base_rule.priority = Some(3);
        base_rule.enabled = Some(true);
        let mut base = workflow(vec![base_rule]);

        let mut overlay_rule = rule("R1");
        overlay_rule.description = Some("   ".into());
        overlay_rule.enabled = Some(false);
        let overlay = workflow(vec![overlay_rule]);

        combine_workflows(&mut base, &overlay);

        let merged = &base.processing_rules[0];
        assert_eq!(merged.description.as_deref(), Some("base"));
        assert_eq!(merged.priority, Some(3));
        assert_eq!(merged.enabled, Some(false));
    }

    #[test]
    fn replace_rule_takes_overlay_wholesale_and_stops() {
        let mut base_rule = rule("R1");
        base_rule.priority = Some(3);
        base_rule.description = Some("base".into());
        base_rule.actions = vec![action("A", json!({"k": 1}))];
        let mut base = workflow(vec![base_rule]);

        let mut overlay_rule = rule("R1");
        overlay_rule.merge_mode = MergeMode::Replace;
        overlay_rule.actions = vec![action("B", json!({}))];
        let overlay = workflow(vec![overlay_rule]);

        combine_workflows(&mut base, &overlay);

        let merged = &base.processing_rules[0];
        assert_eq!(merged.priority, None);
        assert_eq!(merged.description, None);
        assert_eq!(merged.actions, vec![action("B", json!({}))]);
    }

    #[test]
    fn unmatched_overlay_rules_are_appended() {
        let mut base = workflow(vec![rule("R1")]);
        let overlay = workflow(vec![rule("R2"), rule("R3")]);

        combine_workflows(&mut base, &overlay);

        let names: Vec<&str> = base.processing_rules.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["R1", "R2", "R3"]);
    }

    #[test]
    fn action_settings_merge_key_by_key() {
        let mut base_rule = rule("R1");
        base_rule.actions = vec![action("A", json!({"keep": 1, "change": "old"}))];
        let mut base = workflow(vec![base_rule]);

        let mut overlay_rule = rule("R1");
        let mut overlay_action = action("A", json!({"change": "new", "add": true}));
        overlay_action.type_name = Some("ExternalClassificationPolicyType".into());
        overlay_rule.actions = vec![overlay_action];
        let overlay = workflow(vec![overlay_rule]);

        combine_workflows(&mut base, &overlay);

        let merged = &base.processing_rules[0].actions[0];
        assert_eq!(
            Value::Object(merged.settings.clone()),
            json!({"keep": 1, "change": "new", "add": true})
        );
        assert_eq!(merged.type_name.as_deref(), Some("ExternalClassificationPolicyType"));
    }

    #[test]
    fn replace_action_drops_base_settings() {
        let mut base_rule = rule("R1");
        let mut base_action = action("A", json!({"keep": 1}));
        base_action.type_id = Some(4);
        base_rule.actions = vec![base_action];
        let mut base = workflow(vec![base_rule]);

        let mut overlay_rule = rule("R1");
        let mut overlay_action = action("A", json!({"only": 2}));
        overlay_action.merge_mode = MergeMode::Replace;
        overlay_rule.actions = vec![overlay_action];
        let overlay = workflow(vec![overlay_rule]);

        combine_workflows(&mut base, &overlay);

        let merged = &base.processing_rules[0].actions[0];
        assert_eq!(merged.type_id, None);
        assert_eq!(Value::Object(merged.settings.clone()), json!({"only": 2}));
    }

    #[test]
    fn conditions_are_taken_wholesale_when_base_has_none() {
        let mut base = workflow(vec![rule("R1")]);
        let mut overlay_rule = rule("R1");
        overlay_rule.rule_conditions = vec![
            condition("dup", json!({"type": "exists", "field": "a"})),
            condition("dup", json!({"type": "exists", "field": "b"})),
        ];
        let overlay = workflow(vec![overlay_rule.clone()]);

        combine_workflows(&mut base, &overlay);

        assert_eq!(base.processing_rules[0].rule_conditions, overlay_rule.rule_conditions);
    }

    #[test]
    fn condition_merge_is_shallow() {
        let base_tree = json!({
            "type": "boolean", "operator": "and", "order": 1, "notes": "base",
            "children": [{ "name": "c1", "additional": { "type": "exists", "field": "a" } }]
        });
        let mut base_rule = rule("R1");
        base_rule.rule_conditions = vec![condition("root", base_tree)];
        let mut base = workflow(vec![base_rule]);

        let mut overlay_rule = rule("R1");
        overlay_rule.rule_conditions = vec![condition(
            "root",
            json!({
                "type": "boolean", "operator": "or", "order": 5, "notes": "",
                "children": [{ "name": "c2", "additional": { "type": "exists", "field": "b" } }]
            }),
        )];
        let overlay = workflow(vec![overlay_rule]);

        combine_workflows(&mut base, &overlay);

        let merged = base.processing_rules[0].rule_conditions[0].additional.clone().unwrap();
        assert_eq!(
            Value::Object(merged),
            json!({
                "type": "boolean", "operator": "and", "order": 5, "notes": "base",
                "children": [{ "name": "c1", "additional": { "type": "exists", "field": "a" } }]
            })
        );
    }

    #[test]
    fn condition_without_payload_takes_overlay_payload() {
        let mut base_rule = rule("R1");
        base_rule.rule_conditions = vec![ConditionDefinition { name: "c".into(), additional: None }];
        let mut base = workflow(vec![base_rule]);

        let mut overlay_rule = rule("R1");
        overlay_rule.rule_conditions = vec![condition("c", json!({"type": "exists", "field": "x"}))];
        let overlay = workflow(vec![overlay_rule.clone()]);

        combine_workflows(&mut base, &overlay);

        assert_eq!(base.processing_rules[0].rule_conditions, overlay_rule.rule_conditions);
    }

    #[test]
    fn overlay_is_left_untouched() {
        let mut base = workflow(vec![rule("R1")]);
        let mut overlay_rule = rule("R1");
        overlay_rule.actions = vec![action("A", json!({"x": 1}))];
        let overlay = workflow(vec![overlay_rule, rule("R2")]);
        let before = overlay.clone();

        combine_workflows(&mut base, &overlay);
        base.processing_rules[0].actions[0].name = "mutated".into();

        assert_eq!(overlay, before);
    }
}

//! Resource change planning
//!
//! Given a resource schema, the prior state and the desired configuration,
//! decide what apply has to do and what state to expect afterwards.

use crate::plan_modifier::PlanModifyRequest;
use crate::schema::Schema;
use crate::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanAction {
    NoOp,
    Create,
    Update,
    /// Delete then create, because a forces-new attribute changed
    Replace,
    Delete,
}

impl PlanAction {
    pub fn is_change(&self) -> bool {
        !matches!(self, PlanAction::NoOp)
    }
}

impl fmt::Display for PlanAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PlanAction::NoOp => "no-op",
            PlanAction::Create => "create",
            PlanAction::Update => "update",
            PlanAction::Replace => "replace",
            PlanAction::Delete => "delete",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct ResourcePlan {
    pub action: PlanAction,
    pub planned_state: DynamicValue,
    pub requires_replace: Vec<AttributePath>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Plan one resource instance. `None` for config means the resource left the
/// configuration; `None` for prior state means it does not exist yet.
pub fn plan_resource_change(
    schema: &Schema,
    prior_state: Option<&DynamicValue>,
    config: Option<&DynamicValue>,
) -> ResourcePlan {
    let config = match config {
        Some(config) => config,
        None => {
            let action = if prior_state.is_some() {
                PlanAction::Delete
            } else {
                PlanAction::NoOp
            };
            return ResourcePlan {
                action,
                planned_state: DynamicValue::null(),
                requires_replace: vec![],
                diagnostics: vec![],
            };
        }
    };

    let Some(prior) = prior_state else {
        return ResourcePlan {
            action: PlanAction::Create,
            planned_state: object(proposed_new_state(schema, None, config)),
            requires_replace: vec![],
            diagnostics: vec![],
        };
    };

    let mut planned = proposed_new_state(schema, Some(prior), config);
    if differs(schema, prior, &planned) {
        // Any change may move computed-only values; plan them unknown and
        // let modifiers pin the ones that are stable
        for attr in &schema.block.attributes {
            if attr.computed && !attr.optional && !attr.required {
                planned.insert(attr.name.clone(), Dynamic::Unknown);
            }
        }
    }

    let mut requires_replace = vec![];
    let mut diagnostics = vec![];

    for attr in &schema.block.attributes {
        if attr.plan_modifiers.is_empty() {
            continue;
        }
        let path = AttributePath::new(&attr.name);
        let state_value = attribute_value(prior, &attr.name);
        let config_value = attribute_value(config, &attr.name);
        let mut plan_value = planned.get(&attr.name).cloned().unwrap_or(Dynamic::Null);

        for modifier in &attr.plan_modifiers {
            let response = modifier.modify_plan(PlanModifyRequest {
                state: state_value.clone(),
                plan: plan_value,
                config: config_value.clone(),
                path: path.clone(),
            });
            plan_value = response.plan_value;
            if response.requires_replace && !requires_replace.contains(&path) {
                requires_replace.push(path.clone());
            }
            diagnostics.extend(response.diagnostics);
        }

        planned.insert(attr.name.clone(), plan_value);
    }

    if !requires_replace.is_empty() {
        let attributes: Vec<String> = requires_replace.iter().map(ToString::to_string).collect();
        tracing::debug!(?attributes, "change forces replacement");
        return ResourcePlan {
            action: PlanAction::Replace,
            planned_state: object(proposed_new_state(schema, None, config)),
            requires_replace,
            diagnostics,
        };
    }

    let action = if differs(schema, prior, &planned) {
        PlanAction::Update
    } else {
        PlanAction::NoOp
    };

    ResourcePlan {
        action,
        planned_state: object(planned),
        requires_replace,
        diagnostics,
    }
}

/// Configured values win; unset attributes fall back to prior state when
/// computed, to unknown on create when computed, and to null otherwise
fn proposed_new_state(
    schema: &Schema,
    prior: Option<&DynamicValue>,
    config: &DynamicValue,
) -> HashMap<String, Dynamic> {
    let mut fields = HashMap::new();
    for attr in &schema.block.attributes {
        let configured = attribute_value(config, &attr.name);
        let value = if !configured.is_null() {
            configured
        } else if attr.computed {
            match prior {
                Some(prior) => attribute_value(prior, &attr.name),
                None => Dynamic::Unknown,
            }
        } else {
            Dynamic::Null
        };
        fields.insert(attr.name.clone(), value);
    }
    fields
}

fn object(fields: HashMap<String, Dynamic>) -> DynamicValue {
    DynamicValue::new(Dynamic::Map(fields))
}

fn differs(schema: &Schema, prior: &DynamicValue, planned: &HashMap<String, Dynamic>) -> bool {
    schema.block.attributes.iter().any(|attr| {
        let before = attribute_value(prior, &attr.name);
        let after = planned.get(&attr.name).unwrap_or(&Dynamic::Null);
        after.is_unknown() || !before.semantically_equal(after)
    })
}

fn attribute_value(value: &DynamicValue, name: &str) -> Dynamic {
    value
        .attributes()
        .and_then(|fields| fields.get(name))
        .cloned()
        .unwrap_or(Dynamic::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan_modifier::{RequiresReplaceIfChanged, UseStateForUnknown};
    use crate::schema::{AttributeBuilder, AttributeType, SchemaBuilder};

    fn schema() -> Schema {
        SchemaBuilder::new()
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .plan_modifier(UseStateForUnknown)
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("version", AttributeType::Number)
                    .computed()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .required()
                    .plan_modifier(RequiresReplaceIfChanged)
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("role", AttributeType::String)
                    .optional()
                    .build(),
            )
            .build()
    }

    fn value(json: serde_json::Value) -> DynamicValue {
        DynamicValue::new(Dynamic::from(json))
    }

    fn prior() -> DynamicValue {
        value(serde_json::json!({
            "id": "abc",
            "version": 1,
            "name": "app",
            "role": "r1"
        }))
    }

    #[test]
    fn new_resource_plans_create_with_unknown_computed_values() {
        let plan = plan_resource_change(
            &schema(),
            None,
            Some(&value(serde_json::json!({"name": "app"}))),
        );

        assert_eq!(plan.action, PlanAction::Create);
        let state = &plan.planned_state;
        assert!(state.get(&AttributePath::new("id")).unwrap().is_unknown());
        assert!(state.get(&AttributePath::new("role")).unwrap().is_null());
    }

    #[test]
    fn unchanged_config_plans_no_op() {
        let plan = plan_resource_change(
            &schema(),
            Some(&prior()),
            Some(&value(serde_json::json!({"name": "app", "role": "r1"}))),
        );

        assert_eq!(plan.action, PlanAction::NoOp);
        assert!(!plan.action.is_change());
    }

    #[test]
    fn changed_optional_attribute_plans_update_and_keeps_stable_id() {
        let plan = plan_resource_change(
            &schema(),
            Some(&prior()),
            Some(&value(serde_json::json!({"name": "app", "role": "r2"}))),
        );

        assert_eq!(plan.action, PlanAction::Update);
        let state = &plan.planned_state;
        assert_eq!(state.get_string(&AttributePath::new("id")).unwrap(), "abc");
        assert!(state
            .get(&AttributePath::new("version"))
            .unwrap()
            .is_unknown());
    }

    #[test]
    fn removed_optional_attribute_plans_update_to_null() {
        let plan = plan_resource_change(
            &schema(),
            Some(&prior()),
            Some(&value(serde_json::json!({"name": "app"}))),
        );

        assert_eq!(plan.action, PlanAction::Update);
        assert!(plan
            .planned_state
            .get(&AttributePath::new("role"))
            .unwrap()
            .is_null());
    }

    #[test]
    fn forces_new_attribute_plans_replace() {
        let plan = plan_resource_change(
            &schema(),
            Some(&prior()),
            Some(&value(serde_json::json!({"name": "renamed", "role": "r1"}))),
        );

        assert_eq!(plan.action, PlanAction::Replace);
        assert_eq!(plan.requires_replace, vec![AttributePath::new("name")]);
        assert!(plan
            .planned_state
            .get(&AttributePath::new("id"))
            .unwrap()
            .is_unknown());
    }

    #[test]
    fn missing_config_plans_delete() {
        let plan = plan_resource_change(&schema(), Some(&prior()), None);
        assert_eq!(plan.action, PlanAction::Delete);
        assert!(plan.planned_state.is_null());

        let plan = plan_resource_change(&schema(), None, None);
        assert_eq!(plan.action, PlanAction::NoOp);
    }
}

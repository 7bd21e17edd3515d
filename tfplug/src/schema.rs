//! Schema types and builders for tfplug
//!
//! This module provides the schema system for defining provider and resource
//! schemas, and the structural validation every configuration goes through
//! before a resource sees it.

use crate::plan_modifier::PlanModifier;
use crate::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};
use crate::validator::Validator;
use std::sync::Arc;

/// Type of an attribute value
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeType {
    String,
    Number, // Always f64
    Bool,
    List(Box<AttributeType>), // Ordered, allows duplicates
    Map(Box<AttributeType>),  // String keys only
}

impl AttributeType {
    /// Null and unknown are acceptable for every type
    pub fn accepts(&self, value: &Dynamic) -> bool {
        match (self, value) {
            (_, Dynamic::Null | Dynamic::Unknown) => true,
            (AttributeType::String, Dynamic::String(_)) => true,
            (AttributeType::Number, Dynamic::Number(_)) => true,
            (AttributeType::Bool, Dynamic::Bool(_)) => true,
            (AttributeType::List(inner), Dynamic::List(items)) => {
                items.iter().all(|item| inner.accepts(item))
            }
            (AttributeType::Map(inner), Dynamic::Map(fields)) => {
                fields.values().all(|item| inner.accepts(item))
            }
            _ => false,
        }
    }

    pub fn name(&self) -> String {
        match self {
            AttributeType::String => "string".to_string(),
            AttributeType::Number => "number".to_string(),
            AttributeType::Bool => "bool".to_string(),
            AttributeType::List(inner) => format!("list({})", inner.name()),
            AttributeType::Map(inner) => format!("map({})", inner.name()),
        }
    }
}

/// Schema is returned by providers and resources
/// Version is used for state migration
#[derive(Debug, Clone)]
pub struct Schema {
    pub version: i64,
    pub block: Block,
}

#[derive(Debug, Clone, Default)]
pub struct Block {
    pub attributes: Vec<Attribute>,
    pub description: String,
    pub deprecated: bool,
}

#[derive(Clone)]
pub struct Attribute {
    pub name: String,
    pub r#type: AttributeType,
    pub description: String,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    pub sensitive: bool,
    pub validators: Vec<Arc<dyn Validator>>,
    pub plan_modifiers: Vec<Arc<dyn PlanModifier>>,
    pub deprecated: bool,
}

impl std::fmt::Debug for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attribute")
            .field("name", &self.name)
            .field("type", &self.r#type)
            .field("required", &self.required)
            .field("optional", &self.optional)
            .field("computed", &self.computed)
            .field("sensitive", &self.sensitive)
            .field(
                "validators",
                &format!("{} validators", self.validators.len()),
            )
            .field(
                "plan_modifiers",
                &format!("{} plan modifiers", self.plan_modifiers.len()),
            )
            .finish()
    }
}

impl Schema {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.block.attributes.iter().find(|a| a.name == name)
    }

    /// Structural validation of a configuration object: unknown attributes,
    /// missing required ones, values set on computed-only attributes, type
    /// mismatches, then per-attribute validators
    pub fn validate_config(&self, config: &DynamicValue) -> Vec<Diagnostic> {
        let mut diagnostics = vec![];

        let fields = match &config.value {
            Dynamic::Map(fields) => fields,
            Dynamic::Null => {
                return self
                    .block
                    .attributes
                    .iter()
                    .filter(|a| a.required)
                    .map(|a| missing_required(&a.name))
                    .collect();
            }
            other => {
                diagnostics.push(Diagnostic::error(
                    "Invalid configuration",
                    format!("expected an object, got {}", other.type_name()),
                ));
                return diagnostics;
            }
        };

        let mut names: Vec<&String> = fields.keys().collect();
        names.sort();
        for name in names {
            if self.attribute(name).is_none() {
                diagnostics.push(
                    Diagnostic::error(
                        "Unsupported argument",
                        format!("An argument named \"{}\" is not expected here.", name),
                    )
                    .with_attribute(AttributePath::new(name)),
                );
            }
        }

        for attr in &self.block.attributes {
            let path = AttributePath::new(&attr.name);
            let value = fields.get(&attr.name).unwrap_or(&Dynamic::Null);

            if value.is_null() {
                if attr.required {
                    diagnostics.push(missing_required(&attr.name));
                }
                continue;
            }

            if attr.computed && !attr.optional && !attr.required {
                diagnostics.push(
                    Diagnostic::error(
                        "Invalid configuration",
                        format!("\"{}\" is computed and cannot be set", attr.name),
                    )
                    .with_attribute(path),
                );
                continue;
            }

            if !attr.r#type.accepts(value) {
                diagnostics.push(
                    Diagnostic::error(
                        "Incorrect attribute value type",
                        format!(
                            "\"{}\" must be {}, got {}",
                            attr.name,
                            attr.r#type.name(),
                            value.type_name()
                        ),
                    )
                    .with_attribute(path),
                );
                continue;
            }

            if value.is_unknown() {
                continue;
            }

            for validator in &attr.validators {
                validator.validate(value, &path, &mut diagnostics);
            }
        }

        diagnostics
    }
}

fn missing_required(name: &str) -> Diagnostic {
    Diagnostic::error(
        "Missing required argument",
        format!("The argument \"{}\" is required, but no definition was found.", name),
    )
    .with_attribute(AttributePath::new(name))
}

/// Builds one attribute; `required` and `optional` override each other
pub struct AttributeBuilder {
    attribute: Attribute,
}

impl AttributeBuilder {
    pub fn new(name: &str, type_: AttributeType) -> Self {
        Self {
            attribute: Attribute {
                name: name.to_string(),
                r#type: type_,
                description: String::new(),
                required: false,
                optional: false,
                computed: false,
                sensitive: false,
                validators: Vec::new(),
                plan_modifiers: Vec::new(),
                deprecated: false,
            },
        }
    }

    pub fn description(mut self, desc: &str) -> Self {
        self.attribute.description = desc.to_string();
        self
    }

    pub fn required(mut self) -> Self {
        self.attribute.required = true;
        self.attribute.optional = false;
        self
    }

    pub fn optional(mut self) -> Self {
        self.attribute.optional = true;
        self.attribute.required = false;
        self
    }

    pub fn computed(mut self) -> Self {
        self.attribute.computed = true;
        self
    }

    /// Mark as sensitive (hidden in plan output)
    pub fn sensitive(mut self) -> Self {
        self.attribute.sensitive = true;
        self
    }

    pub fn deprecated(mut self) -> Self {
        self.attribute.deprecated = true;
        self
    }

    pub fn validator(mut self, validator: impl Validator + 'static) -> Self {
        self.attribute.validators.push(Arc::new(validator));
        self
    }

    pub fn plan_modifier(mut self, modifier: impl PlanModifier + 'static) -> Self {
        self.attribute.plan_modifiers.push(Arc::new(modifier));
        self
    }

    pub fn build(self) -> Attribute {
        self.attribute
    }
}

/// Builds a schema with a single top-level block
pub struct SchemaBuilder {
    schema: Schema,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self {
            schema: Schema {
                version: 0,
                block: Block::default(),
            },
        }
    }

    pub fn version(mut self, version: i64) -> Self {
        self.schema.version = version;
        self
    }

    pub fn attribute(mut self, attr: Attribute) -> Self {
        self.schema.block.attributes.push(attr);
        self
    }

    pub fn description(mut self, desc: &str) -> Self {
        self.schema.block.description = desc.to_string();
        self
    }

    pub fn deprecated(mut self) -> Self {
        self.schema.block.deprecated = true;
        self
    }

    pub fn build(self) -> Schema {
        self.schema
    }
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

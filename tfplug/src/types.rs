//! Core type system for tfplug
//!
//! This module provides the value model shared by configuration, plans and
//! state, plus attribute paths and diagnostics.

use crate::error::{Result, TfplugError};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Placeholder Terraform writes into flattened state for values that are
/// not known until apply
pub const UNKNOWN_VALUE: &str = "74D93920-ED26-11E3-AC10-0800200C9A66";

/// A configuration or state value of any Terraform type
#[derive(Debug, Clone, PartialEq)]
pub enum Dynamic {
    /// Explicit null value
    Null,
    /// Boolean value
    Bool(bool),
    /// Number value (all numbers are f64 to match Terraform)
    Number(f64),
    /// String value
    String(String),
    /// List of values (ordered, allows duplicates)
    List(Vec<Dynamic>),
    /// Map of string keys to values (objects are represented as Maps)
    Map(HashMap<String, Dynamic>),
    /// Value not yet known (during planning)
    Unknown,
}

impl Dynamic {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Dynamic::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Dynamic::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Dynamic::Null)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Dynamic::Unknown)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Dynamic::Null => "null",
            Dynamic::Bool(_) => "bool",
            Dynamic::Number(_) => "number",
            Dynamic::String(_) => "string",
            Dynamic::List(_) => "list",
            Dynamic::Map(_) => "map",
            Dynamic::Unknown => "unknown",
        }
    }

    /// Semantic equality: numbers compare with an epsilon, maps by key
    pub fn semantically_equal(&self, other: &Dynamic) -> bool {
        match (self, other) {
            (Dynamic::Null, Dynamic::Null) => true,
            (Dynamic::Unknown, Dynamic::Unknown) => true,
            (Dynamic::Bool(a), Dynamic::Bool(b)) => a == b,
            (Dynamic::Number(a), Dynamic::Number(b)) => (a - b).abs() < f64::EPSILON,
            (Dynamic::String(a), Dynamic::String(b)) => a == b,
            (Dynamic::List(a), Dynamic::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.semantically_equal(y))
            }
            (Dynamic::Map(a), Dynamic::Map(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(k, v)| b.get(k).is_some_and(|v2| v.semantically_equal(v2)))
            }
            _ => false,
        }
    }
}

impl From<serde_json::Value> for Dynamic {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Dynamic::Null,
            serde_json::Value::Bool(b) => Dynamic::Bool(b),
            // Every JSON number fits an f64 approximation
            serde_json::Value::Number(n) => Dynamic::Number(n.as_f64().unwrap_or_default()),
            serde_json::Value::String(s) => Dynamic::String(s),
            serde_json::Value::Array(items) => {
                Dynamic::List(items.into_iter().map(Dynamic::from).collect())
            }
            serde_json::Value::Object(fields) => Dynamic::Map(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, Dynamic::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for Dynamic {
    fn from(value: &str) -> Self {
        Dynamic::String(value.to_string())
    }
}

impl From<String> for Dynamic {
    fn from(value: String) -> Self {
        Dynamic::String(value)
    }
}

impl From<f64> for Dynamic {
    fn from(value: f64) -> Self {
        Dynamic::Number(value)
    }
}

impl From<bool> for Dynamic {
    fn from(value: bool) -> Self {
        Dynamic::Bool(value)
    }
}

/// DynamicValue wraps Dynamic and provides path-based accessors
/// This is what gets passed between the harness and the provider
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicValue {
    pub value: Dynamic,
}

impl DynamicValue {
    pub fn new(value: Dynamic) -> Self {
        Self { value }
    }

    pub fn null() -> Self {
        Self {
            value: Dynamic::Null,
        }
    }

    /// An empty object, the usual starting point for building state
    pub fn object() -> Self {
        Self {
            value: Dynamic::Map(HashMap::new()),
        }
    }

    /// Value at `path`; missing attributes are an error
    pub fn get(&self, path: &AttributePath) -> Result<&Dynamic> {
        self.navigate_path(path)
    }

    pub fn get_string(&self, path: &AttributePath) -> Result<String> {
        let value = self.navigate_path(path)?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| type_mismatch("string", value))
    }

    pub fn get_number(&self, path: &AttributePath) -> Result<f64> {
        let value = self.navigate_path(path)?;
        value.as_number().ok_or_else(|| type_mismatch("number", value))
    }

    /// Missing, null and unknown all read as None; a value of the wrong
    /// type is still an error
    pub fn get_optional_string(&self, path: &AttributePath) -> Result<Option<String>> {
        match self.navigate_path(path) {
            Ok(Dynamic::Null | Dynamic::Unknown) | Err(TfplugError::AttributeNotFound(_)) => {
                Ok(None)
            }
            Ok(Dynamic::String(s)) => Ok(Some(s.clone())),
            Ok(other) => Err(type_mismatch("string", other)),
            Err(e) => Err(e),
        }
    }

    pub fn get_optional_number(&self, path: &AttributePath) -> Result<Option<f64>> {
        match self.navigate_path(path) {
            Ok(Dynamic::Null | Dynamic::Unknown) | Err(TfplugError::AttributeNotFound(_)) => {
                Ok(None)
            }
            Ok(Dynamic::Number(n)) => Ok(Some(*n)),
            Ok(other) => Err(type_mismatch("number", other)),
            Err(e) => Err(e),
        }
    }

    /// Setters create intermediate objects as needed
    pub fn set_string(&mut self, path: &AttributePath, value: impl Into<String>) -> Result<()> {
        self.set_value(path, Dynamic::String(value.into()))
    }

    pub fn set_number(&mut self, path: &AttributePath, value: f64) -> Result<()> {
        self.set_value(path, Dynamic::Number(value))
    }

    pub fn set_null(&mut self, path: &AttributePath) -> Result<()> {
        self.set_value(path, Dynamic::Null)
    }

    pub fn is_null(&self) -> bool {
        self.value.is_null()
    }

    pub fn is_unknown(&self) -> bool {
        self.value.is_unknown()
    }

    /// Mark computed values as unknown during planning
    pub fn mark_unknown(&mut self, path: &AttributePath) -> Result<()> {
        self.set_value(path, Dynamic::Unknown)
    }

    /// Top-level attributes of an object value
    pub fn attributes(&self) -> Option<&HashMap<String, Dynamic>> {
        match &self.value {
            Dynamic::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Flatten into Terraform's flatmap representation, the form that
    /// acceptance checks compare against. Nulls are omitted; lists get a
    /// `.#` count and maps a `.%` count.
    pub fn flatten(&self) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        if let Dynamic::Map(fields) = &self.value {
            for (key, value) in fields {
                flatten_into(key, value, &mut out);
            }
        }
        out
    }

    pub fn set_value(&mut self, path: &AttributePath, new_value: Dynamic) -> Result<()> {
        let Some((last, parents)) = path.steps.split_last() else {
            self.value = new_value;
            return Ok(());
        };

        if !matches!(self.value, Dynamic::Map(_)) {
            self.value = Dynamic::Map(HashMap::new());
        }

        let mut current = &mut self.value;
        for (idx, step) in parents.iter().enumerate() {
            let next_is_index = matches!(path.steps[idx + 1], AttributePathStep::ElementKeyInt(_));
            current = match (current, step) {
                (
                    Dynamic::Map(m),
                    AttributePathStep::AttributeName(name) | AttributePathStep::ElementKeyString(name),
                ) => m.entry(name.clone()).or_insert_with(|| {
                    if next_is_index {
                        Dynamic::List(Vec::new())
                    } else {
                        Dynamic::Map(HashMap::new())
                    }
                }),
                (Dynamic::List(l), AttributePathStep::ElementKeyInt(i)) => {
                    let len = l.len();
                    l.get_mut(*i as usize).ok_or_else(|| {
                        TfplugError::InvalidPath(format!("list index {} out of bounds ({})", i, len))
                    })?
                }
                _ => return Err(TfplugError::InvalidPath(path.to_string())),
            };
        }

        match (current, last) {
            (
                Dynamic::Map(m),
                AttributePathStep::AttributeName(name) | AttributePathStep::ElementKeyString(name),
            ) => {
                m.insert(name.clone(), new_value);
                Ok(())
            }
            (Dynamic::List(l), AttributePathStep::ElementKeyInt(i)) => {
                let len = l.len();
                let slot = l.get_mut(*i as usize).ok_or_else(|| {
                    TfplugError::InvalidPath(format!("list index {} out of bounds ({})", i, len))
                })?;
                *slot = new_value;
                Ok(())
            }
            _ => Err(TfplugError::InvalidPath(path.to_string())),
        }
    }

    fn navigate_path<'a>(&'a self, path: &AttributePath) -> Result<&'a Dynamic> {
        let mut current = &self.value;

        for step in &path.steps {
            current = match (current, step) {
                (
                    Dynamic::Map(m),
                    AttributePathStep::AttributeName(name) | AttributePathStep::ElementKeyString(name),
                ) => m
                    .get(name)
                    .ok_or_else(|| TfplugError::AttributeNotFound(path.to_string()))?,
                (Dynamic::List(l), AttributePathStep::ElementKeyInt(idx)) => l
                    .get(*idx as usize)
                    .ok_or_else(|| TfplugError::AttributeNotFound(path.to_string()))?,
                (Dynamic::Null, _) => return Err(TfplugError::AttributeNotFound(path.to_string())),
                _ => return Err(TfplugError::InvalidPath(path.to_string())),
            };
        }

        Ok(current)
    }
}

fn type_mismatch(expected: &str, actual: &Dynamic) -> TfplugError {
    TfplugError::TypeMismatch {
        expected: expected.to_string(),
        actual: actual.type_name().to_string(),
    }
}

fn flatten_into(prefix: &str, value: &Dynamic, out: &mut BTreeMap<String, String>) {
    match value {
        Dynamic::Null => {}
        Dynamic::Unknown => {
            out.insert(prefix.to_string(), UNKNOWN_VALUE.to_string());
        }
        Dynamic::Bool(b) => {
            out.insert(prefix.to_string(), b.to_string());
        }
        Dynamic::Number(n) => {
            out.insert(prefix.to_string(), format_number(*n));
        }
        Dynamic::String(s) => {
            out.insert(prefix.to_string(), s.clone());
        }
        Dynamic::List(items) => {
            out.insert(format!("{}.#", prefix), items.len().to_string());
            for (idx, item) in items.iter().enumerate() {
                flatten_into(&format!("{}.{}", prefix, idx), item, out);
            }
        }
        Dynamic::Map(fields) => {
            out.insert(format!("{}.%", prefix), fields.len().to_string());
            for (key, item) in fields {
                flatten_into(&format!("{}.{}", prefix, key), item, out);
            }
        }
    }
}

/// Whole numbers render without a fractional part, as Terraform prints them
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Location of an attribute, rendered the way Terraform prints it
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttributePath {
    pub steps: Vec<AttributePathStep>,
}

impl AttributePath {
    pub fn new(name: &str) -> Self {
        Self {
            steps: vec![AttributePathStep::AttributeName(name.to_string())],
        }
    }

    pub fn attribute(mut self, name: &str) -> Self {
        self.steps
            .push(AttributePathStep::AttributeName(name.to_string()));
        self
    }

    pub fn index(mut self, idx: i64) -> Self {
        self.steps.push(AttributePathStep::ElementKeyInt(idx));
        self
    }

    pub fn key(mut self, key: &str) -> Self {
        self.steps
            .push(AttributePathStep::ElementKeyString(key.to_string()));
        self
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, step) in self.steps.iter().enumerate() {
            match step {
                AttributePathStep::AttributeName(name) if idx == 0 => write!(f, "{}", name)?,
                AttributePathStep::AttributeName(name) => write!(f, ".{}", name)?,
                AttributePathStep::ElementKeyString(key) => write!(f, "[{:?}]", key)?,
                AttributePathStep::ElementKeyInt(i) => write!(f, "[{}]", i)?,
            }
        }
        Ok(())
    }
}

/// Individual step in an AttributePath
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AttributePathStep {
    /// Access attribute by name in object/map
    AttributeName(String),
    /// Access element by string key (for maps)
    ElementKeyString(String),
    /// Access element by integer index (for lists)
    ElementKeyInt(i64),
}

/// Warning or error reported back to the host
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: DiagnosticSeverity,
    pub summary: String,
    pub detail: String,
    pub attribute: Option<AttributePath>,
}

impl Diagnostic {
    pub fn error(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Error,
            summary: summary.into(),
            detail: detail.into(),
            attribute: None,
        }
    }

    pub fn warning(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Warning,
            summary: summary.into(),
            detail: detail.into(),
            attribute: None,
        }
    }

    pub fn with_attribute(mut self, path: AttributePath) -> Self {
        self.attribute = Some(path);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            DiagnosticSeverity::Error => "Error",
            DiagnosticSeverity::Warning => "Warning",
        };
        write!(f, "{}: {}", level, self.summary)?;
        if let Some(path) = &self.attribute {
            write!(f, " (at {})", path)?;
        }
        if !self.detail.is_empty() {
            write!(f, ": {}", self.detail)?;
        }
        Ok(())
    }
}

/// Severity level for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticSeverity {
    Error,
    Warning,
}

pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}

/// ClientCapabilities indicates what the calling host supports
#[derive(Debug, Clone, Default)]
pub struct ClientCapabilities {
    pub deferral_allowed: bool,
    pub write_only_attributes_allowed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dynamic_value_string_access() {
        let mut dv = DynamicValue::object();
        dv.set_string(&AttributePath::new("name"), "test").unwrap();

        let result = dv.get_string(&AttributePath::new("name")).unwrap();
        assert_eq!(result, "test");
    }

    #[test]
    fn dynamic_value_nested_access() {
        let mut dv = DynamicValue::object();
        let path = AttributePath::new("config").attribute("endpoint");
        dv.set_string(&path, "https://example.com").unwrap();

        let result = dv.get_string(&path).unwrap();
        assert_eq!(result, "https://example.com");
    }

    #[test]
    fn optional_accessors_treat_missing_and_null_as_none() {
        let mut dv = DynamicValue::object();
        dv.set_null(&AttributePath::new("principal")).unwrap();
        dv.set_number(&AttributePath::new("rate"), 42.0).unwrap();

        assert_eq!(
            dv.get_optional_string(&AttributePath::new("principal")).unwrap(),
            None
        );
        assert_eq!(
            dv.get_optional_string(&AttributePath::new("absent")).unwrap(),
            None
        );
        assert_eq!(
            dv.get_optional_number(&AttributePath::new("rate")).unwrap(),
            Some(42.0)
        );
        assert!(matches!(
            dv.get_optional_string(&AttributePath::new("rate")),
            Err(TfplugError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn missing_required_attribute_reports_path() {
        let dv = DynamicValue::object();
        let err = dv.get_string(&AttributePath::new("name")).unwrap_err();
        assert!(matches!(err, TfplugError::AttributeNotFound(ref p) if p == "name"));
    }

    #[test]
    fn flatten_renders_whole_numbers_without_fraction() {
        let json = serde_json::json!({
            "name": "app",
            "rate": 100,
            "ratio": 0.5,
            "enabled": true,
            "gone": null,
            "tags": {"env": "test"},
            "items": ["a", "b"]
        });
        let dv = DynamicValue::new(Dynamic::from(json));
        let flat = dv.flatten();

        assert_eq!(flat["name"], "app");
        assert_eq!(flat["rate"], "100");
        assert_eq!(flat["ratio"], "0.5");
        assert_eq!(flat["enabled"], "true");
        assert!(!flat.contains_key("gone"));
        assert_eq!(flat["tags.%"], "1");
        assert_eq!(flat["tags.env"], "test");
        assert_eq!(flat["items.#"], "2");
        assert_eq!(flat["items.1"], "b");
    }

    #[test]
    fn unknown_values_flatten_to_placeholder() {
        let mut dv = DynamicValue::object();
        dv.mark_unknown(&AttributePath::new("arn")).unwrap();
        assert_eq!(dv.flatten()["arn"], UNKNOWN_VALUE);
    }

    #[test]
    fn semantic_equality_ignores_float_noise_and_key_order() {
        let a = Dynamic::from(serde_json::json!({"a": 1, "b": [1.0, "x"]}));
        let b = Dynamic::from(serde_json::json!({"b": [1, "x"], "a": 1.0}));
        assert!(a.semantically_equal(&b));
        assert!(!a.semantically_equal(&Dynamic::Null));
    }

    #[test]
    fn attribute_path_display() {
        let path = AttributePath::new("provider").key("aws").index(0).attribute("region");
        assert_eq!(path.to_string(), "provider[\"aws\"][0].region");
    }
}

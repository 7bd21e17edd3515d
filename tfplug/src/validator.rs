//! Attribute validators run during configuration validation

use crate::types::{AttributePath, Diagnostic, Dynamic};
use regex::Regex;

pub trait Validator: Send + Sync {
    /// Human-readable description
    fn description(&self) -> String;

    fn validate(&self, value: &Dynamic, path: &AttributePath, diagnostics: &mut Vec<Diagnostic>);
}

pub struct StringLengthValidator {
    pub min: Option<usize>,
    pub max: Option<usize>,
}

impl Validator for StringLengthValidator {
    fn description(&self) -> String {
        match (self.min, self.max) {
            (Some(min), Some(max)) => format!("length between {} and {}", min, max),
            (Some(min), None) => format!("length at least {}", min),
            (None, Some(max)) => format!("length at most {}", max),
            (None, None) => "any length".to_string(),
        }
    }

    fn validate(&self, value: &Dynamic, path: &AttributePath, diagnostics: &mut Vec<Diagnostic>) {
        let Some(s) = value.as_str() else { return };
        let len = s.chars().count();
        let too_short = self.min.is_some_and(|min| len < min);
        let too_long = self.max.is_some_and(|max| len > max);
        if too_short || too_long {
            diagnostics.push(
                Diagnostic::error(
                    format!("{} must have {}", path, self.description()),
                    format!("Got length {}", len),
                )
                .with_attribute(path.clone()),
            );
        }
    }
}

pub struct StringPatternValidator {
    pub pattern: String,
    pub description: String,
}

impl StringPatternValidator {
    pub fn new(pattern: &str, description: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            description: description.to_string(),
        }
    }
}

impl Validator for StringPatternValidator {
    fn description(&self) -> String {
        self.description.clone()
    }

    fn validate(&self, value: &Dynamic, path: &AttributePath, diagnostics: &mut Vec<Diagnostic>) {
        let Some(s) = value.as_str() else { return };
        let pattern = match Regex::new(&self.pattern) {
            Ok(pattern) => pattern,
            Err(e) => {
                diagnostics.push(
                    Diagnostic::error("Invalid validator pattern", e.to_string())
                        .with_attribute(path.clone()),
                );
                return;
            }
        };
        if !pattern.is_match(s) {
            diagnostics.push(
                Diagnostic::error(
                    format!("{} must be {}", path, self.description),
                    format!("Value '{}' does not match pattern", s),
                )
                .with_attribute(path.clone()),
            );
        }
    }
}

pub struct StringOneOfValidator {
    pub allowed: Vec<String>,
}

impl StringOneOfValidator {
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }
}

impl Validator for StringOneOfValidator {
    fn description(&self) -> String {
        format!("one of: {}", self.allowed.join(", "))
    }

    fn validate(&self, value: &Dynamic, path: &AttributePath, diagnostics: &mut Vec<Diagnostic>) {
        if let Some(s) = value.as_str() {
            if !self.allowed.iter().any(|a| a == s) {
                diagnostics.push(
                    Diagnostic::error(
                        format!("{} must be {}", path, self.description()),
                        format!("Got '{}'", s),
                    )
                    .with_attribute(path.clone()),
                );
            }
        }
    }
}

pub struct NumberRangeValidator {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub whole: bool,
}

impl NumberRangeValidator {
    pub fn between(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
            whole: false,
        }
    }

    /// Also reject values with a fractional part
    pub fn whole(mut self) -> Self {
        self.whole = true;
        self
    }
}

impl Validator for NumberRangeValidator {
    fn description(&self) -> String {
        let kind = if self.whole { "a whole number" } else { "a number" };
        match (self.min, self.max) {
            (Some(min), Some(max)) => format!("{} between {} and {}", kind, min, max),
            (Some(min), None) => format!("{} of at least {}", kind, min),
            (None, Some(max)) => format!("{} of at most {}", kind, max),
            (None, None) => kind.to_string(),
        }
    }

    fn validate(&self, value: &Dynamic, path: &AttributePath, diagnostics: &mut Vec<Diagnostic>) {
        let Some(n) = value.as_number() else { return };
        let out_of_range =
            self.min.is_some_and(|min| n < min) || self.max.is_some_and(|max| n > max);
        let fractional = self.whole && n.fract() != 0.0;
        if out_of_range || fractional {
            diagnostics.push(
                Diagnostic::error(
                    format!("{} must be {}", path, self.description()),
                    format!("Got {}", n),
                )
                .with_attribute(path.clone()),
            );
        }
    }
}

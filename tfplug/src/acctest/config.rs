//! Acceptance test settings and test configuration parsing

use super::AccTestError;
use crate::types::{Dynamic, DynamicValue};
use std::collections::HashMap;
use std::env;
use std::time::Duration;

/// Variable that switches acceptance tests on
pub const ACC_ENV_VAR: &str = "TF_ACC";
const LOG_ENV_VAR: &str = "TF_LOG";
const TIMEOUT_ENV_VAR: &str = "TF_ACC_TIMEOUT";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120 * 60);

/// Log level for acceptance runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

/// Everything an acceptance run needs from its surroundings
///
/// Test code never reads the environment itself: secrets and switches are
/// injected through this struct, and `from_env` is the only constructor
/// that looks at process state.
#[derive(Debug, Clone)]
pub struct AccTestConfig {
    pub enabled: bool,
    pub credentials: HashMap<String, String>,
    pub log_level: LogLevel,
    pub timeout: Duration,
}

impl Default for AccTestConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            credentials: HashMap::new(),
            log_level: LogLevel::Warn,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl AccTestConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `TF_ACC`, `TF_LOG`, `TF_ACC_TIMEOUT` (seconds) and the named
    /// credential variables. Unset or empty credentials are left out.
    pub fn from_env(credential_vars: &[&str]) -> Self {
        let enabled = env::var(ACC_ENV_VAR)
            .map(|v| !v.is_empty() && v != "0")
            .unwrap_or(false);

        let log_level = env::var(LOG_ENV_VAR)
            .ok()
            .and_then(|v| LogLevel::parse(&v))
            .unwrap_or(LogLevel::Warn);

        let timeout = env::var(TIMEOUT_ENV_VAR)
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT);

        let credentials = credential_vars
            .iter()
            .filter_map(|name| {
                env::var(name)
                    .ok()
                    .filter(|v| !v.is_empty())
                    .map(|v| (name.to_string(), v))
            })
            .collect();

        Self {
            enabled,
            credentials,
            log_level,
            timeout,
        }
    }

    pub fn enabled(mut self) -> Self {
        self.enabled = true;
        self
    }

    pub fn with_credential(mut self, name: &str, value: impl Into<String>) -> Self {
        self.credentials.insert(name.to_string(), value.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    pub fn credential(&self, name: &str) -> Option<&str> {
        self.credentials
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// The credential or an empty string, for rendering fixtures
    pub fn credential_or_empty(&self, name: &str) -> &str {
        self.credential(name).unwrap_or_default()
    }
}

/// A parsed configuration snapshot in Terraform's JSON syntax
#[derive(Debug, Clone, Default)]
pub struct TestConfig {
    /// Provider blocks keyed by provider name
    pub providers: HashMap<String, DynamicValue>,
    /// Resource blocks in address order
    pub resources: Vec<ResourceConfig>,
}

#[derive(Debug, Clone)]
pub struct ResourceConfig {
    pub type_name: String,
    pub name: String,
    pub config: DynamicValue,
}

impl ResourceConfig {
    pub fn address(&self) -> String {
        format!("{}.{}", self.type_name, self.name)
    }
}

impl TestConfig {
    pub fn provider(&self, name: &str) -> Option<&DynamicValue> {
        self.providers.get(name)
    }

    pub fn resource(&self, address: &str) -> Option<&ResourceConfig> {
        self.resources.iter().find(|r| r.address() == address)
    }

    /// Parse `{"provider": {...}, "resource": {"<type>": {"<name>": {...}}}}`
    ///
    /// Anything else at the top level is rejected, including attributes
    /// that escaped their resource block.
    pub fn parse(source: &str) -> Result<Self, AccTestError> {
        let root: serde_json::Value = serde_json::from_str(source)
            .map_err(|e| AccTestError::Config(format!("invalid JSON configuration: {}", e)))?;

        let serde_json::Value::Object(blocks) = root else {
            return Err(AccTestError::Config(
                "configuration must be a JSON object".to_string(),
            ));
        };

        let mut config = TestConfig::default();
        for (block, body) in blocks {
            match block.as_str() {
                "provider" => {
                    for (name, body) in object_entries(&block, body)? {
                        config
                            .providers
                            .insert(name.clone(), object_value(&format!("provider.{}", name), body)?);
                    }
                }
                "resource" => {
                    for (type_name, instances) in object_entries(&block, body)? {
                        let path = format!("resource.{}", type_name);
                        for (name, body) in object_entries(&path, instances)? {
                            let address = format!("{}.{}", type_name, name);
                            config.resources.push(ResourceConfig {
                                type_name: type_name.clone(),
                                name,
                                config: object_value(&address, body)?,
                            });
                        }
                    }
                }
                "//" => {}
                other => {
                    return Err(AccTestError::Config(format!(
                        "unsupported top-level block \"{}\"; expected \"provider\" or \"resource\"",
                        other
                    )));
                }
            }
        }

        config.resources.sort_by_key(ResourceConfig::address);
        Ok(config)
    }
}

fn object_entries(
    path: &str,
    body: serde_json::Value,
) -> Result<serde_json::Map<String, serde_json::Value>, AccTestError> {
    match body {
        serde_json::Value::Object(entries) => Ok(entries),
        other => Err(AccTestError::Config(format!(
            "\"{}\" must be an object, got {}",
            path,
            json_type(&other)
        ))),
    }
}

fn object_value(path: &str, body: serde_json::Value) -> Result<DynamicValue, AccTestError> {
    let entries = object_entries(path, body)?;
    Ok(DynamicValue::new(Dynamic::from(serde_json::Value::Object(
        entries,
    ))))
}

fn json_type(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AttributePath;

    #[test]
    fn parses_provider_and_resources() {
        let config = TestConfig::parse(
            r#"{
                "provider": {"aws": {"region": "us-east-1"}},
                "resource": {
                    "aws_sns_application": {
                        "b": {"name": "second"},
                        "a": {"name": "first", "success_feedback_sample_rate": 100}
                    }
                }
            }"#,
        )
        .unwrap();

        assert_eq!(
            config
                .provider("aws")
                .unwrap()
                .get_string(&AttributePath::new("region"))
                .unwrap(),
            "us-east-1"
        );
        let addresses: Vec<String> = config.resources.iter().map(|r| r.address()).collect();
        assert_eq!(
            addresses,
            vec!["aws_sns_application.a", "aws_sns_application.b"]
        );
        let a = config.resource("aws_sns_application.a").unwrap();
        assert_eq!(
            a.config
                .get_number(&AttributePath::new("success_feedback_sample_rate"))
                .unwrap(),
            100.0
        );
    }

    #[test]
    fn rejects_attributes_outside_resource_block() {
        let err = TestConfig::parse(
            r#"{
                "name": "aws_sns_application_test",
                "resource": {"aws_sns_application": {"gcm_test": {}}}
            }"#,
        )
        .unwrap_err();

        assert!(matches!(err, AccTestError::Config(ref msg) if msg.contains("\"name\"")));
    }

    #[test]
    fn rejects_non_object_resource_body() {
        let err = TestConfig::parse(
            r#"{"resource": {"aws_sns_application": {"gcm_test": "platform = GCM"}}}"#,
        )
        .unwrap_err();

        assert!(err.to_string().contains("aws_sns_application.gcm_test"));
    }

    #[test]
    fn rejects_invalid_json() {
        assert!(matches!(
            TestConfig::parse("resource \"aws_sns_application\" \"x\" {}"),
            Err(AccTestError::Config(_))
        ));
    }

    #[test]
    fn credentials_are_injected_not_read() {
        let config = AccTestConfig::new()
            .enabled()
            .with_credential("GCM_API_KEY", "secret")
            .with_credential("EMPTY", "");

        assert!(config.enabled);
        assert_eq!(config.credential("GCM_API_KEY"), Some("secret"));
        assert_eq!(config.credential("EMPTY"), None);
        assert_eq!(config.credential_or_empty("MISSING"), "");
    }
}

//! Fixtures and helpers shared by the SNS application tests
#![allow(dead_code)]

use async_trait::async_trait;
use aws::api::{MemorySns, PlatformApplicationApi};
use aws::AwsProvider;
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tfplug::acctest::{
    check_resource_attr, compose_check, AccTestConfig, DestroyCheck, ProviderFactory, State,
    StateCheck,
};

pub const GCM_ADDRESS: &str = "aws_sns_application.gcm_test";
pub const APNS_ADDRESS: &str = "aws_sns_application.apns_test";
pub const APP_NAME: &str = "aws_sns_application_test";

pub const GCM_API_KEY: &str = "GCM_API_KEY";
pub const APNS_SANDBOX_CREDENTIAL: &str = "APNS_SANDBOX_CREDENTIAL";
pub const APNS_SANDBOX_PRINCIPAL: &str = "APNS_SANDBOX_PRINCIPAL";

const TOPIC_PREFIX: &str = "arn:aws:sns:us-east-1:638386993804";

/// Event topic attribute and the topic it points at
const TOPICS: [(&str, &str); 4] = [
    ("event_endpoint_created_topic_arn", "endpoint-created-topic"),
    ("event_endpoint_updated_topic_arn", "endpoint-updated-topic"),
    ("event_delivery_failure_topic_arn", "endpoint-failure-topic"),
    ("event_endpoint_deleted_topic_arn", "endpoint-deleted-topic"),
];

pub fn topic_arn(topic: &str, updated: bool) -> String {
    let suffix = if updated { "-update" } else { "" };
    format!("{}:{}{}", TOPIC_PREFIX, topic, suffix)
}

/// Config with fake credentials, enabled for in-process runs
pub fn memory_config() -> AccTestConfig {
    AccTestConfig::new()
        .enabled()
        .with_credential(GCM_API_KEY, "fake-gcm-api-key")
        .with_credential(APNS_SANDBOX_CREDENTIAL, "fake-apns-private-key")
        .with_credential(APNS_SANDBOX_PRINCIPAL, "fake-apns-certificate")
}

pub fn memory_provider(sns: Arc<MemorySns>) -> ProviderFactory {
    Box::new(move || Box::new(AwsProvider::with_backend(sns.clone())))
}

pub fn sdk_provider() -> ProviderFactory {
    Box::new(|| Box::new(AwsProvider::new()))
}

/// One `aws_sns_application` body, as written in a fixture
#[derive(Debug, Serialize)]
struct Application {
    name: &'static str,
    platform: &'static str,
    platform_credential: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    platform_principal: Option<String>,
    success_feedback_sample_rate: u32,
    #[serde(flatten)]
    topics: BTreeMap<&'static str, String>,
}

fn application(config: &AccTestConfig, platform: &'static str, updated: bool) -> Application {
    let (credential, principal) = if platform == "GCM" {
        (config.credential_or_empty(GCM_API_KEY), None)
    } else {
        (
            config.credential_or_empty(APNS_SANDBOX_CREDENTIAL),
            Some(config.credential_or_empty(APNS_SANDBOX_PRINCIPAL).to_string()),
        )
    };

    Application {
        name: APP_NAME,
        platform,
        platform_credential: credential.to_string(),
        platform_principal: principal,
        success_feedback_sample_rate: if updated { 99 } else { 100 },
        topics: TOPICS
            .iter()
            .map(|(attribute, topic)| (*attribute, topic_arn(topic, updated)))
            .collect(),
    }
}

fn document(name: &str, body: Application) -> String {
    json!({
        "provider": { "aws": { "region": "us-east-1" } },
        "resource": { "aws_sns_application": { name: body } }
    })
    .to_string()
}

pub fn gcm_config(config: &AccTestConfig) -> String {
    document("gcm_test", application(config, "GCM", false))
}

pub fn gcm_config_update(config: &AccTestConfig) -> String {
    document("gcm_test", application(config, "GCM", true))
}

pub fn apns_sandbox_config(config: &AccTestConfig) -> String {
    document("apns_test", application(config, "APNS_SANDBOX", false))
}

pub fn apns_sandbox_config_update(config: &AccTestConfig) -> String {
    document("apns_test", application(config, "APNS_SANDBOX", true))
}

/// The update fixture with its attributes spilled outside the resource block
pub fn gcm_config_update_malformed(config: &AccTestConfig) -> String {
    let mut root = match serde_json::to_value(application(config, "GCM", true)) {
        Ok(serde_json::Value::Object(root)) => root,
        _ => serde_json::Map::new(),
    };
    root.insert(
        "resource".to_string(),
        json!({ "aws_sns_application": { "gcm_test": {} } }),
    );
    serde_json::Value::Object(root).to_string()
}

/// The five attributes every scenario asserts after each apply
pub fn check_application(address: &str, platform: &str, updated: bool) -> Box<dyn StateCheck> {
    let sample_rate = if updated { "99" } else { "100" };
    let mut checks = vec![
        check_resource_attr(address, "name", APP_NAME),
        check_resource_attr(address, "platform", platform),
        check_resource_attr(address, "success_feedback_sample_rate", sample_rate),
    ];
    for (attribute, topic) in TOPICS {
        checks.push(check_resource_attr(address, attribute, &topic_arn(topic, updated)));
    }
    compose_check(checks)
}

/// Every application left in state must be gone. Deletes what it finds,
/// so a failed teardown leaves nothing behind either.
pub struct ApplicationsDestroyed {
    pub sns: Arc<dyn PlatformApplicationApi>,
}

#[async_trait]
impl DestroyCheck for ApplicationsDestroyed {
    async fn check_destroy(&self, state: &State) -> Result<(), String> {
        for resource in state.resources_of_type("aws_sns_application") {
            let Some(arn) = resource.id() else {
                continue;
            };
            match self.sns.delete_platform_application(&arn).await {
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e.to_string()),
                Ok(()) => {
                    return Err(format!(
                        "{} still existed after destroy: {}",
                        resource.address(),
                        arn
                    ))
                }
            }
        }
        Ok(())
    }
}

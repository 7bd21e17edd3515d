//! SNS platform application API
//!
//! `PlatformApplicationApi` is the seam between the resource and SNS. The
//! SDK-backed `Client` talks to AWS; `MemorySns` keeps applications in
//! process with the same observable behavior for tests.

pub mod arn;
pub mod client;
pub mod error;
pub mod memory;

pub use arn::PlatformApplicationArn;
pub use client::Client;
pub use error::ApiError;
pub use memory::MemorySns;

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// SNS attribute keys for platform applications
pub mod attributes {
    pub const PLATFORM_CREDENTIAL: &str = "PlatformCredential";
    pub const PLATFORM_PRINCIPAL: &str = "PlatformPrincipal";
    pub const EVENT_ENDPOINT_CREATED: &str = "EventEndpointCreated";
    pub const EVENT_ENDPOINT_UPDATED: &str = "EventEndpointUpdated";
    pub const EVENT_ENDPOINT_DELETED: &str = "EventEndpointDeleted";
    pub const EVENT_DELIVERY_FAILURE: &str = "EventDeliveryFailure";
    pub const SUCCESS_FEEDBACK_SAMPLE_RATE: &str = "SuccessFeedbackSampleRate";
    pub const SUCCESS_FEEDBACK_ROLE_ARN: &str = "SuccessFeedbackRoleArn";
    pub const FAILURE_FEEDBACK_ROLE_ARN: &str = "FailureFeedbackRoleArn";
}

/// Push notification service a platform application delivers through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Adm,
    Apns,
    ApnsSandbox,
    Baidu,
    Gcm,
    Mpns,
    Wns,
}

impl Platform {
    pub const ALL: [Platform; 7] = [
        Platform::Adm,
        Platform::Apns,
        Platform::ApnsSandbox,
        Platform::Baidu,
        Platform::Gcm,
        Platform::Mpns,
        Platform::Wns,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Adm => "ADM",
            Platform::Apns => "APNS",
            Platform::ApnsSandbox => "APNS_SANDBOX",
            Platform::Baidu => "BAIDU",
            Platform::Gcm => "GCM",
            Platform::Mpns => "MPNS",
            Platform::Wns => "WNS",
        }
    }

    /// Certificate and keypair platforms authenticate with a principal as
    /// well as a credential
    pub fn requires_principal(&self) -> bool {
        matches!(
            self,
            Platform::Adm | Platform::Apns | Platform::ApnsSandbox | Platform::Baidu | Platform::Wns
        )
    }

    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(Platform::as_str).collect()
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| {
                ApiError::Validation(format!(
                    "unsupported platform \"{}\", expected one of: {}",
                    s,
                    Self::names().join(", ")
                ))
            })
    }
}

#[derive(Debug, Clone)]
pub struct CreatePlatformApplicationRequest {
    pub name: String,
    pub platform: Platform,
    /// SNS attributes, including credential and principal
    pub attributes: HashMap<String, String>,
}

impl CreatePlatformApplicationRequest {
    /// Local checks SNS would otherwise reject remotely
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.name.is_empty() {
            return Err(ApiError::Validation("name must not be empty".to_string()));
        }
        let has = |key: &str| self.attributes.get(key).is_some_and(|v| !v.is_empty());
        if !has(attributes::PLATFORM_CREDENTIAL) {
            return Err(ApiError::Validation(format!(
                "platform_credential is required for platform {}",
                self.platform
            )));
        }
        if self.platform.requires_principal() && !has(attributes::PLATFORM_PRINCIPAL) {
            return Err(ApiError::Validation(format!(
                "platform_principal is required for platform {}",
                self.platform
            )));
        }
        Ok(())
    }
}

/// CRUD calls for SNS platform applications, keyed by ARN
#[async_trait]
pub trait PlatformApplicationApi: Send + Sync {
    /// Returns the ARN SNS assigned
    async fn create_platform_application(
        &self,
        request: &CreatePlatformApplicationRequest,
    ) -> Result<String, ApiError>;

    /// Current attributes. Credential and principal are never returned.
    async fn get_platform_application_attributes(
        &self,
        arn: &str,
    ) -> Result<HashMap<String, String>, ApiError>;

    /// An empty value clears the attribute
    async fn set_platform_application_attributes(
        &self,
        arn: &str,
        attributes: HashMap<String, String>,
    ) -> Result<(), ApiError>;

    async fn delete_platform_application(&self, arn: &str) -> Result<(), ApiError>;
}

//! In-process SNS backend
//!
//! Behaves like SNS where the resource can observe it: ARNs are derived from
//! region, account, platform and name; credentials are write-only; empty
//! values clear attributes; missing applications answer `NotFound`.

use super::arn::PlatformApplicationArn;
use super::attributes::{PLATFORM_CREDENTIAL, PLATFORM_PRINCIPAL};
use super::{ApiError, CreatePlatformApplicationRequest, PlatformApplicationApi};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

const DEFAULT_REGION: &str = "us-east-1";
const DEFAULT_ACCOUNT: &str = "123456789012";

pub struct MemorySns {
    region: String,
    account: String,
    applications: RwLock<HashMap<String, HashMap<String, String>>>,
    requests: AtomicUsize,
}

impl Default for MemorySns {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySns {
    pub fn new() -> Self {
        Self::with_account(DEFAULT_REGION, DEFAULT_ACCOUNT)
    }

    pub fn with_account(region: &str, account: &str) -> Self {
        Self {
            region: region.to_string(),
            account: account.to_string(),
            applications: RwLock::new(HashMap::new()),
            requests: AtomicUsize::new(0),
        }
    }

    /// Number of API calls served so far
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub async fn contains(&self, arn: &str) -> bool {
        self.applications.read().await.contains_key(arn)
    }

    pub async fn len(&self) -> usize {
        self.applications.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Every stored attribute, credential and principal included
    pub async fn raw_attributes(&self, arn: &str) -> Option<HashMap<String, String>> {
        self.applications.read().await.get(arn).cloned()
    }

    /// Delete behind the caller's back, as another actor would
    pub async fn remove_out_of_band(&self, arn: &str) -> bool {
        self.applications.write().await.remove(arn).is_some()
    }

    fn record(&self, operation: &str, arn: &str) {
        self.requests.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(operation, arn, "memory sns request");
    }
}

fn merge(stored: &mut HashMap<String, String>, attributes: HashMap<String, String>) {
    for (key, value) in attributes {
        if value.is_empty() {
            stored.remove(&key);
        } else {
            stored.insert(key, value);
        }
    }
}

fn not_found(arn: &str) -> ApiError {
    ApiError::NotFound {
        arn: arn.to_string(),
    }
}

#[async_trait]
impl PlatformApplicationApi for MemorySns {
    async fn create_platform_application(
        &self,
        request: &CreatePlatformApplicationRequest,
    ) -> Result<String, ApiError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(
            operation = "CreatePlatformApplication",
            name = %request.name,
            "memory sns request"
        );
        request.validate().map_err(|e| ApiError::Remote {
            operation: "CreatePlatformApplication",
            code: "InvalidParameter".to_string(),
            message: e.to_string(),
        })?;

        let arn = PlatformApplicationArn::new(
            &self.region,
            &self.account,
            request.platform.as_str(),
            &request.name,
        )
        .to_string();

        // Creating an existing name again returns the same application
        let mut applications = self.applications.write().await;
        let stored = applications.entry(arn.clone()).or_default();
        merge(stored, request.attributes.clone());
        Ok(arn)
    }

    async fn get_platform_application_attributes(
        &self,
        arn: &str,
    ) -> Result<HashMap<String, String>, ApiError> {
        self.record("GetPlatformApplicationAttributes", arn);
        let applications = self.applications.read().await;
        let stored = applications.get(arn).ok_or_else(|| not_found(arn))?;

        let mut attributes: HashMap<String, String> = stored
            .iter()
            .filter(|(key, _)| *key != PLATFORM_CREDENTIAL && *key != PLATFORM_PRINCIPAL)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        attributes.insert("Enabled".to_string(), "true".to_string());
        Ok(attributes)
    }

    async fn set_platform_application_attributes(
        &self,
        arn: &str,
        attributes: HashMap<String, String>,
    ) -> Result<(), ApiError> {
        self.record("SetPlatformApplicationAttributes", arn);
        if attributes.is_empty() {
            return Err(ApiError::Remote {
                operation: "SetPlatformApplicationAttributes",
                code: "InvalidParameter".to_string(),
                message: "Invalid parameter: Attributes must not be empty".to_string(),
            });
        }
        let mut applications = self.applications.write().await;
        let stored = applications.get_mut(arn).ok_or_else(|| not_found(arn))?;
        merge(stored, attributes);
        Ok(())
    }

    async fn delete_platform_application(&self, arn: &str) -> Result<(), ApiError> {
        self.record("DeletePlatformApplication", arn);
        self.applications
            .write()
            .await
            .remove(arn)
            .map(|_| ())
            .ok_or_else(|| not_found(arn))
    }
}

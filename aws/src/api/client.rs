use super::{ApiError, CreatePlatformApplicationRequest, PlatformApplicationApi};
use crate::config::ProviderConfig;
use async_trait::async_trait;
use aws_sdk_sns::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use std::collections::HashMap;

/// SNS client backed by the AWS SDK
#[derive(Clone, Debug)]
pub struct Client {
    sns: aws_sdk_sns::Client,
}

impl Client {
    pub fn new(sns: aws_sdk_sns::Client) -> Self {
        Self { sns }
    }

    pub fn from_conf(conf: aws_sdk_sns::Config) -> Self {
        Self::new(aws_sdk_sns::Client::from_conf(conf))
    }

    /// Resolve credentials and region the way the provider block asks:
    /// static keys win over a named profile, which wins over the default chain
    pub async fn from_config(config: &ProviderConfig) -> Result<Self, ApiError> {
        let retry = aws_config::retry::RetryConfig::standard()
            .with_max_attempts(config.max_retries.saturating_add(1));

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()))
            .retry_config(retry);

        match (&config.access_key, &config.secret_key, &config.profile) {
            (Some(access_key), Some(secret_key), _) => {
                loader = loader.credentials_provider(aws_sdk_sns::config::Credentials::new(
                    access_key,
                    secret_key,
                    None,
                    None,
                    "terraform-provider-aws",
                ));
            }
            (None, None, Some(profile)) => {
                loader = loader.profile_name(profile);
            }
            (None, None, None) => {}
            _ => {
                return Err(ApiError::Config(
                    "access_key and secret_key must be set together".to_string(),
                ));
            }
        }

        let sdk_config = loader.load().await;
        let mut builder = aws_sdk_sns::config::Builder::from(&sdk_config);
        if let Some(endpoint) = &config.sns_endpoint {
            builder = builder.endpoint_url(endpoint.as_str());
        }

        tracing::debug!(region = %config.region, endpoint = ?config.sns_endpoint.as_ref().map(|u| u.as_str()), "configured SNS client");
        Ok(Self::from_conf(builder.build()))
    }
}

fn classify<E, R>(operation: &'static str, arn: Option<&str>, err: SdkError<E, R>) -> ApiError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    match err.code() {
        Some(code) => {
            let message = err.message().unwrap_or_default().to_string();
            ApiError::from_code(operation, arn, code, &message)
        }
        None => ApiError::Remote {
            operation,
            code: "Unknown".to_string(),
            message: DisplayErrorContext(&err).to_string(),
        },
    }
}

#[async_trait]
impl PlatformApplicationApi for Client {
    async fn create_platform_application(
        &self,
        request: &CreatePlatformApplicationRequest,
    ) -> Result<String, ApiError> {
        tracing::debug!(name = %request.name, platform = %request.platform, "CreatePlatformApplication");
        let output = self
            .sns
            .create_platform_application()
            .name(&request.name)
            .platform(request.platform.as_str())
            .set_attributes(Some(request.attributes.clone()))
            .send()
            .await
            .map_err(|e| classify("CreatePlatformApplication", None, e))?;

        output
            .platform_application_arn()
            .map(str::to_string)
            .ok_or_else(|| ApiError::Remote {
                operation: "CreatePlatformApplication",
                code: "MissingArn".to_string(),
                message: "response did not include PlatformApplicationArn".to_string(),
            })
    }

    async fn get_platform_application_attributes(
        &self,
        arn: &str,
    ) -> Result<HashMap<String, String>, ApiError> {
        tracing::debug!(arn, "GetPlatformApplicationAttributes");
        let output = self
            .sns
            .get_platform_application_attributes()
            .platform_application_arn(arn)
            .send()
            .await
            .map_err(|e| classify("GetPlatformApplicationAttributes", Some(arn), e))?;

        Ok(output.attributes().cloned().unwrap_or_default())
    }

    async fn set_platform_application_attributes(
        &self,
        arn: &str,
        attributes: HashMap<String, String>,
    ) -> Result<(), ApiError> {
        let mut keys: Vec<&String> = attributes.keys().collect();
        keys.sort();
        tracing::debug!(arn, ?keys, "SetPlatformApplicationAttributes");

        self.sns
            .set_platform_application_attributes()
            .platform_application_arn(arn)
            .set_attributes(Some(attributes))
            .send()
            .await
            .map_err(|e| classify("SetPlatformApplicationAttributes", Some(arn), e))?;
        Ok(())
    }

    async fn delete_platform_application(&self, arn: &str) -> Result<(), ApiError> {
        tracing::debug!(arn, "DeletePlatformApplication");
        self.sns
            .delete_platform_application()
            .platform_application_arn(arn)
            .send()
            .await
            .map_err(|e| classify("DeletePlatformApplication", Some(arn), e))?;
        Ok(())
    }
}

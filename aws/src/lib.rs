pub mod api;
pub mod config;
pub mod provider_data;
pub mod resources;

pub use provider_data::AwsProviderData;

use api::PlatformApplicationApi;
use async_trait::async_trait;
use config::ProviderConfig;
use std::collections::HashMap;
use std::sync::Arc;
use tfplug::context::Context;
use tfplug::provider::{
    ConfigureProviderRequest, ConfigureProviderResponse, Provider, ProviderSchemaRequest,
    ProviderSchemaResponse, ResourceFactory,
};
use tfplug::resource::ResourceWithConfigure;
use tfplug::schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::types::Diagnostic;
use tfplug::validator::{NumberRangeValidator, StringPatternValidator};

pub struct AwsProvider {
    /// Replaces the SDK client when set, e.g. with `api::MemorySns`
    backend: Option<Arc<dyn PlatformApplicationApi>>,
}

impl Default for AwsProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl AwsProvider {
    pub fn new() -> Self {
        Self { backend: None }
    }

    pub fn with_backend(backend: Arc<dyn PlatformApplicationApi>) -> Self {
        Self {
            backend: Some(backend),
        }
    }

    pub fn schema_static() -> Schema {
        SchemaBuilder::new()
            .description("AWS provider for SNS platform applications")
            .attribute(
                AttributeBuilder::new("region", AttributeType::String)
                    .description("AWS region, e.g. us-east-1")
                    .required()
                    .validator(StringPatternValidator::new(
                        r"^[a-z]{2}(-[a-z]+)+-\d+$",
                        "an AWS region name",
                    ))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("access_key", AttributeType::String)
                    .description("Static access key, set together with secret_key")
                    .optional()
                    .sensitive()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("secret_key", AttributeType::String)
                    .description("Static secret key, set together with access_key")
                    .optional()
                    .sensitive()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("profile", AttributeType::String)
                    .description("Named profile from the shared config files")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("sns_endpoint", AttributeType::String)
                    .description("Custom SNS endpoint URL")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("max_retries", AttributeType::Number)
                    .description("Maximum number of retries for throttled or failed calls")
                    .optional()
                    .validator(NumberRangeValidator::between(0.0, 25.0).whole())
                    .build(),
            )
            .build()
    }
}

#[async_trait]
impl Provider for AwsProvider {
    fn type_name(&self) -> &str {
        "aws"
    }

    async fn schema(&self, _ctx: Context, _request: ProviderSchemaRequest) -> ProviderSchemaResponse {
        ProviderSchemaResponse {
            schema: Self::schema_static(),
            diagnostics: vec![],
        }
    }

    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureProviderRequest,
    ) -> ConfigureProviderResponse {
        let config = match ProviderConfig::from_dynamic(&request.config) {
            Ok(config) => config,
            Err(diagnostics) => {
                return ConfigureProviderResponse {
                    diagnostics,
                    provider_data: None,
                }
            }
        };

        let sns: Arc<dyn PlatformApplicationApi> = match &self.backend {
            Some(backend) => backend.clone(),
            None => match api::Client::from_config(&config).await {
                Ok(client) => Arc::new(client),
                Err(e) => {
                    return ConfigureProviderResponse {
                        diagnostics: vec![Diagnostic::error(
                            "Failed to create SNS client",
                            e.to_string(),
                        )],
                        provider_data: None,
                    }
                }
            },
        };

        tracing::info!(
            region = %config.region,
            host = %request.terraform_version,
            "configured aws provider"
        );

        ConfigureProviderResponse {
            diagnostics: vec![],
            provider_data: Some(Arc::new(AwsProviderData::new(sns, config.region))),
        }
    }

    fn resources(&self) -> HashMap<String, ResourceFactory> {
        let mut factories: HashMap<String, ResourceFactory> = HashMap::new();
        factories.insert(
            resources::sns_application::TYPE_NAME.to_string(),
            Box::new(|| {
                Box::new(resources::SnsApplicationResource::new()) as Box<dyn ResourceWithConfigure>
            }),
        );
        factories
    }
}

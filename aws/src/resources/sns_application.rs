//! SNS platform application resource implementation

use crate::api::attributes::{
    EVENT_DELIVERY_FAILURE, EVENT_ENDPOINT_CREATED, EVENT_ENDPOINT_DELETED,
    EVENT_ENDPOINT_UPDATED, FAILURE_FEEDBACK_ROLE_ARN, PLATFORM_CREDENTIAL, PLATFORM_PRINCIPAL,
    SUCCESS_FEEDBACK_ROLE_ARN, SUCCESS_FEEDBACK_SAMPLE_RATE,
};
use crate::api::{
    ApiError, CreatePlatformApplicationRequest, Platform, PlatformApplicationApi,
    PlatformApplicationArn,
};
use crate::AwsProviderData;
use async_trait::async_trait;
use std::collections::HashMap;
use tfplug::context::Context;
use tfplug::import::import_state_passthrough_id;
use tfplug::plan_modifier::{RequiresReplaceIfChanged, UseStateForUnknown};
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceSchemaRequest, ResourceSchemaResponse,
    ResourceWithConfigure, UpdateResourceRequest, UpdateResourceResponse,
    ValidateResourceConfigRequest, ValidateResourceConfigResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, Schema, SchemaBuilder};
use tfplug::types::{format_number, AttributePath, Diagnostic, Dynamic, DynamicValue};
use tfplug::validator::{
    NumberRangeValidator, StringLengthValidator, StringOneOfValidator, StringPatternValidator,
};

pub const TYPE_NAME: &str = "aws_sns_application";

const NAME_PATTERN: &str = r"^[A-Za-z0-9_.\-]*$";
const TOPIC_ARN_PATTERN: &str = r"^arn:[a-z\-]+:sns:[a-z0-9\-]+:\d{12}:[A-Za-z0-9_\-]{1,256}$";
const ROLE_ARN_PATTERN: &str = r"^arn:[a-z\-]+:iam::\d{12}:role/[A-Za-z0-9+=,.@_/\-]+$";

/// Optional string attributes stored as SNS attributes, by attribute name
const STRING_ATTRIBUTES: [(&str, &str); 6] = [
    ("event_endpoint_created_topic_arn", EVENT_ENDPOINT_CREATED),
    ("event_endpoint_updated_topic_arn", EVENT_ENDPOINT_UPDATED),
    ("event_endpoint_deleted_topic_arn", EVENT_ENDPOINT_DELETED),
    ("event_delivery_failure_topic_arn", EVENT_DELIVERY_FAILURE),
    ("success_feedback_role_arn", SUCCESS_FEEDBACK_ROLE_ARN),
    ("failure_feedback_role_arn", FAILURE_FEEDBACK_ROLE_ARN),
];

const SAMPLE_RATE: &str = "success_feedback_sample_rate";

fn path(name: &str) -> AttributePath {
    AttributePath::new(name)
}

#[derive(Default)]
pub struct SnsApplicationResource {
    provider_data: Option<AwsProviderData>,
}

impl SnsApplicationResource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schema_static() -> Schema {
        let mut builder = SchemaBuilder::new()
            .version(0)
            .description("Provides an SNS platform application resource")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("ARN of the platform application")
                    .computed()
                    .plan_modifier(UseStateForUnknown)
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("arn", AttributeType::String)
                    .description("ARN of the platform application")
                    .computed()
                    .plan_modifier(UseStateForUnknown)
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("name", AttributeType::String)
                    .description("Friendly name of the application")
                    .required()
                    .validator(StringLengthValidator {
                        min: Some(1),
                        max: Some(256),
                    })
                    .validator(StringPatternValidator::new(
                        NAME_PATTERN,
                        "letters, digits, underscores, hyphens and periods only",
                    ))
                    .plan_modifier(RequiresReplaceIfChanged)
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("platform", AttributeType::String)
                    .description("Push notification service, e.g. APNS or GCM")
                    .required()
                    .validator(StringOneOfValidator::new(Platform::names()))
                    .plan_modifier(RequiresReplaceIfChanged)
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("platform_credential", AttributeType::String)
                    .description("Application private key or API key, depending on the platform")
                    .required()
                    .sensitive()
                    .validator(StringLengthValidator {
                        min: Some(1),
                        max: None,
                    })
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("platform_principal", AttributeType::String)
                    .description("Application certificate or principal, required by APNS, ADM, Baidu and WNS")
                    .optional()
                    .sensitive()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(SAMPLE_RATE, AttributeType::Number)
                    .description("Percentage of successful deliveries to log (0-100)")
                    .optional()
                    .validator(NumberRangeValidator::between(0.0, 100.0).whole())
                    .build(),
            );

        for (name, _) in STRING_ATTRIBUTES {
            let (pattern, what) = if name.ends_with("_topic_arn") {
                (TOPIC_ARN_PATTERN, "an SNS topic ARN")
            } else {
                (ROLE_ARN_PATTERN, "an IAM role ARN")
            };
            builder = builder.attribute(
                AttributeBuilder::new(name, AttributeType::String)
                    .optional()
                    .validator(StringPatternValidator::new(pattern, what))
                    .build(),
            );
        }

        builder.build()
    }

    fn sns(&self) -> Result<&dyn PlatformApplicationApi, Diagnostic> {
        self.provider_data
            .as_ref()
            .map(|data| data.sns.as_ref())
            .ok_or_else(|| {
                Diagnostic::error(
                    "Provider not configured",
                    "Provider data was not properly configured",
                )
            })
    }
}

/// Configured values of one application, as far as SNS cares
#[derive(Debug, Clone, PartialEq)]
struct ApplicationConfig {
    name: String,
    platform: Platform,
    credential: String,
    principal: Option<String>,
    sample_rate: Option<f64>,
    strings: Vec<(&'static str, Option<String>)>,
}

impl ApplicationConfig {
    fn from_value(value: &DynamicValue) -> Result<Self, Diagnostic> {
        let required = |name: &str| {
            value
                .get_optional_string(&path(name))
                .ok()
                .flatten()
                .filter(|v| !v.is_empty())
                .ok_or_else(|| {
                    Diagnostic::error(
                        format!("Missing {}", name),
                        format!("The '{}' attribute is required", name),
                    )
                    .with_attribute(path(name))
                })
        };
        let optional = |name: &str| value.get_optional_string(&path(name)).ok().flatten();

        let name = required("name")?;
        let platform = required("platform")?
            .parse::<Platform>()
            .map_err(|e| Diagnostic::error("Invalid platform", e.to_string()).with_attribute(path("platform")))?;
        let credential = required("platform_credential")?;
        let principal = optional("platform_principal").filter(|v| !v.is_empty());
        let sample_rate = value.get_optional_number(&path(SAMPLE_RATE)).ok().flatten();
        let strings = STRING_ATTRIBUTES
            .iter()
            .map(|(attr, _)| (*attr, optional(*attr).filter(|v| !v.is_empty())))
            .collect();

        Ok(Self {
            name,
            platform,
            credential,
            principal,
            sample_rate,
            strings,
        })
    }

    fn check_principal(&self) -> Result<(), Diagnostic> {
        if self.platform.requires_principal() && self.principal.is_none() {
            return Err(principal_required(self.platform));
        }
        Ok(())
    }

    /// Everything SNS should hold for this config, for create
    fn create_attributes(&self) -> HashMap<String, String> {
        let mut attributes = HashMap::from([(
            PLATFORM_CREDENTIAL.to_string(),
            self.credential.clone(),
        )]);
        if let Some(principal) = &self.principal {
            attributes.insert(PLATFORM_PRINCIPAL.to_string(), principal.clone());
        }
        if let Some(rate) = self.sample_rate {
            attributes.insert(SUCCESS_FEEDBACK_SAMPLE_RATE.to_string(), format_number(rate));
        }
        for ((_, key), (_, value)) in STRING_ATTRIBUTES.iter().zip(&self.strings) {
            if let Some(value) = value {
                attributes.insert(key.to_string(), value.clone());
            }
        }
        attributes
    }

    /// Only what differs from `prior`; cleared values are sent empty.
    /// Credential and principal travel together because SNS validates them
    /// as a pair.
    fn changed_attributes(&self, prior: &ApplicationConfig) -> HashMap<String, String> {
        let mut attributes = HashMap::new();

        if self.credential != prior.credential || self.principal != prior.principal {
            attributes.insert(PLATFORM_CREDENTIAL.to_string(), self.credential.clone());
            if let Some(principal) = &self.principal {
                attributes.insert(PLATFORM_PRINCIPAL.to_string(), principal.clone());
            }
        }

        if self.sample_rate != prior.sample_rate {
            attributes.insert(
                SUCCESS_FEEDBACK_SAMPLE_RATE.to_string(),
                self.sample_rate.map(format_number).unwrap_or_default(),
            );
        }

        for (((_, key), (_, after)), (_, before)) in STRING_ATTRIBUTES
            .iter()
            .zip(&self.strings)
            .zip(&prior.strings)
        {
            if after != before {
                attributes.insert(key.to_string(), after.clone().unwrap_or_default());
            }
        }
        attributes
    }
}

fn principal_required(platform: Platform) -> Diagnostic {
    Diagnostic::error(
        "Missing platform_principal",
        format!("platform_principal is required when platform is {}", platform),
    )
    .with_attribute(path("platform_principal"))
}

fn arn_from_state(state: &DynamicValue) -> Result<String, Diagnostic> {
    ["arn", "id"]
        .iter()
        .find_map(|name| {
            state
                .get_optional_string(&path(name))
                .ok()
                .flatten()
                .filter(|v| !v.is_empty())
        })
        .ok_or_else(|| Diagnostic::error("Missing ARN", "No ARN found in resource state"))
}

/// Overlay what SNS reports onto `base`. Name and platform come from the ARN;
/// credential and principal are write-only and keep their `base` values.
fn merge_remote(
    base: &DynamicValue,
    arn: &str,
    remote: &HashMap<String, String>,
) -> Result<DynamicValue, Diagnostic> {
    let parsed: PlatformApplicationArn = arn
        .parse()
        .map_err(|e: ApiError| Diagnostic::error("Invalid ARN", e.to_string()))?;
    let to_diag = |e: tfplug::TfplugError| Diagnostic::error("Failed to build state", e.to_string());

    let mut state = DynamicValue::object();
    if let Some(fields) = base.attributes() {
        for (key, value) in fields {
            state.set_value(&path(key), value.clone()).map_err(to_diag)?;
        }
    }

    state.set_string(&path("id"), arn).map_err(to_diag)?;
    state.set_string(&path("arn"), arn).map_err(to_diag)?;
    state.set_string(&path("name"), parsed.name).map_err(to_diag)?;
    state.set_string(&path("platform"), parsed.platform).map_err(to_diag)?;

    for name in ["platform_credential", "platform_principal"] {
        if state.get(&path(name)).is_err() {
            state.set_null(&path(name)).map_err(to_diag)?;
        }
    }

    let rate = remote
        .get(SUCCESS_FEEDBACK_SAMPLE_RATE)
        .and_then(|v| v.parse::<f64>().ok());
    let set_rate = match rate {
        Some(rate) => state.set_number(&path(SAMPLE_RATE), rate),
        None => state.set_null(&path(SAMPLE_RATE)),
    };
    set_rate.map_err(to_diag)?;

    for (name, key) in STRING_ATTRIBUTES {
        let set = match remote.get(key).filter(|v| !v.is_empty()) {
            Some(value) => state.set_string(&path(name), value.clone()),
            None => state.set_null(&path(name)),
        };
        set.map_err(to_diag)?;
    }

    Ok(state)
}

#[async_trait]
impl Resource for SnsApplicationResource {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    async fn schema(&self, _ctx: Context, _request: ResourceSchemaRequest) -> ResourceSchemaResponse {
        ResourceSchemaResponse {
            schema: Self::schema_static(),
            diagnostics: vec![],
        }
    }

    async fn validate(
        &self,
        _ctx: Context,
        request: ValidateResourceConfigRequest,
    ) -> ValidateResourceConfigResponse {
        let mut diagnostics = vec![];

        // Unknown values are settled at apply time
        let platform = request.config.get(&path("platform")).ok().and_then(Dynamic::as_str);
        let principal = request.config.get(&path("platform_principal")).ok();
        if let Some(Ok(platform)) = platform.map(str::parse::<Platform>) {
            let principal_missing = match principal {
                None | Some(Dynamic::Null) => true,
                Some(Dynamic::String(s)) => s.is_empty(),
                Some(_) => false,
            };
            if platform.requires_principal() && principal_missing {
                diagnostics.push(principal_required(platform));
            }
        }

        ValidateResourceConfigResponse { diagnostics }
    }

    async fn create(&self, _ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let failed = |diagnostic: Diagnostic, state: DynamicValue| CreateResourceResponse {
            new_state: state,
            diagnostics: vec![diagnostic],
        };

        let sns = match self.sns() {
            Ok(sns) => sns,
            Err(diag) => return failed(diag, request.planned_state),
        };
        let config = match ApplicationConfig::from_value(&request.config) {
            Ok(config) => config,
            Err(diag) => return failed(diag, request.planned_state),
        };
        if let Err(diag) = config.check_principal() {
            return failed(diag, request.planned_state);
        }

        let create_request = CreatePlatformApplicationRequest {
            name: config.name.clone(),
            platform: config.platform,
            attributes: config.create_attributes(),
        };
        if let Err(e) = create_request.validate() {
            return failed(
                Diagnostic::error("Invalid SNS application", e.to_string()),
                request.planned_state,
            );
        }

        let arn = match sns.create_platform_application(&create_request).await {
            Ok(arn) => arn,
            Err(e) => {
                return failed(
                    Diagnostic::error("Error creating SNS application", e.to_string()),
                    request.planned_state,
                )
            }
        };
        tracing::info!(%arn, platform = %config.platform, "created SNS platform application");

        let mut diagnostics = vec![];
        let remote = match sns.get_platform_application_attributes(&arn).await {
            Ok(remote) => remote,
            Err(e) => {
                // The application exists; keep it in state and let refresh settle it
                diagnostics.push(Diagnostic::warning(
                    "Unable to read SNS application after create",
                    e.to_string(),
                ));
                create_request.attributes
            }
        };

        match merge_remote(&request.config, &arn, &remote) {
            Ok(new_state) => CreateResourceResponse {
                new_state,
                diagnostics,
            },
            Err(diag) => failed(diag, request.planned_state),
        }
    }

    async fn read(&self, _ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let current = request.current_state;
        let unchanged = |diagnostic: Diagnostic, state: DynamicValue| ReadResourceResponse {
            new_state: Some(state),
            diagnostics: vec![diagnostic],
        };

        let sns = match self.sns() {
            Ok(sns) => sns,
            Err(diag) => return unchanged(diag, current),
        };
        let arn = match arn_from_state(&current) {
            Ok(arn) => arn,
            Err(diag) => return unchanged(diag, current),
        };

        match sns.get_platform_application_attributes(&arn).await {
            Ok(remote) => match merge_remote(&current, &arn, &remote) {
                Ok(state) => ReadResourceResponse {
                    new_state: Some(state),
                    diagnostics: vec![],
                },
                Err(diag) => unchanged(diag, current),
            },
            Err(e) if e.is_not_found() => {
                tracing::warn!(%arn, "SNS application not found, removing from state");
                ReadResourceResponse {
                    new_state: None,
                    diagnostics: vec![],
                }
            }
            Err(e) => unchanged(
                Diagnostic::error("Error reading SNS application", e.to_string()),
                current,
            ),
        }
    }

    async fn update(&self, _ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let failed = |diagnostic: Diagnostic, state: DynamicValue| UpdateResourceResponse {
            new_state: state,
            diagnostics: vec![diagnostic],
        };

        let sns = match self.sns() {
            Ok(sns) => sns,
            Err(diag) => return failed(diag, request.prior_state),
        };
        let arn = match arn_from_state(&request.prior_state) {
            Ok(arn) => arn,
            Err(diag) => return failed(diag, request.prior_state),
        };
        let config = match ApplicationConfig::from_value(&request.config) {
            Ok(config) => config,
            Err(diag) => return failed(diag, request.prior_state),
        };
        if let Err(diag) = config.check_principal() {
            return failed(diag, request.prior_state);
        }

        // An imported state has no credential to compare against
        let changes = match ApplicationConfig::from_value(&request.prior_state) {
            Ok(prior) => config.changed_attributes(&prior),
            Err(_) => config.create_attributes(),
        };
        if !changes.is_empty() {
            let mut keys: Vec<&String> = changes.keys().collect();
            keys.sort();
            tracing::info!(%arn, ?keys, "updating SNS platform application");
            if let Err(e) = sns.set_platform_application_attributes(&arn, changes).await {
                return failed(
                    Diagnostic::error("Error updating SNS application", e.to_string()),
                    request.prior_state,
                );
            }
        }

        match sns.get_platform_application_attributes(&arn).await {
            Ok(remote) => match merge_remote(&request.config, &arn, &remote) {
                Ok(new_state) => UpdateResourceResponse {
                    new_state,
                    diagnostics: vec![],
                },
                Err(diag) => failed(diag, request.prior_state),
            },
            Err(e) => failed(
                Diagnostic::error("Error reading SNS application after update", e.to_string()),
                request.planned_state,
            ),
        }
    }

    async fn delete(&self, _ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let sns = match self.sns() {
            Ok(sns) => sns,
            Err(diag) => {
                return DeleteResourceResponse {
                    diagnostics: vec![diag],
                }
            }
        };
        let arn = match arn_from_state(&request.prior_state) {
            Ok(arn) => arn,
            // Never created, nothing to delete
            Err(_) => return DeleteResourceResponse { diagnostics: vec![] },
        };

        let diagnostics = match sns.delete_platform_application(&arn).await {
            Ok(()) => {
                tracing::info!(%arn, "deleted SNS platform application");
                vec![]
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!(%arn, "SNS application already deleted");
                vec![]
            }
            Err(e) => vec![Diagnostic::error(
                "Error deleting SNS application",
                e.to_string(),
            )],
        };
        DeleteResourceResponse { diagnostics }
    }

    async fn import_state(
        &self,
        _ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        if let Err(e) = request.id.parse::<PlatformApplicationArn>() {
            return ImportResourceStateResponse {
                imported_resources: vec![],
                diagnostics: vec![Diagnostic::error("Invalid import ID", e.to_string())],
            };
        }
        import_state_passthrough_id(&[path("id"), path("arn")], &request)
    }
}

#[async_trait]
impl ResourceWithConfigure for SnsApplicationResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        let mut diagnostics = vec![];

        if let Some(data) = request.provider_data {
            if let Some(provider_data) = data.downcast_ref::<AwsProviderData>() {
                self.provider_data = Some(provider_data.clone());
            } else {
                diagnostics.push(Diagnostic::error(
                    "Invalid provider data",
                    "Failed to extract AwsProviderData from provider data",
                ));
            }
        } else {
            diagnostics.push(Diagnostic::error(
                "No provider data",
                "No provider data was provided to the resource",
            ));
        }

        ConfigureResourceResponse { diagnostics }
    }
}

#[cfg(test)]
#[path = "./sns_application_test.rs"]
mod sns_application_test;

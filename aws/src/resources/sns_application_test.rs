#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::api::MemorySns;
    use serde_json::json;
    use std::sync::Arc;
    use tfplug::types::ClientCapabilities;

    const TOPIC: &str = "arn:aws:sns:us-east-1:123456789012:endpoint-created-topic";

    fn value(json: serde_json::Value) -> DynamicValue {
        DynamicValue::new(Dynamic::from(json))
    }

    fn gcm_config() -> DynamicValue {
        value(json!({
            "name": "app",
            "platform": "GCM",
            "platform_credential": "api-key",
            "event_endpoint_created_topic_arn": TOPIC,
            "success_feedback_sample_rate": 100
        }))
    }

    async fn configured(sns: Arc<MemorySns>) -> SnsApplicationResource {
        let mut resource = SnsApplicationResource::new();
        let data = AwsProviderData::new(sns, "us-east-1");
        let response = resource
            .configure(
                Context::new(),
                ConfigureResourceRequest {
                    provider_data: Some(Arc::new(data)),
                },
            )
            .await;
        assert!(response.diagnostics.is_empty());
        resource
    }

    async fn create(resource: &SnsApplicationResource, config: DynamicValue) -> CreateResourceResponse {
        resource
            .create(
                Context::new(),
                CreateResourceRequest {
                    type_name: TYPE_NAME.to_string(),
                    planned_state: config.clone(),
                    config,
                },
            )
            .await
    }

    async fn read(resource: &SnsApplicationResource, state: DynamicValue) -> ReadResourceResponse {
        resource
            .read(
                Context::new(),
                ReadResourceRequest {
                    type_name: TYPE_NAME.to_string(),
                    current_state: state,
                    client_capabilities: ClientCapabilities::default(),
                },
            )
            .await
    }

    async fn validate(config: DynamicValue) -> Vec<Diagnostic> {
        SnsApplicationResource::new()
            .validate(
                Context::new(),
                ValidateResourceConfigRequest {
                    type_name: TYPE_NAME.to_string(),
                    config,
                    client_capabilities: ClientCapabilities::default(),
                },
            )
            .await
            .diagnostics
    }

    #[test]
    fn test_schema_attributes() {
        let schema = SnsApplicationResource::schema_static();

        assert!(schema.attribute("name").unwrap().required);
        assert!(schema.attribute("platform").unwrap().required);
        assert!(schema.attribute("platform_credential").unwrap().sensitive);
        assert!(schema.attribute("platform_principal").unwrap().optional);
        assert!(schema.attribute("arn").unwrap().computed);
        assert_eq!(
            schema.attribute(SAMPLE_RATE).unwrap().r#type,
            AttributeType::Number
        );
        for (name, _) in STRING_ATTRIBUTES {
            assert!(schema.attribute(name).unwrap().optional, "{}", name);
        }
    }

    #[test]
    fn test_schema_rejects_bad_values() {
        let schema = SnsApplicationResource::schema_static();
        let diags = schema.validate_config(&value(json!({
            "name": "bad name!",
            "platform": "SMS",
            "platform_credential": "key",
            "success_feedback_sample_rate": 101,
            "event_endpoint_created_topic_arn": "not-an-arn"
        })));

        let attributes: Vec<String> = diags
            .iter()
            .filter_map(|d| d.attribute.as_ref().map(ToString::to_string))
            .collect();
        assert!(attributes.contains(&"name".to_string()));
        assert!(attributes.contains(&"platform".to_string()));
        assert!(attributes.contains(&SAMPLE_RATE.to_string()));
        assert!(attributes.contains(&"event_endpoint_created_topic_arn".to_string()));
    }

    #[tokio::test]
    async fn test_validate_requires_principal_for_apns() {
        let diags = validate(value(json!({
            "name": "app",
            "platform": "APNS_SANDBOX",
            "platform_credential": "private-key"
        })))
        .await;
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].attribute, Some(AttributePath::new("platform_principal")));

        let diags = validate(gcm_config()).await;
        assert!(diags.is_empty());
    }

    #[tokio::test]
    async fn test_validate_skips_unknown_platform() {
        let diags = validate(value(json!({
            "name": "app",
            "platform": tfplug::types::UNKNOWN_VALUE,
            "platform_credential": "key"
        })))
        .await;
        assert!(diags.is_empty());
    }

    #[tokio::test]
    async fn test_create_populates_state() {
        let sns = Arc::new(MemorySns::new());
        let resource = configured(sns.clone()).await;

        let response = create(&resource, gcm_config()).await;
        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);

        let state = response.new_state;
        let arn = state.get_string(&AttributePath::new("arn")).unwrap();
        assert_eq!(arn, "arn:aws:sns:us-east-1:123456789012:app/GCM/app");
        assert_eq!(state.get_string(&AttributePath::new("id")).unwrap(), arn);
        assert_eq!(
            state.get_string(&AttributePath::new("platform_credential")).unwrap(),
            "api-key"
        );
        assert_eq!(state.get_number(&AttributePath::new(SAMPLE_RATE)).unwrap(), 100.0);
        assert!(state
            .get(&AttributePath::new("event_endpoint_deleted_topic_arn"))
            .unwrap()
            .is_null());

        let raw = sns.raw_attributes(&arn).await.unwrap();
        assert_eq!(raw[PLATFORM_CREDENTIAL], "api-key");
        assert_eq!(raw[SUCCESS_FEEDBACK_SAMPLE_RATE], "100");
    }

    #[tokio::test]
    async fn test_create_without_provider_data_fails() {
        let resource = SnsApplicationResource::new();
        let response = create(&resource, gcm_config()).await;
        assert_eq!(response.diagnostics[0].summary, "Provider not configured");
    }

    #[tokio::test]
    async fn test_read_keeps_write_only_values() {
        let sns = Arc::new(MemorySns::new());
        let resource = configured(sns).await;
        let state = create(&resource, gcm_config()).await.new_state;

        let refreshed = read(&resource, state.clone()).await.new_state.unwrap();
        assert_eq!(refreshed.flatten(), state.flatten());
    }

    #[tokio::test]
    async fn test_read_missing_application_removes_state() {
        let sns = Arc::new(MemorySns::new());
        let resource = configured(sns.clone()).await;
        let state = create(&resource, gcm_config()).await.new_state;
        let arn = state.get_string(&AttributePath::new("arn")).unwrap();

        assert!(sns.remove_out_of_band(&arn).await);
        let response = read(&resource, state).await;
        assert!(response.new_state.is_none());
        assert!(response.diagnostics.is_empty());
    }

    #[tokio::test]
    async fn test_read_from_imported_id() {
        let sns = Arc::new(MemorySns::new());
        let resource = configured(sns).await;
        let arn = create(&resource, gcm_config())
            .await
            .new_state
            .get_string(&AttributePath::new("arn"))
            .unwrap();

        let imported = resource
            .import_state(
                Context::new(),
                ImportResourceStateRequest {
                    type_name: TYPE_NAME.to_string(),
                    id: arn.clone(),
                },
            )
            .await;
        assert!(imported.diagnostics.is_empty());

        let state = imported.imported_resources[0].state.clone();
        let refreshed = read(&resource, state).await.new_state.unwrap();
        assert_eq!(refreshed.get_string(&AttributePath::new("name")).unwrap(), "app");
        assert_eq!(refreshed.get_string(&AttributePath::new("platform")).unwrap(), "GCM");
        assert!(refreshed
            .get(&AttributePath::new("platform_credential"))
            .unwrap()
            .is_null());
    }

    #[tokio::test]
    async fn test_import_rejects_non_arn() {
        let resource = SnsApplicationResource::new();
        let response = resource
            .import_state(
                Context::new(),
                ImportResourceStateRequest {
                    type_name: TYPE_NAME.to_string(),
                    id: "my-app".to_string(),
                },
            )
            .await;
        assert!(response.imported_resources.is_empty());
        assert_eq!(response.diagnostics[0].summary, "Invalid import ID");
    }

    #[tokio::test]
    async fn test_update_sends_changed_and_cleared_attributes() {
        let sns = Arc::new(MemorySns::new());
        let resource = configured(sns.clone()).await;
        let prior = create(&resource, gcm_config()).await.new_state;
        let arn = prior.get_string(&AttributePath::new("arn")).unwrap();

        let config = value(json!({
            "name": "app",
            "platform": "GCM",
            "platform_credential": "api-key",
            "success_feedback_sample_rate": 99,
            "event_endpoint_updated_topic_arn": TOPIC
        }));
        let response = resource
            .update(
                Context::new(),
                UpdateResourceRequest {
                    type_name: TYPE_NAME.to_string(),
                    prior_state: prior,
                    planned_state: config.clone(),
                    config,
                },
            )
            .await;
        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);

        let raw = sns.raw_attributes(&arn).await.unwrap();
        assert_eq!(raw[SUCCESS_FEEDBACK_SAMPLE_RATE], "99");
        assert_eq!(raw[EVENT_ENDPOINT_UPDATED], TOPIC);
        assert!(!raw.contains_key(EVENT_ENDPOINT_CREATED));

        let state = response.new_state;
        assert_eq!(state.get_number(&AttributePath::new(SAMPLE_RATE)).unwrap(), 99.0);
        assert!(state
            .get(&AttributePath::new("event_endpoint_created_topic_arn"))
            .unwrap()
            .is_null());
    }

    #[test]
    fn test_credential_change_sends_principal_too() {
        let prior = ApplicationConfig::from_value(&value(json!({
            "name": "app",
            "platform": "APNS",
            "platform_credential": "old-key",
            "platform_principal": "cert"
        })))
        .unwrap();
        let mut config = prior.clone();
        config.credential = "new-key".to_string();

        let changes = config.changed_attributes(&prior);
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[PLATFORM_CREDENTIAL], "new-key");
        assert_eq!(changes[PLATFORM_PRINCIPAL], "cert");

        assert!(prior.changed_attributes(&prior).is_empty());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let sns = Arc::new(MemorySns::new());
        let resource = configured(sns.clone()).await;
        let state = create(&resource, gcm_config()).await.new_state;

        for _ in 0..2 {
            let response = resource
                .delete(
                    Context::new(),
                    DeleteResourceRequest {
                        type_name: TYPE_NAME.to_string(),
                        prior_state: state.clone(),
                    },
                )
                .await;
            assert!(response.diagnostics.is_empty());
        }
        assert!(sns.is_empty().await);
    }

    #[tokio::test]
    async fn test_configure_rejects_foreign_provider_data() {
        let mut resource = SnsApplicationResource::new();
        let response = resource
            .configure(
                Context::new(),
                ConfigureResourceRequest {
                    provider_data: Some(Arc::new("not provider data")),
                },
            )
            .await;
        assert_eq!(response.diagnostics[0].summary, "Invalid provider data");
    }
}

//! Acceptance tests against a live SNS endpoint
//!
//! Run with `TF_ACC=1` and the platform credentials below exported:
//!
//! GCM_API_KEY - Google Cloud Messaging API key
//! APNS_SANDBOX_CREDENTIAL - Apple Push Notification sandbox private key
//! APNS_SANDBOX_PRINCIPAL - Apple Push Notification sandbox certificate
//!
//! AWS credentials and region come from the usual SDK sources.
#![cfg(feature = "acceptance")]

mod common;

use aws::api::Client;
use aws::config::{ProviderConfig, DEFAULT_MAX_RETRIES};
use common::*;
use serial_test::serial;
use std::sync::Arc;
use tfplug::acctest::{self, AccTestConfig, TestCase, TestOutcome, TestStep};

fn acc_config() -> AccTestConfig {
    AccTestConfig::from_env(&[GCM_API_KEY, APNS_SANDBOX_CREDENTIAL, APNS_SANDBOX_PRINCIPAL])
}

async fn destroy_check() -> ApplicationsDestroyed {
    let config = ProviderConfig {
        region: "us-east-1".to_string(),
        access_key: None,
        secret_key: None,
        profile: None,
        sns_endpoint: None,
        max_retries: DEFAULT_MAX_RETRIES,
    };
    let client = Client::from_config(&config).await.unwrap();
    ApplicationsDestroyed {
        sns: Arc::new(client),
    }
}

fn report(outcome: TestOutcome) {
    if let TestOutcome::Skipped { reason } = outcome {
        eprintln!("{}", reason);
    }
}

#[tokio::test]
#[serial]
async fn acc_sns_application_gcm_create_update() {
    let case = TestCase::new(sdk_provider())
        .require_credential(GCM_API_KEY)
        .check_destroy(destroy_check().await)
        .step(TestStep::rendered(gcm_config).check(check_application(GCM_ADDRESS, "GCM", false)))
        .step(
            TestStep::rendered(gcm_config_update)
                .check(check_application(GCM_ADDRESS, "GCM", true)),
        );

    report(acctest::run(&acc_config(), case).await.unwrap());
}

#[tokio::test]
#[serial]
async fn acc_sns_application_apns_sandbox_create_update() {
    let case = TestCase::new(sdk_provider())
        .require_credential(APNS_SANDBOX_CREDENTIAL)
        .require_credential(APNS_SANDBOX_PRINCIPAL)
        .check_destroy(destroy_check().await)
        .step(
            TestStep::rendered(apns_sandbox_config)
                .check(check_application(APNS_ADDRESS, "APNS_SANDBOX", false)),
        )
        .step(
            TestStep::rendered(apns_sandbox_config_update)
                .check(check_application(APNS_ADDRESS, "APNS_SANDBOX", true)),
        );

    report(acctest::run(&acc_config(), case).await.unwrap());
}

#[tokio::test]
#[serial]
async fn acc_sns_application_import() {
    let case = TestCase::new(sdk_provider())
        .require_credential(GCM_API_KEY)
        .check_destroy(destroy_check().await)
        .step(TestStep::rendered(gcm_config))
        .step(
            TestStep::rendered(gcm_config)
                .import(GCM_ADDRESS)
                .import_state_verify(&["platform_credential", "platform_principal"]),
        );

    report(acctest::run(&acc_config(), case).await.unwrap());
}

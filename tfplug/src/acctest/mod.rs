//! Acceptance test harness
//!
//! Drives a provider through ordered configuration steps the way Terraform
//! core would: configure, validate, plan, apply, refresh and re-plan, then
//! asserts on the resulting state. Teardown destroys everything that was
//! created and hands the final state to an optional destroy check.
//!
//! ```ignore
//! let config = AccTestConfig::from_env(&["GCM_API_KEY"]);
//! let case = TestCase::new(provider_factory)
//!     .require_credential("GCM_API_KEY")
//!     .step(TestStep::rendered(gcm_config).check(compose_check(vec![
//!         check_resource_attr("aws_sns_application.gcm_test", "platform", "GCM"),
//!     ])));
//! acctest::run(&config, case).await?;
//! ```

mod check;
mod config;
mod runner;
mod state;

pub use check::{
    check_no_resource_attr, check_resource_attr, check_resource_attr_set, compose_check,
    DestroyCheck, StateCheck,
};
pub use config::{AccTestConfig, LogLevel, ResourceConfig, TestConfig, ACC_ENV_VAR};
pub use runner::{run, PreCheckFn, ProviderFactory, StepConfig, TestCase, TestOutcome, TestStep};
pub use state::{ResourceState, State};

use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Errors that fail an acceptance run
#[derive(Debug, thiserror::Error)]
pub enum AccTestError {
    #[error("pre-check failed: {0}")]
    PreCheck(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{operation}: {message}")]
    Diagnostics { operation: String, message: String },

    #[error("after applying this step, the plan was not empty: {}", .changes.join(", "))]
    NonEmptyPlan { changes: Vec<String> },

    #[error("check failed: {0}")]
    Check(String),

    #[error("check destroy failed: {0}")]
    DestroyCheck(String),

    #[error("test run exceeded its deadline of {timeout:?}")]
    Deadline { timeout: Duration },

    #[error("import verification failed: {0}")]
    ImportVerify(String),

    #[error("expected an error matching /{pattern}/, but the step succeeded")]
    ExpectedError { pattern: String },

    #[error("expected an error matching /{pattern}/, got: {actual}")]
    UnexpectedError { pattern: String, actual: String },

    #[error("step {step}: {source}")]
    Step {
        step: usize,
        #[source]
        source: Box<AccTestError>,
    },
}

/// Install a fmt subscriber filtered at `level`. Safe to call from every
/// test; only the first call in a process installs anything.
pub fn init_logging(level: LogLevel) {
    let filter = EnvFilter::try_new(level.as_filter()).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// A name that will not collide with other runs, e.g. `tf-acc-test-1a2b3c4d`
pub fn random_with_prefix(prefix: &str) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", prefix, &suffix[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_names_are_prefixed_and_distinct() {
        let a = random_with_prefix("tf-acc-test");
        let b = random_with_prefix("tf-acc-test");
        assert!(a.starts_with("tf-acc-test-"));
        assert_eq!(a.len(), "tf-acc-test-".len() + 8);
        assert_ne!(a, b);
    }

    #[test]
    fn step_errors_carry_their_step_number() {
        let err = AccTestError::Step {
            step: 2,
            source: Box::new(AccTestError::NonEmptyPlan {
                changes: vec!["aws_sns_application.gcm_test: update".to_string()],
            }),
        };
        assert_eq!(
            err.to_string(),
            "step 2: after applying this step, the plan was not empty: aws_sns_application.gcm_test: update"
        );
    }

    #[test]
    fn init_logging_is_idempotent() {
        init_logging(LogLevel::Debug);
        init_logging(LogLevel::Warn);
    }
}

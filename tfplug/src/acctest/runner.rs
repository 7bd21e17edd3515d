use super::check::{DestroyCheck, StateCheck};
use super::config::{AccTestConfig, TestConfig, ACC_ENV_VAR};
use super::state::{ResourceState, State};
use super::{init_logging, AccTestError};
use crate::context::Context;
use crate::error::TfplugError;
use crate::plan::{plan_resource_change, PlanAction};
use crate::provider::{ConfigureProviderRequest, Provider, ProviderSchemaRequest, ResourceFactory};
use crate::resource::{
    ConfigureResourceRequest, CreateResourceRequest, DeleteResourceRequest,
    ImportResourceStateRequest, ReadResourceRequest, ResourceSchemaRequest, ResourceWithConfigure,
    UpdateResourceRequest, ValidateResourceConfigRequest,
};
use crate::schema::Schema;
use crate::types::{has_errors, ClientCapabilities, Diagnostic, DynamicValue};
use regex::Regex;
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

const HOST_VERSION: &str = concat!("tfplug-acctest/", env!("CARGO_PKG_VERSION"));

pub type ProviderFactory = Box<dyn Fn() -> Box<dyn Provider> + Send + Sync>;
pub type PreCheckFn = Box<dyn Fn(&AccTestConfig) -> Result<(), String> + Send + Sync>;

/// A full acceptance scenario
pub struct TestCase {
    /// Extra gating run after required credentials are confirmed
    pub pre_check: Option<PreCheckFn>,
    /// Credentials that must be present in `AccTestConfig` for the run to start
    pub required_credentials: Vec<String>,
    pub provider_factory: ProviderFactory,
    pub check_destroy: Option<Box<dyn DestroyCheck>>,
    pub steps: Vec<TestStep>,
}

impl TestCase {
    pub fn new(provider_factory: ProviderFactory) -> Self {
        Self {
            pre_check: None,
            required_credentials: vec![],
            provider_factory,
            check_destroy: None,
            steps: vec![],
        }
    }

    pub fn pre_check(
        mut self,
        pre_check: impl Fn(&AccTestConfig) -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        self.pre_check = Some(Box::new(pre_check));
        self
    }

    pub fn require_credential(mut self, name: &str) -> Self {
        self.required_credentials.push(name.to_string());
        self
    }

    pub fn check_destroy(mut self, check: impl DestroyCheck + 'static) -> Self {
        self.check_destroy = Some(Box::new(check));
        self
    }

    pub fn step(mut self, step: TestStep) -> Self {
        self.steps.push(step);
        self
    }
}

/// Configuration source for a step
pub enum StepConfig {
    Literal(String),
    /// Built from the run's settings, so secrets come from `AccTestConfig`
    Rendered(Box<dyn Fn(&AccTestConfig) -> String + Send + Sync>),
}

impl StepConfig {
    fn render(&self, config: &AccTestConfig) -> String {
        match self {
            StepConfig::Literal(source) => source.clone(),
            StepConfig::Rendered(render) => render(config),
        }
    }
}

pub struct TestStep {
    pub config: StepConfig,
    pub check: Option<Box<dyn StateCheck>>,
    pub expect_non_empty_plan: bool,
    pub expect_error: Option<Regex>,
    /// Address of the resource an import step targets
    pub resource_name: Option<String>,
    pub import_state: bool,
    /// Defaults to the `id` of `resource_name` in the current state
    pub import_state_id: Option<String>,
    pub import_state_verify: bool,
    pub import_state_verify_ignore: Vec<String>,
}

impl TestStep {
    pub fn new(config: impl Into<String>) -> Self {
        Self::with_config(StepConfig::Literal(config.into()))
    }

    pub fn rendered(render: impl Fn(&AccTestConfig) -> String + Send + Sync + 'static) -> Self {
        Self::with_config(StepConfig::Rendered(Box::new(render)))
    }

    fn with_config(config: StepConfig) -> Self {
        Self {
            config,
            check: None,
            expect_non_empty_plan: false,
            expect_error: None,
            resource_name: None,
            import_state: false,
            import_state_id: None,
            import_state_verify: false,
            import_state_verify_ignore: vec![],
        }
    }

    pub fn check(mut self, check: Box<dyn StateCheck>) -> Self {
        self.check = Some(check);
        self
    }

    pub fn expect_non_empty_plan(mut self) -> Self {
        self.expect_non_empty_plan = true;
        self
    }

    pub fn expect_error(mut self, pattern: Regex) -> Self {
        self.expect_error = Some(pattern);
        self
    }

    /// Turn this into an import step for the resource at `address`
    pub fn import(mut self, address: &str) -> Self {
        self.resource_name = Some(address.to_string());
        self.import_state = true;
        self
    }

    pub fn import_state_id(mut self, id: impl Into<String>) -> Self {
        self.import_state_id = Some(id.into());
        self
    }

    pub fn import_state_verify(mut self, ignore: &[&str]) -> Self {
        self.import_state_verify = true;
        self.import_state_verify_ignore = ignore.iter().map(|s| s.to_string()).collect();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestOutcome {
    Passed { steps: usize },
    Skipped { reason: String },
}

/// Run a test case. Teardown runs whether or not the steps succeeded; a
/// step failure takes precedence over a teardown failure.
pub async fn run(config: &AccTestConfig, case: TestCase) -> Result<TestOutcome, AccTestError> {
    if !config.enabled {
        let reason = format!(
            "Acceptance tests skipped unless env '{}' set",
            ACC_ENV_VAR
        );
        tracing::info!("{}", reason);
        return Ok(TestOutcome::Skipped { reason });
    }

    init_logging(config.log_level);

    for name in &case.required_credentials {
        if config.credential(name).is_none() {
            return Err(AccTestError::PreCheck(format!("{} must be set.", name)));
        }
    }
    if let Some(pre_check) = &case.pre_check {
        pre_check(config).map_err(AccTestError::PreCheck)?;
    }

    let mut runner = Runner {
        case: &case,
        config,
        ctx: Context::new().with_timeout(config.timeout),
        state: State::default(),
        last_config: None,
    };

    let steps = runner.run_steps().await;
    let teardown = runner.teardown().await;
    steps?;
    teardown?;

    Ok(TestOutcome::Passed {
        steps: case.steps.len(),
    })
}

struct Runner<'a> {
    case: &'a TestCase,
    config: &'a AccTestConfig,
    ctx: Context,
    state: State,
    /// Last configuration a provider was successfully configured from,
    /// reused to configure the provider for teardown
    last_config: Option<TestConfig>,
}

impl Runner<'_> {
    async fn run_steps(&mut self) -> Result<(), AccTestError> {
        let case = self.case;
        for (idx, step) in case.steps.iter().enumerate() {
            let number = idx + 1;
            tracing::info!(step = number, import = step.import_state, "running step");

            let result = self.run_step(step).await;
            let failure = match (&step.expect_error, result) {
                (None, Ok(())) => None,
                (None, Err(e)) => Some(e),
                (Some(pattern), Ok(())) => Some(AccTestError::ExpectedError {
                    pattern: pattern.to_string(),
                }),
                (Some(pattern), Err(e)) => {
                    let actual = e.to_string();
                    if pattern.is_match(&actual) {
                        tracing::debug!(step = number, error = %actual, "step failed as expected");
                        None
                    } else {
                        Some(AccTestError::UnexpectedError {
                            pattern: pattern.to_string(),
                            actual,
                        })
                    }
                }
            };

            if let Some(source) = failure {
                return Err(AccTestError::Step {
                    step: number,
                    source: Box::new(source),
                });
            }
        }
        Ok(())
    }

    async fn run_step(&mut self, step: &TestStep) -> Result<(), AccTestError> {
        self.check_deadline()?;

        let config = TestConfig::parse(&step.config.render(self.config))?;
        let session = Session::open(&self.case.provider_factory, &config, self.ctx.clone()).await?;
        self.last_config = Some(config.clone());

        if step.import_state {
            return self.import_step(&session, step).await;
        }

        // Plan against refreshed state
        self.refresh(&session).await?;
        self.apply(&session, &config).await?;
        self.refresh(&session).await?;

        if let Some(check) = &step.check {
            check.check(&self.state).map_err(AccTestError::Check)?;
        }

        let changes = self.pending_changes(&session, &config).await?;
        if !changes.is_empty() && !step.expect_non_empty_plan {
            return Err(AccTestError::NonEmptyPlan { changes });
        }
        Ok(())
    }

    async fn apply(&mut self, session: &Session, config: &TestConfig) -> Result<(), AccTestError> {
        let mut schemas = HashMap::new();
        for rc in &config.resources {
            let address = rc.address();
            let resource = session.resource(&rc.type_name).await?;
            let schema = session.resource_schema(resource.as_ref()).await?;

            let mut diagnostics = schema.validate_config(&rc.config);
            if !has_errors(&diagnostics) {
                let response = resource
                    .validate(
                        session.ctx.clone(),
                        ValidateResourceConfigRequest {
                            type_name: rc.type_name.clone(),
                            config: rc.config.clone(),
                            client_capabilities: ClientCapabilities::default(),
                        },
                    )
                    .await;
                diagnostics.extend(response.diagnostics);
            }
            check_diagnostics(&format!("validate {}", address), &diagnostics)?;
            schemas.insert(address, schema);
        }

        let removed: Vec<ResourceState> = self
            .state
            .resources()
            .iter()
            .rev()
            .filter(|r| config.resource(&r.address()).is_none())
            .cloned()
            .collect();
        for prior in removed {
            self.check_deadline()?;
            session.destroy(&prior).await?;
            self.state.remove(&prior.address());
        }

        for rc in &config.resources {
            self.check_deadline()?;
            let address = rc.address();
            let Some(schema) = schemas.get(&address) else {
                continue;
            };
            let prior = self.state.resource(&address).cloned();
            let plan = plan_resource_change(
                schema,
                prior.as_ref().map(|p| &p.attributes),
                Some(&rc.config),
            );
            check_diagnostics(&format!("plan {}", address), &plan.diagnostics)?;

            let resource = session.resource(&rc.type_name).await?;
            let new_state = match (plan.action, prior) {
                (PlanAction::NoOp | PlanAction::Delete, _) => continue,
                (PlanAction::Create, _) | (PlanAction::Replace, None) => {
                    session
                        .create(resource.as_ref(), &address, plan.planned_state, &rc.config)
                        .await?
                }
                (PlanAction::Replace, Some(prior)) => {
                    tracing::info!(%address, "replacing resource");
                    session.destroy(&prior).await?;
                    self.state.remove(&address);
                    session
                        .create(resource.as_ref(), &address, plan.planned_state, &rc.config)
                        .await?
                }
                (PlanAction::Update, Some(prior)) => {
                    let response = resource
                        .update(
                            session.ctx.clone(),
                            UpdateResourceRequest {
                                type_name: rc.type_name.clone(),
                                prior_state: prior.attributes,
                                planned_state: plan.planned_state,
                                config: rc.config.clone(),
                            },
                        )
                        .await;
                    check_diagnostics(&format!("update {}", address), &response.diagnostics)?;
                    tracing::info!(%address, "updated resource");
                    response.new_state
                }
                (PlanAction::Update, None) => continue,
            };

            self.state.upsert(ResourceState {
                type_name: rc.type_name.clone(),
                name: rc.name.clone(),
                attributes: new_state,
            });
        }
        Ok(())
    }

    async fn refresh(&mut self, session: &Session) -> Result<(), AccTestError> {
        for tracked in self.state.resources().to_vec() {
            self.check_deadline()?;
            let address = tracked.address();
            let resource = session.resource(&tracked.type_name).await?;
            let response = resource
                .read(
                    session.ctx.clone(),
                    ReadResourceRequest {
                        type_name: tracked.type_name.clone(),
                        current_state: tracked.attributes.clone(),
                        client_capabilities: ClientCapabilities::default(),
                    },
                )
                .await;
            check_diagnostics(&format!("refresh {}", address), &response.diagnostics)?;

            match response.new_state {
                Some(attributes) => self.state.upsert(ResourceState {
                    attributes,
                    ..tracked
                }),
                None => {
                    tracing::warn!(%address, "remote object no longer exists, removing from state");
                    self.state.remove(&address);
                }
            }
        }
        Ok(())
    }

    /// Human-readable list of what another apply would still do
    async fn pending_changes(
        &self,
        session: &Session,
        config: &TestConfig,
    ) -> Result<Vec<String>, AccTestError> {
        let mut changes = vec![];
        for rc in &config.resources {
            let address = rc.address();
            let resource = session.resource(&rc.type_name).await?;
            let schema = session.resource_schema(resource.as_ref()).await?;
            let prior = self.state.resource(&address).map(|r| &r.attributes);
            let plan = plan_resource_change(&schema, prior, Some(&rc.config));
            if plan.action.is_change() {
                changes.push(format!("{}: {}", address, plan.action));
            }
        }
        for tracked in self.state.resources() {
            if config.resource(&tracked.address()).is_none() {
                changes.push(format!("{}: {}", tracked.address(), PlanAction::Delete));
            }
        }
        Ok(changes)
    }

    async fn import_step(&mut self, session: &Session, step: &TestStep) -> Result<(), AccTestError> {
        let address = step
            .resource_name
            .as_deref()
            .ok_or_else(|| AccTestError::Config("import step needs a resource name".to_string()))?;
        let (type_name, name) = address.split_once('.').ok_or_else(|| {
            AccTestError::Config(format!("invalid resource address \"{}\"", address))
        })?;

        let id = match &step.import_state_id {
            Some(id) => id.clone(),
            None => self
                .state
                .resource(address)
                .and_then(ResourceState::id)
                .ok_or_else(|| {
                    AccTestError::Config(format!("{} has no id in state to import", address))
                })?,
        };

        let resource = session.resource(type_name).await?;
        let response = resource
            .import_state(
                session.ctx.clone(),
                ImportResourceStateRequest {
                    type_name: type_name.to_string(),
                    id: id.clone(),
                },
            )
            .await;
        check_diagnostics(&format!("import {}", address), &response.diagnostics)?;
        let imported = response.imported_resources.into_iter().next().ok_or_else(|| {
            AccTestError::ImportVerify(format!("importing {} returned no resources", id))
        })?;

        let read = resource
            .read(
                session.ctx.clone(),
                ReadResourceRequest {
                    type_name: imported.type_name.clone(),
                    current_state: imported.state,
                    client_capabilities: ClientCapabilities::default(),
                },
            )
            .await;
        check_diagnostics(&format!("read imported {}", address), &read.diagnostics)?;
        let attributes = read.new_state.ok_or_else(|| {
            AccTestError::ImportVerify(format!("cannot import non-existent remote object {}", id))
        })?;

        let imported = ResourceState {
            type_name: type_name.to_string(),
            name: name.to_string(),
            attributes,
        };

        if let Some(check) = &step.check {
            let mut imported_state = State::default();
            imported_state.upsert(imported.clone());
            check.check(&imported_state).map_err(AccTestError::Check)?;
        }

        if step.import_state_verify {
            let applied = self.state.resource(address).ok_or_else(|| {
                AccTestError::ImportVerify(format!("{} is not in state to verify against", address))
            })?;
            verify_import(
                &applied.flatten(),
                &imported.flatten(),
                &step.import_state_verify_ignore,
            )?;
        }
        Ok(())
    }

    async fn teardown(&mut self) -> Result<(), AccTestError> {
        let snapshot = self.state.clone();

        if !snapshot.is_empty() {
            if let Some(config) = &self.last_config {
                // Fresh context: teardown must run even after the deadline
                let session =
                    Session::open(&self.case.provider_factory, config, Context::new()).await?;
                let mut first_error = None;
                for tracked in snapshot.resources().iter().rev() {
                    match session.destroy(tracked).await {
                        Ok(()) => {
                            self.state.remove(&tracked.address());
                        }
                        Err(e) => {
                            tracing::error!(address = %tracked.address(), error = %e, "teardown failed");
                            first_error.get_or_insert(e);
                        }
                    }
                }
                if let Some(e) = first_error {
                    return Err(e);
                }
            }
        }

        if let Some(check) = &self.case.check_destroy {
            check
                .check_destroy(&snapshot)
                .await
                .map_err(AccTestError::DestroyCheck)?;
        }
        Ok(())
    }

    fn check_deadline(&self) -> Result<(), AccTestError> {
        if self.ctx.is_cancelled() {
            return Err(AccTestError::Deadline {
                timeout: self.config.timeout,
            });
        }
        Ok(())
    }
}

/// A configured provider and the means to build configured resources
struct Session {
    ctx: Context,
    provider_data: Option<Arc<dyn Any + Send + Sync>>,
    factories: HashMap<String, ResourceFactory>,
}

impl Session {
    async fn open(
        factory: &ProviderFactory,
        config: &TestConfig,
        ctx: Context,
    ) -> Result<Self, AccTestError> {
        let mut provider = factory();
        let type_name = provider.type_name().to_string();
        let provider_config = config
            .provider(&type_name)
            .cloned()
            .unwrap_or_else(DynamicValue::object);

        let schema = provider.schema(ctx.clone(), ProviderSchemaRequest).await;
        check_diagnostics("provider schema", &schema.diagnostics)?;
        check_diagnostics(
            &format!("validate provider {}", type_name),
            &schema.schema.validate_config(&provider_config),
        )?;

        let response = provider
            .configure(
                ctx.clone(),
                ConfigureProviderRequest {
                    terraform_version: HOST_VERSION.to_string(),
                    config: provider_config,
                    client_capabilities: ClientCapabilities::default(),
                },
            )
            .await;
        check_diagnostics(&format!("configure provider {}", type_name), &response.diagnostics)?;

        Ok(Self {
            ctx,
            provider_data: response.provider_data,
            factories: provider.resources(),
        })
    }

    async fn resource(&self, type_name: &str) -> Result<Box<dyn ResourceWithConfigure>, AccTestError> {
        let factory = self.factories.get(type_name).ok_or_else(|| {
            AccTestError::Config(TfplugError::ResourceNotFound(type_name.to_string()).to_string())
        })?;

        let mut resource = factory();
        let response = resource
            .configure(
                self.ctx.clone(),
                ConfigureResourceRequest {
                    provider_data: self.provider_data.clone(),
                },
            )
            .await;
        check_diagnostics(&format!("configure {}", type_name), &response.diagnostics)?;
        Ok(resource)
    }

    async fn resource_schema(
        &self,
        resource: &dyn ResourceWithConfigure,
    ) -> Result<Schema, AccTestError> {
        let response = resource.schema(self.ctx.clone(), ResourceSchemaRequest).await;
        check_diagnostics(
            &format!("schema {}", resource.type_name()),
            &response.diagnostics,
        )?;
        Ok(response.schema)
    }

    async fn create(
        &self,
        resource: &dyn ResourceWithConfigure,
        address: &str,
        planned_state: DynamicValue,
        config: &DynamicValue,
    ) -> Result<DynamicValue, AccTestError> {
        let response = resource
            .create(
                self.ctx.clone(),
                CreateResourceRequest {
                    type_name: resource.type_name().to_string(),
                    planned_state,
                    config: config.clone(),
                },
            )
            .await;
        check_diagnostics(&format!("create {}", address), &response.diagnostics)?;
        tracing::info!(%address, "created resource");
        Ok(response.new_state)
    }

    async fn destroy(&self, tracked: &ResourceState) -> Result<(), AccTestError> {
        let address = tracked.address();
        let resource = self.resource(&tracked.type_name).await?;
        let response = resource
            .delete(
                self.ctx.clone(),
                DeleteResourceRequest {
                    type_name: tracked.type_name.clone(),
                    prior_state: tracked.attributes.clone(),
                },
            )
            .await;
        check_diagnostics(&format!("destroy {}", address), &response.diagnostics)?;
        tracing::info!(%address, "destroyed resource");
        Ok(())
    }
}

fn check_diagnostics(operation: &str, diagnostics: &[Diagnostic]) -> Result<(), AccTestError> {
    for warning in diagnostics.iter().filter(|d| !d.is_error()) {
        tracing::warn!(operation, "{}", warning);
    }
    if !has_errors(diagnostics) {
        return Ok(());
    }
    let message = diagnostics
        .iter()
        .filter(|d| d.is_error())
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ");
    Err(AccTestError::Diagnostics {
        operation: operation.to_string(),
        message,
    })
}

fn verify_import(
    applied: &BTreeMap<String, String>,
    imported: &BTreeMap<String, String>,
    ignore: &[String],
) -> Result<(), AccTestError> {
    let ignored = |key: &str| ignore.iter().any(|prefix| key.starts_with(prefix.as_str()));

    let mut mismatches: Vec<(String, Option<String>, Option<String>)> = vec![];
    for key in applied.keys().chain(imported.keys()) {
        if ignored(key) || mismatches.iter().any(|(k, _, _)| k == key) {
            continue;
        }
        let before = applied.get(key);
        let after = imported.get(key);
        if before != after {
            mismatches.push((key.clone(), before.cloned(), after.cloned()));
        }
    }

    if mismatches.is_empty() {
        return Ok(());
    }
    let detail = mismatches
        .into_iter()
        .map(|(key, before, after)| {
            format!(
                "{}: applied {:?}, imported {:?}",
                key,
                before.unwrap_or_default(),
                after.unwrap_or_default()
            )
        })
        .collect::<Vec<_>>()
        .join("; ");
    Err(AccTestError::ImportVerify(format!(
        "imported state differs from applied state: {}",
        detail
    )))
}

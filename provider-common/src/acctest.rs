//! Acceptance-test harness
//!
//! Drives a provider through the same plan/apply/refresh cycle Terraform
//! does, from configuration written in Terraform's JSON syntax:
//!
//! ```json
//! {"resource": {"kubernetes_role_binding": {"test": {"metadata": {"name": "rb"}}}}}
//! ```
//!
//! Steps either apply a configuration and run checks against the resulting
//! state, or import a tracked resource and compare what comes back. After
//! the last step everything is destroyed and the destroy check runs.
//! [`test`] only runs when `TF_ACC` is set, since acceptance tests touch
//! real infrastructure.

use crate::protocol::{has_errors, Diagnostic};
use crate::provider::{Provider, ProviderDefinition};
use crate::state::ResourceState;
use rand::Rng;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Environment variable gating acceptance tests
pub const TF_ACC: &str = "TF_ACC";

const CHARSET_ALPHA_NUM: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// A check run against the state after a step
pub type CheckFn<P> = Box<dyn Fn(&Provider<P>, &TestState) -> Result<(), String>>;

#[derive(Debug, Error)]
pub enum AccTestError {
    #[error("invalid test configuration: {0}")]
    Config(String),

    #[error("step {step}: {summary}")]
    Diagnostics { step: usize, summary: String },

    #[error("step {step}: check failed: {message}")]
    Check { step: usize, message: String },

    #[error("step {step}: {message}")]
    Step { step: usize, message: String },

    #[error("destroy failed: {0}")]
    Destroy(String),

    #[error("destroy check failed: {0}")]
    CheckDestroy(String),
}

/// One resource block from a test configuration
#[derive(Debug, Clone)]
pub struct ResourceConfig {
    pub address: String,
    pub type_name: String,
    pub config: Value,
}

#[derive(Debug, Clone)]
pub struct TrackedResource {
    pub address: String,
    pub type_name: String,
    pub state: ResourceState,
}

/// Resources the harness is tracking, in creation order
#[derive(Debug, Clone, Default)]
pub struct TestState {
    resources: Vec<TrackedResource>,
}

impl TestState {
    pub fn resource(&self, address: &str) -> Option<&ResourceState> {
        self.resources
            .iter()
            .find(|r| r.address == address)
            .map(|r| &r.state)
    }

    pub fn primary_id(&self, address: &str) -> Option<String> {
        self.resource(address).and_then(|s| s.get_string("id"))
    }

    pub fn resources_of_type<'a>(
        &'a self,
        type_name: &'a str,
    ) -> impl Iterator<Item = &'a TrackedResource> + 'a {
        self.resources.iter().filter(move |r| r.type_name == type_name)
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    fn upsert(&mut self, address: &str, type_name: &str, state: ResourceState) {
        match self.resources.iter_mut().find(|r| r.address == address) {
            Some(existing) => existing.state = state,
            None => self.resources.push(TrackedResource {
                address: address.to_string(),
                type_name: type_name.to_string(),
                state,
            }),
        }
    }

    fn remove(&mut self, address: &str) {
        self.resources.retain(|r| r.address != address);
    }
}

pub struct TestStep<P: ProviderDefinition> {
    pub config: Option<String>,
    pub check: Vec<CheckFn<P>>,
    pub resource_name: Option<String>,
    pub import_state: bool,
    pub import_state_verify: bool,
    pub import_state_verify_ignore: Vec<String>,
}

impl<P: ProviderDefinition> TestStep<P> {
    /// Apply `config` and run checks
    pub fn config(config: impl Into<String>) -> Self {
        Self {
            config: Some(config.into()),
            check: Vec::new(),
            resource_name: None,
            import_state: false,
            import_state_verify: false,
            import_state_verify_ignore: Vec::new(),
        }
    }

    /// Import the tracked resource at `address` by its id
    pub fn import(address: &str) -> Self {
        Self {
            config: None,
            check: Vec::new(),
            resource_name: Some(address.to_string()),
            import_state: true,
            import_state_verify: false,
            import_state_verify_ignore: Vec::new(),
        }
    }

    pub fn check(mut self, check: CheckFn<P>) -> Self {
        self.check.push(check);
        self
    }

    /// Compare every imported attribute with the tracked state, skipping
    /// keys under the `ignore` prefixes.
    pub fn verify(mut self, ignore: &[&str]) -> Self {
        self.import_state_verify = true;
        self.import_state_verify_ignore = ignore.iter().map(|s| s.to_string()).collect();
        self
    }
}

pub struct TestCase<P: ProviderDefinition> {
    pub provider_config: Value,
    pub pre_check: Option<Box<dyn Fn()>>,
    pub id_refresh_name: Option<String>,
    pub check_destroy: Option<CheckFn<P>>,
    pub steps: Vec<TestStep<P>>,
}

impl<P: ProviderDefinition> TestCase<P> {
    pub fn new(provider_config: Value) -> Self {
        Self {
            provider_config,
            pre_check: None,
            id_refresh_name: None,
            check_destroy: None,
            steps: Vec::new(),
        }
    }

    pub fn pre_check(mut self, f: impl Fn() + 'static) -> Self {
        self.pre_check = Some(Box::new(f));
        self
    }

    pub fn id_refresh_name(mut self, address: &str) -> Self {
        self.id_refresh_name = Some(address.to_string());
        self
    }

    pub fn check_destroy(mut self, check: CheckFn<P>) -> Self {
        self.check_destroy = Some(check);
        self
    }

    pub fn step(mut self, step: TestStep<P>) -> Self {
        self.steps.push(step);
        self
    }
}

/// Run `case` when `TF_ACC` is set; panics on failure.
pub fn test<P: ProviderDefinition>(definition: P, case: TestCase<P>) {
    if std::env::var_os(TF_ACC).is_none() {
        eprintln!("Acceptance tests skipped unless env '{}' set", TF_ACC);
        return;
    }

    let provider = match Provider::new(definition) {
        Ok(p) => p,
        Err(e) => panic!("failed to start provider: {}", e),
    };

    if let Err(e) = run(&provider, case) {
        panic!("{}", e);
    }
}

/// Run a test case against an already constructed provider.
pub fn run<P: ProviderDefinition>(
    provider: &Provider<P>,
    case: TestCase<P>,
) -> Result<(), AccTestError> {
    if let Some(pre_check) = &case.pre_check {
        pre_check();
    }

    let diagnostics = provider.configure(&case.provider_config);
    if has_errors(&diagnostics) {
        return Err(AccTestError::Diagnostics {
            step: 0,
            summary: summarize(&diagnostics),
        });
    }

    let mut state = TestState::default();
    let outcome = run_steps(provider, &case, &mut state);

    let before_destroy = state.clone();
    let destroyed = destroy_all(provider, &mut state);

    outcome?;
    destroyed?;

    if let Some(check) = &case.check_destroy {
        check(provider, &before_destroy).map_err(AccTestError::CheckDestroy)?;
    }

    Ok(())
}

fn run_steps<P: ProviderDefinition>(
    provider: &Provider<P>,
    case: &TestCase<P>,
    state: &mut TestState,
) -> Result<(), AccTestError> {
    for (index, step) in case.steps.iter().enumerate() {
        let number = index + 1;

        if step.import_state {
            import_step(provider, step, number, state)?;
        } else {
            config_step(provider, step, number, state)?;
        }

        for check in &step.check {
            check(provider, state).map_err(|message| AccTestError::Check {
                step: number,
                message,
            })?;
        }

        if let Some(address) = &case.id_refresh_name {
            if !step.import_state {
                verify_id_refresh(provider, address, number, state)?;
            }
        }
    }
    Ok(())
}

fn config_step<P: ProviderDefinition>(
    provider: &Provider<P>,
    step: &TestStep<P>,
    number: usize,
    state: &mut TestState,
) -> Result<(), AccTestError> {
    let text = step.config.as_deref().ok_or_else(|| AccTestError::Step {
        step: number,
        message: "step has neither a config nor an import".to_string(),
    })?;
    let declared = parse_config(text)?;

    let removed: Vec<TrackedResource> = state
        .resources
        .iter()
        .rev()
        .filter(|tracked| !declared.iter().any(|d| d.address == tracked.address))
        .cloned()
        .collect();
    for tracked in removed {
        destroy(provider, &tracked).map_err(|summary| AccTestError::Diagnostics {
            step: number,
            summary,
        })?;
        state.remove(&tracked.address);
    }

    for resource in &declared {
        let refreshed = apply_resource(provider, resource, state.resource(&resource.address))
            .map_err(|summary| AccTestError::Diagnostics {
                step: number,
                summary: format!("{}: {}", resource.address, summary),
            })?;
        state.upsert(&resource.address, &resource.type_name, refreshed);
    }

    // A second plan over the refreshed state must be empty.
    for resource in &declared {
        let prior = state.resource(&resource.address);
        let proposed = ResourceState::from_value(&resource.config);
        let plan = provider
            .plan_resource_change(&resource.type_name, prior, proposed.as_ref())
            .map_err(|d| AccTestError::Diagnostics {
                step: number,
                summary: summarize(&d),
            })?;
        let unchanged = match (prior, plan.planned_state.as_ref()) {
            (Some(prior), Some(planned)) => {
                plan.requires_replace.is_empty() && equivalent(prior, planned)
            }
            _ => false,
        };
        if !unchanged {
            return Err(AccTestError::Step {
                step: number,
                message: format!(
                    "After applying this step, the plan was not empty for {}",
                    resource.address
                ),
            });
        }
    }

    Ok(())
}

fn apply_resource<P: ProviderDefinition>(
    provider: &Provider<P>,
    resource: &ResourceConfig,
    prior: Option<&ResourceState>,
) -> Result<ResourceState, String> {
    let type_name = resource.type_name.as_str();

    let diagnostics = provider.validate_resource_config(type_name, &resource.config);
    if has_errors(&diagnostics) {
        return Err(summarize(&diagnostics));
    }

    let proposed = ResourceState::from_value(&resource.config)
        .ok_or_else(|| "resource configuration must be an object".to_string())?;
    let plan = provider
        .plan_resource_change(type_name, prior, Some(&proposed))
        .map_err(|d| summarize(&d))?;

    let mut prior = prior.cloned();
    if !plan.requires_replace.is_empty() {
        if let Some(old) = prior.take() {
            let destroyed = provider.apply_resource_change(type_name, Some(old), None);
            if has_errors(&destroyed.diagnostics) {
                return Err(summarize(&destroyed.diagnostics));
            }
        }
    }

    let new_state = match (&prior, &plan.planned_state) {
        (Some(prior), Some(planned)) if equivalent(prior, planned) => prior.clone(),
        _ => {
            let applied = provider.apply_resource_change(type_name, prior, plan.planned_state);
            if has_errors(&applied.diagnostics) {
                return Err(summarize(&applied.diagnostics));
            }
            applied
                .new_state
                .ok_or_else(|| "apply returned no state".to_string())?
        }
    };

    provider
        .read_resource(type_name, new_state)
        .map_err(|d| summarize(&d))?
        .ok_or_else(|| "resource disappeared right after apply".to_string())
}

fn import_step<P: ProviderDefinition>(
    provider: &Provider<P>,
    step: &TestStep<P>,
    number: usize,
    state: &TestState,
) -> Result<(), AccTestError> {
    let step_error = |message: String| AccTestError::Step {
        step: number,
        message,
    };

    let address = step
        .resource_name
        .as_deref()
        .ok_or_else(|| step_error("import step needs a resource name".to_string()))?;
    let tracked = state
        .resources
        .iter()
        .find(|r| r.address == address)
        .ok_or_else(|| step_error(format!("{} is not in state", address)))?;
    let id = tracked
        .state
        .get_string("id")
        .ok_or_else(|| step_error(format!("{} has no id", address)))?;

    let imported = provider
        .import_resource_state(&tracked.type_name, &id)
        .map_err(|d| AccTestError::Diagnostics {
            step: number,
            summary: summarize(&d),
        })?;

    if step.import_state_verify {
        let ignored = |key: &String| {
            step.import_state_verify_ignore
                .iter()
                .any(|prefix| key.starts_with(prefix.as_str()))
        };
        let expected: BTreeMap<String, String> = meaningful(flatten_attributes(&tracked.state))
            .into_iter()
            .filter(|(k, _)| !ignored(k))
            .collect();
        let actual: BTreeMap<String, String> = meaningful(flatten_attributes(&imported))
            .into_iter()
            .filter(|(k, _)| !ignored(k))
            .collect();

        if expected != actual {
            let mut differences = Vec::new();
            for key in expected.keys().chain(actual.keys()) {
                if expected.get(key) != actual.get(key) && !differences.contains(key) {
                    differences.push(key.clone());
                }
            }
            return Err(step_error(format!(
                "ImportStateVerify attributes not equivalent: {}",
                differences.join(", ")
            )));
        }
    }

    Ok(())
}

fn verify_id_refresh<P: ProviderDefinition>(
    provider: &Provider<P>,
    address: &str,
    number: usize,
    state: &TestState,
) -> Result<(), AccTestError> {
    let Some(tracked) = state.resources.iter().find(|r| r.address == address) else {
        return Ok(());
    };

    let refreshed = provider
        .read_resource(&tracked.type_name, tracked.state.clone())
        .map_err(|d| AccTestError::Diagnostics {
            step: number,
            summary: summarize(&d),
        })?;
    let refreshed_id = refreshed.and_then(|s| s.get_string("id"));

    if refreshed_id != tracked.state.get_string("id") {
        return Err(AccTestError::Step {
            step: number,
            message: format!("{} id changed on refresh: {:?}", address, refreshed_id),
        });
    }
    Ok(())
}

fn destroy<P: ProviderDefinition>(
    provider: &Provider<P>,
    tracked: &TrackedResource,
) -> Result<(), String> {
    let applied = provider.apply_resource_change(&tracked.type_name, Some(tracked.state.clone()), None);
    if has_errors(&applied.diagnostics) {
        return Err(format!("{}: {}", tracked.address, summarize(&applied.diagnostics)));
    }
    Ok(())
}

fn destroy_all<P: ProviderDefinition>(
    provider: &Provider<P>,
    state: &mut TestState,
) -> Result<(), AccTestError> {
    let mut failures = Vec::new();
    for tracked in state.resources.iter().rev() {
        if let Err(e) = destroy(provider, tracked) {
            failures.push(e);
        }
    }
    state.resources.clear();

    if failures.is_empty() {
        Ok(())
    } else {
        Err(AccTestError::Destroy(failures.join("; ")))
    }
}

/// Parse Terraform JSON configuration into its resource blocks.
pub fn parse_config(text: &str) -> Result<Vec<ResourceConfig>, AccTestError> {
    let document: Value =
        serde_json::from_str(text).map_err(|e| AccTestError::Config(e.to_string()))?;

    let resources = document
        .get("resource")
        .and_then(|r| r.as_object())
        .ok_or_else(|| AccTestError::Config("expected a top-level \"resource\" object".into()))?;

    let mut out = Vec::new();
    for (type_name, instances) in resources {
        let instances = instances.as_object().ok_or_else(|| {
            AccTestError::Config(format!("resource type {} must map names to bodies", type_name))
        })?;
        for (name, body) in instances {
            out.push(ResourceConfig {
                address: format!("{}.{}", type_name, name),
                type_name: type_name.clone(),
                config: body.clone(),
            });
        }
    }
    Ok(out)
}

/// Flatten state into Terraform's dotted attribute form: `subject.#` for
/// list lengths, `labels.%` for map sizes, `subject.0.kind` for values.
pub fn flatten_attributes(state: &ResourceState) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for (key, value) in &state.values {
        flatten_into(key, value, false, &mut out);
    }
    out
}

fn flatten_into(prefix: &str, value: &Value, in_list: bool, out: &mut BTreeMap<String, String>) {
    match value {
        Value::Null => {}
        Value::String(s) => {
            out.insert(prefix.to_string(), s.clone());
        }
        Value::Bool(_) | Value::Number(_) => {
            out.insert(prefix.to_string(), value.to_string());
        }
        Value::Array(items) => {
            out.insert(format!("{}.#", prefix), items.len().to_string());
            for (i, item) in items.iter().enumerate() {
                flatten_into(&format!("{}.{}", prefix, i), item, true, out);
            }
        }
        Value::Object(entries) => {
            // list elements are blocks; any other object is a map attribute
            if !in_list {
                out.insert(format!("{}.%", prefix), entries.len().to_string());
            }
            for (k, v) in entries {
                flatten_into(&format!("{}.{}", prefix, k), v, false, out);
            }
        }
    }
}

/// Flattened value of one attribute
pub fn attribute_value(state: &ResourceState, key: &str) -> Option<String> {
    flatten_attributes(state).remove(key)
}

/// Drop entries that carry no information (empty strings and zero counts),
/// so null and empty collections compare equal.
fn meaningful(flat: BTreeMap<String, String>) -> BTreeMap<String, String> {
    flat.into_iter()
        .filter(|(k, v)| {
            let is_count = k.ends_with(".#") || k.ends_with(".%");
            !(v.is_empty() || (is_count && v == "0"))
        })
        .collect()
}

/// Whether two states describe the same object.
pub fn equivalent(a: &ResourceState, b: &ResourceState) -> bool {
    meaningful(flatten_attributes(a)) == meaningful(flatten_attributes(b))
}

fn summarize(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .filter(|d| d.is_error())
        .map(|d| match &d.detail {
            Some(detail) => format!("{}: {}", d.summary, detail),
            None => d.summary.clone(),
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Random lowercase alphanumeric suffix for resource names
pub fn rand_string(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| CHARSET_ALPHA_NUM[rng.gen_range(0..CHARSET_ALPHA_NUM.len())] as char)
        .collect()
}

/// Check that `key` of the resource at `address` equals `value`.
pub fn check_resource_attr<P: ProviderDefinition>(address: &str, key: &str, value: &str) -> CheckFn<P> {
    let (address, key, value) = (address.to_string(), key.to_string(), value.to_string());
    Box::new(move |_, state| {
        let resource = state
            .resource(&address)
            .ok_or_else(|| format!("Not found: {}", address))?;
        match attribute_value(resource, &key) {
            Some(actual) if actual == value => Ok(()),
            Some(actual) => Err(format!(
                "{}: Attribute '{}' expected {:?}, got {:?}",
                address, key, value, actual
            )),
            None => Err(format!("{}: Attribute '{}' not found", address, key)),
        }
    })
}

/// Check that `key` of the resource at `address` has a non-empty value.
pub fn check_resource_attr_set<P: ProviderDefinition>(address: &str, key: &str) -> CheckFn<P> {
    let (address, key) = (address.to_string(), key.to_string());
    Box::new(move |_, state| {
        let resource = state
            .resource(&address)
            .ok_or_else(|| format!("Not found: {}", address))?;
        match attribute_value(resource, &key) {
            Some(actual) if !actual.is_empty() => Ok(()),
            _ => Err(format!("{}: Attribute '{}' expected to be set", address, key)),
        }
    })
}

/// Check that `key` of the resource at `address` is unset.
pub fn check_no_resource_attr<P: ProviderDefinition>(address: &str, key: &str) -> CheckFn<P> {
    let (address, key) = (address.to_string(), key.to_string());
    Box::new(move |_, state| {
        let resource = state
            .resource(&address)
            .ok_or_else(|| format!("Not found: {}", address))?;
        match attribute_value(resource, &key) {
            Some(actual) if !actual.is_empty() => Err(format!(
                "{}: Attribute '{}' found when not expected: {:?}",
                address, key, actual
            )),
            _ => Ok(()),
        }
    })
}

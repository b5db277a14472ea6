//! Terraform Provider Implementation
//!
//! Dispatches plugin protocol requests to the resources a provider
//! definition registers.

use crate::error::{ProviderError, ProviderResult};
use crate::protocol::{
    has_errors, Diagnostic, RpcRequest, RpcResponse, INTERNAL_ERROR, METHOD_NOT_FOUND,
    PARSE_ERROR,
};
use crate::resource::Resource;
use crate::schema::{ProviderSchema, ResourceSchema, SchemaBlock};
use crate::state::{ResourceData, ResourceState};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};
use tokio::runtime::Runtime;

/// What a concrete provider supplies: its config schema, its resources and
/// how to turn a provider block into a configured client bundle.
#[async_trait]
pub trait ProviderDefinition: Send + Sync + 'static {
    type Meta: Send + Sync + 'static;

    fn name(&self) -> &str;

    /// Schema of the provider configuration block
    fn schema(&self) -> SchemaBlock;

    fn resources(&self) -> Vec<Box<dyn Resource<Self::Meta>>>;

    async fn configure(&self, config: &ResourceState) -> ProviderResult<Self::Meta>;
}

/// Result of planning one resource change
#[derive(Debug, Clone, Default)]
pub struct PlannedChange {
    pub planned_state: Option<ResourceState>,
    pub requires_replace: Vec<Vec<String>>,
}

/// Result of applying one resource change
#[derive(Debug, Clone, Default)]
pub struct AppliedChange {
    pub new_state: Option<ResourceState>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Protocol dispatcher around a provider definition
pub struct Provider<P: ProviderDefinition> {
    definition: P,
    resources: HashMap<String, Box<dyn Resource<P::Meta>>>,
    meta: RwLock<Option<Arc<P::Meta>>>,
    runtime: Runtime,
}

impl<P: ProviderDefinition> Provider<P> {
    /// Create a new provider
    pub fn new(definition: P) -> ProviderResult<Self> {
        let resources: HashMap<String, Box<dyn Resource<P::Meta>>> = definition
            .resources()
            .into_iter()
            .map(|r| (r.type_name().to_string(), r))
            .collect();

        let runtime = Runtime::new()?;

        Ok(Self {
            definition,
            resources,
            meta: RwLock::new(None),
            runtime,
        })
    }

    pub fn name(&self) -> &str {
        self.definition.name()
    }

    /// Get provider schema
    pub fn get_schema(&self) -> ProviderSchema {
        let mut schema = ProviderSchema::new(self.definition.schema());
        for (name, resource) in &self.resources {
            schema = schema.with_resource(name, resource.schema());
        }
        schema
    }

    pub fn resource_schema(&self, type_name: &str) -> Option<ResourceSchema> {
        self.resources.get(type_name).map(|r| r.schema())
    }

    /// The configured client bundle
    pub fn meta(&self) -> ProviderResult<Arc<P::Meta>> {
        self.meta
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
            .ok_or(ProviderError::NotConfigured)
    }

    /// Run a future on the provider's runtime
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    fn resource(&self, type_name: &str) -> ProviderResult<&dyn Resource<P::Meta>> {
        self.resources
            .get(type_name)
            .map(|r| r.as_ref())
            .ok_or_else(|| ProviderError::UnknownResource(type_name.to_string()))
    }

    fn normalize(&self, resource: &dyn Resource<P::Meta>, state: ResourceState) -> ResourceState {
        ResourceState::from(resource.schema().block.normalize(&state.to_value()))
    }

    /// Configure the provider
    pub fn configure(&self, config: &Value) -> Vec<Diagnostic> {
        let schema = self.definition.schema();
        let mut diagnostics = schema.validate_config(config);
        if has_errors(&diagnostics) {
            return diagnostics;
        }

        let mut values = schema.normalize(config);
        schema.apply_defaults(&mut values);
        let config = ResourceState::from(values);

        match self.runtime.block_on(self.definition.configure(&config)) {
            Ok(meta) => {
                *self
                    .meta
                    .write()
                    .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(Arc::new(meta));
                tracing::info!(provider = self.name(), "Provider configured");
            }
            Err(e) => {
                tracing::error!(provider = self.name(), "Provider configuration failed: {}", e);
                diagnostics.push(e.into());
            }
        }

        diagnostics
    }

    pub fn validate_resource_config(&self, type_name: &str, config: &Value) -> Vec<Diagnostic> {
        match self.resource(type_name) {
            Ok(resource) => resource.schema().block.validate_config(config),
            Err(e) => vec![e.into()],
        }
    }

    /// Plan a change: apply defaults, carry computed values forward and
    /// report which changed attributes force replacement.
    pub fn plan_resource_change(
        &self,
        type_name: &str,
        prior: Option<&ResourceState>,
        proposed: Option<&ResourceState>,
    ) -> Result<PlannedChange, Vec<Diagnostic>> {
        let resource = self.resource(type_name).map_err(|e| vec![e.into()])?;

        let Some(proposed) = proposed else {
            return Ok(PlannedChange::default());
        };

        let block = resource.schema().block;
        let fresh = || {
            let mut values = block.normalize(&proposed.to_value());
            block.apply_defaults(&mut values);
            values
        };

        let mut planned = fresh();
        let mut requires_replace = Vec::new();

        if let Some(prior) = prior {
            block.carry_computed(&prior.values, &mut planned);
            requires_replace = block.requires_replace(&prior.values, &planned);
            if !requires_replace.is_empty() {
                planned = fresh();
                planned.insert("id".to_string(), Value::Null);
            }
        }

        tracing::debug!(
            resource = type_name,
            replace = !requires_replace.is_empty(),
            planned = %block.redact(&planned),
            "Planned resource change"
        );

        Ok(PlannedChange {
            planned_state: Some(ResourceState::from(planned)),
            requires_replace,
        })
    }

    /// Apply a planned change: destroy, create or update.
    pub fn apply_resource_change(
        &self,
        type_name: &str,
        prior: Option<ResourceState>,
        planned: Option<ResourceState>,
    ) -> AppliedChange {
        let failed = |prior: Option<ResourceState>, e: ProviderError| AppliedChange {
            new_state: prior,
            diagnostics: vec![e.into()],
        };

        let resource = match self.resource(type_name) {
            Ok(r) => r,
            Err(e) => return failed(prior, e),
        };
        let meta = match self.meta() {
            Ok(m) => m,
            Err(e) => return failed(prior, e),
        };

        match (prior, planned) {
            (None, None) => AppliedChange::default(),
            (Some(prior), None) => {
                let mut d = ResourceData::from_state(prior.clone());
                tracing::info!(resource = type_name, id = d.id(), "Destroying resource");
                match self.runtime.block_on(resource.delete(&mut d, meta.as_ref())) {
                    Ok(()) => AppliedChange::default(),
                    Err(e) => failed(Some(prior), e),
                }
            }
            (prior, Some(planned)) => {
                let creating = prior.is_none();
                let mut d = ResourceData::new(prior, planned);
                let result = self.runtime.block_on(async {
                    if creating {
                        tracing::info!(resource = type_name, "Creating resource");
                        resource.create(&mut d, meta.as_ref()).await
                    } else {
                        tracing::info!(resource = type_name, id = d.id(), "Updating resource");
                        resource.update(&mut d, meta.as_ref()).await
                    }
                });

                let diagnostics = match &result {
                    Ok(()) => Vec::new(),
                    Err(e) => {
                        tracing::error!(resource = type_name, id = d.id(), "Apply failed: {}", e);
                        vec![Diagnostic::error(&e.to_string())]
                    }
                };

                let new_state = d
                    .into_state(result.is_ok())
                    .map(|state| self.normalize(resource, state));

                AppliedChange {
                    new_state,
                    diagnostics,
                }
            }
        }
    }

    /// Refresh a resource. `Ok(None)` means it no longer exists.
    pub fn read_resource(
        &self,
        type_name: &str,
        current: ResourceState,
    ) -> Result<Option<ResourceState>, Vec<Diagnostic>> {
        let resource = self.resource(type_name).map_err(|e| vec![e.into()])?;
        let meta = self.meta().map_err(|e| vec![e.into()])?;
        let mut d = ResourceData::from_state(current);

        if d.id().is_empty() {
            return Ok(None);
        }

        let result: ProviderResult<Option<ResourceState>> = self.runtime.block_on(async move {
            if !resource.exists(&mut d, meta.as_ref()).await? {
                tracing::warn!(resource = type_name, "Resource no longer exists");
                return Ok(None);
            }
            resource.read(&mut d, meta.as_ref()).await?;
            Ok(d.into_state(true))
        });

        result
            .map(|state| state.map(|s| self.normalize(resource, s)))
            .map_err(|e| vec![e.into()])
    }

    /// Import an existing remote object by id.
    pub fn import_resource_state(
        &self,
        type_name: &str,
        id: &str,
    ) -> Result<ResourceState, Vec<Diagnostic>> {
        let resource = self.resource(type_name).map_err(|e| vec![e.into()])?;
        let meta = self.meta().map_err(|e| vec![e.into()])?;

        let mut import_state = ResourceState::new();
        import_state.set("id", json!(id));
        let mut d = ResourceData::from_state(import_state);

        let result: ProviderResult<Option<ResourceState>> = self.runtime.block_on(async move {
            resource.import(&mut d, meta.as_ref()).await?;
            resource.read(&mut d, meta.as_ref()).await?;
            Ok(d.into_state(true))
        });

        match result {
            Ok(Some(state)) => Ok(self.normalize(resource, state)),
            Ok(None) => Err(vec![Diagnostic::error("Cannot import non-existent remote object")
                .with_detail(&format!("{} {:?} not found", type_name, id))]),
            Err(e) => Err(vec![e.into()]),
        }
    }

    /// Handle an RPC request
    pub fn handle_request(&self, input: &str) -> String {
        let request: RpcRequest = match serde_json::from_str(input) {
            Ok(r) => r,
            Err(e) => {
                return serde_json::to_string(&RpcResponse::error(
                    0,
                    PARSE_ERROR,
                    &format!("Parse error: {}", e),
                ))
                .unwrap_or_default();
            }
        };

        tracing::debug!(method = %request.method, id = request.id, "Handling request");

        let params = &request.params;
        let response = match request.method.as_str() {
            "GetProviderSchema" => self.handle_get_schema(request.id),
            "ConfigureProvider" => {
                let config = params.get("config").cloned().unwrap_or(Value::Null);
                let diagnostics = self.configure(&config);
                RpcResponse::success(request.id, json!({ "diagnostics": diagnostics }))
            }
            "ValidateResourceConfig" => {
                let config = params.get("config").cloned().unwrap_or(Value::Null);
                let diagnostics = self.validate_resource_config(type_name(params), &config);
                RpcResponse::success(request.id, json!({ "diagnostics": diagnostics }))
            }
            "PlanResourceChange" => self.handle_plan_resource(request.id, params),
            "ApplyResourceChange" => self.handle_apply_resource(request.id, params),
            "ReadResource" => self.handle_read_resource(request.id, params),
            "ImportResourceState" => self.handle_import_resource(request.id, params),
            "StopProvider" => RpcResponse::success(request.id, json!({})),
            _ => RpcResponse::error(
                request.id,
                METHOD_NOT_FOUND,
                &format!("Method not found: {}", request.method),
            ),
        };

        serde_json::to_string(&response).unwrap_or_else(|e| {
            serde_json::to_string(&RpcResponse::error(
                request.id,
                INTERNAL_ERROR,
                &format!("Serialization error: {}", e),
            ))
            .unwrap_or_default()
        })
    }

    /// Handle GetProviderSchema
    fn handle_get_schema(&self, id: i64) -> RpcResponse {
        match serde_json::to_value(self.get_schema()) {
            Ok(schema) => RpcResponse::success(id, schema),
            Err(e) => RpcResponse::error(id, INTERNAL_ERROR, &e.to_string()),
        }
    }

    /// Handle PlanResourceChange
    fn handle_plan_resource(&self, id: i64, params: &Value) -> RpcResponse {
        let prior = state_param(params, "prior_state");
        let proposed = state_param(params, "proposed_new_state");

        match self.plan_resource_change(type_name(params), prior.as_ref(), proposed.as_ref()) {
            Ok(planned) => RpcResponse::success(
                id,
                json!({
                    "planned_state": planned.planned_state.map(|s| s.to_value()),
                    "requires_replace": planned.requires_replace,
                    "diagnostics": []
                }),
            ),
            Err(diagnostics) => RpcResponse::success(id, json!({ "diagnostics": diagnostics })),
        }
    }

    /// Handle ApplyResourceChange
    fn handle_apply_resource(&self, id: i64, params: &Value) -> RpcResponse {
        let prior = state_param(params, "prior_state");
        let planned = state_param(params, "planned_state");

        let applied = self.apply_resource_change(type_name(params), prior, planned);
        RpcResponse::success(
            id,
            json!({
                "new_state": applied.new_state.map(|s| s.to_value()),
                "diagnostics": applied.diagnostics
            }),
        )
    }

    /// Handle ReadResource
    fn handle_read_resource(&self, id: i64, params: &Value) -> RpcResponse {
        let current = state_param(params, "current_state").unwrap_or_default();

        match self.read_resource(type_name(params), current) {
            Ok(state) => RpcResponse::success(
                id,
                json!({
                    "new_state": state.map(|s| s.to_value()),
                    "diagnostics": []
                }),
            ),
            Err(diagnostics) => RpcResponse::success(id, json!({ "diagnostics": diagnostics })),
        }
    }

    /// Handle ImportResourceState
    fn handle_import_resource(&self, id: i64, params: &Value) -> RpcResponse {
        let resource_id = params.get("id").and_then(|v| v.as_str()).unwrap_or("");
        let type_name = type_name(params);

        match self.import_resource_state(type_name, resource_id) {
            Ok(state) => RpcResponse::success(
                id,
                json!({
                    "imported_resources": [{
                        "type_name": type_name,
                        "state": state.to_value()
                    }],
                    "diagnostics": []
                }),
            ),
            Err(diagnostics) => RpcResponse::success(id, json!({ "diagnostics": diagnostics })),
        }
    }
}

fn type_name(params: &Value) -> &str {
    params
        .get("type_name")
        .and_then(|v| v.as_str())
        .unwrap_or("")
}

fn state_param(params: &Value, key: &str) -> Option<ResourceState> {
    params.get(key).and_then(ResourceState::from_value)
}

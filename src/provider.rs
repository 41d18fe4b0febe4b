//! Terraform Provider Implementation
//!
//! Implements the Terraform plugin protocol dispatch for Strato.

use crate::client::{StratoClient, DEFAULT_ENDPOINT};
use crate::datasources::{get_all_data_sources, DataSource};
use crate::resources::{get_all_resources, Resource, ResourceState};
use crate::schema::{
    Diagnostic, ProviderSchema, RpcRequest, RpcResponse, SchemaAttribute, SchemaBlock,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;

/// Provider configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub endpoint: Option<String>,
    pub bearer_token: Option<String>,
}

/// Strato Terraform Provider
pub struct StratoProvider {
    client: Arc<RwLock<Option<StratoClient>>>,
    resources: HashMap<String, Box<dyn Resource>>,
    data_sources: HashMap<String, Box<dyn DataSource>>,
    runtime: Runtime,
    cancel: CancellationToken,
}

impl StratoProvider {
    /// Create a new provider
    pub fn new() -> Self {
        let resources: HashMap<String, Box<dyn Resource>> = get_all_resources()
            .into_iter()
            .map(|r| (r.type_name().to_string(), r))
            .collect();

        let data_sources: HashMap<String, Box<dyn DataSource>> = get_all_data_sources()
            .into_iter()
            .map(|d| (d.type_name().to_string(), d))
            .collect();

        let runtime = Runtime::new().expect("Failed to create Tokio runtime");

        Self {
            client: Arc::new(RwLock::new(None)),
            resources,
            data_sources,
            runtime,
            cancel: CancellationToken::new(),
        }
    }

    /// Get provider schema
    fn get_schema(&self) -> ProviderSchema {
        let provider_block = SchemaBlock::new()
            .with_attribute(
                "endpoint",
                SchemaAttribute::string()
                    .with_description("Strato API endpoint")
                    .optional()
                    .with_default(serde_json::json!(DEFAULT_ENDPOINT)),
            )
            .with_attribute(
                "bearer_token",
                SchemaAttribute::string()
                    .with_description("Bearer token for the Strato API")
                    .required()
                    .sensitive(),
            )
            .with_description("Strato managed Kubernetes provider");

        let mut schema = ProviderSchema::new(provider_block);

        for (name, resource) in &self.resources {
            schema = schema.with_resource(name, resource.schema());
        }
        for (name, data_source) in &self.data_sources {
            schema = schema.with_data_source(name, data_source.schema());
        }

        schema
    }

    /// Configure the provider
    fn configure(&self, config: ProviderConfig) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();

        let token = match &config.bearer_token {
            Some(token) if !token.is_empty() => token.clone(),
            _ => {
                diagnostics.push(
                    Diagnostic::error("bearer_token is required")
                        .with_attribute(vec!["bearer_token".to_string()]),
                );
                return diagnostics;
            }
        };

        let endpoint = config
            .endpoint
            .clone()
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

        let client = StratoClient::new(&endpoint).with_token(&token);
        *self.client.write().unwrap() = Some(client);

        diagnostics
    }

    /// Get the configured client
    fn get_client(&self) -> Result<StratoClient, Diagnostic> {
        self.client
            .read()
            .unwrap()
            .clone()
            .ok_or_else(|| Diagnostic::error("Provider not configured"))
    }

    /// Handle an RPC request
    pub fn handle_request(&self, input: &str) -> String {
        let request: RpcRequest = match serde_json::from_str(input) {
            Ok(r) => r,
            Err(e) => {
                return serde_json::to_string(&RpcResponse::error(
                    0,
                    -32700,
                    &format!("Parse error: {}", e),
                ))
                .unwrap_or_default();
            }
        };

        let response = match request.method.as_str() {
            "GetProviderSchema" => self.handle_get_schema(request.id),
            "ConfigureProvider" => self.handle_configure(request.id, &request.params),
            "ValidateResourceConfig" => self.handle_validate_resource(request.id, &request.params),
            "PlanResourceChange" => self.handle_plan_resource(request.id, &request.params),
            "ApplyResourceChange" => self.handle_apply_resource(request.id, &request.params),
            "ReadResource" => self.handle_read_resource(request.id, &request.params),
            "ReadDataSource" => self.handle_read_data_source(request.id, &request.params),
            "ImportResourceState" => self.handle_import_resource(request.id, &request.params),
            "StopProvider" => {
                // Aborts in-flight convergence waits.
                self.cancel.cancel();
                RpcResponse::success(request.id, serde_json::json!({}))
            }
            _ => RpcResponse::error(
                request.id,
                -32601,
                &format!("Method not found: {}", request.method),
            ),
        };

        serde_json::to_string(&response).unwrap_or_else(|e| {
            serde_json::to_string(&RpcResponse::error(
                request.id,
                -32603,
                &format!("Serialization error: {}", e),
            ))
            .unwrap_or_default()
        })
    }

    fn state_param(params: &Value, key: &str) -> Option<ResourceState> {
        params.get(key).and_then(|v| v.as_object()).map(|obj| {
            let values: HashMap<String, Value> =
                obj.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
            ResourceState { values }
        })
    }

    fn type_name<'a>(params: &'a Value) -> &'a str {
        params.get("type_name").and_then(|v| v.as_str()).unwrap_or("")
    }

    fn unknown_type(id: i64, type_name: &str) -> RpcResponse {
        RpcResponse::success(
            id,
            serde_json::json!({
                "diagnostics": [
                    Diagnostic::error(&format!("Unknown resource type: {}", type_name))
                ]
            }),
        )
    }

    /// Handle GetProviderSchema
    fn handle_get_schema(&self, id: i64) -> RpcResponse {
        let schema = self.get_schema();
        RpcResponse::success(id, serde_json::to_value(schema).unwrap_or_default())
    }

    /// Handle ConfigureProvider
    fn handle_configure(&self, id: i64, params: &Value) -> RpcResponse {
        let config: ProviderConfig = params
            .get("config")
            .and_then(|c| serde_json::from_value(c.clone()).ok())
            .unwrap_or_default();

        let diagnostics = self.configure(config);

        RpcResponse::success(
            id,
            serde_json::json!({
                "diagnostics": diagnostics
            }),
        )
    }

    /// Handle ValidateResourceConfig
    fn handle_validate_resource(&self, id: i64, params: &Value) -> RpcResponse {
        let type_name = Self::type_name(params);

        if !self.resources.contains_key(type_name) {
            return Self::unknown_type(id, type_name);
        }

        // Required-field presence is enforced at apply time; nothing further
        // is validated against the schema here.
        let diagnostics: Vec<Diagnostic> = Vec::new();

        RpcResponse::success(
            id,
            serde_json::json!({
                "diagnostics": diagnostics
            }),
        )
    }

    /// Handle PlanResourceChange
    fn handle_plan_resource(&self, id: i64, params: &Value) -> RpcResponse {
        let type_name = Self::type_name(params);

        let resource = match self.resources.get(type_name) {
            Some(r) => r,
            None => return Self::unknown_type(id, type_name),
        };

        let proposed_state = Self::state_param(params, "proposed_new_state").unwrap_or_default();
        let prior_state = Self::state_param(params, "prior_state");

        match resource.plan_change(prior_state.as_ref(), &proposed_state) {
            Ok(planned) => RpcResponse::success(
                id,
                serde_json::json!({
                    "planned_state": planned.values,
                    "diagnostics": []
                }),
            ),
            Err(diagnostics) => RpcResponse::success(
                id,
                serde_json::json!({
                    "diagnostics": diagnostics
                }),
            ),
        }
    }

    /// Handle ApplyResourceChange
    fn handle_apply_resource(&self, id: i64, params: &Value) -> RpcResponse {
        let type_name = Self::type_name(params);

        let resource = match self.resources.get(type_name) {
            Some(r) => r,
            None => return Self::unknown_type(id, type_name),
        };

        let client = match self.get_client() {
            Ok(c) => c,
            Err(diag) => {
                return RpcResponse::success(
                    id,
                    serde_json::json!({
                        "diagnostics": [diag]
                    }),
                );
            }
        };

        let planned_state = Self::state_param(params, "planned_state").unwrap_or_default();
        let prior_state = Self::state_param(params, "prior_state");

        let is_destroy = params
            .get("planned_state")
            .map(|v| v.is_null())
            .unwrap_or(false);

        let cancel = self.cancel.child_token();
        let result = self.runtime.block_on(async {
            if is_destroy {
                // Delete
                if let Some(prior) = prior_state {
                    resource.delete(&client, &prior, &cancel).await.map(|_| None)
                } else {
                    Ok(None)
                }
            } else if let Some(prior) = &prior_state {
                // Update
                resource
                    .update(&client, prior, &planned_state, &cancel)
                    .await
                    .map(Some)
            } else {
                // Create
                resource
                    .create(&client, &planned_state, &cancel)
                    .await
                    .map(Some)
            }
        });

        match result {
            Ok(Some(new_state)) => RpcResponse::success(
                id,
                serde_json::json!({
                    "new_state": new_state.values,
                    "diagnostics": []
                }),
            ),
            Ok(None) => RpcResponse::success(
                id,
                serde_json::json!({
                    "new_state": null,
                    "diagnostics": []
                }),
            ),
            Err(diagnostics) => RpcResponse::success(
                id,
                serde_json::json!({
                    "diagnostics": diagnostics
                }),
            ),
        }
    }

    /// Handle ReadResource
    fn handle_read_resource(&self, id: i64, params: &Value) -> RpcResponse {
        let type_name = Self::type_name(params);

        let resource = match self.resources.get(type_name) {
            Some(r) => r,
            None => return Self::unknown_type(id, type_name),
        };

        let client = match self.get_client() {
            Ok(c) => c,
            Err(diag) => {
                return RpcResponse::success(
                    id,
                    serde_json::json!({
                        "diagnostics": [diag]
                    }),
                );
            }
        };

        let current_state = Self::state_param(params, "current_state").unwrap_or_default();

        let result = self
            .runtime
            .block_on(async { resource.read(&client, &current_state).await });

        match result {
            Ok(state) => {
                if state.values.is_empty() {
                    // Resource no longer exists
                    RpcResponse::success(
                        id,
                        serde_json::json!({
                            "new_state": null,
                            "diagnostics": []
                        }),
                    )
                } else {
                    RpcResponse::success(
                        id,
                        serde_json::json!({
                            "new_state": state.values,
                            "diagnostics": []
                        }),
                    )
                }
            }
            Err(diagnostics) => RpcResponse::success(
                id,
                serde_json::json!({
                    "diagnostics": diagnostics
                }),
            ),
        }
    }

    /// Handle ReadDataSource
    fn handle_read_data_source(&self, id: i64, params: &Value) -> RpcResponse {
        let type_name = Self::type_name(params);

        let data_source = match self.data_sources.get(type_name) {
            Some(d) => d,
            None => {
                return RpcResponse::success(
                    id,
                    serde_json::json!({
                        "diagnostics": [
                            Diagnostic::error(&format!("Unknown data source type: {}", type_name))
                        ]
                    }),
                );
            }
        };

        let client = match self.get_client() {
            Ok(c) => c,
            Err(diag) => {
                return RpcResponse::success(
                    id,
                    serde_json::json!({
                        "diagnostics": [diag]
                    }),
                );
            }
        };

        let config = Self::state_param(params, "config").unwrap_or_default();

        let result = self
            .runtime
            .block_on(async { data_source.read(&client, &config).await });

        match result {
            Ok(state) => RpcResponse::success(
                id,
                serde_json::json!({
                    "state": state.values,
                    "diagnostics": []
                }),
            ),
            Err(diagnostics) => RpcResponse::success(
                id,
                serde_json::json!({
                    "diagnostics": diagnostics
                }),
            ),
        }
    }

    /// Handle ImportResourceState
    fn handle_import_resource(&self, id: i64, params: &Value) -> RpcResponse {
        let type_name = Self::type_name(params);

        let resource_id = params.get("id").and_then(|v| v.as_str()).unwrap_or("");

        let resource = match self.resources.get(type_name) {
            Some(r) => r,
            None => return Self::unknown_type(id, type_name),
        };

        let client = match self.get_client() {
            Ok(c) => c,
            Err(diag) => {
                return RpcResponse::success(
                    id,
                    serde_json::json!({
                        "diagnostics": [diag]
                    }),
                );
            }
        };

        let result = self
            .runtime
            .block_on(async { resource.import(&client, resource_id).await });

        match result {
            Ok(state) => {
                if state.values.is_empty() {
                    RpcResponse::success(
                        id,
                        serde_json::json!({
                            "diagnostics": [
                                Diagnostic::error(&format!("Resource {} not found", resource_id))
                            ]
                        }),
                    )
                } else {
                    RpcResponse::success(
                        id,
                        serde_json::json!({
                            "imported_resources": [{
                                "type_name": type_name,
                                "state": state.values
                            }],
                            "diagnostics": []
                        }),
                    )
                }
            }
            Err(diagnostics) => RpcResponse::success(
                id,
                serde_json::json!({
                    "diagnostics": diagnostics
                }),
            ),
        }
    }
}

impl Default for StratoProvider {
    fn default() -> Self {
        Self::new()
    }
}

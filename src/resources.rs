//! Terraform Resources for Strato
//!
//! The cluster and node pool resources. Every mutation is asynchronous on
//! the Strato side: the API accepts the change and reports a transitional
//! status, so each create/resize/delete here issues the request and then
//! waits for the object to converge before returning state.

use crate::client::{
    Cluster, ClientError, CreateClusterRequest, CreateNodePoolRequest, NodePool, StratoClient,
    UpdateClusterRequest, UpdateNodePoolRequest,
};
use crate::convergence::{
    converge, retry_attempts, ConvergenceOutcome, ConvergenceRequest, Observation, ResourceKind,
    WaitMode, DELETE_ATTEMPTS, POLL_DELAY,
};
use crate::schema::{AttributeType, Diagnostic, ResourceSchema, SchemaAttribute, SchemaBlock};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

/// Result type for resource operations
pub type ResourceResult<T> = Result<T, Vec<Diagnostic>>;

/// Resource state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceState {
    pub values: HashMap<String, Value>,
}

impl ResourceState {
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.values.get(key).and_then(|v| v.as_str()).map(String::from)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.values.get(key).and_then(|v| v.as_i64())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.values.get(key).and_then(|v| v.as_bool())
    }

    pub fn set(&mut self, key: &str, value: Value) {
        self.values.insert(key.to_string(), value);
    }
}

impl Default for ResourceState {
    fn default() -> Self {
        Self::new()
    }
}

/// Resource trait
#[async_trait]
pub trait Resource: Send + Sync {
    /// Resource type name
    fn type_name(&self) -> &str;

    /// Get the schema for this resource
    fn schema(&self) -> ResourceSchema;

    /// Create a new resource and wait for it to converge
    async fn create(
        &self,
        client: &StratoClient,
        planned: &ResourceState,
        cancel: &CancellationToken,
    ) -> ResourceResult<ResourceState>;

    /// Read an existing resource
    async fn read(
        &self,
        client: &StratoClient,
        current: &ResourceState,
    ) -> ResourceResult<ResourceState>;

    /// Update an existing resource and wait for it to converge
    async fn update(
        &self,
        client: &StratoClient,
        current: &ResourceState,
        planned: &ResourceState,
        cancel: &CancellationToken,
    ) -> ResourceResult<ResourceState>;

    /// Delete a resource and wait for the deletion to be confirmed
    async fn delete(
        &self,
        client: &StratoClient,
        current: &ResourceState,
        cancel: &CancellationToken,
    ) -> ResourceResult<()>;

    /// Plan changes
    fn plan_change(
        &self,
        current: Option<&ResourceState>,
        proposed: &ResourceState,
    ) -> ResourceResult<ResourceState> {
        // Default implementation: return proposed state
        let _ = current;
        Ok(proposed.clone())
    }

    /// Import an existing resource by identifier
    async fn import(&self, client: &StratoClient, id: &str) -> ResourceResult<ResourceState> {
        let mut state = ResourceState::new();
        state.set("id", serde_json::json!(id));
        self.read(client, &state).await
    }
}

// ============================================================================
// Shared helpers
// ============================================================================

fn require_string(state: &ResourceState, key: &str) -> Result<String, Vec<Diagnostic>> {
    state
        .get_string(key)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| vec![Diagnostic::error(&format!("{} is required", key))])
}

fn require_i64(state: &ResourceState, key: &str) -> Result<i64, Vec<Diagnostic>> {
    state
        .get_i64(key)
        .ok_or_else(|| vec![Diagnostic::error(&format!("{} is required", key))])
}

fn string_list(state: &ResourceState, key: &str) -> Option<Vec<String>> {
    state.get(key).and_then(|v| v.as_array()).map(|arr| {
        arr.iter()
            .filter_map(|v| v.as_str().map(String::from))
            .collect()
    })
}

fn api_error(action: &str, err: ClientError) -> Vec<Diagnostic> {
    vec![Diagnostic::error(&format!("Unable to {}", action)).with_detail(&err.to_string())]
}

fn ensure_converged(action: &str, outcome: ConvergenceOutcome) -> ResourceResult<()> {
    match outcome {
        ConvergenceOutcome::Converged => Ok(()),
        other => {
            Err(vec![Diagnostic::error(&format!("Unable to {}", action))
                .with_detail(&other.to_string())])
        }
    }
}

fn wait_request(
    kind: ResourceKind,
    mode: WaitMode,
    attempts: u32,
    cancel: &CancellationToken,
) -> ConvergenceRequest {
    ConvergenceRequest {
        kind,
        mode,
        attempts,
        delay: POLL_DELAY,
        cancel: cancel.clone(),
    }
}

async fn observe_cluster(client: &StratoClient, id: &str) -> Result<Observation, ClientError> {
    match client.get_cluster(id).await {
        Ok(cluster) => Ok(Observation::Found {
            status: cluster.status,
            deleted: cluster.deleted,
        }),
        Err(ClientError::NotFound(_)) => Ok(Observation::Missing),
        Err(e) => Err(e),
    }
}

async fn observe_node_pool(
    client: &StratoClient,
    cluster_id: &str,
    id: &str,
) -> Result<Observation, ClientError> {
    match client.get_node_pool(cluster_id, id).await {
        Ok(pool) => Ok(Observation::Found {
            status: pool.status,
            deleted: pool.deleted,
        }),
        Err(ClientError::NotFound(_)) => Ok(Observation::Missing),
        Err(e) => Err(e),
    }
}

/// Map a cluster API object into state. The network, flavor, volume size,
/// node count, and kube API visibility are configuration-only: the API never
/// reports them back, so they carry over from the planned or prior state.
fn cluster_state(cluster: &Cluster, config: &ResourceState) -> ResourceState {
    let mut state = ResourceState::new();

    for key in [
        "network_id",
        "flavor_id",
        "volume_size",
        "node_count",
        "private_kube_api",
    ] {
        if let Some(value) = config.get(key) {
            state.set(key, value.clone());
        }
    }

    state.set("id", serde_json::json!(cluster.id));
    state.set("name", serde_json::json!(cluster.name));
    state.set("cluster_id", serde_json::json!(cluster.cluster_id));
    state.set("project_id", serde_json::json!(cluster.project_id));
    state.set(
        "control_plane_name",
        serde_json::json!(cluster.control_plane_name),
    );
    state.set(
        "control_plane_namespace",
        serde_json::json!(cluster.control_plane_namespace),
    );
    state.set("keypair", serde_json::json!(cluster.keypair));
    if let Some(tags) = &cluster.tags {
        state.set("tags", serde_json::json!(tags));
    }
    state.set("status", serde_json::json!(cluster.status));
    state.set("phase", serde_json::json!(cluster.phase));
    state.set("last_error_id", serde_json::json!(cluster.last_error_id));
    state.set("created_at", serde_json::json!(cluster.created_at));
    state.set("updated_at", serde_json::json!(cluster.updated_at));
    state.set("deleted", serde_json::json!(cluster.deleted));
    if let Some(deleted_at) = cluster.deleted_at {
        state.set("deleted_at", serde_json::json!(deleted_at));
    }

    state
}

/// Map a node pool API object into state. The API normalizes the configured
/// name (it adds a prefix), so the wire name lands in `full_name` and the
/// user's `name` carries over from configuration.
fn node_pool_state(pool: &NodePool, config: &ResourceState) -> ResourceState {
    let mut state = ResourceState::new();

    if let Some(name) = config.get("name") {
        state.set("name", name.clone());
    }

    state.set("id", serde_json::json!(pool.id));
    state.set("cluster_id", serde_json::json!(pool.cluster_id));
    state.set("full_name", serde_json::json!(pool.name));
    state.set("server_group_id", serde_json::json!(pool.server_group_id));
    state.set("flavor_id", serde_json::json!(pool.flavor_id));
    state.set("network_id", serde_json::json!(pool.network_id));
    state.set("key_pair", serde_json::json!(pool.key_pair));
    state.set("volume_size", serde_json::json!(pool.volume_size));
    state.set("node_count", serde_json::json!(pool.node_count));
    state.set("is_default", serde_json::json!(pool.is_default));
    state.set("status", serde_json::json!(pool.status));
    state.set("last_error_id", serde_json::json!(pool.last_error_id));
    state.set("created_at", serde_json::json!(pool.created_at));
    state.set("updated_at", serde_json::json!(pool.updated_at));
    state.set("deleted", serde_json::json!(pool.deleted));
    if let Some(deleted_at) = pool.deleted_at {
        state.set("deleted_at", serde_json::json!(deleted_at));
    }

    state
}

// ============================================================================
// Cluster Resource
// ============================================================================

pub struct ClusterResource;

impl ClusterResource {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ClusterResource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Resource for ClusterResource {
    fn type_name(&self) -> &str {
        "strato_cluster"
    }

    fn schema(&self) -> ResourceSchema {
        let block = SchemaBlock::new()
            .with_attribute(
                "id",
                SchemaAttribute::string()
                    .with_description("Cluster identifier")
                    .computed(),
            )
            .with_attribute(
                "cluster_id",
                SchemaAttribute::string()
                    .with_description("OpenStack cluster id")
                    .required(),
            )
            .with_attribute(
                "project_id",
                SchemaAttribute::string()
                    .with_description("OpenStack project id")
                    .required(),
            )
            .with_attribute(
                "name",
                SchemaAttribute::string()
                    .with_description("Cluster name")
                    .required(),
            )
            .with_attribute(
                "keypair",
                SchemaAttribute::string()
                    .with_description("OpenStack keypair")
                    .required(),
            )
            .with_attribute(
                "network_id",
                SchemaAttribute::string()
                    .with_description("OpenStack network id")
                    .required(),
            )
            .with_attribute(
                "flavor_id",
                SchemaAttribute::string()
                    .with_description("OpenStack flavor id")
                    .required(),
            )
            .with_attribute(
                "volume_size",
                SchemaAttribute::number()
                    .with_description("Node worker volume size in GB")
                    .required(),
            )
            .with_attribute(
                "node_count",
                SchemaAttribute::number()
                    .with_description("Number of node workers")
                    .required(),
            )
            .with_attribute(
                "private_kube_api",
                SchemaAttribute::bool()
                    .with_description("Set to true to disable public access to the kube API")
                    .optional(),
            )
            .with_attribute(
                "tags",
                SchemaAttribute::list(AttributeType::String)
                    .with_description("Cluster tags")
                    .optional(),
            )
            .with_attribute(
                "control_plane_name",
                SchemaAttribute::string()
                    .with_description("Cluster control plane name")
                    .computed(),
            )
            .with_attribute(
                "control_plane_namespace",
                SchemaAttribute::string()
                    .with_description("Cluster control plane namespace")
                    .computed(),
            )
            .with_attribute(
                "status",
                SchemaAttribute::string()
                    .with_description("Cluster status")
                    .computed(),
            )
            .with_attribute(
                "phase",
                SchemaAttribute::string()
                    .with_description("Cluster phase")
                    .computed(),
            )
            .with_attribute(
                "last_error_id",
                SchemaAttribute::string()
                    .with_description("Cluster last error id")
                    .computed(),
            )
            .with_attribute(
                "created_at",
                SchemaAttribute::number()
                    .with_description("Cluster created at")
                    .computed(),
            )
            .with_attribute(
                "updated_at",
                SchemaAttribute::number()
                    .with_description("Cluster updated at")
                    .computed(),
            )
            .with_attribute(
                "deleted",
                SchemaAttribute::bool()
                    .with_description("Cluster deleted")
                    .computed(),
            )
            .with_attribute(
                "deleted_at",
                SchemaAttribute::number()
                    .with_description("Cluster deleted at")
                    .computed(),
            )
            .with_description("Manages a Strato cluster");

        ResourceSchema::new(1, block)
    }

    async fn create(
        &self,
        client: &StratoClient,
        planned: &ResourceState,
        cancel: &CancellationToken,
    ) -> ResourceResult<ResourceState> {
        let os_cluster_id = require_string(planned, "cluster_id")?;
        let os_project_id = require_string(planned, "project_id")?;
        let node_count = require_i64(planned, "node_count")?;

        let request = CreateClusterRequest {
            name: require_string(planned, "name")?,
            node_count,
            flavor_id: require_string(planned, "flavor_id")?,
            network_id: require_string(planned, "network_id")?,
            keypair: require_string(planned, "keypair")?,
            volume_size: require_i64(planned, "volume_size")?,
            tags: string_list(planned, "tags").unwrap_or_default(),
            private_kube_api: planned.get_bool("private_kube_api"),
        };

        let created = client
            .create_cluster(&os_cluster_id, &os_project_id, &request)
            .await
            .map_err(|e| api_error("create cluster", e))?;

        let wait = wait_request(
            ResourceKind::Cluster,
            WaitMode::CreateOrUpdate,
            retry_attempts(node_count),
            cancel,
        );
        let outcome = converge(&wait, || observe_cluster(client, &created.id)).await;
        ensure_converged("create cluster", outcome)?;

        let cluster = client
            .get_cluster(&created.id)
            .await
            .map_err(|e| api_error("create cluster", e))?;
        Ok(cluster_state(&cluster, planned))
    }

    async fn read(
        &self,
        client: &StratoClient,
        current: &ResourceState,
    ) -> ResourceResult<ResourceState> {
        let id = require_string(current, "id")?;

        match client.get_cluster(&id).await {
            Ok(cluster) => Ok(cluster_state(&cluster, current)),
            Err(ClientError::NotFound(_)) => {
                // Resource no longer exists
                Ok(ResourceState::new())
            }
            Err(e) => Err(api_error("read cluster", e)),
        }
    }

    async fn update(
        &self,
        client: &StratoClient,
        current: &ResourceState,
        planned: &ResourceState,
        cancel: &CancellationToken,
    ) -> ResourceResult<ResourceState> {
        let id = require_string(current, "id")?;
        let node_count = require_i64(planned, "node_count")?;

        // Resizing goes through the cluster endpoint but materializes on the
        // default node pool, so that is the object to watch.
        let pools = client
            .list_node_pools(&id, true)
            .await
            .map_err(|e| api_error("list default node pool", e))?;
        let default_pool = pools.into_iter().next().ok_or_else(|| {
            vec![Diagnostic::error("Unable to list default node pool")
                .with_detail("no node pools found")]
        })?;

        client
            .update_cluster(&id, &UpdateClusterRequest { node_count })
            .await
            .map_err(|e| api_error("update cluster", e))?;

        if default_pool.node_count != node_count {
            let wait = wait_request(
                ResourceKind::NodePool,
                WaitMode::CreateOrUpdate,
                retry_attempts(node_count),
                cancel,
            );
            let outcome = converge(&wait, || {
                observe_node_pool(client, &default_pool.cluster_id, &default_pool.id)
            })
            .await;
            ensure_converged("update cluster", outcome)?;
        }

        let cluster = client
            .get_cluster(&id)
            .await
            .map_err(|e| api_error("update cluster", e))?;
        Ok(cluster_state(&cluster, planned))
    }

    async fn delete(
        &self,
        client: &StratoClient,
        current: &ResourceState,
        cancel: &CancellationToken,
    ) -> ResourceResult<()> {
        let id = require_string(current, "id")?;

        match client.delete_cluster(&id).await {
            Ok(()) => {}
            Err(ClientError::NotFound(_)) => return Ok(()), // Already deleted
            Err(e) => return Err(api_error("delete cluster", e)),
        }

        let wait = wait_request(
            ResourceKind::Cluster,
            WaitMode::Delete,
            DELETE_ATTEMPTS,
            cancel,
        );
        let outcome = converge(&wait, || observe_cluster(client, &id)).await;
        ensure_converged("delete cluster", outcome)
    }
}

// ============================================================================
// Node Pool Resource
// ============================================================================

pub struct NodePoolResource;

impl NodePoolResource {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NodePoolResource {
    fn default() -> Self {
        Self::new()
    }
}

fn split_import_id(id: &str) -> Option<(&str, &str)> {
    id.split_once('/')
        .filter(|(cluster_id, pool_id)| !cluster_id.is_empty() && !pool_id.is_empty())
}

#[async_trait]
impl Resource for NodePoolResource {
    fn type_name(&self) -> &str {
        "strato_node_pool"
    }

    fn schema(&self) -> ResourceSchema {
        let block = SchemaBlock::new()
            .with_attribute(
                "id",
                SchemaAttribute::string()
                    .with_description("Node pool identifier")
                    .computed(),
            )
            .with_attribute(
                "cluster_id",
                SchemaAttribute::string()
                    .with_description("Cluster identifier")
                    .required(),
            )
            .with_attribute(
                "name",
                SchemaAttribute::string()
                    .with_description(
                        "Node pool name (normalized by the API, see `full_name` for the actual name)",
                    )
                    .required(),
            )
            .with_attribute(
                "flavor_id",
                SchemaAttribute::string()
                    .with_description("OpenStack flavor id")
                    .required(),
            )
            .with_attribute(
                "network_id",
                SchemaAttribute::string()
                    .with_description("OpenStack network id")
                    .required(),
            )
            .with_attribute(
                "key_pair",
                SchemaAttribute::string()
                    .with_description("OpenStack keypair")
                    .required(),
            )
            .with_attribute(
                "volume_size",
                SchemaAttribute::number()
                    .with_description("Node worker volume size in GB")
                    .required(),
            )
            .with_attribute(
                "node_count",
                SchemaAttribute::number()
                    .with_description("Number of node workers")
                    .required(),
            )
            .with_attribute(
                "full_name",
                SchemaAttribute::string()
                    .with_description("Node pool full name as normalized by the API")
                    .computed(),
            )
            .with_attribute(
                "server_group_id",
                SchemaAttribute::string()
                    .with_description("Server group identifier")
                    .computed(),
            )
            .with_attribute(
                "is_default",
                SchemaAttribute::bool()
                    .with_description("Is default node pool")
                    .computed(),
            )
            .with_attribute(
                "status",
                SchemaAttribute::string()
                    .with_description("Node pool status")
                    .computed(),
            )
            .with_attribute(
                "last_error_id",
                SchemaAttribute::string()
                    .with_description("Node pool last error id")
                    .computed(),
            )
            .with_attribute(
                "created_at",
                SchemaAttribute::number()
                    .with_description("Node pool created at")
                    .computed(),
            )
            .with_attribute(
                "updated_at",
                SchemaAttribute::number()
                    .with_description("Node pool updated at")
                    .computed(),
            )
            .with_attribute(
                "deleted",
                SchemaAttribute::bool()
                    .with_description("Node pool deleted")
                    .computed(),
            )
            .with_attribute(
                "deleted_at",
                SchemaAttribute::number()
                    .with_description("Node pool deleted at")
                    .computed(),
            )
            .with_description("Manages a Strato node pool");

        ResourceSchema::new(1, block)
    }

    async fn create(
        &self,
        client: &StratoClient,
        planned: &ResourceState,
        cancel: &CancellationToken,
    ) -> ResourceResult<ResourceState> {
        let cluster_id = require_string(planned, "cluster_id")?;
        let node_count = require_i64(planned, "node_count")?;

        let request = CreateNodePoolRequest {
            name: require_string(planned, "name")?,
            flavor_id: require_string(planned, "flavor_id")?,
            network_id: require_string(planned, "network_id")?,
            keypair: require_string(planned, "key_pair")?,
            volume_size: require_i64(planned, "volume_size")?,
            node_count,
        };

        let created = client
            .create_node_pool(&cluster_id, &request)
            .await
            .map_err(|e| api_error("create node pool", e))?;

        let wait = wait_request(
            ResourceKind::NodePool,
            WaitMode::CreateOrUpdate,
            retry_attempts(node_count),
            cancel,
        );
        let outcome = converge(&wait, || {
            observe_node_pool(client, &cluster_id, &created.id)
        })
        .await;
        ensure_converged("create node pool", outcome)?;

        let pool = client
            .get_node_pool(&cluster_id, &created.id)
            .await
            .map_err(|e| api_error("create node pool", e))?;
        Ok(node_pool_state(&pool, planned))
    }

    async fn read(
        &self,
        client: &StratoClient,
        current: &ResourceState,
    ) -> ResourceResult<ResourceState> {
        let cluster_id = require_string(current, "cluster_id")?;
        let id = require_string(current, "id")?;

        match client.get_node_pool(&cluster_id, &id).await {
            Ok(pool) => Ok(node_pool_state(&pool, current)),
            Err(ClientError::NotFound(_)) => Ok(ResourceState::new()),
            Err(e) => Err(api_error("read node pool", e)),
        }
    }

    async fn update(
        &self,
        client: &StratoClient,
        current: &ResourceState,
        planned: &ResourceState,
        cancel: &CancellationToken,
    ) -> ResourceResult<ResourceState> {
        let cluster_id = require_string(current, "cluster_id")?;
        let id = require_string(current, "id")?;
        let node_count = require_i64(planned, "node_count")?;

        client
            .update_node_pool(&cluster_id, &id, &UpdateNodePoolRequest { node_count })
            .await
            .map_err(|e| api_error("update node pool", e))?;

        let wait = wait_request(
            ResourceKind::NodePool,
            WaitMode::CreateOrUpdate,
            retry_attempts(node_count),
            cancel,
        );
        let outcome = converge(&wait, || observe_node_pool(client, &cluster_id, &id)).await;
        ensure_converged("update node pool", outcome)?;

        let pool = client
            .get_node_pool(&cluster_id, &id)
            .await
            .map_err(|e| api_error("update node pool", e))?;
        Ok(node_pool_state(&pool, planned))
    }

    async fn delete(
        &self,
        client: &StratoClient,
        current: &ResourceState,
        cancel: &CancellationToken,
    ) -> ResourceResult<()> {
        let cluster_id = require_string(current, "cluster_id")?;
        let id = require_string(current, "id")?;

        match client.delete_node_pool(&cluster_id, &id).await {
            Ok(()) => {}
            Err(ClientError::NotFound(_)) => return Ok(()),
            Err(e) => return Err(api_error("delete node pool", e)),
        }

        let wait = wait_request(
            ResourceKind::NodePool,
            WaitMode::Delete,
            DELETE_ATTEMPTS,
            cancel,
        );
        let outcome = converge(&wait, || observe_node_pool(client, &cluster_id, &id)).await;
        ensure_converged("delete node pool", outcome)
    }

    async fn import(&self, client: &StratoClient, id: &str) -> ResourceResult<ResourceState> {
        let (cluster_id, pool_id) = split_import_id(id).ok_or_else(|| {
            vec![Diagnostic::error("Invalid import id")
                .with_detail("expected the format cluster_id/node_pool_id")]
        })?;

        let mut state = ResourceState::new();
        state.set("cluster_id", serde_json::json!(cluster_id));
        state.set("id", serde_json::json!(pool_id));
        self.read(client, &state).await
    }
}

/// Get all available resources
pub fn get_all_resources() -> Vec<Box<dyn Resource>> {
    vec![
        Box::new(ClusterResource::new()),
        Box::new(NodePoolResource::new()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_cluster() -> Cluster {
        Cluster {
            id: "c-1".to_string(),
            name: "demo".to_string(),
            cluster_id: "os-cluster".to_string(),
            project_id: "os-project".to_string(),
            control_plane_name: "demo-cp".to_string(),
            control_plane_namespace: "clusters".to_string(),
            keypair: "kp".to_string(),
            tags: Some(vec!["prod".to_string()]),
            status: "READY".to_string(),
            phase: "Provisioned".to_string(),
            last_error_id: String::new(),
            created_at: 1700000000,
            updated_at: 1700000100,
            deleted: false,
            deleted_at: None,
        }
    }

    fn sample_node_pool() -> NodePool {
        NodePool {
            id: "np-1".to_string(),
            cluster_id: "c-1".to_string(),
            name: "demo-workers".to_string(),
            server_group_id: "sg-1".to_string(),
            flavor_id: "flavor-1".to_string(),
            network_id: "net-1".to_string(),
            key_pair: "kp".to_string(),
            volume_size: 50,
            node_count: 3,
            is_default: false,
            status: "READY".to_string(),
            last_error_id: String::new(),
            created_at: 1700000000,
            updated_at: 1700000100,
            deleted: false,
            deleted_at: None,
        }
    }

    #[test]
    fn test_resource_state() {
        let mut state = ResourceState::new();
        state.set("name", serde_json::json!("demo"));
        state.set("node_count", serde_json::json!(4));
        state.set("deleted", serde_json::json!(false));

        assert_eq!(state.get_string("name"), Some("demo".to_string()));
        assert_eq!(state.get_i64("node_count"), Some(4));
        assert_eq!(state.get_bool("deleted"), Some(false));
    }

    #[test]
    fn test_cluster_resource_schema() {
        let resource = ClusterResource::new();
        let schema = resource.schema();

        for key in [
            "id",
            "cluster_id",
            "project_id",
            "name",
            "keypair",
            "network_id",
            "flavor_id",
            "volume_size",
            "node_count",
            "status",
            "phase",
        ] {
            assert!(schema.block.attributes.contains_key(key), "missing {}", key);
        }
        assert!(schema.block.attributes["node_count"].required);
        assert!(schema.block.attributes["status"].computed);
    }

    #[test]
    fn test_node_pool_resource_schema() {
        let resource = NodePoolResource::new();
        let schema = resource.schema();

        for key in [
            "id",
            "cluster_id",
            "name",
            "full_name",
            "flavor_id",
            "network_id",
            "key_pair",
            "volume_size",
            "node_count",
            "is_default",
            "status",
        ] {
            assert!(schema.block.attributes.contains_key(key), "missing {}", key);
        }
        assert!(schema.block.attributes["full_name"].computed);
    }

    #[test]
    fn test_cluster_state_preserves_configured_fields() {
        let mut planned = ResourceState::new();
        planned.set("network_id", serde_json::json!("net-1"));
        planned.set("flavor_id", serde_json::json!("flavor-1"));
        planned.set("volume_size", serde_json::json!(50));
        planned.set("node_count", serde_json::json!(4));

        let state = cluster_state(&sample_cluster(), &planned);

        // Configuration-only values the API never echoes back.
        assert_eq!(state.get_string("network_id"), Some("net-1".to_string()));
        assert_eq!(state.get_i64("node_count"), Some(4));
        // Wire values win for everything the API reports.
        assert_eq!(state.get_string("id"), Some("c-1".to_string()));
        assert_eq!(state.get_string("status"), Some("READY".to_string()));
        assert_eq!(state.get_bool("deleted"), Some(false));
    }

    #[test]
    fn test_node_pool_state_keeps_configured_name() {
        let mut planned = ResourceState::new();
        planned.set("name", serde_json::json!("workers"));

        let state = node_pool_state(&sample_node_pool(), &planned);

        assert_eq!(state.get_string("name"), Some("workers".to_string()));
        assert_eq!(
            state.get_string("full_name"),
            Some("demo-workers".to_string())
        );
        assert_eq!(state.get_i64("node_count"), Some(3));
    }

    #[test]
    fn test_ensure_converged() {
        assert!(ensure_converged("create cluster", ConvergenceOutcome::Converged).is_ok());

        let err = ensure_converged(
            "create cluster",
            ConvergenceOutcome::ConvergenceFailed("cluster is in ERROR state".to_string()),
        )
        .unwrap_err();
        assert_eq!(err[0].summary, "Unable to create cluster");
        assert_eq!(
            err[0].detail,
            Some("cluster is in ERROR state".to_string())
        );

        let err = ensure_converged("delete node pool", ConvergenceOutcome::TimedOut).unwrap_err();
        assert!(err[0].detail.as_deref().unwrap_or("").contains("timed out"));
    }

    #[test]
    fn test_require_string_rejects_empty() {
        let mut state = ResourceState::new();
        state.set("name", serde_json::json!(""));
        assert!(require_string(&state, "name").is_err());
        assert!(require_string(&state, "missing").is_err());

        state.set("name", serde_json::json!("demo"));
        assert_eq!(require_string(&state, "name").unwrap(), "demo");
    }

    #[test]
    fn test_split_import_id() {
        assert_eq!(split_import_id("c-1/np-1"), Some(("c-1", "np-1")));
        assert!(split_import_id("np-1").is_none());
        assert!(split_import_id("/np-1").is_none());
        assert!(split_import_id("c-1/").is_none());
    }
}

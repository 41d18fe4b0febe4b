//! Terraform Data Sources for Strato
//!
//! Read-only lookups of existing clusters and node pools by identifier.

use crate::client::{ClientError, StratoClient};
use crate::resources::{ResourceResult, ResourceState};
use crate::schema::{AttributeType, Diagnostic, ResourceSchema, SchemaAttribute, SchemaBlock};
use async_trait::async_trait;

/// Data source trait
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Data source type name
    fn type_name(&self) -> &str;

    /// Get the schema for this data source
    fn schema(&self) -> ResourceSchema;

    /// Read the data source
    async fn read(
        &self,
        client: &StratoClient,
        config: &ResourceState,
    ) -> ResourceResult<ResourceState>;
}

fn require_string(config: &ResourceState, key: &str) -> Result<String, Vec<Diagnostic>> {
    config
        .get_string(key)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| vec![Diagnostic::error(&format!("{} is required", key))])
}

// ============================================================================
// Cluster Data Source
// ============================================================================

pub struct ClusterDataSource;

impl ClusterDataSource {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ClusterDataSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataSource for ClusterDataSource {
    fn type_name(&self) -> &str {
        "strato_cluster"
    }

    fn schema(&self) -> ResourceSchema {
        let block = SchemaBlock::new()
            .with_attribute(
                "id",
                SchemaAttribute::string()
                    .with_description("Cluster identifier")
                    .required(),
            )
            .with_attribute(
                "name",
                SchemaAttribute::string()
                    .with_description("Cluster name")
                    .computed(),
            )
            .with_attribute(
                "cluster_id",
                SchemaAttribute::string()
                    .with_description("OpenStack cluster id")
                    .computed(),
            )
            .with_attribute(
                "project_id",
                SchemaAttribute::string()
                    .with_description("OpenStack project id")
                    .computed(),
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
                "keypair",
                SchemaAttribute::string()
                    .with_description("OpenStack keypair")
                    .computed(),
            )
            .with_attribute(
                "tags",
                SchemaAttribute::list(AttributeType::String)
                    .with_description("Cluster tags")
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
            .with_description("Cluster data source");

        ResourceSchema::new(1, block)
    }

    async fn read(
        &self,
        client: &StratoClient,
        config: &ResourceState,
    ) -> ResourceResult<ResourceState> {
        let id = require_string(config, "id")?;

        let cluster = match client.get_cluster(&id).await {
            Ok(cluster) => cluster,
            Err(ClientError::NotFound(_)) => {
                return Err(vec![
                    Diagnostic::error(&format!("Cluster {} not found", id))
                ]);
            }
            Err(e) => {
                return Err(vec![Diagnostic::error("Unable to read cluster")
                    .with_detail(&e.to_string())]);
            }
        };

        let mut state = ResourceState::new();
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

        Ok(state)
    }
}

// ============================================================================
// Node Pool Data Source
// ============================================================================

pub struct NodePoolDataSource;

impl NodePoolDataSource {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NodePoolDataSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DataSource for NodePoolDataSource {
    fn type_name(&self) -> &str {
        "strato_node_pool"
    }

    fn schema(&self) -> ResourceSchema {
        let block = SchemaBlock::new()
            .with_attribute(
                "id",
                SchemaAttribute::string()
                    .with_description("Node pool identifier")
                    .required(),
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
                    .with_description("Node pool name")
                    .computed(),
            )
            .with_attribute(
                "server_group_id",
                SchemaAttribute::string()
                    .with_description("Server group identifier")
                    .computed(),
            )
            .with_attribute(
                "flavor_id",
                SchemaAttribute::string()
                    .with_description("OpenStack flavor id")
                    .computed(),
            )
            .with_attribute(
                "network_id",
                SchemaAttribute::string()
                    .with_description("OpenStack network id")
                    .computed(),
            )
            .with_attribute(
                "key_pair",
                SchemaAttribute::string()
                    .with_description("OpenStack keypair")
                    .computed(),
            )
            .with_attribute(
                "volume_size",
                SchemaAttribute::number()
                    .with_description("Node worker volume size in GB")
                    .computed(),
            )
            .with_attribute(
                "node_count",
                SchemaAttribute::number()
                    .with_description("Number of node workers")
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
            .with_description("Node pool data source");

        ResourceSchema::new(1, block)
    }

    async fn read(
        &self,
        client: &StratoClient,
        config: &ResourceState,
    ) -> ResourceResult<ResourceState> {
        let cluster_id = require_string(config, "cluster_id")?;
        let id = require_string(config, "id")?;

        let pool = match client.get_node_pool(&cluster_id, &id).await {
            Ok(pool) => pool,
            Err(ClientError::NotFound(_)) => {
                return Err(vec![
                    Diagnostic::error(&format!("Node pool {} not found", id))
                ]);
            }
            Err(e) => {
                return Err(vec![Diagnostic::error("Unable to read node pool")
                    .with_detail(&e.to_string())]);
            }
        };

        let mut state = ResourceState::new();
        state.set("id", serde_json::json!(pool.id));
        state.set("cluster_id", serde_json::json!(pool.cluster_id));
        state.set("name", serde_json::json!(pool.name));
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

        Ok(state)
    }
}

/// Get all available data sources
pub fn get_all_data_sources() -> Vec<Box<dyn DataSource>> {
    vec![
        Box::new(ClusterDataSource::new()),
        Box::new(NodePoolDataSource::new()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_data_source_schema() {
        let ds = ClusterDataSource::new();
        let schema = ds.schema();

        assert!(schema.block.attributes["id"].required);
        assert!(schema.block.attributes["name"].computed);
        assert!(schema.block.attributes["status"].computed);
    }

    #[test]
    fn test_node_pool_data_source_schema() {
        let ds = NodePoolDataSource::new();
        let schema = ds.schema();

        assert!(schema.block.attributes["id"].required);
        assert!(schema.block.attributes["cluster_id"].required);
        assert!(schema.block.attributes["node_count"].computed);
    }

    #[test]
    fn test_require_string() {
        let mut config = ResourceState::new();
        assert!(require_string(&config, "id").is_err());

        config.set("id", serde_json::json!("c-1"));
        assert_eq!(require_string(&config, "id").unwrap(), "c-1");
    }
}

//! Strato API client for the Terraform provider.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Client errors
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("Authentication failed")]
    AuthFailed,
    #[error("Resource not found: {0}")]
    NotFound(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// Public Strato API base URL, used when the provider configuration does not
/// override the endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.cloudportal.run/strato";

/// Strato API client
#[derive(Clone)]
pub struct StratoClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl StratoClient {
    /// Create a new client
    pub fn new(base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        }
    }

    /// Set the bearer token sent with every request
    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    /// Build headers for requests
    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = &self.token {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", token)) {
                headers.insert(AUTHORIZATION, value);
            }
        }

        headers
    }

    /// Log an outgoing request at debug level, with the body truncated the
    /// same way the API gateway truncates its own request log.
    fn log_request<B: Serialize>(&self, method: &str, url: &str, body: Option<&B>) {
        let body_preview = body.and_then(|b| serde_json::to_string(b).ok()).map(|mut json| {
            if json.len() > 1000 {
                json.truncate(1000);
                json.push_str("... [truncated]");
            }
            json
        });

        match body_preview {
            Some(preview) => {
                tracing::debug!(method, url, has_auth = self.token.is_some(), body = %preview, "API request")
            }
            None => {
                tracing::debug!(method, url, has_auth = self.token.is_some(), "API request")
            }
        }
    }

    /// GET request
    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        self.log_request::<()>("GET", &url, None);
        let response = self
            .client
            .get(&url)
            .headers(self.headers())
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// POST request
    async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        self.log_request("POST", &url, Some(body));
        let response = self
            .client
            .post(&url)
            .headers(self.headers())
            .json(body)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// PUT request
    async fn put<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        self.log_request("PUT", &url, Some(body));
        let response = self
            .client
            .put(&url)
            .headers(self.headers())
            .json(body)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// DELETE request
    async fn delete(&self, path: &str) -> Result<()> {
        let url = format!("{}{}", self.base_url, path);
        self.log_request::<()>("DELETE", &url, None);
        let response = self
            .client
            .delete(&url)
            .headers(self.headers())
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else if status.as_u16() == 404 {
            Err(ClientError::NotFound("Resource not found".to_string()))
        } else {
            let message = response.text().await.unwrap_or_default();
            Err(ClientError::Api {
                status: status.as_u16(),
                message,
            })
        }
    }

    /// Handle API response
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();

        if status.is_success() {
            let body = response.text().await?;
            Ok(serde_json::from_str(&body)?)
        } else if status.as_u16() == 401 {
            Err(ClientError::AuthFailed)
        } else if status.as_u16() == 404 {
            Err(ClientError::NotFound("Resource not found".to_string()))
        } else {
            let message = response.text().await.unwrap_or_default();
            Err(ClientError::Api {
                status: status.as_u16(),
                message,
            })
        }
    }
}

// ============================================================================
// API Data Types
// ============================================================================

/// Cluster data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cluster {
    pub id: String,
    pub name: String,
    pub cluster_id: String,
    pub project_id: String,
    pub control_plane_name: String,
    pub control_plane_namespace: String,
    pub keypair: String,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    pub status: String,
    pub phase: String,
    pub last_error_id: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub deleted: bool,
    #[serde(default)]
    pub deleted_at: Option<i64>,
}

/// Create cluster request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateClusterRequest {
    pub name: String,
    pub node_count: i64,
    pub flavor_id: String,
    pub network_id: String,
    pub keypair: String,
    pub volume_size: i64,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_kube_api: Option<bool>,
}

/// Update (resize) cluster request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateClusterRequest {
    pub node_count: i64,
}

/// Node pool data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodePool {
    pub id: String,
    pub cluster_id: String,
    pub name: String,
    pub server_group_id: String,
    pub flavor_id: String,
    pub network_id: String,
    pub key_pair: String,
    pub volume_size: i64,
    pub node_count: i64,
    pub is_default: bool,
    pub status: String,
    pub last_error_id: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub deleted: bool,
    #[serde(default)]
    pub deleted_at: Option<i64>,
}

/// Create node pool request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateNodePoolRequest {
    pub name: String,
    pub flavor_id: String,
    pub network_id: String,
    pub keypair: String,
    pub volume_size: i64,
    pub node_count: i64,
}

/// Update (resize) node pool request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateNodePoolRequest {
    pub node_count: i64,
}

// ============================================================================
// API Methods
// ============================================================================

impl StratoClient {
    // Cluster operations

    /// Create a cluster. The OpenStack scope travels as headers, not body.
    pub async fn create_cluster(
        &self,
        os_cluster_id: &str,
        os_project_id: &str,
        request: &CreateClusterRequest,
    ) -> Result<Cluster> {
        let url = format!("{}/clusters", self.base_url);
        self.log_request("POST", &url, Some(request));
        let response = self
            .client
            .post(&url)
            .headers(self.headers())
            .header("X-OS-Cluster-ID", os_cluster_id)
            .header("X-OS-Project-ID", os_project_id)
            .json(request)
            .send()
            .await?;

        self.handle_response(response).await
    }

    pub async fn get_cluster(&self, id: &str) -> Result<Cluster> {
        self.get(&format!("/clusters/{}", id)).await
    }

    pub async fn update_cluster(&self, id: &str, request: &UpdateClusterRequest) -> Result<Cluster> {
        self.put(&format!("/clusters/{}", id), request).await
    }

    pub async fn delete_cluster(&self, id: &str) -> Result<()> {
        self.delete(&format!("/clusters/{}", id)).await
    }

    // Node pool operations

    pub async fn list_node_pools(&self, cluster_id: &str, only_default: bool) -> Result<Vec<NodePool>> {
        self.get(&format!(
            "/clusters/{}/nodepools?only_default={}",
            cluster_id, only_default
        ))
        .await
    }

    pub async fn create_node_pool(
        &self,
        cluster_id: &str,
        request: &CreateNodePoolRequest,
    ) -> Result<NodePool> {
        self.post(&format!("/clusters/{}/nodepools", cluster_id), request)
            .await
    }

    pub async fn get_node_pool(&self, cluster_id: &str, id: &str) -> Result<NodePool> {
        self.get(&format!("/clusters/{}/nodepools/{}", cluster_id, id))
            .await
    }

    pub async fn update_node_pool(
        &self,
        cluster_id: &str,
        id: &str,
        request: &UpdateNodePoolRequest,
    ) -> Result<NodePool> {
        self.put(&format!("/clusters/{}/nodepools/{}", cluster_id, id), request)
            .await
    }

    pub async fn delete_node_pool(&self, cluster_id: &str, id: &str) -> Result<()> {
        self.delete(&format!("/clusters/{}/nodepools/{}", cluster_id, id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = StratoClient::new(DEFAULT_ENDPOINT);
        assert!(client.token.is_none());
        assert_eq!(client.base_url, "https://api.cloudportal.run/strato");
    }

    #[test]
    fn test_client_with_token() {
        let client = StratoClient::new(DEFAULT_ENDPOINT).with_token("test-token");
        assert_eq!(client.token, Some("test-token".to_string()));
    }

    #[test]
    fn test_trailing_slash_is_normalized() {
        let client = StratoClient::new("https://api.example.test/strato/");
        assert_eq!(client.base_url, "https://api.example.test/strato");
    }

    #[test]
    fn test_create_cluster_request_serialization() {
        let request = CreateClusterRequest {
            name: "demo".to_string(),
            node_count: 3,
            flavor_id: "flavor-1".to_string(),
            network_id: "net-1".to_string(),
            keypair: "kp".to_string(),
            volume_size: 50,
            tags: vec![],
            private_kube_api: None,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["node_count"], 3);
        // Unset optionals stay off the wire entirely.
        assert!(json.get("private_kube_api").is_none());
    }
}

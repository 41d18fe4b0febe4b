//! Terraform Schema Types
//!
//! Schema, diagnostic, and JSON-RPC envelope types for the plugin protocol.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Attribute type for schema
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    String,
    Number,
    Bool,
    List(Box<AttributeType>),
}

/// Schema attribute
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaAttribute {
    #[serde(rename = "type")]
    pub attr_type: AttributeType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub computed: bool,
    #[serde(default)]
    pub sensitive: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
}

impl SchemaAttribute {
    fn new(attr_type: AttributeType) -> Self {
        Self {
            attr_type,
            description: None,
            required: false,
            optional: false,
            computed: false,
            sensitive: false,
            default: None,
        }
    }

    pub fn string() -> Self {
        Self::new(AttributeType::String)
    }

    pub fn number() -> Self {
        Self::new(AttributeType::Number)
    }

    pub fn bool() -> Self {
        Self::new(AttributeType::Bool)
    }

    pub fn list(element_type: AttributeType) -> Self {
        Self::new(AttributeType::List(Box::new(element_type)))
    }

    pub fn with_description(mut self, desc: &str) -> Self {
        self.description = Some(desc.to_string());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self.optional = false;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self.required = false;
        self
    }

    pub fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn with_default(mut self, value: serde_json::Value) -> Self {
        self.default = Some(value);
        self
    }
}

/// Attribute block for a resource, data source, or the provider itself
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaBlock {
    pub attributes: HashMap<String, SchemaAttribute>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl SchemaBlock {
    pub fn new() -> Self {
        Self {
            attributes: HashMap::new(),
            description: None,
        }
    }

    pub fn with_attribute(mut self, name: &str, attr: SchemaAttribute) -> Self {
        self.attributes.insert(name.to_string(), attr);
        self
    }

    pub fn with_description(mut self, desc: &str) -> Self {
        self.description = Some(desc.to_string());
        self
    }
}

impl Default for SchemaBlock {
    fn default() -> Self {
        Self::new()
    }
}

/// Resource schema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceSchema {
    pub version: i64,
    pub block: SchemaBlock,
}

impl ResourceSchema {
    pub fn new(version: i64, block: SchemaBlock) -> Self {
        Self { version, block }
    }
}

/// Provider schema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSchema {
    pub provider: SchemaBlock,
    pub resource_schemas: HashMap<String, ResourceSchema>,
    pub data_source_schemas: HashMap<String, ResourceSchema>,
}

impl ProviderSchema {
    pub fn new(provider: SchemaBlock) -> Self {
        Self {
            provider,
            resource_schemas: HashMap::new(),
            data_source_schemas: HashMap::new(),
        }
    }

    pub fn with_resource(mut self, name: &str, schema: ResourceSchema) -> Self {
        self.resource_schemas.insert(name.to_string(), schema);
        self
    }

    pub fn with_data_source(mut self, name: &str, schema: ResourceSchema) -> Self {
        self.data_source_schemas.insert(name.to_string(), schema);
        self
    }
}

// ============================================================================
// Terraform Plugin Protocol Messages
// ============================================================================

/// JSON-RPC request
#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    #[allow(dead_code)]
    pub jsonrpc: String,
    pub id: i64,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// JSON-RPC response
#[derive(Debug, Serialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

/// JSON-RPC error
#[derive(Debug, Serialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl RpcResponse {
    pub fn success(id: i64, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: i64, code: i32, message: &str) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(RpcError {
                code,
                message: message.to_string(),
                data: None,
            }),
        }
    }
}

/// Diagnostic severity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticSeverity {
    Invalid,
    Error,
    Warning,
}

/// Diagnostic message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: DiagnosticSeverity,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<Vec<String>>,
}

impl Diagnostic {
    pub fn error(summary: &str) -> Self {
        Self {
            severity: DiagnosticSeverity::Error,
            summary: summary.to_string(),
            detail: None,
            attribute: None,
        }
    }

    pub fn with_detail(mut self, detail: &str) -> Self {
        self.detail = Some(detail.to_string());
        self
    }

    pub fn with_attribute(mut self, path: Vec<String>) -> Self {
        self.attribute = Some(path);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_attribute_builder() {
        let attr = SchemaAttribute::string()
            .with_description("Bearer token")
            .required()
            .sensitive();

        assert!(attr.required);
        assert!(attr.sensitive);
        assert_eq!(attr.description, Some("Bearer token".to_string()));
    }

    #[test]
    fn test_schema_block_builder() {
        let block = SchemaBlock::new()
            .with_attribute("name", SchemaAttribute::string().required())
            .with_attribute("node_count", SchemaAttribute::number().required())
            .with_description("Test block");

        assert!(block.attributes.contains_key("name"));
        assert!(block.attributes.contains_key("node_count"));
        assert_eq!(block.description, Some("Test block".to_string()));
    }

    #[test]
    fn test_rpc_response_success() {
        let response = RpcResponse::success(1, serde_json::json!({"status": "ok"}));
        assert!(response.result.is_some());
        assert!(response.error.is_none());
    }

    #[test]
    fn test_rpc_response_error() {
        let response = RpcResponse::error(1, -32600, "Invalid request");
        assert!(response.result.is_none());
        assert!(response.error.is_some());
        assert_eq!(response.error.unwrap().code, -32600);
    }

    #[test]
    fn test_diagnostic_with_detail() {
        let diag = Diagnostic::error("Unable to create cluster")
            .with_detail("cluster is in ERROR state");

        assert_eq!(diag.summary, "Unable to create cluster");
        assert_eq!(diag.detail, Some("cluster is in ERROR state".to_string()));
    }
}

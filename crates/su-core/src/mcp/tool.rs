use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::client::McpClient;
use crate::tools::Tool;

/// Tool definition as advertised by `tools/list`.
#[derive(Debug, Clone, Deserialize)]
pub struct McpToolDef {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "inputSchema", default = "empty_object_schema")]
    pub input_schema: Value,
}

fn empty_object_schema() -> Value {
    serde_json::json!({"type": "object", "properties": {}})
}

/// Result of `tools/call`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolOutput {
    #[serde(default)]
    pub content: Vec<Content>,
    #[serde(default)]
    pub is_error: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Content {
    Text {
        text: String,
    },
    Image {
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    Resource {
        resource: Value,
    },
    #[serde(other)]
    Other,
}

impl ToolOutput {
    pub fn is_error(&self) -> bool {
        self.is_error.unwrap_or(false)
    }

    /// Flatten content blocks into plain text.
    pub fn to_text(&self) -> String {
        self.content
            .iter()
            .map(|c| match c {
                Content::Text { text } => text.clone(),
                Content::Image { mime_type } => format!("[image: {mime_type}]"),
                Content::Resource { resource } => resource
                    .get("text")
                    .and_then(|t| t.as_str())
                    .or_else(|| resource.get("uri").and_then(|u| u.as_str()))
                    .unwrap_or("[resource]")
                    .to_string(),
                Content::Other => "[unsupported content]".to_string(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A tool served by an MCP process, exposed under its own name.
pub struct McpTool {
    server: String,
    definition: McpToolDef,
    client: Arc<McpClient>,
}

impl McpTool {
    pub fn new(server: &str, definition: McpToolDef, client: Arc<McpClient>) -> Self {
        Self {
            server: server.to_string(),
            definition,
            client,
        }
    }
}

#[async_trait]
impl Tool for McpTool {
    fn name(&self) -> &str {
        &self.definition.name
    }

    fn description(&self) -> &str {
        self.definition.description.as_deref().unwrap_or("MCP tool")
    }

    fn parameters_schema(&self) -> Value {
        self.definition.input_schema.clone()
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let output = self.client.call_tool(&self.definition.name, params).await?;
        if output.is_error() {
            bail!("{} (server '{}')", output.to_text(), self.server);
        }
        Ok(output.to_text())
    }
}

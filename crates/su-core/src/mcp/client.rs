//! Connection to a single stdio MCP server.
//!
//! The wire protocol is handled by `rmcp`: the server runs as a child
//! process and this client keeps the running service plus a cloneable peer
//! for tool calls.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use rmcp::service::{Peer, RunningService};
use rmcp::transport::TokioChildProcess;
use rmcp::{RoleClient, ServiceExt};
use serde::Serialize;
use serde_json::Value;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::config::McpServerConfig;
use super::tool::{McpToolDef, ToolOutput};

pub struct McpClient {
    name: String,
    peer: Peer<RoleClient>,
    service: Mutex<Option<RunningService<RoleClient, ()>>>,
    timeout: Duration,
}

impl McpClient {
    /// Spawn the server in `working_dir` and complete the MCP handshake.
    pub async fn connect(
        name: &str,
        config: &McpServerConfig,
        working_dir: &Path,
        timeout: Duration,
    ) -> Result<Self> {
        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args)
            .envs(&config.env)
            .current_dir(working_dir)
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let transport = TokioChildProcess::new(cmd)
            .with_context(|| format!("failed to spawn MCP server '{name}' ({})", config.command))?;
        // A handshake that times out drops the transport, which kills the child.
        let service = tokio::time::timeout(timeout, ().serve(transport))
            .await
            .map_err(|_| anyhow!("MCP server '{name}' did not initialize within {timeout:?}"))?
            .map_err(|e| anyhow!("MCP server '{name}' failed to initialize: {e}"))?;

        info!("Connected to MCP server '{name}' ({})", config.command);
        Ok(Self {
            name: name.to_string(),
            peer: service.peer().clone(),
            service: Mutex::new(Some(service)),
            timeout,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Every tool the server advertises, following pagination.
    pub async fn list_tools(&self) -> Result<Vec<McpToolDef>> {
        let tools = tokio::time::timeout(self.timeout, self.peer.list_all_tools())
            .await
            .map_err(|_| anyhow!("tools/list on '{}' timed out", self.name))?
            .map_err(|e| anyhow!("tools/list on '{}' failed: {e}", self.name))?;
        tools.iter().map(convert).collect()
    }

    /// Call `tool` with a JSON object of arguments.
    pub async fn call_tool(&self, tool: &str, arguments: Value) -> Result<ToolOutput> {
        let arguments = match arguments {
            Value::Object(map) => Some(map),
            Value::Null => None,
            other => return Err(anyhow!("arguments for '{tool}' must be an object, got {other}")),
        };
        let params = serde_json::from_value(serde_json::json!({
            "name": tool,
            "arguments": arguments,
        }))?;
        debug!("MCP '{}' tools/call {tool}", self.name);
        let result = tokio::time::timeout(self.timeout, self.peer.call_tool(params))
            .await
            .map_err(|_| anyhow!("tool '{tool}' on '{}' timed out", self.name))?
            .map_err(|e| anyhow!("tool '{tool}' on '{}' failed: {e}", self.name))?;
        convert(&result)
    }

    /// Stop the service and the child process. Later calls fail.
    pub async fn close(&self) {
        let Some(service) = self.service.lock().await.take() else {
            return;
        };
        match service.cancel().await {
            Ok(reason) => debug!("MCP server '{}' stopped: {reason:?}", self.name),
            Err(e) => warn!("MCP server '{}' did not stop cleanly: {e}", self.name),
        }
    }
}

/// Re-read an `rmcp` model value as one of our own serde types.
fn convert<T: serde::de::DeserializeOwned>(value: &impl Serialize) -> Result<T> {
    Ok(serde_json::from_value(serde_json::to_value(value)?)?)
}

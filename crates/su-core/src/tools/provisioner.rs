//! Builds the tool collection an agent runs with.
//!
//! Built-in tools come first, then whatever the agent's MCP servers expose.
//! Every spawned server is owned here until [`ToolProvisioner::shutdown`].

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use su_config::McpSettings;
use tracing::{debug, info, warn};

use super::{CurrentTimeTool, Tool, ToolSet};
use crate::agent::AgentDescriptor;
use crate::mcp::{McpConfig, McpHub};

pub struct ToolProvisioner {
    settings: McpSettings,
    builtins: ToolSet,
    cache: HashMap<String, ToolSet>,
    hubs: Vec<McpHub>,
}

impl ToolProvisioner {
    pub fn new(settings: McpSettings) -> Self {
        let mut builtins = ToolSet::new();
        builtins.register(Arc::new(CurrentTimeTool));
        Self {
            settings,
            builtins,
            cache: HashMap::new(),
            hubs: Vec::new(),
        }
    }

    pub fn builtins(&self) -> &ToolSet {
        &self.builtins
    }

    /// Tools for one agent: built-ins merged with its MCP tools. The result
    /// is cached by agent name, so servers are spawned at most once.
    pub async fn load_tools(&mut self, descriptor: &AgentDescriptor) -> ToolSet {
        if let Some(cached) = self.cache.get(&descriptor.name) {
            debug!("Using cached tools for agent '{}'", descriptor.name);
            return cached.clone();
        }

        let mut tools = self.builtins.clone();
        let config_path = descriptor.mcp_config_path(&self.settings.config_file);
        tools.extend(self.load_mcp_tools(&config_path).await.iter().cloned());

        info!(
            "Agent '{}' has {} tool(s): {}",
            descriptor.name,
            tools.len(),
            tools.names().join(", ")
        );
        self.cache.insert(descriptor.name.clone(), tools.clone());
        tools
    }

    /// Tools served by the MCP servers declared in `path`. Missing or
    /// malformed config, and servers that fail to start, yield fewer tools,
    /// never an error.
    pub async fn load_mcp_tools(&mut self, path: &Path) -> ToolSet {
        let config = match McpConfig::load(path).await {
            Ok(c) => c,
            Err(e) => {
                warn!("Ignoring MCP config: {e:#}");
                return ToolSet::new();
            }
        };
        if config.is_empty() {
            return ToolSet::new();
        }

        let working_dir = path.parent().unwrap_or_else(|| Path::new("."));
        let timeout = Duration::from_secs(self.settings.request_timeout_secs.max(1));
        let mut hub = McpHub::new(config, working_dir, timeout);
        let loaded: Vec<Arc<dyn Tool>> = hub.get_tools().await;

        let mut tools = ToolSet::new();
        tools.extend(loaded);
        if hub.client_count() > 0 {
            self.hubs.push(hub);
        }
        tools
    }

    /// Number of live MCP connections across all agents.
    pub fn server_count(&self) -> usize {
        self.hubs.iter().map(McpHub::client_count).sum()
    }

    /// Close every MCP server spawned so far and forget cached tool sets.
    pub async fn shutdown(&mut self) {
        let count = self.server_count();
        for mut hub in self.hubs.drain(..) {
            hub.close().await;
        }
        self.cache.clear();
        if count > 0 {
            info!("Closed {count} MCP server(s)");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentRegistry;

    /// Minimal MCP server: answers the handshake, lists one `echo` tool and
    /// echoes its `text` argument. Writes its pid to the file in argv[1].
    const ECHO_SERVER: &str = r#"
import json, os, sys
with open(sys.argv[1], "w") as f:
    f.write(str(os.getpid()))
for line in sys.stdin:
    msg = json.loads(line)
    if "id" not in msg:
        continue
    method = msg.get("method")
    if method == "initialize":
        result = {"protocolVersion": msg["params"]["protocolVersion"],
                  "capabilities": {"tools": {}},
                  "serverInfo": {"name": "echo", "version": "0.1.0"}}
    elif method == "tools/list":
        result = {"tools": [{"name": "echo", "description": "Echo text back",
                             "inputSchema": {"type": "object",
                                             "properties": {"text": {"type": "string"}},
                                             "required": ["text"]}}]}
    elif method == "tools/call":
        text = msg["params"]["arguments"]["text"]
        result = {"content": [{"type": "text", "text": "echo: " + text}], "isError": False}
    else:
        print(json.dumps({"jsonrpc": "2.0", "id": msg["id"],
                          "error": {"code": -32601, "message": "method not found"}}), flush=True)
        continue
    print(json.dumps({"jsonrpc": "2.0", "id": msg["id"], "result": result}), flush=True)
"#;

    /// Gone, or a zombie waiting to be reaped.
    #[cfg(target_os = "linux")]
    fn process_exited(pid: &str) -> bool {
        match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
            Err(_) => true,
            Ok(stat) => stat
                .rsplit(')')
                .next()
                .is_some_and(|rest| rest.trim_start().starts_with('Z')),
        }
    }

    fn write_agent(root: &Path, name: &str, mcp: Option<&str>) {
        let dir = root.join(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("agent.json"),
            r#"{"graphs": {"main": "./graph.json:graph"}}"#,
        )
        .unwrap();
        std::fs::write(dir.join("graph.json"), r#"{"graph": {"nodes": []}}"#).unwrap();
        if let Some(content) = mcp {
            std::fs::write(dir.join("mcp_config.json"), content).unwrap();
        }
    }

    #[tokio::test]
    async fn missing_config_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let mut provisioner = ToolProvisioner::new(McpSettings::default());
        let tools = provisioner
            .load_mcp_tools(&tmp.path().join("nope.json"))
            .await;
        assert!(tools.is_empty());
        assert_eq!(provisioner.server_count(), 0);
    }

    #[tokio::test]
    async fn malformed_config_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("mcp_config.json");
        std::fs::write(&path, "{ not json").unwrap();
        let mut provisioner = ToolProvisioner::new(McpSettings::default());
        assert!(provisioner.load_mcp_tools(&path).await.is_empty());
    }

    #[tokio::test]
    async fn unspawnable_server_is_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("mcp_config.json");
        std::fs::write(
            &path,
            r#"{"mcpServers": {"ghost": {"command": "/definitely/not/a/binary"}}}"#,
        )
        .unwrap();
        let mut provisioner = ToolProvisioner::new(McpSettings::default());
        assert!(provisioner.load_mcp_tools(&path).await.is_empty());
        assert_eq!(provisioner.server_count(), 0);
    }

    #[tokio::test]
    async fn agent_without_servers_gets_builtins_and_is_cached() {
        let tmp = tempfile::tempdir().unwrap();
        write_agent(tmp.path(), "plain", Some(r#"{"mcpServers": {}}"#));
        let mut registry = AgentRegistry::new(tmp.path());
        registry.scan();
        let descriptor = registry.get("plain").unwrap();

        let mut provisioner = ToolProvisioner::new(McpSettings::default());
        let first = provisioner.load_tools(descriptor).await;
        assert_eq!(first.names(), vec!["get_current_time"]);

        let second = provisioner.load_tools(descriptor).await;
        assert_eq!(second.len(), first.len());

        provisioner.shutdown().await;
        assert_eq!(provisioner.server_count(), 0);
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn live_server_tools_merge_and_shutdown_stops_child() {
        let Ok(python) = which::which("python3") else {
            eprintln!("python3 not found, skipping");
            return;
        };
        let tmp = tempfile::tempdir().unwrap();
        let script = tmp.path().join("echo_server.py");
        let pid_file = tmp.path().join("server.pid");
        std::fs::write(&script, ECHO_SERVER).unwrap();
        let mcp = serde_json::json!({
            "mcpServers": {"echo": {"command": python, "args": [script, pid_file]}}
        });
        write_agent(tmp.path(), "echoer", Some(&mcp.to_string()));
        let mut registry = AgentRegistry::new(tmp.path());
        registry.scan();
        let descriptor = registry.get("echoer").unwrap();

        let mut provisioner = ToolProvisioner::new(McpSettings::default());
        let tools = provisioner.load_tools(descriptor).await;
        assert_eq!(tools.names(), vec!["get_current_time", "echo"]);
        assert_eq!(provisioner.server_count(), 1);

        let out = tools
            .execute("echo", serde_json::json!({"text": "hi"}))
            .await
            .unwrap();
        assert_eq!(out, "echo: hi");
        assert!(tools.execute("echo", serde_json::json!({})).await.is_err());

        let pid = std::fs::read_to_string(&pid_file).unwrap();
        provisioner.shutdown().await;
        assert_eq!(provisioner.server_count(), 0);
        assert!(tools
            .execute("echo", serde_json::json!({"text": "again"}))
            .await
            .is_err());

        let mut exited = false;
        for _ in 0..50 {
            if process_exited(pid.trim()) {
                exited = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(exited, "server process {pid} still running after shutdown");
    }
}

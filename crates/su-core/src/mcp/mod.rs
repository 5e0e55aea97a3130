//! Client side of the Model Context Protocol for local stdio tool servers.
//!
//! A server is an external process speaking MCP over its stdin/stdout via
//! `rmcp`. [`McpHub`] owns every process spawned for one config file and
//! exposes their tools through the common [`Tool`](crate::tools::Tool) trait.

pub mod client;
pub mod config;
pub mod tool;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

pub use client::McpClient;
pub use config::{McpConfig, McpServerConfig};
pub use tool::{McpTool, McpToolDef};

use crate::tools::Tool;

/// Set of connections built from one MCP config file.
pub struct McpHub {
    config: McpConfig,
    working_dir: PathBuf,
    timeout: Duration,
    clients: Vec<Arc<McpClient>>,
}

impl McpHub {
    pub fn new(config: McpConfig, working_dir: &Path, timeout: Duration) -> Self {
        Self {
            config,
            working_dir: working_dir.to_path_buf(),
            timeout,
            clients: Vec::new(),
        }
    }

    /// Spawn every configured server and collect its tools.
    ///
    /// A server that fails to start, initialize or list its tools is logged
    /// and skipped; the others still contribute.
    pub async fn get_tools(&mut self) -> Vec<Arc<dyn Tool>> {
        let mut tools: Vec<Arc<dyn Tool>> = Vec::new();
        for (name, server) in &self.config.servers {
            match self.connect_one(name, server).await {
                Ok((client, defs)) => {
                    info!("MCP server '{name}' provides {} tool(s)", defs.len());
                    for def in defs {
                        tools.push(Arc::new(McpTool::new(name, def, client.clone())));
                    }
                    self.clients.push(client);
                }
                Err(e) => warn!("MCP server '{name}' unavailable: {e:#}"),
            }
        }
        tools
    }

    async fn connect_one(
        &self,
        name: &str,
        server: &McpServerConfig,
    ) -> anyhow::Result<(Arc<McpClient>, Vec<McpToolDef>)> {
        let client = Arc::new(
            McpClient::connect(name, server, &self.working_dir, self.timeout).await?,
        );
        match client.list_tools().await {
            Ok(defs) => Ok((client, defs)),
            Err(e) => {
                client.close().await;
                Err(e)
            }
        }
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Terminate every spawned server process.
    pub async fn close(&mut self) {
        for client in self.clients.drain(..) {
            debug!("Closing MCP server '{}'", client.name());
            client.close().await;
        }
    }
}

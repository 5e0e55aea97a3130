//! `mcp_config.json` parsing.
//!
//! ```json
//! { "mcpServers": { "files": { "command": "npx", "args": ["-y", "server"], "env": {} } } }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConfig {
    #[serde(default)]
    mcp_servers: BTreeMap<String, serde_json::Value>,
}

/// A local server launched as a child process.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct McpServerConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

/// Servers declared in one config file, ordered by name.
#[derive(Debug, Clone, Default)]
pub struct McpConfig {
    pub servers: Vec<(String, McpServerConfig)>,
}

impl McpConfig {
    /// Read a config file. A missing file is an empty config; unreadable or
    /// malformed content is an error.
    pub async fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No MCP config at {}", path.display());
            return Ok(Self::default());
        }
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Parse config JSON. Entries without a `command` are skipped with a
    /// warning rather than failing the whole file.
    pub fn parse(content: &str) -> Result<Self> {
        let raw: RawConfig = serde_json::from_str(content)?;
        let mut servers = Vec::new();
        for (name, value) in raw.mcp_servers {
            match serde_json::from_value::<McpServerConfig>(value) {
                Ok(mut server) => {
                    server.env = server
                        .env
                        .into_iter()
                        .map(|(k, v)| (k, expand_env_vars(&v)))
                        .collect();
                    servers.push((name, server));
                }
                Err(e) => warn!("Skipping MCP server '{name}': {e}"),
            }
        }
        Ok(Self { servers })
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }
}

/// Expand `${VAR}` references from the process environment. Unset variables
/// expand to an empty string.
fn expand_env_vars(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("${") {
        let Some(len) = rest[start..].find('}') else {
            break;
        };
        out.push_str(&rest[..start]);
        let var = &rest[start + 2..start + len];
        match std::env::var(var) {
            Ok(v) => out.push_str(&v),
            Err(_) => warn!("Environment variable {var} referenced by MCP config is not set"),
        }
        rest = &rest[start + len + 1..];
    }
    out.push_str(rest);
    out
}

//! Parsing of an agent package's on-disk metadata.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::LoadedAgent;
use crate::error::AgentError;

/// Descriptor filenames, in lookup order.
pub const DESCRIPTOR_FILES: &[&str] = &["agent.json", "langgraph.json"];

/// Entry files recognised when no descriptor graph reference resolves.
pub const CONVENTIONAL_ENTRIES: &[&str] = &["graph.json", "agent_graph.json", "workflow.json"];

/// Extra settings files merged into [`AgentDescriptor::config`].
const SETTINGS_FILES: &[&str] = &["config.json", "agent_config.json"];

/// A `<module path>:<symbol>` reference from the descriptor's `graphs` map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphRef {
    pub id: String,
    /// Module path relative to the package root, without a leading `./`.
    pub module: PathBuf,
    pub symbol: String,
}

impl GraphRef {
    pub fn parse(id: &str, reference: &str) -> Result<Self, String> {
        let (module, symbol) = reference
            .rsplit_once(':')
            .ok_or_else(|| format!("graph '{id}': expected '<path>:<symbol>', got '{reference}'"))?;
        let module = module.trim().trim_start_matches("./");
        let symbol = symbol.trim();
        if module.is_empty() || symbol.is_empty() {
            return Err(format!("graph '{id}': empty path or symbol in '{reference}'"));
        }
        Ok(Self {
            id: id.to_string(),
            module: PathBuf::from(module),
            symbol: symbol.to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DescriptorFile {
    #[serde(default)]
    graphs: Option<Map<String, Value>>,
    #[serde(default)]
    dependencies: Vec<Value>,
    #[serde(default)]
    mcp_config: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

/// Everything a scan learns about one agent directory.
#[derive(Debug, Clone)]
pub struct AgentDescriptor {
    pub name: String,
    pub path: PathBuf,
    pub valid: bool,
    pub descriptor_file: Option<PathBuf>,
    /// Module file of the first declared graph, relative to `path`.
    pub entry_point: Option<PathBuf>,
    pub graphs: Vec<GraphRef>,
    pub dependencies: Vec<String>,
    pub description: Option<String>,
    /// MCP config filename from the descriptor, relative to `path`.
    pub mcp_config: Option<String>,
    /// Merged contents of `config.json` / `agent_config.json`.
    pub config: Map<String, Value>,
    /// Why the package was rejected, when `valid` is false.
    pub error: Option<String>,
    pub(crate) loaded: Option<Arc<LoadedAgent>>,
}

impl AgentDescriptor {
    fn shell(name: &str, path: &Path) -> Self {
        Self {
            name: name.to_string(),
            path: path.to_path_buf(),
            valid: false,
            descriptor_file: None,
            entry_point: None,
            graphs: Vec::new(),
            dependencies: Vec::new(),
            description: None,
            mcp_config: None,
            config: Map::new(),
            error: None,
            loaded: None,
        }
    }

    /// Inspect one package directory. Never fails: problems are recorded in
    /// `error` and leave the descriptor invalid.
    pub fn scan(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut desc = Self::shell(&name, path);
        match desc.inspect() {
            Ok(()) => {
                desc.valid = true;
                debug!("Agent '{name}' is valid (entry {:?})", desc.entry_point);
            }
            Err(e) => {
                warn!("Agent '{name}' is invalid: {e}");
                let descriptor_file = desc.descriptor_file.take();
                desc = Self::shell(&name, path);
                desc.descriptor_file = descriptor_file;
                desc.entry_point = desc.conventional_entry();
                desc.error = Some(e.to_string());
            }
        }
        desc
    }

    fn inspect(&mut self) -> Result<(), AgentError> {
        let file = DESCRIPTOR_FILES
            .iter()
            .map(|f| self.path.join(f))
            .find(|p| p.is_file())
            .ok_or_else(|| AgentError::Descriptor {
                path: self.path.clone(),
                reason: format!("no {} found", DESCRIPTOR_FILES.join(" or ")),
            })?;
        self.descriptor_file = Some(file.clone());

        let content = std::fs::read_to_string(&file).map_err(|e| AgentError::io(&file, e))?;
        let raw: DescriptorFile =
            serde_json::from_str(&content).map_err(|e| AgentError::Descriptor {
                path: file.clone(),
                reason: e.to_string(),
            })?;
        let invalid = |reason: String| AgentError::Descriptor {
            path: file.clone(),
            reason,
        };

        let graphs = raw
            .graphs
            .filter(|g| !g.is_empty())
            .ok_or_else(|| invalid("\"graphs\" must be a non-empty object".into()))?;
        for (id, reference) in &graphs {
            let reference = reference
                .as_str()
                .ok_or_else(|| invalid(format!("graph '{id}' must be a string reference")))?;
            let graph = GraphRef::parse(id, reference).map_err(&invalid)?;
            if !self.path.join(&graph.module).is_file() {
                return Err(invalid(format!(
                    "graph module '{}' does not exist",
                    graph.module.display()
                )));
            }
            self.graphs.push(graph);
        }
        self.entry_point = self.graphs.first().map(|g| g.module.clone());

        self.description = raw.description;
        self.mcp_config = raw.mcp_config;
        self.dependencies = self.collect_dependencies(&raw.dependencies);
        self.config = self.load_settings();
        Ok(())
    }

    fn conventional_entry(&self) -> Option<PathBuf> {
        CONVENTIONAL_ENTRIES
            .iter()
            .map(PathBuf::from)
            .find(|f| self.path.join(f).is_file())
    }

    /// Union of descriptor dependencies, `requirements.txt` lines and
    /// `Cargo.toml` dependency names, first occurrence wins.
    fn collect_dependencies(&self, declared: &[Value]) -> Vec<String> {
        let mut deps: Vec<String> = declared
            .iter()
            .filter_map(|v| v.as_str())
            .map(str::trim)
            .filter(|d| !d.is_empty() && *d != ".")
            .map(str::to_string)
            .collect();

        let requirements = self.path.join("requirements.txt");
        if let Ok(content) = std::fs::read_to_string(&requirements) {
            deps.extend(
                content
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty() && !l.starts_with('#'))
                    .map(str::to_string),
            );
        }

        let manifest = self.path.join("Cargo.toml");
        if let Ok(content) = std::fs::read_to_string(&manifest) {
            match content.parse::<toml::Table>() {
                Ok(table) => {
                    if let Some(section) = table.get("dependencies").and_then(|d| d.as_table()) {
                        deps.extend(section.keys().cloned());
                    }
                }
                Err(e) => warn!("Ignoring unparseable {}: {e}", manifest.display()),
            }
        }

        let mut seen = std::collections::HashSet::new();
        deps.retain(|d| seen.insert(d.clone()));
        deps
    }

    fn load_settings(&self) -> Map<String, Value> {
        let mut merged = Map::new();
        for file in SETTINGS_FILES {
            let path = self.path.join(file);
            let Ok(content) = std::fs::read_to_string(&path) else {
                continue;
            };
            match serde_json::from_str::<Map<String, Value>>(&content) {
                Ok(values) => merged.extend(values),
                Err(e) => warn!("Ignoring {}: {e}", path.display()),
            }
        }
        merged
    }

    /// First declared graph reference.
    pub fn primary_graph(&self) -> Option<&GraphRef> {
        self.graphs.first()
    }

    /// Location of the agent's MCP config: the descriptor's `mcpConfig` if
    /// set, else `default_file`, both relative to the package root.
    pub fn mcp_config_path(&self, default_file: &str) -> PathBuf {
        self.path
            .join(self.mcp_config.as_deref().unwrap_or(default_file))
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn package(files: &[(&str, &str)]) -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("pkg");
        std::fs::create_dir_all(&dir).unwrap();
        for (name, content) in files {
            let path = dir.join(name);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(path, content).unwrap();
        }
        tmp
    }

    #[test]
    fn graph_ref_strips_relative_prefix() {
        let r = GraphRef::parse("main", "./src/graph.json:graph").unwrap();
        assert_eq!(r.module, PathBuf::from("src/graph.json"));
        assert_eq!(r.symbol, "graph");
        assert!(GraphRef::parse("main", "./graph.json").is_err());
        assert!(GraphRef::parse("main", "graph.json:").is_err());
    }

    #[test]
    fn valid_package_collects_everything() {
        let tmp = package(&[
            (
                "agent.json",
                r#"{"graphs": {"main": "./src/graph.json:graph"},
                    "dependencies": [".", "serde", "tokio"],
                    "mcpConfig": "tools.json",
                    "description": "demo"}"#,
            ),
            ("src/graph.json", r#"{"graph": {"nodes": []}}"#),
            ("requirements.txt", "# pinned\ntokio\nreqwest\n\n"),
            ("Cargo.toml", "[package]\nname = \"x\"\n[dependencies]\nserde = \"1\"\nuuid = \"1\"\n"),
            ("config.json", r#"{"greeting": "hi"}"#),
        ]);
        let desc = AgentDescriptor::scan(&tmp.path().join("pkg"));
        assert!(desc.valid, "{:?}", desc.error);
        assert_eq!(desc.entry_point, Some(PathBuf::from("src/graph.json")));
        assert_eq!(desc.dependencies, vec!["serde", "tokio", "reqwest", "uuid"]);
        assert_eq!(desc.description.as_deref(), Some("demo"));
        assert_eq!(desc.mcp_config_path("mcp_config.json"), tmp.path().join("pkg/tools.json"));
        assert_eq!(desc.config.get("greeting"), Some(&Value::from("hi")));
    }

    #[test]
    fn langgraph_json_is_accepted() {
        let tmp = package(&[
            ("langgraph.json", r#"{"graphs": {"agent": "./graph.json:graph"}}"#),
            ("graph.json", "{}"),
        ]);
        let desc = AgentDescriptor::scan(&tmp.path().join("pkg"));
        assert!(desc.valid);
        assert_eq!(desc.mcp_config_path("mcp_config.json"), tmp.path().join("pkg/mcp_config.json"));
    }

    #[test]
    fn missing_descriptor_falls_back_to_conventional_entry() {
        let tmp = package(&[("workflow.json", "{}")]);
        let desc = AgentDescriptor::scan(&tmp.path().join("pkg"));
        assert!(!desc.valid);
        assert!(desc.descriptor_file.is_none());
        assert_eq!(desc.entry_point, Some(PathBuf::from("workflow.json")));
    }

    #[test]
    fn empty_graphs_is_invalid() {
        let tmp = package(&[("agent.json", r#"{"graphs": {}}"#)]);
        let desc = AgentDescriptor::scan(&tmp.path().join("pkg"));
        assert!(!desc.valid);
        assert!(desc.error.unwrap().contains("non-empty"));
    }

    #[test]
    fn missing_module_file_is_invalid() {
        let tmp = package(&[("agent.json", r#"{"graphs": {"a": "./gone.json:graph"}}"#)]);
        let desc = AgentDescriptor::scan(&tmp.path().join("pkg"));
        assert!(!desc.valid);
        assert!(desc.error.unwrap().contains("gone.json"));
    }

    #[test]
    fn malformed_descriptor_is_invalid() {
        let tmp = package(&[("agent.json", "{ graphs: ")]);
        let desc = AgentDescriptor::scan(&tmp.path().join("pkg"));
        assert!(!desc.valid);
        assert!(desc.graphs.is_empty());
    }
}

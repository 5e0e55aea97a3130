//! Turns a scanned, valid [`AgentDescriptor`] into runnable graphs.

use std::sync::Arc;

use tracing::{debug, error, info};

use super::{AgentContext, AgentDescriptor, AgentRegistry};
use crate::error::AgentError;
use crate::graph::{Graph, GraphModule, SpecGraph};
use crate::llm::ChatModel;
use crate::tools::{ToolProvisioner, ToolSet};

/// A loaded agent: its plain graph, the optional checkpointed variant and
/// the context both were built with.
pub struct LoadedAgent {
    pub name: String,
    pub description: Option<String>,
    pub context: Arc<AgentContext>,
    graph: Arc<dyn Graph>,
    checkpointed: Option<Arc<dyn Graph>>,
}

impl LoadedAgent {
    pub fn graph(&self) -> &Arc<dyn Graph> {
        &self.graph
    }

    pub fn checkpointed(&self) -> Option<&Arc<dyn Graph>> {
        self.checkpointed.as_ref()
    }

    /// Graph used for new turns: the checkpointed variant when there is
    /// one, so a later resume finds the checkpoint this run writes.
    pub fn active_graph(&self) -> &Arc<dyn Graph> {
        self.checkpointed.as_ref().unwrap_or(&self.graph)
    }

    pub fn tools(&self) -> &ToolSet {
        &self.context.tools
    }
}

impl std::fmt::Debug for LoadedAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedAgent")
            .field("name", &self.name)
            .field("graph", &self.graph.name())
            .field("checkpointed", &self.checkpointed.is_some())
            .finish()
    }
}

pub struct AgentLoader {
    provisioner: ToolProvisioner,
    model: Option<Arc<dyn ChatModel>>,
}

impl AgentLoader {
    pub fn new(provisioner: ToolProvisioner, model: Option<Arc<dyn ChatModel>>) -> Self {
        Self { provisioner, model }
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    /// Load an agent, or `None` with the cause logged. Repeated loads of the
    /// same descriptor return the same handle.
    pub async fn load(&mut self, registry: &mut AgentRegistry, name: &str) -> Option<Arc<LoadedAgent>> {
        match self.try_load(registry, name).await {
            Ok(agent) => Some(agent),
            Err(e) => {
                error!("Failed to load agent '{name}': {e:#}");
                None
            }
        }
    }

    pub async fn try_load(
        &mut self,
        registry: &mut AgentRegistry,
        name: &str,
    ) -> Result<Arc<LoadedAgent>, AgentError> {
        let descriptor = registry
            .get(name)
            .ok_or_else(|| AgentError::UnknownAgent(name.to_string()))?;
        if !descriptor.valid {
            return Err(AgentError::InvalidAgent(name.to_string()));
        }
        if let Some(loaded) = &descriptor.loaded {
            debug!("Agent '{name}' already loaded");
            return Ok(Arc::clone(loaded));
        }

        let descriptor = descriptor.clone();
        let agent = Arc::new(self.build(&descriptor).await?);
        if let Some(slot) = registry.get_mut(name) {
            slot.loaded = Some(Arc::clone(&agent));
        }
        info!(
            "Loaded agent '{name}' (graph '{}', checkpointed: {})",
            agent.graph.name(),
            agent.checkpointed.is_some()
        );
        Ok(agent)
    }

    async fn build(&mut self, descriptor: &AgentDescriptor) -> Result<LoadedAgent, AgentError> {
        let graph_ref = descriptor
            .primary_graph()
            .ok_or_else(|| AgentError::InvalidAgent(descriptor.name.clone()))?;
        let module = GraphModule::load(&descriptor.path.join(&graph_ref.module))?;
        let mut spec = module.spec(&graph_ref.symbol)?;
        spec.checkpointer = None;
        let spec_description = spec.description.clone();

        let tools = self.provisioner.load_tools(descriptor).await;
        let context = Arc::new(
            AgentContext::new(&descriptor.name, &descriptor.path)
                .with_tools(tools)
                .with_model(self.model.clone())
                .with_settings(descriptor.config.clone()),
        );

        let graph: Arc<dyn Graph> =
            Arc::new(SpecGraph::new(&graph_ref.symbol, spec, Arc::clone(&context)));
        let checkpointed = Self::build_checkpointed(descriptor, &context);

        Ok(LoadedAgent {
            name: descriptor.name.clone(),
            description: descriptor.description.clone().or(spec_description),
            context,
            graph,
            checkpointed,
        })
    }

    /// Best effort: re-read the graph module and build the checkpointed
    /// variant of the primary graph. Any failure means no variant.
    fn build_checkpointed(
        descriptor: &AgentDescriptor,
        context: &Arc<AgentContext>,
    ) -> Option<Arc<dyn Graph>> {
        let graph_ref = descriptor.primary_graph()?;
        let module = match GraphModule::load(&descriptor.path.join(&graph_ref.module)) {
            Ok(m) => m,
            Err(e) => {
                debug!("No checkpointed variant for '{}': {e}", descriptor.name);
                return None;
            }
        };
        match module.checkpointed_spec(&graph_ref.symbol)? {
            Ok(spec) => Some(Arc::new(SpecGraph::new(
                format!("{}_with_memory", graph_ref.symbol),
                spec,
                Arc::clone(context),
            ))),
            Err(e) => {
                debug!("No checkpointed variant for '{}': {e}", descriptor.name);
                None
            }
        }
    }

    /// Close every tool server started for loaded agents.
    pub async fn shutdown(&mut self) {
        self.provisioner.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use su_config::McpSettings;

    use super::*;

    fn write(path: &Path, content: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn fixture() -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        write(
            &root.join("plain/agent.json"),
            r#"{"graphs": {"main": "./graph.json:graph"}}"#,
        );
        write(
            &root.join("plain/graph.json"),
            r#"{"graph": {"description": "echoes", "nodes": [{"kind": "reply", "text": "hi"}]}}"#,
        );
        write(
            &root.join("resumable/agent.json"),
            r#"{"graphs": {"main": "./graph.json:graph"}, "description": "asks first"}"#,
        );
        write(
            &root.join("resumable/graph.json"),
            r#"{
                "graph": {"nodes": [{"kind": "confirm"}]},
                "graph_with_memory": {"nodes": [{"kind": "confirm"}]}
            }"#,
        );
        write(
            &root.join("badsymbol/agent.json"),
            r#"{"graphs": {"main": "./graph.json:nothere"}}"#,
        );
        write(&root.join("badsymbol/graph.json"), r#"{"graph": {"nodes": []}}"#);
        write(&root.join("invalid/agent.json"), r#"{"graphs": {}}"#);
        tmp
    }

    fn loader() -> AgentLoader {
        AgentLoader::new(ToolProvisioner::new(McpSettings::default()), None)
    }

    #[tokio::test]
    async fn second_load_returns_same_handle() {
        let tmp = fixture();
        let mut registry = AgentRegistry::new(tmp.path());
        registry.scan();
        let mut loader = loader();

        let first = loader.load(&mut registry, "plain").await.unwrap();
        assert!(registry.get("plain").unwrap().is_loaded());
        let second = loader.load(&mut registry, "plain").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.description.as_deref(), Some("echoes"));
        assert!(first.checkpointed().is_none());
        assert!(!first.active_graph().is_checkpointed());
    }

    #[tokio::test]
    async fn rescan_forgets_loaded_handles() {
        let tmp = fixture();
        let mut registry = AgentRegistry::new(tmp.path());
        registry.scan();
        let mut loader = loader();
        let first = loader.load(&mut registry, "plain").await.unwrap();

        registry.scan();
        assert!(!registry.get("plain").unwrap().is_loaded());
        let again = loader.load(&mut registry, "plain").await.unwrap();
        assert!(!Arc::ptr_eq(&first, &again));
    }

    #[tokio::test]
    async fn factory_symbol_gives_checkpointed_variant() {
        let tmp = fixture();
        let mut registry = AgentRegistry::new(tmp.path());
        registry.scan();
        let agent = loader().load(&mut registry, "resumable").await.unwrap();

        assert!(!agent.graph().is_checkpointed());
        let variant = agent.checkpointed().unwrap();
        assert!(variant.is_checkpointed());
        assert_eq!(variant.name(), "graph_with_memory");
        assert!(agent.active_graph().is_checkpointed());
        assert_eq!(agent.description.as_deref(), Some("asks first"));
        assert_eq!(agent.tools().names(), vec!["get_current_time"]);
    }

    #[tokio::test]
    async fn failures_return_none() {
        let tmp = fixture();
        let mut registry = AgentRegistry::new(tmp.path());
        registry.scan();
        let mut loader = loader();

        assert!(loader.load(&mut registry, "nobody").await.is_none());
        assert!(loader.load(&mut registry, "invalid").await.is_none());
        assert!(matches!(
            loader.try_load(&mut registry, "badsymbol").await,
            Err(AgentError::MissingGraph { .. })
        ));
        assert!(!registry.get("badsymbol").unwrap().is_loaded());
    }
}

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::llm::ChatModel;
use crate::tools::ToolSet;

/// Everything an agent's graph may depend on, handed over explicitly when
/// the graph is built. Paths resolve against `root`, never the process cwd.
#[derive(Clone)]
pub struct AgentContext {
    pub name: String,
    pub root: PathBuf,
    /// `src/` under the package root, when present.
    pub src_dir: Option<PathBuf>,
    pub tools: ToolSet,
    pub model: Option<Arc<dyn ChatModel>>,
    pub settings: Map<String, Value>,
}

impl AgentContext {
    pub fn new(name: impl Into<String>, root: &Path) -> Self {
        let src = root.join("src");
        Self {
            name: name.into(),
            root: root.to_path_buf(),
            src_dir: src.is_dir().then_some(src),
            tools: ToolSet::new(),
            model: None,
            settings: Map::new(),
        }
    }

    pub fn with_tools(mut self, tools: ToolSet) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_model(mut self, model: Option<Arc<dyn ChatModel>>) -> Self {
        self.model = model;
        self
    }

    pub fn with_settings(mut self, settings: Map<String, Value>) -> Self {
        self.settings = settings;
        self
    }

    /// Resolve a package-relative path against `root`, falling back to
    /// `src_dir` when only that copy exists. Absolute paths pass through.
    pub fn resolve(&self, relative: impl AsRef<Path>) -> PathBuf {
        let relative = relative.as_ref();
        let at_root = self.root.join(relative);
        if at_root.exists() {
            return at_root;
        }
        self.src_dir
            .as_ref()
            .map(|src| src.join(relative))
            .filter(|p| p.exists())
            .unwrap_or(at_root)
    }

    /// A string value from the agent's merged settings files.
    pub fn setting(&self, key: &str) -> Option<&str> {
        self.settings.get(key).and_then(Value::as_str)
    }
}

impl std::fmt::Debug for AgentContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentContext")
            .field("name", &self.name)
            .field("root", &self.root)
            .field("src_dir", &self.src_dir)
            .field("tools", &self.tools)
            .field("model", &self.model.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn src_dir_detected_and_paths_resolve_against_root() {
        let tmp = tempfile::tempdir().unwrap();
        let bare = AgentContext::new("a", tmp.path());
        assert!(bare.src_dir.is_none());

        std::fs::create_dir(tmp.path().join("src")).unwrap();
        let ctx = AgentContext::new("a", tmp.path());
        assert_eq!(ctx.src_dir, Some(tmp.path().join("src")));
        assert_eq!(ctx.resolve("data/x.json"), tmp.path().join("data/x.json"));
        assert_eq!(ctx.resolve("/etc/hosts"), PathBuf::from("/etc/hosts"));
    }

    #[test]
    fn resolve_prefers_root_then_src() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join("src")).unwrap();
        std::fs::write(tmp.path().join("src/prompt.md"), "from src").unwrap();
        let ctx = AgentContext::new("a", tmp.path());
        assert_eq!(ctx.resolve("prompt.md"), tmp.path().join("src/prompt.md"));

        std::fs::write(tmp.path().join("prompt.md"), "from root").unwrap();
        assert_eq!(ctx.resolve("prompt.md"), tmp.path().join("prompt.md"));
    }

    #[test]
    fn settings_expose_strings_only() {
        let mut settings = Map::new();
        settings.insert("systemPrompt".into(), Value::from("Be brief."));
        settings.insert("retries".into(), Value::from(3));
        let ctx = AgentContext::new("a", Path::new("/tmp")).with_settings(settings);
        assert_eq!(ctx.setting("systemPrompt"), Some("Be brief."));
        assert_eq!(ctx.setting("retries"), None);
        assert_eq!(ctx.setting("missing"), None);
    }
}

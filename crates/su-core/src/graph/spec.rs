//! Declarative graph documents.
//!
//! A graph module is a JSON object whose keys are symbols and whose values
//! are [`GraphSpec`]s:
//!
//! ```json
//! {
//!   "graph": {
//!     "description": "Asks before reading the clock",
//!     "checkpointer": "memory",
//!     "nodes": [
//!       {"kind": "confirm", "name": "confirm", "message": "I will read the clock.", "question": "Proceed?"},
//!       {"kind": "tool", "name": "clock", "tool": "get_current_time"},
//!       {"kind": "reply", "name": "summary", "text": "The time is {last_tool}."}
//!     ]
//!   }
//! }
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AgentError;

/// Suffix of the conventional symbol holding the checkpointed variant.
pub const CHECKPOINTED_SUFFIX: &str = "_with_memory";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSpec {
    #[serde(default)]
    pub description: Option<String>,
    /// `"memory"` wires the graph to an in-process checkpoint store.
    #[serde(default)]
    pub checkpointer: Option<String>,
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
}

impl GraphSpec {
    pub fn wants_checkpointer(&self) -> bool {
        self.checkpointer.as_deref() == Some("memory")
    }

    fn validate(&self) -> Result<(), String> {
        if let Some(other) = self.checkpointer.as_deref().filter(|c| *c != "memory") {
            return Err(format!("unsupported checkpointer '{other}'"));
        }
        let mut seen = HashSet::new();
        for node in &self.nodes {
            if !seen.insert(node.name()) {
                return Err(format!("duplicate node name '{}'", node.name()));
            }
            if let NodeSpec::Tool { tool, .. } = node {
                if tool.trim().is_empty() {
                    return Err(format!("node '{}' names no tool", node.name()));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NodeSpec {
    /// Ask the chat model to answer from the current messages.
    Chatbot {
        #[serde(default)]
        name: String,
        #[serde(default, rename = "systemPrompt")]
        system_prompt: Option<String>,
        /// Package-relative file read as the system prompt when
        /// `systemPrompt` is absent.
        #[serde(default, rename = "systemPromptFile")]
        system_prompt_file: Option<String>,
        #[serde(default = "default_true", rename = "useTools")]
        use_tools: bool,
    },
    /// Pause for a human decision.
    Confirm {
        #[serde(default)]
        name: String,
        #[serde(default)]
        message: String,
        #[serde(default = "default_question")]
        question: String,
    },
    /// Call one tool with fixed arguments.
    Tool {
        #[serde(default)]
        name: String,
        tool: String,
        #[serde(default = "empty_args")]
        args: Value,
    },
    /// Emit a fixed assistant message. `{last_tool}` and `{last_user}` are
    /// replaced with the latest tool output and user message.
    Reply {
        #[serde(default)]
        name: String,
        text: String,
    },
}

fn default_true() -> bool {
    true
}

fn default_question() -> String {
    "Do you want to proceed?".into()
}

fn empty_args() -> Value {
    Value::Object(Map::new())
}

impl NodeSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Chatbot { .. } => "chatbot",
            Self::Confirm { .. } => "confirm",
            Self::Tool { .. } => "tool",
            Self::Reply { .. } => "reply",
        }
    }

    /// Node name, falling back to its kind when unnamed.
    pub fn name(&self) -> &str {
        let name = match self {
            Self::Chatbot { name, .. }
            | Self::Confirm { name, .. }
            | Self::Tool { name, .. }
            | Self::Reply { name, .. } => name,
        };
        if name.is_empty() {
            self.kind()
        } else {
            name
        }
    }
}

/// A parsed graph module file.
#[derive(Debug, Clone)]
pub struct GraphModule {
    path: PathBuf,
    symbols: Map<String, Value>,
}

impl GraphModule {
    pub fn load(path: &Path) -> Result<Self, AgentError> {
        let content = std::fs::read_to_string(path).map_err(|e| AgentError::io(path, e))?;
        Self::parse(path, &content)
    }

    pub fn parse(path: &Path, content: &str) -> Result<Self, AgentError> {
        let value: Value = serde_json::from_str(content).map_err(|e| AgentError::GraphSpec {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        match value {
            Value::Object(symbols) => Ok(Self {
                path: path.to_path_buf(),
                symbols,
            }),
            _ => Err(AgentError::GraphSpec {
                path: path.to_path_buf(),
                reason: "top level must be an object of graph symbols".into(),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn has_symbol(&self, symbol: &str) -> bool {
        self.symbols.contains_key(symbol)
    }

    /// Parse and validate the graph bound to `symbol`.
    pub fn spec(&self, symbol: &str) -> Result<GraphSpec, AgentError> {
        let raw = self
            .symbols
            .get(symbol)
            .ok_or_else(|| AgentError::MissingGraph {
                path: self.path.clone(),
                symbol: symbol.to_string(),
            })?;
        let spec: GraphSpec =
            serde_json::from_value(raw.clone()).map_err(|e| self.invalid(symbol, e.to_string()))?;
        spec.validate().map_err(|reason| self.invalid(symbol, reason))?;
        Ok(spec)
    }

    /// The checkpointed variant of `symbol`: an explicit
    /// `<symbol>_with_memory` entry, else the base spec when it asks for a
    /// checkpointer. `None` when neither applies.
    pub fn checkpointed_spec(&self, symbol: &str) -> Option<Result<GraphSpec, AgentError>> {
        let factory = format!("{symbol}{CHECKPOINTED_SUFFIX}");
        if self.has_symbol(&factory) {
            return Some(self.spec(&factory).map(|mut spec| {
                spec.checkpointer = Some("memory".into());
                spec
            }));
        }
        match self.spec(symbol) {
            Ok(spec) if spec.wants_checkpointer() => Some(Ok(spec)),
            Ok(_) => None,
            Err(e) => Some(Err(e)),
        }
    }

    fn invalid(&self, symbol: &str, reason: String) -> AgentError {
        AgentError::GraphSpec {
            path: self.path.clone(),
            reason: format!("{symbol}: {reason}"),
        }
    }
}

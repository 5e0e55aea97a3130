pub mod builtin;
pub mod provisioner;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

pub use builtin::CurrentTimeTool;
pub use provisioner::ToolProvisioner;

/// Trait for tools callable from a graph, whether built in or served by an
/// external MCP process.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters_schema(&self) -> serde_json::Value;
    async fn execute(&self, params: serde_json::Value) -> Result<String>;
}

/// Ordered collection of tools. Registration order is preserved and a later
/// tool with an already-registered name replaces the earlier one in place.
#[derive(Clone, Default)]
pub struct ToolSet {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolSet {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        match self.tools.iter().position(|t| t.name() == tool.name()) {
            Some(idx) => {
                tracing::debug!("Tool '{}' re-registered, replacing", tool.name());
                self.tools[idx] = tool;
            }
            None => self.tools.push(tool),
        }
    }

    pub fn extend(&mut self, tools: impl IntoIterator<Item = Arc<dyn Tool>>) {
        for tool in tools {
            self.register(tool);
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Tool>> {
        self.tools.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Validate `params` against the tool's schema, then run it. Invalid
    /// parameters are an error and the tool is not invoked.
    pub async fn execute(&self, name: &str, params: serde_json::Value) -> Result<String> {
        match self.get(name) {
            Some(tool) => {
                let errors = validate_params(&params, &tool.parameters_schema());
                if !errors.is_empty() {
                    anyhow::bail!(
                        "invalid parameters for tool '{name}': {}",
                        errors.join("; ")
                    );
                }
                tool.execute(params).await
            }
            None => anyhow::bail!("unknown tool: {name}"),
        }
    }
}

impl std::fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Check tool arguments against the subset of JSON Schema that MCP servers
/// and built-in tools actually use. Returns one message per violation.
fn validate_params(params: &serde_json::Value, schema: &serde_json::Value) -> Vec<String> {
    let mut errors = Vec::new();
    check(params, schema, "", &mut errors);
    errors
}

fn child_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

fn type_matches(val: &serde_json::Value, expected: &str) -> bool {
    match expected {
        "object" => val.is_object(),
        "array" => val.is_array(),
        "string" => val.is_string(),
        "integer" => val.is_i64() || val.is_u64(),
        "number" => val.is_number(),
        "boolean" => val.is_boolean(),
        "null" => val.is_null(),
        _ => true,
    }
}

fn check(val: &serde_json::Value, schema: &serde_json::Value, path: &str, errors: &mut Vec<String>) {
    let at = if path.is_empty() { "root" } else { path };

    if let Some(expected) = schema.get("type").and_then(|t| t.as_str()) {
        if !type_matches(val, expected) {
            errors.push(format!("{at}: expected type '{expected}'"));
            return;
        }
    }

    if let Some(allowed) = schema.get("enum").and_then(|e| e.as_array()) {
        if !allowed.contains(val) {
            errors.push(format!("{at}: value not in allowed enum"));
        }
    }

    if let Some(n) = val.as_f64() {
        let bound = |key: &str| schema.get(key).and_then(|m| m.as_f64());
        if let Some(min) = bound("minimum").filter(|min| n < *min) {
            errors.push(format!("{at}: value {n} < minimum {min}"));
        }
        if let Some(max) = bound("maximum").filter(|max| n > *max) {
            errors.push(format!("{at}: value {n} > maximum {max}"));
        }
    }

    if let Some(s) = val.as_str() {
        let len = s.chars().count() as u64;
        if let Some(min) = schema.get("minLength").and_then(|m| m.as_u64()) {
            if len < min {
                errors.push(format!("{at}: string length {len} < minLength {min}"));
            }
        }
        if let Some(max) = schema.get("maxLength").and_then(|m| m.as_u64()) {
            if len > max {
                errors.push(format!("{at}: string length {len} > maxLength {max}"));
            }
        }
    }

    if let Some(obj) = val.as_object() {
        let required = schema.get("required").and_then(|r| r.as_array());
        for field in required.into_iter().flatten().filter_map(|r| r.as_str()) {
            if !obj.contains_key(field) {
                errors.push(format!("{}: required field missing", child_path(path, field)));
            }
        }
        if let Some(props) = schema.get("properties").and_then(|p| p.as_object()) {
            for (key, prop_schema) in props {
                if let Some(prop_val) = obj.get(key) {
                    check(prop_val, prop_schema, &child_path(path, key), errors);
                }
            }
        }
    }

    if let (Some(items), Some(item_schema)) = (val.as_array(), schema.get("items")) {
        for (i, item) in items.iter().enumerate() {
            check(item, item_schema, &format!("{at}[{i}]"), errors);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo(&'static str);

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &str {
            self.0
        }
        fn description(&self) -> &str {
            "echo the text argument"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": {
                    "text": {"type": "string", "minLength": 1},
                    "mode": {"type": "string", "enum": ["plain", "loud"]}
                },
                "required": ["text"]
            })
        }
        async fn execute(&self, params: serde_json::Value) -> Result<String> {
            Ok(params["text"].as_str().unwrap_or_default().to_string())
        }
    }

    #[test]
    fn registration_order_is_preserved() {
        let mut set = ToolSet::new();
        set.register(Arc::new(Echo("b")));
        set.register(Arc::new(Echo("a")));
        set.register(Arc::new(Echo("c")));
        assert_eq!(set.names(), vec!["b", "a", "c"]);
    }

    #[test]
    fn duplicate_name_replaces_in_place() {
        let mut set = ToolSet::new();
        set.extend([
            Arc::new(Echo("a")) as Arc<dyn Tool>,
            Arc::new(Echo("b")),
            Arc::new(Echo("a")),
        ]);
        assert_eq!(set.names(), vec!["a", "b"]);
        assert_eq!(set.len(), 2);
    }

    #[tokio::test]
    async fn execute_dispatches_valid_params() {
        let mut set = ToolSet::new();
        set.register(Arc::new(Echo("echo")));
        let out = set
            .execute("echo", serde_json::json!({"text": "hi", "extra": 1}))
            .await
            .unwrap();
        assert_eq!(out, "hi");
    }

    #[tokio::test]
    async fn execute_reports_invalid_params_without_running() {
        let mut set = ToolSet::new();
        set.register(Arc::new(Echo("echo")));
        let out = set
            .execute("echo", serde_json::json!({"mode": "quiet"}))
            .await
            .unwrap_err()
            .to_string();
        assert!(out.starts_with("invalid parameters for tool 'echo'"));
        assert!(out.contains("text: required field missing"));
        assert!(out.contains("mode: value not in allowed enum"));
    }

    #[tokio::test]
    async fn unknown_tool_is_an_error() {
        let set = ToolSet::new();
        assert!(set.execute("missing", serde_json::json!({})).await.is_err());
    }

    #[test]
    fn nested_arrays_and_bounds() {
        let schema = serde_json::json!({
            "type": "object",
            "properties": {
                "ids": {"type": "array", "items": {"type": "integer", "minimum": 1}},
                "name": {"type": "string", "maxLength": 3}
            }
        });
        let errors = validate_params(
            &serde_json::json!({"ids": [1, 0, "x"], "name": "abcd"}),
            &schema,
        );
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| e.contains("ids[1]: value 0 < minimum 1")));
        assert!(errors.iter().any(|e| e.contains("ids[2]: expected type 'integer'")));
        assert!(errors.iter().any(|e| e.contains("maxLength 3")));
    }
}

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Directory scanned for agent packages, relative to the working directory.
    pub agents_dir: String,
    /// Agent selected at startup when `--agent` is not given.
    pub default_agent: String,
    /// Interface language code ("en" or "zh").
    pub language: String,
    /// Prompt/banner style name.
    pub style: String,
    pub log_level: String,
    pub history_file: String,
    pub model: ModelConfig,
    pub providers: ProvidersConfig,
    pub mcp: McpSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            agents_dir: "agents".into(),
            default_agent: "default".into(),
            language: "en".into(),
            style: "modern".into(),
            log_level: "warn".into(),
            history_file: "~/.su-cli/history".into(),
            model: ModelConfig::default(),
            providers: ProvidersConfig::default(),
            mcp: McpSettings::default(),
        }
    }
}

/// Provider + model used by chatbot nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelConfig {
    pub provider: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub max_tool_iterations: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: String::new(),
            model: String::new(),
            temperature: 0.0,
            max_tokens: 4096,
            max_tool_iterations: 10,
        }
    }
}

impl ModelConfig {
    pub fn is_configured(&self) -> bool {
        !self.provider.is_empty() && !self.model.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ProvidersConfig {
    pub openai: Option<ProviderConfig>,
    pub deepseek: Option<ProviderConfig>,
    pub anthropic: Option<ProviderConfig>,
    pub ollama: Option<ProviderConfig>,
    pub openrouter: Option<ProviderConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub api_base: Option<String>,
}

/// Settings for MCP tool servers declared by agents.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct McpSettings {
    /// Config filename looked up inside an agent package when its descriptor
    /// does not name one.
    pub config_file: String,
    pub request_timeout_secs: u64,
}

impl Default for McpSettings {
    fn default() -> Self {
        Self {
            config_file: "mcp_config.json".into(),
            request_timeout_secs: 30,
        }
    }
}

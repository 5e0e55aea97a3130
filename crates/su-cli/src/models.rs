use std::sync::Arc;

use anyhow::Result;
#[allow(deprecated)]
use rig::client::completion::CompletionModelHandle;
use rig::client::{CompletionClient, Nothing};
use rig::providers::{anthropic, deepseek, ollama, openai, openrouter};
use su_config::{Config, ProviderConfig};
use su_core::{ChatModel, RigChatModel};

pub const PROVIDERS: &[&str] = &["openai", "deepseek", "anthropic", "ollama", "openrouter"];

/// Resolve an API key from config, falling back to an environment variable.
fn resolve_api_key(provider_cfg: &Option<ProviderConfig>, env_var: &str) -> Option<String> {
    provider_cfg
        .as_ref()
        .and_then(|c| c.api_key.clone())
        .filter(|k| !k.is_empty())
        .or_else(|| std::env::var(env_var).ok().filter(|k| !k.is_empty()))
}

fn api_base(provider_cfg: &Option<ProviderConfig>) -> Option<String> {
    provider_cfg
        .as_ref()
        .and_then(|c| c.api_base.clone())
        .filter(|b| !b.is_empty())
}

fn missing_key(provider: &str, env_var: &str) -> anyhow::Error {
    anyhow::anyhow!(
        "{provider} provider selected but no API key found. \
         Set providers.{provider}.apiKey in the config file or {env_var}."
    )
}

/// Whether the configured provider has credentials available. Ollama needs none.
pub fn key_status(config: &Config) -> &'static str {
    let providers = &config.providers;
    let key = match config.model.provider.as_str() {
        "openai" => resolve_api_key(&providers.openai, "OPENAI_API_KEY"),
        "deepseek" => resolve_api_key(&providers.deepseek, "DEEPSEEK_API_KEY"),
        "anthropic" => resolve_api_key(&providers.anthropic, "ANTHROPIC_API_KEY"),
        "openrouter" => resolve_api_key(&providers.openrouter, "OPENROUTER_API_KEY"),
        "ollama" => return "not required",
        "" => return "(no provider)",
        _ => return "unknown provider",
    };
    if key.is_some() {
        "configured"
    } else {
        "not configured"
    }
}

/// Chat model for `chatbot` nodes, or `None` when no model is configured.
pub fn create_chat_model(config: &Config) -> Result<Option<Arc<dyn ChatModel>>> {
    if !config.model.is_configured() {
        tracing::info!("No model configured; agents run without a chat model");
        return Ok(None);
    }
    let handle = create_model_for(&config.model.provider, &config.model.model, config)?;
    let model = RigChatModel::new(handle, config.model.model.clone(), &config.model);
    Ok(Some(Arc::new(model)))
}

/// Create a completion model for a specific provider + model combination.
#[allow(deprecated)]
fn create_model_for(
    provider: &str,
    model_name: &str,
    config: &Config,
) -> Result<CompletionModelHandle<'static>> {
    let providers = &config.providers;
    match provider {
        "openai" => {
            let key = resolve_api_key(&providers.openai, "OPENAI_API_KEY")
                .ok_or_else(|| missing_key(provider, "OPENAI_API_KEY"))?;
            let mut builder = openai::CompletionsClient::builder().api_key(&key);
            if let Some(ref base) = api_base(&providers.openai) {
                builder = builder.base_url(base);
                tracing::info!("Using OpenAI-compatible endpoint {base}");
            }
            let client: openai::CompletionsClient = builder
                .build()
                .map_err(|e| anyhow::anyhow!("Failed to create OpenAI client: {e}"))?;
            tracing::info!("Using OpenAI provider with model '{model_name}'");
            Ok(CompletionModelHandle::new(Arc::new(
                client.completion_model(model_name),
            )))
        }

        "deepseek" => {
            let key = resolve_api_key(&providers.deepseek, "DEEPSEEK_API_KEY")
                .ok_or_else(|| missing_key(provider, "DEEPSEEK_API_KEY"))?;
            let client: deepseek::Client = deepseek::Client::new(&key)
                .map_err(|e| anyhow::anyhow!("Failed to create DeepSeek client: {e}"))?;
            tracing::info!("Using DeepSeek provider with model '{model_name}'");
            Ok(CompletionModelHandle::new(Arc::new(
                client.completion_model(model_name),
            )))
        }

        "anthropic" => {
            let key = resolve_api_key(&providers.anthropic, "ANTHROPIC_API_KEY")
                .ok_or_else(|| missing_key(provider, "ANTHROPIC_API_KEY"))?;
            let client: anthropic::Client = anthropic::Client::builder()
                .api_key(&key)
                .build()
                .map_err(|e| anyhow::anyhow!("Failed to create Anthropic client: {e}"))?;
            tracing::info!("Using Anthropic provider with model '{model_name}'");
            Ok(CompletionModelHandle::new(Arc::new(
                client.completion_model(model_name),
            )))
        }

        "ollama" => {
            let mut builder = ollama::Client::builder().api_key(Nothing);
            if let Some(ref base) = api_base(&providers.ollama) {
                builder = builder.base_url(base);
            }
            let client: ollama::Client = builder
                .build()
                .map_err(|e| anyhow::anyhow!("Failed to create Ollama client: {e}"))?;
            tracing::info!("Using Ollama provider with model '{model_name}'");
            Ok(CompletionModelHandle::new(Arc::new(
                client.completion_model(model_name),
            )))
        }

        "openrouter" => {
            let key = resolve_api_key(&providers.openrouter, "OPENROUTER_API_KEY")
                .ok_or_else(|| missing_key(provider, "OPENROUTER_API_KEY"))?;
            let client: openrouter::Client = openrouter::Client::new(&key)
                .map_err(|e| anyhow::anyhow!("Failed to create OpenRouter client: {e}"))?;
            tracing::info!("Using OpenRouter provider with model '{model_name}'");
            Ok(CompletionModelHandle::new(Arc::new(
                client.completion_model(model_name),
            )))
        }

        other => anyhow::bail!(
            "Unknown provider '{other}'. Valid providers: {}",
            PROVIDERS.join(", ")
        ),
    }
}

mod commands;
mod completion;
mod i18n;
mod models;
mod shell;
mod style;

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use su_config::{find_config_path, load_config, resolve_path, Config};
use su_core::mcp::McpConfig;
use su_core::AgentRegistry;

use crate::shell::Shell;

#[derive(Parser)]
#[command(name = "su", about = "Chat shell for pluggable agents", version)]
struct Cli {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding agent packages (overrides the config)
    #[arg(long)]
    agents_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with an agent (default)
    Chat {
        /// Agent to start with
        #[arg(short, long)]
        agent: Option<String>,

        /// Single message mode (non-interactive)
        #[arg(short, long)]
        message: Option<String>,

        /// Accept confirmation requests in single message mode
        #[arg(short, long)]
        yes: bool,
    },
    /// List discovered agent packages
    Agents,
    /// Show configuration, model and tool server status
    Status,
}

fn init_logging(config: &Config) {
    let base_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone());
    let filter = if base_filter.contains("su_core") {
        base_filter
    } else {
        format!("{base_filter},su_core={}", config.log_level)
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.unwrap_or_else(find_config_path);
    let config = load_config(&config_path)?;
    init_logging(&config);

    let agents_dir = cli
        .agents_dir
        .unwrap_or_else(|| resolve_path(&config.agents_dir));

    match cli.command.unwrap_or(Commands::Chat {
        agent: None,
        message: None,
        yes: false,
    }) {
        Commands::Chat {
            agent,
            message,
            yes,
        } => run_chat(config, config_path, &agents_dir, agent, message, yes).await,
        Commands::Agents => run_agents(&agents_dir),
        Commands::Status => run_status(&config_path, &config, &agents_dir).await,
    }
}

async fn run_chat(
    config: Config,
    config_path: PathBuf,
    agents_dir: &Path,
    agent: Option<String>,
    message: Option<String>,
    accept: bool,
) -> Result<()> {
    let model = match models::create_chat_model(&config) {
        Ok(model) => model,
        Err(e) => {
            eprintln!("Warning: {e:#}");
            None
        }
    };

    let default_agent = config.default_agent.clone();
    let mut shell = Shell::new(config, config_path, agents_dir, model);
    if !shell.has_model() {
        shell.warn_no_model();
    }

    match message {
        Some(msg) => {
            let selected = match agent {
                // An explicit choice must not silently fall back to another agent.
                Some(name) => shell.select_agent(&name).await,
                None => shell.select_initial_agent(&default_agent).await,
            };
            if !selected {
                bail!("no usable agent in {}", agents_dir.display());
            }
            if !shell.run_single(&msg, accept).await? {
                bail!("turn failed");
            }
            Ok(())
        }
        None => {
            let preferred = agent.unwrap_or(default_agent);
            shell.select_initial_agent(&preferred).await;
            shell.run_interactive().await
        }
    }
}

fn run_agents(agents_dir: &Path) -> Result<()> {
    let mut registry = AgentRegistry::new(agents_dir);
    registry.scan();
    if registry.is_empty() {
        println!("No agents found in {}", agents_dir.display());
        return Ok(());
    }

    println!("Agents in {}:", agents_dir.display());
    println!();
    for desc in registry.all() {
        let status = if desc.valid { "ok" } else { "invalid" };
        println!("  {:<20} {}", desc.name, status);
        if let Some(descriptor) = &desc.descriptor_file {
            println!("    descriptor:   {}", descriptor.display());
        }
        if let Some(entry) = &desc.entry_point {
            println!("    entry:        {}", entry.display());
        }
        if !desc.graphs.is_empty() {
            let ids: Vec<&str> = desc.graphs.iter().map(|g| g.id.as_str()).collect();
            println!("    graphs:       {}", ids.join(", "));
        }
        if !desc.dependencies.is_empty() {
            println!("    dependencies: {}", desc.dependencies.join(", "));
        }
        if let Some(description) = &desc.description {
            println!("    description:  {description}");
        }
        if let Some(error) = &desc.error {
            println!("    error:        {error}");
        }
    }
    Ok(())
}

async fn run_status(config_path: &Path, config: &Config, agents_dir: &Path) -> Result<()> {
    println!("su status");
    println!();

    if config_path.exists() {
        println!("  Config:    {} (found)", config_path.display());
    } else {
        println!("  Config:    {} (not found, using defaults)", config_path.display());
    }

    let mut registry = AgentRegistry::new(agents_dir);
    registry.scan();
    if agents_dir.is_dir() {
        println!(
            "  Agents:    {} ({} found, {} valid)",
            agents_dir.display(),
            registry.len(),
            registry.valid_names().len()
        );
    } else {
        println!("  Agents:    {} (not found)", agents_dir.display());
    }

    let or_unset = |s: &str| {
        if s.is_empty() {
            "(not set)".to_string()
        } else {
            s.to_string()
        }
    };
    println!("  Provider:  {}", or_unset(&config.model.provider));
    println!("  Model:     {}", or_unset(&config.model.model));
    println!("  API key:   {}", models::key_status(config));
    println!("  Language:  {}", config.language);
    println!("  Style:     {}", config.style);
    println!();

    println!("  MCP servers:");
    let mut any = false;
    for desc in registry.all().filter(|d| d.valid) {
        let path = desc.mcp_config_path(&config.mcp.config_file);
        let mcp = match McpConfig::load(&path).await {
            Ok(mcp) => mcp,
            Err(e) => {
                println!("    {}: {e:#}", desc.name);
                any = true;
                continue;
            }
        };
        for (name, server) in &mcp.servers {
            let found = which::which(&server.command).is_ok();
            println!(
                "    {}/{}: {} ({})",
                desc.name,
                name,
                server.command,
                if found { "found" } else { "not found" }
            );
            any = true;
        }
    }
    if !any {
        println!("    (none declared)");
    }

    Ok(())
}

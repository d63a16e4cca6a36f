//! CLI command definitions and dispatch.

pub mod chat;
pub mod schema;
pub mod search;

use std::path::PathBuf;
use std::sync::Arc;

use agentbroker_core::{AdapterRegistry, AgentBroker, BrokerConfig};
use agentbroker_http::RegistryBrokerClient;
use clap::{Parser, Subcommand};
use colored::Colorize;

const BANNER: &str = r#"
   🛰  AgentBroker
   Find agents. Talk to them.
"#;

/// AgentBroker CLI — agent discovery and chat across registries.
#[derive(Parser)]
#[command(
    name = "agentbroker",
    version,
    about = "🛰  AgentBroker — find agents across registries and chat with them",
    long_about = BANNER,
    propagate_version = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Broker URL (overrides config and AGENTBROKER_URL).
    #[arg(long, global = true, env = "AGENTBROKER_URL")]
    pub url: Option<String>,

    /// API key (overrides config and AGENTBROKER_API_KEY).
    #[arg(long, global = true, env = "AGENTBROKER_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Config file (default: ~/.agentbroker/config.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Log adapter calls and retries to stderr.
    #[arg(long, short, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 🔎 Search for agents across registries.
    Search(search::SearchArgs),

    /// 💬 Open a session with an agent and chat.
    Chat(chat::ChatArgs),

    /// 📐 Print JSON schemas of the public data types.
    Schema(schema::SchemaArgs),

    /// 📊 Show broker connectivity and effective configuration.
    Status,
}

#[derive(Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Table,
}

/// Execute the CLI command.
pub async fn execute(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;
    if cli.verbose || config.telemetry.enabled || std::env::var_os("RUST_LOG").is_some() {
        agentbroker_core::telemetry::init_telemetry(&config.telemetry)?;
    }

    match cli.command {
        Commands::Search(args) => search::execute(args, &config, cli.output).await,
        Commands::Chat(args) => chat::execute(args, &config).await,
        Commands::Schema(args) => schema::execute(args),
        Commands::Status => status(&config).await,
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<BrokerConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let mut config = BrokerConfig::load(path)?;
            config.apply_env();
            config
        }
        None => BrokerConfig::load_default()?,
    };
    if let Some(url) = &cli.url {
        config.url = url.clone();
    }
    if let Some(key) = &cli.api_key {
        config.api_key = Some(key.clone());
    }
    Ok(config)
}

/// A broker wired to the configured registry broker: the unscoped client
/// for chat and broad search, plus a scoped view for the default adapter.
pub fn connect(config: &BrokerConfig) -> anyhow::Result<AgentBroker> {
    let registry = Arc::new(AdapterRegistry::new());
    RegistryBrokerClient::from_config(config)?
        .register(&registry, &[config.search.default_adapter.clone()]);
    Ok(AgentBroker::builder(config.clone())
        .registry(registry)
        .build())
}

async fn status(config: &BrokerConfig) -> anyhow::Result<()> {
    println!("{BANNER}");

    let client = RegistryBrokerClient::from_config(config)?;

    print!("  Broker:          checking...");
    match client.ping().await {
        Ok(elapsed) => {
            println!(
                "\r  Broker:          🟢 connected ({} ms)    ",
                elapsed.as_millis()
            );
        }
        Err(e) => {
            println!("\r  Broker:          🔴 unreachable        ");
            println!("  Error:           {}", e.to_string().dimmed());
            println!("  Tip:             Set AGENTBROKER_URL or `url` in ~/.agentbroker/config.toml");
        }
    }
    println!("  URL:             {}", config.url);
    println!(
        "  API key:         {}",
        if config.api_key.is_some() { "set" } else { "not set" }
    );
    println!(
        "  Registries:      default {}, home {}",
        config.search.default_registry.bold(),
        config
            .search
            .home_registry
            .as_deref()
            .unwrap_or("-")
            .bold()
    );
    println!("  Default adapter: {}", config.search.default_adapter);
    println!("  Encryption:      {}", config.session.encryption);
    println!(
        "  Retry:           {} attempts, {} ms base, {} ms cap",
        config.retry.max_attempts, config.retry.base_delay_ms, config.retry.max_delay_ms
    );
    println!("  CLI version:     {}", env!("CARGO_PKG_VERSION"));
    Ok(())
}

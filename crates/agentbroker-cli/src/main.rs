//! AgentBroker CLI — discover agents across registries and chat with them.
//!
//! `agentbroker` — the command-line interface for a registry broker.

mod commands;

use clap::Parser;
use commands::{execute, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    execute(cli).await
}

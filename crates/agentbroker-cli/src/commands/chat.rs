//! `agentbroker chat` — open a session with an agent and talk to it.

use agentbroker_core::{
    AgentBroker, BrokerConfig, EncryptionPreference, SearchQuery, SessionHandle, SessionMode,
    SessionTarget,
};
use clap::Args;
use colored::Colorize;

#[derive(Args)]
pub struct ChatArgs {
    /// Agent UAID, agent URL, or native id (with --native).
    pub target: String,

    /// Treat TARGET as a registry-native id and resolve it by searching.
    #[arg(long)]
    pub native: bool,

    /// Registry to look up a native id in.
    #[arg(long, short, requires = "native")]
    pub registry: Option<String>,

    /// Encryption preference: preferred, required or disabled.
    #[arg(long, short)]
    pub encryption: Option<EncryptionPreference>,

    /// Chat adapter id.
    #[arg(long, short)]
    pub adapter: Option<String>,

    /// Continue an existing session instead of opening a new one.
    #[arg(long, conflicts_with = "native")]
    pub resume: Option<String>,

    /// Send one message and exit.
    #[arg(long, short)]
    pub message: Option<String>,
}

pub async fn execute(args: ChatArgs, config: &BrokerConfig) -> anyhow::Result<()> {
    let mut config = config.clone();
    if let Some(preference) = args.encryption {
        config.session.encryption = preference;
    }
    if let Some(adapter) = &args.adapter {
        config.session.chat_adapter = adapter.clone();
    }
    let broker = super::connect(&config)?;

    let session = if args.native {
        open_native(&broker, &args).await?
    } else {
        let target = parse_target(&args.target)?;
        let mut request = broker.request_for(target);
        if let Some(session_id) = &args.resume {
            request = request.resume(session_id.clone());
        }
        broker.open_session(request).await?
    };

    print_header(&session);

    if let Some(message) = &args.message {
        reply(&session, message).await;
        return Ok(());
    }

    println!("  {} Type your message (Ctrl+D or 'quit' to exit)\n", "→".dimmed());
    loop {
        let input: String = match dialoguer::Input::<String>::new()
            .with_prompt(format!("  {}", "You".cyan().bold()))
            .allow_empty(false)
            .interact_text()
        {
            Ok(v) => v,
            Err(_) => break,
        };

        if input.trim().eq_ignore_ascii_case("quit") || input.trim().eq_ignore_ascii_case("exit") {
            break;
        }
        reply(&session, &input).await;
    }

    println!("\n  {} Session ended.", "→".dimmed());
    Ok(())
}

/// URLs become agent-url targets; anything else is taken as a UAID.
fn parse_target(raw: &str) -> anyhow::Result<SessionTarget> {
    let target = if raw.starts_with("http://") || raw.starts_with("https://") {
        SessionTarget::agent_url(raw)?
    } else {
        SessionTarget::uaid(raw)?
    };
    Ok(target)
}

/// Search for the native id, then open a session with the match. The UAID
/// comes from the search results via the broker's cache.
async fn open_native(broker: &AgentBroker, args: &ChatArgs) -> anyhow::Result<SessionHandle> {
    let mut query = SearchQuery::new()
        .equals("nativeId", serde_json::Value::String(args.target.clone()))
        .limit(1);
    if let Some(registry) = &args.registry {
        query = query.registry(registry.clone());
    }
    let outcome = broker.search(&query).await?;
    let hit = outcome.hits.first().ok_or_else(|| {
        anyhow::anyhow!(
            "no agent with id '{}' in {}",
            args.target,
            outcome.registries.join(", ")
        )
    })?;
    println!(
        "  {} Found {} ({}:{})",
        "✓".green().bold(),
        hit.name.bold(),
        hit.registry,
        hit.native_id
    );
    Ok(broker.open_agent(&hit.to_handle()).await?)
}

fn print_header(session: &SessionHandle) {
    let mode = match session.mode() {
        SessionMode::Encrypted => "🔒 encrypted".green().to_string(),
        SessionMode::Plaintext => "plaintext".yellow().to_string(),
    };
    println!(
        "\n  {} Chat session: {} → {} ({})",
        "💬",
        session.target().to_string().bold(),
        session.session_id().dimmed(),
        mode
    );
    if let Some(reason) = session.encryption_fallback() {
        println!(
            "  {} Encryption unavailable, using plaintext: {}",
            "⚠".yellow().bold(),
            reason.to_string().dimmed()
        );
    }
}

async fn reply(session: &SessionHandle, message: &str) {
    match session.send(message).await {
        Ok(reply) => {
            let text = reply.text.unwrap_or_else(|| {
                reply
                    .raw
                    .map(|raw| serde_json::to_string_pretty(&raw).unwrap_or_default())
                    .unwrap_or_else(|| "(no response)".into())
            });
            println!("\n  {} {}:\n", "🤖", "Agent".green().bold());
            for line in text.lines() {
                println!("    {}", line);
            }
            println!();
        }
        Err(e) => {
            println!("  {} Error: {}\n", "✗".red().bold(), e.to_string().dimmed());
        }
    }
}

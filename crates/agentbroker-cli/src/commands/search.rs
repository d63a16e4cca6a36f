//! `agentbroker search` — find agents across registries.

use std::time::Duration;

use agentbroker_core::{BrokerConfig, ResultSource, SearchHit, SearchQuery, SortKey};
use clap::Args;
use colored::Colorize;
use serde_json::Value;
use tabled::{settings::Style, Table, Tabled};

use super::OutputFormat;

#[derive(Args)]
pub struct SearchArgs {
    /// Free-text query (enables semantic search).
    pub query: Option<String>,

    /// Registry to search (repeatable). Default: default + home registry.
    #[arg(long, short)]
    pub registry: Vec<String>,

    /// Search adapter id to use (repeatable).
    #[arg(long, short)]
    pub adapter: Vec<String>,

    /// Only agents with an MCP endpoint.
    #[arg(long, conflicts_with = "no_mcp")]
    pub mcp: bool,

    /// Only agents without an MCP endpoint.
    #[arg(long)]
    pub no_mcp: bool,

    /// Case-insensitive substring of the agent name.
    #[arg(long)]
    pub name: Option<String>,

    /// Equality filter `field=value` (repeatable).
    #[arg(long = "where", value_parser = parse_equality)]
    pub filters: Vec<(String, Value)>,

    /// Sort key `field[:asc|desc]` (repeatable).
    #[arg(long)]
    pub sort: Vec<SortKey>,

    /// Maximum number of results.
    #[arg(long, short, default_value_t = agentbroker_core::query::DEFAULT_LIMIT)]
    pub limit: usize,
}

impl SearchArgs {
    fn to_query(&self) -> SearchQuery {
        let mut query = match &self.query {
            Some(text) => SearchQuery::text(text.clone()),
            None => SearchQuery::new(),
        }
        .limit(self.limit);

        match self.registry.as_slice() {
            [] => {}
            [one] => query = query.registry(one.clone()),
            many => query = query.registries(many.iter().cloned()),
        }
        if !self.adapter.is_empty() {
            query = query.adapters(self.adapter.iter().cloned());
        }
        if self.mcp {
            query = query.mcp(true);
        } else if self.no_mcp {
            query = query.mcp(false);
        }
        if let Some(name) = &self.name {
            query = query.name_contains(name.clone());
        }
        for (field, value) in &self.filters {
            query = query.equals(field.clone(), value.clone());
        }
        for key in &self.sort {
            query = query.sort_by(key.clone());
        }
        query
    }
}

fn parse_equality(raw: &str) -> Result<(String, Value), String> {
    let (field, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected field=value, got '{raw}'"))?;
    if field.trim().is_empty() {
        return Err("filter field is empty".into());
    }
    // Numbers and booleans are passed typed; anything else as a string.
    let value = serde_json::from_str::<Value>(value)
        .ok()
        .filter(|v| v.is_number() || v.is_boolean())
        .unwrap_or_else(|| Value::String(value.to_string()));
    Ok((field.trim().to_string(), value))
}

#[derive(Tabled)]
struct HitRow {
    #[tabled(rename = "REGISTRY")]
    registry: String,
    #[tabled(rename = "ID")]
    native_id: String,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "SCORE")]
    score: String,
    #[tabled(rename = "MCP")]
    mcp: String,
    #[tabled(rename = "UAID")]
    uaid: String,
}

impl From<&SearchHit> for HitRow {
    fn from(hit: &SearchHit) -> Self {
        Self {
            registry: hit.registry.clone(),
            native_id: hit.native_id.clone(),
            name: hit.name.clone(),
            score: hit.score.map_or("-".into(), |s| format!("{s:.3}")),
            mcp: if hit.endpoints.mcp.is_some() { "yes" } else { "-" }.into(),
            uaid: hit.uaid.clone().unwrap_or_else(|| "-".into()),
        }
    }
}

pub async fn execute(
    args: SearchArgs,
    config: &BrokerConfig,
    output: OutputFormat,
) -> anyhow::Result<()> {
    let broker = super::connect(config)?;
    let query = args.to_query();

    let spinner = indicatif::ProgressBar::new_spinner();
    if output != OutputFormat::Json {
        spinner.set_message(format!(
            "Searching {}...",
            broker.effective_registries(&query).join(", ")
        ));
        spinner.enable_steady_tick(Duration::from_millis(80));
    }
    let result = broker.search(&query).await;
    spinner.finish_and_clear();
    let outcome = result?;

    match output {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        OutputFormat::Table => {
            let rows: Vec<HitRow> = outcome.hits.iter().map(HitRow::from).collect();
            println!("{}", Table::new(rows).with(Style::rounded()));
        }
        OutputFormat::Text => {
            let source = match outcome.source {
                ResultSource::Vector => "semantic",
                ResultSource::Keyword => "keyword",
            };
            println!(
                "\n  {} {} result(s) from {} ({})\n",
                "🔎",
                outcome.hits.len().to_string().bold(),
                outcome.registries.join(", ").bold(),
                source.dimmed()
            );
            if outcome.hits.is_empty() {
                println!("  (no agents matched)");
            }
            for hit in &outcome.hits {
                let score = hit
                    .score
                    .map(|s| format!(" {:.3}", s).dimmed().to_string())
                    .unwrap_or_default();
                println!(
                    "  {} {}{}",
                    format!("{}:{}", hit.registry, hit.native_id).cyan(),
                    hit.name.bold(),
                    score
                );
                if !hit.description.is_empty() {
                    println!("    {}", hit.description.dimmed());
                }
                if let Some(uaid) = &hit.uaid {
                    println!("    {} {}", "uaid".dimmed(), uaid);
                }
                if let Some(mcp) = &hit.endpoints.mcp {
                    println!("    {} {}", "mcp".dimmed(), mcp);
                }
            }
            if let Some(total) = outcome.total {
                println!("\n  {} {} total match(es)", "→".dimmed(), total);
            }
        }
    }
    Ok(())
}

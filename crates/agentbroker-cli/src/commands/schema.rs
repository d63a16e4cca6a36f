//! `agentbroker schema` — print JSON schemas of the public data types.

use agentbroker_core::{AgentHandle, SearchHit, SearchQuery};
use clap::{Args, ValueEnum};
use schemars::schema_for;

#[derive(Clone, Copy, ValueEnum)]
pub enum SchemaType {
    Query,
    Hit,
    Handle,
}

#[derive(Args)]
pub struct SchemaArgs {
    /// Type to print. All types when omitted.
    #[arg(value_enum)]
    pub r#type: Option<SchemaType>,
}

pub fn execute(args: SchemaArgs) -> anyhow::Result<()> {
    let schema = match args.r#type {
        Some(SchemaType::Query) => serde_json::to_value(schema_for!(SearchQuery))?,
        Some(SchemaType::Hit) => serde_json::to_value(schema_for!(SearchHit))?,
        Some(SchemaType::Handle) => serde_json::to_value(schema_for!(AgentHandle))?,
        None => serde_json::json!({
            "SearchQuery": schema_for!(SearchQuery),
            "SearchHit": schema_for!(SearchHit),
            "AgentHandle": schema_for!(AgentHandle),
        }),
    };
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

//! Edge Healer CLI
//!
//! Lists and submits alerts and shows health for an edge-healer agent.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{alerts, health};

/// Edge Healer CLI
#[derive(Parser)]
#[command(name = "healerctl")]
#[command(author, version, about = "CLI for the Edge Healer agent", long_about = None)]
pub struct Cli {
    /// Agent API URL (can also be set via HEALER_API_URL env var)
    #[arg(long, env = "HEALER_API_URL")]
    pub api_url: Option<String>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List stored alerts
    Alerts {
        /// Only alerts strictly newer than this timestamp (RFC 3339 or YYYY-MM-DD)
        #[arg(long)]
        since: Option<String>,

        /// Only alerts for this scenario
        #[arg(long)]
        scenario: Option<String>,
    },

    /// Submit an alert to the agent
    Submit {
        /// Scenario name
        #[arg(long)]
        scenario: String,

        /// Alert message
        #[arg(long)]
        message: String,
    },

    /// Show agent health
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let file_config = config::Config::load()?;
    let api_url = config::resolve_api_url(cli.api_url, &file_config);
    if cli.verbose {
        output::print_info(&format!("Using agent API at {}", api_url));
    }

    let client = client::ApiClient::new(&api_url)?;

    match cli.command {
        Commands::Alerts { since, scenario } => {
            alerts::list_alerts(&client, since, scenario, cli.format).await?;
        }
        Commands::Submit { scenario, message } => {
            alerts::submit_alert(&client, &scenario, &message, cli.format).await?;
        }
        Commands::Health => {
            health::show_health(&client, cli.format).await?;
        }
    }

    Ok(())
}

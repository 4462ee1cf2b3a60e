//! Fleetwatch - camera fleet dashboard diagnostics
//!
//! Wires the configured services together and drives them from the command
//! line: fleet statistics and health summaries print as JSON, token
//! management talks to the same intake the external harvester uses.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use fleetwatch::cache::TtlCache;
use fleetwatch::cli::{Cli, Command, TokenAction};
use fleetwatch::config::Config;
use fleetwatch::dashboard::DashboardService;
use fleetwatch::data::{CloudClient, VmsClient};
use fleetwatch::harvester::HarvesterClient;
use fleetwatch::health::HealthService;
use fleetwatch::session::SessionManager;
use fleetwatch::token::TokenStore;

/// Timeout applied to every upstream HTTP call
const HTTP_TIMEOUT_SECS: u64 = 30;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
        .build()?;

    let cache = Arc::new(TtlCache::new());
    let sessions = Arc::new(SessionManager::new(
        VmsClient::new(http.clone(), config.vms.base_url.clone()),
        config.vms.clone(),
    ));
    let dashboard = DashboardService::new(
        Arc::clone(&sessions),
        Arc::clone(&cache),
        config.standby_servers.clone(),
    );
    let health = Arc::new(HealthService::new(
        CloudClient::new(http.clone(), config.cloud.base_url.clone()),
        TokenStore::new(),
        Arc::clone(&cache),
    ));
    let harvester = HarvesterClient::new(http, config.harvester_url.clone());

    match cli.command {
        Command::Stats => {
            let stats = dashboard.get_stats().await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Command::Health => {
            let records = health.get_all_server_health_summary().await?;
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        Command::Token { action } => match action {
            TokenAction::Status => {
                println!("{}", serde_json::to_string_pretty(&health.token_status())?);
            }
            TokenAction::Set { token } => {
                let accepted = health.set_token(&token)?;
                println!("token accepted; expires at {}", accepted.expires_at);
            }
            TokenAction::Clear => {
                health.clear_token();
                println!("token cleared");
            }
        },
        Command::RefreshToken => {
            harvester.trigger_refresh().await?;
            println!("harvest triggered");
        }
        Command::Check => {
            sessions.ensure_session().await?;
            println!("VMS login OK");
            if harvester.alive().await {
                println!("harvester reachable");
            } else {
                println!("harvester not reachable");
            }
            sessions.logout().await;
        }
    }

    Ok(())
}

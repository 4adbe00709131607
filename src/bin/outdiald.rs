//! Dialer API server binary.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use outdial::config::DialerConfig;
use outdial::orchestrator::DialerEngine;
use outdial::provider::HttpCallProvider;
use outdial::server;

#[derive(Parser, Debug)]
#[command(name = "outdiald", about = "Multi-tenant outbound dialer API server")]
struct Args {
    /// sqlx database URL
    #[arg(long, default_value = "sqlite://outdial.db?mode=rwc")]
    database_url: String,

    /// Address to bind the HTTP API to
    #[arg(long, default_value = "127.0.0.1:3001")]
    listen: String,

    /// Publicly reachable base URL for provider callbacks
    #[arg(long, env = "PUBLIC_BASE_URL", default_value = "")]
    public_base_url: String,

    /// Override the calling provider API base (testing, self-hosted gateways)
    #[arg(long)]
    provider_api_base: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();

    let mut config = DialerConfig::default();
    config.database.database_url = args.database_url;
    config.general.listen_addr = args.listen;
    config.general.public_base_url = args.public_base_url;

    if config.general.public_base_url.is_empty() {
        info!("no public base URL configured; claim-only operations available, dialing disabled");
    }

    let provider = Arc::new(HttpCallProvider::new(args.provider_api_base));
    let engine = Arc::new(DialerEngine::new(config.clone(), provider).await?);

    server::serve(engine, &config.general.listen_addr).await?;
    Ok(())
}

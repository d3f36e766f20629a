//! Snarkbot CLI entry point.

use anyhow::Context as _;
use clap::Parser;
use serenity::all::Client;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "snarkbot")]
#[command(about = "A persona-driven chat participant for Discord servers")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = snarkbot::config::Config::load()
        .with_context(|| "failed to load configuration from environment")?;

    tracing::info!(
        data_dir = %config.data_dir.display(),
        model = %config.llm.model,
        "configuration loaded"
    );
    if config.operator_id.is_none() {
        tracing::warn!("SNARKBOT_OPERATOR_ID not set; operator commands are disabled");
    }

    let token = config.discord_token.clone();
    let deps = snarkbot::BotDeps::init(config).with_context(|| "failed to initialize stores")?;

    let handler = snarkbot::discord::Handler::new(deps);
    let mut client = Client::builder(&token, snarkbot::discord::Handler::intents())
        .event_handler(handler)
        .await
        .with_context(|| "failed to build discord client")?;

    tokio::select! {
        result = client.start() => {
            result.with_context(|| "discord client stopped with an error")?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    tracing::info!("snarkbot stopped");
    Ok(())
}

mod client;
mod compose;
mod config;
mod debug;
mod dispatch;
mod enrich;
mod entities;
mod error;
mod links;
mod platform;
mod rules;
#[cfg(test)]
mod testutil;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::client::TelegramApi;
use crate::config::Config;
use crate::dispatch::Forwarder;
use crate::platform::telegram::TelegramClient;
use crate::rules::RuleTable;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,fwdbot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    // A malformed rule table is fatal here, before any event is processed.
    let rules = RuleTable::load(&config.forwarding.rules_path).with_context(|| {
        format!(
            "Failed to load forwarding rules from {}",
            config.forwarding.rules_path.display()
        )
    })?;

    info!("Configuration loaded successfully");
    info!("  Rule origins: {}", rules.origin_count());
    info!("  Operators: {:?}", config.telegram.operator_ids);

    let bot = teloxide::Bot::new(config.telegram.bot_token.clone());
    let client = Arc::new(TelegramClient::new(bot));
    let api: Arc<dyn TelegramApi> = client.clone();

    let forwarder = Arc::new(Forwarder::new(
        api,
        rules,
        config.telegram.operator_ids.clone(),
    ));

    info!("Forwarder is starting...");
    platform::telegram::run(forwarder, client).await?;

    Ok(())
}

mod commands;
mod config;
mod dispatch;
mod platform;
mod referrals;
mod reply;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::dispatch::{Router, Welcome};
use crate::platform::telegram::{self, AppState, Startup};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging; HTTP client chatter stays at warn
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,echobot=debug,reqwest=warn,hyper=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            warn!("Failed to load .env file: {}", e);
        }
    }

    // Load configuration
    let (config_path, required) = match std::env::args().nth(1) {
        Some(path) => (PathBuf::from(path), true),
        None => (PathBuf::from(Config::DEFAULT_PATH), false),
    };

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path, required)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let bot = match telegram::prepare_bot(&config, config.bot_token_from_env()) {
        Startup::Run(bot) => bot,
        Startup::Exit => std::process::exit(1),
        Startup::Fail(e) => return Err(e),
    };

    info!("Configuration loaded successfully");
    info!("  Delivery: {:?}", config.replies.delivery);
    info!("  Welcome buttons: {}", config.welcome.buttons.len());
    info!("  Referral store: {:?}", config.referrals.store);

    let referrals = referrals::open(&config.referrals)?;
    let router = Router::new(Welcome::from_config(&config)?, referrals);

    let bot_username = match telegram::bot_username(&bot).await {
        Ok(name) => Some(name),
        Err(e) => {
            warn!("{:#}", e);
            None
        }
    };

    let state = Arc::new(AppState {
        router,
        delivery: config.replies.delivery,
        bot_username,
        report_errors: config.errors.report,
    });

    if config.telegram.register_commands {
        if let Err(e) = telegram::register_commands(&bot).await {
            warn!("{:#}", e);
        }
    }

    info!("Bot is starting...");
    telegram::run(state, bot).await?;

    Ok(())
}

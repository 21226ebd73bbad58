use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use teloxide::prelude::*;
use tracing::{debug, error, info, warn};

use crate::commands::Command;
use crate::config::{Config, Delivery};
use crate::dispatch::Router;
use crate::platform::IncomingMessage;
use crate::reply::Reply;

/// Shared state handed to every update handler
pub struct AppState {
    pub router: Router,
    pub delivery: Delivery,
    /// Bot username, used to drop commands addressed to other bots
    pub bot_username: Option<String>,
    /// Log handler errors with their update instead of passing them on
    pub report_errors: bool,
}

impl From<&Message> for IncomingMessage {
    fn from(msg: &Message) -> Self {
        let user = msg.from.as_ref();
        IncomingMessage {
            platform: "telegram",
            chat_id: msg.chat.id.0,
            user_id: user.map(|u| u.id.0),
            user_name: user.map(|u| u.full_name()),
            text: msg.text().map(str::to_string),
        }
    }
}

/// What startup should do once the token has been looked up
pub enum Startup {
    Run(Bot),
    /// Token missing and required; the reason is already logged
    Exit,
    /// Token missing and not checked; surfaces as an error from `main`
    Fail(anyhow::Error),
}

/// Build the bot client from the resolved token. No request is made here,
/// and no client exists at all when the token is absent.
pub fn prepare_bot(config: &Config, env_token: Option<String>) -> Startup {
    match config.bot_token(env_token) {
        Some(token) => Startup::Run(Bot::new(token)),
        None if config.telegram.require_token => {
            error!(
                "No bot token found: set {} or telegram.bot_token",
                config.telegram.token_env
            );
            Startup::Exit
        }
        None => Startup::Fail(anyhow!("{} is not set", config.telegram.token_env)),
    }
}

/// Publish the command list shown in the Telegram client menu
pub async fn register_commands(bot: &Bot) -> Result<()> {
    bot.set_my_commands(Command::menu())
        .await
        .context("Failed to register bot commands")?;
    info!("Registered {} bot commands", Command::ALL.len());
    Ok(())
}

/// Look up the bot's own username
pub async fn bot_username(bot: &Bot) -> Result<String> {
    let me = bot.get_me().await.context("Failed to get bot info")?;
    info!("Bot user ID: {}, username: @{}", me.id, me.username());
    Ok(me.username().to_string())
}

/// Run the Telegram bot platform until interrupted
pub async fn run(state: Arc<AppState>, bot: Bot) -> Result<()> {
    info!("Starting Telegram platform...");

    let handler = Update::filter_message().endpoint(handle_message);

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .default_handler(|upd| async move {
            debug!("Unhandled update: {:?}", upd.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("telegram"))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("Telegram platform stopped");
    Ok(())
}

async fn handle_message(
    bot: Bot,
    update: Update,
    msg: Message,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    let incoming = IncomingMessage::from(&msg);

    if let Some(text) = incoming.text.as_deref() {
        debug!(
            "{} message from {} ({:?}) in chat {}: {}",
            incoming.platform,
            incoming.user_name.as_deref().unwrap_or("unknown"),
            incoming.user_id,
            incoming.chat_id,
            text
        );
    }

    let bot_username = state.bot_username.as_deref();
    let Some(reply) = state.router.dispatch(&incoming, bot_username).await else {
        return Ok(());
    };

    match send_reply(&bot, msg.chat.id, reply, state.delivery).await {
        Ok(()) => Ok(()),
        Err(e) if state.report_errors => {
            error!("Update {:?} caused error: {}", update, e);
            Ok(())
        }
        Err(e) => Err(e),
    }
}

async fn send_reply(
    bot: &Bot,
    chat_id: ChatId,
    reply: Reply,
    delivery: Delivery,
) -> ResponseResult<()> {
    let keyboard = reply.keyboard();
    let mut request = bot.send_message(chat_id, reply.text);
    if let Some(formatting) = reply.formatting {
        request = request.parse_mode(formatting.parse_mode());
    }
    if let Some(keyboard) = keyboard {
        request = request.reply_markup(keyboard);
    }

    match delivery {
        Delivery::Awaited => {
            request.await?;
        }
        Delivery::Detached => {
            tokio::spawn(async move {
                if let Err(e) = request.await {
                    warn!("Detached send to chat {} failed: {}", chat_id, e);
                }
            });
        }
    }

    Ok(())
}

//! Telegram adapter: menu dispatch, opt-in handling, admin commands.
//!
//! Routes every incoming text message:
//! - `/start`, `/stop`: opt in / opt out through the [`Registrar`]
//! - admin commands: broadcast, cancel, subscriber count
//! - anything else: looked up in the [`ContentTable`] and answered with the
//!   matching content, or the "unrecognized" reply

use std::sync::Arc;

use teloxide::dispatching::UpdateFilterExt;
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use tracing::{debug, info, warn};

use crate::broadcast::{BroadcastEngine, Formatting};
use crate::config::Config;
use crate::content::ContentTable;
use crate::registration::Registrar;
use crate::subscribers::{SubscriberId, SubscriberStore};

pub mod commands;
pub mod sender;
pub mod ui;

use self::commands::BroadcastSlot;
use self::sender::TelegramSender;

// ---------------------------------------------------------------------------
// Shared state for handler injection
// ---------------------------------------------------------------------------

/// Shared dependencies injected into teloxide handlers via `dptree::deps!`.
#[derive(Clone)]
pub struct BotState {
    /// Loaded configuration.
    pub config: Arc<Config>,
    /// Subscriber registry.
    pub store: Arc<dyn SubscriberStore>,
    /// Opt-in / opt-out handling.
    pub registrar: Registrar,
    /// Menu content.
    pub content: Arc<ContentTable>,
    /// Broadcast engine for admin announcements.
    pub engine: BroadcastEngine,
    /// Transport used by the engine.
    pub sender: Arc<TelegramSender>,
    /// Running admin broadcast, if any.
    pub slot: Arc<BroadcastSlot>,
}

// ---------------------------------------------------------------------------
// Public entry point
// ---------------------------------------------------------------------------

/// Run the Telegram dispatcher until Ctrl+C.
pub async fn run_telegram(bot: Bot, state: BotState) {
    let handler = dptree::entry().branch(Update::filter_message().endpoint(handle_message));

    info!(menu_items = state.content.len(), "telegram dispatcher starting");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

// ---------------------------------------------------------------------------
// Message handler
// ---------------------------------------------------------------------------

/// Handle an incoming Telegram message.
async fn handle_message(bot: Bot, msg: Message, state: BotState) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        debug!(chat_id = msg.chat.id.0, "non-text message ignored");
        return Ok(());
    };

    // teloxide uses u64 for user IDs; the config stores i64.
    let user_id = msg
        .from
        .as_ref()
        .and_then(|user| i64::try_from(user.id.0).ok());

    if let Some(command) = text.strip_prefix('/') {
        return dispatch_command(&bot, &msg, command, user_id, &state).await;
    }

    match state.content.lookup(text) {
        Some(content) => {
            if let Err(e) = sender::send_content(&bot, msg.chat.id, content).await {
                warn!(chat_id = msg.chat.id.0, error = %e, "failed to send menu content");
                bot.send_message(msg.chat.id, state.content.error_reply())
                    .await?;
            }
        }
        None => {
            debug!(chat_id = msg.chat.id.0, "unrecognized selection");
            bot.send_message(msg.chat.id, state.content.unrecognized())
                .reply_markup(ui::menu_keyboard(&state.content))
                .await?;
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Command dispatcher
// ---------------------------------------------------------------------------

/// Parse and dispatch a slash command (without its leading `/`).
async fn dispatch_command(
    bot: &Bot,
    msg: &Message,
    command_line: &str,
    user_id: Option<i64>,
    state: &BotState,
) -> ResponseResult<()> {
    let chat_id = msg.chat.id;
    let (full_command, args) = match command_line.split_once(char::is_whitespace) {
        Some((cmd, rest)) => (cmd, rest.trim()),
        None => (command_line, ""),
    };
    // Strip @bot_name suffix if present
    let command = full_command.split('@').next().unwrap_or(full_command);
    let is_admin = user_id.is_some_and(|id| state.config.is_admin(id));

    let reply = match (command, is_admin) {
        ("start", _) => {
            return handle_start(bot, chat_id, state).await;
        }
        ("stop", _) => match state.registrar.unregister(SubscriberId(chat_id.0)).await {
            Ok(()) => commands::handle_stop(),
            Err(e) => {
                warn!(chat_id = chat_id.0, error = %e, "opt-out failed");
                state.content.error_reply().to_owned()
            }
        },
        ("help", _) => commands::handle_help(is_admin),
        ("broadcast", true) => start_broadcast(bot, chat_id, args, Formatting::Plain, state).await,
        ("broadcast_html", true) => {
            start_broadcast(bot, chat_id, args, Formatting::Html, state).await
        }
        ("cancel", true) => commands::handle_cancel(&state.slot).await,
        ("subscribers", true) => commands::handle_subscribers(state.store.as_ref()).await,
        _ => format!("Unknown command: /{}", ui::escape_html(command)),
    };

    bot.send_message(chat_id, reply)
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

/// Register the chat and show the menu keyboard.
async fn handle_start(bot: &Bot, chat_id: ChatId, state: &BotState) -> ResponseResult<()> {
    if let Err(e) = state.registrar.register(SubscriberId(chat_id.0)).await {
        warn!(chat_id = chat_id.0, error = %e, "opt-in failed");
        bot.send_message(chat_id, state.content.error_reply())
            .await?;
        return Ok(());
    }

    bot.send_message(chat_id, state.content.greeting())
        .reply_markup(ui::menu_keyboard(&state.content))
        .await?;
    Ok(())
}

/// Launch an admin broadcast in the background and report back when done.
///
/// Returns the immediate acknowledgement for the admin.
async fn start_broadcast(
    bot: &Bot,
    admin_chat: ChatId,
    args: &str,
    formatting: Formatting,
    state: &BotState,
) -> String {
    let message = match commands::parse_broadcast(args, formatting) {
        Ok(m) => m,
        Err(reason) => return format!("Broadcast not started: {}", ui::escape_html(&reason)),
    };
    if let Err(e) = message.validate() {
        return ui::escape_html(&e.to_string());
    }

    let Some(token) = state.slot.try_begin().await else {
        return "A broadcast is already running. Use /cancel to stop it.".to_owned();
    };

    let bot = bot.clone();
    let engine = state.engine.clone();
    let sender: Arc<dyn crate::broadcast::MessageSender> = state.sender.clone();
    let slot = Arc::clone(&state.slot);

    tokio::spawn(async move {
        let reply = match engine.broadcast(message, sender, &token).await {
            Ok(report) => ui::format_report(&report),
            Err(e) => {
                warn!(error = %e, "admin broadcast aborted");
                ui::escape_html(&e.to_string())
            }
        };
        slot.finish().await;

        if let Err(e) = bot
            .send_message(admin_chat, reply)
            .parse_mode(ParseMode::Html)
            .await
        {
            warn!(error = %e, "failed to send broadcast report");
        }
    });

    info!(admin_chat = admin_chat.0, "admin broadcast started");
    "Broadcast started. You will get a report when it finishes.".to_owned()
}

//! Herald CLI entry point.
//!
//! Provides `start` for running the bot, `broadcast` for a one-shot
//! announcement from the shell, and `subscribers` for inspecting and editing
//! the registry.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use teloxide::Bot;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use herald::broadcast::{BroadcastEngine, BroadcastMessage, Formatting, ImageRef, Link};
use herald::config::{config_dir, load_config, Config, StorageBackend};
use herald::content::{build_message, ContentTable};
use herald::registration::Registrar;
use herald::subscribers::{MemoryStore, SqliteStore, SubscriberId, SubscriberStore};
use herald::telegram::commands::BroadcastSlot;
use herald::telegram::sender::TelegramSender;
use herald::telegram::{run_telegram, BotState};

/// Herald, a Telegram menu bot with subscriber broadcasts.
#[derive(Parser)]
#[command(name = "herald", version, about)]
struct Cli {
    /// Path to config.toml (default: ~/.herald/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Command {
    /// Run the bot until Ctrl+C.
    Start,
    /// Send one announcement to every subscriber and print the report.
    Broadcast {
        /// Message text (photo caption when --image is given).
        #[arg(long, default_value = "")]
        text: String,
        /// Image path or http(s) URL.
        #[arg(long)]
        image: Option<String>,
        /// Link button as `label=url`. Repeatable.
        #[arg(long = "link")]
        links: Vec<String>,
        /// Interpret the text as HTML.
        #[arg(long)]
        html: bool,
        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Inspect or edit the subscriber registry.
    Subscribers {
        /// Registry action.
        #[command(subcommand)]
        action: SubscribersAction,
    },
}

/// Subscriber registry actions.
#[derive(Subcommand)]
enum SubscribersAction {
    /// Print every subscriber id.
    List {
        /// Print as a JSON array.
        #[arg(long)]
        json: bool,
    },
    /// Print the number of subscribers.
    Count,
    /// Register a chat id.
    Add {
        /// Telegram chat id.
        #[arg(allow_hyphen_values = true)]
        id: i64,
    },
    /// Remove a chat id.
    Remove {
        /// Telegram chat id.
        #[arg(allow_hyphen_values = true)]
        id: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    // A missing .env is fine; the token may come from the real environment.
    let _ = dotenvy::dotenv();

    let config_path = match cli.config {
        Some(path) => path,
        None => config_dir()?.join("config.toml"),
    };
    let config = load_config(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;

    match cli.command {
        Command::Start => handle_start(config).await,
        Command::Broadcast {
            text,
            image,
            links,
            html,
            json,
        } => {
            herald::logging::init_cli();
            handle_broadcast(config, text, image, links, html, json).await
        }
        Command::Subscribers { action } => {
            herald::logging::init_cli();
            handle_subscribers(config, action).await
        }
    }
}

/// Open the configured subscriber store.
async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn SubscriberStore>> {
    let store: Arc<dyn SubscriberStore> = match config.storage.backend {
        StorageBackend::Sqlite => Arc::new(
            SqliteStore::open(&config.storage.database)
                .await
                .with_context(|| {
                    format!(
                        "failed to open subscriber database {}",
                        config.storage.database.display()
                    )
                })?,
        ),
        StorageBackend::Memory => {
            warn!("memory storage selected; subscribers are lost on exit");
            Arc::new(MemoryStore::new())
        }
    };
    Ok(store)
}

fn bot_from_env(config: &Config) -> anyhow::Result<Bot> {
    let env = &config.telegram.bot_token_env;
    let token = std::env::var(env).with_context(|| format!("bot token env var {env} not set"))?;
    Ok(Bot::new(token))
}

/// Run the bot: startup broadcast, then the dispatcher, restarted if it panics.
async fn handle_start(config: Config) -> anyhow::Result<()> {
    let _logging_guard = herald::logging::init_bot(&config.logging.dir)?;

    let config = Arc::new(config);
    let store = open_store(&config).await?;
    let content = Arc::new(
        ContentTable::from_config(&config.menu).context("invalid [menu] configuration")?,
    );
    if content.is_empty() {
        warn!("menu has no items; users will only see the greeting");
    }
    let bot = bot_from_env(&config)?;
    let sender = Arc::new(TelegramSender::new(
        bot.clone(),
        Arc::clone(&store),
        Duration::from_secs(config.broadcast.send_timeout_secs),
    ));
    let engine = BroadcastEngine::new(Arc::clone(&store), config.broadcast.engine());

    info!(
        backend = ?config.storage.backend,
        admins = config.telegram.admins.len(),
        "herald starting"
    );

    if let Some(ref startup) = config.broadcast.startup {
        let message = build_message(startup).context("invalid [broadcast.startup] message")?;
        match engine
            .broadcast(message, sender.clone(), &CancellationToken::new())
            .await
        {
            Ok(report) => info!(summary = %report.summary(), "startup broadcast done"),
            Err(e) => warn!(error = %e, "startup broadcast aborted"),
        }
    }

    let state = BotState {
        registrar: Registrar::new(Arc::clone(&store)),
        config: Arc::clone(&config),
        store,
        content,
        engine,
        sender,
        slot: Arc::new(BroadcastSlot::new()),
    };

    // Handler errors and network failures are handled inside `dispatch()`;
    // this loop only restarts after a panic escapes the dispatcher itself.
    let restart_delay = Duration::from_secs(config.telegram.restart_delay_secs);
    loop {
        let run = tokio::spawn(run_telegram(bot.clone(), state.clone()));
        match run.await {
            Ok(()) => break,
            Err(e) if e.is_panic() => {
                error!(error = %e, delay_secs = restart_delay.as_secs(), "dispatcher crashed, restarting");
                tokio::time::sleep(restart_delay).await;
            }
            Err(e) => {
                error!(error = %e, "dispatcher task cancelled");
                break;
            }
        }
    }

    info!("herald stopped");
    Ok(())
}

/// One-shot broadcast from the command line. Ctrl+C cancels the run.
async fn handle_broadcast(
    config: Config,
    text: String,
    image: Option<String>,
    links: Vec<String>,
    html: bool,
    json: bool,
) -> anyhow::Result<()> {
    let mut message = BroadcastMessage::text(text).with_formatting(if html {
        Formatting::Html
    } else {
        Formatting::Plain
    });
    if let Some(image) = image {
        message = message.with_image(ImageRef::parse(&image));
    }
    for raw in &links {
        let (label, url) = raw
            .split_once('=')
            .with_context(|| format!("link must be `label=url`: {raw}"))?;
        message = message
            .with_link(Link::new(label, url).with_context(|| format!("invalid link url: {url}"))?);
    }

    let store = open_store(&config).await?;
    let bot = bot_from_env(&config)?;
    let sender = Arc::new(TelegramSender::new(
        bot,
        Arc::clone(&store),
        Duration::from_secs(config.broadcast.send_timeout_secs),
    ));
    let engine = BroadcastEngine::new(store, config.broadcast.engine());

    let token = CancellationToken::new();
    let ctrlc_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("cancelling broadcast; deliveries in flight will finish");
            ctrlc_token.cancel();
        }
    });

    let report = engine.broadcast(message, sender, &token).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.summary());
        for id in &report.failed_subscriber_ids {
            println!("failed: {id}");
        }
    }
    Ok(())
}

/// Registry inspection and manual edits.
async fn handle_subscribers(config: Config, action: SubscribersAction) -> anyhow::Result<()> {
    let store = open_store(&config).await?;
    match action {
        SubscribersAction::List { json } => {
            let ids = store.list_all().await?;
            if json {
                println!("{}", serde_json::to_string(&ids)?);
            } else {
                for id in ids {
                    println!("{id}");
                }
            }
        }
        SubscribersAction::Count => println!("{}", store.count().await?),
        SubscribersAction::Add { id } => {
            Registrar::new(store).register(SubscriberId(id)).await?;
            println!("added {id}");
        }
        SubscribersAction::Remove { id } => {
            Registrar::new(store).unregister(SubscriberId(id)).await?;
            println!("removed {id}");
        }
    }
    Ok(())
}

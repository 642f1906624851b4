//! Configuration loading and validation.
//!
//! Herald reads a single human-owned `config.toml` (default location
//! `~/.herald/config.toml`). Secrets never live in the file: the bot token is
//! read from the environment variable named in `[telegram]`.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::broadcast::{EngineConfig, Formatting, ImageRef, PrunePolicy};

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Telegram bot settings.
    pub telegram: TelegramConfig,

    /// Subscriber storage backend.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Broadcast engine settings.
    #[serde(default)]
    pub broadcast: BroadcastConfig,

    /// Menu content served to users.
    #[serde(default)]
    pub menu: MenuConfig,

    /// Log file location.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Telegram-specific configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    /// Environment variable name holding the bot token.
    #[serde(default = "default_token_env")]
    pub bot_token_env: String,

    /// Telegram user IDs allowed to issue admin commands.
    #[serde(default)]
    pub admins: Vec<i64>,

    /// Delay before restarting the dispatcher after an unexpected stop.
    #[serde(default = "default_restart_delay")]
    pub restart_delay_secs: u64,
}

/// Which subscriber store backs the registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// SQLite database file (durable).
    #[default]
    Sqlite,
    /// Process memory (lost on exit).
    Memory,
}

/// Subscriber storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Backend kind.
    #[serde(default)]
    pub backend: StorageBackend,

    /// SQLite database path. Relative paths resolve against the config dir.
    #[serde(default = "default_database")]
    pub database: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            database: default_database(),
        }
    }
}

/// Broadcast engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BroadcastConfig {
    /// Maximum deliveries in flight at once.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Which failed subscribers to remove after a run.
    #[serde(default)]
    pub prune: PrunePolicy,

    /// Per-recipient send timeout in seconds.
    #[serde(default = "default_send_timeout")]
    pub send_timeout_secs: u64,

    /// Message broadcast once when the bot starts.
    #[serde(default)]
    pub startup: Option<MessageConfig>,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            prune: PrunePolicy::default(),
            send_timeout_secs: default_send_timeout(),
            startup: None,
        }
    }
}

impl BroadcastConfig {
    /// Engine settings derived from this section.
    pub fn engine(&self) -> EngineConfig {
        EngineConfig {
            max_concurrent: self.max_concurrent,
            prune: self.prune,
        }
    }
}

/// A message as written in the config file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageConfig {
    /// Message text or photo caption.
    #[serde(default)]
    pub text: String,

    /// Image path or http(s) URL.
    #[serde(default)]
    pub image: Option<String>,

    /// Text formatting.
    #[serde(default)]
    pub formatting: Formatting,

    /// Inline link buttons.
    #[serde(default)]
    pub links: Vec<LinkConfig>,
}

impl MessageConfig {
    fn resolve_image(&mut self, base: &Path) {
        let Some(ref raw) = self.image else {
            return;
        };
        if let ImageRef::Path(path) = ImageRef::parse(raw) {
            if path.is_relative() {
                self.image = Some(base.join(path).to_string_lossy().into_owned());
            }
        }
    }
}

/// A labelled URL button.
#[derive(Debug, Clone, Deserialize)]
pub struct LinkConfig {
    /// Button label.
    pub label: String,
    /// Target URL.
    pub url: String,
}

/// Menu content: reply-keyboard items and fixed replies.
#[derive(Debug, Clone, Deserialize)]
pub struct MenuConfig {
    /// Reply to `/start`, shown above the menu keyboard.
    #[serde(default = "default_greeting")]
    pub greeting: String,

    /// Reply to text that matches no menu item.
    #[serde(default = "default_unrecognized")]
    pub unrecognized: String,

    /// Reply when serving a menu item fails.
    #[serde(default = "default_error_reply")]
    pub error: String,

    /// Buttons per keyboard row.
    #[serde(default = "default_columns")]
    pub columns: usize,

    /// Menu items in display order.
    #[serde(default)]
    pub items: Vec<MenuItemConfig>,
}

impl Default for MenuConfig {
    fn default() -> Self {
        Self {
            greeting: default_greeting(),
            unrecognized: default_unrecognized(),
            error: default_error_reply(),
            columns: default_columns(),
            items: Vec::new(),
        }
    }
}

/// One menu item: the button label and the content it selects.
#[derive(Debug, Clone, Deserialize)]
pub struct MenuItemConfig {
    /// Button label, which is also the selection key.
    pub key: String,

    /// Content sent when the item is selected.
    #[serde(flatten)]
    pub message: MessageConfig,
}

/// Log output configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Directory for JSON log files. Relative paths resolve against the config dir.
    #[serde(default = "default_logs_dir")]
    pub dir: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: default_logs_dir(),
        }
    }
}

// Default value functions for serde

fn default_token_env() -> String {
    "HERALD_TELEGRAM_TOKEN".to_owned()
}
fn default_restart_delay() -> u64 {
    5
}
fn default_database() -> PathBuf {
    PathBuf::from("herald.db")
}
fn default_max_concurrent() -> usize {
    8
}
fn default_send_timeout() -> u64 {
    15
}
fn default_greeting() -> String {
    "Welcome! Choose an option:".to_owned()
}
fn default_unrecognized() -> String {
    "Unrecognized option, please choose one from the menu.".to_owned()
}
fn default_error_reply() -> String {
    "Something went wrong, please try again later.".to_owned()
}
fn default_columns() -> usize {
    3
}
fn default_logs_dir() -> PathBuf {
    PathBuf::from("logs")
}

impl Config {
    /// Check cross-field constraints serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid setting.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.broadcast.max_concurrent == 0 {
            anyhow::bail!("broadcast.max_concurrent must be at least 1");
        }
        if self.menu.columns == 0 {
            anyhow::bail!("menu.columns must be at least 1");
        }
        if self.telegram.bot_token_env.trim().is_empty() {
            anyhow::bail!("telegram.bot_token_env must not be empty");
        }
        Ok(())
    }

    /// Resolve relative storage, log and image paths against `base`.
    ///
    /// Image URLs are left untouched.
    pub fn resolve_paths(&mut self, base: &Path) {
        if self.storage.database.is_relative() {
            self.storage.database = base.join(&self.storage.database);
        }
        if self.logging.dir.is_relative() {
            self.logging.dir = base.join(&self.logging.dir);
        }
        if let Some(ref mut startup) = self.broadcast.startup {
            startup.resolve_image(base);
        }
        for item in &mut self.menu.items {
            item.message.resolve_image(base);
        }
    }

    /// Returns `true` if `user_id` may issue admin commands.
    pub fn is_admin(&self, user_id: i64) -> bool {
        self.telegram.admins.contains(&user_id)
    }
}

/// Parse a config from a TOML string and validate it.
///
/// # Errors
///
/// Returns an error if the TOML is malformed or fails validation.
pub fn parse_config(contents: &str) -> anyhow::Result<Config> {
    let config: Config =
        toml::from_str(contents).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;
    config.validate()?;
    Ok(config)
}

/// Load the config from a TOML file.
///
/// Relative storage and log paths are resolved against the file's directory.
///
/// # Errors
///
/// Returns an error if the file cannot be read, parsed, or validated.
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read config at {}: {e}", path.display()))?;
    let mut config = parse_config(&contents)
        .map_err(|e| anyhow::anyhow!("invalid config at {}: {e}", path.display()))?;
    if let Some(base) = path.parent() {
        config.resolve_paths(base);
    }
    Ok(config)
}

/// Resolve the default config directory (`~/.herald/`).
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn config_dir() -> anyhow::Result<PathBuf> {
    let home = directories::BaseDirs::new()
        .ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
    Ok(home.home_dir().join(".herald"))
}

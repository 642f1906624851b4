//! Coverage for config parsing, defaults, and validation.

use std::path::PathBuf;

use herald::broadcast::{Formatting, ImageRef, PrunePolicy};
use herald::config::{load_config, parse_config, StorageBackend};
use herald::content::{build_message, ContentTable};

#[test]
fn parse_minimal_config() {
    let config = parse_config(
        r#"
[telegram]
bot_token_env = "MY_BOT_TOKEN"
admins = [123456789]
"#,
    )
    .expect("minimal config should parse");

    assert_eq!(config.telegram.bot_token_env, "MY_BOT_TOKEN");
    assert_eq!(config.telegram.admins, vec![123456789]);
    assert_eq!(config.telegram.restart_delay_secs, 5);
    assert_eq!(config.storage.backend, StorageBackend::Sqlite);
    assert_eq!(config.broadcast.max_concurrent, 8);
    assert_eq!(config.broadcast.prune, PrunePolicy::Never);
    assert!(config.menu.items.is_empty());
    assert!(config.is_admin(123456789));
    assert!(!config.is_admin(42));
}

#[test]
fn parse_full_broadcast_section() {
    let config = parse_config(
        r#"
[telegram]
admins = []

[storage]
backend = "memory"

[broadcast]
max_concurrent = 2
prune = "any_failure"
send_timeout_secs = 30

[broadcast.startup]
text = "<b>We are back online</b>"
formatting = "html"
image = "images/restart.png"
links = [{ label = "News", url = "https://example.com/news" }]
"#,
    )
    .expect("config should parse");

    assert_eq!(config.storage.backend, StorageBackend::Memory);
    assert_eq!(config.broadcast.prune, PrunePolicy::AnyFailure);
    assert_eq!(config.broadcast.send_timeout_secs, 30);

    let engine = config.broadcast.engine();
    assert_eq!(engine.max_concurrent, 2);
    assert_eq!(engine.prune, PrunePolicy::AnyFailure);

    let startup = config.broadcast.startup.expect("startup message present");
    assert_eq!(startup.formatting, Formatting::Html);
    assert_eq!(startup.links.len(), 1);
    assert_eq!(startup.image.as_deref(), Some("images/restart.png"));
}

#[test]
fn permanent_prune_policy_parses() {
    let config = parse_config(
        r#"
[telegram]

[broadcast]
prune = "permanent"
"#,
    )
    .expect("config should parse");
    assert_eq!(config.broadcast.prune, PrunePolicy::Permanent);
}

#[test]
fn zero_concurrency_is_rejected() {
    let result = parse_config(
        r#"
[telegram]

[broadcast]
max_concurrent = 0
"#,
    );
    let err = result.expect_err("zero concurrency should fail validation");
    assert!(err.to_string().contains("max_concurrent"));
}

#[test]
fn unknown_prune_policy_is_rejected() {
    let result = parse_config(
        r#"
[telegram]

[broadcast]
prune = "sometimes"
"#,
    );
    assert!(result.is_err());
}

#[test]
fn missing_telegram_section_is_rejected() {
    assert!(parse_config("[storage]\nbackend = \"sqlite\"\n").is_err());
}

#[test]
fn load_config_resolves_relative_paths_against_config_dir() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let path = tmp.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[telegram]
admins = [1]

[storage]
database = "data/subscribers.db"
"#,
    )
    .expect("should write config");

    let config = load_config(&path).expect("config should load");
    assert_eq!(
        config.storage.database,
        tmp.path().join(PathBuf::from("data/subscribers.db"))
    );
    assert_eq!(config.logging.dir, tmp.path().join("logs"));
}

#[test]
fn load_config_resolves_menu_and_startup_images_against_config_dir() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let path = tmp.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[telegram]
admins = [1]

[broadcast.startup]
text = "Back online"
image = "images/restart.png"

[[menu.items]]
key = "Pickup"
text = "Pickup points"
image = "images/pickup.jpg"

[[menu.items]]
key = "Prices"
text = "Price list"
image = "https://example.com/prices.png"
"#,
    )
    .expect("should write config");

    let config = load_config(&path).expect("config should load");
    let table = ContentTable::from_config(&config.menu).expect("menu should build");

    let pickup = table.lookup("Pickup").expect("item should exist");
    assert_eq!(
        pickup.image,
        Some(ImageRef::Path(tmp.path().join("images/pickup.jpg")))
    );

    let prices = table.lookup("Prices").expect("item should exist");
    assert_eq!(
        prices.image.as_ref().map(ToString::to_string).as_deref(),
        Some("https://example.com/prices.png")
    );

    let startup = config
        .broadcast
        .startup
        .as_ref()
        .expect("startup message should be set");
    let message = build_message(startup).expect("startup message should build");
    assert_eq!(
        message.image,
        Some(ImageRef::Path(tmp.path().join("images/restart.png")))
    );
}

#[test]
fn load_config_reports_missing_file() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let err = load_config(&tmp.path().join("absent.toml")).expect_err("should fail");
    assert!(err.to_string().contains("failed to read config"));
}

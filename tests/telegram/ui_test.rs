//! Tests for `telegram::ui` formatting and keyboard helpers.

use chrono::{Duration, Utc};
use teloxide::types::InlineKeyboardButtonKind;

use herald::broadcast::{DeliveryReport, Link};
use herald::config::parse_config;
use herald::content::ContentTable;
use herald::telegram::ui;

#[test]
fn escape_html_replaces_special_chars() {
    assert_eq!(ui::escape_html("<b>&"), "&lt;b&gt;&amp;");
}

#[test]
fn link_keyboard_is_none_without_links() {
    assert!(ui::link_keyboard(&[]).is_none());
}

#[test]
fn link_keyboard_packs_two_buttons_per_row() {
    let links = vec![
        Link::new("Support", "https://t.me/support").expect("valid url"),
        Link::new("Channel", "https://t.me/+channel").expect("valid url"),
        Link::new("Website", "https://example.com").expect("valid url"),
    ];
    let markup = ui::link_keyboard(&links).expect("keyboard should exist");

    assert_eq!(markup.inline_keyboard.len(), 2);
    assert_eq!(markup.inline_keyboard[0].len(), 2);
    assert_eq!(markup.inline_keyboard[1].len(), 1);

    let first = &markup.inline_keyboard[0][0];
    assert_eq!(first.text, "Support");
    match &first.kind {
        InlineKeyboardButtonKind::Url(url) => assert_eq!(url.as_str(), "https://t.me/support"),
        other => panic!("expected url button, got {other:?}"),
    }
}

#[test]
fn menu_keyboard_mirrors_content_rows() {
    let config = parse_config(
        r#"
[telegram]

[menu]
columns = 2

[[menu.items]]
key = "One"
text = "1"

[[menu.items]]
key = "Two"
text = "2"

[[menu.items]]
key = "Three"
text = "3"
"#,
    )
    .expect("config should parse");
    let table = ContentTable::from_config(&config.menu).expect("table should build");

    let keyboard = ui::menu_keyboard(&table);
    assert_eq!(keyboard.keyboard.len(), 2);
    assert_eq!(keyboard.keyboard[0][0].text, "One");
    assert_eq!(keyboard.keyboard[1][0].text, "Three");
}

#[test]
fn format_report_shows_counts() {
    let started = Utc::now();
    let mut report = DeliveryReport::new(started);
    report.sent_count = 4;
    report.failed_count = 1;
    report.finished_at = started + Duration::seconds(3);

    let html = ui::format_report(&report);
    assert!(html.contains("<b>Broadcast finished</b>"));
    assert!(html.contains("Delivered: 4"));
    assert!(html.contains("Failed: 1"));
    assert!(html.contains("Took: 3s"));
    assert!(!html.contains("Cancelled"));
}

#[test]
fn format_report_shows_cancellation() {
    let mut report = DeliveryReport::new(Utc::now());
    report.cancelled = true;
    report.skipped_count = 7;
    assert!(ui::format_report(&report).contains("not attempted: 7"));
}

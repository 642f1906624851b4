//! HTML formatting and keyboard helpers for Telegram messages.
//!
//! Bot-authored replies use HTML parse mode (never MarkdownV2). Menu content
//! uses whatever formatting its config entry declares.

use teloxide::types::{
    InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup, ParseMode,
};

use crate::broadcast::{DeliveryReport, Formatting, Link};
use crate::content::ContentTable;

/// Maximum URL buttons per inline keyboard row.
const LINKS_PER_ROW: usize = 2;

/// Escape special HTML characters in user-provided text.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Telegram parse mode for a message formatting, if any.
pub fn parse_mode(formatting: Formatting) -> Option<ParseMode> {
    match formatting {
        Formatting::Plain => None,
        Formatting::Html => Some(ParseMode::Html),
    }
}

/// Persistent reply keyboard listing every menu item.
pub fn menu_keyboard(content: &ContentTable) -> KeyboardMarkup {
    let rows: Vec<Vec<KeyboardButton>> = content
        .rows()
        .into_iter()
        .map(|row| row.into_iter().map(KeyboardButton::new).collect())
        .collect();
    KeyboardMarkup::new(rows).resize_keyboard()
}

/// Inline keyboard of URL buttons, or `None` when there are no links.
pub fn link_keyboard(links: &[Link]) -> Option<InlineKeyboardMarkup> {
    if links.is_empty() {
        return None;
    }
    let rows: Vec<Vec<InlineKeyboardButton>> = links
        .chunks(LINKS_PER_ROW)
        .map(|row| {
            row.iter()
                .map(|link| InlineKeyboardButton::url(link.label.clone(), link.url.clone()))
                .collect()
        })
        .collect();
    Some(InlineKeyboardMarkup::new(rows))
}

/// Format a delivery report as an HTML status message.
pub fn format_report(report: &DeliveryReport) -> String {
    let mut lines = vec![
        "<b>Broadcast finished</b>".to_owned(),
        format!("Delivered: {}", report.sent_count),
        format!("Failed: {}", report.failed_count),
    ];
    if report.cancelled {
        lines.push(format!("Cancelled, not attempted: {}", report.skipped_count));
    }
    let elapsed = report
        .finished_at
        .signed_duration_since(report.started_at)
        .num_seconds();
    lines.push(format!("Took: {elapsed}s"));
    lines.join("\n")
}

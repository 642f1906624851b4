//! Telegram slash command handlers.
//!
//! Each function handles a specific command and returns an HTML-formatted
//! response string. Admin commands assume the caller already passed the
//! admin check in the dispatcher.

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::broadcast::{BroadcastMessage, Formatting, ImageRef, Link};
use crate::subscribers::SubscriberStore;
use crate::telegram::ui::escape_html;

/// Tracks the admin broadcast currently running, if any.
///
/// Only one admin broadcast runs at a time so `/cancel` is unambiguous.
#[derive(Debug, Default)]
pub struct BroadcastSlot {
    current: Mutex<Option<CancellationToken>>,
}

impl BroadcastSlot {
    /// Create an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot. Returns the run's cancellation token, or `None` if a
    /// broadcast is already running.
    pub async fn try_begin(&self) -> Option<CancellationToken> {
        let mut current = self.current.lock().await;
        if current.is_some() {
            return None;
        }
        let token = CancellationToken::new();
        *current = Some(token.clone());
        Some(token)
    }

    /// Release the slot after a run ends.
    pub async fn finish(&self) {
        self.current.lock().await.take();
    }

    /// Cancel the running broadcast. Returns `false` if none is running.
    pub async fn cancel(&self) -> bool {
        match self.current.lock().await.as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}

/// List available commands. Admin commands are shown only to admins.
pub fn handle_help(is_admin: bool) -> String {
    let mut lines = vec![
        "<b>Available commands:</b>",
        "",
        "/start — subscribe and show the menu",
        "/stop — stop receiving announcements",
        "/help — show this message",
    ];
    if is_admin {
        lines.extend([
            "",
            "<b>Admin:</b>",
            "/broadcast &lt;text&gt; — send an announcement to every subscriber",
            "/broadcast_html &lt;text&gt; — same, with HTML formatting",
            "/cancel — stop the running broadcast",
            "/subscribers — show the subscriber count",
        ]);
    }
    lines.join("\n")
}

/// Confirmation for `/stop`.
pub fn handle_stop() -> String {
    "You will no longer receive announcements. Send /start to subscribe again.".to_owned()
}

/// Show the number of registered subscribers.
pub async fn handle_subscribers(store: &dyn SubscriberStore) -> String {
    match store.count().await {
        Ok(count) => format!("<b>Subscribers:</b> {count}"),
        Err(e) => format!("Subscriber count failed: {}", escape_html(&e.to_string())),
    }
}

/// Cancel the running broadcast.
pub async fn handle_cancel(slot: &BroadcastSlot) -> String {
    if slot.cancel().await {
        "Cancelling broadcast. Deliveries in flight will finish.".to_owned()
    } else {
        "No broadcast is running.".to_owned()
    }
}

/// Parse the arguments of `/broadcast` into a message.
///
/// Lines of the form `image: <path or url>` attach an image and lines of the
/// form `link: <label> | <url>` add a link button. All remaining lines form
/// the text.
///
/// # Errors
///
/// Returns a human-readable reason when a link line is malformed.
pub fn parse_broadcast(args: &str, formatting: Formatting) -> Result<BroadcastMessage, String> {
    let mut text_lines = Vec::new();
    let mut message = BroadcastMessage::default().with_formatting(formatting);

    for line in args.lines() {
        if let Some(image) = line.strip_prefix("image:") {
            message = message.with_image(ImageRef::parse(image.trim()));
        } else if let Some(link) = line.strip_prefix("link:") {
            let (label, url) = link
                .split_once('|')
                .ok_or_else(|| format!("link line needs `label | url`: {}", link.trim()))?;
            let parsed = Link::new(label.trim(), url.trim())
                .map_err(|e| format!("invalid link url {:?}: {e}", url.trim()))?;
            message = message.with_link(parsed);
        } else {
            text_lines.push(line);
        }
    }

    message.text = text_lines.join("\n").trim().to_owned();
    Ok(message)
}

//! Content dispatch table: menu selection key to static reply payload.
//!
//! Built once from `[menu]` in the config. Every item is an entry in the
//! table; the transport looks up the text of the pressed button and sends the
//! matching message, or the configured "unrecognized" reply when nothing
//! matches.

use std::collections::HashSet;

use crate::broadcast::{BroadcastMessage, ImageRef, Link};
use crate::config::{MenuConfig, MessageConfig};

/// Errors building the content table from configuration.
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    /// A link URL did not parse.
    #[error("invalid link url {url:?} for {label:?}: {source}")]
    InvalidLink {
        /// Button label of the offending link.
        label: String,
        /// The raw URL.
        url: String,
        /// Parse failure.
        source: url::ParseError,
    },

    /// Two menu items share a key.
    #[error("duplicate menu key {0:?}")]
    DuplicateKey(String),

    /// A menu item key is blank.
    #[error("menu item key must not be empty")]
    EmptyKey,

    /// A message has neither text nor image.
    #[error("menu item {0:?} has neither text nor image")]
    EmptyContent(String),
}

/// Build a [`BroadcastMessage`] from its config representation.
///
/// # Errors
///
/// Returns [`ContentError::InvalidLink`] if any link URL fails to parse.
pub fn build_message(config: &MessageConfig) -> Result<BroadcastMessage, ContentError> {
    let mut message = BroadcastMessage::text(config.text.clone()).with_formatting(config.formatting);
    if let Some(ref image) = config.image {
        message = message.with_image(ImageRef::parse(image));
    }
    for link in &config.links {
        let parsed = Link::new(link.label.clone(), &link.url).map_err(|source| {
            ContentError::InvalidLink {
                label: link.label.clone(),
                url: link.url.clone(),
                source,
            }
        })?;
        message = message.with_link(parsed);
    }
    Ok(message)
}

/// Static menu content keyed by button label.
#[derive(Debug, Clone)]
pub struct ContentTable {
    items: Vec<(String, BroadcastMessage)>,
    greeting: String,
    unrecognized: String,
    error_reply: String,
    columns: usize,
}

impl ContentTable {
    /// Build the table from the `[menu]` config section.
    ///
    /// # Errors
    ///
    /// Returns an error on blank or duplicate keys, empty items, or invalid
    /// link URLs.
    pub fn from_config(menu: &MenuConfig) -> Result<Self, ContentError> {
        let mut seen = HashSet::new();
        let mut items = Vec::with_capacity(menu.items.len());

        for item in &menu.items {
            let key = item.key.trim();
            if key.is_empty() {
                return Err(ContentError::EmptyKey);
            }
            if !seen.insert(key.to_owned()) {
                return Err(ContentError::DuplicateKey(key.to_owned()));
            }
            let message = build_message(&item.message)?;
            if message.validate().is_err() {
                return Err(ContentError::EmptyContent(key.to_owned()));
            }
            items.push((key.to_owned(), message));
        }

        Ok(Self {
            items,
            greeting: menu.greeting.clone(),
            unrecognized: menu.unrecognized.clone(),
            error_reply: menu.error.clone(),
            columns: menu.columns.max(1),
        })
    }

    /// Content for a selection key, or `None` if the key is not on the menu.
    pub fn lookup(&self, key: &str) -> Option<&BroadcastMessage> {
        let key = key.trim();
        self.items
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, message)| message)
    }

    /// Menu keys laid out in keyboard rows, preserving item order.
    pub fn rows(&self) -> Vec<Vec<&str>> {
        self.items
            .chunks(self.columns)
            .map(|row| row.iter().map(|(k, _)| k.as_str()).collect())
            .collect()
    }

    /// Number of menu items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if the menu has no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Reply to `/start`.
    pub fn greeting(&self) -> &str {
        &self.greeting
    }

    /// Reply to an unknown selection.
    pub fn unrecognized(&self) -> &str {
        &self.unrecognized
    }

    /// Reply when serving a selection fails.
    pub fn error_reply(&self) -> &str {
        &self.error_reply
    }
}

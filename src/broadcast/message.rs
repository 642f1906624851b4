//! Broadcast payload: text, optional image, inline links, formatting.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use url::Url;

use super::BroadcastError;

/// How the message text should be interpreted by the transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Formatting {
    /// Text is sent verbatim.
    #[default]
    Plain,
    /// Text carries HTML markup.
    Html,
}

/// Reference to an image attached to a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageRef {
    /// File on the local filesystem.
    Path(PathBuf),
    /// Remote image fetched by the transport.
    Url(Url),
}

impl ImageRef {
    /// Interpret `raw` as an http(s) URL when it parses as one, otherwise as a
    /// filesystem path.
    pub fn parse(raw: &str) -> Self {
        match Url::parse(raw) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Self::Url(url),
            _ => Self::Path(PathBuf::from(raw)),
        }
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => write!(f, "{}", path.display()),
            Self::Url(url) => write!(f, "{url}"),
        }
    }
}

/// A labelled URL rendered as an inline button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    /// Button label.
    pub label: String,
    /// Target URL.
    pub url: Url,
}

impl Link {
    /// Build a link, validating the URL.
    ///
    /// # Errors
    ///
    /// Returns an error if `url` is not an absolute URL.
    pub fn new(label: impl Into<String>, url: &str) -> Result<Self, url::ParseError> {
        Ok(Self {
            label: label.into(),
            url: Url::parse(url)?,
        })
    }
}

/// A message delivered to every subscriber by the broadcast engine, or to a
/// single chat by the content dispatch table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastMessage {
    /// Message text (the caption when an image is attached).
    pub text: String,
    /// Optional attached image.
    pub image: Option<ImageRef>,
    /// Inline link buttons, in display order.
    pub links: Vec<Link>,
    /// Text interpretation.
    pub formatting: Formatting,
}

impl BroadcastMessage {
    /// Plain-text message without image or links.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Attach an image.
    #[must_use]
    pub fn with_image(mut self, image: ImageRef) -> Self {
        self.image = Some(image);
        self
    }

    /// Append an inline link button.
    #[must_use]
    pub fn with_link(mut self, link: Link) -> Self {
        self.links.push(link);
        self
    }

    /// Set the text formatting.
    #[must_use]
    pub fn with_formatting(mut self, formatting: Formatting) -> Self {
        self.formatting = formatting;
        self
    }

    /// Check that the message carries at least one content element.
    ///
    /// # Errors
    ///
    /// Returns [`BroadcastError::InvalidMessage`] when the text is blank and
    /// no image is attached.
    pub fn validate(&self) -> Result<(), BroadcastError> {
        if self.text.trim().is_empty() && self.image.is_none() {
            return Err(BroadcastError::InvalidMessage(
                "message needs text or an image".to_owned(),
            ));
        }
        Ok(())
    }
}

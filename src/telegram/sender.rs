//! Telegram implementation of [`MessageSender`].
//!
//! Messages with an image go out as a photo with the text as caption; others
//! as a text message. Link buttons ride along as an inline keyboard.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::InputFile;
use teloxide::{ApiError, RequestError};
use tracing::{trace, warn};

use crate::broadcast::{BroadcastMessage, DeliveryError, ImageRef, MessageSender};
use crate::subscribers::{SubscriberId, SubscriberStore};
use crate::telegram::ui;

/// Delivers broadcast messages through the Bot API.
#[derive(Clone)]
pub struct TelegramSender {
    bot: Bot,
    store: Arc<dyn SubscriberStore>,
    timeout: Duration,
}

impl TelegramSender {
    /// Create a sender. Delivered message ids are recorded in `store`.
    pub fn new(bot: Bot, store: Arc<dyn SubscriberStore>, timeout: Duration) -> Self {
        Self {
            bot,
            store,
            timeout,
        }
    }
}

#[async_trait]
impl MessageSender for TelegramSender {
    async fn send(
        &self,
        recipient: SubscriberId,
        message: &BroadcastMessage,
    ) -> Result<(), DeliveryError> {
        let sent = tokio::time::timeout(
            self.timeout,
            send_content(&self.bot, ChatId(recipient.0), message),
        )
        .await
        .map_err(|_| {
            DeliveryError::transient(format!(
                "send timed out after {}s",
                self.timeout.as_secs()
            ))
        })?
        .map_err(|e| classify_error(&e))?;

        let message_id = i64::from(sent.id.0);
        if let Err(e) = self.store.record_message_id(recipient, message_id).await {
            warn!(subscriber = %recipient, error = %e, "failed to record message id");
        }
        trace!(subscriber = %recipient, message_id, "message delivered");
        Ok(())
    }
}

/// Send one content payload to one chat.
///
/// # Errors
///
/// Returns the Bot API error unchanged.
pub async fn send_content(
    bot: &Bot,
    chat_id: ChatId,
    message: &BroadcastMessage,
) -> Result<Message, RequestError> {
    let keyboard = ui::link_keyboard(&message.links);
    let parse_mode = ui::parse_mode(message.formatting);

    match message.image {
        Some(ref image) => {
            let mut req = bot.send_photo(chat_id, input_file(image));
            if !message.text.is_empty() {
                req = req.caption(message.text.clone());
            }
            if let Some(mode) = parse_mode {
                req = req.parse_mode(mode);
            }
            if let Some(markup) = keyboard {
                req = req.reply_markup(markup);
            }
            req.await
        }
        None => {
            let mut req = bot.send_message(chat_id, message.text.clone());
            if let Some(mode) = parse_mode {
                req = req.parse_mode(mode);
            }
            if let Some(markup) = keyboard {
                req = req.reply_markup(markup);
            }
            req.await
        }
    }
}

fn input_file(image: &ImageRef) -> InputFile {
    match image {
        ImageRef::Path(path) => InputFile::file(path.clone()),
        ImageRef::Url(url) => InputFile::url(url.clone()),
    }
}

/// Map a Bot API error to a delivery failure.
///
/// Errors meaning the chat can never be reached again (bot blocked, chat
/// gone, user deleted) are permanent. Everything else, including rate limits
/// and network errors, is transient.
pub fn classify_error(err: &RequestError) -> DeliveryError {
    let permanent = matches!(
        err,
        RequestError::Api(
            ApiError::BotBlocked
                | ApiError::ChatNotFound
                | ApiError::UserDeactivated
                | ApiError::BotKicked
                | ApiError::CantInitiateConversation
        )
    );
    if permanent {
        DeliveryError::permanent(err.to_string())
    } else {
        DeliveryError::transient(err.to_string())
    }
}

//! Herald, a Telegram menu bot with a subscriber registry and broadcasts.
//!
//! Users opt in with `/start` and browse a configured menu. Admins announce
//! to every subscriber through the broadcast engine, which delivers with
//! bounded concurrency, isolates per-recipient failures, and can prune chats
//! that can no longer be reached.
//!
//! See `DESIGN.md` for the architecture notes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod logging;

pub mod subscribers;

pub mod broadcast;
pub mod content;
pub mod registration;

pub mod telegram;

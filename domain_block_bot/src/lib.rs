//! Source code for the domain block bot, which watches a list of domains
//! and tells its operator on Telegram when one of them gets blocked.

/// Domains, checking them, and storing them.
mod domains;

/// Settings.
mod config;

/// Sending messages out.
mod notifier;

/// Block state tracking and alerting.
mod alerts;

/// Functions that perform stuff in the background.
mod actions;

/// Functions that handle events from Telegram.
mod handlers;

/// Entry function that starts the bot.
mod entry;
pub use entry::*;

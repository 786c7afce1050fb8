use std::sync::Arc;

use bot_commons::useful_methods::UpdateStuff;
use html_escape::encode_text;
use teloxide::types::{BotCommand, ChatId, Update, UpdateKind};

use crate::{
    domains::{Domain, DomainStore, ReplaceOutcome, StorageBackend},
    notifier::{DeliveryError, Notifier},
};

pub mod webhook;

/// Chat commands understood by the bot.
#[derive(Debug, PartialEq, Eq)]
pub enum Command<'a> {
    /// `/list`
    List,
    /// `/replace <old> <new>`
    Replace { old: &'a str, new: Domain },
}

/// Reasons a command is recognized but can't be run as typed.
#[derive(Debug, PartialEq, Eq)]
pub enum UsageError {
    WrongArgumentCount,
    InvalidDomain(String),
}

/// Parse a message as a command.
///
/// The command itself is matched case-sensitively, and may be addressed
/// as `/command@botname`. Commands addressed to other bots are ignored.
///
/// Returns [`None`] if the text is not a command for this bot at all.
pub fn parse_command<'a>(
    text: &'a str,
    bot_username: Option<&str>,
) -> Option<Result<Command<'a>, UsageError>> {
    let mut words = text.split_whitespace();
    let command = words.next()?;

    // Commands shouldn't have an "@" in their callnames.
    // If the command is "/list@Some_Bot", trim the "@" and everything after it.
    let callname = match command.split_once('@') {
        Some((callname, addressee)) => {
            if let Some(username) = bot_username {
                // Bot names are guaranteed ASCII.
                if !addressee.eq_ignore_ascii_case(username) {
                    return None;
                }
            }
            callname
        }
        None => command,
    };

    match callname {
        "/list" => Some(Ok(Command::List)),
        "/replace" => {
            let args: Vec<&str> = words.collect();
            let &[old, new] = args.as_slice() else {
                return Some(Err(UsageError::WrongArgumentCount));
            };
            Some(match Domain::parse_strict(new) {
                Some(new) => Ok(Command::Replace { old, new }),
                None => Err(UsageError::InvalidDomain(new.to_string())),
            })
        }
        _ => None,
    }
}

/// Commands to show in Telegram's command menu.
pub fn generate_bot_commands() -> Vec<BotCommand> {
    vec![
        BotCommand::new("list", "Show the most recently added monitored domains"),
        BotCommand::new("replace", "Replace a domain: /replace old-domain new-domain"),
    ]
}

static REPLACE_USAGE: &str = concat!(
    "❌ Wrong format!\n",
    "Example: <code>/replace old-domain.com new-domain.com</code>"
);

/// Answers operator commands in whatever chat they came from.
pub struct CommandHandler<S, N> {
    store: Arc<DomainStore<S>>,
    notifier: Arc<N>,
    bot_username: Option<String>,
    /// How many domains `/list` shows at most. [`None`] shows everything.
    list_limit: Option<usize>,
}

impl<S: StorageBackend, N: Notifier> CommandHandler<S, N> {
    pub fn new(
        store: Arc<DomainStore<S>>,
        notifier: Arc<N>,
        bot_username: Option<String>,
        list_limit: Option<usize>,
    ) -> Self {
        Self {
            store,
            notifier,
            bot_username,
            list_limit,
        }
    }

    /// Handle an update from Telegram. Button presses get answered first,
    /// then their data is treated like typed text.
    ///
    /// Returns `true` if it had a command that was responded to.
    pub async fn handle_update(&self, update: &Update) -> Result<bool, DeliveryError> {
        if let UpdateKind::CallbackQuery(query) = &update.kind {
            if let Err(e) = self.notifier.answer_callback(query).await {
                log::warn!("Failed to answer callback query from {}: {e}", query.from.id);
            }
        }

        let Some((chat, text)) = update.chat_and_text() else {
            return Ok(false);
        };
        self.handle_text(chat, text.trim()).await
    }

    /// Handle a text that came from `chat`.
    ///
    /// Returns `true` if it was a command and was responded to.
    pub async fn handle_text(&self, chat: ChatId, text: &str) -> Result<bool, DeliveryError> {
        let Some(command) = parse_command(text, self.bot_username.as_deref()) else {
            return Ok(false);
        };
        log::debug!("Chat {chat} sent: {text}");

        let response = match command {
            Ok(Command::List) => self.list_response().await,
            Ok(Command::Replace { old, new }) => self.replace_response(old, new).await,
            Err(UsageError::WrongArgumentCount) => REPLACE_USAGE.to_string(),
            Err(UsageError::InvalidDomain(new)) => format!(
                "❌ <code>{}</code> doesn't look like a domain name.\n{}",
                encode_text(&new),
                REPLACE_USAGE
            ),
        };

        self.notifier.send(&response, Some(chat)).await?;
        Ok(true)
    }

    async fn list_response(&self) -> String {
        use std::fmt::Write;

        let (domains, total) = self.store.list(self.list_limit).await;
        if domains.is_empty() {
            return "📭 No domains are being monitored.".to_string();
        }

        let mut response = if domains.len() < total {
            format!("🧾 <b>Last {} domains:</b>\n", domains.len())
        } else {
            "🧾 <b>Monitored domains:</b>\n".to_string()
        };
        for (i, domain) in domains.iter().enumerate() {
            writeln!(response, "{}. <code>{}</code>", i + 1, encode_text(domain.as_str()))
                .expect("Writing to a String never fails");
        }
        response
    }

    async fn replace_response(&self, old: &str, new: Domain) -> String {
        let old_escaped = encode_text(old).to_string();
        let new_escaped = encode_text(new.as_str()).to_string();

        match self.store.replace(old, new).await {
            ReplaceOutcome::Replaced => format!(
                "✅ Domain <code>{old_escaped}</code> replaced with <code>{new_escaped}</code>."
            ),
            ReplaceOutcome::NotFound => {
                format!("❌ Domain <code>{old_escaped}</code> was not found.")
            }
            ReplaceOutcome::Duplicate => {
                format!("❌ Domain <code>{new_escaped}</code> is already in the list.")
            }
        }
    }
}

use std::future::Future;

use bot_commons::useful_methods::BotSendHtml;
use teloxide::{
    requests::Requester,
    types::{CallbackQuery, ChatId},
    Bot, RequestError,
};

#[derive(Debug, thiserror::Error)]
#[error("failed to deliver a message to chat {chat}: {source}")]
pub struct DeliveryError {
    pub chat: ChatId,
    #[source]
    pub source: RequestError,
}

/// Something that can deliver text to a chat.
pub trait Notifier: Send + Sync {
    /// Send HTML-formatted `text` to `target`, or to the operator chat if that's [`None`].
    ///
    /// Anything dynamic in `text` must already be escaped.
    fn send(
        &self,
        text: &str,
        target: Option<ChatId>,
    ) -> impl Future<Output = Result<(), DeliveryError>> + Send;

    /// Tell Telegram a button press was handled, so the client stops
    /// showing it as loading.
    fn answer_callback(
        &self,
        query: &CallbackQuery,
    ) -> impl Future<Output = Result<(), RequestError>> + Send;
}

pub struct TelegramNotifier {
    bot: Bot,
    operator_chat: ChatId,
}

impl TelegramNotifier {
    pub fn new(bot: Bot, operator_chat: ChatId) -> Self {
        Self { bot, operator_chat }
    }
}

impl Notifier for TelegramNotifier {
    async fn send(&self, text: &str, target: Option<ChatId>) -> Result<(), DeliveryError> {
        let chat = target.unwrap_or(self.operator_chat);
        self.bot
            .send_html(chat, text)
            .await
            .map(|_| ())
            .map_err(|source| DeliveryError { chat, source })
    }

    async fn answer_callback(&self, query: &CallbackQuery) -> Result<(), RequestError> {
        self.bot.answer_callback_query(query.id.clone()).await?;
        Ok(())
    }
}

use std::future::Future;

use teloxide::{
    payloads::SendMessageSetters,
    requests::Requester,
    sugar::request::RequestLinkPreviewExt,
    types::{Message, ParseMode, Recipient},
    Bot, RequestError,
};

/// Maximum length of a single Telegram message, in bytes of UTF-8.
pub const MESSAGE_LENGTH_LIMIT: usize = 4096;

pub trait BotSendHtml {
    /// Opinionated method to send a message with HTML markup and no link previews.
    /// Splits the message into many at line boundaries if it's longer than the
    /// character limit.
    ///
    /// There are no retries: the first error is returned as is, and the
    /// chunks after it are not sent.
    fn send_html<'a>(
        &'a self,
        to_where: impl Into<Recipient> + Send,
        text: &'a str,
    ) -> impl Future<Output = Result<Vec<Message>, RequestError>> + Send;
}

impl BotSendHtml for Bot {
    async fn send_html<'a>(
        &'a self,
        to_where: impl Into<Recipient> + Send,
        text: &'a str,
    ) -> Result<Vec<Message>, RequestError> {
        let to_where: Recipient = to_where.into();
        let mut sent_messages = Vec::new();

        for chunk in split_at_lines(text, MESSAGE_LENGTH_LIMIT) {
            let message = self
                .send_message(to_where.clone(), chunk)
                .parse_mode(ParseMode::Html)
                .disable_link_preview(true)
                .await?;
            sent_messages.push(message);
        }

        Ok(sent_messages)
    }
}

/// Split text into chunks no longer than `max_len` bytes each.
///
/// Lines are kept whole where possible, so markup that opens and closes
/// on the same line survives the split. Lines that alone are too long
/// get cut at character boundaries. Blank chunks are dropped.
///
/// # Panics
/// Panics if `max_len` is less than 4, since a single character may be
/// up to 4 bytes long.
#[must_use]
pub fn split_at_lines(text: &str, max_len: usize) -> Vec<&str> {
    assert!(max_len >= 4, "Max length is too small");

    let mut chunks = Vec::new();
    let mut rest = text.trim();

    while !rest.is_empty() {
        if rest.len() <= max_len {
            chunks.push(rest);
            break;
        }

        // Last newline that still fits. Cut by characters if there's none.
        let cut = match rest.as_bytes()[..=max_len]
            .iter()
            .rposition(|&byte| byte == b'\n')
        {
            Some(newline) if newline > 0 => newline,
            _ => {
                let mut cut = max_len;
                while !rest.is_char_boundary(cut) {
                    cut -= 1;
                }
                cut
            }
        };

        let chunk = rest[..cut].trim();
        if !chunk.is_empty() {
            chunks.push(chunk);
        }
        rest = rest[cut..].trim_start();
    }

    chunks
}

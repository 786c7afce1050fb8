mod split_msg;
pub use split_msg::*;

use teloxide::types::{ChatId, Message, Update, UpdateKind};

pub trait MessageStuff {
    /// Text of the message, or its caption if it's media with one.
    fn text_full(&self) -> Option<&str>;
}

impl MessageStuff for Message {
    fn text_full(&self) -> Option<&str> {
        self.text().or_else(|| self.caption())
    }
}

pub trait UpdateStuff {
    /// Get the chat to answer into and the text that was "said" by this update.
    ///
    /// New and edited messages give their text (or caption). Callback queries
    /// give their `data`, answered into the chat of the message the button was
    /// on, or into the private chat with whoever pressed it if that message
    /// is not available.
    ///
    /// Returns [`None`] for every other kind of update, or if there's no text.
    fn chat_and_text(&self) -> Option<(ChatId, &str)>;
}

impl UpdateStuff for Update {
    fn chat_and_text(&self) -> Option<(ChatId, &str)> {
        match &self.kind {
            UpdateKind::Message(message) | UpdateKind::EditedMessage(message) => {
                Some((message.chat.id, message.text_full()?))
            }
            UpdateKind::CallbackQuery(query) => {
                let data = query.data.as_deref()?;
                let chat_id = match &query.message {
                    Some(message) => message.chat().id,
                    None => ChatId::from(query.from.id),
                };
                Some((chat_id, data))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::UpdateStuff;
    use teloxide::types::{ChatId, Update};

    fn parse(json: &str) -> Update {
        serde_json::from_str(json).expect("Test update should parse")
    }

    const USER: &str = r#"{"id":42,"is_bot":false,"first_name":"Operator"}"#;
    const CHAT: &str = r#"{"id":-100123,"type":"supergroup","title":"Ops"}"#;

    #[test]
    fn new_message() {
        let update = parse(&format!(
            r#"{{"update_id":1,"message":{{"message_id":7,"date":1700000000,"chat":{CHAT},"from":{USER},"text":"/list"}}}}"#
        ));
        assert_eq!(update.chat_and_text(), Some((ChatId(-100123), "/list")));
    }

    #[test]
    fn edited_message() {
        let update = parse(&format!(
            r#"{{"update_id":2,"edited_message":{{"message_id":7,"date":1700000000,"edit_date":1700000050,"chat":{CHAT},"from":{USER},"text":"/replace a.com b.com"}}}}"#
        ));
        assert_eq!(
            update.chat_and_text(),
            Some((ChatId(-100123), "/replace a.com b.com"))
        );
    }

    #[test]
    fn callback_query_without_message_goes_to_sender() {
        let update = parse(&format!(
            r#"{{"update_id":3,"callback_query":{{"id":"4382bfdwdsb323b2d9","from":{USER},"chat_instance":"-1","data":"/list"}}}}"#
        ));
        assert_eq!(update.chat_and_text(), Some((ChatId(42), "/list")));
    }

    #[test]
    fn callback_query_on_a_message_goes_to_its_chat() {
        let update = parse(&format!(
            r#"{{"update_id":5,"callback_query":{{"id":"4382bfdwdsb323b2d9","from":{USER},"chat_instance":"-1","data":"/list","message":{{"message_id":9,"date":1700000000,"chat":{CHAT},"text":"Pick one"}}}}}}"#
        ));
        assert_eq!(update.chat_and_text(), Some((ChatId(-100123), "/list")));
    }

    #[test]
    fn message_without_text() {
        let update = parse(&format!(
            r#"{{"update_id":4,"message":{{"message_id":8,"date":1700000000,"chat":{CHAT},"from":{USER},"dice":{{"emoji":"🎲","value":3}}}}}}"#
        ));
        assert_eq!(update.chat_and_text(), None);
    }
}

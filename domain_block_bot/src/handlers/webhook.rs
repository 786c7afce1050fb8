//! HTTP side of the bot: Telegram posts updates to `/`, and uptime
//! checkers poke `/` with a GET.

use std::sync::Arc;

use axum::{body::Bytes, extract::State, http::StatusCode, routing::get, Router};
use teloxide::types::Update;
use tokio::net::TcpListener;

use super::CommandHandler;
use crate::{domains::StorageBackend, notifier::Notifier};

pub static HEALTH_RESPONSE: &str = "✅ Webhook is up";

pub fn router<S, N>(handler: Arc<CommandHandler<S, N>>) -> Router
where
    S: StorageBackend + 'static,
    N: Notifier + 'static,
{
    Router::new()
        .route("/", get(health).post(receive_update::<S, N>))
        .with_state(handler)
}

async fn health() -> &'static str {
    HEALTH_RESPONSE
}

/// Acknowledge the update right away and deal with it in the background,
/// so a slow reply never makes Telegram time out and redeliver.
async fn receive_update<S, N>(
    State(handler): State<Arc<CommandHandler<S, N>>>,
    body: Bytes,
) -> StatusCode
where
    S: StorageBackend + 'static,
    N: Notifier + 'static,
{
    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            log::warn!("Received an update that doesn't parse: {e}");
            return StatusCode::BAD_REQUEST;
        }
    };

    tokio::spawn(async move {
        if let Err(e) = handler.handle_update(&update).await {
            log::error!("Failed to respond to a command: {e}");
        }
    });

    StatusCode::OK
}

/// Serve `router` on `listener` until Ctrl+C.
pub async fn serve(listener: TcpListener, router: Router) -> std::io::Result<()> {
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Failed to listen for Ctrl+C: {e}");
                std::future::pending::<()>().await;
            }
            log::info!("Got Ctrl+C, shutting down...");
        })
        .await
}

#[cfg(test)]
mod tests {
    use std::{future::IntoFuture, net::SocketAddr, time::Duration};

    use teloxide::types::ChatId;

    use super::*;
    use crate::{
        domains::{database::memory::MemoryStorage, DomainStore},
        notifier::testing::RecordingNotifier,
    };

    async fn start(names: &[&str]) -> (SocketAddr, Arc<RecordingNotifier>) {
        let store = Arc::new(DomainStore::open(MemoryStorage::with_domains(names)).await);
        let notifier = Arc::new(RecordingNotifier::default());
        let handler = Arc::new(CommandHandler::new(
            store,
            notifier.clone(),
            None,
            Some(15),
        ));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(axum::serve(listener, router(handler)).into_future());
        (address, notifier)
    }

    fn message_update(text: &str) -> String {
        serde_json::json!({
            "update_id": 10,
            "message": {
                "message_id": 3,
                "date": 1700000000,
                "chat": {"id": 777, "type": "private", "first_name": "Operator"},
                "from": {"id": 777, "is_bot": false, "first_name": "Operator"},
                "text": text,
            }
        })
        .to_string()
    }

    async fn wait_for_replies(notifier: &RecordingNotifier) -> Vec<(Option<ChatId>, String)> {
        for _ in 0..100 {
            let sent = notifier.sent();
            if !sent.is_empty() {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        Vec::new()
    }

    #[tokio::test]
    async fn health_check() {
        let (address, _) = start(&[]).await;
        let response = reqwest::get(format!("http://{address}/")).await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        assert_eq!(response.text().await.unwrap(), HEALTH_RESPONSE);
    }

    #[tokio::test]
    async fn command_is_answered_in_its_chat() {
        let (address, notifier) = start(&["a.com"]).await;

        let response = reqwest::Client::new()
            .post(format!("http://{address}/"))
            .header("content-type", "application/json")
            .body(message_update("/list"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        assert!(response.text().await.unwrap().is_empty());

        let sent = wait_for_replies(&notifier).await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, Some(ChatId(777)));
        assert!(sent[0].1.contains("<code>a.com</code>"));
    }

    #[tokio::test]
    async fn non_commands_are_acknowledged_and_ignored() {
        let (address, notifier) = start(&["a.com"]).await;
        let client = reqwest::Client::new();

        let response = client
            .post(format!("http://{address}/"))
            .body(message_update("just chatting"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);

        // Unknown kinds of updates are fine too.
        let response = client
            .post(format!("http://{address}/"))
            .body(r#"{"update_id": 11, "some_future_thing": {"x": 1}}"#)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn button_press_is_answered_and_handled() {
        let (address, notifier) = start(&["a.com"]).await;

        let update = serde_json::json!({
            "update_id": 12,
            "callback_query": {
                "id": "4382bfdwdsb323b2d9",
                "from": {"id": 777, "is_bot": false, "first_name": "Operator"},
                "chat_instance": "-1",
                "data": "/list",
                "message": {
                    "message_id": 40,
                    "date": 1700000000,
                    "chat": {"id": -100123, "type": "supergroup", "title": "Ops"},
                    "text": "Pick one",
                },
            }
        });
        let response = reqwest::Client::new()
            .post(format!("http://{address}/"))
            .header("content-type", "application/json")
            .body(update.to_string())
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);

        let sent = wait_for_replies(&notifier).await;
        assert_eq!(sent.len(), 1);
        // Goes to the chat the button was in, not the presser's private chat.
        assert_eq!(sent[0].0, Some(ChatId(-100123)));
        assert!(sent[0].1.contains("<code>a.com</code>"));
        assert_eq!(notifier.answered(), ["4382bfdwdsb323b2d9"]);
    }

    #[tokio::test]
    async fn garbage_is_rejected() {
        let (address, notifier) = start(&["a.com"]).await;

        let response = reqwest::Client::new()
            .post(format!("http://{address}/"))
            .body("definitely not json")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
        assert!(notifier.sent().is_empty());
    }
}

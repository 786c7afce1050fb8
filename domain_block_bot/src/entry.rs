use std::{net::SocketAddr, sync::Arc};

use teloxide::prelude::*;
use tokio::net::TcpListener;
use url::Url;

use crate::{
    actions::scan_spinloop,
    alerts::Scanner,
    config::Config,
    domains::{DomainStore, ReputationChecker},
    handlers::{generate_bot_commands, webhook, CommandHandler},
    notifier::TelegramNotifier,
};

/// # Panics
///
/// Panics if the config is invalid, Telegram can't be reached, or the port
/// can't be bound.
pub async fn entry() {
    log::info!("ASYNC WOOOO");
    let config = Config::load().expect("Could not load the config!");

    let bot = Bot::new(&config.telegram_token);

    let me = bot.get_me().await.expect("Failed to get info about the bot!");
    let bot_username = me.user.username.clone();
    log::info!("Running as @{}", bot_username.as_deref().unwrap_or("???"));

    bot.set_my_commands(generate_bot_commands())
        .await
        .expect("Failed to set bot commands!");

    if let Some(webhook_url) = &config.webhook_url {
        let url = Url::parse(webhook_url).expect("Webhook URL was validated with the config");
        bot.set_webhook(url)
            .await
            .expect("Failed to set the webhook!");
        log::info!("Webhook set to {webhook_url}");
    }

    let storage = config.storage().expect("Failed to set up storage!");
    let store = Arc::new(DomainStore::open(storage).await);

    let checker = ReputationChecker::new(config.check_url().expect("Check URL was validated"))
        .expect("Failed to create the HTTP client!");
    let notifier = Arc::new(TelegramNotifier::new(bot, config.operator_chat()));

    let scanner = Arc::new(Scanner::new(
        store.clone(),
        checker,
        notifier.clone(),
        config.check_error_policy,
    ));
    tokio::spawn(scan_spinloop(scanner, config.scan_interval()));

    let handler = Arc::new(CommandHandler::new(
        store,
        notifier,
        bot_username,
        config.list_limit(),
    ));

    let address = SocketAddr::new(config.listen_address, config.port);
    let listener = TcpListener::bind(address)
        .await
        .expect("Failed to bind the webhook port!");

    log::info!("Listening for updates on {address}");

    if let Err(e) = webhook::serve(listener, webhook::router(handler)).await {
        log::error!("Webhook server failed: {e}");
    }

    log::info!("it appears we have been bonked.");
}

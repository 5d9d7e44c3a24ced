use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};
use tracing::{info, warn};

use devdeck_core::{notify::Notifier, store::DocumentStore};

use crate::handlers;

#[derive(Clone)]
pub struct BotState {
    pub store: DocumentStore,
    pub notifier: Notifier,
}

/// Long-polling loop for chat updates. Runs until the process shuts down.
pub async fn run_polling(token: String, state: BotState) -> anyhow::Result<()> {
    let bot = Bot::new(token);

    match bot.get_me().await {
        Ok(me) => info!(username = %me.username(), "telegram bot started"),
        Err(e) => warn!(error = %e, "telegram get_me failed, polling anyway"),
    }

    let state = Arc::new(state);
    let handler =
        dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    info!("starting telegram polling");
    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build()
        .dispatch()
        .await;

    info!("telegram polling stopped");
    Ok(())
}

use std::{net::SocketAddr, sync::Arc};

use tracing::{error, info, warn};

use devdeck_core::{config::Config, store::DocumentStore};
use devdeck_http::{serve, shutdown_signal, AppState};
use devdeck_telegram::{build_notifier, router::BotState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    devdeck_core::logging::init("devdeck")?;

    let cfg = Config::load()?;
    cfg.log_summary();

    let store = DocumentStore::open(cfg.database_file.clone()).await?;
    let notifier = build_notifier(&cfg);

    match cfg.telegram_bot_token.clone() {
        Some(token) => {
            let bot_state = BotState {
                store: store.clone(),
                notifier: notifier.clone(),
            };
            tokio::spawn(async move {
                if let Err(e) = devdeck_telegram::router::run_polling(token, bot_state).await {
                    error!(error = %e, "telegram bot stopped with an error");
                }
            });
        }
        None => warn!("TELEGRAM_BOT_TOKEN not set, telegram bot disabled"),
    }

    let state = Arc::new(AppState {
        store,
        notifier,
        admin: cfg.admin_credentials(),
    });

    let address = SocketAddr::new(cfg.bind_address, cfg.port);
    serve(address, state, shutdown_signal()).await?;

    info!("devdeck exiting");
    Ok(())
}
